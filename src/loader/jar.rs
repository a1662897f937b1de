use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;

use super::memory::JarMemoryLoader;
use super::{Loader, canonicalize, path_to_url_path};
use crate::archive::{HandlePool, HandleSlot, ZipHandle};
use crate::cache::{LoaderData, normalize_name};
use crate::context::LoaderContext;
use crate::error::Result;
use crate::manifest::{MANIFEST_NAME, parse_main_attributes};
use crate::metrics::LoaderMetrics;
use crate::resource::{MemoryResource, PackageAttributes, Resource};

/// A classpath root backed by a zip archive.
///
/// With `can_lock_file` the archive handle is opened once and shared by all
/// lookups until the handle pool reclaims it or the loader is dropped.
/// Without it every lookup opens and closes a private handle. A preloaded
/// loader answers every lookup from memory and holds no handle at all.
pub struct JarLoader {
    base_url: String,
    index: usize,
    canonical_path: PathBuf,
    can_lock_file: bool,
    attributes: Arc<PackageAttributes>,
    memory: Option<JarMemoryLoader>,
    slot: Option<Arc<HandleSlot>>,
    handles: Arc<HandlePool>,
    metrics: Arc<LoaderMetrics>,
}

enum Lease {
    Shared(Arc<ZipHandle>),
    Private(ZipHandle),
}

impl Deref for Lease {
    type Target = ZipHandle;

    fn deref(&self) -> &ZipHandle {
        match self {
            Lease::Shared(handle) => &**handle,
            Lease::Private(handle) => handle,
        }
    }
}

impl JarLoader {
    pub fn new(
        path: &Path,
        can_lock_file: bool,
        index: usize,
        preload: bool,
        ctx: &LoaderContext,
    ) -> Result<Self> {
        let canonical_path = canonicalize(path)?;
        let base_url = format!("jar:file:{}!/", path_to_url_path(&canonical_path));
        let metrics = Arc::clone(ctx.metrics());
        let handles = Arc::clone(ctx.handles());

        let handle = ZipHandle::open(&canonical_path, Arc::clone(&metrics))?;
        let attributes = Arc::new(read_attributes(&handle)?);
        let memory = if preload {
            JarMemoryLoader::load(&handle, &base_url, &attributes, ctx.config())?
        } else {
            None
        };

        // a preloaded archive is never read again
        let slot = if can_lock_file && memory.is_none() {
            let slot = handles.register(&canonical_path);
            handles.adopt(&slot, handle);
            Some(slot)
        } else {
            drop(handle);
            None
        };

        Ok(Self {
            base_url,
            index,
            canonical_path,
            can_lock_file,
            attributes,
            memory,
            slot,
            handles,
            metrics,
        })
    }

    pub fn canonical_path(&self) -> &Path {
        &self.canonical_path
    }

    pub fn can_lock_file(&self) -> bool {
        self.can_lock_file
    }

    pub fn attributes(&self) -> &PackageAttributes {
        &self.attributes
    }

    pub fn is_preloaded(&self) -> bool {
        self.memory.is_some()
    }

    pub fn has_retained_handle(&self) -> bool {
        self.slot.as_ref().is_some_and(|s| s.is_open())
    }

    /// Closes the retained handle, if any. The next lookup reopens it.
    pub fn release_handle(&self) -> bool {
        self.slot.as_ref().is_some_and(|s| s.clear())
    }

    fn acquire(&self) -> Result<Lease> {
        match self.slot.as_deref() {
            Some(slot) => Ok(Lease::Shared(self.handles.acquire(slot)?)),
            None => Ok(Lease::Private(ZipHandle::open(
                &self.canonical_path,
                Arc::clone(&self.metrics),
            )?)),
        }
    }

    fn lookup(&self, name: &str) -> Result<Option<Box<dyn Resource>>> {
        let handle = self.acquire()?;
        let Some(content) = handle.read_entry(name)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(MemoryResource::new(
            &self.base_url,
            name,
            content,
            Arc::clone(&self.attributes),
        ))))
    }
}

fn read_attributes(handle: &ZipHandle) -> Result<PackageAttributes> {
    Ok(handle
        .read_entry(MANIFEST_NAME)?
        .map(|content| parse_main_attributes(&content))
        .unwrap_or_default())
}

impl Loader for JarLoader {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn index(&self) -> usize {
        self.index
    }

    fn root(&self) -> &Path {
        &self.canonical_path
    }

    fn get_resource(&self, name: &str) -> Option<Box<dyn Resource>> {
        self.metrics.record_request();
        let name = normalize_name(name);

        if let Some(memory) = self.memory.as_ref() {
            let resource = memory.get_resource(name)?;
            self.metrics.record_preload_hit();
            return Some(Box::new(resource));
        }

        match self.lookup(name) {
            Ok(resource) => resource,
            Err(e) => {
                self.metrics.record_lookup_failure();
                error!(
                    path = %self.canonical_path.display(),
                    name,
                    error = %e,
                    "failed to resolve resource from archive"
                );
                None
            }
        }
    }

    fn build_data(&self) -> Result<LoaderData> {
        let handle = ZipHandle::open(&self.canonical_path, Arc::clone(&self.metrics))?;
        let mut data = LoaderData::new();
        for name in handle.entry_names() {
            data.add_resource_entry(name);
            data.add_name_entry(name);
        }
        Ok(data)
    }
}

impl fmt::Debug for JarLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JarLoader")
            .field("path", &self.canonical_path)
            .field("index", &self.index)
            .field("can_lock_file", &self.can_lock_file)
            .field("preloaded", &self.memory.is_some())
            .finish()
    }
}

impl fmt::Display for JarLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JarLoader [{}]", self.canonical_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::resource::Attribute;
    use crate::test_support::{temp_path, write_jar, write_jar_declaring_size};

    const MANIFEST: &[u8] =
        b"Manifest-Version: 1.0\nImplementation-Version: 1.2\nSpecification-Vendor: Acme\n\n";

    fn context() -> (LoaderContext, Arc<LoaderMetrics>) {
        let metrics = Arc::new(LoaderMetrics::new());
        let ctx = LoaderContext::with_metrics(LoaderConfig::default(), Arc::clone(&metrics));
        (ctx, metrics)
    }

    #[test]
    fn resolves_entries_with_manifest_attributes() -> anyhow::Result<()> {
        let jar = temp_path("lib.jar");
        write_jar(
            &jar,
            &[
                (MANIFEST_NAME, MANIFEST),
                ("pkg/A.class", b"0123456789abcdefg"),
            ],
        )?;
        let (ctx, _) = context();
        let loader = JarLoader::new(&jar, false, 0, false, &ctx)?;

        let res = loader.get_resource("pkg/A.class").expect("entry present");
        assert_eq!(res.bytes()?.len(), 17);
        assert_eq!(res.attribute(Attribute::ImplVersion), Some("1.2"));
        assert_eq!(res.attribute(Attribute::SpecVendor), Some("Acme"));
        assert!(res.url().starts_with("jar:file:"));
        assert!(res.url().ends_with("!/pkg/A.class"));
        assert!(loader.get_resource("pkg/B.class").is_none());
        assert!(loader.get_resource("/pkg/A.class").is_some());

        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn lockable_loader_opens_a_single_handle() -> anyhow::Result<()> {
        let jar = temp_path("locked.jar");
        write_jar(&jar, &[("pkg/A.class", b"A")])?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, true, 0, false, &ctx)?;
        assert!(loader.has_retained_handle());

        let first = loader.get_resource("pkg/A.class").unwrap().bytes()?.into_owned();
        for _ in 0..100 {
            let res = loader.get_resource("pkg/A.class").unwrap();
            assert_eq!(res.bytes()?.into_owned(), first);
        }
        assert_eq!(metrics.snapshot().handles_opened, 1);
        assert_eq!(metrics.snapshot().handles_closed, 0);

        drop(loader);
        assert_eq!(metrics.snapshot().handles_closed, 1);
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn unlocked_loader_never_retains_a_handle() -> anyhow::Result<()> {
        let jar = temp_path("unlocked.jar");
        write_jar(&jar, &[("pkg/A.class", b"A")])?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, false, 0, false, &ctx)?;
        assert!(!loader.has_retained_handle());
        let after_construct = metrics.snapshot();
        assert_eq!(after_construct.open_handles(), 0);

        loader.get_resource("pkg/A.class").unwrap();
        assert!(loader.get_resource("pkg/missing").is_none());
        let snap = metrics.snapshot();
        assert_eq!(snap.handles_opened, after_construct.handles_opened + 2);
        assert_eq!(snap.open_handles(), 0);
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn released_handle_reopens_on_next_lookup() -> anyhow::Result<()> {
        let jar = temp_path("release.jar");
        write_jar(&jar, &[("a.txt", b"a")])?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, true, 0, false, &ctx)?;

        assert!(loader.release_handle());
        assert!(!loader.has_retained_handle());
        assert_eq!(metrics.snapshot().open_handles(), 0);

        assert!(loader.get_resource("a.txt").is_some());
        assert!(loader.has_retained_handle());
        assert_eq!(metrics.snapshot().handles_opened, 2);
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn preloaded_loader_survives_archive_removal() -> anyhow::Result<()> {
        let jar = temp_path("preload.jar");
        write_jar(&jar, &[("pkg/A.class", b"AAA"), (MANIFEST_NAME, MANIFEST)])?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, false, 0, true, &ctx)?;
        assert!(loader.is_preloaded());

        std::fs::remove_file(&jar)?;
        let res = loader.get_resource("pkg/A.class").expect("served from memory");
        assert_eq!(&res.bytes()?[..], b"AAA");
        assert_eq!(res.attribute(Attribute::ImplVersion), Some("1.2"));
        assert!(loader.get_resource("pkg/B.class").is_none());
        let snap = metrics.snapshot();
        assert_eq!(snap.preload_hits, 1);
        assert_eq!(snap.lookup_failures, 0);
        Ok(())
    }

    #[test]
    fn preloaded_misses_never_reopen_the_archive() -> anyhow::Result<()> {
        let jar = temp_path("preload_miss.jar");
        write_jar(&jar, &[("pkg/", b""), ("pkg/A.class", b"A")])?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, true, 0, true, &ctx)?;
        assert!(loader.is_preloaded());
        assert!(!loader.has_retained_handle());
        let after_construct = metrics.snapshot();
        assert_eq!(after_construct.open_handles(), 0);

        for _ in 0..10 {
            assert!(loader.get_resource("pkg/Missing.class").is_none());
        }
        let dir = loader.get_resource("pkg/").expect("directory entry preloaded");
        assert!(dir.bytes()?.is_empty());

        let snap = metrics.snapshot();
        assert_eq!(snap.handles_opened, after_construct.handles_opened);
        assert_eq!(snap.lookup_failures, 0);
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn inflated_declared_size_is_served_as_real_content() -> anyhow::Result<()> {
        let jar = temp_path("zip64_lie.jar");
        write_jar_declaring_size(&jar, "pkg/A.class", b"0123456789", 1 << 62)?;
        let (ctx, metrics) = context();

        let loader = JarLoader::new(&jar, false, 0, false, &ctx)?;
        let res = loader.get_resource("pkg/A.class").expect("entry present");
        assert_eq!(&res.bytes()?[..], b"0123456789");
        assert_eq!(res.content_length(), Some(10));

        let preloaded = JarLoader::new(&jar, true, 1, true, &ctx)?;
        assert!(!preloaded.is_preloaded());
        assert_eq!(
            &preloaded.get_resource("pkg/A.class").expect("entry present").bytes()?[..],
            b"0123456789"
        );
        assert_eq!(metrics.snapshot().lookup_failures, 0);
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn lookup_failure_after_removal_degrades_to_miss() -> anyhow::Result<()> {
        let jar = temp_path("vanishing.jar");
        write_jar(&jar, &[("a.txt", b"a")])?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, false, 0, false, &ctx)?;

        std::fs::remove_file(&jar)?;
        assert!(loader.get_resource("a.txt").is_none());
        assert_eq!(metrics.snapshot().lookup_failures, 1);
        assert!(loader.build_data().is_err());
        Ok(())
    }

    #[test]
    fn build_data_indexes_every_entry_and_closes_its_handle() -> anyhow::Result<()> {
        let jar = temp_path("index.jar");
        write_jar(&jar, &[("pkg/", b""), ("pkg/A.class", b"A"), ("top.txt", b"t")])?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, true, 3, false, &ctx)?;
        let before = metrics.snapshot();

        let data = loader.build_data()?;
        assert!(data.contains_name("pkg/A.class"));
        assert!(data.contains_name("top.txt"));
        assert!(data.contains_package("pkg"));
        assert_eq!(loader.index(), 3);

        let after = metrics.snapshot();
        assert_eq!(after.handles_opened, before.handles_opened + 1);
        assert_eq!(after.open_handles(), before.open_handles());
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn construction_fails_for_unreadable_archive() -> anyhow::Result<()> {
        let path = temp_path("garbage.jar");
        std::fs::write(&path, b"not a zip")?;
        let (ctx, _) = context();
        assert!(JarLoader::new(&path, true, 0, false, &ctx).is_err());
        assert!(JarLoader::new(&temp_path("absent.jar"), false, 0, false, &ctx).is_err());
        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn concurrent_lookups_share_one_handle() -> anyhow::Result<()> {
        let jar = temp_path("concurrent.jar");
        let entries: Vec<(String, Vec<u8>)> = (0..32)
            .map(|i| (format!("pkg/C{i}.class"), format!("class {i}").into_bytes()))
            .collect();
        let borrowed: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(n, c)| (n.as_str(), c.as_slice()))
            .collect();
        write_jar(&jar, &borrowed)?;
        let (ctx, metrics) = context();
        let loader = JarLoader::new(&jar, true, 0, false, &ctx)?;

        std::thread::scope(|s| {
            for t in 0..8 {
                let loader = &loader;
                s.spawn(move || {
                    for i in 0..32 {
                        let n = (i + t) % 32;
                        let res = loader.get_resource(&format!("pkg/C{n}.class")).unwrap();
                        assert_eq!(res.bytes().unwrap().into_owned(), format!("class {n}").into_bytes());
                    }
                });
            }
        });

        assert_eq!(metrics.snapshot().handles_opened, 1);
        std::fs::remove_file(jar)?;
        Ok(())
    }
}
