use ignore::WalkBuilder;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::error;

use super::{Loader, canonicalize, path_to_url_path};
use crate::cache::{LoaderData, normalize_name};
use crate::context::LoaderContext;
use crate::error::{LoaderError, Result};
use crate::metrics::LoaderMetrics;
use crate::resource::{FileResource, Resource};

/// A classpath root backed by a plain directory.
#[derive(Debug)]
pub struct FileLoader {
    base_url: String,
    index: usize,
    root: PathBuf,
    metrics: Arc<LoaderMetrics>,
}

impl FileLoader {
    pub fn new(path: &Path, index: usize, ctx: &LoaderContext) -> Result<Self> {
        let root = canonicalize(path)?;
        if !root.is_dir() {
            return Err(LoaderError::InvalidRoot(root.display().to_string()));
        }
        let mut base_url = format!("file:{}", path_to_url_path(&root));
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            base_url,
            index,
            root,
            metrics: Arc::clone(ctx.metrics()),
        })
    }
}

/// Rejects names that would escape the root.
fn is_contained(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

impl Loader for FileLoader {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn index(&self) -> usize {
        self.index
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn get_resource(&self, name: &str) -> Option<Box<dyn Resource>> {
        self.metrics.record_request();
        let name = normalize_name(name);
        if name.is_empty() || !is_contained(name) {
            return None;
        }

        let path = self.root.join(name);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Some(Box::new(FileResource::new(
                &self.base_url,
                name,
                path,
                Some(meta.len()),
            ))),
            Ok(_) => None,
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                self.metrics.record_lookup_failure();
                error!(
                    path = %self.root.display(),
                    name,
                    error = %e,
                    "failed to resolve resource from directory"
                );
                None
            }
        }
    }

    fn build_data(&self) -> Result<LoaderData> {
        if !self.root.is_dir() {
            return Err(LoaderError::Walk {
                path: self.root.clone(),
                reason: "root directory is missing".to_string(),
            });
        }

        // get_resource follows links, so the index must too
        let walker = WalkBuilder::new(&self.root)
            .follow_links(true)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .build();

        let mut data = LoaderData::new();
        for entry in walker {
            // a partial index could hide names this root serves
            let entry = entry.map_err(|e| LoaderError::Walk {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;
            let Some(mut name) = relative_name(&self.root, entry.path()) else {
                continue;
            };
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                name.push('/');
            }
            data.add_resource_entry(&name);
            data.add_name_entry(&name);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::test_support::temp_path;

    fn make_root() -> anyhow::Result<PathBuf> {
        let root = temp_path("dir_root");
        std::fs::create_dir_all(root.join("pkg/sub"))?;
        std::fs::write(root.join("pkg/A.class"), b"dirA")?;
        std::fs::write(root.join("pkg/sub/B.class"), b"dirB")?;
        std::fs::write(root.join(".hidden"), b"h")?;
        Ok(root)
    }

    fn context() -> LoaderContext {
        LoaderContext::with_metrics(LoaderConfig::default(), Arc::new(LoaderMetrics::new()))
    }

    #[test]
    fn resolves_files_under_the_root() -> anyhow::Result<()> {
        let root = make_root()?;
        let loader = FileLoader::new(&root, 1, &context())?;

        let res = loader.get_resource("pkg/A.class").expect("file present");
        assert_eq!(&res.bytes()?[..], b"dirA");
        assert_eq!(res.content_length(), Some(4));
        assert!(res.url().starts_with("file:/"));
        assert!(res.url().ends_with("/pkg/A.class"));

        assert!(loader.get_resource("pkg/Missing.class").is_none());
        assert!(loader.get_resource("pkg/sub").is_none());
        assert!(loader.get_resource("../escape.txt").is_none());
        std::fs::remove_dir_all(root)?;
        Ok(())
    }

    #[test]
    fn build_data_walks_the_whole_tree() -> anyhow::Result<()> {
        let root = make_root()?;
        let loader = FileLoader::new(&root, 0, &context())?;
        let data = loader.build_data()?;

        assert!(data.contains_name("pkg/A.class"));
        assert!(data.contains_name("pkg/sub/B.class"));
        assert!(data.contains_name(".hidden"));
        assert!(data.contains_name("pkg/sub/"));
        assert!(data.contains_package("pkg/sub"));

        std::fs::remove_dir_all(&root)?;
        assert!(loader.build_data().is_err());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn build_data_follows_symlinked_directories() -> anyhow::Result<()> {
        let real = temp_path("link_target");
        std::fs::create_dir_all(real.join("pkg"))?;
        std::fs::write(real.join("pkg/A.class"), b"linked")?;
        let root = temp_path("link_root");
        std::fs::create_dir_all(&root)?;
        std::os::unix::fs::symlink(real.join("pkg"), root.join("pkg"))?;

        let loader = FileLoader::new(&root, 0, &context())?;
        let data = loader.build_data()?;
        assert!(data.contains_name("pkg/A.class"));
        assert!(data.contains_package("pkg"));
        assert_eq!(&loader.get_resource("pkg/A.class").unwrap().bytes()?[..], b"linked");

        std::fs::remove_dir_all(root)?;
        std::fs::remove_dir_all(real)?;
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn build_data_fails_instead_of_returning_a_partial_index() -> anyhow::Result<()> {
        let root = make_root()?;
        std::os::unix::fs::symlink(&root, root.join("pkg/loop"))?;

        let loader = FileLoader::new(&root, 0, &context())?;
        let err = loader.build_data().unwrap_err();
        assert!(matches!(err, LoaderError::Walk { .. }));
        assert!(loader.get_resource("pkg/A.class").is_some());

        std::fs::remove_dir_all(root)?;
        Ok(())
    }

    #[test]
    fn rejects_non_directory_roots() -> anyhow::Result<()> {
        let file = temp_path("plain.txt");
        std::fs::write(&file, b"x")?;
        assert!(FileLoader::new(&file, 0, &context()).is_err());
        std::fs::remove_file(file)?;
        Ok(())
    }
}
