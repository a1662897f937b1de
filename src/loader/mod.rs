//! Classpath roots.
//!
//! A [`Loader`] serves resources from one root, either an archive
//! ([`JarLoader`]) or a directory ([`FileLoader`]). Loaders are immutable
//! once built and are shared across lookup threads.

mod file;
mod jar;
mod memory;

pub use file::FileLoader;
pub use jar::JarLoader;
pub use memory::JarMemoryLoader;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::LoaderData;
use crate::context::LoaderContext;
use crate::error::{LoaderError, Result};
use crate::resource::Resource;

pub trait Loader: fmt::Debug + Send + Sync {
    /// Provenance stamped onto every resource this root returns.
    fn base_url(&self) -> &str;

    /// Position in the owning classpath. Lower indices shadow higher ones.
    fn index(&self) -> usize;

    fn root(&self) -> &Path;

    /// Resolves `name`. Failures are logged and reported as a miss.
    fn get_resource(&self, name: &str) -> Option<Box<dyn Resource>>;

    /// Enumerates the root into a fresh name index.
    fn build_data(&self) -> Result<LoaderData>;
}

/// How one root should be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub path: PathBuf,
    /// The root will not change while this process runs, so its handle may be retained.
    pub can_lock_file: bool,
    pub preload: bool,
}

impl RootSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            can_lock_file: false,
            preload: false,
        }
    }

    pub fn locked(mut self, can_lock_file: bool) -> Self {
        self.can_lock_file = can_lock_file;
        self
    }

    pub fn preloaded(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    /// Accepts plain paths and `file:`/`jar:file:` URLs.
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(url_to_path(url)?))
    }
}

pub fn url_to_path(url: &str) -> Result<PathBuf> {
    let mut rest = url.trim();
    rest = rest.trim_matches('"');
    if let Some(inner) = rest.strip_prefix("jar:") {
        rest = inner.strip_suffix("!/").unwrap_or(inner);
    }
    if let Some(local) = rest.strip_prefix("file://") {
        rest = local.strip_prefix("localhost").unwrap_or(local);
    } else if let Some(local) = rest.strip_prefix("file:") {
        rest = local;
    } else if has_url_scheme(rest) {
        return Err(LoaderError::InvalidRoot(url.to_string()));
    }
    if rest.is_empty() {
        return Err(LoaderError::InvalidRoot(url.to_string()));
    }
    Ok(PathBuf::from(percent_decode(rest)))
}

fn has_url_scheme(s: &str) -> bool {
    match s.split_once(':') {
        // single letters are windows drive prefixes
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2]))
        {
            out.push(hi << 4 | lo);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

pub(crate) fn canonicalize(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|source| LoaderError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn path_to_url_path(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') { s } else { format!("/{s}") }
}

/// Builds the loader matching the root's kind.
pub fn create_loader(spec: &RootSpec, index: usize, ctx: &LoaderContext) -> Result<Box<dyn Loader>> {
    let canonical = canonicalize(&spec.path)?;
    if canonical.is_dir() {
        return Ok(Box::new(FileLoader::new(&canonical, index, ctx)?));
    }
    if canonical.is_file() {
        return Ok(Box::new(JarLoader::new(
            &canonical,
            spec.can_lock_file,
            index,
            spec.preload,
            ctx,
        )?));
    }
    Err(LoaderError::NotAnArchive(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_to_path_accepts_file_and_jar_urls() -> Result<()> {
        assert_eq!(url_to_path("file:/tmp/lib.jar")?, PathBuf::from("/tmp/lib.jar"));
        assert_eq!(url_to_path("file:///tmp/lib.jar")?, PathBuf::from("/tmp/lib.jar"));
        assert_eq!(
            url_to_path("jar:file:/tmp/my%20lib.jar!/")?,
            PathBuf::from("/tmp/my lib.jar")
        );
        assert_eq!(url_to_path("\"/tmp/q.jar\"")?, PathBuf::from("/tmp/q.jar"));
        assert_eq!(url_to_path("lib/a.jar")?, PathBuf::from("lib/a.jar"));
        Ok(())
    }

    #[test]
    fn url_to_path_rejects_remote_schemes() {
        assert!(matches!(
            url_to_path("https://example.com/a.jar"),
            Err(LoaderError::InvalidRoot(_))
        ));
        assert!(url_to_path("file:").is_err());
    }

    #[test]
    fn create_loader_fails_for_missing_root() {
        let ctx = LoaderContext::default();
        let spec = RootSpec::new("/definitely/not/here.jar");
        let err = create_loader(&spec, 0, &ctx).unwrap_err();
        assert!(matches!(err, LoaderError::Canonicalize { .. }));
    }
}
