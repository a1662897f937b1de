//! Error types for classpath loading.
//!
//! Only construction and explicit index builds return these. Lookups swallow
//! failures after logging them and report a miss instead.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoaderError>;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to canonicalize classpath root {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to mmap archive {path}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read zip structure of {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read entry {name} from {path}: {source}")]
    Read {
        path: PathBuf,
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk directory root {path}: {reason}")]
    Walk { path: PathBuf, reason: String },

    #[error("Not an archive or directory: {0}")]
    NotAnArchive(PathBuf),

    #[error("Invalid classpath root: {0}")]
    InvalidRoot(String),
}

impl LoaderError {
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, name: &str, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            name: name.to_string(),
            source,
        }
    }
}
