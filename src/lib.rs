//! # classpath-loader
//!
//! Resolves named resources (class files, metadata) from an ordered list of
//! JAR archives and directories, at the call volume of a running class loader.
//!
//! ## Architecture
//!
//! - **resource**: resolved artifacts and their package attributes
//! - **manifest**: package attribute extraction from `META-INF/MANIFEST.MF`
//! - **archive**: memory-mapped archive handles and the bounded handle pool
//! - **loader**: one classpath root each; archives, preloaded archives, directories
//! - **cache**: name and package index used to skip roots that cannot match
//! - **classpath**: ordered lookup across roots with first-hit shadowing
//! - **metrics**: process-wide handle and lookup counters
//! - **config**: preload and handle limits from defaults, env and CLI
//! - **scan**: archive discovery in library directories

pub mod archive;
pub mod cache;
pub mod classpath;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod metrics;
pub mod resource;
pub mod scan;

#[cfg(test)]
mod test_support;

pub use cache::{ClasspathCache, LoaderData};
pub use classpath::{Classpath, IndexStatus};
pub use config::LoaderConfig;
pub use context::LoaderContext;
pub use error::{LoaderError, Result};
pub use loader::{FileLoader, JarLoader, JarMemoryLoader, Loader, RootSpec, create_loader};
pub use metrics::{LoaderMetrics, MetricsSnapshot};
pub use resource::{Attribute, FileResource, MemoryResource, PackageAttributes, Resource};
