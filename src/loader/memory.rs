use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::archive::ZipHandle;
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::resource::{MemoryResource, PackageAttributes};

/// Every entry of a small archive, read into memory once.
///
/// Directory entries are kept with empty content so lookups answer the same
/// as they would against the archive.
///
/// Never revalidated against the archive after construction.
#[derive(Debug)]
pub struct JarMemoryLoader {
    resources: HashMap<String, MemoryResource>,
    total_bytes: u64,
}

impl JarMemoryLoader {
    /// Reads the whole archive, or returns `Ok(None)` when it exceeds the preload limits.
    pub fn load(
        handle: &ZipHandle,
        base_url: &str,
        attributes: &Arc<PackageAttributes>,
        config: &LoaderConfig,
    ) -> Result<Option<Self>> {
        if handle.len() > config.preload_max_entries {
            debug!(
                path = %handle.path().display(),
                entries = handle.len(),
                "archive has too many entries to preload"
            );
            return Ok(None);
        }

        let mut archive = handle.reader();
        let mut total_bytes = 0u64;
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|e| LoaderError::archive(handle.path(), e))?;
            total_bytes = total_bytes.saturating_add(entry.size());
        }
        if total_bytes > config.preload_max_bytes {
            debug!(
                path = %handle.path().display(),
                total_bytes,
                "archive too large to preload"
            );
            return Ok(None);
        }

        let mut resources = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| LoaderError::archive(handle.path(), e))?;
            let name = entry.name().to_string();
            let size = entry.size();
            let resource =
                MemoryResource::load(base_url, &name, &mut entry, size, Arc::clone(attributes))
                    .map_err(|e| LoaderError::read(handle.path(), &name, e))?;
            resources.insert(name, resource);
        }

        debug!(
            path = %handle.path().display(),
            entries = resources.len(),
            total_bytes,
            "preloaded archive into memory"
        );
        Ok(Some(Self {
            resources,
            total_bytes,
        }))
    }

    pub fn get_resource(&self, name: &str) -> Option<MemoryResource> {
        self.resources.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
