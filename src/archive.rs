//! Memory-mapped archive handles and the bounded pool that retains them.
//!
//! A [`ZipHandle`] is the expensive native resource: an open file mapped into
//! memory plus the parsed central directory. Cloning the inner archive is
//! cheap (the mapping and directory are shared), so concurrent lookups read
//! through their own clone without locking.
//!
//! Lockable roots keep their handle in a [`HandleSlot`]. The [`HandlePool`]
//! tracks all slots of a context and clears the least recently used ones when
//! more than `max_open_handles` are retained. A cleared slot reopens on its
//! next use; lookups already holding the old `Arc` finish undisturbed.

use arc_swap::ArcSwapOption;
use memmap2::Mmap;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{LoaderError, Result};
use crate::metrics::LoaderMetrics;
use crate::resource::read_declared;

#[derive(Clone)]
pub struct SharedMmap(Arc<Mmap>);

impl AsRef<[u8]> for SharedMmap {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

pub type MappedArchive = ZipArchive<Cursor<SharedMmap>>;

pub struct ZipHandle {
    path: PathBuf,
    archive: MappedArchive,
    metrics: Arc<LoaderMetrics>,
}

impl ZipHandle {
    pub fn open(path: &Path, metrics: Arc<LoaderMetrics>) -> Result<Self> {
        let started = Instant::now();
        let file = File::open(path).map_err(|source| LoaderError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        // SAFETY: The file is opened read-only. Callers only retain a mapping
        // across lookups for roots declared immutable for the process lifetime.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| LoaderError::Map {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = ZipArchive::new(Cursor::new(SharedMmap(Arc::new(mmap))))
            .map_err(|e| LoaderError::archive(path, e))?;

        metrics.record_open(started.elapsed());
        debug!(path = %path.display(), entries = archive.len(), "opened archive handle");

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            metrics,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// A private reader over the shared mapping.
    pub fn reader(&self) -> MappedArchive {
        self.archive.clone()
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.archive.file_names()
    }

    /// Reads one entry fully. `Ok(None)` when the archive has no such entry.
    pub fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = self.reader();
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(LoaderError::archive(&self.path, e)),
        };
        let declared = entry.size();
        let content =
            read_declared(&mut entry, declared).map_err(|e| LoaderError::read(&self.path, name, e))?;
        Ok(Some(content))
    }
}

impl std::fmt::Debug for ZipHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipHandle")
            .field("path", &self.path)
            .field("entries", &self.archive.len())
            .finish()
    }
}

impl Drop for ZipHandle {
    fn drop(&mut self) {
        self.metrics.record_close();
        debug!(path = %self.path.display(), "closed archive handle");
    }
}

/// The retained handle of one lockable root.
#[derive(Debug)]
pub struct HandleSlot {
    path: PathBuf,
    cached: ArcSwapOption<ZipHandle>,
    open_lock: Mutex<()>,
    last_used: AtomicU64,
}

impl HandleSlot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.cached.load().is_some()
    }

    fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    /// Drops the retained handle. Returns whether one was retained.
    pub fn clear(&self) -> bool {
        let _guard = self.open_lock.lock();
        self.cached.swap(None).is_some()
    }
}

#[derive(Debug)]
pub struct HandlePool {
    max_open: usize,
    clock: AtomicU64,
    slots: Mutex<Vec<Weak<HandleSlot>>>,
    metrics: Arc<LoaderMetrics>,
}

impl HandlePool {
    pub fn new(max_open: usize, metrics: Arc<LoaderMetrics>) -> Self {
        Self {
            max_open,
            clock: AtomicU64::new(0),
            slots: Mutex::new(Vec::new()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<LoaderMetrics> {
        &self.metrics
    }

    pub fn register(&self, path: &Path) -> Arc<HandleSlot> {
        let slot = Arc::new(HandleSlot {
            path: path.to_path_buf(),
            cached: ArcSwapOption::empty(),
            open_lock: Mutex::new(()),
            last_used: AtomicU64::new(0),
        });
        let mut slots = self.slots.lock();
        slots.retain(|w| w.strong_count() > 0);
        slots.push(Arc::downgrade(&slot));
        slot
    }

    /// Returns the slot's handle, opening and publishing a fresh one if needed.
    pub fn acquire(&self, slot: &HandleSlot) -> Result<Arc<ZipHandle>> {
        if let Some(handle) = slot.cached.load_full() {
            self.touch(slot);
            return Ok(handle);
        }

        let handle = {
            let _guard = slot.open_lock.lock();
            // another thread may have reopened it while we waited
            if let Some(handle) = slot.cached.load_full() {
                self.touch(slot);
                return Ok(handle);
            }
            let handle = Arc::new(ZipHandle::open(&slot.path, Arc::clone(&self.metrics))?);
            slot.cached.store(Some(Arc::clone(&handle)));
            self.touch(slot);
            handle
        };

        self.enforce_cap(slot);
        Ok(handle)
    }

    /// Publishes an already opened handle as the slot's retained one.
    pub fn adopt(&self, slot: &HandleSlot, handle: ZipHandle) -> Arc<ZipHandle> {
        let handle = Arc::new(handle);
        {
            let _guard = slot.open_lock.lock();
            slot.cached.store(Some(Arc::clone(&handle)));
            self.touch(slot);
        }
        self.enforce_cap(slot);
        handle
    }

    pub fn open_count(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| s.is_open())
            .count()
    }

    fn touch(&self, slot: &HandleSlot) {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        slot.last_used.store(tick, Ordering::Relaxed);
    }

    fn enforce_cap(&self, keep: &HandleSlot) {
        if self.max_open == 0 {
            return;
        }

        let mut slots = self.slots.lock();
        slots.retain(|w| w.strong_count() > 0);
        let mut open: Vec<Arc<HandleSlot>> = slots
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| s.is_open())
            .collect();

        while open.len() > self.max_open {
            let victim = open
                .iter()
                .enumerate()
                .filter(|(_, s)| !std::ptr::eq(s.as_ref(), keep))
                .min_by_key(|(_, s)| s.last_used())
                .map(|(i, _)| i);
            let Some(victim) = victim else { break };
            let slot = open.swap_remove(victim);
            if slot.clear() {
                self.metrics.record_eviction();
                debug!(path = %slot.path.display(), "evicted retained archive handle");
            }
        }
    }
}
