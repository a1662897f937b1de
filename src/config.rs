use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cli::Cli;
use crate::loader::RootSpec;
use crate::scan::scan_archives;

pub const PRELOAD_MAX_BYTES_ENV: &str = "CLASSPATH_PRELOAD_MAX_BYTES";
pub const PRELOAD_MAX_ENTRIES_ENV: &str = "CLASSPATH_PRELOAD_MAX_ENTRIES";
pub const MAX_OPEN_HANDLES_ENV: &str = "CLASSPATH_MAX_OPEN_HANDLES";
pub const LOG_ENV: &str = "CLASSPATH_LOG";

const DEFAULT_PRELOAD_MAX_BYTES: u64 = 4 * 1024 * 1024;
const DEFAULT_PRELOAD_MAX_ENTRIES: usize = 10_000;
const DEFAULT_MAX_OPEN_HANDLES: usize = 256;

/// Tunables shared by every loader built against one [`crate::LoaderContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Archives whose total uncompressed size exceeds this are never preloaded.
    pub preload_max_bytes: u64,
    /// Archives with more entries than this are never preloaded.
    pub preload_max_entries: usize,
    /// Cap on retained archive handles across all lockable roots. `0` disables eviction.
    pub max_open_handles: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            preload_max_bytes: DEFAULT_PRELOAD_MAX_BYTES,
            preload_max_entries: DEFAULT_PRELOAD_MAX_ENTRIES,
            max_open_handles: DEFAULT_MAX_OPEN_HANDLES,
        }
    }
}

impl LoaderConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = env_value(PRELOAD_MAX_BYTES_ENV)? {
            config.preload_max_bytes = v;
        }
        if let Some(v) = env_value(PRELOAD_MAX_ENTRIES_ENV)? {
            config.preload_max_entries = v;
        }
        if let Some(v) = env_value(MAX_OPEN_HANDLES_ENV)? {
            config.max_open_handles = v;
        }
        Ok(config)
    }
}

fn env_value<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => {
            let parsed = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {key}: {raw:?}"))?;
            Ok(Some(parsed))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {key}")),
    }
}

pub fn resolve_config(cli: &Cli) -> Result<LoaderConfig> {
    let mut config = LoaderConfig::from_env()?;
    if let Some(v) = cli.preload_max_bytes {
        config.preload_max_bytes = v;
    }
    if let Some(v) = cli.max_open_handles {
        config.max_open_handles = v;
    }
    Ok(config)
}

/// Expands `--cp` entries and `--lib` directories into ordered root specs.
///
/// `--cp` roots come first in the order given, followed by the archives of each
/// `--lib` directory in sorted order.
pub fn resolve_roots(cli: &Cli) -> Result<Vec<RootSpec>> {
    let mut paths: Vec<PathBuf> = Vec::new();

    if let Some(cp) = cli.classpath.as_deref() {
        for entry in env::split_paths(cp) {
            if entry.as_os_str().is_empty() {
                continue;
            }
            paths.push(entry);
        }
    }

    for dir in &cli.lib {
        let archives = scan_archives(dir)
            .with_context(|| format!("Failed to scan library directory: {}", dir.display()))?;
        paths.extend(archives);
    }

    if paths.is_empty() {
        anyhow::bail!("No classpath roots given. Use --cp or --lib");
    }

    Ok(paths
        .into_iter()
        .map(|path| RootSpec {
            path,
            can_lock_file: cli.lock,
            preload: cli.preload,
        })
        .collect())
}
