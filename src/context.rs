use std::sync::Arc;

use crate::archive::HandlePool;
use crate::config::LoaderConfig;
use crate::metrics::LoaderMetrics;

/// Shared state every loader of one classpath is built against.
#[derive(Debug, Clone)]
pub struct LoaderContext {
    config: LoaderConfig,
    metrics: Arc<LoaderMetrics>,
    handles: Arc<HandlePool>,
}

impl LoaderContext {
    /// A context reporting into the process-wide metrics.
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_metrics(config, LoaderMetrics::global())
    }

    pub fn with_metrics(config: LoaderConfig, metrics: Arc<LoaderMetrics>) -> Self {
        let handles = Arc::new(HandlePool::new(
            config.max_open_handles,
            Arc::clone(&metrics),
        ));
        Self {
            config,
            metrics,
            handles,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<LoaderMetrics> {
        &self.metrics
    }

    pub fn handles(&self) -> &Arc<HandlePool> {
        &self.handles
    }
}

impl Default for LoaderContext {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}
