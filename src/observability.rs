//! Metrics hooks.

use std::time::Duration;

/// Receives cache outcomes. Every method defaults to a no-op.
pub trait CacheMetrics: Send + Sync {
    /// A lookup was served from the store.
    fn record_hit(&self, _key: &str, _duration: Duration) {}

    /// A lookup fell through to the executor.
    fn record_miss(&self, _key: &str, _duration: Duration) {}

    /// A store or collaborator failure was absorbed.
    fn record_error(&self, _key: &str, _error: &str) {}

    /// A scope's salt was bumped.
    fn record_invalidation(&self, _scope: &str) {}
}

/// Discards every measurement.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {}
