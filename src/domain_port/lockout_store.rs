use super::StoreError;
use std::time::Duration;

/// Failed-attempt counters keyed by login identifier.
#[async_trait::async_trait]
pub trait LockoutStore: Send + Sync {
    /// Current failure count, 0 when no record is live.
    async fn failures(&self, identifier: &str) -> Result<u32, StoreError>;

    /// Increment the counter. The first failure creates the record with `window`
    /// as its lifetime; later failures do not extend it.
    async fn record_failure(&self, identifier: &str, window: Duration)
    -> Result<u32, StoreError>;

    async fn clear(&self, identifier: &str) -> Result<(), StoreError>;
}
