use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

/// Ephemeral `(user, device)` session records. Every method is atomic per key
/// and last-write-wins.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(
        &self,
        user_id: UserId,
        device_id: &DeviceId,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Replace the record for the pair and restart its TTL.
    async fn put(
        &self,
        user_id: UserId,
        device_id: &DeviceId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Deleting an absent record is not an error.
    async fn delete(&self, user_id: UserId, device_id: &DeviceId) -> Result<(), StoreError>;

    /// Drop every device session of the user. Returns how many were removed.
    async fn delete_all(&self, user_id: UserId) -> Result<usize, StoreError>;
}
