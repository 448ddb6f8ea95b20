use super::Purge;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    record: SessionRecord,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<(UserId, DeviceId), Entry>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(
        &self,
        user_id: UserId,
        device_id: &DeviceId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let key = (user_id, device_id.clone());
        let now = Instant::now();
        if let Some(entry) = self.entries.get(&key) {
            if entry.expires_at > now {
                return Ok(Some(entry.record.clone()));
            }
        }
        self.entries.remove_if(&key, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn put(
        &self,
        user_id: UserId,
        device_id: &DeviceId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            (user_id, device_id.clone()),
            Entry {
                record: record.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, user_id: UserId, device_id: &DeviceId) -> Result<(), StoreError> {
        self.entries.remove(&(user_id, device_id.clone()));
        Ok(())
    }

    async fn delete_all(&self, user_id: UserId) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|(owner, _), entry| {
            if *owner != user_id {
                return true;
            }
            if entry.expires_at > now {
                removed += 1;
            }
            false
        });
        Ok(removed)
    }
}

impl Purge for MemorySessionStore {
    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}
