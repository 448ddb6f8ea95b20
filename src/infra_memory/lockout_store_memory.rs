use super::Purge;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

struct Counter {
    failures: u32,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryLockoutStore {
    counters: DashMap<String, Counter>,
}

impl MemoryLockoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LockoutStore for MemoryLockoutStore {
    async fn failures(&self, identifier: &str) -> Result<u32, StoreError> {
        let now = Instant::now();
        Ok(self
            .counters
            .get(identifier)
            .filter(|c| c.expires_at > now)
            .map(|c| c.failures)
            .unwrap_or(0))
    }

    async fn record_failure(
        &self,
        identifier: &str,
        window: Duration,
    ) -> Result<u32, StoreError> {
        let now = Instant::now();
        let fresh = Counter {
            failures: 1,
            expires_at: now + window,
        };
        let failures = match self.counters.entry(identifier.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                if counter.expires_at > now {
                    counter.failures += 1;
                } else {
                    *counter = fresh;
                }
                counter.failures
            }
            Entry::Vacant(vacant) => vacant.insert(fresh).failures,
        };
        Ok(failures)
    }

    async fn clear(&self, identifier: &str) -> Result<(), StoreError> {
        self.counters.remove(identifier);
        Ok(())
    }
}

impl Purge for MemoryLockoutStore {
    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, c| c.expires_at > now);
        before.saturating_sub(self.counters.len())
    }
}
