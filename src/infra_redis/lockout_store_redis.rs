use super::{ttl_millis, unavailable};
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

const RECORD_FAILURE: &str = include_str!("lockout_record_failure.lua");

pub struct RedisLockoutStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisLockoutStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisLockoutStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, identifier: &str) -> String {
        format!("{}:lockout:{}", self.prefix, identifier)
    }
}

#[async_trait::async_trait]
impl LockoutStore for RedisLockoutStore {
    async fn failures(&self, identifier: &str) -> Result<u32, StoreError> {
        let key = self.key(identifier);
        let mut conn = self.conn.clone();
        let count: Option<u32> = conn.get(&key).await.map_err(unavailable)?;
        Ok(count.unwrap_or(0))
    }

    async fn record_failure(
        &self,
        identifier: &str,
        window: Duration,
    ) -> Result<u32, StoreError> {
        let key = self.key(identifier);
        let mut conn = self.conn.clone();
        let script = Script::new(RECORD_FAILURE);
        let count: i64 = script
            .key(&key)
            .arg(ttl_millis(window))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        u32::try_from(count).map_err(|_| StoreError::Corrupt(format!("{}: {}", key, count)))
    }

    async fn clear(&self, identifier: &str) -> Result<(), StoreError> {
        let key = self.key(identifier);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await.map_err(unavailable)?;
        Ok(())
    }
}
