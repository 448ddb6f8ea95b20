use super::{ttl_millis, unavailable};
use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{
    AsyncCommands, FromRedisValue, RedisError, RedisResult, RedisWrite, ToRedisArgs, Value,
};
use std::time::Duration;

/// Records live at `{prefix}:session:{user}:{device}` as JSON. A per-user set at
/// `{prefix}:devices:{user}` lists device ids so all sessions can be dropped.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, user_id: UserId, device_id: &DeviceId) -> String {
        session_key(&self.prefix, user_id, device_id)
    }

    fn index_key(&self, user_id: UserId) -> String {
        format!("{}:devices:{}", self.prefix, user_id)
    }
}

fn session_key(prefix: &str, user_id: UserId, device_id: &DeviceId) -> String {
    // user ids contain no ':', so the split stays unambiguous
    format!("{}:session:{}:{}", prefix, user_id, device_id)
}

impl ToRedisArgs for DeviceId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.as_str().as_bytes())
    }
}

impl FromRedisValue for DeviceId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        DeviceId::parse(&s).map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid DeviceId string",
                e.to_string(),
            ))
        })
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(
        &self,
        user_id: UserId,
        device_id: &DeviceId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let key = self.key(user_id, device_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await.map_err(unavailable)?;
        raw.map(|json| {
            serde_json::from_str::<SessionRecord>(&json)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", key, e)))
        })
        .transpose()
    }

    async fn put(
        &self,
        user_id: UserId,
        device_id: &DeviceId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = self.key(user_id, device_id);
        let index = self.index_key(user_id);
        let json = serde_json::to_string(record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let ttl_ms = ttl_millis(ttl);
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .pset_ex(&key, json, ttl_ms)
            .ignore()
            .sadd(&index, device_id)
            .ignore()
            .pexpire(&index, ttl_ms as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn delete(&self, user_id: UserId, device_id: &DeviceId) -> Result<(), StoreError> {
        let key = self.key(user_id, device_id);
        let index = self.index_key(user_id);
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .srem(&index, device_id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn delete_all(&self, user_id: UserId) -> Result<usize, StoreError> {
        let index = self.index_key(user_id);
        let mut conn = self.conn.clone();
        let devices: Vec<DeviceId> = conn.smembers(&index).await.map_err(unavailable)?;
        if devices.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for device_id in &devices {
            pipe.del(self.key(user_id, device_id));
        }
        pipe.del(&index).ignore();
        let deleted: Vec<i64> = pipe.query_async(&mut conn).await.map_err(unavailable)?;
        Ok(deleted.into_iter().filter(|n| *n > 0).count())
    }
}
