mod lockout_store_redis;
mod session_store_redis;

pub use lockout_store_redis::*;
pub use session_store_redis::*;

use crate::domain_port::StoreError;
use std::time::Duration;

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Redis rejects a zero expiry, so round up to one millisecond.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
