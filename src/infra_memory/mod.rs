//! Single-process backends. Entries expire lazily on read and are also purged by
//! a periodic sweeper so idle keys do not accumulate.

mod credential_repo_memory;
mod lockout_store_memory;
mod session_store_memory;

pub use credential_repo_memory::*;
pub use lockout_store_memory::*;
pub use session_store_memory::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub trait Purge: Send + Sync {
    /// Remove expired entries, returning how many were dropped.
    fn purge_expired(&self) -> usize;
}

pub fn spawn_sweeper(
    targets: Vec<Arc<dyn Purge>>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let purged: usize = targets.iter().map(|t| t.purge_expired()).sum();
                    if purged > 0 {
                        debug!(purged, "purged expired in-memory entries");
                    }
                }
            }
        }
        info!("in-memory sweeper stopped");
    })
}
