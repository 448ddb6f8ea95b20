use crate::application_port::AuthError;
use crate::domain_port::LockoutStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Failures inside one window that lock the identifier.
    pub threshold: u32,
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Per-identifier failed-login counter. Counters race last-write-wins across
/// replicas, so this bounds guessing rather than rate limiting exactly.
pub struct BruteForceGuard {
    store: Arc<dyn LockoutStore>,
    policy: LockoutPolicy,
}

impl BruteForceGuard {
    pub fn new(store: Arc<dyn LockoutStore>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    /// Run before the credential comparison; never increments.
    pub async fn check(&self, identifier: &str) -> Result<(), AuthError> {
        let failures = self.store.failures(identifier).await?;
        if failures >= self.policy.threshold {
            warn!(identifier, failures, "login attempt while locked out");
            return Err(AuthError::LockedOut);
        }
        Ok(())
    }

    /// Run only after a credential check has actually failed.
    pub async fn record_failure(&self, identifier: &str) -> Result<u32, AuthError> {
        let failures = self
            .store
            .record_failure(identifier, self.policy.window)
            .await?;
        if failures == self.policy.threshold {
            warn!(
                identifier,
                failures,
                window_secs = self.policy.window.as_secs(),
                "identifier locked out"
            );
        }
        Ok(failures)
    }

    pub async fn reset(&self, identifier: &str) -> Result<(), AuthError> {
        self.store.clear(identifier).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryLockoutStore;

    fn guard() -> BruteForceGuard {
        BruteForceGuard::new(Arc::new(MemoryLockoutStore::new()), LockoutPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn locks_at_threshold_until_window_elapses() {
        let guard = guard();
        for attempt in 1..=5 {
            guard.check("a@x").await.unwrap();
            assert_eq!(guard.record_failure("a@x").await.unwrap(), attempt);
        }
        assert!(matches!(guard.check("a@x").await, Err(AuthError::LockedOut)));
        assert!(guard.check("b@x").await.is_ok());

        tokio::time::advance(Duration::from_secs(15 * 60 + 1)).await;
        assert!(guard.check("a@x").await.is_ok());
    }

    #[tokio::test]
    async fn check_alone_never_counts() {
        let guard = guard();
        for _ in 0..20 {
            guard.check("a@x").await.unwrap();
        }
        assert_eq!(guard.record_failure("a@x").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_clears_the_counter() {
        let guard = guard();
        for _ in 0..4 {
            guard.record_failure("a@x").await.unwrap();
        }
        guard.reset("a@x").await.unwrap();
        for _ in 0..4 {
            guard.record_failure("a@x").await.unwrap();
        }
        assert!(guard.check("a@x").await.is_ok());
    }
}
