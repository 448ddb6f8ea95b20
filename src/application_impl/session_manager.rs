//! Session lifecycle per `(user, device)`: NoSession -> Active -> (Rotated ->
//! Active) -> Revoked.
//!
//! The session store is the only shared state. Two refreshes racing on one
//! device both read the same record; whichever `put` lands last wins and the
//! other caller's refresh token stops matching, forcing a new login on that
//! device.

use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What to do when a presented refresh token does not match the stored digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Fail only the current call.
    #[default]
    FailDevice,
    /// Treat the mismatch as token theft and drop every session of the user.
    RevokeAllSessions,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Store TTL of a session record, restarted by login and rotation.
    pub session_ttl: Duration,
    /// A cached access token is reused only with at least this much life left.
    pub clock_skew: Duration,
    pub mismatch_policy: MismatchPolicy,
}

pub struct SessionManager {
    token_codec: Arc<dyn TokenCodec>,
    secret_hasher: Arc<dyn SecretHasher>,
    session_store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        secret_hasher: Arc<dyn SecretHasher>,
        session_store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            token_codec,
            secret_hasher,
            session_store,
            config,
        }
    }

    /// Open a session for an already verified principal, replacing whatever
    /// session the device had.
    pub async fn login(
        &self,
        principal: &Principal,
        device_id: &DeviceId,
    ) -> Result<AuthTokens, AuthError> {
        let user_id = principal.user_id;
        let access = self
            .token_codec
            .issue(TokenKind::Access, user_id, Some(&principal.email))?;
        let refresh = self.token_codec.issue(TokenKind::Refresh, user_id, None)?;

        self.persist(SessionRecord {
            user_id,
            device_id: device_id.clone(),
            hashed_refresh_token: self.secret_hasher.hash(&refresh.token),
            cached_access_token: access.token.clone(),
        })
        .await?;

        info!(%user_id, %device_id, "session opened");
        Ok(AuthTokens {
            user_id,
            access_token: AccessToken(access.token),
            refresh_token: RefreshToken(refresh.token),
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
        })
    }

    pub async fn refresh(
        &self,
        presented: &RefreshToken,
        device_id: &DeviceId,
    ) -> Result<AuthTokens, AuthError> {
        // The subject only selects which record to compare against; a forged
        // subject cannot produce the stored digest.
        let presented_claims = match self.token_codec.decode_unchecked(&presented.0) {
            Ok(claims) if claims.kind == TokenKind::Refresh => claims,
            _ => {
                debug!(%device_id, "refresh with unreadable or non-refresh token");
                return Err(AuthError::InvalidRefreshToken);
            }
        };
        let user_id = presented_claims.subject;

        let Some(record) = self.session_store.get(user_id, device_id).await? else {
            debug!(%user_id, %device_id, "refresh without live session");
            return Err(AuthError::InvalidRefreshToken);
        };

        if !self
            .secret_hasher
            .matches(&presented.0, &record.hashed_refresh_token)
        {
            return Err(self.on_mismatch(user_id, device_id).await);
        }

        let cached = self
            .token_codec
            .decode_unchecked(&record.cached_access_token)
            .ok();

        let refresh_live = presented_claims.expires_at > Utc::now();
        if let Some(cached) = cached
            .as_ref()
            .filter(|c| refresh_live && self.still_reusable(c))
        {
            debug!(%user_id, %device_id, "reusing cached access token");
            return Ok(AuthTokens {
                user_id,
                access_token: AccessToken(record.cached_access_token.clone()),
                refresh_token: presented.clone(),
                access_token_expires_at: cached.expires_at,
                refresh_token_expires_at: presented_claims.expires_at,
            });
        }

        let verified = self
            .token_codec
            .verify(TokenKind::Refresh, &presented.0)
            .map_err(|e| {
                warn!(%user_id, %device_id, error = %e, "refresh token rejected");
                AuthError::InvalidRefreshToken
            })?;
        if verified.subject != user_id {
            return Err(AuthError::InvalidRefreshToken);
        }

        let email = cached.and_then(|c| c.email);
        let access = self
            .token_codec
            .issue(TokenKind::Access, user_id, email.as_deref())?;
        let refresh = self.token_codec.issue(TokenKind::Refresh, user_id, None)?;

        self.persist(SessionRecord {
            user_id,
            device_id: device_id.clone(),
            hashed_refresh_token: self.secret_hasher.hash(&refresh.token),
            cached_access_token: access.token.clone(),
        })
        .await?;

        info!(%user_id, %device_id, "refresh token rotated");
        Ok(AuthTokens {
            user_id,
            access_token: AccessToken(access.token),
            refresh_token: RefreshToken(refresh.token),
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
        })
    }

    /// Idempotent.
    pub async fn logout(&self, user_id: UserId, device_id: &DeviceId) -> Result<(), AuthError> {
        let store = self.session_store.clone();
        let device = device_id.clone();
        tokio::spawn(async move { store.delete(user_id, &device).await })
            .await
            .map_err(|e| AuthError::InternalError(format!("session delete task failed: {}", e)))??;
        info!(%user_id, %device_id, "session closed");
        Ok(())
    }

    pub async fn revoke_all(&self, user_id: UserId) -> Result<usize, AuthError> {
        let removed = self.session_store.delete_all(user_id).await?;
        warn!(%user_id, removed, "all sessions revoked");
        Ok(removed)
    }

    /// Stateless: signature and expiry only, the store is not consulted.
    pub fn verify_access(&self, token: &AccessToken) -> Result<AccessIdentity, AuthError> {
        let claims = self.token_codec.verify(TokenKind::Access, &token.0)?;
        Ok(AccessIdentity {
            user_id: claims.subject,
            email: claims.email,
        })
    }

    fn still_reusable(&self, cached: &TokenClaims) -> bool {
        cached.kind == TokenKind::Access && cached.expires_at > Utc::now() + self.config.clock_skew
    }

    async fn on_mismatch(&self, user_id: UserId, device_id: &DeviceId) -> AuthError {
        warn!(%user_id, %device_id, "stale or reused refresh token");
        if self.config.mismatch_policy == MismatchPolicy::RevokeAllSessions {
            if let Err(e) = self.revoke_all(user_id).await {
                return e;
            }
        }
        AuthError::InvalidRefreshToken
    }

    /// The write runs on its own task so a caller that gives up after it was
    /// issued does not cancel it.
    async fn persist(&self, record: SessionRecord) -> Result<(), AuthError> {
        let store = self.session_store.clone();
        let ttl = self.config.session_ttl;
        let user_id = record.user_id;
        tokio::spawn(async move {
            store
                .put(record.user_id, &record.device_id, &record, ttl)
                .await
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("session write task failed: {}", e)))?
        .map_err(|e| {
            error!(%user_id, error = %e, "failed to persist session");
            AuthError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{
        JwtConfig, JwtHs256Codec, Sha256SecretHasher, SigningSecrets,
    };
    use crate::infra_memory::MemorySessionStore;

    struct Harness {
        manager: SessionManager,
        store: Arc<MemorySessionStore>,
        codec: Arc<JwtHs256Codec>,
    }

    fn jwt_config(access_ttl: Duration, refresh_ttl: Duration) -> JwtConfig {
        JwtConfig {
            issuer: "authgate.test".to_string(),
            audience: "api-client".to_string(),
            access_ttl,
            refresh_ttl,
            leeway: Duration::ZERO,
            secrets: SigningSecrets::Separate {
                access: b"test-access-secret".to_vec(),
                refresh: b"test-refresh-secret".to_vec(),
            },
        }
    }

    fn harness_with(jwt: JwtConfig, mismatch_policy: MismatchPolicy) -> Harness {
        let store = Arc::new(MemorySessionStore::new());
        let codec = Arc::new(JwtHs256Codec::new(jwt));
        let manager = SessionManager::new(
            codec.clone(),
            Arc::new(Sha256SecretHasher),
            store.clone(),
            SessionConfig {
                session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
                clock_skew: Duration::from_secs(5),
                mismatch_policy,
            },
        );
        Harness {
            manager,
            store,
            codec,
        }
    }

    fn harness() -> Harness {
        harness_with(
            jwt_config(Duration::from_secs(15 * 60), Duration::from_secs(7 * 24 * 60 * 60)),
            MismatchPolicy::FailDevice,
        )
    }

    /// Cached access tokens are never reusable, so every refresh rotates.
    fn rotating_harness() -> Harness {
        harness_with(
            jwt_config(Duration::ZERO, Duration::from_secs(7 * 24 * 60 * 60)),
            MismatchPolicy::FailDevice,
        )
    }

    fn principal() -> Principal {
        Principal {
            user_id: UserId::new_random(),
            email: "alice@example.com".to_string(),
        }
    }

    fn device(name: &str) -> DeviceId {
        DeviceId::parse(name).unwrap()
    }

    #[tokio::test]
    async fn login_stores_digest_of_returned_refresh_token() {
        let h = harness();
        let who = principal();
        let phone = device("phone");

        let tokens = h.manager.login(&who, &phone).await.unwrap();

        let claims = h
            .codec
            .verify(TokenKind::Access, &tokens.access_token.0)
            .unwrap();
        assert_eq!(claims.subject, who.user_id);
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));

        let record = h.store.get(who.user_id, &phone).await.unwrap().unwrap();
        assert_eq!(
            record.hashed_refresh_token,
            Sha256SecretHasher.hash(&tokens.refresh_token.0)
        );
        assert_ne!(record.hashed_refresh_token, tokens.refresh_token.0);
        assert_eq!(record.cached_access_token, tokens.access_token.0);
    }

    #[tokio::test]
    async fn fast_path_returns_identical_tokens_without_rewriting() {
        let h = harness();
        let who = principal();
        let dev = DeviceId::default();
        let login = h.manager.login(&who, &dev).await.unwrap();
        let stored_before = h.store.get(who.user_id, &dev).await.unwrap().unwrap();

        let first = h.manager.refresh(&login.refresh_token, &dev).await.unwrap();
        let second = h.manager.refresh(&login.refresh_token, &dev).await.unwrap();

        assert_eq!(first.access_token, login.access_token);
        assert_eq!(second.access_token, login.access_token);
        assert_eq!(second.refresh_token, login.refresh_token);
        let stored_after = h.store.get(who.user_id, &dev).await.unwrap().unwrap();
        assert_eq!(stored_after, stored_before);
    }

    #[tokio::test]
    async fn expired_cached_access_token_rotates_both_tokens() {
        let h = rotating_harness();
        let who = principal();
        let dev = device("tablet");
        let login = h.manager.login(&who, &dev).await.unwrap();

        let rotated = h.manager.refresh(&login.refresh_token, &dev).await.unwrap();

        assert_ne!(rotated.refresh_token, login.refresh_token);
        assert_ne!(rotated.access_token, login.access_token);
        let record = h.store.get(who.user_id, &dev).await.unwrap().unwrap();
        assert_eq!(
            record.hashed_refresh_token,
            Sha256SecretHasher.hash(&rotated.refresh_token.0)
        );
        // the display email survives rotation
        let claims = h.codec.decode_unchecked(&rotated.access_token.0).unwrap();
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));

        // the consumed token is now stale, the new one keeps working
        assert!(matches!(
            h.manager.refresh(&login.refresh_token, &dev).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(h.manager.refresh(&rotated.refresh_token, &dev).await.is_ok());
    }

    #[tokio::test]
    async fn mismatching_token_fails_even_with_a_valid_signature() {
        let h = harness();
        let who = principal();
        let dev = DeviceId::default();
        let old = h.manager.login(&who, &dev).await.unwrap();
        let current = h.manager.login(&who, &dev).await.unwrap();

        // signed by us, correct subject, unexpired, but superseded
        assert!(h.codec.verify(TokenKind::Refresh, &old.refresh_token.0).is_ok());
        assert!(matches!(
            h.manager.refresh(&old.refresh_token, &dev).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        // a mismatch must not disturb the live session
        assert!(h.manager.refresh(&current.refresh_token, &dev).await.is_ok());
    }

    #[tokio::test]
    async fn forged_token_for_a_live_session_is_rejected() {
        let h = harness();
        let who = principal();
        let dev = DeviceId::default();
        h.manager.login(&who, &dev).await.unwrap();

        let mut attacker_cfg = jwt_config(Duration::from_secs(60), Duration::from_secs(60));
        attacker_cfg.secrets = SigningSecrets::Shared(b"guessed".to_vec());
        let forged = JwtHs256Codec::new(attacker_cfg)
            .issue(TokenKind::Refresh, who.user_id, None)
            .unwrap();

        assert!(matches!(
            h.manager.refresh(&RefreshToken(forged.token), &dev).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn logout_makes_refresh_fail_for_that_device_only() {
        let h = harness();
        let who = principal();
        let phone = device("phone");
        let laptop = device("laptop");
        let on_phone = h.manager.login(&who, &phone).await.unwrap();
        let on_laptop = h.manager.login(&who, &laptop).await.unwrap();
        assert_ne!(on_phone.refresh_token, on_laptop.refresh_token);

        h.manager.logout(who.user_id, &phone).await.unwrap();
        h.manager.logout(who.user_id, &phone).await.unwrap();

        assert!(matches!(
            h.manager.refresh(&on_phone.refresh_token, &phone).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(h.manager.refresh(&on_laptop.refresh_token, &laptop).await.is_ok());
    }

    #[tokio::test]
    async fn token_from_another_device_does_not_match() {
        let h = harness();
        let who = principal();
        let phone = device("phone");
        let laptop = device("laptop");
        let on_phone = h.manager.login(&who, &phone).await.unwrap();
        h.manager.login(&who, &laptop).await.unwrap();

        assert!(matches!(
            h.manager.refresh(&on_phone.refresh_token, &laptop).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn rejects_garbage_and_access_tokens_as_refresh_tokens() {
        let h = harness();
        let who = principal();
        let dev = DeviceId::default();
        let tokens = h.manager.login(&who, &dev).await.unwrap();

        for presented in ["", "abc", "a.b.c", tokens.access_token.0.as_str()] {
            assert!(matches!(
                h.manager
                    .refresh(&RefreshToken(presented.to_string()), &dev)
                    .await,
                Err(AuthError::InvalidRefreshToken)
            ));
        }
    }

    #[tokio::test]
    async fn expired_refresh_token_cannot_rotate() {
        let h = harness_with(
            jwt_config(Duration::ZERO, Duration::ZERO),
            MismatchPolicy::FailDevice,
        );
        let who = principal();
        let dev = DeviceId::default();
        let tokens = h.manager.login(&who, &dev).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(matches!(
            h.manager.refresh(&tokens.refresh_token, &dev).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn revoke_all_policy_drops_every_device_on_mismatch() {
        let h = harness_with(
            jwt_config(Duration::from_secs(900), Duration::from_secs(3600)),
            MismatchPolicy::RevokeAllSessions,
        );
        let who = principal();
        let phone = device("phone");
        let laptop = device("laptop");
        let stale = h.manager.login(&who, &phone).await.unwrap();
        h.manager.login(&who, &phone).await.unwrap();
        let on_laptop = h.manager.login(&who, &laptop).await.unwrap();

        assert!(matches!(
            h.manager.refresh(&stale.refresh_token, &phone).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            h.manager.refresh(&on_laptop.refresh_token, &laptop).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(h.store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn evicted_session_cannot_be_refreshed() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(
            Arc::new(JwtHs256Codec::new(jwt_config(
                Duration::from_secs(15 * 60),
                Duration::from_secs(7 * 24 * 60 * 60),
            ))),
            Arc::new(Sha256SecretHasher),
            store.clone(),
            SessionConfig {
                session_ttl: Duration::from_secs(60),
                clock_skew: Duration::from_secs(5),
                mismatch_policy: MismatchPolicy::FailDevice,
            },
        );
        let who = principal();
        let dev = DeviceId::default();
        let tokens = manager.login(&who, &dev).await.unwrap();
        assert!(manager.refresh(&tokens.refresh_token, &dev).await.is_ok());

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(matches!(
            manager.refresh(&tokens.refresh_token, &dev).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn refresh_reports_the_owner_on_both_paths() {
        let who = principal();
        let dev = DeviceId::default();

        let h = harness();
        let tokens = h.manager.login(&who, &dev).await.unwrap();
        let reused = h.manager.refresh(&tokens.refresh_token, &dev).await.unwrap();
        assert_eq!(reused.user_id, who.user_id);

        let h = rotating_harness();
        let tokens = h.manager.login(&who, &dev).await.unwrap();
        let rotated = h.manager.refresh(&tokens.refresh_token, &dev).await.unwrap();
        assert_eq!(rotated.user_id, who.user_id);
        assert_ne!(rotated.refresh_token, tokens.refresh_token);
    }

    #[tokio::test]
    async fn fast_path_survives_an_access_secret_change() {
        let h = harness();
        let who = principal();
        let dev = DeviceId::default();
        let tokens = h.manager.login(&who, &dev).await.unwrap();

        let mut jwt = jwt_config(
            Duration::from_secs(15 * 60),
            Duration::from_secs(7 * 24 * 60 * 60),
        );
        jwt.secrets = SigningSecrets::Separate {
            access: b"rotated-access-secret".to_vec(),
            refresh: b"test-refresh-secret".to_vec(),
        };
        let restarted = SessionManager::new(
            Arc::new(JwtHs256Codec::new(jwt)),
            Arc::new(Sha256SecretHasher),
            h.store.clone(),
            SessionConfig {
                session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
                clock_skew: Duration::from_secs(5),
                mismatch_policy: MismatchPolicy::FailDevice,
            },
        );

        let refreshed = restarted.refresh(&tokens.refresh_token, &dev).await.unwrap();
        assert_eq!(refreshed.user_id, who.user_id);
        assert_eq!(refreshed.access_token, tokens.access_token);
    }

    #[tokio::test]
    async fn access_verification_ignores_the_store() {
        let h = harness();
        let who = principal();
        let dev = DeviceId::default();
        let tokens = h.manager.login(&who, &dev).await.unwrap();
        h.manager.logout(who.user_id, &dev).await.unwrap();

        let identity = h.manager.verify_access(&tokens.access_token).unwrap();
        assert_eq!(identity.user_id, who.user_id);

        let refresh_as_access = AccessToken(tokens.refresh_token.0.clone());
        assert!(matches!(
            h.manager.verify_access(&refresh_as_access),
            Err(AuthError::TokenInvalid)
        ));
    }

    struct DownStore;

    #[async_trait::async_trait]
    impl SessionStore for DownStore {
        async fn get(&self, _: UserId, _: &DeviceId) -> Result<Option<SessionRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn put(
            &self,
            _: UserId,
            _: &DeviceId,
            _: &SessionRecord,
            _: Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _: UserId, _: &DeviceId) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete_all(&self, _: UserId) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_outage_fails_the_call() {
        let manager = SessionManager::new(
            Arc::new(JwtHs256Codec::new(jwt_config(
                Duration::from_secs(60),
                Duration::from_secs(60),
            ))),
            Arc::new(Sha256SecretHasher),
            Arc::new(DownStore),
            SessionConfig {
                session_ttl: Duration::from_secs(60),
                clock_skew: Duration::ZERO,
                mismatch_policy: MismatchPolicy::FailDevice,
            },
        );
        let who = principal();
        let dev = DeviceId::default();

        assert!(matches!(
            manager.login(&who, &dev).await,
            Err(AuthError::SessionStoreUnavailable(_))
        ));
        assert!(matches!(
            manager.logout(who.user_id, &dev).await,
            Err(AuthError::SessionStoreUnavailable(_))
        ));
    }

    /// Writes land after a delay, standing in for a slow network store.
    struct SlowStore {
        inner: MemorySessionStore,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl SessionStore for SlowStore {
        async fn get(&self, u: UserId, d: &DeviceId) -> Result<Option<SessionRecord>, StoreError> {
            self.inner.get(u, d).await
        }
        async fn put(
            &self,
            u: UserId,
            d: &DeviceId,
            r: &SessionRecord,
            ttl: Duration,
        ) -> Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.put(u, d, r, ttl).await
        }
        async fn delete(&self, u: UserId, d: &DeviceId) -> Result<(), StoreError> {
            self.inner.delete(u, d).await
        }
        async fn delete_all(&self, u: UserId) -> Result<usize, StoreError> {
            self.inner.delete_all(u).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_login_still_completes_its_write() {
        let store = Arc::new(SlowStore {
            inner: MemorySessionStore::new(),
            delay: Duration::from_millis(50),
        });
        let manager = SessionManager::new(
            Arc::new(JwtHs256Codec::new(jwt_config(
                Duration::from_secs(60),
                Duration::from_secs(60),
            ))),
            Arc::new(Sha256SecretHasher),
            store.clone(),
            SessionConfig {
                session_ttl: Duration::from_secs(60),
                clock_skew: Duration::ZERO,
                mismatch_policy: MismatchPolicy::FailDevice,
            },
        );
        let who = principal();
        let dev = DeviceId::default();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), manager.login(&who, &dev)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get(who.user_id, &dev).await.unwrap().is_some());
    }
}
