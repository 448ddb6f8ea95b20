use super::{BruteForceGuard, SessionManager};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Stand-in compared against when the email is unknown, so the answer costs the
/// same password-hash work as a wrong password.
const DUMMY_PASSWORD: &str = "authgate-unknown-account";

pub struct RealAuthService {
    credential_repo: Arc<dyn CredentialRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    guard: Arc<BruteForceGuard>,
    sessions: Arc<SessionManager>,
    min_password_len: usize,
    dummy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        credential_repo: Arc<dyn CredentialRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        guard: Arc<BruteForceGuard>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            credential_repo,
            credential_hasher,
            guard,
            sessions,
            min_password_len: 6,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Computes the dummy hash ahead of the first login. Optional.
    pub async fn warm_up(&self) -> Result<(), AuthError> {
        self.dummy_hash().await.map(|_| ())
    }

    async fn dummy_hash(&self) -> Result<&String, AuthError> {
        self.dummy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DUMMY_PASSWORD))
            .await
    }

    fn validate_registration(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !well_formed {
            return Err(AuthError::InvalidRequest("email is not valid".to_string()));
        }
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::InvalidRequest(format!(
                "password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }

    /// `None` for unknown, inactive and wrong-password alike.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Principal>, AuthError> {
        let Some(rec) = self.credential_repo.get_by_email(email).await? else {
            let dummy = self.dummy_hash().await?;
            self.credential_hasher
                .verify_password(password, dummy)
                .await?;
            return Ok(None);
        };
        let ok = self
            .credential_hasher
            .verify_password(password, &rec.password_hash)
            .await?;
        if !ok || !rec.is_active {
            return Ok(None);
        }
        Ok(Some(Principal {
            user_id: rec.user_id,
            email: rec.email,
        }))
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let RegisterInput {
            email,
            password,
            display_name,
        } = request;
        let email = normalize_email(&email);
        self.validate_registration(&email, &password)?;

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user_id = UserId::new_random();
        let display_name = display_name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email.clone());

        self.credential_repo
            .create_credentials(NewCredentials {
                user_id,
                email: &email,
                display_name: &display_name,
                password_hash: &password_hash,
            })
            .await?;

        info!(%user_id, "user registered");
        Ok(user_id)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput {
            email,
            password,
            device_id,
        } = request;
        let device_id = DeviceId::from_optional(device_id.as_deref())?;
        let email = normalize_email(&email);

        // cheap rejection before the expensive password comparison
        self.guard.check(&email).await?;

        let Some(principal) = self.verify_credentials(&email, &password).await? else {
            let failures = self.guard.record_failure(&email).await?;
            warn!(email = %email, failures, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        };
        self.guard.reset(&email).await?;

        let tokens = self.sessions.login(&principal, &device_id).await?;
        Ok(LoginResult {
            user_id: principal.user_id,
            device_id,
            tokens,
        })
    }

    async fn refresh(&self, request: RefreshInput) -> Result<AuthTokens, AuthError> {
        let device_id = DeviceId::from_optional(request.device_id.as_deref())?;
        let Some(token) = request.refresh_token.filter(|t| !t.is_empty()) else {
            return Err(AuthError::InvalidRefreshToken);
        };
        let tokens = self
            .sessions
            .refresh(&RefreshToken(token), &device_id)
            .await?;

        let user_id = tokens.user_id;
        let active = self
            .credential_repo
            .get_by_id(user_id)
            .await?
            .is_some_and(|rec| rec.is_active);
        if !active {
            warn!(%user_id, %device_id, "refresh for missing or inactive account");
            self.sessions.logout(user_id, &device_id).await?;
            return Err(AuthError::InvalidRefreshToken);
        }
        Ok(tokens)
    }

    async fn logout(&self, user_id: UserId, device_id: Option<&str>) -> Result<(), AuthError> {
        let device_id = DeviceId::from_optional(device_id)?;
        self.sessions.logout(user_id, &device_id).await
    }

    async fn verify_token(&self, token: &str) -> Result<AccessIdentity, AuthError> {
        self.sessions.verify_access(&AccessToken(token.to_string()))
    }
}
