use crate::domain_model::{DeviceId, DeviceIdError, UserId};
use crate::application_port::TokenError;
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Reported to clients exactly like `InvalidCredentials`.
    #[error("too many failed attempts")]
    LockedOut,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("user already exists")]
    UserExists,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("session store unavailable: {0}")]
    SessionStoreUnavailable(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::SessionStoreUnavailable(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::InvalidSignature | TokenError::Malformed => AuthError::TokenInvalid,
            TokenError::Signing(e) => AuthError::InternalError(e),
        }
    }
}

impl From<DeviceIdError> for AuthError {
    fn from(err: DeviceIdError) -> Self {
        AuthError::InvalidRequest(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone)]
pub struct RefreshInput {
    /// `None` when the client sent no refresh cookie.
    pub refresh_token: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub user_id: UserId,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Identity carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentity {
    pub user_id: UserId,
    /// Denormalized display copy; never use it for authorization.
    pub email: Option<String>,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn refresh(&self, request: RefreshInput) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, user_id: UserId, device_id: Option<&str>) -> Result<(), AuthError>;
    async fn verify_token(&self, token: &str) -> Result<AccessIdentity, AuthError>;
}
