use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    /// Bad signature, foreign issuer/audience, or a token of the other kind.
    #[error("token signature invalid")]
    InvalidSignature,
    #[error("token malformed")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: UserId,
    pub kind: TokenKind,
    pub jti: String,
    pub email: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and checks compact tokens. Secret and lifetime are chosen by `kind`.
pub trait TokenCodec: Send + Sync {
    fn issue(
        &self,
        kind: TokenKind,
        subject: UserId,
        email: Option<&str>,
    ) -> Result<IssuedToken, TokenError>;

    fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError>;

    /// Reads claims without checking signature or expiry. Only for tokens this
    /// system produced and stored itself, or to pick which record to compare with.
    fn decode_unchecked(&self, token: &str) -> Result<TokenClaims, TokenError>;
}
