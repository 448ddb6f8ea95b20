use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CredentialsRecord {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCredentials<'a> {
    pub user_id: UserId,
    /// Already normalized.
    pub email: &'a str,
    pub display_name: &'a str,
    pub password_hash: &'a str,
}

#[async_trait::async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Fails with `UserExists` when the email is taken.
    async fn create_credentials(&self, new: NewCredentials<'_>) -> Result<(), AuthError>;

    /// Fetch credentials by normalized email (for login).
    async fn get_by_email(&self, email: &str) -> Result<Option<CredentialsRecord>, AuthError>;

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<CredentialsRecord>, AuthError>;
}
