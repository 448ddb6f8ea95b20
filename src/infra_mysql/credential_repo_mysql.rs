use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

/// Schema: `migrations/0001_auth_credential.sql`.
pub struct MySqlCredentialRepo {
    pool: MySqlPool,
}

impl MySqlCredentialRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlCredentialRepo { pool }
    }

    #[inline]
    fn uid_as_bytes(id: &UserId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, AuthError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| AuthError::InternalError(e.to_string()))?,
        ))
    }

    fn row_to_record(row: MySqlRow) -> Result<CredentialsRecord, AuthError> {
        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(db_error)?;
        let user_id = Self::uid_from_bytes(&user_id_bytes)?;

        let email: String = row.try_get("email").map_err(db_error)?;
        let display_name: String = row.try_get("display_name").map_err(db_error)?;
        let password_hash: String = row.try_get("password_hash").map_err(db_error)?;
        let is_active: bool = row.try_get("is_active").map_err(db_error)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(db_error)?;

        Ok(CredentialsRecord {
            user_id,
            email,
            display_name,
            password_hash,
            is_active,
            created_at,
        })
    }
}

fn db_error(e: sqlx::Error) -> AuthError {
    AuthError::InternalError(format!("credential store: {}", e))
}

#[async_trait::async_trait]
impl CredentialRepo for MySqlCredentialRepo {
    async fn create_credentials(&self, new: NewCredentials<'_>) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO auth_credential (user_id, email, display_name, password_hash)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(Self::uid_as_bytes(&new.user_id))
        .bind(new.email)
        .bind(new.display_name)
        .bind(new.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::UserExists
            } else {
                db_error(e)
            }
        })?;

        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<CredentialsRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, email, display_name, password_hash, is_active, created_at
FROM auth_credential
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<CredentialsRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, email, display_name, password_hash, is_active, created_at
FROM auth_credential
WHERE user_id = ?
"#,
        )
        .bind(Self::uid_as_bytes(&user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row_opt.map(Self::row_to_record).transpose()
    }
}
