use crate::application_port::*;
use crate::domain_model::UserId;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Credentials keyed by normalized email.
#[derive(Default)]
pub struct MemoryCredentialRepo {
    by_email: DashMap<String, CredentialsRecord>,
}

impl MemoryCredentialRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deactivate(&self, email: &str) {
        if let Some(mut rec) = self.by_email.get_mut(email) {
            rec.is_active = false;
        }
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MemoryCredentialRepo {
    async fn create_credentials(&self, new: NewCredentials<'_>) -> Result<(), AuthError> {
        match self.by_email.entry(new.email.to_owned()) {
            Entry::Occupied(_) => Err(AuthError::UserExists),
            Entry::Vacant(vacant) => {
                vacant.insert(CredentialsRecord {
                    user_id: new.user_id,
                    email: new.email.to_owned(),
                    display_name: new.display_name.to_owned(),
                    password_hash: new.password_hash.to_owned(),
                    is_active: true,
                    created_at: Utc::now(),
                });
                Ok(())
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<CredentialsRecord>, AuthError> {
        Ok(self.by_email.get(email).map(|rec| rec.clone()))
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<CredentialsRecord>, AuthError> {
        Ok(self
            .by_email
            .iter()
            .find(|rec| rec.user_id == user_id)
            .map(|rec| rec.clone()))
    }
}
