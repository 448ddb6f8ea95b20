use super::AuthError;

/// One-way digest of high-entropy secrets (refresh tokens) for at-rest storage.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> String;

    fn matches(&self, secret: &str, digest: &str) -> bool {
        constant_time_eq(self.hash(secret).as_bytes(), digest.as_bytes())
    }
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
