use crate::application_port::SecretHasher;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Unkeyed SHA-256, hex encoded. Refresh tokens are high entropy, so no salt.
#[derive(Debug, Default)]
pub struct Sha256SecretHasher;

impl SecretHasher for Sha256SecretHasher {
    fn hash(&self, secret: &str) -> String {
        hex::encode(Sha256::digest(secret.as_bytes()))
    }
}

/// HMAC-SHA256 with a server-side key, so a leaked store alone cannot be
/// checked against guessed tokens.
pub struct HmacSha256SecretHasher {
    mac: Hmac<Sha256>,
}

impl HmacSha256SecretHasher {
    pub fn new(key: &[u8]) -> Result<Self, hmac::digest::InvalidLength> {
        let mac = <Hmac<Sha256> as Mac>::new_from_slice(key)?;
        Ok(Self { mac })
    }
}

impl SecretHasher for HmacSha256SecretHasher {
    fn hash(&self, secret: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(secret.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            Sha256SecretHasher.hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hashing_is_a_pure_function_of_the_input() {
        // two separate instances stand in for two process lifetimes
        let a = Sha256SecretHasher.hash("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        let b = Sha256SecretHasher::default().hash("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        assert_eq!(a, b);
        assert_ne!(a, Sha256SecretHasher.hash("eyJhbGciOiJIUzI1NiJ9.payload.sih"));
    }

    #[test]
    fn keyed_digest_depends_on_key_and_never_echoes_input() {
        let one = HmacSha256SecretHasher::new(b"key-one").unwrap();
        let two = HmacSha256SecretHasher::new(b"key-two").unwrap();
        let token = "refresh-token-value";

        assert_eq!(one.hash(token), one.hash(token));
        assert_ne!(one.hash(token), two.hash(token));
        assert_ne!(one.hash(token), Sha256SecretHasher.hash(token));
        assert!(!one.hash(token).contains(token));
    }

    #[test]
    fn matches_compares_against_stored_digest() {
        let hasher = Sha256SecretHasher;
        let digest = hasher.hash("token");
        assert!(hasher.matches("token", &digest));
        assert!(!hasher.matches("token2", &digest));
        assert!(!hasher.matches("token", ""));
    }
}
