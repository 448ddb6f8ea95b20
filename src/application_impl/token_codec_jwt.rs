use crate::application_port::{IssuedToken, TokenClaims, TokenCodec, TokenError, TokenKind};
use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exactly one of the two layouts is configured; they are never mixed.
#[derive(Clone)]
pub enum SigningSecrets {
    Separate { access: Vec<u8>, refresh: Vec<u8> },
    /// Degraded mode: both kinds signed with one secret, told apart by `typ`.
    Shared(Vec<u8>),
}

impl std::fmt::Debug for SigningSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningSecrets::Separate { .. } => f.write_str("Separate(..)"),
            SigningSecrets::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Accepted clock difference when checking `exp`.
    pub leeway: Duration,
    pub secrets: SigningSecrets,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String, // user id as string
    typ: TokenKind,
    jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        KeyPair {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    access_keys: KeyPair,
    refresh_keys: KeyPair,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let (access_keys, refresh_keys) = match &cfg.secrets {
            SigningSecrets::Separate { access, refresh } => {
                (KeyPair::from_secret(access), KeyPair::from_secret(refresh))
            }
            SigningSecrets::Shared(secret) => {
                (KeyPair::from_secret(secret), KeyPair::from_secret(secret))
            }
        };
        JwtHs256Codec {
            cfg,
            access_keys,
            refresh_keys,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access_keys,
            TokenKind::Refresh => &self.refresh_keys,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.leeway = self.cfg.leeway.as_secs();
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }

    fn into_token_claims(claims: JwtClaims) -> Result<TokenClaims, TokenError> {
        let subject = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::Malformed)?;
        Ok(TokenClaims {
            subject,
            kind: claims.typ,
            jti: claims.jti,
            email: claims.email,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(TokenError::Malformed)
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::ImmatureSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue(
        &self,
        kind: TokenKind,
        subject: UserId,
        email: Option<&str>,
    ) -> Result<IssuedToken, TokenError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + self.ttl(kind);
        let claims = JwtClaims {
            sub: subject.to_string(),
            typ: kind,
            jti: Self::gen_jti(),
            email: match kind {
                TokenKind::Access => email.map(str::to_owned),
                TokenKind::Refresh => None,
            },
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(IssuedToken {
            token,
            expires_at: timestamp(claims.exp)?,
        })
    }

    fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<JwtClaims>(token, &self.keys(kind).decoding, &self.validation())
            .map_err(map_decode_error)?;
        if data.claims.typ != kind {
            return Err(TokenError::InvalidSignature);
        }
        Self::into_token_claims(data.claims)
    }

    fn decode_unchecked(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.insecure_disable_signature_validation();
        v.validate_exp = false;
        v.validate_aud = false;
        v.required_spec_claims.clear();
        let data = decode::<JwtClaims>(token, &DecodingKey::from_secret(&[]), &v)
            .map_err(|_| TokenError::Malformed)?;
        Self::into_token_claims(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secrets: SigningSecrets) -> JwtConfig {
        JwtConfig {
            issuer: "authgate.test".to_string(),
            audience: "api-client".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            leeway: Duration::ZERO,
            secrets,
        }
    }

    fn separate() -> SigningSecrets {
        SigningSecrets::Separate {
            access: b"access-secret".to_vec(),
            refresh: b"refresh-secret".to_vec(),
        }
    }

    #[test]
    fn issued_access_token_verifies_with_subject_and_email() {
        let codec = JwtHs256Codec::new(config(separate()));
        let user = UserId::new_random();
        let issued = codec
            .issue(TokenKind::Access, user, Some("alice@example.com"))
            .unwrap();

        let claims = codec.verify(TokenKind::Access, &issued.token).unwrap();
        assert_eq!(claims.subject, user);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(claims.expires_at, issued.expires_at);
    }

    #[test]
    fn refresh_tokens_never_carry_email_and_are_unique() {
        let codec = JwtHs256Codec::new(config(separate()));
        let user = UserId::new_random();
        let a = codec
            .issue(TokenKind::Refresh, user, Some("alice@example.com"))
            .unwrap();
        let b = codec.issue(TokenKind::Refresh, user, None).unwrap();

        assert_ne!(a.token, b.token);
        let claims = codec.verify(TokenKind::Refresh, &a.token).unwrap();
        assert_eq!(claims.email, None);
    }

    #[test]
    fn separate_secrets_reject_cross_kind_tokens() {
        let codec = JwtHs256Codec::new(config(separate()));
        let refresh = codec
            .issue(TokenKind::Refresh, UserId::new_random(), None)
            .unwrap();
        assert_eq!(
            codec.verify(TokenKind::Access, &refresh.token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn shared_secret_still_tells_kinds_apart() {
        let codec = JwtHs256Codec::new(config(SigningSecrets::Shared(b"one-secret".to_vec())));
        let refresh = codec
            .issue(TokenKind::Refresh, UserId::new_random(), None)
            .unwrap();
        assert!(codec.verify(TokenKind::Refresh, &refresh.token).is_ok());
        assert_eq!(
            codec.verify(TokenKind::Access, &refresh.token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn tampering_and_expiry_are_distinguishable() {
        let codec = JwtHs256Codec::new(config(separate()));
        let issued = codec
            .issue(TokenKind::Access, UserId::new_random(), None)
            .unwrap();

        let forged = JwtHs256Codec::new(config(SigningSecrets::Separate {
            access: b"attacker".to_vec(),
            refresh: b"attacker-refresh".to_vec(),
        }))
        .issue(TokenKind::Access, UserId::new_random(), None)
        .unwrap();
        assert_eq!(
            codec.verify(TokenKind::Access, &forged.token),
            Err(TokenError::InvalidSignature)
        );

        let mut cfg = config(separate());
        cfg.access_ttl = Duration::ZERO;
        let short = JwtHs256Codec::new(cfg);
        let expired = short
            .issue(TokenKind::Access, UserId::new_random(), None)
            .unwrap();
        // exp has one-second resolution
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(
            short.verify(TokenKind::Access, &expired.token),
            Err(TokenError::Expired)
        );

        assert!(codec.verify(TokenKind::Access, &issued.token).is_ok());
    }

    #[test]
    fn decode_unchecked_reads_foreign_and_expired_tokens() {
        let codec = JwtHs256Codec::new(config(separate()));
        let other = JwtHs256Codec::new(config(SigningSecrets::Shared(b"other".to_vec())));
        let user = UserId::new_random();
        let issued = other.issue(TokenKind::Refresh, user, None).unwrap();

        let claims = codec.decode_unchecked(&issued.token).unwrap();
        assert_eq!(claims.subject, user);
        assert_eq!(claims.kind, TokenKind::Refresh);

        assert_eq!(
            codec.decode_unchecked("definitely.not.jwt"),
            Err(TokenError::Malformed)
        );
    }
}
