pub mod token;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub use token::{TokenVerifier, VerificationError};

/// Claim map carried by a verified credential
pub type Claims = Map<String, Value>;

/// Signing algorithm shared by the verifier and the issuer
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
}

/// Mints tokens the [`TokenVerifier`] accepts. Login itself lives outside this
/// service; the issuer backs the CLI and the test suites.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    default_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, default_ttl: Duration) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }

        Ok(Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            default_ttl,
        })
    }

    /// Sign `claims`, filling `iat` and `exp` when the caller left them out
    pub fn issue(&self, claims: Claims) -> Result<String, JwtError> {
        self.issue_with_ttl(claims, self.default_ttl)
    }

    pub fn issue_with_ttl(&self, mut claims: Claims, ttl: Duration) -> Result<String, JwtError> {
        let now = Utc::now();
        claims
            .entry("iat")
            .or_insert_with(|| Value::from(now.timestamp()));
        if !claims.contains_key("exp") {
            let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
                JwtError::TokenGeneration(format!("token lifetime {} is out of range", ttl))
            })?;
            claims.insert("exp".to_string(), Value::from(expires_at.timestamp()));
        }

        encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }
}

/// Short stable digest of a credential, safe to put in logs
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issuer_rejects_empty_secret() {
        assert!(matches!(
            TokenIssuer::new("", Duration::hours(1)),
            Err(JwtError::InvalidSecret)
        ));
    }

    #[test]
    fn issuer_fills_timestamps_but_keeps_explicit_exp() {
        let issuer = TokenIssuer::new("secret", Duration::hours(1)).unwrap();
        let verifier = TokenVerifier::new("secret", 0);

        let mut claims = Claims::new();
        claims.insert("role".into(), json!("user"));
        let token = issuer.issue(claims).unwrap();
        let decoded = verifier.verify(&token).unwrap();
        assert!(decoded.get("iat").and_then(Value::as_i64).is_some());
        assert!(decoded.get("exp").and_then(Value::as_i64).is_some());

        let exp = Utc::now().timestamp() + 42;
        let mut claims = Claims::new();
        claims.insert("exp".into(), json!(exp));
        let token = issuer.issue(claims).unwrap();
        let decoded = verifier.verify(&token).unwrap();
        assert_eq!(decoded["exp"], json!(exp));
    }

    #[test]
    fn lifetime_past_the_calendar_is_an_error() {
        let issuer = TokenIssuer::new("secret", Duration::hours(1)).unwrap();
        let ttl = Duration::hours(1_000_000_000_000);

        let err = issuer.issue_with_ttl(Claims::new(), ttl).unwrap_err();
        assert!(matches!(err, JwtError::TokenGeneration(_)));

        // an explicit exp does not need the default lifetime
        let mut claims = Claims::new();
        claims.insert("exp".into(), json!(Utc::now().timestamp() + 60));
        assert!(issuer.issue_with_ttl(claims, ttl).is_ok());
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = fingerprint("abc.def.ghi");
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint("abc.def.ghi"));
        assert_ne!(a, fingerprint("abc.def.ghj"));
    }
}
