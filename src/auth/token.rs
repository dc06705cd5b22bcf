use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

use super::{Claims, TOKEN_ALGORITHM};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                VerificationError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            _ => VerificationError::Malformed(err.to_string()),
        }
    }
}

/// Validates bearer credentials against the server secret.
///
/// Verification is a pure function of the token, the secret and the clock:
/// the signature must match, `exp` must be present and not in the past, and the
/// payload must be a JSON object.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        // audience is not part of the contract; tokens minted for any audience are accepted
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        if token.is_empty() {
            return Err(VerificationError::Malformed("empty token".to_string()));
        }

        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}
