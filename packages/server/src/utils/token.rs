//! Stateless bearer tokens carrying a user id.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Token claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String, // User ID
    pub iat: i64,    // Issued-at timestamp
    pub exp: i64,    // Expiration timestamp
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed token.
    #[error("invalid token")]
    Invalid,
    /// Well-formed and authentic, but past its lifetime.
    #[error("expired token")]
    Expired,
    /// The signature does not match the key.
    #[error("unauthenticated token")]
    Unauthenticated,
    #[error("failed to issue token: {0}")]
    Encode(String),
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new token for a user.
    pub fn sign(&self, user_id: &str) -> Result<String, TokenError> {
        let issued_at = Utc::now();
        let claims = Claims {
            uid: user_id.to_owned(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verify a token and return its user id.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::Unauthenticated,
                _ => TokenError::Invalid,
            }
        })?;
        Ok(data.claims.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn issued_token_verifies() {
        let codec = TokenCodec::new(KEY, Duration::days(14));
        let token = codec.sign("user-1").unwrap();
        assert_eq!(codec.verify(&token).unwrap(), "user-1");
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new(KEY, Duration::seconds(-10));
        let token = codec.sign("user-1").unwrap();
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn foreign_key_is_unauthenticated() {
        let token = TokenCodec::new(KEY, Duration::days(1)).sign("user-1").unwrap();
        let other = TokenCodec::new(b"another key of at least 32 bytes!", Duration::days(1));
        assert_eq!(other.verify(&token), Err(TokenError::Unauthenticated));
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = TokenCodec::new(KEY, Duration::days(1));
        assert_eq!(codec.verify("not-a-token"), Err(TokenError::Invalid));
        assert_eq!(codec.verify(""), Err(TokenError::Invalid));
    }
}
