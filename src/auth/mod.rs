pub mod notifier;
pub mod password;
pub mod reset;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use notifier::{LogNotifier, NotifyError, ResetNotifier};
pub use password::PasswordHasher;
pub use reset::ResetToken;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Password hashing error: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, now: DateTime<Utc>, expiry: Duration) -> Self {
        Self {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + expiry).timestamp(),
        }
    }
}

/// Signs and verifies HS256 session tokens. Tokens are never stored.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims::new(user_id, now, self.expiry);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenGeneration(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret-with-enough-length", Duration::days(90))
    }

    #[test]
    fn issued_tokens_verify() {
        let id = Uuid::new_v4();
        let claims = issuer().verify(&issuer().issue(id).unwrap()).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.exp - claims.iat, Duration::days(90).num_seconds());
    }

    #[test]
    fn expired_and_forged_tokens_fail() {
        let id = Uuid::new_v4();
        let old = issuer().issue_at(id, Utc::now() - Duration::days(91)).unwrap();
        assert!(matches!(issuer().verify(&old), Err(AuthError::TokenExpired)));

        let other = TokenIssuer::new("another-secret", Duration::days(90)).issue(id).unwrap();
        assert!(matches!(issuer().verify(&other), Err(AuthError::InvalidToken)));
        assert!(matches!(issuer().verify("not.a.jwt"), Err(AuthError::InvalidToken)));
    }
}
