//! JWT Token Handler
//! Mission: Sign and verify access tokens with a process-wide secret

use crate::auth::models::{Claims, User};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// Errors from token signing and verification
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Signature does not match the configured secret
    InvalidSignature,
    /// Token is past its expiration timestamp
    Expired,
    /// Token structure cannot be parsed
    Malformed,
    /// Token could not be signed
    Signing,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::Signing => write!(f, "Failed to sign token"),
        }
    }
}

impl std::error::Error for TokenError {}

/// JWT Handler for access token operations
///
/// Stateless: every token is a pure function of the user, the clock, and
/// the secret loaded once at startup.
pub struct JwtHandler {
    secret: String,
    ttl_secs: i64,
}

impl JwtHandler {
    pub fn new(secret: String, ttl_secs: i64) -> Self {
        Self { secret, ttl_secs }
    }

    /// Sign an access token for a user
    pub fn issue(&self, user: &User) -> Result<(String, usize), TokenError> {
        let now = Utc::now().timestamp();
        let expiration = now + self.ttl_secs;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            is_admin: user.is_admin,
            iat: now as usize,
            exp: expiration as usize,
        };

        debug!(
            "Issuing access token for {} ({}), ttl {}s",
            user.email, user.id, self.ttl_secs
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| TokenError::Signing)?;

        Ok((token, self.ttl_secs as usize))
    }

    /// Verify an access token and extract claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        })?;

        Ok(decoded.claims)
    }
}
