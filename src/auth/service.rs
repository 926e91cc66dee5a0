//! Auth Core
//! Mission: Orchestrate login, refresh rotation, and logout

use crate::auth::jwt::{JwtHandler, TokenError};
use crate::auth::models::{TokenPair, User};
use crate::auth::refresh_store::RefreshTokenStore;
use crate::auth::user_store::UserStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Authentication failures
///
/// Store failures carry the underlying error unmodified — the auth core
/// never retries; that policy belongs to the caller.
#[derive(Debug)]
pub enum AuthError {
    /// Unknown email or wrong password — deliberately indistinguishable
    InvalidCredentials,
    /// Refresh token not found (or already rotated away)
    InvalidRefreshToken,
    /// Refresh token past its expiry; the record has been removed
    RefreshTokenExpired,
    /// Refresh token belongs to a different user
    UserMismatch,
    /// Access token signing or verification failure
    Token(TokenError),
    /// Persistence failure from the credential or refresh store
    Store(anyhow::Error),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            AuthError::RefreshTokenExpired => write!(f, "Refresh token expired"),
            AuthError::UserMismatch => write!(f, "Refresh token does not belong to this user"),
            AuthError::Token(e) => write!(f, "{}", e),
            AuthError::Store(e) => write!(f, "Store unavailable: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        AuthError::Token(e)
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Store(e)
    }
}

/// Auth service wiring the credential store, refresh store, and signer
///
/// Refresh tokens are the only durable auth state. Access tokens are
/// stateless: logout cannot invalidate one before its natural expiry.
pub struct AuthService {
    users: Arc<UserStore>,
    refresh_tokens: Arc<RefreshTokenStore>,
    jwt: Arc<JwtHandler>,
}

impl AuthService {
    pub fn new(
        users: Arc<UserStore>,
        refresh_tokens: Arc<RefreshTokenStore>,
        jwt: Arc<JwtHandler>,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            jwt,
        }
    }

    /// Authenticate with email + password and issue a token pair
    pub fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        let user = self
            .users
            .get_user_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        let valid = self.users.verify_password(password, &user.password_hash)?;
        if !valid {
            warn!("❌ Failed login attempt: {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        let (access_token, expires_in) = self.jwt.issue(&user)?;
        let refresh = self.refresh_tokens.create(&user.id)?;

        info!("✅ Login successful: {} ({})", user.email, user.role.as_str());

        Ok((
            user,
            TokenPair {
                access_token,
                refresh_token: refresh.token,
                expires_in,
            },
        ))
    }

    /// Rotate a refresh token and issue a new token pair
    ///
    /// The old token is consumed atomically — a second refresh with it
    /// fails with `InvalidRefreshToken`, bounding replay of a leaked token
    /// to a single use.
    pub fn refresh(&self, refresh_token: &str, email: &str) -> Result<(User, TokenPair), AuthError> {
        let record = self
            .refresh_tokens
            .find_by_token(refresh_token)?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if record.is_expired(Utc::now()) {
            debug!("Refresh token for user {} expired, removing", record.user_id);
            self.refresh_tokens.delete_token(refresh_token)?;
            return Err(AuthError::RefreshTokenExpired);
        }

        let user = self
            .users
            .get_user_by_email(email)?
            .ok_or(AuthError::UserMismatch)?;
        if user.id != record.user_id {
            warn!("❌ Refresh token user mismatch for {}", email);
            return Err(AuthError::UserMismatch);
        }

        let rotated = self
            .refresh_tokens
            .rotate(refresh_token, &user.id)?
            // Lost the rotation race: the token was consumed since lookup
            .ok_or(AuthError::InvalidRefreshToken)?;

        let (access_token, expires_in) = self.jwt.issue(&user)?;

        debug!("Rotated session for {}", user.email);

        Ok((
            user,
            TokenPair {
                access_token,
                refresh_token: rotated.token,
                expires_in,
            },
        ))
    }

    /// End a session by revoking the user's refresh token; idempotent
    pub fn logout(&self, user_id: &Uuid) -> Result<(), AuthError> {
        self.refresh_tokens.revoke(user_id)?;
        info!("👋 Logged out user {}", user_id);
        Ok(())
    }

    /// Remove expired refresh records, returning the count removed
    pub fn sweep_expired(&self) -> Result<usize, AuthError> {
        Ok(self.refresh_tokens.sweep_expired(Utc::now())?)
    }
}
