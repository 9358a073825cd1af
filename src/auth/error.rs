//! Caller-visible error taxonomy.
//!
//! Messages are the exact strings clients see; the two credential failure
//! cases (unknown email, wrong password) intentionally collapse into one
//! variant so responses cannot be used to probe for accounts.

use tracing::error;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email is already registered")]
    EmailExists,
    #[error("Email address has not been verified")]
    EmailNotVerified,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password does not meet requirements")]
    WeakPassword(Vec<String>),
    #[error("Invalid access token")]
    InvalidToken,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Current password is incorrect")]
    CurrentPasswordMismatch,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// Stable machine-readable code, independent of the display message.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::EmailExists => "email_exists",
            Self::EmailNotVerified => "email_not_verified",
            Self::InvalidEmail => "invalid_email",
            Self::WeakPassword(_) => "weak_password",
            Self::InvalidToken => "invalid_token",
            Self::InvalidRefreshToken => "invalid_refresh_token",
            Self::UserNotFound => "user_not_found",
            Self::CurrentPasswordMismatch => "current_password_mismatch",
            Self::InvalidOrExpiredToken => "invalid_or_expired_token",
            Self::Internal => "internal",
        }
    }

    /// Per-rule details for weak passwords, empty otherwise.
    #[must_use]
    pub fn details(&self) -> &[String] {
        match self {
            Self::WeakPassword(violations) => violations,
            _ => &[],
        }
    }

    /// Map a store failure to the caller-visible taxonomy. Internal store
    /// errors are logged here with their full chain; callers only see the
    /// opaque variant.
    pub(crate) fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::EmailExists => Self::EmailExists,
            StoreError::WeakPassword(violations) => Self::WeakPassword(violations),
            StoreError::NotFound => Self::UserNotFound,
            StoreError::PasswordMismatch => Self::CurrentPasswordMismatch,
            StoreError::InvalidToken => Self::InvalidOrExpiredToken,
            StoreError::Internal(err) => {
                error!("store failure: {err:#}");
                Self::Internal
            }
        }
    }
}
