//! Persistence seams for accounts, tokens, and the activity log.
//!
//! The auth engine only talks to the two traits in this module. The Postgres
//! implementation backs the server; the in-memory implementation backs local
//! development and tests.

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;
pub mod password;
pub mod postgres;

pub use memory::{MemoryActivityLog, MemoryCredentialStore};
pub use postgres::{PgActivityLog, PgCredentialStore};

/// A stored account. The password hash never leaves the store; callers verify
/// credentials through [`CredentialStore::verify_password`].
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_confirmed: bool,
    pub refresh_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub last_login_at: Option<OffsetDateTime>,
}

/// Input for account creation. The email must already be normalized.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailExists,
    #[error("password does not satisfy policy")]
    WeakPassword(Vec<String>),
    #[error("account not found")]
    NotFound,
    #[error("current password does not match")]
    PasswordMismatch,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Account and credential persistence.
///
/// Refresh tokens and single-use tokens are handled as SHA-256 hashes on the
/// wire between engine and store; raw token material never reaches the store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Create an account with a policy-checked, hashed password.
    /// Returns [`StoreError::EmailExists`] on a duplicate email.
    async fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Constant-shape credential check: `Ok(false)` for a wrong password,
    /// [`StoreError::NotFound`] only when the account is gone.
    async fn verify_password(&self, id: Uuid, password: &str) -> Result<bool, StoreError>;

    /// Overwrite the account's refresh token unconditionally (login/register).
    async fn set_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Atomically swap the refresh token: succeeds only when `presented_hash`
    /// matches the stored, unexpired value. Returns `false` when the swap did
    /// not happen (mismatch, expired, or already rotated).
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        presented_hash: &[u8],
        next_hash: &[u8],
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Drop the stored refresh token. Returns `false` when the account holds
    /// no token (revocation stays idempotent).
    async fn clear_refresh_token(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn touch_last_login(&self, id: Uuid) -> Result<(), StoreError>;

    /// Mint a single-use email verification token, returning the raw value.
    async fn generate_email_token(
        &self,
        id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, StoreError>;

    /// Consume a verification token and mark the email confirmed.
    /// Already-confirmed accounts return `Ok(true)` without consuming
    /// anything; invalid or expired tokens return `Ok(false)`.
    async fn confirm_email(&self, id: Uuid, token: &str) -> Result<bool, StoreError>;

    /// Mint a single-use password reset token, returning the raw value.
    async fn generate_reset_token(
        &self,
        id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, StoreError>;

    /// Consume a reset token and replace the password. The token is only
    /// spent when the new password passes policy.
    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        new_password: &str,
    ) -> Result<(), StoreError>;

    /// Replace the password after verifying the current one.
    async fn change_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), StoreError>;
}

/// Classified audit event kinds. Stored as lowercase snake-case text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Login,
    FailedLogin,
    Registration,
    EmailVerification,
    PasswordChange,
    PasswordReset,
    TokenRefresh,
    TokenRevoked,
    ProfileUpdate,
}

impl ActivityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::FailedLogin => "failed_login",
            Self::Registration => "registration",
            Self::EmailVerification => "email_verification",
            Self::PasswordChange => "password_change",
            Self::PasswordReset => "password_reset",
            Self::TokenRefresh => "token_refresh",
            Self::TokenRevoked => "token_revoked",
            Self::ProfileUpdate => "profile_update",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "login" => Some(Self::Login),
            "failed_login" => Some(Self::FailedLogin),
            "registration" => Some(Self::Registration),
            "email_verification" => Some(Self::EmailVerification),
            "password_change" => Some(Self::PasswordChange),
            "password_reset" => Some(Self::PasswordReset),
            "token_refresh" => Some(Self::TokenRefresh),
            "token_revoked" => Some(Self::TokenRevoked),
            "profile_update" => Some(Self::ProfileUpdate),
            _ => None,
        }
    }
}

/// An audit event to append. `account_id` is `None` when the subject could
/// not (or must not) be attributed, e.g. failed logins.
#[derive(Clone, Debug)]
pub struct NewActivity {
    pub account_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub detail: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub detail: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Append-only audit trail.
#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    async fn append(&self, activity: NewActivity) -> Result<(), StoreError>;

    /// Events for one account, newest first.
    async fn list_for_account(&self, account_id: Uuid)
        -> Result<Vec<ActivityRecord>, StoreError>;
}

/// Random opaque token, URL-safe base64 without padding.
/// The raw value goes to the caller; only its hash is persisted.
pub(crate) fn generate_token(len: usize) -> Result<String, StoreError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a token so raw values never touch the database.
#[must_use]
pub fn token_hash(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
