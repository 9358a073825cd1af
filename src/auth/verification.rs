//! Email verification and password reset flows.
//!
//! Both flows ride on single-use, purpose-scoped tokens minted by the
//! store. Email delivery is best-effort: the account mutation has already
//! happened by the time a message goes out, so a failed or slow send is
//! logged and swallowed.

use std::sync::Arc;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use super::{AuthConfig, AuthError, bounded};
use crate::email::{self, EmailMessage, EmailSender};
use crate::store::{Account, CredentialStore, StoreError};

pub struct VerificationService {
    store: Arc<dyn CredentialStore>,
    sender: Arc<dyn EmailSender>,
    config: AuthConfig,
}

impl VerificationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sender: Arc<dyn EmailSender>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    /// Mint a verification token for the account and send the email.
    ///
    /// # Errors
    /// Returns an error only when the token cannot be minted; delivery
    /// failures are logged and swallowed.
    pub async fn issue_email_verification(&self, account: &Account) -> Result<(), AuthError> {
        let ttl = self.config.email_token_ttl_seconds();
        let token = bounded(
            self.config.store_timeout(),
            "generate email token",
            self.store.generate_email_token(account.id, ttl),
        )
        .await?;

        let message = email::verification_email(
            self.config.frontend_base_url(),
            &account.email,
            &account.first_name,
            account.id,
            &token,
            ttl,
        );
        self.send_best_effort(&message).await;
        Ok(())
    }

    /// Start a password reset for the given (normalized) email.
    ///
    /// Returns the account id when a reset was actually issued, `None` when
    /// the address is unknown. Callers must not leak the difference.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] for store failures.
    pub async fn issue_password_reset(
        &self,
        email_normalized: &str,
    ) -> Result<Option<Uuid>, AuthError> {
        let account = bounded(
            self.config.store_timeout(),
            "find account for reset",
            self.store.find_by_email(email_normalized),
        )
        .await?;
        let Some(account) = account else {
            return Ok(None);
        };

        let ttl = self.config.reset_token_ttl_seconds();
        let token = bounded(
            self.config.store_timeout(),
            "generate reset token",
            self.store.generate_reset_token(account.id, ttl),
        )
        .await?;

        let message = email::password_reset_email(
            self.config.frontend_base_url(),
            &account.email,
            &account.first_name,
            account.id,
            &token,
            ttl,
        );
        self.send_best_effort(&message).await;
        Ok(Some(account.id))
    }

    /// Consume a verification token. Invalid, expired, and unknown-account
    /// cases all come back as `Ok(false)` so callers respond uniformly;
    /// already-confirmed accounts come back as `Ok(true)`.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] for store failures.
    pub async fn confirm_email(&self, id: Uuid, token: &str) -> Result<bool, AuthError> {
        let result = timeout(
            self.config.store_timeout(),
            self.store.confirm_email(id, token),
        )
        .await;
        match result {
            Ok(Ok(confirmed)) => Ok(confirmed),
            Ok(Err(StoreError::NotFound)) => Ok(false),
            Ok(Err(err)) => Err(AuthError::from_store(err)),
            Err(_) => {
                warn!("store call timed out: confirm email");
                Err(AuthError::Internal)
            }
        }
    }

    /// Complete a password reset: spend the token, replace the password,
    /// and revoke any live refresh token so stolen sessions die with the
    /// old password.
    ///
    /// # Errors
    /// [`AuthError::UserNotFound`], [`AuthError::InvalidOrExpiredToken`],
    /// [`AuthError::WeakPassword`], or [`AuthError::Internal`].
    pub async fn complete_reset(
        &self,
        id: Uuid,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        bounded(
            self.config.store_timeout(),
            "reset password",
            self.store.reset_password(id, token, new_password),
        )
        .await?;

        // Revocation after a successful reset is mandatory, but a failure
        // here must not report the reset itself as failed.
        let cleared = bounded(
            self.config.store_timeout(),
            "revoke refresh token after reset",
            self.store.clear_refresh_token(id),
        )
        .await;
        if let Err(err) = cleared {
            warn!("failed to revoke refresh token after password reset: {err}");
        }
        Ok(())
    }

    async fn send_best_effort(&self, message: &EmailMessage) {
        match timeout(self.config.email_timeout(), self.sender.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(to_email = %message.to_email, "email delivery failed: {err}");
            }
            Err(_) => {
                warn!(to_email = %message.to_email, "email delivery timed out");
            }
        }
    }
}
