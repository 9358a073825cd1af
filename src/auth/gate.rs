//! Credential gate: the single place passwords are checked against the
//! store, plus email normalization helpers shared by the flows.

use regex::Regex;
use std::sync::Arc;

use super::AuthError;
use crate::store::{Account, CredentialStore, NewAccount, StoreError};

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub struct CredentialGate {
    store: Arc<dyn CredentialStore>,
}

impl CredentialGate {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Resolve an email/password pair to an account.
    ///
    /// Unknown email and wrong password both come back as
    /// [`AuthError::InvalidCredentials`]; nothing about the failure reveals
    /// whether the address exists.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] or [`AuthError::Internal`].
    pub async fn verify_login(
        &self,
        email_normalized: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        let Some(account) = self
            .store
            .find_by_email(email_normalized)
            .await
            .map_err(AuthError::from_store)?
        else {
            return Err(AuthError::InvalidCredentials);
        };

        match self.store.verify_password(account.id, password).await {
            Ok(true) => Ok(account),
            Ok(false) => Err(AuthError::InvalidCredentials),
            // Account deleted between lookup and check: same uniform failure.
            Err(StoreError::NotFound) => Err(AuthError::InvalidCredentials),
            Err(err) => Err(AuthError::from_store(err)),
        }
    }

    /// Create an account. Duplicate emails surface as
    /// [`AuthError::EmailExists`] even under concurrent registration; the
    /// store's unique constraint is the arbiter.
    ///
    /// # Errors
    /// [`AuthError::EmailExists`], [`AuthError::WeakPassword`], or
    /// [`AuthError::Internal`].
    pub async fn create_account(&self, account: NewAccount) -> Result<Account, AuthError> {
        self.store
            .create(account)
            .await
            .map_err(AuthError::from_store)
    }

    /// Replace a password after verifying the current one.
    ///
    /// # Errors
    /// [`AuthError::UserNotFound`], [`AuthError::CurrentPasswordMismatch`],
    /// [`AuthError::WeakPassword`], or [`AuthError::Internal`].
    pub async fn change_password(
        &self,
        id: uuid::Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.store
            .change_password(id, current_password, new_password)
            .await
            .map_err(AuthError::from_store)
    }
}
