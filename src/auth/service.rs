//! The engine facade handlers talk to.
//!
//! [`AuthService`] owns the credential gate, token service, verification
//! flows, and the activity recorder, and sequences them into the public
//! operations: register, login, refresh, revoke, the password flows, and
//! the per-account activity summary.

use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::warn;

use super::{
    ActivityRecorder, ActivitySummary, AuthConfig, AuthError, Claims, CredentialGate,
    TokenService, VerificationService, bounded,
    gate::{normalize_email, valid_email},
};
use crate::email::EmailSender;
use crate::store::{
    Account, ActivityKind, ActivityLogStore, CredentialStore, NewAccount, NewActivity, token_hash,
};
use uuid::Uuid;

/// Caller context attached to audit events.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A freshly issued session: bearer token, its refresh companion, and the
/// account they belong to.
#[derive(Debug)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub account: Account,
}

/// Input for [`AuthService::register`].
#[derive(Clone, Debug)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

pub struct AuthService {
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
    gate: CredentialGate,
    tokens: TokenService,
    recorder: ActivityRecorder,
    verification: VerificationService,
}

impl AuthService {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        activity: Arc<dyn ActivityLogStore>,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        let gate = CredentialGate::new(store.clone());
        let tokens = TokenService::new(&config);
        let recorder = ActivityRecorder::new(activity, config.store_timeout());
        let verification =
            VerificationService::new(store.clone(), sender, config.clone());
        Self {
            config,
            store,
            gate,
            tokens,
            recorder,
            verification,
        }
    }

    /// Create an account, start email verification, and open a session.
    ///
    /// The session is issued before the email is confirmed; login is what
    /// enforces verification.
    ///
    /// # Errors
    /// [`AuthError::InvalidEmail`], [`AuthError::WeakPassword`],
    /// [`AuthError::EmailExists`], or [`AuthError::Internal`].
    pub async fn register(
        &self,
        registration: Registration,
        meta: &RequestMeta,
    ) -> Result<AuthTokens, AuthError> {
        let email = normalize_email(&registration.email);
        if !valid_email(&email) {
            self.record_failed_registration(meta).await;
            return Err(AuthError::InvalidEmail);
        }
        if registration.password != registration.confirm_password {
            self.record_failed_registration(meta).await;
            return Err(AuthError::WeakPassword(vec![
                "Passwords do not match".to_string(),
            ]));
        }

        let account = match self
            .gate
            .create_account(NewAccount {
                email,
                password: registration.password,
                first_name: registration.first_name.trim().to_string(),
                last_name: registration.last_name.trim().to_string(),
            })
            .await
        {
            Ok(account) => account,
            Err(err) => {
                self.record_failed_registration(meta).await;
                return Err(err);
            }
        };

        self.recorder
            .record(self.event(
                Some(account.id),
                ActivityKind::Registration,
                "User registered",
                true,
                meta,
            ))
            .await;

        self.verification.issue_email_verification(&account).await?;
        self.open_session(account).await
    }

    /// Authenticate and open a session.
    ///
    /// Unknown email and wrong password fail identically, and both leave an
    /// unattributed failed-login event so the trail itself cannot be used to
    /// probe for accounts.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`], [`AuthError::EmailNotVerified`],
    /// or [`AuthError::Internal`].
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<AuthTokens, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            self.record_failed_login(None, meta).await;
            return Err(AuthError::InvalidCredentials);
        }

        let account = match self.gate.verify_login(&email, password).await {
            Ok(account) => account,
            Err(AuthError::InvalidCredentials) => {
                self.record_failed_login(None, meta).await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => return Err(err),
        };

        if !account.email_confirmed {
            self.record_failed_login(Some(account.id), meta).await;
            return Err(AuthError::EmailNotVerified);
        }

        if let Err(err) = bounded(
            self.config.store_timeout(),
            "touch last login",
            self.store.touch_last_login(account.id),
        )
        .await
        {
            warn!("failed to update last login timestamp: {err}");
        }

        let session = self.open_session(account).await?;
        self.recorder
            .record(self.event(
                Some(session.account.id),
                ActivityKind::Login,
                "User logged in successfully",
                true,
                meta,
            ))
            .await;
        Ok(session)
    }

    /// Rotate a session: a signature-valid (possibly expired) access token
    /// plus the live refresh token buy one new pair. The presented refresh
    /// token is spent atomically; a replay after rotation fails.
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`], [`AuthError::InvalidRefreshToken`], or
    /// [`AuthError::Internal`].
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
        meta: &RequestMeta,
    ) -> Result<AuthTokens, AuthError> {
        let claims = self.tokens.principal_from_expired_token(access_token)?;
        let account_id = claims.account_id()?;

        let account = bounded(
            self.config.store_timeout(),
            "find account for refresh",
            self.store.find_by_id(account_id),
        )
        .await?;
        let Some(account) = account else {
            self.record_refresh(None, false, meta).await;
            return Err(AuthError::InvalidRefreshToken);
        };

        let next_refresh = self.tokens.issue_refresh_token()?;
        let rotated = bounded(
            self.config.store_timeout(),
            "rotate refresh token",
            self.store.rotate_refresh_token(
                account.id,
                &token_hash(refresh_token),
                &token_hash(&next_refresh),
                self.refresh_expiry(),
            ),
        )
        .await?;
        if !rotated {
            self.record_refresh(Some(account.id), false, meta).await;
            return Err(AuthError::InvalidRefreshToken);
        }

        let access_token = self.tokens.issue_access_token(&account)?;
        self.record_refresh(Some(account.id), true, meta).await;
        Ok(AuthTokens {
            access_token,
            refresh_token: next_refresh,
            account,
        })
    }

    /// Revoke the caller's refresh token. Idempotent: revoking an account
    /// with no live token still succeeds.
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] or [`AuthError::Internal`].
    pub async fn revoke(&self, access_token: &str, meta: &RequestMeta) -> Result<(), AuthError> {
        let claims = self.tokens.verify_access_token(access_token)?;
        let account_id = claims.account_id()?;

        bounded(
            self.config.store_timeout(),
            "clear refresh token",
            self.store.clear_refresh_token(account_id),
        )
        .await?;

        self.recorder
            .record(self.event(
                Some(account_id),
                ActivityKind::TokenRevoked,
                "Refresh token revoked",
                true,
                meta,
            ))
            .await;
        Ok(())
    }

    /// Replace the caller's password after verifying the current one. The
    /// refresh token stays live; revocation belongs to logout and reset.
    ///
    /// # Errors
    /// [`AuthError::CurrentPasswordMismatch`], [`AuthError::WeakPassword`],
    /// [`AuthError::UserNotFound`], or [`AuthError::Internal`].
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let result = self
            .gate
            .change_password(account_id, current_password, new_password)
            .await;
        if result.is_err() {
            self.recorder
                .record(self.event(
                    Some(account_id),
                    ActivityKind::PasswordChange,
                    "Password change rejected",
                    false,
                    meta,
                ))
                .await;
        }
        result?;

        self.recorder
            .record(self.event(
                Some(account_id),
                ActivityKind::PasswordChange,
                "Password changed",
                true,
                meta,
            ))
            .await;
        Ok(())
    }

    /// Consume an email verification token. Returns whether the email is
    /// confirmed afterwards; unknown accounts and bad tokens both come back
    /// as `Ok(false)`.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] for store failures.
    pub async fn verify_email(
        &self,
        account_id: Uuid,
        token: &str,
        meta: &RequestMeta,
    ) -> Result<bool, AuthError> {
        let confirmed = self.verification.confirm_email(account_id, token).await?;
        if confirmed {
            self.recorder
                .record(self.event(
                    Some(account_id),
                    ActivityKind::EmailVerification,
                    "Email address verified",
                    true,
                    meta,
                ))
                .await;
        }
        Ok(confirmed)
    }

    /// Re-send the verification email. Always succeeds from the caller's
    /// perspective; unknown and already-confirmed addresses are quiet no-ops.
    pub async fn resend_verification(&self, email: &str) {
        let email = normalize_email(email);
        let account = bounded(
            self.config.store_timeout(),
            "find account for resend",
            self.store.find_by_email(&email),
        )
        .await;
        match account {
            Ok(Some(account)) if !account.email_confirmed => {
                if let Err(err) = self.verification.issue_email_verification(&account).await {
                    warn!("failed to issue verification email: {err}");
                }
            }
            Ok(_) => {}
            Err(err) => warn!("verification resend lookup failed: {err}"),
        }
    }

    /// Start a password reset. Always succeeds from the caller's
    /// perspective; unknown addresses are indistinguishable from known ones.
    pub async fn forgot_password(&self, email: &str) {
        let email = normalize_email(email);
        if let Err(err) = self.verification.issue_password_reset(&email).await {
            warn!("failed to issue password reset: {err}");
        }
    }

    /// Complete a password reset with a token from [`forgot_password`].
    /// A weak replacement password leaves the token unspent so the user can
    /// retry with the same link.
    ///
    /// # Errors
    /// [`AuthError::WeakPassword`], [`AuthError::InvalidOrExpiredToken`],
    /// [`AuthError::UserNotFound`], or [`AuthError::Internal`].
    ///
    /// [`forgot_password`]: AuthService::forgot_password
    pub async fn reset_password(
        &self,
        account_id: Uuid,
        token: &str,
        new_password: &str,
        confirm_password: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        if new_password != confirm_password {
            self.record_failed_reset(account_id, meta).await;
            return Err(AuthError::WeakPassword(vec![
                "Passwords do not match".to_string(),
            ]));
        }

        if let Err(err) = self
            .verification
            .complete_reset(account_id, token, new_password)
            .await
        {
            self.record_failed_reset(account_id, meta).await;
            return Err(err);
        }

        self.recorder
            .record(self.event(
                Some(account_id),
                ActivityKind::PasswordReset,
                "Password reset completed",
                true,
                meta,
            ))
            .await;
        Ok(())
    }

    /// Summarize the caller's audit trail.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] for store failures.
    pub async fn activity_summary(&self, account_id: Uuid) -> Result<ActivitySummary, AuthError> {
        self.recorder.summarize(account_id).await
    }

    /// Access token lifetime, for `expires_in` fields on session responses.
    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.config.access_token_ttl_minutes() * 60
    }

    /// Validate a bearer token for protected routes.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidToken`] for any validation failure.
    pub fn verify_bearer(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify_access_token(token)
    }

    async fn open_session(&self, account: Account) -> Result<AuthTokens, AuthError> {
        let refresh_token = self.tokens.issue_refresh_token()?;
        bounded(
            self.config.store_timeout(),
            "set refresh token",
            self.store.set_refresh_token(
                account.id,
                &token_hash(&refresh_token),
                self.refresh_expiry(),
            ),
        )
        .await?;
        let access_token = self.tokens.issue_access_token(&account)?;
        Ok(AuthTokens {
            access_token,
            refresh_token,
            account,
        })
    }

    fn refresh_expiry(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::days(self.config.refresh_token_ttl_days())
    }

    async fn record_failed_login(&self, account_id: Option<Uuid>, meta: &RequestMeta) {
        self.recorder
            .record(self.event(
                account_id,
                ActivityKind::FailedLogin,
                "Failed login attempt",
                false,
                meta,
            ))
            .await;
    }

    // Rejected registrations carry no subject: the account either does not
    // exist yet or belongs to someone else (duplicate email).
    async fn record_failed_registration(&self, meta: &RequestMeta) {
        self.recorder
            .record(self.event(
                None,
                ActivityKind::Registration,
                "Registration rejected",
                false,
                meta,
            ))
            .await;
    }

    async fn record_failed_reset(&self, account_id: Uuid, meta: &RequestMeta) {
        self.recorder
            .record(self.event(
                Some(account_id),
                ActivityKind::PasswordReset,
                "Password reset rejected",
                false,
                meta,
            ))
            .await;
    }

    async fn record_refresh(&self, account_id: Option<Uuid>, success: bool, meta: &RequestMeta) {
        let description = if success {
            "Access token refreshed"
        } else {
            "Refresh token rejected"
        };
        self.recorder
            .record(self.event(
                account_id,
                ActivityKind::TokenRefresh,
                description,
                success,
                meta,
            ))
            .await;
    }

    fn event(
        &self,
        account_id: Option<Uuid>,
        kind: ActivityKind,
        description: &str,
        success: bool,
        meta: &RequestMeta,
    ) -> NewActivity {
        NewActivity {
            account_id,
            kind,
            description: description.to_string(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            success,
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::LogEmailSender;
    use crate::store::{MemoryActivityLog, MemoryCredentialStore};
    use anyhow::Result;
    use secrecy::SecretString;

    struct Fixture {
        service: AuthService,
        store: Arc<MemoryCredentialStore>,
        log: Arc<MemoryActivityLog>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryCredentialStore::new());
        let log = Arc::new(MemoryActivityLog::new());
        let config = AuthConfig::new(
            SecretString::from("unit-test-signing-key"),
            "https://app.example.com".to_string(),
        );
        let service = AuthService::new(
            config,
            store.clone(),
            log.clone(),
            Arc::new(LogEmailSender),
        );
        Fixture {
            service,
            store,
            log,
        }
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "Sup3rSecret".to_string(),
            confirm_password: "Sup3rSecret".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    fn meta() -> RequestMeta {
        RequestMeta {
            ip_address: Some("203.0.113.7".to_string()),
            user_agent: Some("tests".to_string()),
        }
    }

    /// Register and confirm the email so login succeeds.
    async fn verified_account(fx: &Fixture, email: &str) -> Result<Account> {
        let session = fx.service.register(registration(email), &meta()).await?;
        let token = fx
            .store
            .generate_email_token(session.account.id, 3600)
            .await?;
        assert!(fx
            .service
            .verify_email(session.account.id, &token, &meta())
            .await?);
        Ok(session.account)
    }

    #[tokio::test]
    async fn register_opens_a_session_before_verification() -> Result<()> {
        let fx = fixture();
        let session = fx
            .service
            .register(registration("Ada@Example.com "), &meta())
            .await?;
        assert_eq!(session.account.email, "ada@example.com");
        assert!(!session.account.email_confirmed);
        assert!(!session.access_token.is_empty());
        assert_eq!(session.refresh_token.len(), 86);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_mismatched_passwords_and_bad_emails() {
        let fx = fixture();
        let mut bad = registration("ada@example.com");
        bad.confirm_password = "Different1".to_string();
        let err = fx.service.register(bad, &meta()).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::WeakPassword(vec!["Passwords do not match".to_string()])
        );

        let err = fx
            .service
            .register(registration("not-an-email"), &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidEmail);
    }

    #[tokio::test]
    async fn login_requires_a_verified_email() -> Result<()> {
        let fx = fixture();
        fx.service
            .register(registration("ada@example.com"), &meta())
            .await?;
        let err = fx
            .service
            .login("ada@example.com", "Sup3rSecret", &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::EmailNotVerified);
        Ok(())
    }

    #[tokio::test]
    async fn login_succeeds_after_verification_and_records_the_trail() -> Result<()> {
        let fx = fixture();
        let account = verified_account(&fx, "ada@example.com").await?;

        let session = fx
            .service
            .login("ada@example.com", "Sup3rSecret", &meta())
            .await?;
        assert_eq!(session.account.id, account.id);
        let claims = fx.service.verify_bearer(&session.access_token)?;
        assert_eq!(claims.account_id()?, account.id);

        let summary = fx.service.activity_summary(account.id).await?;
        assert_eq!(summary.login_count, 1);
        assert!(summary.last_login_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn failed_logins_are_recorded_without_attribution() -> Result<()> {
        let fx = fixture();
        verified_account(&fx, "ada@example.com").await?;

        let unknown = fx
            .service
            .login("nobody@example.com", "Sup3rSecret", &meta())
            .await
            .unwrap_err();
        let wrong = fx
            .service
            .login("ada@example.com", "WrongPassw0rd", &meta())
            .await
            .unwrap_err();
        assert_eq!(unknown, wrong);

        let failed: Vec<_> = fx
            .log
            .snapshot()
            .await
            .into_iter()
            .filter(|record| record.kind == ActivityKind::FailedLogin)
            .collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|record| record.account_id.is_none()));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rotates_and_spends_the_old_token() -> Result<()> {
        let fx = fixture();
        verified_account(&fx, "ada@example.com").await?;
        let session = fx
            .service
            .login("ada@example.com", "Sup3rSecret", &meta())
            .await?;

        let rotated = fx
            .service
            .refresh(&session.access_token, &session.refresh_token, &meta())
            .await?;
        assert_ne!(rotated.refresh_token, session.refresh_token);

        // Replaying the spent token fails.
        let err = fx
            .service
            .refresh(&session.access_token, &session.refresh_token, &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidRefreshToken);

        // The freshly rotated pair still works.
        fx.service
            .refresh(&rotated.access_token, &rotated.refresh_token, &meta())
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_tokens_signed_with_another_key() -> Result<()> {
        let fx = fixture();
        verified_account(&fx, "ada@example.com").await?;
        let session = fx
            .service
            .login("ada@example.com", "Sup3rSecret", &meta())
            .await?;

        let other = TokenService::new(&AuthConfig::new(
            SecretString::from("some-other-key"),
            "https://app.example.com".to_string(),
        ));
        let forged = other.issue_access_token(&session.account)?;
        let err = fx
            .service
            .refresh(&forged, &session.refresh_token, &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_kills_the_refresh_token_and_is_idempotent() -> Result<()> {
        let fx = fixture();
        verified_account(&fx, "ada@example.com").await?;
        let session = fx
            .service
            .login("ada@example.com", "Sup3rSecret", &meta())
            .await?;

        fx.service.revoke(&session.access_token, &meta()).await?;
        let err = fx
            .service
            .refresh(&session.access_token, &session.refresh_token, &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidRefreshToken);

        // Second revocation is still fine.
        fx.service.revoke(&session.access_token, &meta()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn change_password_keeps_existing_sessions() -> Result<()> {
        let fx = fixture();
        let account = verified_account(&fx, "ada@example.com").await?;
        let session = fx
            .service
            .login("ada@example.com", "Sup3rSecret", &meta())
            .await?;

        let err = fx
            .service
            .change_password(account.id, "WrongPassw0rd", "N3wPassword", &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::CurrentPasswordMismatch);

        fx.service
            .change_password(account.id, "Sup3rSecret", "N3wPassword", &meta())
            .await?;

        // Changing the password does not revoke the refresh token; only
        // logout and reset do. The pre-change pair still rotates.
        let rotated = fx
            .service
            .refresh(&session.access_token, &session.refresh_token, &meta())
            .await?;
        assert_ne!(rotated.refresh_token, session.refresh_token);

        fx.service
            .login("ada@example.com", "N3wPassword", &meta())
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn rejected_registrations_leave_a_failure_record() -> Result<()> {
        let fx = fixture();
        fx.service
            .register(registration("ada@example.com"), &meta())
            .await?;
        let err = fx
            .service
            .register(registration("ada@example.com"), &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::EmailExists);

        let records: Vec<_> = fx
            .log
            .snapshot()
            .await
            .into_iter()
            .filter(|record| record.kind == ActivityKind::Registration)
            .collect();
        assert_eq!(records.len(), 2);
        let failed: Vec<_> = records.iter().filter(|record| !record.success).collect();
        assert_eq!(failed.len(), 1);
        // Duplicate-email rejections are not attributed to the existing account.
        assert!(failed[0].account_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn rejected_resets_leave_a_failure_record() -> Result<()> {
        let fx = fixture();
        let account = verified_account(&fx, "ada@example.com").await?;

        let err = fx
            .service
            .reset_password(
                account.id,
                "bogus-token",
                "N3wPassword",
                "N3wPassword",
                &meta(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidOrExpiredToken);

        let failed: Vec<_> = fx
            .log
            .snapshot()
            .await
            .into_iter()
            .filter(|record| record.kind == ActivityKind::PasswordReset && !record.success)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].account_id, Some(account.id));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_refreshes_rotate_exactly_once() -> Result<()> {
        let fx = fixture();
        verified_account(&fx, "ada@example.com").await?;
        let session = fx
            .service
            .login("ada@example.com", "Sup3rSecret", &meta())
            .await?;

        let first_meta = meta();
        let second_meta = meta();
        let (first, second) = tokio::join!(
            fx.service
                .refresh(&session.access_token, &session.refresh_token, &first_meta),
            fx.service
                .refresh(&session.access_token, &session.refresh_token, &second_meta),
        );

        let mut winners = Vec::new();
        for outcome in [first, second] {
            match outcome {
                Ok(tokens) => winners.push(tokens),
                Err(err) => assert_eq!(err, AuthError::InvalidRefreshToken),
            }
        }
        assert_eq!(winners.len(), 1);

        // The surviving pair is the live one.
        fx.service
            .refresh(&winners[0].access_token, &winners[0].refresh_token, &meta())
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn verify_email_is_idempotent() -> Result<()> {
        let fx = fixture();
        let session = fx
            .service
            .register(registration("ada@example.com"), &meta())
            .await?;
        let token = fx
            .store
            .generate_email_token(session.account.id, 3600)
            .await?;

        assert!(fx
            .service
            .verify_email(session.account.id, &token, &meta())
            .await?);
        // Confirmed account: still true, even with a spent token.
        assert!(fx
            .service
            .verify_email(session.account.id, &token, &meta())
            .await?);
        // Unknown account: false, not an error.
        assert!(!fx
            .service
            .verify_email(Uuid::new_v4(), &token, &meta())
            .await?);
        Ok(())
    }

    #[tokio::test]
    async fn forgot_password_never_leaks_account_existence() -> Result<()> {
        let fx = fixture();
        verified_account(&fx, "ada@example.com").await?;
        // Neither call can fail, known address or not.
        fx.service.forgot_password("ada@example.com").await;
        fx.service.forgot_password("nobody@example.com").await;
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_spends_the_token_once() -> Result<()> {
        let fx = fixture();
        let account = verified_account(&fx, "ada@example.com").await?;
        let token = fx.store.generate_reset_token(account.id, 900).await?;

        let err = fx
            .service
            .reset_password(account.id, &token, "N3wPassword", "Different1", &meta())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::WeakPassword(vec!["Passwords do not match".to_string()])
        );

        fx.service
            .reset_password(account.id, &token, "N3wPassword", "N3wPassword", &meta())
            .await?;
        fx.service
            .login("ada@example.com", "N3wPassword", &meta())
            .await?;

        let err = fx
            .service
            .reset_password(account.id, &token, "An0therPass", "An0therPass", &meta())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidOrExpiredToken);
        Ok(())
    }
}
