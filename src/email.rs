//! Email delivery abstraction and the messages the auth flows send.
//!
//! The default sender for local dev is [`LogEmailSender`], which logs the
//! message instead of delivering it. Real deployments implement
//! [`EmailSender`] for their provider (SMTP, API, etc.).

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery seam used by the verification and reset flows.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error. Callers treat failures as
    /// non-fatal: the primary operation already succeeded.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

/// Build the verification email with its single-use link.
#[must_use]
pub fn verification_email(
    frontend_base_url: &str,
    to_email: &str,
    first_name: &str,
    account_id: Uuid,
    token: &str,
    ttl_seconds: i64,
) -> EmailMessage {
    let link = build_link(frontend_base_url, "verify-email", account_id, token);
    let expiry = humanize_ttl(ttl_seconds);
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Verify Your Email Address".to_string(),
        body: format!(
            "Hello {first_name},\n\n\
             Please verify your email address by opening the link below:\n\n\
             {link}\n\n\
             This link expires in {expiry}. If you did not create an account, \
             you can ignore this message.\n"
        ),
    }
}

/// Build the password reset email with its single-use link.
#[must_use]
pub fn password_reset_email(
    frontend_base_url: &str,
    to_email: &str,
    first_name: &str,
    account_id: Uuid,
    token: &str,
    ttl_seconds: i64,
) -> EmailMessage {
    let link = build_link(frontend_base_url, "reset-password", account_id, token);
    let expiry = humanize_ttl(ttl_seconds);
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Reset Your Password".to_string(),
        body: format!(
            "Hello {first_name},\n\n\
             We received a request to reset your password. Open the link below \
             to choose a new one:\n\n\
             {link}\n\n\
             This link expires in {expiry}. If you did not request a reset, \
             you can ignore this message.\n"
        ),
    }
}

/// Frontend deep link carrying the account id and the url-encoded token.
fn build_link(frontend_base_url: &str, page: &str, account_id: Uuid, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    format!("{base}/{page}?userId={account_id}&token={encoded}")
}

fn humanize_ttl(ttl_seconds: i64) -> String {
    if ttl_seconds >= 3600 && ttl_seconds % 3600 == 0 {
        let hours = ttl_seconds / 3600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else {
        let minutes = (ttl_seconds / 60).max(1);
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    }
}
