//! Engine configuration.

use secrecy::SecretString;
use std::time::Duration;

const DEFAULT_ISSUER: &str = "concierge";
const DEFAULT_AUDIENCE: &str = "concierge";
const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;
const DEFAULT_EMAIL_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_CALL_TIMEOUT_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_key: SecretString,
    issuer: String,
    audience: String,
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
    email_token_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    frontend_base_url: String,
    store_timeout: Duration,
    email_timeout: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_key: SecretString, frontend_base_url: String) -> Self {
        Self {
            signing_key,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            email_token_ttl_seconds: DEFAULT_EMAIL_TOKEN_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            frontend_base_url,
            store_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECONDS),
            email_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: String) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_email_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.email_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_store_timeout_seconds(mut self, seconds: u64) -> Self {
        self.store_timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_email_timeout_seconds(mut self, seconds: u64) -> Self {
        self.email_timeout = Duration::from_secs(seconds);
        self
    }

    pub(crate) fn signing_key(&self) -> &SecretString {
        &self.signing_key
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn access_token_ttl_minutes(&self) -> i64 {
        self.access_token_ttl_minutes
    }

    #[must_use]
    pub fn refresh_token_ttl_days(&self) -> i64 {
        self.refresh_token_ttl_days
    }

    #[must_use]
    pub fn email_token_ttl_seconds(&self) -> i64 {
        self.email_token_ttl_seconds
    }

    #[must_use]
    pub fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    #[must_use]
    pub fn email_timeout(&self) -> Duration {
        self.email_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_token_lifecycle() {
        let config = AuthConfig::new(
            SecretString::from("test-signing-key"),
            "https://app.example.com".to_string(),
        );
        assert_eq!(config.access_token_ttl_minutes(), 15);
        assert_eq!(config.refresh_token_ttl_days(), 7);
        assert_eq!(config.email_token_ttl_seconds(), 86_400);
        assert_eq!(config.reset_token_ttl_seconds(), 900);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = AuthConfig::new(
            SecretString::from("test-signing-key"),
            "https://app.example.com".to_string(),
        )
        .with_issuer("https://auth.example.com".to_string())
        .with_audience("example-clients".to_string())
        .with_access_token_ttl_minutes(5)
        .with_store_timeout_seconds(1);
        assert_eq!(config.issuer(), "https://auth.example.com");
        assert_eq!(config.audience(), "example-clients");
        assert_eq!(config.access_token_ttl_minutes(), 5);
        assert_eq!(config.store_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn debug_redacts_signing_key() {
        let config = AuthConfig::new(
            SecretString::from("super-secret"),
            "https://app.example.com".to_string(),
        );
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
