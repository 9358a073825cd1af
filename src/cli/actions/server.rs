use crate::{api, auth::AuthConfig};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_signing_key: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub frontend_base_url: String,
    pub email_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub store_timeout_seconds: u64,
    pub email_timeout_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(
        SecretString::from(args.jwt_signing_key),
        args.frontend_base_url,
    )
    .with_issuer(args.jwt_issuer)
    .with_audience(args.jwt_audience)
    .with_access_token_ttl_minutes(args.access_token_ttl_minutes)
    .with_refresh_token_ttl_days(args.refresh_token_ttl_days)
    .with_email_token_ttl_seconds(args.email_token_ttl_seconds)
    .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds)
    .with_store_timeout_seconds(args.store_timeout_seconds)
    .with_email_timeout_seconds(args.email_timeout_seconds);

    api::new(args.port, args.dsn, auth_config).await
}
