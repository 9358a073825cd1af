use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_JWT_SIGNING_KEY: &str = "jwt-signing-key";

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_flow_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SIGNING_KEY)
                .long("jwt-signing-key")
                .help("HS256 signing key for access tokens")
                .env("CONCIERGE_JWT_SIGNING_KEY")
                .required(true),
        )
        .arg(
            Arg::new("jwt-issuer")
                .long("jwt-issuer")
                .help("Issuer claim for access tokens")
                .env("CONCIERGE_JWT_ISSUER")
                .default_value("concierge"),
        )
        .arg(
            Arg::new("jwt-audience")
                .long("jwt-audience")
                .help("Audience claim for access tokens")
                .env("CONCIERGE_JWT_AUDIENCE")
                .default_value("concierge"),
        )
        .arg(
            Arg::new("access-token-ttl-minutes")
                .long("access-token-ttl-minutes")
                .help("Access token TTL in minutes")
                .env("CONCIERGE_ACCESS_TOKEN_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-token-ttl-days")
                .long("refresh-token-ttl-days")
                .help("Refresh token TTL in days")
                .env("CONCIERGE_REFRESH_TOKEN_TTL_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_flow_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for verification and reset links")
                .env("CONCIERGE_FRONTEND_BASE_URL")
                .default_value("https://app.concierge.rent"),
        )
        .arg(
            Arg::new("email-token-ttl-seconds")
                .long("email-token-ttl-seconds")
                .help("Email verification token TTL in seconds")
                .env("CONCIERGE_EMAIL_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reset-token-ttl-seconds")
                .long("reset-token-ttl-seconds")
                .help("Password reset token TTL in seconds")
                .env("CONCIERGE_RESET_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("store-timeout-seconds")
                .long("store-timeout-seconds")
                .help("Upper bound for database calls in seconds")
                .env("CONCIERGE_STORE_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-timeout-seconds")
                .long("email-timeout-seconds")
                .help("Upper bound for email delivery in seconds")
                .env("CONCIERGE_EMAIL_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
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

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            jwt_signing_key: matches
                .get_one::<String>(ARG_JWT_SIGNING_KEY)
                .cloned()
                .context("missing required argument: --jwt-signing-key")?,
            jwt_issuer: matches
                .get_one::<String>("jwt-issuer")
                .cloned()
                .unwrap_or_else(|| "concierge".to_string()),
            jwt_audience: matches
                .get_one::<String>("jwt-audience")
                .cloned()
                .unwrap_or_else(|| "concierge".to_string()),
            access_token_ttl_minutes: matches
                .get_one::<i64>("access-token-ttl-minutes")
                .copied()
                .unwrap_or(15),
            refresh_token_ttl_days: matches
                .get_one::<i64>("refresh-token-ttl-days")
                .copied()
                .unwrap_or(7),
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .unwrap_or_else(|| "https://app.concierge.rent".to_string()),
            email_token_ttl_seconds: matches
                .get_one::<i64>("email-token-ttl-seconds")
                .copied()
                .unwrap_or(86_400),
            reset_token_ttl_seconds: matches
                .get_one::<i64>("reset-token-ttl-seconds")
                .copied()
                .unwrap_or(900),
            store_timeout_seconds: matches
                .get_one::<u64>("store-timeout-seconds")
                .copied()
                .unwrap_or(5),
            email_timeout_seconds: matches
                .get_one::<u64>("email-timeout-seconds")
                .copied()
                .unwrap_or(5),
        })
    }
}
