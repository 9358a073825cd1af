//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_signing_key: auth_opts.jwt_signing_key,
        jwt_issuer: auth_opts.jwt_issuer,
        jwt_audience: auth_opts.jwt_audience,
        access_token_ttl_minutes: auth_opts.access_token_ttl_minutes,
        refresh_token_ttl_days: auth_opts.refresh_token_ttl_days,
        frontend_base_url: auth_opts.frontend_base_url,
        email_token_ttl_seconds: auth_opts.email_token_ttl_seconds,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
        store_timeout_seconds: auth_opts.store_timeout_seconds,
        email_timeout_seconds: auth_opts.email_timeout_seconds,
    }))
}
