//! # Concierge (Authentication & Session Lifecycle)
//!
//! `concierge` is the authentication authority for the rental platform. It
//! owns the full session lifecycle: issuing access/refresh token pairs,
//! rotating and revoking them, and the credential flows that feed into them
//! (registration, login, email verification, password reset and change).
//!
//! ## Token Model
//!
//! - **Access tokens** are short-lived HS256 JWTs (15 minutes by default)
//!   carrying the account id, email, name, and a unique `jti`.
//! - **Refresh tokens** are opaque 64-byte random values. Each account holds
//!   at most one live refresh token; every rotation atomically swaps the old
//!   value for a new one, so a stale token can never mint a session.
//!
//! ## Enumeration Defenses
//!
//! Login failures are indistinguishable between "unknown email" and "wrong
//! password". Forgot-password and resend-verification always report success
//! regardless of whether the address exists.
//!
//! ## Audit Trail
//!
//! Every credential mutation appends to an activity log. Audit writes are
//! best-effort: a failed append is logged but never fails the operation that
//! triggered it.

pub mod api;
pub mod auth;
pub mod cli;
pub mod email;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
