//! API handlers for Concierge.
//!
//! Auth endpoints live under [`auth`]; `/health` and `/` report liveness
//! and build metadata.

pub mod auth;
pub mod health;
pub mod root;
