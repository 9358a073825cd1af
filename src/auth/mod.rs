//! The authentication engine: token issuance and rotation, credential
//! checks, verification/reset flows, and the audit recorder.
//!
//! Handlers talk to [`AuthService`]; everything below it is reachable
//! through the [`crate::store`] traits so tests can run on the in-memory
//! store.

use std::future::Future;
use std::time::Duration;
use tracing::error;

use crate::store::StoreError;

pub mod activity;
pub mod config;
pub mod error;
pub mod gate;
pub mod service;
pub mod token;
pub mod verification;

pub use activity::{ActivityRecorder, ActivitySummary};
pub use config::AuthConfig;
pub use error::AuthError;
pub use gate::CredentialGate;
pub use service::{AuthService, AuthTokens, Registration, RequestMeta};
pub use token::{Claims, TokenService};
pub use verification::VerificationService;

/// Run a store call with an upper bound on how long it may take. A timeout
/// surfaces as an internal error; the caller never hangs on a slow backend.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    what: &'static str,
    fut: F,
) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(AuthError::from_store(err)),
        Err(_) => {
            error!("store call timed out: {what}");
            Err(AuthError::Internal)
        }
    }
}
