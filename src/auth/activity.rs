//! Audit trail recorder and the per-account summary.
//!
//! Recording never fails the flow that triggered it: a lost audit row is
//! logged and swallowed, the login or reset still completes.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::timeout;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AuthError, bounded};
use crate::store::{ActivityKind, ActivityLogStore, ActivityRecord, NewActivity};

/// Aggregated view of one account's audit trail.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActivitySummary {
    pub total_activities: usize,
    pub successful: usize,
    pub failed: usize,
    pub login_count: usize,
    pub failed_login_count: usize,
    pub profile_update_count: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_activity_at: Option<OffsetDateTime>,
}

pub struct ActivityRecorder {
    store: Arc<dyn ActivityLogStore>,
    timeout: Duration,
}

impl ActivityRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn ActivityLogStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Append an audit event. Failures are logged, never propagated.
    pub async fn record(&self, activity: NewActivity) {
        let kind = activity.kind;
        match timeout(self.timeout, self.store.append(activity)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(kind = kind.as_str(), "failed to record activity: {err}");
            }
            Err(_) => {
                warn!(kind = kind.as_str(), "activity append timed out");
            }
        }
    }

    /// Summarize one account's trail. Counts cover every recorded event;
    /// `last_login_at` looks only at successful logins.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] for store failures.
    pub async fn summarize(&self, account_id: Uuid) -> Result<ActivitySummary, AuthError> {
        let records = bounded(
            self.timeout,
            "list activity",
            self.store.list_for_account(account_id),
        )
        .await?;
        Ok(summarize_records(&records))
    }
}

fn summarize_records(records: &[ActivityRecord]) -> ActivitySummary {
    let successful = records.iter().filter(|record| record.success).count();
    let count_kind = |kind: ActivityKind| records.iter().filter(|r| r.kind == kind).count();
    ActivitySummary {
        total_activities: records.len(),
        successful,
        failed: records.len() - successful,
        login_count: count_kind(ActivityKind::Login),
        failed_login_count: count_kind(ActivityKind::FailedLogin),
        profile_update_count: count_kind(ActivityKind::ProfileUpdate),
        last_login_at: records
            .iter()
            .filter(|record| record.kind == ActivityKind::Login && record.success)
            .map(|record| record.created_at)
            .max(),
        last_activity_at: records.iter().map(|record| record.created_at).max(),
    }
}
