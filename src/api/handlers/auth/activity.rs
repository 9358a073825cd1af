//! Per-account activity summary.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::auth::{ActivitySummary, AuthService};

use super::{ErrorBody, error_response, require_principal};

/// Aggregate the caller's audit trail: counts by kind and outcome plus the
/// last successful login and last activity timestamps.
#[utoipa::path(
    get,
    path = "/v1/auth/activity",
    responses(
        (status = 200, description = "Activity summary", body = ActivitySummary),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn activity_summary(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
) -> impl IntoResponse {
    let claims = match require_principal(&service, &headers) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    let account_id = match claims.account_id() {
        Ok(id) => id,
        Err(err) => return error_response(&err),
    };

    match service.activity_summary(account_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(&err),
    }
}
