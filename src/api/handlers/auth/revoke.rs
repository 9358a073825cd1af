//! Logout (refresh token revocation).

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::auth::{AuthError, AuthService};

use super::utils::request_meta;
use super::{ErrorBody, error_response, extract_bearer_token};

/// Revoke the caller's refresh token. Requires a valid (unexpired) access
/// token; idempotent when no refresh token is live.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, service: Extension<Arc<AuthService>>) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return error_response(&AuthError::InvalidToken);
    };

    let meta = request_meta(&headers);
    match service.revoke(&token, &meta).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}
