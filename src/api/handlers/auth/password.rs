//! Password change and reset endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::auth::AuthService;

use super::types::{ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::request_meta;
use super::{ErrorBody, error_response, missing_payload, require_principal};

/// Replace the caller's password after verifying the current one. Revokes
/// the live refresh token as a side effect.
#[utoipa::path(
    post,
    path = "/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak replacement", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    let claims = match require_principal(&service, &headers) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    let request: ChangePasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };
    let account_id = match claims.account_id() {
        Ok(id) => id,
        Err(err) => return error_response(&err),
    };

    let meta = request_meta(&headers);
    match service
        .change_password(
            account_id,
            &request.current_password,
            &request.new_password,
            &meta,
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

/// Start a password reset. Always 204 to avoid user enumeration.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Reset accepted")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    service.forgot_password(&request.email).await;
    StatusCode::NO_CONTENT.into_response()
}

/// Complete a password reset with an emailed token. A weak replacement
/// password leaves the token unspent so the same link can be retried.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password reset"),
        (status = 400, description = "Invalid/expired token or weak password", body = ErrorBody),
        (status = 404, description = "Unknown account", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let meta = request_meta(&headers);
    match service
        .reset_password(
            request.user_id,
            &request.token,
            &request.new_password,
            &request.confirm_password,
            &meta,
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}
