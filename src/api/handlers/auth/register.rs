//! Account registration.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::auth::{AuthService, Registration};

use super::types::{RegisterRequest, SessionResponse, UserProfile};
use super::utils::request_meta;
use super::{ErrorBody, error_response, missing_payload};

/// Create an account and open a session. The verification email goes out
/// before the response; login stays blocked until the link is used.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid email or weak password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let meta = request_meta(&headers);
    let registration = Registration {
        email: request.email,
        password: request.password,
        confirm_password: request.confirm_password,
        first_name: request.first_name,
        last_name: request.last_name,
    };

    match service.register(registration, &meta).await {
        Ok(session) => {
            let response = SessionResponse {
                user: UserProfile::from(&session.account),
                access_token: session.access_token,
                refresh_token: session.refresh_token,
                expires_in: service.access_token_ttl_seconds(),
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => error_response(&err),
    }
}
