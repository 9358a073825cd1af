//! Login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::auth::AuthService;

use super::types::{LoginRequest, SessionResponse, UserProfile};
use super::utils::request_meta;
use super::{ErrorBody, error_response, missing_payload};

/// Authenticate with email and password. Unknown email and wrong password
/// return the same 401 body.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionResponse),
        (status = 401, description = "Invalid credentials or unverified email", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let meta = request_meta(&headers);
    match service.login(&request.email, &request.password, &meta).await {
        Ok(session) => {
            let response = SessionResponse {
                user: UserProfile::from(&session.account),
                access_token: session.access_token,
                refresh_token: session.refresh_token,
                expires_in: service.access_token_ttl_seconds(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => error_response(&err),
    }
}
