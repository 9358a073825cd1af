//! Session, credential, and verification endpoints.
//!
//! Every handler takes its payload as `Option<Json<T>>` so a missing body is
//! a 400 instead of an axum rejection, and maps engine errors through
//! [`error_response`] so status codes stay consistent across routes.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthError, AuthService, Claims};

pub mod activity;
pub mod login;
pub mod password;
pub mod refresh;
pub mod register;
pub mod revoke;
pub mod types;
pub mod utils;
pub mod verification;

/// JSON error payload shared by all auth endpoints.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Map an engine error to its HTTP response.
pub(super) fn error_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::InvalidCredentials
        | AuthError::EmailNotVerified
        | AuthError::InvalidToken
        | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
        AuthError::EmailExists => StatusCode::CONFLICT,
        AuthError::InvalidEmail
        | AuthError::WeakPassword(_)
        | AuthError::CurrentPasswordMismatch
        | AuthError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
        AuthError::UserNotFound => StatusCode::NOT_FOUND,
        AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        code: err.code().to_string(),
        message: err.to_string(),
        details: err.details().to_vec(),
    };
    (status, Json(body)).into_response()
}

pub(super) fn missing_payload() -> Response {
    (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response()
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the bearer token on a protected route into claims.
pub(super) fn require_principal(
    service: &Arc<AuthService>,
    headers: &HeaderMap,
) -> Result<Claims, Response> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(error_response(&AuthError::InvalidToken));
    };
    service
        .verify_bearer(&token)
        .map_err(|err| error_response(&err))
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extract_bearer_token_strips_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_bearer_token_rejects_empty_or_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn error_response_status_mapping() {
        assert_eq!(
            error_response(&AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            error_response(&AuthError::EmailExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(&AuthError::WeakPassword(vec!["too short".to_string()])).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(&AuthError::UserNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(&AuthError::Internal).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
