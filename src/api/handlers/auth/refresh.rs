//! Token rotation.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use crate::auth::AuthService;

use super::types::{RefreshRequest, SessionResponse, UserProfile};
use super::utils::request_meta;
use super::{ErrorBody, error_response, missing_payload};

/// Exchange an expired access token and its live refresh token for a new
/// pair. The presented refresh token is spent atomically; replays fail.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session rotated", body = SessionResponse),
        (status = 401, description = "Invalid access or refresh token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let request: RefreshRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let meta = request_meta(&headers);
    match service
        .refresh(&request.access_token, &request.refresh_token, &meta)
        .await
    {
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

#[cfg(test)]
mod tests {
    use super::super::test_support::backend;
    use super::*;
    use crate::auth::{Registration, RequestMeta};
    use anyhow::Result;

    #[tokio::test]
    async fn refresh_missing_payload() {
        let backend = backend();
        let response = refresh(HeaderMap::new(), Extension(backend.service), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_rotates_then_rejects_replay() -> Result<()> {
        let backend = backend();
        let session = backend
            .service
            .register(
                Registration {
                    email: "ada@example.com".to_string(),
                    password: "Sup3rSecret".to_string(),
                    confirm_password: "Sup3rSecret".to_string(),
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                },
                &RequestMeta::default(),
            )
            .await?;

        let first = refresh(
            HeaderMap::new(),
            Extension(backend.service.clone()),
            Some(Json(RefreshRequest {
                access_token: session.access_token.clone(),
                refresh_token: session.refresh_token.clone(),
            })),
        )
        .await
        .into_response();
        assert_eq!(first.status(), StatusCode::OK);

        let replay = refresh(
            HeaderMap::new(),
            Extension(backend.service),
            Some(Json(RefreshRequest {
                access_token: session.access_token,
                refresh_token: session.refresh_token,
            })),
        )
        .await
        .into_response();
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_tokens() {
        let backend = backend();
        let response = refresh(
            HeaderMap::new(),
            Extension(backend.service),
            Some(Json(RefreshRequest {
                access_token: "not-a-jwt".to_string(),
                refresh_token: "not-a-refresh-token".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
