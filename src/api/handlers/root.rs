use axum::{http::StatusCode, response::IntoResponse};

// axum handler for the undocumented root route
pub async fn root() -> impl IntoResponse {
    (StatusCode::OK, crate::APP_USER_AGENT)
}
