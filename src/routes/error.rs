//! JSON error responses for HTTP routes.
//!
//! Each route module maps its service error to a status code; `ApiError`
//! pairs that status with the error's grepable code and message:
//! `{"code": "E_DASHBOARD_FULL", "message": "...", "retryable": false}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::frame::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    retryable: bool,
}

impl ApiError {
    /// Build from a typed service error and the status the route chose for it.
    #[must_use]
    pub fn from_service(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        if status.is_server_error() {
            tracing::error!(code = err.error_code(), error = %err, "request failed");
        }
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }

    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retryable: false }
    }

    #[must_use]
    pub fn internal(err: &impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "request failed");
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, code: "E_INTERNAL", message: "internal error".into(), retryable: true }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { code: self.code, message: &self.message, retryable: self.retryable };
        (self.status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(&err)
    }
}

impl From<crate::rate_limit::RateLimitError> for ApiError {
    fn from(err: crate::rate_limit::RateLimitError) -> Self {
        Self::from_service(StatusCode::TOO_MANY_REQUESTS, &err)
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
