//! Error to HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};
use vellum_error::{VellumError, VellumErrorKind};

/// HTTP status for an engine error.
pub fn status_for(err: &VellumError) -> StatusCode {
    match err.kind() {
        VellumErrorKind::Validation(_) | VellumErrorKind::Configuration(_) => StatusCode::BAD_REQUEST,
        VellumErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
        VellumErrorKind::Conflict(_) => StatusCode::CONFLICT,
        VellumErrorKind::Provider(_)
        | VellumErrorKind::Publish(_)
        | VellumErrorKind::Database(_)
        | VellumErrorKind::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error returned by API handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Reject malformed input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Report a disabled feature.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    /// Status code of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<VellumError> for ApiError {
    fn from(err: VellumError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(error = %err, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %err, "Request rejected");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
