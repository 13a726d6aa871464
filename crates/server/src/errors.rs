use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::ServiceError;
use tracing::{error, warn};

/// Error response rendered as `{"error": <title>, "kind": <kind>, "message": <detail>}`.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub title: &'static str,
    pub kind: &'static str,
    pub message: Option<String>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, title: &'static str, kind: &'static str, message: Option<String>) -> Self {
        Self { status, title, kind, message }
    }
}

impl From<ServiceError> for JsonApiError {
    fn from(e: ServiceError) -> Self {
        let (status, title) = match &e {
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation Error"),
            ServiceError::NotFound { .. } | ServiceError::ReferenceNotFound { .. } => (StatusCode::NOT_FOUND, "Not Found"),
            ServiceError::ReferenceConflict { .. } => (StatusCode::CONFLICT, "Conflict"),
            ServiceError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
        };
        Self::new(status, title, e.kind(), Some(e.to_string()))
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, kind = self.kind, message = ?self.message, "request failed");
        } else {
            warn!(status = %self.status, kind = self.kind, message = ?self.message, "request rejected");
        }
        let body = serde_json::json!({
            "error": self.title,
            "kind": self.kind,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
