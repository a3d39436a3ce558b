//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.
//!
//! Bodies follow the frontend's contract: `{"error": "<message>"}`. The
//! report route also returns the error's cause chain as `stack`, and the
//! moderation routes add `"success": false`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::store::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// A required field or parameter is missing
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Document store failure, surfaced with its raw message
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Internal server error
    #[error("{0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The error message followed by every underlying cause, one per line
    pub fn stack(&self) -> String {
        let mut lines = vec![format!("{:?}", self)];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            lines.push(format!("    caused by: {}", cause));
            source = cause.source();
        }
        lines.join("\n")
    }

    /// Log the error and build the base `{error}` body
    fn report(&self) -> (StatusCode, Map<String, Value>) {
        let status = self.status();

        if status.is_server_error() {
            let request_id = uuid::Uuid::new_v4().to_string();
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(status = status.as_u16(), error_message = %self, "Request rejected");
        }

        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(self.to_string()));
        (status, body)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.report();
        (status, Json(Value::Object(body))).into_response()
    }
}

/// Error whose 5xx body carries the cause chain under `stack`
#[derive(Debug)]
pub struct StackedError {
    pub error: ApiError,
    pub expose_stack: bool,
}

impl IntoResponse for StackedError {
    fn into_response(self) -> Response {
        let (status, mut body) = self.error.report();
        if status.is_server_error() && self.expose_stack {
            body.insert("stack".to_string(), Value::String(self.error.stack()));
        }
        (status, Json(Value::Object(body))).into_response()
    }
}

/// Error for the moderation routes: `{"success": false, "error": ...}`
#[derive(Debug)]
pub struct ModerationError(pub ApiError);

impl From<ApiError> for ModerationError {
    fn from(err: ApiError) -> Self {
        ModerationError(err)
    }
}

impl From<StoreError> for ModerationError {
    fn from(err: StoreError) -> Self {
        ModerationError(ApiError::Store(err))
    }
}

impl IntoResponse for ModerationError {
    fn into_response(self) -> Response {
        let (status, mut body) = self.0.report();
        body.insert("success".to_string(), json!(false));
        (status, Json(Value::Object(body))).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::bad_request("Missing chatId").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("Chat not found").status(),
            StatusCode::NOT_FOUND
        );
        let store_err = ApiError::from(StoreError::Lock("poisoned".to_string()));
        assert_eq!(store_err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_store_message_is_raw() {
        let err = ApiError::from(StoreError::NotFound {
            collection: "chats".to_string(),
            id: "c9".to_string(),
        });
        assert_eq!(err.to_string(), "No document to update: chats/c9");
    }

    #[test]
    fn test_stack_lists_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = ApiError::from(StoreError::Io(io));
        let stack = err.stack();
        assert!(stack.starts_with("Store(Io("));
        assert!(stack.contains("caused by: disk gone"));
    }
}
