//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping chat, gateway and storage errors to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use tanya_chat::{ChatError, GatewayError};
use tanya_core::error::TanyaError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 403 Forbidden - resource belongs to another user.
    Forbidden(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - upstream model service failed.
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::Forbidden(_) => {
                ApiError::Forbidden("You do not have access to this conversation".to_string())
            }
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::StorageError(msg) => {
                tracing::error!(error = %msg, "Storage failure");
                ApiError::Internal("Storage failure".to_string())
            }
        }
    }
}

impl From<TanyaError> for ApiError {
    fn from(err: TanyaError) -> Self {
        match &err {
            TanyaError::Config(msg) => ApiError::BadRequest(msg.clone()),
            TanyaError::NotFound(msg) => ApiError::NotFound(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::BadGateway(format!("Failed to list models: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_chat_error_status_mapping() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(ChatError::NotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ChatError::Forbidden(id)), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ChatError::EmptyMessage), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ChatError::MessageTooLong(10)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ChatError::StorageError("disk".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_other_error_status_mapping() {
        assert_eq!(
            status_of(TanyaError::Storage("locked".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(TanyaError::Config("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(GatewayError::Timeout(30)), StatusCode::BAD_GATEWAY);
    }
}
