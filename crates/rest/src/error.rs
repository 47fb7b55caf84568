//! Error types for the DocGate REST API.
//!
//! Every error is rendered as a HAL error document (see
//! [`responses::error`](crate::responses::error)) with the matching HTTP
//! status.
//!
//! # Error Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | BadRequest, CheckFailed, query errors | 400 |
//! | NotFound | 404 |
//! | MethodNotAllowed | 405 |
//! | NotAcceptable, InvalidJson, Metadata | 406 |
//! | UnsupportedMediaType | 415 |
//! | Operation | the refused operation's status |
//! | Storage | translated from the store error code |
//! | Internal | 500 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docgate_persistence::StorageError;
use docgate_persistence::error::QueryError;
use thiserror::Error;

use crate::metadata::MetadataError;
use crate::responses::error::error_resource;
use crate::responses::hal_response;
use crate::translate::{GENERIC_ERROR_MESSAGE, storage_outcome};

/// The primary error type for REST API operations.
#[derive(Debug, Error)]
pub enum RestError {
    /// Malformed request input (HTTP 400).
    #[error("bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// A checker rejected the request content (HTTP 400).
    #[error("checker {checker} failed: {reason}")]
    CheckFailed {
        /// Name of the failing checker.
        checker: String,
        /// Why the content was rejected.
        reason: String,
    },

    /// The addressed resource does not exist (HTTP 404).
    #[error("not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
    },

    /// The method is not available on the addressed resource (HTTP 405).
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// The method that was attempted.
        method: String,
        /// The request path.
        path: String,
    },

    /// Request content has the wrong shape (HTTP 406).
    #[error("not acceptable: {message}")]
    NotAcceptable {
        /// Error message.
        message: String,
    },

    /// Request content is not valid JSON (HTTP 406).
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Collection metadata is malformed (HTTP 406).
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The request body exceeds the configured limit (HTTP 413).
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// The limit in bytes.
        limit: usize,
    },

    /// Unsupported media type (HTTP 415).
    #[error("unsupported media type: {content_type}")]
    UnsupportedMediaType {
        /// The unsupported content type.
        content_type: String,
    },

    /// The addressed feature is declared but not served (HTTP 501).
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// Description of what's not implemented.
        feature: String,
    },

    /// The engine refused the operation (precondition, missing resource,
    /// protected index).
    #[error("{message}")]
    Operation {
        /// Status of the refusal.
        status: StatusCode,
        /// Client-facing message.
        message: String,
    },

    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Any other failure (HTTP 500).
    #[error("internal error: {message}")]
    Internal {
        /// Error message, only shown with error details enabled.
        message: String,
    },
}

impl From<QueryError> for RestError {
    fn from(err: QueryError) -> Self {
        RestError::Storage(err.into())
    }
}

impl RestError {
    /// Creates a 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        RestError::NotFound {
            message: message.into(),
        }
    }

    /// Creates a 406 error.
    pub fn not_acceptable(message: impl Into<String>) -> Self {
        RestError::NotAcceptable {
            message: message.into(),
        }
    }

    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RestError::BadRequest { .. } | RestError::CheckFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            RestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RestError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RestError::NotAcceptable { .. }
            | RestError::InvalidJson(_)
            | RestError::Metadata(_) => StatusCode::NOT_ACCEPTABLE,
            RestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RestError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RestError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            RestError::Operation { status, .. } => *status,
            RestError::Storage(e) => storage_outcome(e).0,
            RestError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message shown to clients.
    ///
    /// Internal and untranslatable store failures get a generic message.
    pub fn client_message(&self) -> String {
        match self {
            RestError::BadRequest { message }
            | RestError::NotFound { message }
            | RestError::NotAcceptable { message }
            | RestError::Operation { message, .. } => message.clone(),
            RestError::CheckFailed { checker, reason } => {
                format!("request check failed. {}: {}", checker, reason)
            }
            RestError::MethodNotAllowed { method, .. } => {
                format!("method {} is not allowed on this resource", method)
            }
            RestError::InvalidJson(_) => "Invalid JSON".to_string(),
            RestError::PayloadTooLarge { limit } => {
                format!("request body exceeds the limit of {} bytes", limit)
            }
            RestError::Metadata(e) => e.to_string(),
            RestError::UnsupportedMediaType { content_type } => {
                format!("Content-Type {} is not supported, use application/json", content_type)
            }
            RestError::NotImplemented { feature } => {
                format!("{} is not supported", feature)
            }
            RestError::Storage(e) => storage_outcome(e).1,
            RestError::Internal { .. } => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Returns a stable name for the kind of error, shown in error details.
    pub fn exception_name(&self) -> &'static str {
        match self {
            RestError::BadRequest { .. } => "RestError::BadRequest",
            RestError::CheckFailed { .. } => "RestError::CheckFailed",
            RestError::NotFound { .. } => "RestError::NotFound",
            RestError::MethodNotAllowed { .. } => "RestError::MethodNotAllowed",
            RestError::NotAcceptable { .. } => "RestError::NotAcceptable",
            RestError::InvalidJson(_) => "serde_json::Error",
            RestError::Metadata(_) => "MetadataError",
            RestError::PayloadTooLarge { .. } => "RestError::PayloadTooLarge",
            RestError::UnsupportedMediaType { .. } => "RestError::UnsupportedMediaType",
            RestError::NotImplemented { .. } => "RestError::NotImplemented",
            RestError::Operation { .. } => "RestError::Operation",
            RestError::Storage(StorageError::Query(_)) => "StorageError::Query",
            RestError::Storage(StorageError::Backend(_)) => "StorageError::Backend",
            RestError::Storage(StorageError::Client(_)) => "StorageError::Client",
            RestError::Internal { .. } => "RestError::Internal",
        }
    }

    /// Returns true for failures worth an error-level log line.
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.client_message();
        let resource = error_resource(None, status, Some(&message), Some(&self), false);
        hal_response(status, axum::http::HeaderMap::new(), Some(resource.to_value()))
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_persistence::error::ErrorCode;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RestError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(RestError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RestError::not_acceptable("x").status(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            RestError::Metadata(MetadataError::Checker("x".to_string())).status(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            RestError::Operation {
                status: StatusCode::PRECONDITION_FAILED,
                message: "stale".to_string()
            }
            .status(),
            StatusCode::PRECONDITION_FAILED
        );
    }

    #[test]
    fn test_storage_errors_are_translated() {
        let err = RestError::Storage(StorageError::coded(ErrorCode::DUPLICATE_KEY, "E11000"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(
            err.client_message(),
            "The document does not fulfill filter or index constraints"
        );
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = RestError::Internal {
            message: "secret path /var/db".to_string(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.client_message().contains("secret"));
    }

    #[test]
    fn test_query_error_is_bad_request() {
        let err: RestError = QueryError::InvalidFilter {
            expression: "{".to_string(),
            message: "EOF".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.client_message().contains("invalid filter"));
    }
}
