//! Error types for the persistence layer.
//!
//! This module defines all error types used throughout the persistence layer,
//! following a hierarchy that separates caller-supplied query errors, backend
//! errors (which carry the store's numeric error code), and client handle
//! lifecycle errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric error code reported by the backing document store.
///
/// The codes follow the document-store wire conventions so that data and
/// tooling written against such a store keep their meaning here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// The user lacks the privileges for the operation.
    pub const UNAUTHORIZED: ErrorCode = ErrorCode(13);
    /// Authentication against the store failed.
    pub const AUTHENTICATION_FAILED: ErrorCode = ErrorCode(18);
    /// A write to a sharded collection did not carry the shard key.
    pub const SHARD_KEY_NOT_FOUND: ErrorCode = ErrorCode(61);
    /// A write tried to change an immutable field (the shard key).
    pub const IMMUTABLE_FIELD: ErrorCode = ErrorCode(66);
    /// Two writers touched the same document inside a transaction.
    pub const WRITE_CONFLICT: ErrorCode = ErrorCode(112);
    /// The document failed the collection validator.
    pub const DOCUMENT_VALIDATION_FAILURE: ErrorCode = ErrorCode(121);
    /// The transaction was aborted or has already committed.
    pub const NO_SUCH_TRANSACTION: ErrorCode = ErrorCode(251);
    /// The transaction is too old.
    pub const TRANSACTION_TOO_OLD: ErrorCode = ErrorCode(225);
    /// The transaction has already been committed.
    pub const TRANSACTION_COMMITTED: ErrorCode = ErrorCode(256);
    /// A unique index rejected the write.
    pub const DUPLICATE_KEY: ErrorCode = ErrorCode(11000);
    /// Any failure without a more specific code.
    pub const INTERNAL: ErrorCode = ErrorCode(1);

    /// Returns the raw numeric value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Errors in caller-supplied query material (filters, sorts, updates)
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Client handle lifecycle errors
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl StorageError {
    /// Returns the store error code carried by this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            StorageError::Backend(BackendError::Coded { code, .. }) => Some(*code),
            _ => None,
        }
    }

    /// Creates a coded backend error.
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        StorageError::Backend(BackendError::Coded {
            code,
            message: message.into(),
        })
    }
}

/// Errors caused by malformed caller input that reached the engine.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The filter expression could not be parsed.
    #[error("invalid filter {expression}: {message}")]
    InvalidFilter { expression: String, message: String },

    /// The sort specification could not be parsed.
    #[error("invalid sort key '{key}': {message}")]
    InvalidSort { key: String, message: String },

    /// The update document could not be applied.
    #[error("invalid update: {message}")]
    InvalidUpdate { message: String },

    /// The index definition is not usable.
    #[error("invalid index definition: {message}")]
    InvalidIndex { message: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// An error reported by the store with a numeric code.
    #[error("store error {code}: {message}")]
    Coded { code: ErrorCode, message: String },

    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Errors from the process-wide client handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The client was used before it was initialized.
    #[error("store client not initialized")]
    NotInitialized,

    /// A second initialization was attempted.
    #[error("store client already initialized")]
    AlreadyInitialized,
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<regex::Error> for QueryError {
    fn from(err: regex::Error) -> Self {
        QueryError::InvalidFilter {
            expression: "$regex".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, ref message) = err {
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return StorageError::coded(
                    ErrorCode::DUPLICATE_KEY,
                    message
                        .clone()
                        .unwrap_or_else(|| "duplicate key error".to_string()),
                );
            }
            if failure.code == rusqlite::ErrorCode::DatabaseBusy
                || failure.code == rusqlite::ErrorCode::DatabaseLocked
            {
                return StorageError::coded(
                    ErrorCode::WRITE_CONFLICT,
                    message.clone().unwrap_or_else(|| "database is busy".to_string()),
                );
            }
            if failure.code == rusqlite::ErrorCode::PermissionDenied
                || failure.code == rusqlite::ErrorCode::ReadOnly
            {
                return StorageError::coded(
                    ErrorCode::UNAUTHORIZED,
                    message
                        .clone()
                        .unwrap_or_else(|| "permission denied".to_string()),
                );
            }
        }

        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_error_exposes_code() {
        let err = StorageError::coded(ErrorCode::DUPLICATE_KEY, "dup");
        assert_eq!(err.code(), Some(ErrorCode::DUPLICATE_KEY));
        assert_eq!(err.to_string(), "store error 11000: dup");
    }

    #[test]
    fn test_non_backend_errors_have_no_code() {
        let err: StorageError = QueryError::InvalidFilter {
            expression: "{".to_string(),
            message: "EOF".to_string(),
        }
        .into();
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("invalid filter"));
    }

    #[test]
    fn test_client_error_display() {
        assert_eq!(
            ClientError::NotInitialized.to_string(),
            "store client not initialized"
        );
        let err: StorageError = ClientError::AlreadyInitialized.into();
        assert!(matches!(err, StorageError::Client(_)));
    }

    #[test]
    fn test_serde_error_is_serialization() {
        let err: StorageError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::SerializationError { .. })
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_unique_violation_maps_to_duplicate_key() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: StorageError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert_eq!(err.code(), Some(ErrorCode::DUPLICATE_KEY));
    }
}
