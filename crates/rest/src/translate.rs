//! Translation of store outcomes into HTTP outcomes.
//!
//! | Code | HTTP Status |
//! |------|-------------|
//! | 13, 18, 66 | 403 |
//! | 61, 121 | 400 |
//! | 112, 11000 | 409 |
//! | 225, 251, 256 | 406 |
//! | anything else | 500 |

use axum::http::StatusCode;
use docgate_persistence::StorageError;
use docgate_persistence::error::ErrorCode;
use docgate_persistence::types::OperationStatus;

/// Message for failures that carry no translatable code.
pub const GENERIC_ERROR_MESSAGE: &str = "Error handling the request, see log for more information";

/// Maps a store error code to an HTTP status and a client-facing message.
pub fn translate(code: ErrorCode) -> (StatusCode, &'static str) {
    match code.value() {
        13 => (
            StatusCode::FORBIDDEN,
            "The MongoDB user does not have enough permissions to execute this operation",
        ),
        18 => (
            StatusCode::FORBIDDEN,
            "Wrong MongoDB user credentials (wrong password or need to specify the authentication dababase with 'authSource=<db>' option in mongo-uri)",
        ),
        61 => (
            StatusCode::BAD_REQUEST,
            "Write request for sharded collection must specify the shardkey. Use the 'shardkey' query parameter",
        ),
        66 => (
            StatusCode::FORBIDDEN,
            "Update tried to change the immutable shardkey",
        ),
        121 => (
            StatusCode::BAD_REQUEST,
            "Document failed collection validation",
        ),
        112 => (StatusCode::CONFLICT, "Write conflict inside transaction"),
        225 | 251 | 256 => (
            StatusCode::NOT_ACCEPTABLE,
            "The given transaction is not in-progress",
        ),
        11000 => (
            StatusCode::CONFLICT,
            "The document does not fulfill filter or index constraints",
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE),
    }
}

/// Maps a storage error to an HTTP status and message.
///
/// Query errors are the caller's fault and keep their text; coded store
/// errors go through [`translate`]; everything else is an internal error
/// whose detail stays in the log.
pub fn storage_outcome(err: &StorageError) -> (StatusCode, String) {
    match err {
        StorageError::Query(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        other => match other.code() {
            Some(code) => {
                let (status, message) = translate(code);
                (status, message.to_string())
            }
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_ERROR_MESSAGE.to_string(),
            ),
        },
    }
}

/// Returns the HTTP status of an engine outcome.
pub fn operation_status(status: OperationStatus) -> StatusCode {
    StatusCode::from_u16(status.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
