//! Outcomes of engine write operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::Document;
use super::etag::Etag;
use crate::error::ErrorCode;

/// The status of a write, independent of any wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    /// The resource existed and was updated (or read).
    Ok,
    /// The resource did not exist and was created.
    Created,
    /// The operation succeeded with nothing to return.
    NoContent,
    /// The resource was removed.
    Gone,
    /// The resource (or its parent) does not exist.
    NotFound,
    /// The supplied etag does not match the stored one.
    PreconditionFailed,
    /// The resource requires an etag and none was supplied.
    PreconditionRequired,
    /// The write collided with existing data.
    Conflict,
    /// The operation is not permitted on this resource.
    Unauthorized,
}

impl OperationStatus {
    /// Returns the matching HTTP status code.
    pub fn http_code(&self) -> u16 {
        match self {
            OperationStatus::Ok => 200,
            OperationStatus::Created => 201,
            OperationStatus::NoContent => 204,
            OperationStatus::Gone => 410,
            OperationStatus::NotFound => 404,
            OperationStatus::PreconditionFailed => 412,
            OperationStatus::PreconditionRequired => 428,
            OperationStatus::Conflict => 409,
            OperationStatus::Unauthorized => 401,
        }
    }

    /// Returns true for statuses that report a completed write.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OperationStatus::Ok
                | OperationStatus::Created
                | OperationStatus::NoContent
                | OperationStatus::Gone
        )
    }
}

/// The uniform outcome of an engine write.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// Final status.
    pub status: OperationStatus,
    /// The etag of the resource after the operation (or the current one when
    /// the write was refused).
    pub etag: Option<Etag>,
    /// The stored data before the write, when known.
    pub old_data: Option<Document>,
    /// The stored data after the write, when known.
    pub new_data: Option<Document>,
    /// Human readable detail for refused writes.
    pub detail: Option<String>,
}

impl OperationResult {
    /// Creates a result with only a status.
    pub fn new(status: OperationStatus) -> Self {
        Self {
            status,
            etag: None,
            old_data: None,
            new_data: None,
            detail: None,
        }
    }

    /// Creates a result with a status and an etag.
    pub fn with_etag(status: OperationStatus, etag: Option<Etag>) -> Self {
        Self {
            etag,
            ..Self::new(status)
        }
    }

    /// Sets the detail message.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Sets the prior and resulting data.
    pub fn data(mut self, old_data: Option<Document>, new_data: Option<Document>) -> Self {
        self.old_data = old_data;
        self.new_data = new_data;
        self
    }
}

/// A failed item of a bulk write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Position of the item in the request.
    pub index: usize,
    /// Store error code.
    pub code: ErrorCode,
    /// Store error message.
    pub message: String,
}

/// Counts reported by the store for a bulk write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteResult {
    /// Documents inserted.
    pub inserted: u64,
    /// Documents matched by update filters.
    pub matched: u64,
    /// Documents actually modified.
    pub modified: u64,
    /// Documents deleted.
    pub deleted: u64,
    /// Ids of documents created by upserts or inserts.
    pub upserted_ids: Vec<Value>,
    /// Per-item failures; the rest of the batch still ran.
    pub errors: Vec<BulkItemError>,
}

impl BulkWriteResult {
    /// Returns the code that decides the aggregated outcome.
    ///
    /// Duplicate-key failures take precedence over write conflicts. Other
    /// codes do not downgrade the bulk status.
    pub fn conflict_code(&self) -> Option<ErrorCode> {
        let has = |code: ErrorCode| self.errors.iter().any(|e| e.code == code);
        if has(ErrorCode::DUPLICATE_KEY) {
            Some(ErrorCode::DUPLICATE_KEY)
        } else if has(ErrorCode::WRITE_CONFLICT) {
            Some(ErrorCode::WRITE_CONFLICT)
        } else {
            None
        }
    }
}

/// Outcome of a bulk engine operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperationResult {
    /// The aggregated result.
    pub result: OperationResult,
    /// The store's counts and item errors.
    pub bulk: BulkWriteResult,
}

impl BulkOperationResult {
    /// Aggregates a store bulk result into an engine result.
    pub fn from_bulk(etag: Option<Etag>, bulk: BulkWriteResult) -> Self {
        let status = match bulk.conflict_code() {
            Some(_) => OperationStatus::Conflict,
            None => OperationStatus::Ok,
        };
        Self {
            result: OperationResult::with_etag(status, etag),
            bulk,
        }
    }

    /// Returns the status of the aggregated result.
    pub fn status(&self) -> OperationStatus {
        self.result.status
    }
}
