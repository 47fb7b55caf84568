//! The CRUD engine.
//!
//! [`Engine`] implements reads and writes of databases, collections,
//! documents and indexes on top of a [`DocumentStore`]. It owns the etag
//! protocol: every write stamps a fresh [`Etag`], and writes that supply an
//! etag (or are required to) only succeed when it matches the stored one.
//!
//! The metadata record of a collection and its data documents share one
//! store collection but never one query: data operations always AND
//! [`Filter::data`], metadata operations always target [`Filter::metadata`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use docgate_persistence::backends::sqlite::SqliteStore;
//! use docgate_persistence::engine::Engine;
//! use docgate_persistence::query::Filter;
//! use docgate_persistence::types::OperationStatus;
//! use serde_json::{json, Value};
//!
//! # tokio_test::block_on(async {
//! let engine = Engine::new(Arc::new(SqliteStore::in_memory().unwrap()));
//!
//! let created = engine
//!     .upsert_collection("shop", "orders", Default::default(), None, false, true)
//!     .await
//!     .unwrap();
//! assert_eq!(created.status, OperationStatus::Created);
//!
//! let content = json!({"qty": 2}).as_object().cloned().unwrap();
//! let doc = engine
//!     .upsert_document("shop", "orders", &Value::from("o1"), &Filter::all(), content, None, false, false)
//!     .await
//!     .unwrap();
//! assert_eq!(doc.status, OperationStatus::Created);
//! # });
//! ```
//!
//! [`Filter::data`]: crate::query::Filter::data
//! [`Filter::metadata`]: crate::query::Filter::metadata
//! [`Etag`]: crate::types::Etag

use std::sync::Arc;

use crate::core::DocumentStore;
use crate::types::{Etag, OperationResult, OperationStatus};

mod bulk;
mod collections;
mod documents;
mod indexes;

pub use indexes::DEFAULT_INDEXES;

/// Reads and writes resources through a document store.
pub struct Engine<S> {
    store: Arc<S>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl<S: DocumentStore> Engine<S> {
    /// Creates an engine over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// Checks the etag precondition of a write against an existing resource.
///
/// Returns the refusal to report, or `None` when the write may proceed.
fn write_precondition(
    current: Option<&Etag>,
    supplied: Option<&Etag>,
    check_etag: bool,
) -> Option<OperationResult> {
    match supplied {
        None if check_etag => Some(
            OperationResult::with_etag(OperationStatus::PreconditionRequired, current.cloned())
                .detail("The ETag must be provided using the 'If-Match' header"),
        ),
        Some(supplied) if current != Some(supplied) => Some(
            OperationResult::with_etag(OperationStatus::PreconditionFailed, current.cloned())
                .detail("The ETag does not match the current version"),
        ),
        _ => None,
    }
}

/// Checks the etag precondition of a delete.
///
/// Unlike writes, a required but missing etag is reported as a mismatch.
fn delete_precondition(
    current: Option<&Etag>,
    supplied: Option<&Etag>,
    check_etag: bool,
) -> Option<OperationResult> {
    if !check_etag && supplied.is_none() {
        return None;
    }
    match supplied {
        Some(supplied) if current == Some(supplied) => None,
        _ => Some(
            OperationResult::with_etag(OperationStatus::PreconditionFailed, current.cloned())
                .detail("The ETag must be provided using the 'If-Match' header and match the current version"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_precondition() {
        let current = Etag::from("a");
        let stale = Etag::from("b");

        let required = write_precondition(Some(&current), None, true).unwrap();
        assert_eq!(required.status, OperationStatus::PreconditionRequired);
        assert_eq!(required.etag, Some(current.clone()));

        let failed = write_precondition(Some(&current), Some(&stale), false).unwrap();
        assert_eq!(failed.status, OperationStatus::PreconditionFailed);

        assert!(write_precondition(Some(&current), Some(&current), true).is_none());
        assert!(write_precondition(Some(&current), None, false).is_none());
    }

    #[test]
    fn test_delete_precondition() {
        let current = Etag::from("a");

        let missing = delete_precondition(Some(&current), None, true).unwrap();
        assert_eq!(missing.status, OperationStatus::PreconditionFailed);

        assert!(delete_precondition(Some(&current), None, false).is_none());
        assert!(delete_precondition(Some(&current), Some(&current), true).is_none());
        assert!(delete_precondition(None, Some(&current), false).is_some());
    }
}
