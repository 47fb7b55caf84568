//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use docgate_persistence::backends::sqlite::SqliteStore;
use docgate_persistence::engine::Engine;
use docgate_persistence::query::Filter;
use docgate_persistence::types::{Document, Etag, OperationStatus};
use serde_json::Value;

/// An engine over a fresh in-memory store.
pub fn create_engine() -> Engine<SqliteStore> {
    let store = SqliteStore::in_memory().expect("Failed to create SQLite store");
    Engine::new(Arc::new(store))
}

/// Converts a `json!` object literal into a document.
pub fn doc(value: Value) -> Document {
    value
        .as_object()
        .cloned()
        .expect("fixture must be a JSON object")
}

/// Creates a collection with the given properties and returns its etag.
pub async fn create_collection(
    engine: &Engine<SqliteStore>,
    db: &str,
    coll: &str,
    props: Value,
) -> Etag {
    let result = engine
        .upsert_collection(db, coll, doc(props), None, false, true)
        .await
        .expect("collection create failed");
    assert_eq!(result.status, OperationStatus::Created);
    result.etag.expect("create returns an etag")
}

/// Inserts documents `{_id: n, n: n}` for `n` in `1..=count`.
pub async fn seed_numbered(engine: &Engine<SqliteStore>, db: &str, coll: &str, count: i64) {
    for n in 1..=count {
        engine
            .insert_document(db, coll, doc(serde_json::json!({"_id": n, "n": n})))
            .await
            .expect("seed insert failed");
    }
}

/// Reads a document's current etag.
pub async fn document_etag(
    engine: &Engine<SqliteStore>,
    db: &str,
    coll: &str,
    id: &Value,
) -> Option<Etag> {
    engine
        .get_document(db, coll, id, &Filter::all())
        .await
        .expect("read failed")
        .and_then(|d| docgate_persistence::types::document_etag(&d))
}
