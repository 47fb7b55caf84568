//! Single document operations.

use serde_json::Value;
use tracing::debug;

use super::{Engine, delete_precondition, write_precondition};
use crate::core::DocumentStore;
use crate::error::StorageResult;
use crate::query::{Filter, Update};
use crate::types::{
    Document, ETAG_FIELD, ID_FIELD, Etag, OperationResult, OperationStatus, document_etag,
    strip_server_fields,
};

/// Filter addressing a data document by id, narrowed by `filter`.
fn by_id(id: &Value, filter: &Filter) -> Filter {
    let base = Filter::eq(ID_FIELD, id.clone()).and(Filter::data());
    if filter.is_empty() {
        base
    } else {
        base.and(filter.clone())
    }
}

fn etag_value(etag: &Etag) -> Value {
    Value::String(etag.to_string())
}

impl<S: DocumentStore> Engine<S> {
    /// Reads a document by id. The metadata record is never returned.
    pub async fn get_document(
        &self,
        db: &str,
        coll: &str,
        id: &Value,
        filter: &Filter,
    ) -> StorageResult<Option<Document>> {
        self.store.find_one(db, coll, &by_id(id, filter)).await
    }

    /// Creates or updates a document.
    ///
    /// `filter` narrows the write: if a document with the id exists but does
    /// not match it, the write fails with a duplicate key error.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_document(
        &self,
        db: &str,
        coll: &str,
        id: &Value,
        filter: &Filter,
        content: Document,
        etag: Option<&Etag>,
        patching: bool,
        check_etag: bool,
    ) -> StorageResult<OperationResult> {
        let existing = self.store.find_one(db, coll, &by_id(id, &Filter::all())).await?;

        if patching && existing.is_none() {
            return Ok(OperationResult::new(OperationStatus::NotFound)
                .detail(format!("document {} does not exist", id)));
        }
        if let Some(doc) = &existing {
            let current = document_etag(doc);
            if let Some(refused) = write_precondition(current.as_ref(), etag, check_etag) {
                debug!(db = %db, coll = %coll, id = %id, status = ?refused.status, "Document write refused");
                return Ok(refused);
            }
        }

        let mut content = content;
        strip_server_fields(&mut content);
        let new_etag = Etag::generate();
        let exists = existing.is_some();

        let mut target = by_id(id, filter);
        if let Some(etag) = etag {
            target = target.and(Filter::eq(ETAG_FIELD, etag_value(etag)));
        }
        // a narrowing filter that rejects an existing id surfaces as a duplicate key
        let upsert = !exists || !filter.is_empty();

        let written = if patching {
            let update = Update::parse(&content)?.set(ETAG_FIELD, etag_value(&new_etag));
            let outcome = self.store.update_one(db, coll, &target, &update, upsert).await?;
            outcome.matched > 0 || outcome.upserted_id.is_some()
        } else {
            let mut replacement = Document::new();
            replacement.insert(ID_FIELD.to_string(), id.clone());
            replacement.extend(content);
            replacement.insert(ETAG_FIELD.to_string(), etag_value(&new_etag));
            let old = self
                .store
                .find_one_and_replace(db, coll, &target, replacement, upsert)
                .await?;
            old.is_some() || upsert
        };

        if !written {
            debug!(db = %db, coll = %coll, id = %id, "Document etag changed during write");
            let current = self.get_document(db, coll, id, &Filter::all()).await?;
            return Ok(OperationResult::with_etag(
                OperationStatus::PreconditionFailed,
                current.as_ref().and_then(document_etag),
            )
            .detail("The ETag does not match the current version"));
        }

        let status = if exists {
            OperationStatus::Ok
        } else {
            OperationStatus::Created
        };
        let new_data = self.get_document(db, coll, id, &Filter::all()).await?;
        Ok(OperationResult::with_etag(status, Some(new_etag)).data(existing, new_data))
    }

    /// Inserts a new document. Without an `_id` one is generated.
    pub async fn insert_document(
        &self,
        db: &str,
        coll: &str,
        content: Document,
    ) -> StorageResult<OperationResult> {
        let id = content.get(ID_FIELD).cloned();
        let mut content = content;
        strip_server_fields(&mut content);

        let new_etag = Etag::generate();
        let mut document = Document::new();
        if let Some(id) = id {
            document.insert(ID_FIELD.to_string(), id);
        }
        document.extend(content);
        document.insert(ETAG_FIELD.to_string(), etag_value(&new_etag));

        let id = self.store.insert_one(db, coll, document).await?;
        debug!(db = %db, coll = %coll, id = %id, "Inserted document");
        let new_data = self.get_document(db, coll, &id, &Filter::all()).await?;
        Ok(OperationResult::with_etag(OperationStatus::Created, Some(new_etag)).data(None, new_data))
    }

    /// Deletes a document.
    pub async fn delete_document(
        &self,
        db: &str,
        coll: &str,
        id: &Value,
        filter: &Filter,
        etag: Option<&Etag>,
        check_etag: bool,
    ) -> StorageResult<OperationResult> {
        let Some(existing) = self.get_document(db, coll, id, filter).await? else {
            return Ok(OperationResult::new(OperationStatus::NotFound));
        };

        let current = document_etag(&existing);
        if let Some(refused) = delete_precondition(current.as_ref(), etag, check_etag) {
            debug!(db = %db, coll = %coll, id = %id, "Document delete refused");
            return Ok(refused);
        }

        let mut target = by_id(id, filter);
        if let Some(etag) = etag {
            target = target.and(Filter::eq(ETAG_FIELD, etag_value(etag)));
        }
        if self.store.delete_one(db, coll, &target).await? == 0 {
            let current = self.get_document(db, coll, id, &Filter::all()).await?;
            let status = if current.is_some() {
                OperationStatus::PreconditionFailed
            } else {
                OperationStatus::NotFound
            };
            return Ok(OperationResult::with_etag(
                status,
                current.as_ref().and_then(document_etag),
            ));
        }

        Ok(OperationResult::new(OperationStatus::NoContent).data(Some(existing), None))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::backends::sqlite::SqliteStore;
    use crate::error::ErrorCode;

    fn engine() -> Engine<SqliteStore> {
        Engine::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn put(engine: &Engine<SqliteStore>, id: &str, body: Value, etag: Option<&Etag>) -> OperationResult {
        engine
            .upsert_document("db", "c", &json!(id), &Filter::all(), doc(body), etag, false, false)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_create_then_replace() {
        let engine = engine();
        let created = put(&engine, "d", json!({"a": 1, "b": 1}), None).await;
        assert_eq!(created.status, OperationStatus::Created);
        let first = created.etag.unwrap();

        let replaced = put(&engine, "d", json!({"a": 2}), None).await;
        assert_eq!(replaced.status, OperationStatus::Ok);
        let second = replaced.etag.unwrap();
        assert_ne!(first, second);

        let stored = engine
            .get_document("db", "c", &json!("d"), &Filter::all())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(stored), json!({"_id": "d", "a": 2, "_etag": second.as_str()}));
    }

    #[tokio::test]
    async fn test_patch_is_idempotent_in_content() {
        let engine = engine();
        put(&engine, "d", json!({"a": 1}), None).await;

        let patch = |engine: &Engine<SqliteStore>| {
            let engine = engine.clone();
            async move {
                engine
                    .upsert_document("db", "c", &json!("d"), &Filter::all(), doc(json!({"b": 2})), None, true, false)
                    .await
                    .unwrap()
            }
        };
        let first = patch(&engine).await;
        let mut after_first = first.new_data.unwrap();
        let second = patch(&engine).await;
        let mut after_second = second.new_data.unwrap();

        assert_ne!(first.etag, second.etag);
        after_first.remove(ETAG_FIELD);
        after_second.remove(ETAG_FIELD);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_patch_missing_document_is_not_found() {
        let engine = engine();
        let result = engine
            .upsert_document("db", "c", &json!("nope"), &Filter::all(), doc(json!({"a": 1})), None, true, false)
            .await
            .unwrap();
        assert_eq!(result.status, OperationStatus::NotFound);
    }

    #[tokio::test]
    async fn test_document_etag_preconditions() {
        let engine = engine();
        let etag = put(&engine, "d", json!({}), None).await.etag.unwrap();

        let required = engine
            .upsert_document("db", "c", &json!("d"), &Filter::all(), doc(json!({})), None, false, true)
            .await
            .unwrap();
        assert_eq!(required.status, OperationStatus::PreconditionRequired);

        let stale = put(&engine, "d", json!({}), Some(&Etag::from("stale"))).await;
        assert_eq!(stale.status, OperationStatus::PreconditionFailed);
        assert_eq!(stale.etag, Some(etag.clone()));

        let current = put(&engine, "d", json!({}), Some(&etag)).await;
        assert_eq!(current.status, OperationStatus::Ok);
    }

    #[tokio::test]
    async fn test_narrowing_filter_mismatch_is_duplicate_key() {
        let engine = engine();
        put(&engine, "d", json!({"owner": "a"}), None).await;

        let err = engine
            .upsert_document(
                "db",
                "c",
                &json!("d"),
                &Filter::eq("owner", json!("b")),
                doc(json!({"x": 1})),
                None,
                false,
                false,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DUPLICATE_KEY));
    }

    #[tokio::test]
    async fn test_metadata_id_is_not_a_document() {
        let engine = engine();
        engine
            .upsert_collection("db", "c", Document::new(), None, false, false)
            .await
            .unwrap();
        let found = engine
            .get_document("db", "c", &json!("_properties"), &Filter::all())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_insert_generates_id_and_etag() {
        let engine = engine();
        let result = engine
            .insert_document("db", "c", doc(json!({"a": 1, "_etag": "client"})))
            .await
            .unwrap();
        assert_eq!(result.status, OperationStatus::Created);
        let stored = result.new_data.unwrap();
        assert!(stored["_id"].is_string());
        assert_eq!(stored["_etag"], json!(result.etag.unwrap().as_str()));
    }

    #[tokio::test]
    async fn test_delete_document() {
        let engine = engine();
        let etag = put(&engine, "d", json!({}), None).await.etag.unwrap();

        let refused = engine
            .delete_document("db", "c", &json!("d"), &Filter::all(), Some(&Etag::from("x")), false)
            .await
            .unwrap();
        assert_eq!(refused.status, OperationStatus::PreconditionFailed);

        let deleted = engine
            .delete_document("db", "c", &json!("d"), &Filter::all(), Some(&etag), true)
            .await
            .unwrap();
        assert_eq!(deleted.status, OperationStatus::NoContent);

        let missing = engine
            .delete_document("db", "c", &json!("d"), &Filter::all(), None, false)
            .await
            .unwrap();
        assert_eq!(missing.status, OperationStatus::NotFound);
    }
}
