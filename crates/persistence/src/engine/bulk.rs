//! Bulk document operations.
//!
//! A bulk write stamps one etag on every document it touches. Item failures
//! do not abort the batch; they are reported in the result, and a duplicate
//! key or write conflict among them downgrades the overall status.

use serde_json::Value;
use tracing::{debug, warn};

use super::Engine;
use crate::core::{DocumentStore, WriteModel};
use crate::error::StorageResult;
use crate::query::{Filter, Update};
use crate::types::{
    BulkOperationResult, BulkWriteResult, Document, ETAG_FIELD, ID_FIELD, Etag,
    strip_server_fields,
};

fn log_outcome(db: &str, coll: &str, op: &str, result: &BulkWriteResult) {
    if result.errors.is_empty() {
        debug!(db = %db, coll = %coll, op, matched = result.matched, modified = result.modified,
            inserted = result.inserted, deleted = result.deleted, "Bulk write done");
    } else {
        warn!(db = %db, coll = %coll, op, errors = result.errors.len(), "Bulk write had failing items");
    }
}

impl<S: DocumentStore> Engine<S> {
    /// Inserts or replaces many documents.
    ///
    /// Documents with an `_id` replace the stored document of that id (when
    /// it also matches `filter`) or are inserted; the others are inserted
    /// with a generated id.
    pub async fn bulk_upsert_documents(
        &self,
        db: &str,
        coll: &str,
        documents: Vec<Document>,
        filter: &Filter,
    ) -> StorageResult<BulkOperationResult> {
        let etag = Etag::generate();
        let models = documents
            .into_iter()
            .map(|doc| {
                let id = doc.get(ID_FIELD).cloned();
                let mut content = doc;
                strip_server_fields(&mut content);
                content.insert(ETAG_FIELD.to_string(), Value::String(etag.to_string()));

                match id {
                    Some(id) => {
                        let mut target = Filter::eq(ID_FIELD, id).and(Filter::data());
                        if !filter.is_empty() {
                            target = target.and(filter.clone());
                        }
                        WriteModel::ReplaceOne {
                            filter: target,
                            replacement: content,
                            upsert: true,
                        }
                    }
                    None => WriteModel::InsertOne { document: content },
                }
            })
            .collect();

        let result = self.store.bulk_write(db, coll, models, false).await?;
        log_outcome(db, coll, "upsert", &result);
        Ok(BulkOperationResult::from_bulk(Some(etag), result))
    }

    /// Applies a patch to every data document matching `filter`.
    pub async fn bulk_patch_documents(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
        patch: &Document,
    ) -> StorageResult<BulkOperationResult> {
        let mut patch = patch.clone();
        strip_server_fields(&mut patch);

        let etag = Etag::generate();
        let update = Update::parse(&patch)?.set(ETAG_FIELD, Value::String(etag.to_string()));
        let models = vec![WriteModel::UpdateMany {
            filter: Filter::data().and(filter.clone()),
            update,
        }];

        let result = self.store.bulk_write(db, coll, models, false).await?;
        log_outcome(db, coll, "patch", &result);
        Ok(BulkOperationResult::from_bulk(Some(etag), result))
    }

    /// Deletes every data document matching `filter`.
    pub async fn bulk_delete_documents(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
    ) -> StorageResult<BulkOperationResult> {
        let models = vec![WriteModel::DeleteMany {
            filter: Filter::data().and(filter.clone()),
        }];

        let result = self.store.bulk_write(db, coll, models, false).await?;
        log_outcome(db, coll, "delete", &result);
        Ok(BulkOperationResult::from_bulk(None, result))
    }
}
