//! The document store abstraction.
//!
//! [`DocumentStore`] is the small set of primitives the engine needs from a
//! backing store: filtered reads, single and conditional writes, bulk writes
//! and index management. Stores know nothing about etags or metadata records;
//! those live in the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, StorageResult};
use crate::query::{Filter, Update};
use crate::types::{BulkWriteResult, Document, ID_FIELD, SortSpec};

/// Name of the implicit index on `_id`.
pub const ID_INDEX: &str = "_id_";

/// Options for a filtered read.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Documents must match this filter.
    pub filter: Filter,
    /// Result order.
    pub sort: SortSpec,
    /// Number of matching documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Creates options for a filter with no ordering or paging.
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

/// Outcome of an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter.
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
    /// Id of the document inserted by an upsert.
    pub upserted_id: Option<Value>,
}

/// One operation of a bulk write.
#[derive(Debug, Clone)]
pub enum WriteModel {
    /// Insert a document.
    InsertOne {
        /// The document; a missing `_id` is generated.
        document: Document,
    },
    /// Replace the first matching document.
    ReplaceOne {
        /// Selects the document.
        filter: Filter,
        /// The new content; the `_id` of the matched document is kept.
        replacement: Document,
        /// Insert when nothing matches.
        upsert: bool,
    },
    /// Update the first matching document.
    UpdateOne {
        /// Selects the document.
        filter: Filter,
        /// The modifications.
        update: Update,
        /// Insert when nothing matches.
        upsert: bool,
    },
    /// Update every matching document.
    UpdateMany {
        /// Selects the documents.
        filter: Filter,
        /// The modifications.
        update: Update,
    },
    /// Delete the first matching document.
    DeleteOne {
        /// Selects the document.
        filter: Filter,
    },
    /// Delete every matching document.
    DeleteMany {
        /// Selects the documents.
        filter: Filter,
    },
}

/// An index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name, unique per collection.
    pub name: String,
    /// Key specification, e.g. `{"a": 1, "b": -1}`.
    pub keys: Document,
    /// Reject documents whose key duplicates another document's.
    #[serde(default)]
    pub unique: bool,
    /// Skip documents that lack every indexed field.
    #[serde(default)]
    pub sparse: bool,
}

impl IndexSpec {
    /// Creates a non-unique index.
    pub fn new(name: impl Into<String>, keys: Document) -> Self {
        Self {
            name: name.into(),
            keys,
            unique: false,
            sparse: false,
        }
    }

    /// The implicit unique index on `_id`.
    pub fn id_index() -> Self {
        let mut keys = Document::new();
        keys.insert(ID_FIELD.to_string(), Value::from(1));
        Self {
            unique: true,
            ..Self::new(ID_INDEX, keys)
        }
    }

    /// Builds an index from a key specification and an options document.
    ///
    /// Key directions must be `1` or `-1`. Recognized options are `unique`
    /// and `sparse`; other options are ignored.
    pub fn from_definition(
        name: impl Into<String>,
        keys: &Value,
        options: Option<&Value>,
    ) -> Result<Self, QueryError> {
        let Some(keys) = keys.as_object().filter(|k| !k.is_empty()) else {
            return Err(QueryError::InvalidIndex {
                message: "index keys must be a non-empty object".to_string(),
            });
        };
        for (field, direction) in keys {
            if !matches!(direction.as_i64(), Some(1) | Some(-1)) {
                return Err(QueryError::InvalidIndex {
                    message: format!("invalid direction for key {}", field),
                });
            }
        }

        let mut spec = Self::new(name, keys.clone());
        if let Some(options) = options {
            let Some(options) = options.as_object() else {
                return Err(QueryError::InvalidIndex {
                    message: "index options must be an object".to_string(),
                });
            };
            spec.unique = options.get("unique").and_then(Value::as_bool).unwrap_or(false);
            spec.sparse = options.get("sparse").and_then(Value::as_bool).unwrap_or(false);
        }
        Ok(spec)
    }

    /// Returns the key fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Renders the index the way listings show it.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), Value::String(self.name.clone()));
        doc.insert("key".to_string(), Value::Object(self.keys.clone()));
        if self.unique {
            doc.insert("unique".to_string(), Value::Bool(true));
        }
        if self.sparse {
            doc.insert("sparse".to_string(), Value::Bool(true));
        }
        doc
    }
}

/// Information reported by the store at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Store name.
    pub name: String,
    /// Store version.
    pub version: String,
}

/// The primitives a backing document store provides.
///
/// Collections are materialized by their first write and exist until
/// dropped; a database exists while it holds a collection. Ordering is only
/// guaranteed by [`find`].
///
/// [`find`]: DocumentStore::find
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns a human-readable name for this store.
    fn backend_name(&self) -> &'static str;

    /// Probes the store and reports its version.
    async fn server_info(&self) -> StorageResult<ServerInfo>;

    /// Lists databases holding at least one collection.
    async fn list_databases(&self) -> StorageResult<Vec<String>>;

    /// Lists the collections of a database.
    async fn list_collections(&self, db: &str) -> StorageResult<Vec<String>>;

    /// Returns true if the collection exists.
    async fn collection_exists(&self, db: &str, coll: &str) -> StorageResult<bool>;

    /// Returns the matching documents in the requested order and window.
    async fn find(&self, db: &str, coll: &str, options: &FindOptions)
    -> StorageResult<Vec<Document>>;

    /// Returns the first matching document.
    async fn find_one(&self, db: &str, coll: &str, filter: &Filter)
    -> StorageResult<Option<Document>> {
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::filtered(filter.clone())
        };
        Ok(self.find(db, coll, &options).await?.into_iter().next())
    }

    /// Counts the matching documents.
    async fn count(&self, db: &str, coll: &str, filter: &Filter) -> StorageResult<u64>;

    /// Inserts a document and returns its id. A missing `_id` is generated.
    async fn insert_one(&self, db: &str, coll: &str, document: Document) -> StorageResult<Value>;

    /// Replaces the first matching document and returns the prior version.
    ///
    /// When nothing matches and `upsert` is set, the replacement is inserted
    /// and `None` is returned. The check and the write are atomic.
    async fn find_one_and_replace(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> StorageResult<Option<Document>>;

    /// Applies an update to the first matching document.
    ///
    /// When nothing matches and `upsert` is set, a document built from the
    /// filter's equality clauses and the update is inserted.
    async fn update_one(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StorageResult<UpdateOutcome>;

    /// Applies an update to every matching document.
    async fn update_many(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
        update: &Update,
    ) -> StorageResult<UpdateOutcome>;

    /// Deletes the first matching document and returns the count removed.
    async fn delete_one(&self, db: &str, coll: &str, filter: &Filter) -> StorageResult<u64>;

    /// Deletes every matching document and returns the count removed.
    async fn delete_many(&self, db: &str, coll: &str, filter: &Filter) -> StorageResult<u64>;

    /// Runs a batch of writes.
    ///
    /// Failing items are recorded in the result. With `ordered` the batch
    /// stops at the first failure; otherwise the remaining items still run.
    async fn bulk_write(
        &self,
        db: &str,
        coll: &str,
        models: Vec<WriteModel>,
        ordered: bool,
    ) -> StorageResult<BulkWriteResult>;

    /// Drops a collection with its documents and indexes.
    async fn drop_collection(&self, db: &str, coll: &str) -> StorageResult<()>;

    /// Creates or redefines an index, materializing the collection.
    async fn create_index(&self, db: &str, coll: &str, spec: &IndexSpec) -> StorageResult<()>;

    /// Lists the indexes of a collection, the implicit `_id_` index first.
    async fn list_indexes(&self, db: &str, coll: &str) -> StorageResult<Vec<IndexSpec>>;

    /// Drops an index. Returns false if it did not exist.
    async fn drop_index(&self, db: &str, coll: &str, name: &str) -> StorageResult<bool>;
}
