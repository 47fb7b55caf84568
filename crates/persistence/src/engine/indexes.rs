//! Index operations.

use serde_json::{Value, json};
use tracing::{debug, info};

use super::Engine;
use crate::core::{DocumentStore, IndexSpec};
use crate::error::StorageResult;
use crate::types::{OperationResult, OperationStatus, RESERVED_PREFIX};

/// Indexes provisioned when a collection is created, as `(name, keys)`.
pub const DEFAULT_INDEXES: [(&str, &[(&str, i32)]); 3] = [
    ("_id_etag_idx", &[("_id", 1), ("_etag", 1)]),
    ("_etag_idx", &[("_etag", 1)]),
    ("_created_on_idx", &[("_created_on", 1)]),
];

impl<S: DocumentStore> Engine<S> {
    /// Lists the indexes of a collection.
    pub async fn get_indexes(&self, db: &str, coll: &str) -> StorageResult<Vec<IndexSpec>> {
        self.store.list_indexes(db, coll).await
    }

    /// Creates (or redefines) an index from its key specification and options.
    ///
    /// Names starting with `_` belong to the default indexes and are refused.
    pub async fn create_index(
        &self,
        db: &str,
        coll: &str,
        name: &str,
        keys: &Value,
        options: Option<&Value>,
    ) -> StorageResult<OperationResult> {
        if name.starts_with(RESERVED_PREFIX) {
            debug!(db = %db, coll = %coll, index = %name, "Refusing to define reserved index");
            return Ok(OperationResult::new(OperationStatus::Unauthorized)
                .detail(format!("{} is a reserved index name", name)));
        }

        let spec = IndexSpec::from_definition(name, keys, options)?;
        self.store.create_index(db, coll, &spec).await?;
        info!(db = %db, coll = %coll, index = %name, "Created index");
        Ok(OperationResult::new(OperationStatus::Created))
    }

    /// Deletes an index. Default indexes cannot be deleted.
    pub async fn delete_index(
        &self,
        db: &str,
        coll: &str,
        name: &str,
    ) -> StorageResult<OperationResult> {
        if name.starts_with(RESERVED_PREFIX) {
            debug!(db = %db, coll = %coll, index = %name, "Refusing to delete default index");
            return Ok(OperationResult::new(OperationStatus::Unauthorized)
                .detail(format!("{} is a default index and cannot be deleted", name)));
        }

        if self.store.drop_index(db, coll, name).await? {
            info!(db = %db, coll = %coll, index = %name, "Deleted index");
            Ok(OperationResult::new(OperationStatus::NoContent))
        } else {
            Ok(OperationResult::new(OperationStatus::NotFound)
                .detail(format!("index {} does not exist", name)))
        }
    }

    pub(super) async fn provision_default_indexes(&self, db: &str, coll: &str) -> StorageResult<()> {
        for (name, keys) in DEFAULT_INDEXES {
            let keys: serde_json::Map<String, Value> = keys
                .iter()
                .map(|(field, direction)| (field.to_string(), json!(direction)))
                .collect();
            self.store
                .create_index(db, coll, &IndexSpec::new(name, keys))
                .await?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backends::sqlite::SqliteStore;

    fn engine() -> Engine<SqliteStore> {
        Engine::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_create_and_delete_index() {
        let engine = engine();
        let created = engine
            .create_index("db", "c", "by_name", &json!({"name": 1}), Some(&json!({"unique": true})))
            .await
            .unwrap();
        assert_eq!(created.status, OperationStatus::Created);

        let indexes = engine.get_indexes("db", "c").await.unwrap();
        let by_name = indexes.iter().find(|i| i.name == "by_name").unwrap();
        assert!(by_name.unique);

        let deleted = engine.delete_index("db", "c", "by_name").await.unwrap();
        assert_eq!(deleted.status, OperationStatus::NoContent);

        let missing = engine.delete_index("db", "c", "by_name").await.unwrap();
        assert_eq!(missing.status, OperationStatus::NotFound);
    }

    #[tokio::test]
    async fn test_default_indexes_cannot_be_deleted() {
        let engine = engine();
        for name in ["_id_", "_etag_idx"] {
            let result = engine.delete_index("db", "c", name).await.unwrap();
            assert_eq!(result.status, OperationStatus::Unauthorized);
            assert_eq!(
                result.detail.as_deref(),
                Some(format!("{} is a default index and cannot be deleted", name).as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_reserved_index_names_cannot_be_defined() {
        let engine = engine();
        engine.provision_default_indexes("db", "c").await.unwrap();

        let result = engine
            .create_index("db", "c", "_etag_idx", &json!({"other": 1}), Some(&json!({"unique": true})))
            .await
            .unwrap();
        assert_eq!(result.status, OperationStatus::Unauthorized);

        let indexes = engine.get_indexes("db", "c").await.unwrap();
        let etag_idx = indexes.iter().find(|i| i.name == "_etag_idx").unwrap();
        assert!(!etag_idx.unique);
        assert!(etag_idx.keys.contains_key("_etag"));
    }

    #[tokio::test]
    async fn test_invalid_index_definition() {
        let engine = engine();
        assert!(engine.create_index("db", "c", "bad", &json!({"a": "up"}), None).await.is_err());
    }
}
