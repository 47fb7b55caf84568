//! Database and collection operations.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Engine, delete_precondition, write_precondition};
use crate::core::{DocumentStore, FindOptions};
use crate::error::{QueryError, StorageResult};
use crate::query::{Filter, Update};
use crate::types::{
    CREATED_ON_FIELD, Document, ETAG_FIELD, Etag, MetadataRecord, OperationResult,
    OperationStatus, Page, SortSpec, strip_server_fields,
};

impl<S: DocumentStore> Engine<S> {
    /// Lists every database.
    pub async fn list_databases(&self) -> StorageResult<Vec<String>> {
        self.store.list_databases().await
    }

    /// Lists the collections of a database.
    pub async fn list_collections(&self, db: &str) -> StorageResult<Vec<String>> {
        self.store.list_collections(db).await
    }

    /// Returns true if the collection exists.
    pub async fn collection_exists(&self, db: &str, coll: &str) -> StorageResult<bool> {
        self.store.collection_exists(db, coll).await
    }

    /// Returns the metadata record of a collection, if it has one.
    pub async fn get_collection_props(
        &self,
        db: &str,
        coll: &str,
    ) -> StorageResult<Option<MetadataRecord>> {
        Ok(self
            .store
            .find_one(db, coll, &Filter::metadata())
            .await?
            .map(MetadataRecord::from_document))
    }

    /// Counts the data documents matching `filter`.
    pub async fn get_collection_size(
        &self,
        db: &str,
        coll: &str,
        filter: &Filter,
    ) -> StorageResult<u64> {
        self.store
            .count(db, coll, &Filter::data().and(filter.clone()))
            .await
    }

    /// Returns one page of the data documents matching `filter`.
    ///
    /// An empty sort orders by ascending `_id`.
    pub async fn get_collection_data(
        &self,
        db: &str,
        coll: &str,
        page: Page,
        sort: &SortSpec,
        filter: &Filter,
    ) -> StorageResult<Vec<Document>> {
        let options = FindOptions {
            filter: Filter::data().and(filter.clone()),
            sort: sort.clone().or_default_order(),
            skip: page.skip(),
            limit: Some(page.pagesize),
        };
        if page.pagesize == 0 {
            return Ok(Vec::new());
        }
        self.store.find(db, coll, &options).await
    }

    /// Creates or updates the metadata record of a collection.
    ///
    /// A write that finds no record creates the collection and its default
    /// indexes. With `patching` the content is merged into the record (update
    /// operators are honoured); otherwise it replaces every client property
    /// while the creation time is kept.
    pub async fn upsert_collection(
        &self,
        db: &str,
        coll: &str,
        content: Document,
        etag: Option<&Etag>,
        patching: bool,
        check_etag: bool,
    ) -> StorageResult<OperationResult> {
        let existing = self.get_collection_props(db, coll).await?;

        if patching && existing.is_none() {
            return Ok(OperationResult::new(OperationStatus::NotFound)
                .detail(format!("collection /{}/{} does not exist", db, coll)));
        }
        if let Some(record) = &existing {
            if let Some(refused) = write_precondition(record.etag(), etag, check_etag) {
                debug!(db = %db, coll = %coll, status = ?refused.status, "Collection write refused");
                return Ok(refused);
            }
        }

        let mut content = content;
        strip_server_fields(&mut content);
        let new_etag = Etag::generate();
        let exists = existing.is_some();

        let mut filter = Filter::metadata();
        if let Some(etag) = etag {
            filter = filter.and(Filter::eq(ETAG_FIELD, Value::String(etag.to_string())));
        }

        let written = if patching {
            // patching requires an existing record, so this never upserts
            let update =
                Update::parse(&content)?.set(ETAG_FIELD, Value::String(new_etag.to_string()));
            if update.touches(CREATED_ON_FIELD) {
                return Err(QueryError::InvalidUpdate {
                    message: format!("{} cannot be updated", CREATED_ON_FIELD),
                }
                .into());
            }
            let outcome = self.store.update_one(db, coll, &filter, &update, false).await?;
            outcome.matched > 0
        } else {
            let created_on = match existing.as_ref().and_then(MetadataRecord::created_on) {
                Some(created_on) => created_on,
                None => {
                    if exists {
                        warn!(db = %db, coll = %coll, "Metadata record has no creation time, using now");
                    }
                    Utc::now()
                }
            };
            let record = MetadataRecord::new(content, new_etag.clone(), created_on);
            let old = self
                .store
                .find_one_and_replace(db, coll, &filter, record.into_document(), !exists)
                .await?;
            old.is_some() || !exists
        };

        if !written {
            debug!(db = %db, coll = %coll, "Collection etag changed during write");
            let current = self.get_collection_props(db, coll).await?;
            return Ok(OperationResult::with_etag(
                OperationStatus::PreconditionFailed,
                current.and_then(|r| r.etag().cloned()),
            )
            .detail("The ETag does not match the current version"));
        }

        let status = if exists {
            OperationStatus::Ok
        } else {
            self.provision_default_indexes(db, coll).await?;
            info!(db = %db, coll = %coll, "Created collection");
            OperationStatus::Created
        };

        let new_data = self
            .get_collection_props(db, coll)
            .await?
            .map(|r| r.to_props());
        Ok(OperationResult::with_etag(status, Some(new_etag))
            .data(existing.map(|r| r.to_props()), new_data))
    }

    /// Deletes a collection with its documents and indexes.
    pub async fn delete_collection(
        &self,
        db: &str,
        coll: &str,
        etag: Option<&Etag>,
        check_etag: bool,
    ) -> StorageResult<OperationResult> {
        if !self.store.collection_exists(db, coll).await? {
            return Ok(OperationResult::new(OperationStatus::NotFound));
        }

        let existing = self.get_collection_props(db, coll).await?;
        let current = existing.as_ref().and_then(MetadataRecord::etag);
        if let Some(refused) = delete_precondition(current, etag, check_etag) {
            debug!(db = %db, coll = %coll, "Collection delete refused");
            return Ok(refused);
        }

        if let Some(etag) = etag {
            let filter =
                Filter::metadata().and(Filter::eq(ETAG_FIELD, Value::String(etag.to_string())));
            if self.store.delete_one(db, coll, &filter).await? == 0 {
                let current = self.get_collection_props(db, coll).await?;
                return Ok(OperationResult::with_etag(
                    OperationStatus::PreconditionFailed,
                    current.and_then(|r| r.etag().cloned()),
                ));
            }
        }

        self.store.drop_collection(db, coll).await?;
        info!(db = %db, coll = %coll, "Deleted collection");
        Ok(OperationResult::new(OperationStatus::Gone).data(existing.map(|r| r.to_props()), None))
    }
}
