//! Core types for the persistence layer.
//!
//! - [`Document`] and [`MetadataRecord`] - stored data and collection metadata
//! - [`Etag`] - the optimistic-concurrency version token
//! - [`OperationResult`], [`BulkOperationResult`] - write outcomes
//! - [`SortSpec`], [`Page`] - listing order and pagination

mod document;
mod etag;
mod operation;
mod pagination;

pub use document::{
    CREATED_ON_FIELD, Document, ETAG_FIELD, ID_FIELD, LAST_UPDATED_ON_FIELD, METADATA_ID,
    MetadataRecord, RESERVED_PREFIX, SYSTEM_RESOURCES, add_last_updated_on, document_etag,
    id_to_path_segment, is_reserved_id, is_reserved_name, strip_server_fields,
};
pub use etag::Etag;
pub use operation::{
    BulkItemError, BulkOperationResult, BulkWriteResult, OperationResult, OperationStatus,
};
pub use pagination::{Page, SortKey, SortOrder, SortSpec};
