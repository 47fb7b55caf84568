//! DocGate Persistence Layer
//!
//! This crate stores JSON documents in named collections grouped into
//! databases, and implements the CRUD engine behind the DocGate REST API:
//! etag-based optimistic concurrency, per-collection metadata records and
//! index management.
//!
//! # Features
//!
//! - **Document store abstraction**: [`core::DocumentStore`] with filtered
//!   reads, conditional writes and bulk writes
//! - **Embedded SQLite store**: in-memory and file modes (feature `sqlite`, on by default)
//! - **Optimistic concurrency**: every write stamps a time-ordered [`types::Etag`]
//! - **Query grammar**: filters, update operators and sort specifications
//!
//! # Architecture
//!
//! - [`types`] - Documents, metadata records, etags and operation results
//! - [`query`] - Filters, updates and value ordering
//! - [`error`] - Error types and store error codes
//! - [`core`] - The store trait and the client handle
//! - [`backends`] - Store implementations
//! - [`engine`] - The CRUD engine
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use docgate_persistence::backends::sqlite::SqliteStore;
//! use docgate_persistence::core::ClientCell;
//! use docgate_persistence::engine::Engine;
//! use docgate_persistence::types::{OperationStatus, Page, SortSpec};
//! use docgate_persistence::query::Filter;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let client = ClientCell::new();
//! let store = client.connect(SqliteStore::in_memory().unwrap()).await.unwrap();
//! let engine = Engine::new(store);
//!
//! let doc = json!({"_id": "ada", "born": 1815}).as_object().cloned().unwrap();
//! let result = engine.insert_document("people", "mathematicians", doc).await.unwrap();
//! assert_eq!(result.status, OperationStatus::Created);
//!
//! let filter = Filter::parse(r#"{"born": {"$lt": 1900}}"#).unwrap();
//! let page = engine
//!     .get_collection_data("people", "mathematicians", Page::new(1, 10), &SortSpec::default(), &filter)
//!     .await
//!     .unwrap();
//! assert_eq!(page.len(), 1);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod engine;
pub mod error;
pub mod query;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use types::{Document, Etag, MetadataRecord, OperationResult, OperationStatus};

// Re-export core traits
pub use core::{ClientCell, DocumentStore};
pub use engine::Engine;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
