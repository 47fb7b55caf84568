//! SQLite document store.
//!
//! An embedded implementation of [`DocumentStore`](crate::core::DocumentStore),
//! usable in memory (for tests) or backed by a file.
//!
//! # Example
//!
//! ```no_run
//! use docgate_persistence::backends::sqlite::SqliteStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::in_memory()?;
//! let durable = SqliteStore::open("./data/docgate.db")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE collections (db, coll, created_at, PRIMARY KEY (db, coll));
//! CREATE TABLE documents (db, coll, id, data, PRIMARY KEY (db, coll, id));
//! CREATE TABLE indexes (db, coll, name, spec, PRIMARY KEY (db, coll, name));
//! ```

mod backend;
pub(crate) mod schema;
mod storage;

pub use backend::{SqliteStore, SqliteStoreConfig};
