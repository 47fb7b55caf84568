//! Core storage abstractions.
//!
//! - [`DocumentStore`] - the primitives a backing document store provides
//! - [`ClientCell`] - the write-once handle holding the process's store client

mod client;
mod store;

pub use client::ClientCell;
pub use store::{
    DocumentStore, FindOptions, ID_INDEX, IndexSpec, ServerInfo, UpdateOutcome, WriteModel,
};
