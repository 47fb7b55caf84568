//! HTTP request handlers for DocGate endpoints.
//!
//! The CRUD handlers run as the [`Crud`](crate::pipeline::Crud) stage of a
//! pipeline and work on its [`RequestContext`]:
//!
//! - [`root`] - Database and collection listings
//! - [`collection`] - Collection reads and writes, document creation, bulk writes
//! - [`document`] - Document reads and writes
//! - [`indexes`] - Index listings and writes
//!
//! The axum-facing entry points are:
//!
//! - [`dispatch`] - Resolves the endpoint and runs its pipeline
//! - [`health`] - Health check endpoint

pub mod collection;
pub mod dispatch;
pub mod document;
pub mod health;
pub mod indexes;
pub mod root;

use docgate_persistence::core::DocumentStore;
use serde_json::Value;

use crate::config::EtagPolicy;
use crate::context::RequestContext;
use crate::endpoint::Endpoint;
use crate::error::RestResult;
use crate::state::AppState;

// Re-export handlers for convenience
pub use dispatch::{dispatch_path_handler, dispatch_root_handler};
pub use health::{health_handler, liveness_handler, readiness_handler};

/// Collection property overriding the document etag policy.
pub const ETAG_DOC_POLICY: &str = "etagDocPolicy";

/// Runs the CRUD handler of the context's endpoint.
pub async fn execute<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    match ctx.endpoint {
        Endpoint::ListDatabases => root::list_databases(state, ctx).await,
        Endpoint::ListCollections => root::list_collections(state, ctx).await,
        Endpoint::GetCollection => collection::get_collection(state, ctx).await,
        Endpoint::PutCollection => collection::upsert_collection(state, ctx, false).await,
        Endpoint::PatchCollection => collection::upsert_collection(state, ctx, true).await,
        Endpoint::DeleteCollection => collection::delete_collection(state, ctx).await,
        Endpoint::PostCollection => collection::post_collection(state, ctx).await,
        Endpoint::GetCollectionSize => collection::get_collection_size(state, ctx).await,
        Endpoint::GetIndexes => indexes::get_indexes(state, ctx).await,
        Endpoint::PutIndex => indexes::put_index(state, ctx).await,
        Endpoint::DeleteIndex => indexes::delete_index(state, ctx).await,
        Endpoint::GetDocument => document::get_document(state, ctx).await,
        Endpoint::PutDocument => document::upsert_document(state, ctx, false).await,
        Endpoint::PatchDocument => document::upsert_document(state, ctx, true).await,
        Endpoint::DeleteDocument => document::delete_document(state, ctx).await,
        Endpoint::BulkPatchDocuments => collection::bulk_patch(state, ctx).await,
        Endpoint::BulkDeleteDocuments => collection::bulk_delete(state, ctx).await,
    }
}

/// Returns the etag policy for the documents of the addressed collection.
///
/// The collection's `etagDocPolicy` property overrides the configured one.
pub fn doc_etag_policy<S>(state: &AppState<S>, ctx: &RequestContext) -> EtagPolicy
where
    S: DocumentStore + 'static,
{
    ctx.collection_props
        .as_ref()
        .and_then(|record| record.get(ETAG_DOC_POLICY))
        .and_then(Value::as_str)
        .and_then(|policy| policy.parse().ok())
        .unwrap_or_else(|| state.doc_etag_policy())
}

/// Returns true if a document write or delete must present the current etag.
pub(crate) fn doc_check_etag<S>(state: &AppState<S>, ctx: &RequestContext, delete: bool) -> bool
where
    S: DocumentStore + 'static,
{
    let policy = doc_etag_policy(state, ctx);
    let required = if delete {
        policy.required_for_delete()
    } else {
        policy.required_for_write()
    };
    required || ctx.params.check_etag
}
