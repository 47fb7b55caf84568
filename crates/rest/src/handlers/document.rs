//! Document handlers.
//!
//! `GET`, `PUT`, `PATCH` and `DELETE` on `/{db}/{coll}/{docid}`.

use docgate_persistence::core::DocumentStore;
use docgate_persistence::types::document_etag;
use serde_json::Value;
use tracing::debug;

use super::doc_check_etag;
use crate::context::RequestContext;
use crate::error::{RestError, RestResult};
use crate::state::AppState;

fn doc_id(ctx: &RequestContext) -> RestResult<Value> {
    ctx.doc_id.clone().ok_or_else(|| RestError::Internal {
        message: format!("no document id resolved for {}", ctx.path),
    })
}

/// Reads a document.
///
/// A `filter` narrows the read: a document that does not match it is
/// reported as missing.
///
/// # HTTP Request
///
/// `GET /{db}/{coll}/{docid}`
///
/// # Response
///
/// - `200 OK` - The document, with its etag in `ETag`
/// - `404 Not Found` - The document does not exist
pub async fn get_document<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let id = doc_id(ctx)?;
    let filter = ctx.params.filter()?;
    debug!(db = %ctx.db(), coll = %ctx.coll(), id = %id, "Processing document read");

    let doc = state
        .engine()
        .get_document(ctx.db(), ctx.coll(), &id, &filter)
        .await?
        .ok_or_else(|| RestError::not_found(format!("document {} does not exist", ctx.path)))?;

    ctx.etag = document_etag(&doc);
    ctx.data = Some(doc);
    Ok(())
}

/// Creates, replaces or patches a document.
///
/// # HTTP Request
///
/// `PUT /{db}/{coll}/{docid}` or `PATCH /{db}/{coll}/{docid}`
///
/// # Headers
///
/// - `If-Match` - Etag of the current version
///
/// # Response
///
/// - `200 OK` - Document updated
/// - `201 Created` - Document created (PUT only)
/// - `404 Not Found` - PATCH of a missing document
/// - `409 Conflict` - The document does not match the filter or an index
/// - `412 Precondition Failed` / `428 Precondition Required` - Etag checks
pub async fn upsert_document<S>(
    state: &AppState<S>,
    ctx: &mut RequestContext,
    patching: bool,
) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let id = doc_id(ctx)?;
    let filter = ctx.params.filter()?;
    let content = ctx.content_document()?;
    let check_etag = doc_check_etag(state, ctx, false);

    debug!(
        db = %ctx.db(),
        coll = %ctx.coll(),
        id = %id,
        patching,
        if_match = ?ctx.supplied_etag,
        "Processing document write"
    );

    let result = state
        .engine()
        .upsert_document(
            ctx.db(),
            ctx.coll(),
            &id,
            &filter,
            content,
            ctx.supplied_etag.as_ref(),
            patching,
            check_etag,
        )
        .await?;
    ctx.apply_result(result)
}

/// Deletes a document.
///
/// # HTTP Request
///
/// `DELETE /{db}/{coll}/{docid}`
///
/// # Response
///
/// - `204 No Content` - Document deleted
/// - `404 Not Found` - The document does not exist
/// - `412 Precondition Failed` - Etag checks
pub async fn delete_document<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let id = doc_id(ctx)?;
    let filter = ctx.params.filter()?;
    let check_etag = doc_check_etag(state, ctx, true);

    debug!(db = %ctx.db(), coll = %ctx.coll(), id = %id, if_match = ?ctx.supplied_etag, "Processing document delete");

    let result = state
        .engine()
        .delete_document(
            ctx.db(),
            ctx.coll(),
            &id,
            &filter,
            ctx.supplied_etag.as_ref(),
            check_etag,
        )
        .await?;
    ctx.apply_result(result)
}
