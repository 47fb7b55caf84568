//! Collection handlers.
//!
//! Reads, metadata writes, deletes, document creation and bulk writes on
//! `/{db}/{coll}`.

use axum::http::StatusCode;
use docgate_persistence::core::DocumentStore;
use docgate_persistence::query::Filter;
use docgate_persistence::types::{Document, ID_FIELD, MetadataRecord, is_reserved_id};
use serde_json::Value;
use tracing::debug;

use super::doc_check_etag;
use crate::context::RequestContext;
use crate::error::{RestError, RestResult};
use crate::metadata::directives::document_href;
use crate::responses::listing::size_resource;
use crate::state::AppState;

/// Reads a page of a collection.
///
/// The documents become the embedded children; the collection properties
/// are rendered by the representation stage.
///
/// # HTTP Request
///
/// `GET /{db}/{coll}?page=&pagesize=&sort_by=&filter=&count`
///
/// # Response
///
/// - `200 OK` - The collection page
/// - `400 Bad Request` - Malformed filter or sort
/// - `404 Not Found` - The collection does not exist
pub async fn get_collection<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());
    let filter = ctx.params.filter()?;
    let sort = ctx.params.sort()?;
    let page = ctx.params.page();

    debug!(db = %db, coll = %coll, page = page.page, pagesize = page.pagesize, "Processing collection read");

    ctx.children = state
        .engine()
        .get_collection_data(&db, &coll, page, &sort, &filter)
        .await?;
    if ctx.params.count {
        ctx.size = Some(state.engine().get_collection_size(&db, &coll, &filter).await?);
    }
    ctx.data = ctx.collection_props.as_ref().map(MetadataRecord::to_props);
    ctx.etag = ctx.collection_props.as_ref().and_then(|r| r.etag().cloned());
    Ok(())
}

/// Counts the documents of a collection.
///
/// # HTTP Request
///
/// `GET /{db}/{coll}/_size?filter=`
pub async fn get_collection_size<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());
    let filter = ctx.params.filter()?;
    let size = state.engine().get_collection_size(&db, &coll, &filter).await?;
    ctx.response_content = Some(size_resource(&db, &coll, size).to_value());
    Ok(())
}

/// Creates or updates the metadata of a collection.
///
/// PUT replaces the properties, PATCH merges into them. The first write
/// creates the collection and its default indexes.
///
/// # HTTP Request
///
/// `PUT /{db}/{coll}` or `PATCH /{db}/{coll}`
///
/// # Headers
///
/// - `If-Match` - Etag of the current metadata, required by the
///   collection etag policy or `checkEtag`
///
/// # Response
///
/// - `200 OK` - Metadata updated
/// - `201 Created` - Collection created
/// - `404 Not Found` - PATCH of a missing collection
/// - `406 Not Acceptable` - Malformed metadata
/// - `412 Precondition Failed` / `428 Precondition Required` - Etag checks
pub async fn upsert_collection<S>(
    state: &AppState<S>,
    ctx: &mut RequestContext,
    patching: bool,
) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());
    let content = ctx.content_document()?;
    let check_etag = state.coll_etag_policy().required_for_write() || ctx.params.check_etag;

    debug!(db = %db, coll = %coll, patching, if_match = ?ctx.supplied_etag, "Processing collection write");

    let result = state
        .engine()
        .upsert_collection(&db, &coll, content, ctx.supplied_etag.as_ref(), patching, check_etag)
        .await?;
    let outcome = ctx.apply_result(result);
    if outcome.is_ok() {
        state.props_cache().invalidate(&db, &coll);
    }
    outcome
}

/// Deletes a collection with its documents and indexes.
///
/// # HTTP Request
///
/// `DELETE /{db}/{coll}`
///
/// # Response
///
/// - `410 Gone` - Collection deleted
/// - `404 Not Found` - The collection does not exist
/// - `412 Precondition Failed` / `428 Precondition Required` - Etag checks
pub async fn delete_collection<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());
    let check_etag = state.coll_etag_policy().required_for_delete() || ctx.params.check_etag;

    debug!(db = %db, coll = %coll, if_match = ?ctx.supplied_etag, "Processing collection delete");

    let result = state
        .engine()
        .delete_collection(&db, &coll, ctx.supplied_etag.as_ref(), check_etag)
        .await?;
    let outcome = ctx.apply_result(result);
    if outcome.is_ok() {
        state.props_cache().invalidate(&db, &coll);
    }
    outcome
}

/// Creates documents.
///
/// An object is one document: without `_id` it is inserted with a
/// generated id, with `_id` it replaces the document of that id. An array
/// is a bulk write of its documents.
///
/// # HTTP Request
///
/// `POST /{db}/{coll}`
///
/// # Response
///
/// - `201 Created` - Document created, `Location` names it
/// - `200 OK` - Document replaced, or bulk write without conflicts
/// - `409 Conflict` - Duplicate id or index violation
pub async fn post_collection<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());

    match ctx.content.take() {
        Some(Value::Array(items)) => {
            let docs = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(doc) => Ok(doc),
                    _ => Err(RestError::not_acceptable(
                        "data must be an array of json objects",
                    )),
                })
                .collect::<RestResult<Vec<Document>>>()?;
            let filter = ctx.params.filter()?;

            debug!(db = %db, coll = %coll, count = docs.len(), "Processing bulk create");

            let result = state
                .engine()
                .bulk_upsert_documents(&db, &coll, docs, &filter)
                .await?;
            ctx.apply_bulk_result(result);
            Ok(())
        }
        Some(Value::Object(doc)) => {
            let result = match doc.get(ID_FIELD).cloned() {
                Some(id) => {
                    if is_reserved_id(&id) {
                        return Err(RestError::bad_request(format!("id {} is reserved", id)));
                    }
                    debug!(db = %db, coll = %coll, id = %id, "Processing document create with id");
                    let check_etag = doc_check_etag(state, ctx, false);
                    state
                        .engine()
                        .upsert_document(
                            &db,
                            &coll,
                            &id,
                            &Filter::all(),
                            doc,
                            ctx.supplied_etag.as_ref(),
                            false,
                            check_etag,
                        )
                        .await?
                }
                None => {
                    debug!(db = %db, coll = %coll, "Processing document create");
                    state.engine().insert_document(&db, &coll, doc).await?
                }
            };

            let created_id = result
                .new_data
                .as_ref()
                .and_then(|d| d.get(ID_FIELD))
                .cloned();
            ctx.apply_result(result)?;
            if ctx.response_status == StatusCode::CREATED {
                ctx.location = created_id.map(|id| document_href(&ctx.collection_path(), &id));
            }
            Ok(())
        }
        _ => Err(RestError::not_acceptable(
            "data must be a json object or an array of json objects",
        )),
    }
}

/// Patches every document matching the filter.
///
/// # HTTP Request
///
/// `PATCH /{db}/{coll}/*?filter=`
pub async fn bulk_patch<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());
    let filter = ctx.params.filter()?;
    let patch = ctx.content_document()?;

    debug!(db = %db, coll = %coll, "Processing bulk patch");

    let result = state
        .engine()
        .bulk_patch_documents(&db, &coll, &filter, &patch)
        .await?;
    ctx.apply_bulk_result(result);
    Ok(())
}

/// Deletes every document matching the filter.
///
/// # HTTP Request
///
/// `DELETE /{db}/{coll}/*?filter=`
pub async fn bulk_delete<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());
    let filter = ctx.params.filter()?;

    debug!(db = %db, coll = %coll, "Processing bulk delete");

    let result = state
        .engine()
        .bulk_delete_documents(&db, &coll, &filter)
        .await?;
    ctx.apply_bulk_result(result);
    Ok(())
}
