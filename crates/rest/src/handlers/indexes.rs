//! Index handlers.
//!
//! `GET /{db}/{coll}/_indexes` and `PUT` / `DELETE` on
//! `/{db}/{coll}/_indexes/{idx}`.

use docgate_persistence::core::{DocumentStore, IndexSpec};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{RestError, RestResult};
use crate::responses::listing::indexes_resource;
use crate::state::AppState;

fn index_name(ctx: &RequestContext) -> RestResult<String> {
    ctx.resource.index.clone().ok_or_else(|| RestError::Internal {
        message: format!("no index name resolved for {}", ctx.path),
    })
}

/// Lists the indexes of a collection, `_id_` first.
pub async fn get_indexes<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let indexes: Vec<_> = state
        .engine()
        .get_indexes(ctx.db(), ctx.coll())
        .await?
        .iter()
        .map(IndexSpec::to_document)
        .collect();

    ctx.response_content =
        Some(indexes_resource(ctx.db(), ctx.coll(), &indexes, ctx.params.is_full()).to_value());
    Ok(())
}

/// Creates an index from `{"keys": {...}, "ops": {...}}`.
///
/// # Response
///
/// - `201 Created` - Index created
/// - `400 Bad Request` - Malformed keys or options
/// - `401 Unauthorized` - Names starting with `_` are reserved
pub async fn put_index<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let name = index_name(ctx)?;
    let content = ctx.content_document()?;
    let keys = content
        .get("keys")
        .ok_or_else(|| RestError::not_acceptable("index definition requires keys"))?;

    debug!(db = %ctx.db(), coll = %ctx.coll(), index = %name, "Processing index create");

    let result = state
        .engine()
        .create_index(ctx.db(), ctx.coll(), &name, keys, content.get("ops"))
        .await?;
    ctx.apply_result(result)
}

/// Deletes an index.
///
/// # Response
///
/// - `204 No Content` - Index deleted
/// - `401 Unauthorized` - Default indexes cannot be deleted
/// - `404 Not Found` - The index does not exist
pub async fn delete_index<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let name = index_name(ctx)?;
    debug!(db = %ctx.db(), coll = %ctx.coll(), index = %name, "Processing index delete");

    let result = state
        .engine()
        .delete_index(ctx.db(), ctx.coll(), &name)
        .await?;
    ctx.apply_result(result)
}
