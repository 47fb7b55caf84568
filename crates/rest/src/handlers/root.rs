//! Database and collection listing handlers.
//!
//! `GET /` and `GET /{db}`

use docgate_persistence::core::DocumentStore;
use docgate_persistence::types::{MetadataRecord, Page, is_reserved_name};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{RestError, RestResult};
use crate::responses::listing::{db_resource, root_resource};
use crate::state::AppState;

/// Lists the databases.
///
/// # HTTP Request
///
/// `GET /`
///
/// # Response
///
/// - `200 OK` - One `rh:db` child per database on the requested page
pub async fn list_databases<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    debug!("Processing database listing request");

    let dbs: Vec<String> = state
        .engine()
        .list_databases()
        .await?
        .into_iter()
        .filter(|db| !is_reserved_name(db))
        .collect();
    let size = dbs.len() as u64;
    let page = page_of(&dbs, ctx.params.page());

    ctx.response_content = Some(root_resource(page, size, ctx.params.is_full()).to_value());
    Ok(())
}

/// Lists the collections of a database.
///
/// Each child carries the collection properties unless `np` is set.
///
/// # HTTP Request
///
/// `GET /{db}`
///
/// # Response
///
/// - `200 OK` - One `rh:coll` child per collection on the requested page
/// - `404 Not Found` - The database holds no collection
pub async fn list_collections<S>(state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()>
where
    S: DocumentStore + 'static,
{
    let db = ctx.db().to_string();
    debug!(db = %db, "Processing collection listing request");

    let colls: Vec<String> = state.engine().list_collections(&db).await?;
    if colls.is_empty() {
        return Err(RestError::not_found(format!("database {} does not exist", db)));
    }
    let colls: Vec<String> = colls.into_iter().filter(|c| !is_reserved_name(c)).collect();
    let size = colls.len() as u64;

    let mut entries = Vec::new();
    for coll in page_of(&colls, ctx.params.page()) {
        let props = if ctx.params.no_props {
            None
        } else {
            state
                .engine()
                .get_collection_props(&db, coll)
                .await?
                .map(|record| MetadataRecord::to_props(&record))
        };
        entries.push((coll.clone(), props));
    }

    ctx.response_content = Some(db_resource(&db, &entries, size, ctx.params.is_full()).to_value());
    Ok(())
}

/// Returns the slice of `items` on `page`.
fn page_of<T>(items: &[T], page: Page) -> &[T] {
    let start = usize::try_from(page.skip()).unwrap_or(usize::MAX).min(items.len());
    let len = usize::try_from(page.pagesize).unwrap_or(usize::MAX);
    let end = start.saturating_add(len).min(items.len());
    &items[start..end]
}
