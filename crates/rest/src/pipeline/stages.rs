//! The standard pipeline stages.

use async_trait::async_trait;
use chrono::Utc;
use docgate_persistence::core::DocumentStore;
use docgate_persistence::query::{Filter, Update};
use docgate_persistence::types::{Document, ID_FIELD, id_to_path_segment};
use serde_json::Value;
use tracing::{debug, error, info};

use super::Stage;
use crate::config::EtagPolicy;
use crate::context::RequestContext;
use crate::endpoint::{BULK_SEGMENT, Endpoint};
use crate::error::{RestError, RestResult};
use crate::handlers::{self, ETAG_DOC_POLICY};
use crate::metadata::{
    CheckContext, CheckOutcome, Phase, Relationship, Scope, TransformContext, WriteKind, schema,
};
use crate::middleware::content_type::require_json;
use crate::params::QueryParams;
use crate::responses::CollectionRepresentation;
use crate::responses::bulk::bulk_resource;
use crate::responses::collection::SCHEMAS_COLLECTION;
use crate::responses::document::document_resource;
use crate::state::AppState;

/// Parses query parameters, the document id and the request body.
///
/// Bodies must be JSON. PUT and PATCH treat a missing body as `{}`; POST
/// requires one. Bulk writes require a filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateInput;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for ValidateInput {
    fn name(&self) -> &'static str {
        "validateInput"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() {
            return Ok(());
        }

        ctx.params = QueryParams::parse(ctx.query.as_deref(), state.config())?;

        if let Some(segment) = ctx.resource.doc.as_deref() {
            if segment != BULK_SEGMENT {
                ctx.doc_id = Some(ctx.params.id_type.to_id(segment)?);
            } else if ctx.params.filter.is_empty() {
                return Err(RestError::bad_request(
                    "the filter query parameter is mandatory for bulk writes",
                ));
            }
        }

        if !ctx.endpoint.has_body() {
            return Ok(());
        }

        let content = if ctx.body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            require_json(&ctx.headers)?;
            Some(serde_json::from_slice::<Value>(&ctx.body).map_err(RestError::InvalidJson)?)
        };

        ctx.content = Some(match (ctx.endpoint, content) {
            (Endpoint::PostCollection, None) => {
                return Err(RestError::not_acceptable("no data provided"));
            }
            (Endpoint::PostCollection, Some(content @ (Value::Object(_) | Value::Array(_)))) => {
                content
            }
            (Endpoint::PostCollection, Some(_)) => {
                return Err(RestError::not_acceptable(
                    "data must be a json object or an array of json objects",
                ));
            }
            (Endpoint::PutIndex, Some(content))
                if content.get("keys").is_some_and(Value::is_object) =>
            {
                content
            }
            (Endpoint::PutIndex, _) => {
                return Err(RestError::not_acceptable(
                    "wrong index definition, keys must be a json object",
                ));
            }
            (_, None) => Value::Object(Document::new()),
            (_, Some(content @ Value::Object(_))) => content,
            (_, Some(_)) => return Err(RestError::not_acceptable("data must be a json object")),
        });
        Ok(())
    }
}

/// Loads the metadata record of the addressed collection.
///
/// Endpoints that need an existing collection fail with 404 here.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadCollectionProps;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for LoadCollectionProps {
    fn name(&self) -> &'static str {
        "loadCollectionProps"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() {
            return Ok(());
        }
        let (Some(db), Some(coll)) = (ctx.resource.db.clone(), ctx.resource.coll.clone()) else {
            return Ok(());
        };

        if let Some(record) = state.props_cache().get(&db, &coll) {
            ctx.collection_props = Some(record);
            ctx.collection_exists = true;
        } else if let Some(record) = state.engine().get_collection_props(&db, &coll).await? {
            state.props_cache().put(&db, &coll, &record);
            ctx.collection_props = Some(record);
            ctx.collection_exists = true;
        } else {
            ctx.collection_exists = state.engine().collection_exists(&db, &coll).await?;
        }

        if ctx.endpoint.requires_collection() && !ctx.collection_exists {
            return Err(RestError::not_found(format!(
                "collection /{}/{} does not exist",
                db, coll
            )));
        }
        Ok(())
    }
}

/// Validates the declarative blocks of collection metadata before it is
/// stored.
///
/// A PATCH is validated on the properties it would produce, so blocks
/// written through update operators are checked too.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataValidation;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for MetadataValidation {
    fn name(&self) -> &'static str {
        "metadataValidation"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() || !ctx.endpoint.writes_collection() {
            return Ok(());
        }
        let content = if ctx.endpoint == Endpoint::PatchCollection {
            let mut merged = state
                .engine()
                .get_collection_props(ctx.db(), ctx.coll())
                .await?
                .map(|record| record.properties().clone())
                .unwrap_or_default();
            Update::parse(&ctx.content_document()?)?.apply(&mut merged)?;
            merged
        } else {
            ctx.content_document()?
        };
        state.registry().validate(&content)?;

        if let Some(policy) = content.get(ETAG_DOC_POLICY) {
            policy
                .as_str()
                .ok_or_else(|| format!("{} must be a string", ETAG_DOC_POLICY))
                .and_then(str::parse::<EtagPolicy>)
                .map_err(RestError::not_acceptable)?;
        }
        Ok(())
    }
}

/// Refuses schema documents written to `_schemas` that use keywords the
/// `jsonSchema` checker cannot evaluate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaStoreValidation;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for SchemaStoreValidation {
    fn name(&self) -> &'static str {
        "schemaStoreValidation"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() || ctx.coll() != SCHEMAS_COLLECTION {
            return Ok(());
        }

        let schemas: Vec<Document> = match (ctx.endpoint, &ctx.content) {
            (Endpoint::PostCollection, Some(Value::Array(items))) => {
                items.iter().filter_map(Value::as_object).cloned().collect()
            }
            (Endpoint::PatchDocument, _) => {
                let mut merged = match &ctx.doc_id {
                    Some(id) => state
                        .engine()
                        .get_document(ctx.db(), ctx.coll(), id, &Filter::all())
                        .await?
                        .unwrap_or_default(),
                    None => Document::new(),
                };
                Update::parse(&ctx.content_document()?)?.apply(&mut merged)?;
                vec![merged]
            }
            (Endpoint::BulkPatchDocuments, _) => {
                let mut patched = Document::new();
                Update::parse(&ctx.content_document()?)?.apply(&mut patched)?;
                vec![patched]
            }
            _ => vec![ctx.content_document()?],
        };

        for doc in schemas {
            let unsupported = schema::unsupported_keywords(&Value::Object(doc));
            if !unsupported.is_empty() {
                return Err(RestError::not_acceptable(format!(
                    "invalid schema, {}",
                    unsupported.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn transform_context(ctx: &RequestContext) -> (String, String, Option<String>) {
    let user_agent = ctx
        .headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (ctx.method.to_string(), ctx.path.clone(), user_agent)
}

/// Runs the REQUEST transformers on the incoming content.
///
/// An array body is transformed document by document.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTransformers;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for RequestTransformers {
    fn name(&self) -> &'static str {
        "requestTransformers"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() {
            return Ok(());
        }
        let transformers = state.registry().transformers(&ctx.props(), Phase::Request)?;
        if transformers.is_empty() {
            return Ok(());
        }

        let (method, path, user_agent) = transform_context(ctx);
        let tctx = TransformContext {
            method: &method,
            path: &path,
            remote_addr: ctx.remote_addr,
            user_agent: user_agent.as_deref(),
            now: Utc::now(),
        };

        let docs: Vec<&mut Document> = match ctx.content.as_mut() {
            Some(Value::Object(doc)) => vec![doc],
            Some(Value::Array(items)) => items.iter_mut().filter_map(Value::as_object_mut).collect(),
            _ => Vec::new(),
        };
        for doc in docs {
            for active in &transformers {
                active.transformer.transform(doc, &tctx);
            }
        }
        Ok(())
    }
}

/// Runs the declared checkers on the write content.
///
/// A PATCH is checked on the document it would produce. JSON schemas are
/// loaded from the `_schemas` collection the checker names.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checkers;

impl Checkers {
    fn write_kind(ctx: &RequestContext) -> WriteKind {
        match (ctx.endpoint, &ctx.content) {
            (Endpoint::PostCollection, Some(Value::Array(_))) => WriteKind::BulkCreate,
            (Endpoint::PutDocument, _) => WriteKind::Replace,
            (Endpoint::PatchDocument, _) => WriteKind::Patch,
            (Endpoint::BulkPatchDocuments, _) => WriteKind::BulkPatch,
            _ => WriteKind::Create,
        }
    }

    async fn stored<S: DocumentStore + 'static>(
        state: &AppState<S>,
        db: &str,
        coll: &str,
        id: &Value,
    ) -> RestResult<Option<Document>> {
        Ok(state
            .engine()
            .get_document(db, coll, id, &Filter::all())
            .await?)
    }
}

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for Checkers {
    fn name(&self) -> &'static str {
        "checkers"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() {
            return Ok(());
        }
        let checkers = state.registry().checkers(&ctx.props())?;
        if checkers.is_empty() {
            return Ok(());
        }
        let kind = Self::write_kind(ctx);
        let (db, coll) = (ctx.db().to_string(), ctx.coll().to_string());

        for active in &checkers {
            let Some(schema) = active.checker.schema_ref() else {
                continue;
            };
            let store_db = schema.store_db.clone().unwrap_or_else(|| db.clone());
            let key = format!("{}/{}", store_db, id_to_path_segment(&schema.id));
            if ctx.schemas.contains_key(&key) {
                continue;
            }
            let found = state
                .engine()
                .get_document(&store_db, SCHEMAS_COLLECTION, &schema.id, &Filter::all())
                .await?;
            match found {
                Some(doc) => {
                    ctx.schemas.insert(key, Value::Object(doc));
                }
                None => debug!(schema = %key, "Schema not found"),
            }
        }

        // each checked document with the stored one it would overwrite
        let mut targets: Vec<(Document, Option<Document>, WriteKind)> = Vec::new();
        match (kind, &ctx.content) {
            (WriteKind::Patch | WriteKind::Replace, _) => {
                let existing = match &ctx.doc_id {
                    Some(id) => Self::stored(state, &db, &coll, id).await?,
                    None => None,
                };
                let doc = if kind == WriteKind::Patch {
                    let mut merged = existing.clone().unwrap_or_default();
                    Update::parse(&ctx.content_document()?)?.apply(&mut merged)?;
                    merged
                } else {
                    ctx.content_document()?
                };
                targets.push((doc, existing, kind));
            }
            (WriteKind::BulkCreate, Some(Value::Array(items))) => {
                for doc in items.iter().filter_map(Value::as_object) {
                    let existing = match doc.get(ID_FIELD) {
                        Some(id) => Self::stored(state, &db, &coll, id).await?,
                        None => None,
                    };
                    targets.push((doc.clone(), existing, kind));
                }
            }
            _ => {
                let doc = ctx.content_document()?;
                // a POST carrying an _id replaces that document
                let existing = match (kind, doc.get(ID_FIELD)) {
                    (WriteKind::Create, Some(id)) => Self::stored(state, &db, &coll, id).await?,
                    _ => None,
                };
                let doc_kind = if existing.is_some() { WriteKind::Replace } else { kind };
                targets.push((doc, existing, doc_kind));
            }
        }

        for active in &checkers {
            let name = active.directive.name.clone();
            if !active.checker.supports(kind) {
                if active.directive.skip_not_supported {
                    debug!(checker = %name, kind = ?kind, "Skipping checker");
                    continue;
                }
                return Err(RestError::CheckFailed {
                    checker: name,
                    reason: format!("the checker does not support {:?} requests", kind),
                });
            }

            let schema = active.checker.schema_ref().and_then(|schema| {
                let store_db = schema.store_db.as_deref().unwrap_or(&db);
                let key = format!("{}/{}", store_db, id_to_path_segment(&schema.id));
                ctx.schemas.get(&key)
            });
            for (doc, existing, doc_kind) in &targets {
                let check_ctx = CheckContext {
                    kind: *doc_kind,
                    existing: existing.as_ref(),
                    schema,
                };
                if let CheckOutcome::Fail(reason) = active.checker.check(doc, &check_ctx) {
                    return Err(RestError::CheckFailed {
                        checker: name,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Runs the handler of the endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crud;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for Crud {
    fn name(&self) -> &'static str {
        "crud"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() {
            return Ok(());
        }
        handlers::execute(state, ctx).await
    }
}

/// Runs the RESPONSE transformers.
///
/// `THIS` transformers apply to the addressed resource, `CHILDREN`
/// transformers to each embedded document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTransformers;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for ResponseTransformers {
    fn name(&self) -> &'static str {
        "responseTransformers"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() {
            return Ok(());
        }
        let transformers = state.registry().transformers(&ctx.props(), Phase::Response)?;
        if transformers.is_empty() {
            return Ok(());
        }

        let (method, path, user_agent) = transform_context(ctx);
        let tctx = TransformContext {
            method: &method,
            path: &path,
            remote_addr: ctx.remote_addr,
            user_agent: user_agent.as_deref(),
            now: Utc::now(),
        };

        for active in &transformers {
            match active.directive.scope {
                Scope::This => {
                    if let Some(data) = ctx.data.as_mut() {
                        active.transformer.transform(data, &tctx);
                    }
                }
                Scope::Children => {
                    for child in ctx.children.iter_mut() {
                        active.transformer.transform(child, &tctx);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Builds the HAL representation of reads and bulk writes.
///
/// Listings are rendered by their handlers; single writes answer with an
/// empty body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Representation;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for Representation {
    fn name(&self) -> &'static str {
        "representation"
    }

    async fn handle(&self, state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        if ctx.in_error() || ctx.response_content.is_some() {
            return Ok(());
        }

        if let Some(bulk) = &ctx.bulk_result {
            let content = bulk_resource(&ctx.collection_path(), bulk, state.debug_errors());
            ctx.response_content = Some(content.to_value());
            return Ok(());
        }

        let full = ctx.params.is_full();
        let content = match ctx.endpoint {
            Endpoint::GetCollection => {
                let page = ctx.params.page();
                CollectionRepresentation {
                    db: ctx.db(),
                    coll: ctx.coll(),
                    props: ctx.collection_props.as_ref(),
                    properties: ctx.data.as_ref(),
                    children: &ctx.children,
                    size: ctx.size,
                    page: page.page,
                    pagesize: page.pagesize,
                    mode: ctx.params.hal,
                    no_props: ctx.params.no_props,
                }
                .build()
                .to_value()
            }
            Endpoint::GetDocument => {
                let Some(doc) = ctx.data.as_ref() else {
                    return Ok(());
                };
                let relationships = if full {
                    Relationship::parse_all(&ctx.props())?
                } else {
                    Vec::new()
                };
                document_resource(
                    &ctx.collection_path(),
                    ctx.db(),
                    doc,
                    Some(&ctx.path),
                    full,
                    &relationships,
                )
                .to_value()
            }
            _ => return Ok(()),
        };
        ctx.response_content = Some(content);
        Ok(())
    }
}

/// Logs the outcome of the request. Runs even after a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Finalize;

#[async_trait]
impl<S: DocumentStore + 'static> Stage<S> for Finalize {
    fn name(&self) -> &'static str {
        "finalize"
    }

    async fn handle(&self, _state: &AppState<S>, ctx: &mut RequestContext) -> RestResult<()> {
        let status = ctx.response_status.as_u16();
        let duration_ms = ctx.elapsed().as_millis() as u64;
        if ctx.response_status.is_server_error() {
            error!(method = %ctx.method, path = %ctx.path, status, duration_ms, "Request failed");
        } else {
            info!(method = %ctx.method, path = %ctx.path, status, duration_ms, "Request completed");
        }
        Ok(())
    }
}
