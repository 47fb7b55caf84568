//! Per-request state shared by the pipeline stages.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use docgate_persistence::types::{
    BulkOperationResult, BulkWriteResult, Document, Etag, MetadataRecord, OperationResult,
};
use serde_json::Value;

use crate::config::ServerConfig;
use crate::endpoint::{Endpoint, ResourcePath};
use crate::error::{RestError, RestResult};
use crate::middleware::ConditionalHeaders;
use crate::params::QueryParams;
use crate::responses::error::error_resource;
use crate::responses::{ResourceHeaders, hal_response};
use crate::translate::operation_status;

/// The parts of an HTTP request a pipeline needs.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Request method.
    pub method: Method,
    /// Decoded request path.
    pub path: String,
    /// Raw query string.
    pub query: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// Peer address, when known.
    pub remote_addr: Option<SocketAddr>,
}

/// The mutable record a request carries through its pipeline.
#[derive(Debug)]
pub struct RequestContext {
    /// Request method.
    pub method: Method,
    /// Decoded request path.
    pub path: String,
    /// Raw query string.
    pub query: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw request body.
    pub body: Bytes,
    /// Peer address.
    pub remote_addr: Option<SocketAddr>,
    /// The addressed endpoint.
    pub endpoint: Endpoint,
    /// Names found in the path.
    pub resource: ResourcePath,
    /// Parsed query parameters.
    pub params: QueryParams,
    /// Etag from `If-Match`.
    pub supplied_etag: Option<Etag>,
    /// Document id, typed by `id_type`.
    pub doc_id: Option<Value>,
    /// Parsed request body.
    pub content: Option<Value>,
    /// Metadata record of the addressed collection.
    pub collection_props: Option<MetadataRecord>,
    /// Whether the addressed collection exists.
    pub collection_exists: bool,
    /// Schemas loaded for schema checkers, keyed by `db/id`.
    pub schemas: HashMap<String, Value>,
    /// Outcome of the engine write.
    pub db_operation_result: Option<OperationResult>,
    /// Outcome of a bulk engine write.
    pub bulk_result: Option<BulkWriteResult>,
    /// The addressed document, after reads and writes.
    pub data: Option<Document>,
    /// Embedded documents of a listing.
    pub children: Vec<Document>,
    /// Counted size of a listing.
    pub size: Option<u64>,
    /// Response status.
    pub response_status: StatusCode,
    /// Response body.
    pub response_content: Option<Value>,
    /// Etag of the addressed resource, sent as `ETag`.
    pub etag: Option<Etag>,
    /// Path of a created resource, sent as `Location`.
    pub location: Option<String>,
    in_error: bool,
    started: Instant,
}

impl RequestContext {
    /// Creates the context of a resolved request.
    pub fn new(
        request: IncomingRequest,
        endpoint: Endpoint,
        resource: ResourcePath,
        config: &ServerConfig,
    ) -> Self {
        let supplied_etag = ConditionalHeaders::from_headers(&request.headers).into_if_match();

        Self {
            method: request.method,
            path: request.path,
            query: request.query,
            headers: request.headers,
            body: request.body,
            remote_addr: request.remote_addr,
            endpoint,
            resource,
            params: QueryParams::defaults(config),
            supplied_etag,
            doc_id: None,
            content: None,
            collection_props: None,
            collection_exists: false,
            schemas: HashMap::new(),
            db_operation_result: None,
            bulk_result: None,
            data: None,
            children: Vec::new(),
            size: None,
            response_status: StatusCode::OK,
            response_content: None,
            etag: None,
            location: None,
            in_error: false,
            started: Instant::now(),
        }
    }

    /// Database name.
    pub fn db(&self) -> &str {
        self.resource.db.as_deref().unwrap_or_default()
    }

    /// Collection name.
    pub fn coll(&self) -> &str {
        self.resource.coll.as_deref().unwrap_or_default()
    }

    /// Path of the addressed collection.
    pub fn collection_path(&self) -> String {
        format!("/{}/{}", self.db(), self.coll())
    }

    /// Client properties of the addressed collection.
    pub fn props(&self) -> Document {
        self.collection_props
            .as_ref()
            .map(|r| r.properties().clone())
            .unwrap_or_default()
    }

    /// Returns the request body as a single document.
    pub fn content_document(&self) -> RestResult<Document> {
        match &self.content {
            Some(Value::Object(doc)) => Ok(doc.clone()),
            Some(_) => Err(RestError::not_acceptable("data must be a json object")),
            None => Ok(Document::new()),
        }
    }

    /// Returns true once a stage reported an error.
    pub fn in_error(&self) -> bool {
        self.in_error
    }

    /// Renders an error into the response.
    pub fn fail(&mut self, err: &RestError, debug: bool) {
        let status = err.status();
        let message = err.client_message();
        self.in_error = true;
        self.response_status = status;
        self.response_content =
            Some(error_resource(Some(&self.path), status, Some(&message), Some(err), debug).to_value());
    }

    /// Records an engine outcome.
    ///
    /// The etag it reports is kept even for refusals, so a client can
    /// retry with the current one.
    pub fn apply_result(&mut self, result: OperationResult) -> RestResult<()> {
        if result.etag.is_some() {
            self.etag = result.etag.clone();
        }
        let status = operation_status(result.status);
        let outcome = if result.status.is_success() {
            self.response_status = status;
            Ok(())
        } else {
            let message = result
                .detail
                .clone()
                .unwrap_or_else(|| default_message(status).to_string());
            Err(RestError::Operation { status, message })
        };
        self.db_operation_result = Some(result);
        outcome
    }

    /// Records a bulk engine outcome.
    ///
    /// Item failures do not fail the request: the response reports them
    /// with 409 when one of them is a conflict.
    pub fn apply_bulk_result(&mut self, result: BulkOperationResult) {
        self.response_status = operation_status(result.status());
        self.etag = result.result.etag.clone();
        self.bulk_result = Some(result.bulk);
        self.db_operation_result = Some(result.result);
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Builds the HTTP response.
    pub fn into_response(self) -> Response {
        let mut headers = ResourceHeaders::new();
        if let Some(etag) = &self.etag {
            headers = headers.with_etag(etag);
        }
        if let Some(location) = self.location {
            headers = headers.with_location(location);
        }
        hal_response(
            self.response_status,
            headers.to_header_map(),
            self.response_content,
        )
    }
}

fn default_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "resource not found",
        StatusCode::PRECONDITION_FAILED => "The ETag does not match the current version",
        StatusCode::PRECONDITION_REQUIRED => {
            "The ETag must be provided using the 'If-Match' header"
        }
        StatusCode::CONFLICT => "The document does not fulfill filter or index constraints",
        other => other.canonical_reason().unwrap_or("request failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_persistence::types::OperationStatus;
    use axum::http::header;
    use serde_json::json;

    fn context(method: Method, path: &str, headers: HeaderMap) -> RequestContext {
        let (endpoint, resource) = Endpoint::resolve(&method, path).unwrap();
        RequestContext::new(
            IncomingRequest {
                method,
                path: path.to_string(),
                query: None,
                headers,
                body: Bytes::new(),
                remote_addr: None,
            },
            endpoint,
            resource,
            &ServerConfig::for_testing(),
        )
    }

    #[test]
    fn test_if_match_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, "\"abc\"".parse().unwrap());
        let ctx = context(Method::PUT, "/db/coll/a", headers);
        assert_eq!(ctx.supplied_etag, Some(Etag::from("abc")));
        assert_eq!(ctx.db(), "db");
        assert_eq!(ctx.collection_path(), "/db/coll");
    }

    #[test]
    fn test_refusal_keeps_etag() {
        let mut ctx = context(Method::PUT, "/db/coll/a", HeaderMap::new());
        let current = Etag::from("current");
        let err = ctx
            .apply_result(OperationResult::with_etag(
                OperationStatus::PreconditionFailed,
                Some(current.clone()),
            ))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(ctx.etag, Some(current));
        assert!(ctx.db_operation_result.is_some());
    }

    #[test]
    fn test_fail_renders_error_document() {
        let mut ctx = context(Method::GET, "/db/coll/a", HeaderMap::new());
        ctx.fail(&RestError::not_found("missing"), false);
        assert!(ctx.in_error());
        assert_eq!(ctx.response_status, StatusCode::NOT_FOUND);
        let body = ctx.response_content.as_ref().unwrap();
        assert_eq!(body["message"], json!("missing"));
        assert_eq!(body["_links"]["self"]["href"], json!("/db/coll/a"));
    }

    #[test]
    fn test_content_document() {
        let mut ctx = context(Method::PUT, "/db/coll/a", HeaderMap::new());
        assert!(ctx.content_document().unwrap().is_empty());
        ctx.content = Some(json!([1]));
        assert_eq!(
            ctx.content_document().unwrap_err().status(),
            StatusCode::NOT_ACCEPTABLE
        );
    }
}
