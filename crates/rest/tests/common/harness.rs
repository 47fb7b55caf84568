//! REST API test harness.
//!
//! Wraps an [`axum_test::TestServer`] running the full application over an
//! in-memory SQLite store.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestResponse, TestServer};
use docgate_persistence::backends::sqlite::SqliteStore;
use docgate_persistence::Engine;
use serde_json::Value;

use docgate_rest::{AppState, MetadataRegistry, ServerConfig, create_app_with_state};

/// `If-Match` request header.
pub const IF_MATCH: HeaderName = HeaderName::from_static("if-match");

/// Test harness for REST API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_read() {
///     let harness = TestHarness::new();
///     harness.create_collection("/db/coll").await;
///
///     let response = harness.server.get("/db/coll").await;
///     response.assert_status_ok();
/// }
/// ```
pub struct TestHarness {
    /// The test server instance.
    pub server: TestServer,

    /// The store behind the server.
    pub store: Arc<SqliteStore>,

    /// Server configuration.
    pub config: ServerConfig,
}

impl TestHarness {
    /// Creates a harness with the testing configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::for_testing())
    }

    /// Creates a harness with a custom configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self::with_registry(config, MetadataRegistry::with_defaults())
    }

    /// Creates a harness with a custom metadata registry.
    pub fn with_registry(config: ServerConfig, registry: MetadataRegistry) -> Self {
        let store = SqliteStore::in_memory().expect("Failed to create SQLite store");
        Self::from_store(store, config, registry)
    }

    /// Creates a harness over an existing store, e.g. a file-backed one.
    pub fn from_store(store: SqliteStore, config: ServerConfig, registry: MetadataRegistry) -> Self {
        let store = Arc::new(store);
        let state = AppState::with_registry(Arc::clone(&store), config.clone(), registry);
        let server =
            TestServer::new(create_app_with_state(state)).expect("Failed to create test server");

        Self {
            server,
            store,
            config,
        }
    }

    /// Returns an engine over the harness store, for seeding and inspection.
    pub fn engine(&self) -> Engine<SqliteStore> {
        Engine::new(Arc::clone(&self.store))
    }

    /// Creates a collection with empty metadata and returns its etag.
    pub async fn create_collection(&self, path: &str) -> String {
        self.create_collection_with(path, serde_json::json!({})).await
    }

    /// Creates a collection with the given metadata and returns its etag.
    pub async fn create_collection_with(&self, path: &str, props: Value) -> String {
        let response = self.server.put(path).json(&props).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        etag_of(&response)
    }

    /// Writes a document with PUT and returns its etag.
    pub async fn put_document(&self, path: &str, doc: Value) -> String {
        let response = self.server.put(path).json(&doc).await;
        assert!(
            response.status_code().is_success(),
            "PUT {} failed with {}: {}",
            path,
            response.status_code(),
            response.text()
        );
        etag_of(&response)
    }

    /// Reads the current etag of a resource.
    pub async fn current_etag(&self, path: &str) -> String {
        let response = self.server.get(path).await;
        response.assert_status_ok();
        etag_of(&response)
    }
}

/// Returns the `ETag` header of a response.
pub fn etag_of(response: &TestResponse) -> String {
    response
        .header("etag")
        .to_str()
        .expect("ETag header is not ASCII")
        .to_string()
}

/// Builds an `If-Match` header value.
pub fn if_match(etag: &str) -> HeaderValue {
    HeaderValue::from_str(etag).expect("Invalid etag")
}
