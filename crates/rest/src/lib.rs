//! # docgate-rest - HAL REST API over JSON document collections
//!
//! This crate exposes databases, collections, documents and indexes held in
//! a [`DocumentStore`] as HAL resources over HTTP. Collections carry a
//! metadata record that can declare checkers, transformers, relationships
//! and aggregations; writes use etag-based optimistic concurrency.
//!
//! ## Features
//!
//! - **CRUD**: Databases, collections, documents and indexes
//! - **Optimistic Concurrency**: `If-Match` / `ETag` with per-collection policies
//! - **Bulk Writes**: POST of arrays, filtered PATCH and DELETE
//! - **Declarative Metadata**: Checkers and transformers declared in collection metadata
//! - **HAL**: Compact and full representations with navigation links
//!
//! ## Backend Support
//!
//! Stores are configured through feature flags:
//!
//! - `sqlite` - Embedded SQLite store (default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docgate_rest::{create_app_with_config, ServerConfig};
//! use docgate_persistence::backends::sqlite::SqliteStore;
//! use docgate_persistence::core::ClientCell;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ClientCell::new();
//!     let store = client.connect(SqliteStore::open("docgate.db")?).await?;
//!
//!     let app = create_app_with_config(store, ServerConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Operation | HTTP Method | URL Pattern |
//! |-----------|-------------|-------------|
//! | list databases | GET | `/` |
//! | list collections | GET | `/{db}` |
//! | read collection | GET | `/{db}/{coll}` |
//! | write collection metadata | PUT / PATCH | `/{db}/{coll}` |
//! | delete collection | DELETE | `/{db}/{coll}` |
//! | create documents | POST | `/{db}/{coll}` |
//! | count documents | GET | `/{db}/{coll}/_size` |
//! | list indexes | GET | `/{db}/{coll}/_indexes` |
//! | create / delete index | PUT / DELETE | `/{db}/{coll}/_indexes/{idx}` |
//! | document CRUD | GET / PUT / PATCH / DELETE | `/{db}/{coll}/{docid}` |
//! | bulk patch / delete | PATCH / DELETE | `/{db}/{coll}/*?filter=` |
//!
//! ## Error Handling
//!
//! Errors are returned as HAL documents carrying `http status code`,
//! `http status description` and `message`. Store error codes are
//! translated by [`translate::translate`].
//!
//! ## Architecture
//!
//! - [`config`] - Server configuration
//! - [`error`] - Error types and error responses
//! - [`translate`] - Store error code translation
//! - [`state`] - Application state (engine, configuration, registry, cache)
//! - [`endpoint`] - Path and method resolution
//! - [`params`] - Query parameters
//! - [`context`] - Per-request context
//! - [`pipeline`] - Request pipelines and their stages
//! - [`handlers`] - CRUD handlers and HTTP entry points
//! - [`metadata`] - Checkers, transformers, relationships and aggregations
//! - [`cache`] - Metadata record cache
//! - [`middleware`] - Conditional headers, content types, request ids
//! - [`responses`] - HAL representations and headers
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod metadata;
pub mod middleware;
pub mod params;
pub mod pipeline;
pub mod responses;
pub mod routing;
pub mod state;
pub mod translate;

// Re-export commonly used types
pub use config::{EtagPolicy, HalMode, ServerConfig};
pub use context::RequestContext;
pub use endpoint::Endpoint;
pub use error::{RestError, RestResult};
pub use metadata::MetadataRegistry;
pub use pipeline::{Pipeline, Pipelines, Stage};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use docgate_persistence::core::DocumentStore;
use http::HeaderName;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::middleware::{MakeRequestUuid, REQUEST_ID_HEADER};

/// Creates the Axum application with default configuration.
///
/// This is a convenience function that creates the app with default settings.
/// For more control, use [`create_app_with_config`].
///
/// # Example
///
/// ```rust,ignore
/// use docgate_rest::create_app;
/// use docgate_persistence::backends::sqlite::SqliteStore;
///
/// let store = SqliteStore::in_memory()?;
/// let app = create_app(store);
/// ```
pub fn create_app<S>(store: S) -> Router
where
    S: DocumentStore + 'static,
{
    create_app_with_config(Arc::new(store), ServerConfig::default())
}

/// Creates the Axum application with custom configuration.
///
/// This function sets up every route, the request pipelines and the
/// middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use docgate_rest::{create_app_with_config, ServerConfig};
/// use docgate_persistence::backends::sqlite::SqliteStore;
///
/// let store = Arc::new(SqliteStore::in_memory()?);
/// let config = ServerConfig {
///     port: 3000,
///     enable_cors: true,
///     ..Default::default()
/// };
/// let app = create_app_with_config(store, config);
/// ```
pub fn create_app_with_config<S>(store: Arc<S>, config: ServerConfig) -> Router
where
    S: DocumentStore + 'static,
{
    info!(
        backend = store.backend_name(),
        "Creating REST API server"
    );

    let state = AppState::new(store, config.clone());
    create_app_with_state(state)
}

/// Creates the Axum application over prepared state, e.g. with a custom
/// [`MetadataRegistry`].
pub fn create_app_with_state<S>(state: AppState<S>) -> Router
where
    S: DocumentStore + 'static,
{
    let config = state.config().clone();
    let router = routing::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ));

    // Add CORS if enabled
    let router = if config.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    let router = if config.enable_request_id {
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        router
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(SetRequestIdLayer::new(header, MakeRequestUuid))
    } else {
        router
    };

    // Apply remaining middleware
    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    // Configure origins
    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Configure methods
    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    // Configure headers
    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    // Clients read the etag of the resource they wrote
    cors.expose_headers([http::header::ETAG, http::header::LOCATION])
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG`
/// overrides the filter.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "docgate_rest={level},docgate_persistence={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
