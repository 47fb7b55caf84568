//! DocGate route configuration.

use axum::{
    Router,
    routing::{any, get},
};
use docgate_persistence::core::DocumentStore;

use crate::handlers;
use crate::state::AppState;

/// Creates all DocGate routes.
///
/// # Routes
///
/// ## Probes
/// - `GET /_health` - Health check
/// - `GET /_liveness` - Liveness probe
/// - `GET /_readiness` - Readiness probe
///
/// ## API
/// - `/` and `/{*path}` - Every method; the path is resolved to an
///   [`Endpoint`](crate::endpoint::Endpoint) and its pipeline runs
pub fn create_routes<S>(state: AppState<S>) -> Router
where
    S: DocumentStore + 'static,
{
    Router::new()
        .route("/_health", get(handlers::health_handler::<S>))
        .route("/_liveness", get(handlers::liveness_handler))
        .route("/_readiness", get(handlers::readiness_handler::<S>))
        .route("/", any(handlers::dispatch_root_handler::<S>))
        .route("/{*path}", any(handlers::dispatch_path_handler::<S>))
        .with_state(state)
}
