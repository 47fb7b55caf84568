//! Request dispatch.
//!
//! Every API request enters through one of the two handlers here: the path
//! is resolved to an [`Endpoint`](crate::endpoint::Endpoint), a
//! [`RequestContext`] is built and the endpoint's pipeline runs over it.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    response::{IntoResponse, Response},
};
use docgate_persistence::core::DocumentStore;
use tracing::{debug, warn};

use crate::context::{IncomingRequest, RequestContext};
use crate::endpoint::Endpoint;
use crate::error::RestError;
use crate::state::AppState;

/// Handler for `/`.
pub async fn dispatch_root_handler<S>(State(state): State<AppState<S>>, request: Request) -> Response
where
    S: DocumentStore + 'static,
{
    dispatch(state, String::new(), request).await
}

/// Handler for every other API path.
///
/// The path arrives percent-decoded.
pub async fn dispatch_path_handler<S>(
    State(state): State<AppState<S>>,
    Path(path): Path<String>,
    request: Request,
) -> Response
where
    S: DocumentStore + 'static,
{
    dispatch(state, path, request).await
}

async fn dispatch<S>(state: AppState<S>, path: String, request: Request) -> Response
where
    S: DocumentStore + 'static,
{
    let path = format!("/{}", path.trim_start_matches('/'));
    let (parts, body) = request.into_parts();

    let (endpoint, resource) = match Endpoint::resolve(&parts.method, &path) {
        Ok(resolved) => resolved,
        Err(err) => {
            debug!(method = %parts.method, path = %path, error = %err, "Request not routed");
            return err.into_response();
        }
    };

    let body = match axum::body::to_bytes(body, state.config().max_body_size).await {
        Ok(body) => body,
        Err(err) => {
            warn!(path = %path, error = %err, "Failed to read request body");
            return RestError::PayloadTooLarge {
                limit: state.config().max_body_size,
            }
            .into_response();
        }
    };

    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    let Some(pipeline) = state.pipelines().get(endpoint) else {
        return RestError::Internal {
            message: format!("no pipeline for {:?}", endpoint),
        }
        .into_response();
    };

    let request = IncomingRequest {
        method: parts.method,
        path,
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        remote_addr,
    };
    let mut ctx = RequestContext::new(request, endpoint, resource, state.config());
    pipeline.run(&state, &mut ctx).await;
    ctx.into_response()
}
