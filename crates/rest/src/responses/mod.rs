//! HAL representations.
//!
//! - [`hal`] - the resource model and its serialization
//! - [`collection`] - collection pages with their documents
//! - [`document`] - single documents
//! - [`listing`] - database, collection and index listings
//! - [`bulk`] - bulk write outcomes
//! - [`error`] - error documents
//! - [`headers`] - `ETag` and `Location` headers

pub mod bulk;
pub mod collection;
pub mod document;
pub mod error;
pub mod hal;
pub mod headers;
pub mod listing;

pub use collection::CollectionRepresentation;
pub use hal::{Link, Resource};
pub use headers::{HAL_JSON, ResourceHeaders};

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

/// Builds a response, with a HAL body when one is given.
pub fn hal_response(status: StatusCode, headers: HeaderMap, body: Option<Value>) -> Response {
    let mut response = match body {
        Some(body) => {
            let mut response = (status, body.to_string()).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(HAL_JSON));
            response
        }
        None => status.into_response(),
    };
    for (name, value) in headers.iter() {
        response.headers_mut().insert(name.clone(), value.clone());
    }
    response
}
