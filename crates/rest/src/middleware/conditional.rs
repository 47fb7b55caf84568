//! Conditional request header handling.
//!
//! DocGate honours a single conditional header, `If-Match`, which carries
//! the etag a client expects the addressed resource to have.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use docgate_persistence::types::Etag;

/// Extracted conditional headers from a request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConditionalHeaders {
    /// If-Match header value, quotes and weak prefix removed.
    if_match: Option<Etag>,
}

impl ConditionalHeaders {
    /// Creates a new ConditionalHeaders from a HeaderMap.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let if_match = headers
            .get(header::IF_MATCH)
            .and_then(|v| v.to_str().ok())
            .and_then(Etag::from_header);

        Self { if_match }
    }

    /// Returns the supplied etag.
    ///
    /// Writes only proceed if the current version of the resource matches it.
    pub fn if_match(&self) -> Option<&Etag> {
        self.if_match.as_ref()
    }

    /// Consumes the headers, returning the supplied etag.
    pub fn into_if_match(self) -> Option<Etag> {
        self.if_match
    }

    /// Checks if any conditional headers are present.
    pub fn has_conditions(&self) -> bool {
        self.if_match.is_some()
    }
}

/// Axum extractor for conditional headers.
impl<S> FromRequestParts<S> for ConditionalHeaders
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ConditionalHeaders::from_headers(&parts.headers))
    }
}
