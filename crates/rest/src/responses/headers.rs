//! Response header generation.
//!
//! Provides utilities for building the headers of resource responses.

use axum::http::{HeaderMap, HeaderValue, header};
use docgate_persistence::types::Etag;

/// Media type of every representation this server produces.
pub const HAL_JSON: &str = "application/hal+json";

/// Builder for resource response headers.
///
/// Generates:
/// - ETag (current version of the addressed resource)
/// - Location (for created resources)
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResourceHeaders {
    /// ETag value, sent as-is.
    etag: Option<String>,
    /// Location path (for created resources).
    location: Option<String>,
}

impl ResourceHeaders {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ETag from a version token.
    pub fn with_etag(mut self, etag: &Etag) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    /// Sets the Location path.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Writes the headers into an existing map, replacing prior values.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        if let Some(etag) = &self.etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(header::ETAG, value);
            }
        }

        if let Some(location) = &self.location {
            if let Ok(value) = HeaderValue::from_str(location) {
                headers.insert(header::LOCATION, value);
            }
        }
    }

    /// Converts to an Axum HeaderMap.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        self.apply_to(&mut headers);
        headers
    }

    /// Returns the ETag value.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Returns the Location value.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let headers = ResourceHeaders::new();
        assert!(headers.etag().is_none());
        assert!(headers.to_header_map().is_empty());
    }

    #[test]
    fn test_with_etag() {
        let headers = ResourceHeaders::new().with_etag(&Etag::from("abc"));
        assert_eq!(headers.etag(), Some("abc"));
    }

    #[test]
    fn test_to_header_map() {
        let headers = ResourceHeaders::new()
            .with_etag(&Etag::from("abc"))
            .with_location("/db/coll/1");

        let map = headers.to_header_map();

        assert_eq!(map.get(header::ETAG).unwrap(), "abc");
        assert_eq!(map.get(header::LOCATION).unwrap(), "/db/coll/1");
    }
}
