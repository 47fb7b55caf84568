//! Request content type checks.
//!
//! Request bodies are JSON. A missing Content-Type is taken as JSON; any
//! other media type whose subtype is neither `json` nor `+json` is refused.

use axum::http::{HeaderMap, header};
use mime::Mime;

use crate::error::{RestError, RestResult};

/// Returns true for `application/json` and `*/*+json` media types.
pub fn is_json(media_type: &Mime) -> bool {
    media_type.subtype() == mime::JSON || media_type.suffix() == Some(mime::JSON)
}

/// Validates the Content-Type header of a request carrying a body.
pub fn require_json(headers: &HeaderMap) -> RestResult<()> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let raw = value.to_str().unwrap_or_default();
    match raw.parse::<Mime>() {
        Ok(media_type) if is_json(&media_type) => Ok(()),
        _ => Err(RestError::UnsupportedMediaType {
            content_type: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn test_json_types() {
        assert!(require_json(&headers("application/json")).is_ok());
        assert!(require_json(&headers("application/json; charset=utf-8")).is_ok());
        assert!(require_json(&headers("application/hal+json")).is_ok());
    }

    #[test]
    fn test_missing_content_type() {
        assert!(require_json(&HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_other_types_are_refused() {
        let err = require_json(&headers("text/plain")).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(require_json(&headers("application/xml")).is_err());
        assert!(require_json(&headers("not a media type")).is_err());
    }
}
