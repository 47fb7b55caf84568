//! Error documents.
//!
//! An error response is a HAL resource with the properties
//! `http status code`, `http status description` and `message`. With error
//! details enabled, an `rh:exception` child names the error kind, repeats
//! its message and lists its source chain under `stack trace`.

use std::error::Error as StdError;

use axum::http::StatusCode;
use serde_json::Value;

use super::hal::Resource;
use crate::error::RestError;

/// Relation of the embedded error details.
pub const EXCEPTION_REL: &str = "rh:exception";

/// Replaces characters that would be escaped in the JSON text.
fn avoid_escaped_chars(s: &str) -> String {
    s.replace('"', "'").replace('\t', "  ")
}

/// Builds an error document.
///
/// Details are attached only when `debug` is set and an error is given.
pub fn error_resource(
    href: Option<&str>,
    status: StatusCode,
    message: Option<&str>,
    error: Option<&RestError>,
    debug: bool,
) -> Resource {
    let mut rep = match href {
        Some(href) => Resource::new(href),
        None => Resource::anonymous(),
    };

    rep.add_property("http status code", Value::from(status.as_u16()));
    rep.add_property(
        "http status description",
        Value::String(status.canonical_reason().unwrap_or("Unknown").to_string()),
    );
    if let Some(message) = message {
        rep.add_property("message", Value::String(avoid_escaped_chars(message)));
    }

    if let (true, Some(error)) = (debug, error) {
        rep.add_child(EXCEPTION_REL, exception_resource(error));
    }

    rep
}

fn exception_resource(error: &RestError) -> Resource {
    let mut nrep = Resource::anonymous();
    nrep.add_property("exception", Value::String(error.exception_name().to_string()));

    let message = match error {
        RestError::InvalidJson(_) => "invalid json".to_string(),
        other => avoid_escaped_chars(&other.to_string()),
    };
    nrep.add_property("exception message", Value::String(message));

    let mut trace = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push(Value::String(avoid_escaped_chars(&cause.to_string())));
        source = cause.source();
    }
    if !trace.is_empty() {
        nrep.add_property("stack trace", Value::Array(trace));
    }

    nrep
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_persistence::StorageError;
    use docgate_persistence::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_error_document_properties() {
        let rep = error_resource(
            Some("/db/coll"),
            StatusCode::PRECONDITION_FAILED,
            Some("The \"etag\"\tdoes not match"),
            None,
            false,
        );
        let value = rep.to_value();
        assert_eq!(value["http status code"], json!(412));
        assert_eq!(value["http status description"], json!("Precondition Failed"));
        assert_eq!(value["message"], json!("The 'etag'  does not match"));
        assert_eq!(value["_links"]["self"]["href"], json!("/db/coll"));
    }

    #[test]
    fn test_details_only_in_debug() {
        let err = RestError::Storage(StorageError::coded(ErrorCode(42), "boom"));
        let quiet = error_resource(None, err.status(), None, Some(&err), false).to_value();
        assert!(quiet.get("_embedded").is_none());

        let loud = error_resource(None, err.status(), None, Some(&err), true).to_value();
        let exception = &loud["_embedded"]["rh:exception"][0];
        assert_eq!(exception["exception"], json!("StorageError::Backend"));
        assert_eq!(exception["exception message"], json!("store error 42: boom"));
    }

    #[test]
    fn test_invalid_json_detail() {
        let parse_error = serde_json::from_str::<Value>("{").unwrap_err();
        let err = RestError::InvalidJson(parse_error);
        let value = error_resource(None, err.status(), None, Some(&err), true).to_value();
        let exception = &value["_embedded"]["rh:exception"][0];
        assert_eq!(exception["exception message"], json!("invalid json"));
        assert_eq!(exception["stack trace"].as_array().unwrap().len(), 1);
    }
}
