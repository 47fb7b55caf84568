//! HTTP response assertions.
//!
//! Provides assertion utilities for testing HTTP responses.

use axum_test::TestResponse;
use serde_json::Value;

/// Asserts that the response has an ETag header.
pub fn assert_has_etag(response: &TestResponse) {
    assert!(
        response.headers().contains_key("etag"),
        "Expected ETag header"
    );
}

/// Asserts that the response has a Location header.
pub fn assert_has_location(response: &TestResponse) {
    assert!(
        response.headers().contains_key("location"),
        "Expected Location header"
    );
}

/// Asserts that the response is a HAL document.
pub fn assert_hal_json(response: &TestResponse) {
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert_eq!(content_type, "application/hal+json");
}

/// Asserts that the response is an error document with the given status,
/// and returns its message.
pub fn assert_error_document(response: &TestResponse, status: u16) -> String {
    assert_eq!(
        response.status_code().as_u16(),
        status,
        "Expected status {}, got {}: {}",
        status,
        response.status_code(),
        response.text()
    );
    let body: Value = response.json();
    assert_eq!(body["http status code"], status);
    assert!(
        body["http status description"].is_string(),
        "Expected a status description"
    );
    body["message"].as_str().unwrap_or_default().to_string()
}

/// Returns the ids of the embedded children under a relation.
pub fn embedded_ids(body: &Value, rel: &str) -> Vec<Value> {
    body["_embedded"][rel]
        .as_array()
        .map(|children| children.iter().map(|c| c["_id"].clone()).collect())
        .unwrap_or_default()
}
