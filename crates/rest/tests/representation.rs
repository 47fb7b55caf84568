//! HAL representation tests.
//!
//! Tests the shape of responses:
//! - Collection pages, paging and counts
//! - Reserved ids filtered into warnings
//! - Compact and full modes
//! - Error documents and request validation (400, 406, 413, 415, 501)
//! - Health probes and request ids

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::body::Bytes;
use serde_json::{Value, json};

use common::assertions::{assert_error_document, assert_hal_json, embedded_ids};
use common::harness::TestHarness;
use docgate_rest::ServerConfig;

const CONTENT_TYPE: HeaderName = HeaderName::from_static("content-type");

/// Creates `/db1/items` holding `count` documents `i0`, `i1`, ...
async fn seeded(count: usize) -> TestHarness {
    let harness = TestHarness::new();
    harness.create_collection("/db1/items").await;
    for n in 0..count {
        harness
            .put_document(&format!("/db1/items/i{}", n), json!({"n": n}))
            .await;
    }
    harness
}

// =============================================================================
// Collection pages
// =============================================================================

mod pages {
    use super::*;

    #[tokio::test]
    async fn test_collection_page_embeds_documents() {
        let harness = seeded(3).await;

        let response = harness.server.get("/db1/items").await;

        response.assert_status_ok();
        assert_hal_json(&response);
        let body: Value = response.json();
        assert_eq!(body["_returned"], 3);
        assert_eq!(body["_size"], 0);
        assert_eq!(body["_links"]["self"]["href"], "/db1/items");
        assert_eq!(embedded_ids(&body, "rh:doc").len(), 3);
    }

    #[tokio::test]
    async fn test_count_and_paging() {
        let harness = seeded(5).await;

        let body: Value = harness
            .server
            .get("/db1/items?count&pagesize=2&page=2&hal=f")
            .await
            .json();

        assert_eq!(body["_returned"], 2);
        assert_eq!(body["_size"], 5);
        assert_eq!(body["_total_pages"], 3);
        assert_eq!(body["_links"]["first"]["href"], "/db1/items?page=1&pagesize=2");
        assert_eq!(body["_links"]["previous"]["href"], "/db1/items?page=1&pagesize=2");
        assert_eq!(body["_links"]["next"]["href"], "/db1/items?page=3&pagesize=2");
        assert_eq!(body["_links"]["last"]["href"], "/db1/items?page=3&pagesize=2");
    }

    #[tokio::test]
    async fn test_filter_and_sort() {
        let harness = seeded(4).await;

        let body: Value = harness
            .server
            .get("/db1/items")
            .add_query_param("filter", r#"{"n": {"$gte": 2}}"#)
            .add_query_param("sort_by", "-n")
            .await
            .json();

        assert_eq!(embedded_ids(&body, "rh:doc"), vec![json!("i3"), json!("i2")]);
    }

    #[tokio::test]
    async fn test_malformed_filter_returns_400() {
        let harness = seeded(1).await;

        let response = harness
            .server
            .get("/db1/items")
            .add_query_param("filter", "{not json")
            .await;

        assert_error_document(&response, 400);
    }

    #[tokio::test]
    async fn test_illegal_page_returns_400() {
        let harness = seeded(1).await;

        let response = harness.server.get("/db1/items?page=0").await;

        assert_error_document(&response, 400);
    }

    #[tokio::test]
    async fn test_size_endpoint() {
        let harness = seeded(3).await;

        let body: Value = harness.server.get("/db1/items/_size").await.json();
        assert_eq!(body["_size"], 3);

        let body: Value = harness
            .server
            .get("/db1/items/_size")
            .add_query_param("filter", r#"{"n": 0}"#)
            .await
            .json();
        assert_eq!(body["_size"], 1);
    }

    #[tokio::test]
    async fn test_no_props_hides_metadata() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/items", json!({"descr": "things"}))
            .await;

        let body: Value = harness.server.get("/db1/items").await.json();
        assert_eq!(body["descr"], "things");

        let body: Value = harness.server.get("/db1/items?np").await.json();
        assert!(body.get("descr").is_none());
    }
}

// =============================================================================
// Reserved ids
// =============================================================================

mod reserved {
    use super::*;

    #[tokio::test]
    async fn test_reserved_document_becomes_warning() {
        let harness = seeded(2).await;
        let hidden = json!({"_id": "_hidden", "n": 99});
        harness
            .engine()
            .insert_document("db1", "items", hidden.as_object().cloned().unwrap())
            .await
            .unwrap();

        let body: Value = harness.server.get("/db1/items").await.json();

        assert_eq!(body["_returned"], 2);
        let ids = embedded_ids(&body, "rh:doc");
        assert!(!ids.contains(&json!("_hidden")));
        let warnings = body["_embedded"]["rh:warnings"].as_array().unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_reserved_collections_are_not_listed() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/items").await;
        harness
            .engine()
            .upsert_collection("db1", "_hidden", Default::default(), None, false, false)
            .await
            .unwrap();

        let body: Value = harness.server.get("/db1").await.json();

        assert_eq!(body["_returned"], 1);
        assert_eq!(body["_embedded"]["rh:coll"][0]["_id"], "items");
    }
}

// =============================================================================
// Representation modes
// =============================================================================

mod modes {
    use super::*;

    #[tokio::test]
    async fn test_compact_mode_has_only_self_links() {
        let harness = seeded(1).await;

        let body: Value = harness.server.get("/db1/items").await.json();

        assert!(body.get("_type").is_none());
        assert!(body["_links"].get("rh:indexes").is_none());
    }

    #[tokio::test]
    async fn test_full_mode_has_navigation_links() {
        let harness = seeded(1).await;

        let body: Value = harness.server.get("/db1/items?hal=f").await.json();

        assert_eq!(body["_type"], "COLLECTION");
        assert_eq!(body["_links"]["rh:db"]["href"], "/db1");
        assert_eq!(body["_links"]["rh:indexes"]["href"], "/db1/items/_indexes");
        assert_eq!(body["_links"]["rh:filter"]["templated"], true);
        assert_eq!(body["_links"]["rh:document"]["templated"], true);

        let child = &body["_embedded"]["rh:doc"][0];
        assert_eq!(child["_type"], "DOCUMENT");
        assert!(child["_lastupdated_on"].is_string());
    }

    #[tokio::test]
    async fn test_illegal_hal_mode_returns_400() {
        let harness = seeded(1).await;

        let response = harness.server.get("/db1/items?hal=x").await;

        assert_error_document(&response, 400);
    }

    #[tokio::test]
    async fn test_declared_aggregations_are_linked_but_not_executed() {
        let harness = TestHarness::new();
        harness
            .create_collection_with(
                "/db1/items",
                json!({"aggregations": [{"type": "pipeline", "uri": "totals", "stages": []}]}),
            )
            .await;

        let body: Value = harness.server.get("/db1/items").await.json();
        assert_eq!(body["_links"]["totals"]["href"], "/db1/items/_aggrs/totals");

        let response = harness.server.get("/db1/items/_aggrs/totals").await;
        assert_error_document(&response, 501);
    }
}

// =============================================================================
// Errors and request validation
// =============================================================================

mod errors {
    use super::*;

    #[tokio::test]
    async fn test_error_document_shape() {
        let harness = TestHarness::new();

        let response = harness.server.get("/db1/nope").await;

        assert_hal_json(&response);
        let message = assert_error_document(&response, 404);
        assert!(message.contains("/db1/nope"));
        let body: Value = response.json();
        assert_eq!(body["http status description"], "Not Found");
        assert_eq!(body["_links"]["self"]["href"], "/db1/nope");
        assert!(body.get("_embedded").is_none());
    }

    #[tokio::test]
    async fn test_debug_errors_attach_exception() {
        let config = ServerConfig {
            debug_errors: true,
            ..ServerConfig::for_testing()
        };
        let harness = TestHarness::with_config(config);

        let response = harness.server.get("/db1/nope").await;

        assert_error_document(&response, 404);
        let body: Value = response.json();
        assert!(body["_embedded"]["rh:exception"][0]["exception"].is_string());
    }

    #[tokio::test]
    async fn test_non_json_content_type_returns_415() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/items")
            .add_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .bytes(Bytes::from_static(b"{}"))
            .await;

        assert_error_document(&response, 415);
    }

    #[tokio::test]
    async fn test_invalid_json_returns_406() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/items")
            .add_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .bytes(Bytes::from_static(b"{\"a\": "))
            .await;

        assert_error_document(&response, 406);
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_metadata() {
        let harness = TestHarness::new();

        harness
            .server
            .put("/db1/items")
            .add_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .bytes(Bytes::new())
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_oversized_body_returns_413() {
        let config = ServerConfig {
            max_body_size: 16,
            ..ServerConfig::for_testing()
        };
        let harness = TestHarness::with_config(config);

        let response = harness
            .server
            .put("/db1/items")
            .json(&json!({"descr": "longer than sixteen bytes"}))
            .await;

        assert_error_document(&response, 413);
    }
}

// =============================================================================
// Probes and request ids
// =============================================================================

mod probes {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let harness = TestHarness::new();

        let response = harness.server.get("/_health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "sqlite");
    }

    #[tokio::test]
    async fn test_liveness_and_readiness() {
        let harness = TestHarness::new();

        harness.server.get("/_liveness").await.assert_status_ok();
        harness.server.get("/_readiness").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let config = ServerConfig {
            enable_request_id: true,
            ..ServerConfig::for_testing()
        };
        let harness = TestHarness::with_config(config);

        let response = harness.server.get("/_liveness").await;

        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let config = ServerConfig {
            enable_request_id: true,
            ..ServerConfig::for_testing()
        };
        let harness = TestHarness::with_config(config);

        let response = harness
            .server
            .get("/_liveness")
            .add_header(
                HeaderName::from_static("x-request-id"),
                HeaderValue::from_static("abc-123"),
            )
            .await;

        assert_eq!(response.header("x-request-id"), "abc-123");
    }
}
