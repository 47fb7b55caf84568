//! Optimistic concurrency tests.
//!
//! Tests the `If-Match` / `ETag` contract:
//! - Every successful write produces a new etag
//! - Missing tokens yield 428, stale tokens 412, current tokens succeed
//! - Etag policies from configuration, `checkEtag` and `etagDocPolicy`

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::assertions::assert_error_document;
use common::harness::{IF_MATCH, TestHarness, etag_of, if_match};
use docgate_rest::{EtagPolicy, ServerConfig};

// =============================================================================
// Etag monotonicity
// =============================================================================

mod monotonicity {
    use super::*;

    #[tokio::test]
    async fn test_every_write_changes_the_etag() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/docs").await;

        let mut seen = Vec::new();
        for n in 0..3 {
            let etag = harness.put_document("/db1/docs/d1", json!({"n": n})).await;
            assert!(!seen.contains(&etag), "etag {} was reused", etag);
            seen.push(etag);
        }

        let patched = harness
            .server
            .patch("/db1/docs/d1")
            .json(&json!({"m": 1}))
            .await;
        patched.assert_status_ok();
        assert!(!seen.contains(&etag_of(&patched)));
    }

    #[tokio::test]
    async fn test_read_returns_the_last_written_etag() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/docs").await;
        harness.put_document("/db1/docs/d1", json!({"n": 1})).await;
        let last = harness.put_document("/db1/docs/d1", json!({"n": 2})).await;

        assert_eq!(harness.current_etag("/db1/docs/d1").await, last);

        let body: Value = harness.server.get("/db1/docs/d1").await.json();
        assert_eq!(body["_etag"], last.as_str());
    }
}

// =============================================================================
// Preconditions on collections
// =============================================================================

mod collection_preconditions {
    use super::*;

    #[tokio::test]
    async fn test_write_without_token_returns_428() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/coll1").await;

        let response = harness.server.put("/db1/coll1").json(&json!({"a": 1})).await;

        assert_error_document(&response, 428);
    }

    #[tokio::test]
    async fn test_write_with_stale_token_returns_412() {
        let harness = TestHarness::new();
        let stale = harness.create_collection("/db1/coll1").await;
        let current = update_collection(&harness, "/db1/coll1", &stale).await;

        let response = harness
            .server
            .put("/db1/coll1")
            .add_header(IF_MATCH, if_match(&stale))
            .json(&json!({"a": 2}))
            .await;

        assert_error_document(&response, 412);
        // the refusal reports the current version
        assert_eq!(etag_of(&response), current);
    }

    #[tokio::test]
    async fn test_quoted_and_weak_tokens_are_accepted() {
        let harness = TestHarness::new();
        let etag = harness.create_collection("/db1/coll1").await;

        let response = harness
            .server
            .put("/db1/coll1")
            .add_header(IF_MATCH, if_match(&format!("W/\"{}\"", etag)))
            .json(&json!({"a": 1}))
            .await;

        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_optional_policy_allows_blind_writes() {
        let config = ServerConfig {
            coll_etag_policy: EtagPolicy::Optional,
            ..ServerConfig::for_testing()
        };
        let harness = TestHarness::with_config(config);
        harness.create_collection("/db1/coll1").await;

        harness
            .server
            .put("/db1/coll1")
            .json(&json!({"a": 1}))
            .await
            .assert_status_ok();

        harness
            .server
            .delete("/db1/coll1")
            .await
            .assert_status(StatusCode::GONE);
    }
}

// =============================================================================
// Preconditions on documents
// =============================================================================

mod document_preconditions {
    use super::*;

    #[tokio::test]
    async fn test_optional_policy_accepts_missing_token() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/docs").await;
        harness.put_document("/db1/docs/d1", json!({"n": 1})).await;

        harness
            .server
            .put("/db1/docs/d1")
            .json(&json!({"n": 2}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_stale_token_returns_412_even_when_optional() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/docs").await;
        let stale = harness.put_document("/db1/docs/d1", json!({"n": 1})).await;
        harness.put_document("/db1/docs/d1", json!({"n": 2})).await;

        let response = harness
            .server
            .put("/db1/docs/d1")
            .add_header(IF_MATCH, if_match(&stale))
            .json(&json!({"n": 3}))
            .await;

        assert_error_document(&response, 412);
        let body: Value = harness.server.get("/db1/docs/d1").await.json();
        assert_eq!(body["n"], 2);
    }

    #[tokio::test]
    async fn test_check_etag_param_requires_token() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/docs").await;
        let etag = harness.put_document("/db1/docs/d1", json!({"n": 1})).await;

        let response = harness
            .server
            .put("/db1/docs/d1?checkEtag")
            .json(&json!({"n": 2}))
            .await;
        assert_error_document(&response, 428);

        harness
            .server
            .put("/db1/docs/d1?checkEtag")
            .add_header(IF_MATCH, if_match(&etag))
            .json(&json!({"n": 2}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_collection_doc_policy_overrides_configuration() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/docs", json!({"etagDocPolicy": "REQUIRED"}))
            .await;
        harness.put_document("/db1/docs/d1", json!({"n": 1})).await;

        let response = harness
            .server
            .patch("/db1/docs/d1")
            .json(&json!({"n": 2}))
            .await;
        assert_error_document(&response, 428);

        let etag = harness.current_etag("/db1/docs/d1").await;
        harness
            .server
            .patch("/db1/docs/d1")
            .add_header(IF_MATCH, if_match(&etag))
            .json(&json!({"n": 2}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_required_for_delete_policy() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/docs", json!({"etagDocPolicy": "REQUIRED_FOR_DELETE"}))
            .await;
        let etag = harness.put_document("/db1/docs/d1", json!({"n": 1})).await;

        let response = harness.server.delete("/db1/docs/d1").await;
        assert_error_document(&response, 412);

        harness
            .server
            .delete("/db1/docs/d1")
            .add_header(IF_MATCH, if_match(&etag))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_doc_policy_returns_406() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/docs")
            .json(&json!({"etagDocPolicy": "SOMETIMES"}))
            .await;

        assert_error_document(&response, 406);
    }
}

/// Rewrites the collection metadata with `etag` and returns the new etag.
async fn update_collection(harness: &TestHarness, path: &str, etag: &str) -> String {
    let response = harness
        .server
        .put(path)
        .add_header(IF_MATCH, if_match(etag))
        .json(&json!({"a": 1}))
        .await;
    response.assert_status_ok();
    etag_of(&response)
}
