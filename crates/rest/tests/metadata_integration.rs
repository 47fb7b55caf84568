//! Collection metadata integration tests.
//!
//! Tests the behaviors declared in collection metadata:
//! - Validation of directives (406)
//! - Checkers, including JSON schemas stored in `_schemas`
//! - Request and response transformers
//! - Relationship links in full representations

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::assertions::{assert_error_document, embedded_ids};
use common::fixtures::{checked_users_props, orders_props, transformed_props, user, user_schema};
use common::harness::{IF_MATCH, TestHarness, if_match};
use docgate_persistence::types::Document;
use docgate_rest::ServerConfig;
use docgate_rest::metadata::{MetadataRegistry, MetadataResult};
use docgate_rest::metadata::checkers::{CheckContext, CheckOutcome, Checker};

// =============================================================================
// Metadata validation
// =============================================================================

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_malformed_checker_returns_406() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/coll1")
            .json(&json!({"checkers": [{"args": ["a"]}]}))
            .await;

        assert_error_document(&response, 406);
        // nothing was created
        harness
            .server
            .get("/db1/coll1")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_checker_args_returns_406() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/coll1")
            .json(&json!({"checkers": {"name": "checkContentSize", "args": {}}}))
            .await;

        let message = assert_error_document(&response, 406);
        assert!(message.contains("checkContentSize"));
    }

    #[tokio::test]
    async fn test_transformer_without_phase_returns_406() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/coll1")
            .json(&json!({"transformers": [{"name": "filterProperties", "args": ["a"]}]}))
            .await;

        assert_error_document(&response, 406);
    }

    #[tokio::test]
    async fn test_malformed_relationship_returns_406() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/orders")
            .json(&json!({"relationships": [{"rel": "customer", "type": "SOME", "role": "OWNING"}]}))
            .await;

        assert_error_document(&response, 406);
    }

    #[tokio::test]
    async fn test_unknown_optional_checker_is_accepted() {
        let harness = TestHarness::new();

        harness
            .server
            .put("/db1/coll1")
            .json(&json!({"checkers": [{"name": "notRegistered"}]}))
            .await
            .assert_status(StatusCode::CREATED);

        // and skipped on writes
        harness
            .server
            .put("/db1/coll1/d1")
            .json(&json!({"a": 1}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_unknown_mandatory_checker_returns_406() {
        let harness = TestHarness::new();

        let response = harness
            .server
            .put("/db1/coll1")
            .json(&json!({"checkers": [{"name": "notRegistered", "mandatory": true}]}))
            .await;

        assert_error_document(&response, 406);
    }

    #[tokio::test]
    async fn test_operator_patch_with_bad_checker_returns_406() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/coll1", json!({"descr": "kept"}))
            .await;
        let etag = harness.current_etag("/db1/coll1").await;

        let bodies = [
            json!({"$set": {"checkers": [{"name": "checkContentSize", "args": {}}]}}),
            json!({"$push": {"checkers": {"args": ["a"]}}}),
        ];
        for body in bodies {
            let response = harness
                .server
                .patch("/db1/coll1")
                .add_header(IF_MATCH, if_match(&etag))
                .json(&body)
                .await;
            assert_error_document(&response, 406);
        }

        // props unchanged, documents still writable
        let body: Value = harness.server.get("/db1/coll1").await.json();
        assert_eq!(body["descr"], "kept");
        assert!(body.get("checkers").is_none());
        assert_eq!(harness.current_etag("/db1/coll1").await, etag);
        harness
            .server
            .put("/db1/coll1/d1")
            .json(&json!({"a": 1}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_dot_path_patch_into_checker_args_returns_406() {
        let harness = TestHarness::new();
        harness
            .create_collection_with(
                "/db1/coll1",
                json!({"checkers": [{"name": "checkContentSize", "args": {"max": 1024}}]}),
            )
            .await;
        let etag = harness.current_etag("/db1/coll1").await;

        let response = harness
            .server
            .patch("/db1/coll1")
            .add_header(IF_MATCH, if_match(&etag))
            .json(&json!({"$set": {"checkers.0.args.max": -5}}))
            .await;

        assert_error_document(&response, 406);
        let body: Value = harness.server.get("/db1/coll1").await.json();
        assert_eq!(body["checkers"][0]["args"]["max"], 1024);
    }

    #[tokio::test]
    async fn test_non_object_metadata_returns_406() {
        let harness = TestHarness::new();

        let response = harness.server.put("/db1/coll1").json(&json!([1, 2])).await;

        assert_error_document(&response, 406);
    }
}

// =============================================================================
// Checkers
// =============================================================================

mod checkers {
    use super::*;

    #[tokio::test]
    async fn test_required_fields() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/users", checked_users_props())
            .await;

        let response = harness
            .server
            .put("/db1/users/u1")
            .json(&json!({"name": "Ann"}))
            .await;
        let message = assert_error_document(&response, 400);
        assert!(message.contains("requiredFields"));
        assert!(message.contains("email"));

        harness
            .server
            .put("/db1/users/u1")
            .json(&user("u1", "Ann", "ann@example.com"))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_immutable_fields_on_patch() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/users", checked_users_props())
            .await;
        harness
            .put_document("/db1/users/u1", user("u1", "Ann", "ann@example.com"))
            .await;

        let response = harness
            .server
            .patch("/db1/users/u1")
            .json(&json!({"email": "other@example.com"}))
            .await;
        let message = assert_error_document(&response, 400);
        assert!(message.contains("email"));

        // the merged document still has every required field
        harness
            .server
            .patch("/db1/users/u1")
            .json(&json!({"name": "Anne"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_immutable_fields_on_post_with_id() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/users", checked_users_props())
            .await;
        harness
            .put_document("/db1/users/u1", user("u1", "Ann", "ann@example.com"))
            .await;

        let response = harness
            .server
            .post("/db1/users")
            .json(&user("u1", "Ann", "changed@example.com"))
            .await;
        let message = assert_error_document(&response, 400);
        assert!(message.contains("email"));

        let response = harness
            .server
            .post("/db1/users")
            .json(&json!([
                user("u2", "Bob", "bob@example.com"),
                user("u1", "Ann", "changed@example.com")
            ]))
            .await;
        assert_error_document(&response, 400);

        let body: Value = harness.server.get("/db1/users/u1").await.json();
        assert_eq!(body["email"], "ann@example.com");

        // keeping the field as stored is accepted
        let response = harness
            .server
            .post("/db1/users")
            .json(&user("u1", "Anne", "ann@example.com"))
            .await;
        assert!(response.status_code().is_success());
    }

    #[tokio::test]
    async fn test_bulk_create_checks_every_document() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/users", checked_users_props())
            .await;

        let response = harness
            .server
            .post("/db1/users")
            .json(&json!([user("u1", "Ann", "ann@example.com"), {"name": "Bob"}]))
            .await;

        assert_error_document(&response, 400);
        let size: Value = harness.server.get("/db1/users/_size").await.json();
        assert_eq!(size["_size"], 0);
    }

    #[tokio::test]
    async fn test_content_size() {
        let harness = TestHarness::new();
        harness
            .create_collection_with(
                "/db1/notes",
                json!({"checkers": {"name": "checkContentSize", "args": {"max": 32}}}),
            )
            .await;

        harness
            .server
            .post("/db1/notes")
            .json(&json!({"t": "short"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = harness
            .server
            .post("/db1/notes")
            .json(&json!({"t": "a note that is far too long for the configured limit"}))
            .await;
        assert_error_document(&response, 400);
    }

    #[tokio::test]
    async fn test_json_schema_checker() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/_schemas").await;
        harness.put_document("/db1/_schemas/user", user_schema()).await;
        harness
            .create_collection_with(
                "/db1/users",
                json!({"checkers": [{"name": "jsonSchema", "args": {"schemaId": "user"}}]}),
            )
            .await;

        harness
            .server
            .put("/db1/users/u1")
            .json(&json!({"name": "Ann", "age": 30}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = harness
            .server
            .put("/db1/users/u2")
            .json(&json!({"name": "Bob", "age": -1}))
            .await;
        let message = assert_error_document(&response, 400);
        assert!(message.contains("jsonSchema"));

        let response = harness
            .server
            .put("/db1/users/u3")
            .json(&json!({"age": 3}))
            .await;
        assert_error_document(&response, 400);
    }

    #[tokio::test]
    async fn test_schema_with_unsupported_keywords_is_refused() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/_schemas").await;

        let response = harness
            .server
            .put("/db1/_schemas/either")
            .json(&json!({"anyOf": [{"type": "string"}, {"type": "integer"}]}))
            .await;
        let message = assert_error_document(&response, 406);
        assert!(message.contains("anyOf"));

        harness.put_document("/db1/_schemas/user", user_schema()).await;
        let response = harness
            .server
            .patch("/db1/_schemas/user")
            .json(&json!({"$set": {"properties.name.format": "email"}}))
            .await;
        let message = assert_error_document(&response, 406);
        assert!(message.contains("format"));

        let response = harness
            .server
            .post("/db1/_schemas")
            .json(&json!([{"_id": "ok", "type": "object"}, {"_id": "bad", "$ref": "#/x"}]))
            .await;
        assert_error_document(&response, 406);
    }

    #[tokio::test]
    async fn test_json_schema_checker_rejects_unsupported_stored_schema() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/_schemas").await;
        let schema = json!({"_id": "loose", "not": {"type": "object"}});
        harness
            .engine()
            .insert_document("db1", "_schemas", schema.as_object().cloned().unwrap())
            .await
            .unwrap();
        harness
            .create_collection_with(
                "/db1/users",
                json!({"checkers": [{"name": "jsonSchema", "args": {"schemaId": "loose"}}]}),
            )
            .await;

        let response = harness
            .server
            .put("/db1/users/u1")
            .json(&json!({"name": "Ann"}))
            .await;
        let message = assert_error_document(&response, 400);
        assert!(message.contains("unsupported keyword not"));
    }

    #[tokio::test]
    async fn test_json_schema_checker_with_missing_schema() {
        let harness = TestHarness::new();
        harness
            .create_collection_with(
                "/db1/users",
                json!({"checkers": [{"name": "jsonSchema", "args": {"schemaId": "nope"}}]}),
            )
            .await;

        let response = harness
            .server
            .put("/db1/users/u1")
            .json(&json!({"name": "Ann"}))
            .await;

        let message = assert_error_document(&response, 400);
        assert!(message.contains("nope"));
    }

    #[derive(Debug)]
    struct NoBobs;

    impl Checker for NoBobs {
        fn name(&self) -> &'static str {
            "noBobs"
        }

        fn check(&self, content: &Document, _ctx: &CheckContext<'_>) -> CheckOutcome {
            if content.get("name").and_then(Value::as_str) == Some("Bob") {
                CheckOutcome::Fail("no Bobs allowed".to_string())
            } else {
                CheckOutcome::Pass
            }
        }
    }

    fn no_bobs(_args: &Value) -> MetadataResult<Arc<dyn Checker>> {
        Ok(Arc::new(NoBobs))
    }

    #[tokio::test]
    async fn test_custom_checker_from_registry() {
        let mut registry = MetadataRegistry::with_defaults();
        registry.register_checker("noBobs", no_bobs);
        let harness = TestHarness::with_registry(ServerConfig::for_testing(), registry);
        harness
            .create_collection_with("/db1/users", json!({"checkers": [{"name": "noBobs"}]}))
            .await;

        harness
            .server
            .post("/db1/users")
            .json(&json!({"name": "Ann"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = harness
            .server
            .post("/db1/users")
            .json(&json!({"name": "Bob"}))
            .await;
        let message = assert_error_document(&response, 400);
        assert!(message.contains("no Bobs allowed"));
    }
}

// =============================================================================
// Transformers
// =============================================================================

mod transformers {
    use super::*;

    #[tokio::test]
    async fn test_request_transformer_stamps_documents() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/notes", transformed_props())
            .await;

        harness.put_document("/db1/notes/n1", json!({"t": "x"})).await;

        let doc = harness
            .engine()
            .get_document("db1", "notes", &json!("n1"), &Default::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["_request"]["requestMethod"], "PUT");
        assert_eq!(doc["_request"]["requestPath"], "/db1/notes/n1");
    }

    #[tokio::test]
    async fn test_response_transformer_hides_fields() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/notes", transformed_props())
            .await;
        harness
            .put_document("/db1/notes/n1", json!({"t": "x", "secret": "s"}))
            .await;

        // stored as written
        let doc = harness
            .engine()
            .get_document("db1", "notes", &json!("n1"), &Default::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["secret"], "s");

        let body: Value = harness.server.get("/db1/notes/n1").await.json();
        assert_eq!(body["t"], "x");
        assert!(body.get("secret").is_none());

        let body: Value = harness.server.get("/db1/notes").await.json();
        let child = &body["_embedded"]["rh:doc"][0];
        assert_eq!(child["t"], "x");
        assert!(child.get("secret").is_none());
    }

    #[tokio::test]
    async fn test_strings_to_dates() {
        let harness = TestHarness::new();
        harness
            .create_collection_with(
                "/db1/events",
                json!({"transformers": {"name": "stringsToDates", "phase": "REQUEST", "args": ["at"]}}),
            )
            .await;

        harness
            .put_document("/db1/events/e1", json!({"at": "1970-01-01T00:00:01Z"}))
            .await;

        let body: Value = harness.server.get("/db1/events/e1").await.json();
        assert_eq!(body["at"], json!({"$date": 1000}));
    }
}

// =============================================================================
// Relationships
// =============================================================================

mod relationships {
    use super::*;

    #[tokio::test]
    async fn test_owning_link_in_full_mode() {
        let harness = TestHarness::new();
        harness.create_collection("/db1/customers").await;
        harness
            .create_collection_with("/db1/orders", orders_props())
            .await;
        harness
            .put_document("/db1/orders/o1", json!({"customerId": "c1"}))
            .await;

        let body: Value = harness.server.get("/db1/orders/o1?hal=f").await.json();
        assert_eq!(body["_links"]["customer"]["href"], "/db1/customers/c1");

        // compact mode has no relationship links
        let body: Value = harness.server.get("/db1/orders/o1").await.json();
        assert!(body["_links"].get("customer").is_none());
    }

    #[tokio::test]
    async fn test_collection_children_carry_links() {
        let harness = TestHarness::new();
        harness
            .create_collection_with("/db1/orders", orders_props())
            .await;
        harness
            .put_document("/db1/orders/o1", json!({"customerId": "c1"}))
            .await;
        harness.put_document("/db1/orders/o2", json!({})).await;

        let body: Value = harness.server.get("/db1/orders?hal=f").await.json();
        let ids = embedded_ids(&body, "rh:doc");
        assert_eq!(ids.len(), 2);

        let children = body["_embedded"]["rh:doc"].as_array().unwrap();
        let o1 = children.iter().find(|c| c["_id"] == "o1").unwrap();
        let o2 = children.iter().find(|c| c["_id"] == "o2").unwrap();
        assert_eq!(o1["_links"]["customer"]["href"], "/db1/customers/c1");
        assert!(o2["_links"].get("customer").is_none());
    }

    #[tokio::test]
    async fn test_metadata_update_takes_effect() {
        let harness = TestHarness::new();
        let etag = harness.create_collection("/db1/users").await;
        harness.put_document("/db1/users/u1", json!({"name": "Ann"})).await;

        harness
            .server
            .put("/db1/users")
            .add_header(IF_MATCH, if_match(&etag))
            .json(&checked_users_props())
            .await
            .assert_status_ok();

        let response = harness
            .server
            .put("/db1/users/u2")
            .json(&json!({"name": "Bob"}))
            .await;
        assert_error_document(&response, 400);
    }
}
