//! Test fixtures for REST API testing.
//!
//! Provides documents and collection metadata for use in tests.

use serde_json::{Value, json};

/// A user document.
pub fn user(id: &str, name: &str, email: &str) -> Value {
    json!({
        "_id": id,
        "name": name,
        "email": email,
        "active": true
    })
}

/// Metadata requiring `name` and `email` and keeping `email` unchangeable.
pub fn checked_users_props() -> Value {
    json!({
        "descr": "users",
        "checkers": [
            { "name": "requiredFields", "args": ["name", "email"] },
            { "name": "immutableFields", "args": ["email"] }
        ]
    })
}

/// Metadata stamping incoming documents and hiding `secret` on reads.
pub fn transformed_props() -> Value {
    json!({
        "transformers": [
            {
                "name": "addRequestProperties",
                "phase": "REQUEST",
                "args": { "properties": ["requestMethod", "requestPath"] }
            },
            {
                "name": "filterProperties",
                "phase": "RESPONSE",
                "scope": "CHILDREN",
                "args": ["secret"]
            },
            {
                "name": "filterProperties",
                "phase": "RESPONSE",
                "args": ["secret"]
            }
        ]
    })
}

/// Metadata linking orders to their customer.
pub fn orders_props() -> Value {
    json!({
        "relationships": [
            {
                "rel": "customer",
                "type": "MANY_TO_ONE",
                "role": "OWNING",
                "target-coll": "customers",
                "ref-field": "customerId"
            }
        ]
    })
}

/// A JSON schema for user documents.
pub fn user_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": { "type": "string" },
            "age": { "type": "integer", "minimum": 0 }
        }
    })
}
