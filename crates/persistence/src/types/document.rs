//! Documents and the per-collection metadata record.
//!
//! Data documents and the [`MetadataRecord`] share a physical collection but
//! never share an identifier: the record always lives under
//! [`METADATA_ID`] and every data query excludes that id.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use super::etag::Etag;

/// A JSON document.
pub type Document = Map<String, Value>;

/// Identifier field of every document.
pub const ID_FIELD: &str = "_id";

/// Version token field.
pub const ETAG_FIELD: &str = "_etag";

/// Creation time field of the metadata record.
pub const CREATED_ON_FIELD: &str = "_created_on";

/// Derived, never persisted, last update time.
pub const LAST_UPDATED_ON_FIELD: &str = "_lastupdated_on";

/// Sentinel identifier of the metadata record.
pub const METADATA_ID: &str = "_properties";

/// Prefix of reserved resource names.
pub const RESERVED_PREFIX: &str = "_";

/// Reserved names that still denote addressable system sub-resources.
pub const SYSTEM_RESOURCES: &[&str] = &["_schemas", "_indexes", "_size", "_aggrs", "_streams", "_meta"];

/// Returns true if `name` is reserved and not a recognized system resource.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX) && !SYSTEM_RESOURCES.contains(&name)
}

/// Returns true if a document id value is reserved.
///
/// Only string ids can be reserved.
pub fn is_reserved_id(id: &Value) -> bool {
    id.as_str().is_some_and(is_reserved_name)
}

/// Renders an id value the way it appears in a resource path.
pub fn id_to_path_segment(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns the etag stored in a document, if any.
pub fn document_etag(doc: &Document) -> Option<Etag> {
    doc.get(ETAG_FIELD)
        .and_then(Value::as_str)
        .map(Etag::from)
}

/// Removes the server-owned fields a client may not write.
pub fn strip_server_fields(doc: &mut Document) {
    doc.remove(ID_FIELD);
    doc.remove(ETAG_FIELD);
    doc.remove(CREATED_ON_FIELD);
    doc.remove(LAST_UPDATED_ON_FIELD);
}

/// Adds `_lastupdated_on`, derived from the etag, when it can be derived.
pub fn add_last_updated_on(doc: &mut Document) {
    if doc.contains_key(LAST_UPDATED_ON_FIELD) {
        return;
    }
    if let Some(ts) = document_etag(doc).and_then(|etag| etag.timestamp()) {
        doc.insert(
            LAST_UPDATED_ON_FIELD.to_string(),
            Value::String(ts.to_rfc3339()),
        );
    }
}

/// The administrative record of a collection.
///
/// Holds the creation time, the current etag and every client-declared
/// property (including the `checkers`, `transformers`, `relationships` and
/// `aggregations` blocks).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataRecord {
    etag: Option<Etag>,
    created_on: Option<DateTime<Utc>>,
    properties: Document,
}

impl MetadataRecord {
    /// Creates a record for a freshly materialized collection.
    pub fn new(properties: Document, etag: Etag, created_on: DateTime<Utc>) -> Self {
        let mut properties = properties;
        strip_server_fields(&mut properties);
        Self {
            etag: Some(etag),
            created_on: Some(created_on),
            properties,
        }
    }

    /// Builds the typed record from its stored form.
    pub fn from_document(mut doc: Document) -> Self {
        let etag = document_etag(&doc);
        let created_on = match doc.get(CREATED_ON_FIELD).and_then(Value::as_str) {
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(dt) => Some(dt.with_timezone(&Utc)),
                Err(e) => {
                    warn!(value = %raw, error = %e, "Unparseable creation time in metadata record");
                    None
                }
            },
            None => None,
        };
        strip_server_fields(&mut doc);
        Self {
            etag,
            created_on,
            properties: doc,
        }
    }

    /// Converts the record into its stored form, sentinel id included.
    pub fn into_document(self) -> Document {
        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), Value::String(METADATA_ID.to_string()));
        doc.extend(self.properties);
        if let Some(etag) = self.etag {
            doc.insert(ETAG_FIELD.to_string(), Value::String(etag.to_string()));
        }
        if let Some(created_on) = self.created_on {
            doc.insert(
                CREATED_ON_FIELD.to_string(),
                Value::String(created_on.to_rfc3339()),
            );
        }
        doc
    }

    /// Returns the current etag.
    pub fn etag(&self) -> Option<&Etag> {
        self.etag.as_ref()
    }

    /// Returns the creation time.
    pub fn created_on(&self) -> Option<DateTime<Utc>> {
        self.created_on
    }

    /// Returns the client-declared properties.
    pub fn properties(&self) -> &Document {
        &self.properties
    }

    /// Returns a single client-declared property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns the properties as shown to clients.
    ///
    /// Includes `_etag`, `_created_on` and the derived `_lastupdated_on`, but
    /// not the sentinel id.
    pub fn to_props(&self) -> Document {
        let mut props = self.properties.clone();
        if let Some(etag) = &self.etag {
            props.insert(ETAG_FIELD.to_string(), Value::String(etag.to_string()));
            if let Some(ts) = etag.timestamp() {
                props.insert(
                    LAST_UPDATED_ON_FIELD.to_string(),
                    Value::String(ts.to_rfc3339()),
                );
            }
        }
        if let Some(created_on) = self.created_on {
            props.insert(
                CREATED_ON_FIELD.to_string(),
                Value::String(created_on.to_rfc3339()),
            );
        }
        props
    }
}
