//! Content checkers.
//!
//! A checker inspects the content of a write and either lets it pass or
//! rejects it with a reason. Checkers are built from their directive args
//! once per request, so argument errors surface as [`MetadataError`]s.

use std::fmt;
use std::sync::Arc;

use docgate_persistence::query::{lookup, values_equal};
use docgate_persistence::types::Document;
use serde_json::Value;

use super::schema;
use super::{MetadataError, MetadataResult};

/// The kind of write being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// POST of a single document.
    Create,
    /// PUT of a document.
    Replace,
    /// PATCH of a document, checked on the merged result.
    Patch,
    /// POST of an array of documents, each checked on its own.
    BulkCreate,
    /// PATCH of every document matching a filter, checked on the patch.
    BulkPatch,
}

/// The result of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The content is acceptable.
    Pass,
    /// The content is rejected.
    Fail(String),
}

/// What a checker may know about the write besides its content.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// The kind of write.
    pub kind: WriteKind,
    /// The stored document a replace or patch overwrites.
    pub existing: Option<&'a Document>,
    /// The schema a schema checker refers to, when it was found.
    pub schema: Option<&'a Value>,
}

/// Where a schema checker's schema is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRef {
    /// Database holding the `_schemas` collection; the checked one when absent.
    pub store_db: Option<String>,
    /// Id of the schema document.
    pub id: Value,
}

/// A content check.
pub trait Checker: Send + Sync + fmt::Debug {
    /// Registered name.
    fn name(&self) -> &'static str;

    /// Whether the checker can judge this kind of write.
    fn supports(&self, kind: WriteKind) -> bool {
        kind != WriteKind::BulkPatch
    }

    /// The schema the checker needs loaded before [`check`](Checker::check).
    fn schema_ref(&self) -> Option<&SchemaRef> {
        None
    }

    /// Judges the content.
    fn check(&self, content: &Document, ctx: &CheckContext<'_>) -> CheckOutcome;
}

/// Validates content against a schema stored in a `_schemas` collection.
///
/// Args: `{"schemaId": <id>, "schemaStoreDb": <db>?}`.
#[derive(Debug)]
pub struct JsonSchemaChecker {
    schema: SchemaRef,
}

impl JsonSchemaChecker {
    /// Registered name.
    pub const NAME: &'static str = "jsonSchema";

    /// Builds the checker from its args.
    pub fn from_args(args: &Value) -> MetadataResult<Arc<dyn Checker>> {
        let id = args
            .get("schemaId")
            .filter(|v| v.is_string() || v.is_number())
            .cloned()
            .ok_or_else(|| MetadataError::Checker("jsonSchema requires a schemaId".to_string()))?;
        let store_db = match args.get("schemaStoreDb") {
            None | Some(Value::Null) => None,
            Some(Value::String(db)) => Some(db.clone()),
            Some(_) => {
                return Err(MetadataError::Checker(
                    "schemaStoreDb must be a string".to_string(),
                ));
            }
        };
        Ok(Arc::new(Self {
            schema: SchemaRef { store_db, id },
        }))
    }
}

impl Checker for JsonSchemaChecker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn schema_ref(&self) -> Option<&SchemaRef> {
        Some(&self.schema)
    }

    fn check(&self, content: &Document, ctx: &CheckContext<'_>) -> CheckOutcome {
        let Some(schema) = ctx.schema else {
            return CheckOutcome::Fail(format!("schema {} not found", self.schema.id));
        };
        let errors = schema::validate(schema, &Value::Object(content.clone()));
        if errors.is_empty() {
            CheckOutcome::Pass
        } else {
            CheckOutcome::Fail(errors.join(", "))
        }
    }
}

/// Bounds the serialized size of the content in bytes.
///
/// Args: `{"max": <bytes>?, "min": <bytes>?}`, at least one of them.
#[derive(Debug)]
pub struct ContentSizeChecker {
    min: Option<u64>,
    max: Option<u64>,
}

impl ContentSizeChecker {
    /// Registered name.
    pub const NAME: &'static str = "checkContentSize";

    /// Builds the checker from its args.
    pub fn from_args(args: &Value) -> MetadataResult<Arc<dyn Checker>> {
        let bound = |key: &str| match args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                MetadataError::Checker(format!("checkContentSize {} must be a positive integer", key))
            }),
        };
        let min = bound("min")?;
        let max = bound("max")?;
        if min.is_none() && max.is_none() {
            return Err(MetadataError::Checker(
                "checkContentSize requires max or min".to_string(),
            ));
        }
        Ok(Arc::new(Self { min, max }))
    }
}

impl Checker for ContentSizeChecker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports(&self, _kind: WriteKind) -> bool {
        true
    }

    fn check(&self, content: &Document, _ctx: &CheckContext<'_>) -> CheckOutcome {
        let size = serde_json::to_vec(content).map(|b| b.len() as u64).unwrap_or(0);
        if let Some(max) = self.max {
            if size > max {
                return CheckOutcome::Fail(format!("content size {} exceeds {} bytes", size, max));
            }
        }
        if let Some(min) = self.min {
            if size < min {
                return CheckOutcome::Fail(format!("content size {} is below {} bytes", size, min));
            }
        }
        CheckOutcome::Pass
    }
}

/// Requires fields, addressed by dot paths, to be present.
///
/// Args: `["field", "nested.field"]`.
#[derive(Debug)]
pub struct RequiredFieldsChecker {
    fields: Vec<String>,
}

impl RequiredFieldsChecker {
    /// Registered name.
    pub const NAME: &'static str = "requiredFields";

    /// Builds the checker from its args.
    pub fn from_args(args: &Value) -> MetadataResult<Arc<dyn Checker>> {
        Ok(Arc::new(Self {
            fields: field_list(Self::NAME, args)?,
        }))
    }
}

impl Checker for RequiredFieldsChecker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, content: &Document, _ctx: &CheckContext<'_>) -> CheckOutcome {
        match self.fields.iter().find(|f| lookup(content, f).is_none()) {
            Some(missing) => CheckOutcome::Fail(format!("missing required field {}", missing)),
            None => CheckOutcome::Pass,
        }
    }
}

/// Forbids changing fields once they are stored.
///
/// Args: `["field", "nested.field"]`. New documents always pass.
#[derive(Debug)]
pub struct ImmutableFieldsChecker {
    fields: Vec<String>,
}

impl ImmutableFieldsChecker {
    /// Registered name.
    pub const NAME: &'static str = "immutableFields";

    /// Builds the checker from its args.
    pub fn from_args(args: &Value) -> MetadataResult<Arc<dyn Checker>> {
        Ok(Arc::new(Self {
            fields: field_list(Self::NAME, args)?,
        }))
    }
}

impl Checker for ImmutableFieldsChecker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn check(&self, content: &Document, ctx: &CheckContext<'_>) -> CheckOutcome {
        let Some(existing) = ctx.existing else {
            return CheckOutcome::Pass;
        };
        for field in &self.fields {
            if let Some(stored) = lookup(existing, field) {
                let unchanged = lookup(content, field).is_some_and(|v| values_equal(v, stored));
                if !unchanged {
                    return CheckOutcome::Fail(format!("field {} cannot be changed", field));
                }
            }
        }
        CheckOutcome::Pass
    }
}

fn field_list(checker: &str, args: &Value) -> MetadataResult<Vec<String>> {
    let fields: Option<Vec<String>> = args
        .as_array()
        .and_then(|items| items.iter().map(|i| i.as_str().map(String::from)).collect());
    match fields {
        Some(fields) if !fields.is_empty() => Ok(fields),
        _ => Err(MetadataError::Checker(format!(
            "{} args must be a non-empty array of field names",
            checker
        ))),
    }
}
