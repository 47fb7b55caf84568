//! Partial update documents.
//!
//! A PATCH body is either a plain document, whose keys are set (dot paths
//! address nested fields), or a document of update operators. Both forms can
//! be mixed; plain keys are folded into `$set`.

use chrono::Utc;
use serde_json::{Number, Value};

use super::ordering::values_equal;
use crate::error::QueryError;
use crate::types::{Document, ID_FIELD};

/// A single field modification.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set the value at a path, creating intermediate objects.
    Set(String, Value),
    /// Remove the value at a path.
    Unset(String),
    /// Add a number to the value at a path.
    Inc(String, Number),
    /// Append to the array at a path.
    Push(String, Value),
    /// Append to the array at a path unless already present.
    AddToSet(String, Value),
    /// Set the value at a path to the current time.
    CurrentDate(String),
}

impl UpdateOp {
    fn path(&self) -> &str {
        match self {
            UpdateOp::Set(p, _)
            | UpdateOp::Unset(p)
            | UpdateOp::Inc(p, _)
            | UpdateOp::Push(p, _)
            | UpdateOp::AddToSet(p, _)
            | UpdateOp::CurrentDate(p) => p,
        }
    }
}

/// An ordered list of field modifications.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Update(Vec<UpdateOp>);

impl Update {
    /// Parses a PATCH body.
    pub fn parse(body: &Document) -> Result<Self, QueryError> {
        let mut ops = Vec::new();
        for (key, value) in body {
            if !key.starts_with('$') {
                ops.push(UpdateOp::Set(key.clone(), value.clone()));
                continue;
            }
            let Some(fields) = value.as_object() else {
                return Err(invalid(format!("{} requires a document", key)));
            };
            for (path, arg) in fields {
                ops.push(match key.as_str() {
                    "$set" => UpdateOp::Set(path.clone(), arg.clone()),
                    "$unset" => UpdateOp::Unset(path.clone()),
                    "$inc" => match arg {
                        Value::Number(n) => UpdateOp::Inc(path.clone(), n.clone()),
                        _ => return Err(invalid(format!("$inc of {} requires a number", path))),
                    },
                    "$push" => UpdateOp::Push(path.clone(), arg.clone()),
                    "$addToSet" => UpdateOp::AddToSet(path.clone(), arg.clone()),
                    "$currentDate" => UpdateOp::CurrentDate(path.clone()),
                    other => return Err(invalid(format!("unknown update operator {}", other))),
                });
            }
        }

        let update = Update(ops);
        if update.touches(ID_FIELD) {
            return Err(invalid("the _id field cannot be updated"));
        }
        Ok(update)
    }

    /// Builds an update that sets every field of `fields`.
    pub fn set_all(fields: &Document) -> Self {
        Update(
            fields
                .iter()
                .map(|(k, v)| UpdateOp::Set(k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Appends a `$set` of one path.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.0.push(UpdateOp::Set(path.into(), value));
        self
    }

    /// Returns true if any operation targets `path` or one of its children.
    pub fn touches(&self, path: &str) -> bool {
        self.0.iter().any(|op| {
            let p = op.path();
            p == path || p.starts_with(&format!("{}.", path))
        })
    }

    /// Returns true if the update contains no operation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies the update in order.
    pub fn apply(&self, target: &mut Document) -> Result<(), QueryError> {
        for op in &self.0 {
            match op {
                UpdateOp::Set(path, value) => {
                    *slot(target, path)? = value.clone();
                }
                UpdateOp::Unset(path) => unset(target, path),
                UpdateOp::Inc(path, delta) => {
                    let current = slot(target, path)?;
                    let next = match &*current {
                        Value::Null => Value::Number(delta.clone()),
                        Value::Number(n) => Value::Number(add(n, delta).ok_or_else(|| {
                            invalid(format!("$inc overflow on {}", path))
                        })?),
                        _ => return Err(invalid(format!("cannot $inc non-numeric field {}", path))),
                    };
                    *current = next;
                }
                UpdateOp::Push(path, value) | UpdateOp::AddToSet(path, value) => {
                    let unique = matches!(op, UpdateOp::AddToSet(..));
                    let current = slot(target, path)?;
                    if current.is_null() {
                        *current = Value::Array(Vec::new());
                    }
                    let Value::Array(items) = current else {
                        return Err(invalid(format!("cannot push to non-array field {}", path)));
                    };
                    if !unique || !items.iter().any(|i| values_equal(i, value)) {
                        items.push(value.clone());
                    }
                }
                UpdateOp::CurrentDate(path) => {
                    *slot(target, path)? = Value::String(Utc::now().to_rfc3339());
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> QueryError {
    QueryError::InvalidUpdate {
        message: message.into(),
    }
}

fn add(a: &Number, b: &Number) -> Option<Number> {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.checked_add(y).map(Number::from),
        _ => Number::from_f64(a.as_f64()? + b.as_f64()?),
    }
}

/// Returns the slot at `path`, creating intermediate objects and a null leaf.
fn slot<'a>(target: &'a mut Document, path: &str) -> Result<&'a mut Value, QueryError> {
    let mut segments = path.split('.');
    let first = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("empty field path"))?;
    let mut current = target.entry(first.to_string()).or_insert(Value::Null);

    for segment in segments {
        if segment.is_empty() {
            return Err(invalid(format!("empty segment in path {}", path)));
        }
        if current.is_null() {
            *current = Value::Object(Document::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| invalid(format!("cannot address array by {} in {}", segment, path)))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| invalid(format!("index {} out of range in {}", index, path)))?
            }
            _ => return Err(invalid(format!("cannot create field {} in {}", segment, path))),
        };
    }

    Ok(current)
}

fn unset(target: &mut Document, path: &str) {
    match path.rsplit_once('.') {
        None => {
            target.remove(path);
        }
        Some((parent, leaf)) => {
            let mut current: Option<&mut Value> = None;
            for (i, segment) in parent.split('.').enumerate() {
                current = if i == 0 {
                    target.get_mut(segment)
                } else {
                    match current {
                        Some(Value::Object(map)) => map.get_mut(segment),
                        _ => None,
                    }
                };
            }
            if let Some(Value::Object(map)) = current {
                map.remove(leaf);
            }
        }
    }
}
