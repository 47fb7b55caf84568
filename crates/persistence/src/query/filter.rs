//! Filter expressions.
//!
//! Filters use the document-store query grammar:
//!
//! ```text
//! filter     = { clause, ... }                       (clauses are ANDed)
//! clause     = path: value                           (implicit $eq)
//!            | path: { op: operand, ... }
//!            | "$and" | "$or" | "$nor": [filter, ...]
//! op         = $eq $ne $gt $gte $lt $lte $in $nin $exists $regex $options $not
//! ```
//!
//! # Example
//!
//! ```
//! use docgate_persistence::query::Filter;
//! use serde_json::json;
//!
//! let filter = Filter::parse(r#"{"age": {"$gte": 18}, "tags": "admin"}"#).unwrap();
//! let doc = json!({"age": 30, "tags": ["admin", "ops"]});
//! assert!(filter.matches(doc.as_object().unwrap()));
//! ```

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use super::ordering::{compare_values, lookup, values_equal};
use crate::error::QueryError;
use crate::types::{Document, ID_FIELD, METADATA_ID};

/// A condition applied to the value found at a field path.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Equal (or, for arrays, containing an equal element).
    Eq(Value),
    /// Not equal.
    Ne(Value),
    /// Greater than.
    Gt(Value),
    /// Greater than or equal.
    Gte(Value),
    /// Less than.
    Lt(Value),
    /// Less than or equal.
    Lte(Value),
    /// Equal to any of the values.
    In(Vec<Value>),
    /// Equal to none of the values.
    Nin(Vec<Value>),
    /// Field presence.
    Exists(bool),
    /// String matching a pattern.
    Regex(Regex),
    /// Negation.
    Not(Box<Condition>),
    /// Conjunction of several operators on one field.
    All(Vec<Condition>),
}

/// A parsed filter.
#[derive(Debug, Clone)]
pub enum Filter {
    /// All sub-filters match. An empty list matches everything.
    And(Vec<Filter>),
    /// At least one sub-filter matches.
    Or(Vec<Filter>),
    /// No sub-filter matches.
    Nor(Vec<Filter>),
    /// A condition on a field path.
    Field {
        /// Dot-separated path.
        path: String,
        /// Condition on the value at `path`.
        condition: Condition,
    },
}

impl Default for Filter {
    fn default() -> Self {
        Filter::And(Vec::new())
    }
}

impl Filter {
    /// A filter matching every document.
    pub fn all() -> Self {
        Filter::default()
    }

    /// Field equality.
    pub fn eq(path: impl Into<String>, value: Value) -> Self {
        Filter::Field {
            path: path.into(),
            condition: Condition::Eq(value),
        }
    }

    /// Matches only data documents, never the metadata record.
    pub fn data() -> Self {
        Filter::Field {
            path: ID_FIELD.to_string(),
            condition: Condition::Ne(Value::String(METADATA_ID.to_string())),
        }
    }

    /// Matches only the metadata record.
    pub fn metadata() -> Self {
        Filter::eq(ID_FIELD, Value::String(METADATA_ID.to_string()))
    }

    /// Combines this filter with another.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut items) => {
                items.push(other);
                Filter::And(items)
            }
            single => Filter::And(vec![single, other]),
        }
    }

    /// Returns true when this filter is the empty conjunction.
    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::And(items) if items.is_empty())
    }

    /// Parses a filter expression.
    ///
    /// When the text is not valid JSON, the legacy form in which `[` and `]`
    /// stand for `{` and `}` is tried before giving up.
    pub fn parse(expression: &str) -> Result<Self, QueryError> {
        let value = match serde_json::from_str::<Value>(expression) {
            Ok(value) => value,
            Err(first) => {
                let legacy = expression.replace('[', "{").replace(']', "}");
                serde_json::from_str::<Value>(&legacy).map_err(|_| {
                    debug!(filter = %expression, error = %first, "Error parsing filter expression");
                    QueryError::InvalidFilter {
                        expression: expression.to_string(),
                        message: first.to_string(),
                    }
                })?
            }
        };
        Self::from_value(&value).map_err(|e| match e {
            QueryError::InvalidFilter { message, .. } => QueryError::InvalidFilter {
                expression: expression.to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parses several expressions and ANDs them.
    pub fn parse_all<I, S>(expressions: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filters = expressions
            .into_iter()
            .map(|e| Self::parse(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match filters.len() {
            1 => filters.into_iter().next().unwrap_or_default(),
            _ => Filter::And(filters),
        })
    }

    /// Builds a filter from a JSON query document.
    pub fn from_value(value: &Value) -> Result<Self, QueryError> {
        let Some(object) = value.as_object() else {
            return Err(invalid("filter must be a JSON object"));
        };

        let mut clauses = Vec::with_capacity(object.len());
        for (key, operand) in object {
            clauses.push(match key.as_str() {
                "$and" => Filter::And(Self::sub_filters(key, operand)?),
                "$or" => Filter::Or(Self::sub_filters(key, operand)?),
                "$nor" => Filter::Nor(Self::sub_filters(key, operand)?),
                op if op.starts_with('$') => {
                    return Err(invalid(format!("unsupported top-level operator {}", op)));
                }
                path => Filter::Field {
                    path: path.to_string(),
                    condition: Condition::from_operand(operand)?,
                },
            });
        }

        Ok(if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Filter::And(clauses)
        })
    }

    fn sub_filters(key: &str, operand: &Value) -> Result<Vec<Filter>, QueryError> {
        match operand.as_array() {
            Some(items) if !items.is_empty() => items.iter().map(Self::from_value).collect(),
            _ => Err(invalid(format!("{} requires a non-empty array", key))),
        }
    }

    /// Tests a document against the filter.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(doc)),
            Filter::Or(items) => items.iter().any(|f| f.matches(doc)),
            Filter::Nor(items) => !items.iter().any(|f| f.matches(doc)),
            Filter::Field { path, condition } => condition.matches(lookup(doc, path)),
        }
    }
}

impl Condition {
    fn from_operand(operand: &Value) -> Result<Self, QueryError> {
        let Some(object) = operand.as_object() else {
            return Ok(Condition::Eq(operand.clone()));
        };
        let operator_keys = object.keys().filter(|k| k.starts_with('$')).count();
        if operator_keys == 0 {
            return Ok(Condition::Eq(operand.clone()));
        }
        if operator_keys != object.len() {
            return Err(invalid("cannot mix operators and fields in one condition"));
        }

        let options = object.get("$options").and_then(Value::as_str).unwrap_or("");
        let mut conditions = Vec::with_capacity(object.len());
        for (op, arg) in object {
            let condition = match op.as_str() {
                "$eq" => Condition::Eq(arg.clone()),
                "$ne" => Condition::Ne(arg.clone()),
                "$gt" => Condition::Gt(arg.clone()),
                "$gte" => Condition::Gte(arg.clone()),
                "$lt" => Condition::Lt(arg.clone()),
                "$lte" => Condition::Lte(arg.clone()),
                "$in" => Condition::In(array_operand(op, arg)?),
                "$nin" => Condition::Nin(array_operand(op, arg)?),
                "$exists" => Condition::Exists(truthy(arg)),
                "$regex" => {
                    let Some(pattern) = arg.as_str() else {
                        return Err(invalid("$regex requires a string"));
                    };
                    Condition::Regex(
                        RegexBuilder::new(pattern)
                            .case_insensitive(options.contains('i'))
                            .multi_line(options.contains('m'))
                            .dot_matches_new_line(options.contains('s'))
                            .build()?,
                    )
                }
                "$options" => continue,
                "$not" => Condition::Not(Box::new(Condition::from_operand(arg)?)),
                other => return Err(invalid(format!("unknown operator {}", other))),
            };
            conditions.push(condition);
        }

        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Condition::All(conditions)
        })
    }

    /// Tests the value found at a path (`None` when the path is absent).
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => eq_matches(value, expected),
            Condition::Ne(expected) => !eq_matches(value, expected),
            Condition::Gt(bound) => cmp_matches(value, bound, |o| o == Ordering::Greater),
            Condition::Gte(bound) => cmp_matches(value, bound, |o| o != Ordering::Less),
            Condition::Lt(bound) => cmp_matches(value, bound, |o| o == Ordering::Less),
            Condition::Lte(bound) => cmp_matches(value, bound, |o| o != Ordering::Greater),
            Condition::In(candidates) => candidates.iter().any(|c| eq_matches(value, c)),
            Condition::Nin(candidates) => !candidates.iter().any(|c| eq_matches(value, c)),
            Condition::Exists(expected) => value.is_some() == *expected,
            Condition::Regex(re) => any_element(value, |v| v.as_str().is_some_and(|s| re.is_match(s))),
            Condition::Not(inner) => !inner.matches(value),
            Condition::All(items) => items.iter().all(|c| c.matches(value)),
        }
    }
}

fn invalid(message: impl Into<String>) -> QueryError {
    QueryError::InvalidFilter {
        expression: String::new(),
        message: message.into(),
    }
}

fn array_operand(op: &str, arg: &Value) -> Result<Vec<Value>, QueryError> {
    arg.as_array()
        .cloned()
        .ok_or_else(|| invalid(format!("{} requires an array", op)))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Null => false,
        _ => true,
    }
}

/// Applies `pred` to the value and, for arrays, to each element.
fn any_element(value: Option<&Value>, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        None => false,
        Some(whole @ Value::Array(items)) => pred(whole) || items.iter().any(|item| pred(item)),
        Some(v) => pred(v),
    }
}

fn eq_matches(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(_) => any_element(value, |v| values_equal(v, expected)),
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Null, Value::Null)
            | (Value::Array(_), Value::Array(_))
            | (Value::Object(_), Value::Object(_))
    )
}

fn cmp_matches(value: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    any_element(value, |v| same_kind(v, bound) && accept(compare_values(v, bound)))
}
