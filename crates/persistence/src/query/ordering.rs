//! Total order over JSON values and field-path lookup.
//!
//! Values of different types compare by type rank (null, numbers, strings,
//! objects, arrays, booleans); values of the same type compare naturally.

use std::cmp::Ordering;

use serde_json::Value;

use crate::types::{Document, SortOrder, SortSpec};

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Compares two values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x.cmp(&y);
            }
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Returns true if two values are equal, comparing numbers by value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

/// Looks up a dot-separated path in a document.
///
/// Numeric segments index into arrays.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Compares two documents by a sort specification.
pub fn compare_documents(a: &Document, b: &Document, sort: &SortSpec) -> Ordering {
    const NULL: Value = Value::Null;
    for key in sort.keys() {
        let left = lookup(a, &key.field).unwrap_or(&NULL);
        let right = lookup(b, &key.field).unwrap_or(&NULL);
        let ord = compare_values(left, right);
        let ord = match key.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cross_type_rank() {
        assert_eq!(compare_values(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(99), &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!("z"), &json!({})), Ordering::Less);
        assert_eq!(compare_values(&json!([1]), &json!(true)), Ordering::Less);
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert!(values_equal(&json!(1), &json!(1.0)));
    }

    #[test]
    fn test_lookup_nested_and_array() {
        let doc = json!({"a": {"b": [10, 20]}}).as_object().cloned().unwrap();
        assert_eq!(lookup(&doc, "a.b.1"), Some(&json!(20)));
        assert_eq!(lookup(&doc, "a.c"), None);
    }

    #[test]
    fn test_compare_documents_multi_key() {
        let a = json!({"x": 1, "y": 2}).as_object().cloned().unwrap();
        let b = json!({"x": 1, "y": 3}).as_object().cloned().unwrap();
        let spec = SortSpec::parse(["x", "-y"]).unwrap();
        assert_eq!(compare_documents(&a, &b, &spec), Ordering::Greater);
    }
}
