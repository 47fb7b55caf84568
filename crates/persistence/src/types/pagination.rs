//! Pagination and sort types for collection listings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::{ETAG_FIELD, ID_FIELD, LAST_UPDATED_ON_FIELD};
use crate::error::QueryError;

/// Virtual sort key accepted for compatibility with older clients.
const LEGACY_LAST_UPDATED_ON: &str = "@lastupdated_on";

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Dot-separated field path.
    pub field: String,
    /// Direction.
    pub order: SortOrder,
}

/// An ordered list of sort keys.
///
/// # Examples
///
/// ```
/// use docgate_persistence::types::{SortOrder, SortSpec};
///
/// let spec = SortSpec::parse(["-age,name", "_lastupdated_on"]).unwrap();
/// let keys = spec.keys();
/// assert_eq!(keys[0].field, "age");
/// assert_eq!(keys[0].order, SortOrder::Descending);
/// assert_eq!(keys[1].field, "name");
/// // the derived last-update time sorts by the etag
/// assert_eq!(keys[2].field, "_etag");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec(Vec<SortKey>);

impl SortSpec {
    /// The default listing order: ascending id.
    pub fn by_id() -> Self {
        SortSpec(vec![SortKey {
            field: ID_FIELD.to_string(),
            order: SortOrder::Ascending,
        }])
    }

    /// Parses `sort_by` values.
    ///
    /// Each value is either a comma separated list of (optionally `-` or `+`
    /// prefixed) field names, or a JSON object such as `{"a": 1, "b": -1}`.
    pub fn parse<I, S>(values: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys = Vec::new();

        for value in values {
            let value = value.as_ref().trim();
            if value.starts_with('{') {
                keys.extend(Self::parse_object(value)?);
                continue;
            }
            for part in value.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let (field, order) = if let Some(rest) = part.strip_prefix('-') {
                    (rest, SortOrder::Descending)
                } else if let Some(rest) = part.strip_prefix('+') {
                    (rest, SortOrder::Ascending)
                } else {
                    (part, SortOrder::Ascending)
                };
                keys.push(SortKey {
                    field: Self::resolve_alias(field, part)?,
                    order,
                });
            }
        }

        Ok(SortSpec(keys))
    }

    fn parse_object(value: &str) -> Result<Vec<SortKey>, QueryError> {
        let parsed: Value = serde_json::from_str(value).map_err(|e| QueryError::InvalidSort {
            key: value.to_string(),
            message: e.to_string(),
        })?;
        let Some(object) = parsed.as_object() else {
            return Err(QueryError::InvalidSort {
                key: value.to_string(),
                message: "sort document must be an object".to_string(),
            });
        };

        object
            .iter()
            .map(|(field, direction)| {
                let order = match direction.as_i64() {
                    Some(1) => SortOrder::Ascending,
                    Some(-1) => SortOrder::Descending,
                    _ => {
                        return Err(QueryError::InvalidSort {
                            key: field.clone(),
                            message: "direction must be 1 or -1".to_string(),
                        });
                    }
                };
                Ok(SortKey {
                    field: Self::resolve_alias(field, field)?,
                    order,
                })
            })
            .collect()
    }

    fn resolve_alias(field: &str, raw: &str) -> Result<String, QueryError> {
        if field.is_empty() {
            return Err(QueryError::InvalidSort {
                key: raw.to_string(),
                message: "empty field name".to_string(),
            });
        }
        if field == LEGACY_LAST_UPDATED_ON || field == LAST_UPDATED_ON_FIELD {
            Ok(ETAG_FIELD.to_string())
        } else {
            Ok(field.to_string())
        }
    }

    /// Returns the keys in priority order.
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Returns true when no key was given.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns this spec, or the default order when empty.
    pub fn or_default_order(self) -> Self {
        if self.is_empty() { Self::by_id() } else { self }
    }
}

/// A one-based page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page number, starting at 1.
    pub page: u64,
    /// Documents per page; 0 returns no documents.
    pub pagesize: u64,
}

impl Page {
    /// Creates a page. Page numbers below 1 are treated as 1.
    pub fn new(page: u64, pagesize: u64) -> Self {
        Self {
            page: page.max(1),
            pagesize,
        }
    }

    /// Number of documents to skip.
    pub fn skip(&self) -> u64 {
        self.pagesize.saturating_mul(self.page - 1)
    }

    /// Number of pages needed for `size` documents.
    pub fn total_pages(&self, size: u64) -> u64 {
        if self.pagesize == 0 {
            0
        } else {
            size.div_ceil(self.pagesize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixes() {
        let spec = SortSpec::parse(["+a", "-b", "c"]).unwrap();
        let orders: Vec<_> = spec.keys().iter().map(|k| k.order).collect();
        assert_eq!(
            orders,
            vec![SortOrder::Ascending, SortOrder::Descending, SortOrder::Ascending]
        );
    }

    #[test]
    fn test_legacy_alias_maps_to_etag() {
        let spec = SortSpec::parse(["-@lastupdated_on"]).unwrap();
        assert_eq!(spec.keys()[0].field, ETAG_FIELD);
        assert_eq!(spec.keys()[0].order, SortOrder::Descending);
    }

    #[test]
    fn test_parse_object_form() {
        let spec = SortSpec::parse([r#"{"a": -1, "b": 1}"#]).unwrap();
        assert_eq!(spec.keys().len(), 2);
        assert_eq!(spec.keys()[0].order, SortOrder::Descending);
    }

    #[test]
    fn test_parse_object_rejects_bad_direction() {
        assert!(SortSpec::parse([r#"{"a": 2}"#]).is_err());
        assert!(SortSpec::parse(["-"]).is_err());
    }

    #[test]
    fn test_empty_spec_defaults_to_id() {
        let spec = SortSpec::parse(Vec::<String>::new()).unwrap().or_default_order();
        assert_eq!(spec, SortSpec::by_id());
    }

    #[test]
    fn test_page_skip_and_total_pages() {
        let page = Page::new(2, 10);
        assert_eq!(page.skip(), 10);
        assert_eq!(page.total_pages(25), 3);
        assert_eq!(Page::new(0, 10).page, 1);
        assert_eq!(Page::new(1, 0).total_pages(25), 0);
    }
}
