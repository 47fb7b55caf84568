//! Query parameters.
//!
//! | Parameter | Meaning |
//! |-----------|---------|
//! | `page` | 1-based page number |
//! | `pagesize` | documents per page, `0..=max_pagesize` |
//! | `sort_by` | sort keys, repeatable or comma separated, `-` for descending |
//! | `filter` | JSON filter, repeatable, combined with AND |
//! | `hal` | `c`ompact or `f`ull representation |
//! | `np` | omit collection properties |
//! | `count` | compute `_size` and `_total_pages` |
//! | `checkEtag` | demand `If-Match` regardless of the etag policy |
//! | `id_type` | `STRING` (default) or `NUMBER` document ids |

use docgate_persistence::query::Filter;
use docgate_persistence::types::{Page, SortSpec};
use serde_json::Value;

use crate::config::{HalMode, ServerConfig};
use crate::error::{RestError, RestResult};

/// How the document id path segment is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdType {
    /// The segment is the id.
    #[default]
    String,
    /// The segment is a number.
    Number,
}

impl IdType {
    /// Converts a path segment into an id value.
    pub fn to_id(self, segment: &str) -> RestResult<Value> {
        match self {
            IdType::String => Ok(Value::String(segment.to_string())),
            IdType::Number => {
                if let Ok(n) = segment.parse::<i64>() {
                    return Ok(Value::from(n));
                }
                segment
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| {
                        RestError::bad_request(format!(
                            "wrong document id format: {} is not a number",
                            segment
                        ))
                    })
            }
        }
    }
}

/// Parsed query parameters of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// Page number, starting at 1.
    pub page: u64,
    /// Page size.
    pub pagesize: u64,
    /// Raw sort keys.
    pub sort_by: Vec<String>,
    /// Raw filter expressions.
    pub filter: Vec<String>,
    /// Representation mode.
    pub hal: HalMode,
    /// Omit collection properties.
    pub no_props: bool,
    /// Compute the collection size.
    pub count: bool,
    /// Demand an etag on writes.
    pub check_etag: bool,
    /// Document id interpretation.
    pub id_type: IdType,
}

impl QueryParams {
    /// Parameters of a request without a query string.
    pub fn defaults(config: &ServerConfig) -> Self {
        Self {
            page: 1,
            pagesize: config.default_pagesize,
            sort_by: Vec::new(),
            filter: Vec::new(),
            hal: config.default_hal_mode,
            no_props: false,
            count: false,
            check_etag: false,
            id_type: IdType::String,
        }
    }

    /// Parses a raw query string.
    pub fn parse(query: Option<&str>, config: &ServerConfig) -> RestResult<Self> {
        let mut params = Self::defaults(config);
        let Some(query) = query else {
            return Ok(params);
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => {
                    params.page = value.parse().ok().filter(|p| *p >= 1).ok_or_else(|| {
                        RestError::bad_request(
                            "illegal page parameter, it must be a number greater than zero",
                        )
                    })?;
                }
                "pagesize" => {
                    params.pagesize = value
                        .parse()
                        .ok()
                        .filter(|s| *s <= config.max_pagesize)
                        .ok_or_else(|| {
                            RestError::bad_request(format!(
                                "illegal pagesize parameter, it must be a number between 0 and {}",
                                config.max_pagesize
                            ))
                        })?;
                }
                "sort_by" | "sort" => params.sort_by.push(value.into_owned()),
                "filter" => params.filter.push(value.into_owned()),
                "hal" => {
                    params.hal = HalMode::from_param(&value).ok_or_else(|| {
                        RestError::bad_request("illegal hal parameter, it must be f or c")
                    })?;
                }
                "np" => params.no_props = flag(&value),
                "count" => params.count = flag(&value),
                "checkEtag" => params.check_etag = flag(&value),
                "id_type" => {
                    params.id_type = match value.to_ascii_uppercase().as_str() {
                        "STRING" => IdType::String,
                        "NUMBER" => IdType::Number,
                        _ => {
                            return Err(RestError::bad_request(
                                "illegal id_type parameter, it must be STRING or NUMBER",
                            ));
                        }
                    };
                }
                _ => {}
            }
        }

        Ok(params)
    }

    /// Returns the requested page.
    pub fn page(&self) -> Page {
        Page::new(self.page, self.pagesize)
    }

    /// Parses the sort keys.
    pub fn sort(&self) -> RestResult<SortSpec> {
        Ok(SortSpec::parse(&self.sort_by)?)
    }

    /// Parses and combines the filters.
    pub fn filter(&self) -> RestResult<Filter> {
        Ok(Filter::parse_all(&self.filter)?)
    }

    /// Returns true for full HAL mode.
    pub fn is_full(&self) -> bool {
        self.hal == HalMode::Full
    }
}

/// A flag is set by its presence unless its value says otherwise.
fn flag(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> RestResult<QueryParams> {
        QueryParams::parse(Some(query), &ServerConfig::default())
    }

    #[test]
    fn test_defaults() {
        let params = QueryParams::parse(None, &ServerConfig::default()).unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.pagesize, 100);
        assert_eq!(params.hal, HalMode::Compact);
        assert!(!params.count);
    }

    #[test]
    fn test_paging() {
        let params = parse("page=3&pagesize=0").unwrap();
        assert_eq!(params.page().skip(), 0);
        assert_eq!(params.pagesize, 0);

        assert!(parse("page=0").is_err());
        assert!(parse("page=x").is_err());
        assert!(parse("pagesize=1001").is_err());
        assert!(parse("pagesize=-1").is_err());
    }

    #[test]
    fn test_repeatable_params() {
        let params = parse("filter=%7B%22a%22%3A1%7D&filter={\"b\":2}&sort_by=-a,b&sort_by=c").unwrap();
        assert_eq!(params.filter.len(), 2);
        assert_eq!(params.sort_by, vec!["-a,b".to_string(), "c".to_string()]);
        assert!(params.filter().is_ok());
    }

    #[test]
    fn test_invalid_filter_is_bad_request() {
        let params = parse("filter=nope").unwrap();
        let err = params.filter().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_flags() {
        let params = parse("np&count=true&checkEtag&hal=f").unwrap();
        assert!(params.no_props);
        assert!(params.count);
        assert!(params.check_etag);
        assert!(params.is_full());

        assert!(!parse("count=false").unwrap().count);
        assert!(parse("hal=x").is_err());
    }

    #[test]
    fn test_id_type() {
        let params = parse("id_type=number").unwrap();
        assert_eq!(params.id_type.to_id("42").unwrap(), Value::from(42));
        assert_eq!(params.id_type.to_id("1.5").unwrap(), Value::from(1.5));
        assert!(params.id_type.to_id("abc").is_err());
        assert_eq!(IdType::String.to_id("42").unwrap(), Value::from("42"));
        assert!(parse("id_type=DATE").is_err());
    }
}
