//! Content transformers.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docgate_persistence::types::Document;
use serde_json::{Value, json};

use super::{MetadataError, MetadataResult};

/// Request facts a transformer may copy into content.
#[derive(Debug, Clone)]
pub struct TransformContext<'a> {
    /// Request method.
    pub method: &'a str,
    /// Request path.
    pub path: &'a str,
    /// Peer address, when known.
    pub remote_addr: Option<SocketAddr>,
    /// `User-Agent` header.
    pub user_agent: Option<&'a str>,
    /// Request time.
    pub now: DateTime<Utc>,
}

/// A content mutation.
pub trait Transformer: Send + Sync + fmt::Debug {
    /// Registered name.
    fn name(&self) -> &'static str;

    /// Mutates the document in place.
    fn transform(&self, doc: &mut Document, ctx: &TransformContext<'_>);
}

/// Adds request facts under a property.
///
/// Args: `{"target": "<property>"?, "properties": [..]}` where each entry
/// is one of `remoteIp`, `dateTime`, `epochTimeStamp`, `requestPath`,
/// `requestMethod` and `userAgent`. The target defaults to `_request`.
#[derive(Debug)]
pub struct AddRequestProperties {
    target: String,
    properties: Vec<String>,
}

impl AddRequestProperties {
    /// Registered name.
    pub const NAME: &'static str = "addRequestProperties";

    const KNOWN: [&'static str; 6] = [
        "remoteIp",
        "dateTime",
        "epochTimeStamp",
        "requestPath",
        "requestMethod",
        "userAgent",
    ];

    /// Builds the transformer from its args.
    pub fn from_args(args: &Value) -> MetadataResult<Arc<dyn Transformer>> {
        let target = match args.get("target") {
            None | Some(Value::Null) => "_request".to_string(),
            Some(Value::String(t)) if !t.is_empty() => t.clone(),
            Some(_) => {
                return Err(MetadataError::Transformer(
                    "addRequestProperties target must be a non-empty string".to_string(),
                ));
            }
        };
        let properties = string_list(Self::NAME, args.get("properties").unwrap_or(&Value::Null))?;
        if let Some(unknown) = properties.iter().find(|p| !Self::KNOWN.contains(&p.as_str())) {
            return Err(MetadataError::Transformer(format!(
                "addRequestProperties does not know {}",
                unknown
            )));
        }
        Ok(Arc::new(Self { target, properties }))
    }
}

impl Transformer for AddRequestProperties {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn transform(&self, doc: &mut Document, ctx: &TransformContext<'_>) {
        let mut added = Document::new();
        for property in &self.properties {
            let value = match property.as_str() {
                "remoteIp" => ctx
                    .remote_addr
                    .map(|a| Value::String(a.ip().to_string()))
                    .unwrap_or(Value::Null),
                "dateTime" => Value::String(ctx.now.to_rfc3339()),
                "epochTimeStamp" => json!(ctx.now.timestamp()),
                "requestPath" => Value::String(ctx.path.to_string()),
                "requestMethod" => Value::String(ctx.method.to_string()),
                "userAgent" => ctx
                    .user_agent
                    .map(|ua| Value::String(ua.to_string()))
                    .unwrap_or(Value::Null),
                _ => continue,
            };
            added.insert(property.clone(), value);
        }
        doc.insert(self.target.clone(), Value::Object(added));
    }
}

/// Removes properties, addressed by dot paths.
///
/// Args: `["secret", "nested.field"]`.
#[derive(Debug)]
pub struct FilterProperties {
    fields: Vec<String>,
}

impl FilterProperties {
    /// Registered name.
    pub const NAME: &'static str = "filterProperties";

    /// Builds the transformer from its args.
    pub fn from_args(args: &Value) -> MetadataResult<Arc<dyn Transformer>> {
        Ok(Arc::new(Self {
            fields: string_list(Self::NAME, args)?,
        }))
    }
}

impl Transformer for FilterProperties {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn transform(&self, doc: &mut Document, _ctx: &TransformContext<'_>) {
        for field in &self.fields {
            remove_path(doc, field);
        }
    }
}

/// Converts RFC 3339 strings into `{"$date": <epoch millis>}`.
///
/// Args: `["createdAt", "nested.when"]`. Values that are not RFC 3339
/// strings are left alone.
#[derive(Debug)]
pub struct StringsToDates {
    fields: Vec<String>,
}

impl StringsToDates {
    /// Registered name.
    pub const NAME: &'static str = "stringsToDates";

    /// Builds the transformer from its args.
    pub fn from_args(args: &Value) -> MetadataResult<Arc<dyn Transformer>> {
        Ok(Arc::new(Self {
            fields: string_list(Self::NAME, args)?,
        }))
    }
}

impl Transformer for StringsToDates {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn transform(&self, doc: &mut Document, _ctx: &TransformContext<'_>) {
        for field in &self.fields {
            let Some(slot) = path_mut(doc, field) else {
                continue;
            };
            let parsed = slot
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
            if let Some(date) = parsed {
                *slot = json!({"$date": date.timestamp_millis()});
            }
        }
    }
}

fn string_list(transformer: &str, args: &Value) -> MetadataResult<Vec<String>> {
    let items: Option<Vec<String>> = args
        .as_array()
        .and_then(|items| items.iter().map(|i| i.as_str().map(String::from)).collect());
    match items {
        Some(items) if !items.is_empty() => Ok(items),
        _ => Err(MetadataError::Transformer(format!(
            "{} requires a non-empty array of names",
            transformer
        ))),
    }
}

fn path_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split('.');
    let mut current = doc.get_mut(segments.next()?)?;
    for segment in segments {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.rsplit_once('.') {
        None => {
            doc.remove(path);
        }
        Some((parent, leaf)) => {
            if let Some(Value::Object(map)) = path_mut(doc, parent) {
                map.remove(leaf);
            }
        }
    }
}
