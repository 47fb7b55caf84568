//! HAL resources.
//!
//! A [`Resource`] is a set of properties plus `_links` and `_embedded`
//! sections. It serializes to a single JSON object:
//!
//! ```json
//! {
//!   "_returned": 1,
//!   "_links": { "self": { "href": "/db/coll" } },
//!   "_embedded": { "rh:doc": [ { "_id": "a", "_links": { "self": { "href": "/db/coll/a" } } } ] }
//! }
//! ```

use docgate_persistence::types::Document;
use serde_json::{Map, Value, json};

/// Relation of embedded warning resources.
pub const WARNINGS_REL: &str = "rh:warnings";

/// A HAL link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Target, or a URI template when `templated`.
    pub href: String,
    /// Whether `href` is a URI template.
    pub templated: bool,
}

impl Link {
    /// A plain link.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: false,
        }
    }

    /// A URI template link.
    pub fn templated(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: true,
        }
    }

    fn to_value(&self) -> Value {
        if self.templated {
            json!({ "href": self.href, "templated": true })
        } else {
            json!({ "href": self.href })
        }
    }
}

/// A HAL resource.
///
/// # Examples
///
/// ```
/// use docgate_rest::responses::hal::{Link, Resource};
/// use serde_json::json;
///
/// let mut coll = Resource::new("/db/coll");
/// coll.add_property("_returned", json!(1));
/// coll.add_link("rh:indexes", Link::new("/db/coll/_indexes"));
/// coll.add_child("rh:doc", Resource::new("/db/coll/a"));
///
/// let value = coll.to_value();
/// assert_eq!(value["_links"]["self"]["href"], "/db/coll");
/// assert_eq!(value["_embedded"]["rh:doc"][0]["_links"]["self"]["href"], "/db/coll/a");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    href: Option<String>,
    properties: Document,
    links: Vec<(String, Link)>,
    embedded: Vec<(String, Vec<Resource>)>,
}

impl Resource {
    /// Creates a resource whose `self` link is `href`.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Default::default()
        }
    }

    /// Creates a resource without a `self` link.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns the `self` href.
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Sets a property, replacing any previous value.
    pub fn add_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    /// Sets every property of `props`.
    pub fn add_properties(&mut self, props: Document) {
        self.properties.extend(props);
    }

    /// Returns the properties.
    pub fn properties(&self) -> &Document {
        &self.properties
    }

    /// Returns the properties for in-place changes.
    pub fn properties_mut(&mut self) -> &mut Document {
        &mut self.properties
    }

    /// Adds a link. A link with the same relation is replaced.
    pub fn add_link(&mut self, rel: impl Into<String>, link: Link) {
        let rel = rel.into();
        match self.links.iter_mut().find(|(r, _)| *r == rel) {
            Some(slot) => slot.1 = link,
            None => self.links.push((rel, link)),
        }
    }

    /// Returns the link of a relation.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|(r, _)| r == rel).map(|(_, l)| l)
    }

    /// Embeds a child resource under a relation.
    pub fn add_child(&mut self, rel: impl Into<String>, child: Resource) {
        let rel = rel.into();
        match self.embedded.iter_mut().find(|(r, _)| *r == rel) {
            Some((_, children)) => children.push(child),
            None => self.embedded.push((rel, vec![child])),
        }
    }

    /// Returns the children embedded under a relation.
    pub fn children(&self, rel: &str) -> &[Resource] {
        self.embedded
            .iter()
            .find(|(r, _)| r == rel)
            .map(|(_, c)| c.as_slice())
            .unwrap_or(&[])
    }

    /// Returns every embedded child, whatever its relation, for in-place changes.
    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.embedded.iter_mut().flat_map(|(_, c)| c.iter_mut())
    }

    /// Embeds a warning.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let mut warning = Resource::anonymous();
        warning.add_property("message", Value::String(message.into()));
        self.add_child(WARNINGS_REL, warning);
    }

    /// Serializes the resource.
    pub fn to_value(&self) -> Value {
        let mut out = self.properties.clone();

        if self.href.is_some() || !self.links.is_empty() {
            let mut links = Map::new();
            if let Some(href) = &self.href {
                links.insert("self".to_string(), Link::new(href.clone()).to_value());
            }
            for (rel, link) in &self.links {
                links.insert(rel.clone(), link.to_value());
            }
            out.insert("_links".to_string(), Value::Object(links));
        }

        if !self.embedded.is_empty() {
            let embedded = self
                .embedded
                .iter()
                .map(|(rel, children)| {
                    (
                        rel.clone(),
                        Value::Array(children.iter().map(Resource::to_value).collect()),
                    )
                })
                .collect();
            out.insert("_embedded".to_string(), Value::Object(embedded));
        }

        Value::Object(out)
    }
}
