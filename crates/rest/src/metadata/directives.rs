//! Metadata directive parsing.
//!
//! Each block may hold a single directive object or an array of them.
//! Unknown keys inside a directive are ignored.

use docgate_persistence::types::{Document, id_to_path_segment};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{MetadataError, MetadataResult};

/// Metadata property holding checker directives.
pub const CHECKERS_KEY: &str = "checkers";
/// Metadata property holding transformer directives.
pub const TRANSFORMERS_KEY: &str = "transformers";
/// Metadata property holding relationships.
pub const RELATIONSHIPS_KEY: &str = "relationships";
/// Metadata property holding aggregations.
pub const AGGREGATIONS_KEY: &str = "aggregations";
/// Metadata property holding change stream declarations.
pub const STREAMS_KEY: &str = "streams";

/// When a transformer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// On incoming content, before checkers.
    Request,
    /// On outgoing content, before the representation is built.
    Response,
}

/// Which content a response transformer applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    /// The addressed resource.
    #[default]
    This,
    /// Every embedded document.
    Children,
}

/// A checker declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckerDirective {
    /// Registered checker name.
    pub name: String,
    /// Checker arguments.
    #[serde(default)]
    pub args: Value,
    /// Fail when the checker is not registered.
    #[serde(default)]
    pub mandatory: bool,
    /// Skip the checker on requests it does not support instead of failing.
    #[serde(default)]
    pub skip_not_supported: bool,
}

impl CheckerDirective {
    /// Parses the `checkers` block of a metadata record.
    pub fn parse_all(props: &Document) -> MetadataResult<Vec<Self>> {
        let directives: Vec<Self> = parse_block(props, CHECKERS_KEY, MetadataError::Checker)?;
        if directives.iter().any(|d| d.name.trim().is_empty()) {
            return Err(MetadataError::Checker("name must not be empty".to_string()));
        }
        Ok(directives)
    }
}

/// A transformer declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformerDirective {
    /// Registered transformer name.
    pub name: String,
    /// When the transformer runs.
    pub phase: Phase,
    /// What it applies to in the response phase.
    #[serde(default)]
    pub scope: Scope,
    /// Transformer arguments.
    #[serde(default)]
    pub args: Value,
    /// Fail when the transformer is not registered.
    #[serde(default)]
    pub mandatory: bool,
}

impl TransformerDirective {
    /// Parses the `transformers` block of a metadata record.
    pub fn parse_all(props: &Document) -> MetadataResult<Vec<Self>> {
        let directives: Vec<Self> =
            parse_block(props, TRANSFORMERS_KEY, MetadataError::Transformer)?;
        if directives.iter().any(|d| d.name.trim().is_empty()) {
            return Err(MetadataError::Transformer("name must not be empty".to_string()));
        }
        Ok(directives)
    }
}

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// One to one.
    OneToOne,
    /// One to many.
    OneToMany,
    /// Many to one.
    ManyToOne,
    /// Many to many.
    ManyToMany,
}

/// Which side of a relationship holds the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipRole {
    /// This document holds `ref-field`.
    Owning,
    /// The target documents hold `ref-field`.
    Inverse,
}

/// A link between the documents of a collection and another collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Relationship {
    /// Link relation name.
    pub rel: String,
    /// Cardinality.
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    /// Side holding the reference.
    pub role: RelationshipRole,
    /// Target database, defaulting to the collection's own.
    #[serde(rename = "target-db", default)]
    pub target_db: Option<String>,
    /// Target collection.
    #[serde(rename = "target-coll")]
    pub target_coll: String,
    /// Field holding the reference.
    #[serde(rename = "ref-field")]
    pub ref_field: String,
}

impl Relationship {
    /// Parses the `relationships` block of a metadata record.
    pub fn parse_all(props: &Document) -> MetadataResult<Vec<Self>> {
        let rels: Vec<Self> =
            parse_block(props, RELATIONSHIPS_KEY, MetadataError::Relationship)?;
        for rel in &rels {
            if rel.rel.is_empty() || rel.target_coll.is_empty() || rel.ref_field.is_empty() {
                return Err(MetadataError::Relationship(
                    "rel, target-coll and ref-field must not be empty".to_string(),
                ));
            }
        }
        Ok(rels)
    }

    /// Returns the link from `doc`, a document of a collection in `db`.
    ///
    /// Owning relationships read the reference from the document and yield
    /// no link when the field is absent. Inverse relationships link to the
    /// target documents referencing this one.
    pub fn link(&self, db: &str, doc: &Document) -> MetadataResult<Option<String>> {
        let target = format!(
            "/{}/{}",
            self.target_db.as_deref().unwrap_or(db),
            self.target_coll
        );

        match self.role {
            RelationshipRole::Owning => {
                let Some(reference) = doc.get(&self.ref_field).filter(|v| !v.is_null()) else {
                    return Ok(None);
                };
                match (self.kind, reference) {
                    (RelationshipType::OneToOne | RelationshipType::ManyToOne, Value::Array(_)) => {
                        Err(MetadataError::Relationship(format!(
                            "{} of {} must not be an array",
                            self.ref_field, self.rel
                        )))
                    }
                    (RelationshipType::OneToOne | RelationshipType::ManyToOne, id) => {
                        Ok(Some(document_href(&target, id)))
                    }
                    (_, Value::Array(ids)) => Ok(Some(format!(
                        "{}?filter={}",
                        target,
                        json!({"_id": {"$in": ids}})
                    ))),
                    (_, _) => Err(MetadataError::Relationship(format!(
                        "{} of {} must be an array",
                        self.ref_field, self.rel
                    ))),
                }
            }
            RelationshipRole::Inverse => {
                let Some(id) = doc.get(docgate_persistence::types::ID_FIELD) else {
                    return Ok(None);
                };
                let condition = match self.kind {
                    RelationshipType::OneToOne | RelationshipType::OneToMany => id.clone(),
                    RelationshipType::ManyToOne | RelationshipType::ManyToMany => {
                        json!({"$in": [id]})
                    }
                };
                let mut filter = Document::new();
                filter.insert(self.ref_field.clone(), condition);
                Ok(Some(format!("{}?filter={}", target, Value::Object(filter))))
            }
        }
    }
}

/// Href of a document, marking numeric ids.
pub fn document_href(collection_path: &str, id: &Value) -> String {
    let segment = id_to_path_segment(id);
    if id.is_number() {
        format!("{}/{}?id_type=NUMBER", collection_path, segment)
    } else {
        format!("{}/{}", collection_path, segment)
    }
}

/// Kind of a declared aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AggregationKind {
    /// An aggregation pipeline with `stages`.
    #[serde(rename = "pipeline", alias = "aggregate")]
    Pipeline,
    /// A map-reduce with `map` and `reduce` functions.
    #[serde(rename = "mapReduce")]
    MapReduce,
}

/// A declared aggregation, exposed as a link and never executed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregationDirective {
    /// Aggregation kind.
    #[serde(rename = "type")]
    pub kind: AggregationKind,
    /// Path segment under `_aggrs`.
    pub uri: String,
    /// The rest of the definition.
    #[serde(flatten)]
    pub definition: Document,
}

impl AggregationDirective {
    /// Parses the `aggregations` block of a metadata record.
    pub fn parse_all(props: &Document) -> MetadataResult<Vec<Self>> {
        let aggrs: Vec<Self> =
            parse_block(props, AGGREGATIONS_KEY, MetadataError::Aggregation)?;
        for aggr in &aggrs {
            if aggr.uri.is_empty() || aggr.uri.contains('/') {
                return Err(MetadataError::Aggregation(format!(
                    "invalid uri '{}'",
                    aggr.uri
                )));
            }
            match aggr.kind {
                AggregationKind::Pipeline => {
                    if !aggr.definition.get("stages").is_some_and(Value::is_array) {
                        return Err(MetadataError::Aggregation(format!(
                            "{} requires a stages array",
                            aggr.uri
                        )));
                    }
                }
                AggregationKind::MapReduce => {
                    let has = |key: &str| aggr.definition.get(key).is_some_and(Value::is_string);
                    if !has("map") || !has("reduce") {
                        return Err(MetadataError::Aggregation(format!(
                            "{} requires map and reduce functions",
                            aggr.uri
                        )));
                    }
                }
            }
        }
        Ok(aggrs)
    }
}

/// Returns the uris declared in the `streams` block.
///
/// Streams are only linked, so entries without a string `uri` are ignored.
pub fn stream_uris(props: &Document) -> Vec<String> {
    let uri = |v: &Value| v.get("uri").and_then(Value::as_str).map(String::from);
    match props.get(STREAMS_KEY) {
        Some(Value::Array(items)) => items.iter().filter_map(uri).collect(),
        Some(single @ Value::Object(_)) => uri(single).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn parse_block<T: DeserializeOwned>(
    props: &Document,
    key: &str,
    wrap: fn(String) -> MetadataError,
) -> MetadataResult<Vec<T>> {
    let parse = |item: &Value| serde_json::from_value(item.clone()).map_err(|e| wrap(e.to_string()));
    match props.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(parse).collect(),
        Some(single @ Value::Object(_)) => Ok(vec![parse(single)?]),
        Some(_) => Err(wrap(format!("{} must be an object or an array", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_checker_directives_accept_object_or_array() {
        let single = props(json!({"checkers": {"name": "requiredFields", "args": ["a"]}}));
        assert_eq!(CheckerDirective::parse_all(&single).unwrap().len(), 1);

        let many = props(json!({"checkers": [
            {"name": "requiredFields", "args": ["a"], "skipNotSupported": true, "extra": 1},
            {"name": "checkContentSize", "args": {"max": 10}, "mandatory": true}
        ]}));
        let parsed = CheckerDirective::parse_all(&many).unwrap();
        assert!(parsed[0].skip_not_supported);
        assert!(parsed[1].mandatory);

        assert!(CheckerDirective::parse_all(&props(json!({}))).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_checker_block() {
        let err = CheckerDirective::parse_all(&props(json!({"checkers": "nope"}))).unwrap_err();
        assert!(err.to_string().starts_with("wrong checker definition."));

        let err = CheckerDirective::parse_all(&props(json!({"checkers": [{"args": 1}]}))).unwrap_err();
        assert!(matches!(err, MetadataError::Checker(_)));
    }

    #[test]
    fn test_transformer_phase_and_scope() {
        let parsed = TransformerDirective::parse_all(&props(json!({"transformers": [
            {"name": "filterProperties", "phase": "RESPONSE", "scope": "CHILDREN", "args": ["secret"]},
            {"name": "stringsToDates", "phase": "REQUEST", "args": ["when"]}
        ]})))
        .unwrap();
        assert_eq!(parsed[0].phase, Phase::Response);
        assert_eq!(parsed[0].scope, Scope::Children);
        assert_eq!(parsed[1].scope, Scope::This);

        let err = TransformerDirective::parse_all(&props(json!({"transformers": [
            {"name": "x", "phase": "LATER"}
        ]})))
        .unwrap_err();
        assert!(err.to_string().starts_with("wrong representation transformer definition."));
    }

    #[test]
    fn test_owning_relationship_links() {
        let rels = Relationship::parse_all(&props(json!({"relationships": [
            {"rel": "author", "type": "MANY_TO_ONE", "role": "OWNING", "target-coll": "users", "ref-field": "author_id"},
            {"rel": "tags", "type": "MANY_TO_MANY", "role": "OWNING", "target-db": "meta", "target-coll": "tags", "ref-field": "tag_ids"}
        ]})))
        .unwrap();

        let doc = props(json!({"_id": "p1", "author_id": 7, "tag_ids": ["a", "b"]}));
        assert_eq!(
            rels[0].link("blog", &doc).unwrap().unwrap(),
            "/blog/users/7?id_type=NUMBER"
        );
        assert_eq!(
            rels[1].link("blog", &doc).unwrap().unwrap(),
            r#"/meta/tags?filter={"_id":{"$in":["a","b"]}}"#
        );

        let without = props(json!({"_id": "p2"}));
        assert_eq!(rels[0].link("blog", &without).unwrap(), None);

        let wrong = props(json!({"_id": "p3", "tag_ids": "a"}));
        assert!(rels[1].link("blog", &wrong).is_err());
    }

    #[test]
    fn test_inverse_relationship_link() {
        let rels = Relationship::parse_all(&props(json!({"relationships": {
            "rel": "posts", "type": "ONE_TO_MANY", "role": "INVERSE", "target-coll": "posts", "ref-field": "author_id"
        }})))
        .unwrap();
        let doc = props(json!({"_id": "u1"}));
        assert_eq!(
            rels[0].link("blog", &doc).unwrap().unwrap(),
            r#"/blog/posts?filter={"author_id":"u1"}"#
        );
    }

    #[test]
    fn test_relationship_requires_known_type() {
        let err = Relationship::parse_all(&props(json!({"relationships": [
            {"rel": "x", "type": "SOME", "role": "OWNING", "target-coll": "c", "ref-field": "f"}
        ]})))
        .unwrap_err();
        assert!(err.to_string().starts_with("wrong relationships definition."));
    }

    #[test]
    fn test_aggregations() {
        let aggrs = AggregationDirective::parse_all(&props(json!({"aggregations": [
            {"type": "pipeline", "uri": "by-qty", "stages": [{"$match": {}}]},
            {"type": "mapReduce", "uri": "totals", "map": "function(){}", "reduce": "function(){}"}
        ]})))
        .unwrap();
        assert_eq!(aggrs[0].kind, AggregationKind::Pipeline);
        assert_eq!(aggrs[1].uri, "totals");

        let err = AggregationDirective::parse_all(&props(json!({"aggregations": [
            {"type": "pipeline", "uri": "x"}
        ]})))
        .unwrap_err();
        assert!(matches!(err, MetadataError::Aggregation(_)));
    }

    #[test]
    fn test_stream_uris() {
        let p = props(json!({"streams": [{"uri": "changes"}, {"nope": 1}]}));
        assert_eq!(stream_uris(&p), vec!["changes".to_string()]);
    }
}
