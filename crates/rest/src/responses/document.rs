//! Document representations.

use docgate_persistence::types::{Document, ID_FIELD, add_last_updated_on};
use serde_json::Value;

use super::hal::{Link, Resource};
use crate::metadata::Relationship;
use crate::metadata::directives::document_href;

/// Builds the representation of a document of the collection at
/// `collection_path`.
///
/// `href` overrides the link derived from the document id. In full mode
/// the document gets `_type`, `_lastupdated_on` and a link per
/// relationship; a relationship that cannot be resolved adds a warning.
pub fn document_resource(
    collection_path: &str,
    db: &str,
    doc: &Document,
    href: Option<&str>,
    full: bool,
    relationships: &[Relationship],
) -> Resource {
    let href = match (href, doc.get(ID_FIELD)) {
        (Some(href), _) => href.to_string(),
        (None, Some(id)) => document_href(collection_path, id),
        (None, None) => collection_path.to_string(),
    };
    let mut rep = Resource::new(href);

    let mut props = doc.clone();
    if full {
        props.insert("_type".to_string(), Value::String("DOCUMENT".to_string()));
        add_last_updated_on(&mut props);
    }
    rep.add_properties(props);

    if full {
        rep.add_link("rh:coll", Link::new(collection_path));
        for rel in relationships {
            match rel.link(db, doc) {
                Ok(Some(target)) => rep.add_link(rel.rel.clone(), Link::new(target)),
                Ok(None) => {}
                Err(e) => rep.add_warning(format!("error resolving relationship {}: {}", rel.rel, e)),
            }
        }
    }

    rep
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_persistence::types::Etag;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_compact_document() {
        let d = doc(json!({"_id": "a", "n": 1, "_etag": "x"}));
        let value = document_resource("/db/coll", "db", &d, None, false, &[]).to_value();
        assert_eq!(value["_links"]["self"]["href"], "/db/coll/a");
        assert_eq!(value["n"], 1);
        assert!(value.get("_type").is_none());
        assert!(value.get("_lastupdated_on").is_none());
    }

    #[test]
    fn test_numeric_id_href() {
        let d = doc(json!({"_id": 5}));
        let value = document_resource("/db/coll", "db", &d, None, false, &[]).to_value();
        assert_eq!(value["_links"]["self"]["href"], "/db/coll/5?id_type=NUMBER");
    }

    #[test]
    fn test_full_document() {
        let etag = Etag::generate();
        let d = doc(json!({"_id": "a", "owner": "u1", "_etag": etag.as_str()}));
        let rels = Relationship::parse_all(&doc(json!({"relationships": [
            {"rel": "owner", "type": "MANY_TO_ONE", "role": "OWNING", "target-coll": "users", "ref-field": "owner"},
            {"rel": "broken", "type": "ONE_TO_MANY", "role": "OWNING", "target-coll": "x", "ref-field": "owner"}
        ]})))
        .unwrap();

        let value = document_resource("/db/coll", "db", &d, Some("/db/coll/a"), true, &rels).to_value();
        assert_eq!(value["_type"], "DOCUMENT");
        assert!(value["_lastupdated_on"].is_string());
        assert_eq!(value["_links"]["owner"]["href"], "/db/users/u1");
        assert_eq!(value["_links"]["rh:coll"]["href"], "/db/coll");
        assert!(value["_embedded"]["rh:warnings"][0]["message"]
            .as_str()
            .unwrap()
            .contains("broken"));
    }
}
