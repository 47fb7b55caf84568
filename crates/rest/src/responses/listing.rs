//! Database, collection and index listings.

use docgate_persistence::types::{Document, ID_FIELD};
use serde_json::Value;

use super::hal::{Link, Resource};

/// Builds the root resource, embedding one `rh:db` per database name.
pub fn root_resource(dbs: &[String], size: u64, full: bool) -> Resource {
    let mut rep = Resource::new("/");
    for db in dbs {
        let mut child = Resource::new(format!("/{}", db));
        child.add_property(ID_FIELD, Value::String(db.clone()));
        rep.add_child("rh:db", child);
    }
    rep.add_property("_returned", Value::from(dbs.len() as u64));
    rep.add_property("_size", Value::from(size));
    if full {
        rep.add_property("_type", Value::String("ROOT".to_string()));
        rep.add_link("rh:db", Link::templated("/{dbname}"));
        rep.add_link("rh:paging", Link::templated("/{?page}{&pagesize}"));
    }
    rep
}

/// Builds a database resource, embedding one `rh:coll` per collection.
///
/// Each entry of `colls` is the collection name with the collection
/// properties, if any.
pub fn db_resource(db: &str, colls: &[(String, Option<Document>)], size: u64, full: bool) -> Resource {
    let path = format!("/{}", db);
    let mut rep = Resource::new(&path);
    for (name, props) in colls {
        let mut child = Resource::new(format!("{}/{}", path, name));
        child.add_property(ID_FIELD, Value::String(name.clone()));
        if let Some(props) = props {
            child.add_properties(props.clone());
        }
        rep.add_child("rh:coll", child);
    }
    rep.add_property("_returned", Value::from(colls.len() as u64));
    rep.add_property("_size", Value::from(size));
    if full {
        rep.add_property("_type", Value::String("DB".to_string()));
        rep.add_link("rh:root", Link::new("/"));
        rep.add_link("rh:coll", Link::templated(format!("{}/{{collname}}", path)));
        rep.add_link("rh:paging", Link::templated(format!("{}{{?page}}{{&pagesize}}", path)));
    }
    rep
}

/// Builds the index listing of a collection.
pub fn indexes_resource(db: &str, coll: &str, indexes: &[Document], full: bool) -> Resource {
    let path = format!("/{}/{}/_indexes", db, coll);
    let mut rep = Resource::new(&path);
    for index in indexes {
        let name = index
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut child = Resource::new(format!("{}/{}", path, name));
        child.add_properties(index.clone());
        rep.add_child("rh:index", child);
    }
    rep.add_property("_returned", Value::from(indexes.len() as u64));
    rep.add_property("_size", Value::from(indexes.len() as u64));
    if full {
        rep.add_property("_type", Value::String("COLLECTION_INDEXES".to_string()));
        rep.add_link("rh:coll", Link::new(format!("/{}/{}", db, coll)));
    }
    rep
}

/// Builds the `_size` resource of a collection.
pub fn size_resource(db: &str, coll: &str, size: u64) -> Resource {
    let mut rep = Resource::new(format!("/{}/{}/_size", db, coll));
    rep.add_property("_size", Value::from(size));
    rep
}
