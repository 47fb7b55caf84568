//! Collection representations.
//!
//! A collection page carries the collection properties, the page of
//! documents as embedded resources and, in full mode, navigation links and
//! link templates.

use docgate_persistence::types::{Document, ID_FIELD, MetadataRecord, is_reserved_id};
use serde_json::Value;

use super::document::document_resource;
use super::hal::{Link, Resource};
use crate::config::HalMode;
use crate::metadata::directives::stream_uris;
use crate::metadata::{AggregationDirective, CheckerDirective, Relationship};
use crate::metadata::checkers::JsonSchemaChecker;

/// Name of the collection holding JSON schemas.
pub const SCHEMAS_COLLECTION: &str = "_schemas";

/// Suffix of file bucket collections.
pub const FILES_SUFFIX: &str = ".files";

/// What a collection holds, which decides the relation of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Ordinary documents.
    Documents,
    /// A file bucket.
    Bucket,
    /// JSON schemas.
    Schemas,
}

impl CollectionKind {
    /// Classifies a collection by name.
    pub fn of(coll: &str) -> Self {
        if coll == SCHEMAS_COLLECTION {
            CollectionKind::Schemas
        } else if coll.ends_with(FILES_SUFFIX) {
            CollectionKind::Bucket
        } else {
            CollectionKind::Documents
        }
    }

    /// Relation of embedded children.
    pub fn child_rel(&self) -> &'static str {
        match self {
            CollectionKind::Documents => "rh:doc",
            CollectionKind::Bucket => "rh:file",
            CollectionKind::Schemas => "rh:schema",
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            CollectionKind::Documents => "COLLECTION",
            CollectionKind::Bucket => "FILES_BUCKET",
            CollectionKind::Schemas => "SCHEMA_STORE",
        }
    }
}

/// Inputs of a collection page representation.
#[derive(Debug, Clone)]
pub struct CollectionRepresentation<'a> {
    /// Database name.
    pub db: &'a str,
    /// Collection name.
    pub coll: &'a str,
    /// The metadata record, when the collection has one.
    pub props: Option<&'a MetadataRecord>,
    /// Properties to render in place of the record's own, e.g. after
    /// response transformers ran on them.
    pub properties: Option<&'a Document>,
    /// The page of documents.
    pub children: &'a [Document],
    /// Number of matching documents, when counted.
    pub size: Option<u64>,
    /// Page number.
    pub page: u64,
    /// Page size.
    pub pagesize: u64,
    /// Representation mode.
    pub mode: HalMode,
    /// Omit the collection properties.
    pub no_props: bool,
}

impl CollectionRepresentation<'_> {
    /// Path of the collection.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.db, self.coll)
    }

    /// Builds the representation.
    pub fn build(&self) -> Resource {
        let path = self.path();
        let kind = CollectionKind::of(self.coll);
        let full = self.mode == HalMode::Full;
        let props = self.props.map(MetadataRecord::properties);
        let mut rep = Resource::new(&path);

        if !self.no_props {
            match (self.properties, self.props) {
                (Some(rendered), _) => rep.add_properties(rendered.clone()),
                (None, Some(record)) => rep.add_properties(record.to_props()),
                (None, None) => {}
            }
        }
        if full {
            rep.add_property("_type", Value::String(kind.type_name().to_string()));
        }

        let relationships = props
            .and_then(|p| Relationship::parse_all(p).ok())
            .unwrap_or_default();

        let mut returned = 0u64;
        for child in self.children {
            match child.get(ID_FIELD) {
                Some(id) if is_reserved_id(id) => {
                    rep.add_warning(format!(
                        "filtered out reserved resource {}/{}",
                        path,
                        docgate_persistence::types::id_to_path_segment(id)
                    ));
                }
                _ => {
                    returned += 1;
                    rep.add_child(
                        kind.child_rel(),
                        document_resource(&path, self.db, child, None, full, &relationships),
                    );
                }
            }
        }
        rep.add_property("_returned", Value::from(returned));

        match self.size {
            Some(size) => {
                rep.add_property("_size", Value::from(size));
                let total_pages = if self.pagesize == 0 {
                    0
                } else {
                    size.div_ceil(self.pagesize).max(1)
                };
                rep.add_property("_total_pages", Value::from(total_pages));
            }
            None => rep.add_property("_size", Value::from(0)),
        }

        if let Some(props) = props {
            add_declared_links(&mut rep, &path, props);
        }

        if full {
            self.add_paging_links(&mut rep, &path, returned);
            add_navigation_links(&mut rep, &path, self.db, kind);
        }

        rep
    }

    fn add_paging_links(&self, rep: &mut Resource, path: &str, returned: u64) {
        if self.pagesize == 0 {
            return;
        }
        let page_link = |page: u64| Link::new(format!("{}?page={}&pagesize={}", path, page, self.pagesize));

        rep.add_link("first", page_link(1));
        if self.page > 1 {
            rep.add_link("previous", page_link(self.page - 1));
        }
        match self.size {
            Some(size) => {
                let total_pages = size.div_ceil(self.pagesize).max(1);
                if self.page < total_pages {
                    rep.add_link("next", page_link(self.page + 1));
                }
                rep.add_link("last", page_link(total_pages));
            }
            None if returned >= self.pagesize => rep.add_link("next", page_link(self.page + 1)),
            None => {}
        }
    }
}

fn add_declared_links(rep: &mut Resource, path: &str, props: &Document) {
    if let Ok(aggrs) = AggregationDirective::parse_all(props) {
        for aggr in aggrs {
            rep.add_link(
                aggr.uri.clone(),
                Link::new(format!("{}/_aggrs/{}", path, aggr.uri)),
            );
        }
    }
    for uri in stream_uris(props) {
        rep.add_link(uri.clone(), Link::new(format!("{}/_streams/{}", path, uri)));
    }

    let db = path.split('/').nth(1).unwrap_or_default();
    if let Ok(checkers) = CheckerDirective::parse_all(props) {
        for checker in checkers.iter().filter(|c| c.name == JsonSchemaChecker::NAME) {
            let Some(id) = checker.args.get("schemaId") else {
                continue;
            };
            let store_db = checker
                .args
                .get("schemaStoreDb")
                .and_then(Value::as_str)
                .unwrap_or(db);
            rep.add_link(
                "schema",
                Link::new(format!(
                    "/{}/{}/{}",
                    store_db,
                    SCHEMAS_COLLECTION,
                    docgate_persistence::types::id_to_path_segment(id)
                )),
            );
        }
    }
}

fn add_navigation_links(rep: &mut Resource, path: &str, db: &str, kind: CollectionKind) {
    let parent = format!("/{}", db);
    rep.add_link("rh:db", Link::new(&parent));
    match kind {
        CollectionKind::Bucket => {
            rep.add_link("rh:bucket", Link::templated(format!("{}/{{bucketname}}", parent)));
            rep.add_link("rh:file", Link::templated(format!("{}/{{fileid}}{{?id_type}}", path)));
        }
        CollectionKind::Documents | CollectionKind::Schemas => {
            rep.add_link("rh:coll", Link::templated(format!("{}/{{collname}}", parent)));
            rep.add_link(
                "rh:document",
                Link::templated(format!("{}/{{docid}}{{?id_type}}", path)),
            );
        }
    }
    rep.add_link("rh:indexes", Link::new(format!("{}/_indexes", path)));
    rep.add_link("rh:filter", Link::templated(format!("{}{{?filter}}", path)));
    rep.add_link("rh:sort", Link::templated(format!("{}{{?sort_by}}", path)));
    rep.add_link("rh:paging", Link::templated(format!("{}{{?page}}{{&pagesize}}", path)));
}
