//! Request dispatch targets.
//!
//! | Method | Path | Endpoint |
//! |--------|------|----------|
//! | GET | `/` | [`Endpoint::ListDatabases`] |
//! | GET | `/{db}` | [`Endpoint::ListCollections`] |
//! | GET | `/{db}/{coll}` | [`Endpoint::GetCollection`] |
//! | PUT / PATCH / DELETE | `/{db}/{coll}` | collection writes |
//! | POST | `/{db}/{coll}` | [`Endpoint::PostCollection`] |
//! | GET | `/{db}/{coll}/_size` | [`Endpoint::GetCollectionSize`] |
//! | GET | `/{db}/{coll}/_indexes` | [`Endpoint::GetIndexes`] |
//! | PUT / DELETE | `/{db}/{coll}/_indexes/{idx}` | index writes |
//! | PATCH / DELETE | `/{db}/{coll}/*` | bulk writes |
//! | GET / PUT / PATCH / DELETE | `/{db}/{coll}/{docid}` | document operations |

use axum::http::Method;
use docgate_persistence::types::is_reserved_name;

use crate::error::{RestError, RestResult};

/// Path segment addressing every document matching the filter.
pub const BULK_SEGMENT: &str = "*";

/// An operation the API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /`
    ListDatabases,
    /// `GET /{db}`
    ListCollections,
    /// `GET /{db}/{coll}`
    GetCollection,
    /// `PUT /{db}/{coll}`
    PutCollection,
    /// `PATCH /{db}/{coll}`
    PatchCollection,
    /// `DELETE /{db}/{coll}`
    DeleteCollection,
    /// `POST /{db}/{coll}`
    PostCollection,
    /// `GET /{db}/{coll}/_size`
    GetCollectionSize,
    /// `GET /{db}/{coll}/_indexes`
    GetIndexes,
    /// `PUT /{db}/{coll}/_indexes/{idx}`
    PutIndex,
    /// `DELETE /{db}/{coll}/_indexes/{idx}`
    DeleteIndex,
    /// `GET /{db}/{coll}/{docid}`
    GetDocument,
    /// `PUT /{db}/{coll}/{docid}`
    PutDocument,
    /// `PATCH /{db}/{coll}/{docid}`
    PatchDocument,
    /// `DELETE /{db}/{coll}/{docid}`
    DeleteDocument,
    /// `PATCH /{db}/{coll}/*`
    BulkPatchDocuments,
    /// `DELETE /{db}/{coll}/*`
    BulkDeleteDocuments,
}

/// The resource names found in a request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    /// Database name.
    pub db: Option<String>,
    /// Collection name.
    pub coll: Option<String>,
    /// Document id segment.
    pub doc: Option<String>,
    /// Index name.
    pub index: Option<String>,
}

impl Endpoint {
    /// Every endpoint.
    pub const ALL: [Endpoint; 17] = [
        Endpoint::ListDatabases,
        Endpoint::ListCollections,
        Endpoint::GetCollection,
        Endpoint::PutCollection,
        Endpoint::PatchCollection,
        Endpoint::DeleteCollection,
        Endpoint::PostCollection,
        Endpoint::GetCollectionSize,
        Endpoint::GetIndexes,
        Endpoint::PutIndex,
        Endpoint::DeleteIndex,
        Endpoint::GetDocument,
        Endpoint::PutDocument,
        Endpoint::PatchDocument,
        Endpoint::DeleteDocument,
        Endpoint::BulkPatchDocuments,
        Endpoint::BulkDeleteDocuments,
    ];

    /// Resolves a method and a decoded path to an endpoint.
    pub fn resolve(method: &Method, path: &str) -> RestResult<(Endpoint, ResourcePath)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let not_allowed = || RestError::MethodNotAllowed {
            method: method.to_string(),
            path: path.to_string(),
        };

        if let Some(db) = segments.first() {
            check_name("database", db)?;
        }
        if let Some(coll) = segments.get(1) {
            check_name("collection", coll)?;
        }

        let mut resource = ResourcePath {
            db: segments.first().map(|s| s.to_string()),
            coll: segments.get(1).map(|s| s.to_string()),
            ..Default::default()
        };

        let endpoint = match segments.as_slice() {
            [] => match *method {
                Method::GET => Endpoint::ListDatabases,
                _ => return Err(not_allowed()),
            },
            [_] => match *method {
                Method::GET => Endpoint::ListCollections,
                _ => return Err(not_allowed()),
            },
            [_, _] => match *method {
                Method::GET => Endpoint::GetCollection,
                Method::PUT => Endpoint::PutCollection,
                Method::PATCH => Endpoint::PatchCollection,
                Method::DELETE => Endpoint::DeleteCollection,
                Method::POST => Endpoint::PostCollection,
                _ => return Err(not_allowed()),
            },
            [_, _, "_size"] => match *method {
                Method::GET => Endpoint::GetCollectionSize,
                _ => return Err(not_allowed()),
            },
            [_, _, "_indexes"] => match *method {
                Method::GET => Endpoint::GetIndexes,
                _ => return Err(not_allowed()),
            },
            [_, _, "_indexes", index] => {
                resource.index = Some(index.to_string());
                match *method {
                    Method::PUT => Endpoint::PutIndex,
                    Method::DELETE => Endpoint::DeleteIndex,
                    _ => return Err(not_allowed()),
                }
            }
            [_, _, kind @ ("_aggrs" | "_streams"), ..] => {
                return Err(RestError::NotImplemented {
                    feature: format!("executing {}", kind),
                });
            }
            [_, _, BULK_SEGMENT] => match *method {
                Method::PATCH => Endpoint::BulkPatchDocuments,
                Method::DELETE => Endpoint::BulkDeleteDocuments,
                _ => return Err(not_allowed()),
            },
            [_, _, doc] => {
                if doc.starts_with('_') {
                    return Err(RestError::bad_request(format!(
                        "document id {} is reserved",
                        doc
                    )));
                }
                resource.doc = Some(doc.to_string());
                match *method {
                    Method::GET => Endpoint::GetDocument,
                    Method::PUT => Endpoint::PutDocument,
                    Method::PATCH => Endpoint::PatchDocument,
                    Method::DELETE => Endpoint::DeleteDocument,
                    _ => return Err(not_allowed()),
                }
            }
            _ => return Err(RestError::not_found(format!("resource {} not found", path))),
        };

        Ok((endpoint, resource))
    }

    /// Returns true for endpoints that read the request body.
    pub fn has_body(&self) -> bool {
        matches!(
            self,
            Endpoint::PutCollection
                | Endpoint::PatchCollection
                | Endpoint::PostCollection
                | Endpoint::PutIndex
                | Endpoint::PutDocument
                | Endpoint::PatchDocument
                | Endpoint::BulkPatchDocuments
        )
    }

    /// Returns true for endpoints addressing an existing collection.
    ///
    /// Collection writes create the collection instead.
    pub fn requires_collection(&self) -> bool {
        !matches!(
            self,
            Endpoint::ListDatabases
                | Endpoint::ListCollections
                | Endpoint::PutCollection
                | Endpoint::PatchCollection
                | Endpoint::DeleteCollection
        )
    }

    /// Returns true for the writes of a collection's metadata record.
    pub fn writes_collection(&self) -> bool {
        matches!(self, Endpoint::PutCollection | Endpoint::PatchCollection)
    }

    /// Returns true for endpoints writing document content.
    pub fn writes_documents(&self) -> bool {
        matches!(
            self,
            Endpoint::PostCollection
                | Endpoint::PutDocument
                | Endpoint::PatchDocument
                | Endpoint::BulkPatchDocuments
        )
    }
}

fn check_name(kind: &str, name: &str) -> RestResult<()> {
    if is_reserved_name(name) || name == BULK_SEGMENT {
        return Err(RestError::bad_request(format!(
            "{} name {} is reserved",
            kind, name
        )));
    }
    Ok(())
}
