//! Bulk write outcomes.

use axum::http::StatusCode;
use docgate_persistence::types::BulkWriteResult;
use serde_json::Value;

use super::hal::Resource;
use crate::metadata::directives::document_href;
use crate::translate::translate;

/// Builds the representation of a bulk write on the collection at `path`.
///
/// Counts are properties; each created document is an `rh:newdoc` child
/// and each failed item an `rh:error` child carrying its translated status.
/// Store messages of server errors are shown only with `debug`.
pub fn bulk_resource(path: &str, result: &BulkWriteResult, debug: bool) -> Resource {
    let mut rep = Resource::new(path);
    rep.add_property("inserted", Value::from(result.inserted));
    rep.add_property("deleted", Value::from(result.deleted));
    rep.add_property("modified", Value::from(result.modified));
    rep.add_property("matched", Value::from(result.matched));

    for id in &result.upserted_ids {
        rep.add_child("rh:newdoc", Resource::new(document_href(path, id)));
    }

    for item in &result.errors {
        let (status, message) = translate(item.code);
        let mut error = Resource::anonymous();
        error.add_property("index", Value::from(item.index as u64));
        error.add_property("httpStatus", Value::from(status.as_u16()));
        error.add_property("code", Value::from(item.code.value()));
        let message = if debug && status == StatusCode::INTERNAL_SERVER_ERROR {
            item.message.clone()
        } else {
            message.to_string()
        };
        error.add_property("message", Value::String(message));
        rep.add_child("rh:error", error);
    }

    rep
}
