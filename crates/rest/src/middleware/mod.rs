//! HTTP middleware for the DocGate REST API.
//!
//! - [`content_type`] - Request content type checks
//! - [`conditional`] - Conditional request headers (If-Match)
//! - [`request_id`] - Request id generation

pub mod conditional;
pub mod content_type;
pub mod request_id;

pub use conditional::ConditionalHeaders;
pub use request_id::{MakeRequestUuid, REQUEST_ID_HEADER};
