//! Declarative collection metadata.
//!
//! A collection's metadata record may declare four blocks:
//!
//! | Property | Directive | Effect |
//! |----------|-----------|--------|
//! | `checkers` | [`CheckerDirective`] | validate write content |
//! | `transformers` | [`TransformerDirective`] | mutate request or response content |
//! | `relationships` | [`Relationship`] | add links to embedded documents |
//! | `aggregations` | [`AggregationDirective`] | advertise aggregation links |
//!
//! The [`MetadataRegistry`] resolves directive names to checker and
//! transformer instances and validates whole metadata records before they
//! are stored.

use thiserror::Error;

pub mod checkers;
pub mod directives;
pub mod registry;
pub mod schema;
pub mod transformers;

pub use checkers::{CheckContext, CheckOutcome, Checker, WriteKind};
pub use directives::{
    AggregationDirective, AggregationKind, CheckerDirective, Phase, Relationship,
    RelationshipRole, RelationshipType, Scope, TransformerDirective,
};
pub use registry::{ActiveChecker, ActiveTransformer, MetadataRegistry};
pub use transformers::{TransformContext, Transformer};

/// Errors in collection metadata.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// A checker directive or its args are malformed.
    #[error("wrong checker definition. {0}")]
    Checker(String),

    /// A transformer directive or its args are malformed.
    #[error("wrong representation transformer definition. {0}")]
    Transformer(String),

    /// A relationship is malformed.
    #[error("wrong relationships definition. {0}")]
    Relationship(String),

    /// An aggregation is malformed.
    #[error("wrong aggregations definition. {0}")]
    Aggregation(String),

    /// A mandatory checker is not registered.
    #[error("unknown checker {0}")]
    UnknownChecker(String),

    /// A mandatory transformer is not registered.
    #[error("unknown transformer {0}")]
    UnknownTransformer(String),
}

/// Result type alias for metadata parsing.
pub type MetadataResult<T> = Result<T, MetadataError>;
