//! Build-time errors.
//!
//! Every structural or type mistake in a query is reported here, at the point
//! the offending value is assembled. Nothing in this module is deferred to
//! execution.

use thiserror::Error;

use crate::value::ValueType;

/// Errors raised while constructing expressions, requests, joins, or projections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("alias `{alias}` is already used in this request")]
    AliasCollision { alias: String },

    #[error("type mismatch in {context}: {left} vs {right}")]
    TypeMismatch {
        left: ValueType,
        right: ValueType,
        context: String,
    },

    #[error("projection mismatch: {0}")]
    ProjectionMismatch(String),

    #[error("malformed join: {0}")]
    MalformedJoin(String),

    #[error("{clause} must not be negative, got {value}")]
    NegativePaging { clause: &'static str, value: i64 },

    #[error("unknown source alias `{0}`")]
    UnknownSource(String),

    #[error("source `{source_alias}` has no column `{column}`")]
    UnknownColumn {
        source_alias: String,
        column: String,
    },

    #[error("source `{source_alias}` has no association `{association}`")]
    UnknownAssociation {
        source_alias: String,
        association: String,
    },

    #[error("request has no source; add one with `from`")]
    MissingSource,

    #[error("invalid assignment: {0}")]
    InvalidAssignment(String),

    #[error("float literal {0} has no SQL representation")]
    NonFiniteLiteral(String),
}

pub type BuildResult<T> = Result<T, BuildError>;
