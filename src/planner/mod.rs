//! Request planning: join resolution and build-time validation.
//!
//! The builder in [`crate::sql::query`] hands every join declaration to
//! [`JoinBuilder`] as it is added, and the assembled request to
//! [`validate`] when it is built. Both report failures as
//! [`BuildError`](crate::error::BuildError), so nothing structural is left
//! for a store to reject.

pub mod join_builder;
pub mod validate;

pub use join_builder::{JoinBuilder, JoinClause, JoinKind, JoinSpec, JoinType};
