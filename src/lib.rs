//! # Quarry
//!
//! Typed query construction and execution over entity schemas.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Entity paths + typed expressions/predicates       │
//! │   (QMember.age.goe(18), CaseBuilder, subqueries, ...)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [select(..).from(..).join(..).build()]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Join planner + validation (all BuildErrors here)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ Query<P> = QueryRequest + Projection
//! ┌─────────────────────────────────────────────────────────┐
//! │   QueryFactory: fetch_list / one / first / counted ...   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [StoreSession]
//! ┌─────────────────────────────────────────────────────────┐
//! │      MemoryStore (evaluates)  |  SqliteSession (SQL)     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Building is pure: every structural or type mistake surfaces as a
//! [`BuildError`](error::BuildError) from `build()`. Only the
//! [`QueryFactory`](execution::QueryFactory) touches a store.

pub mod config;
pub mod entity;
pub mod error;
pub mod execution;
pub mod planner;
pub mod projection;
pub mod sql;
pub mod store;
pub mod value;

// Re-export SQL submodules at crate level
pub use sql::dialect;
pub use sql::dml;
pub use sql::expr;
pub use sql::query;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::entity::{
        AssociationDef, Cardinality, ColumnDef, Entity, EntityKey, EntityPath, EntityRow,
        EntitySchema, EntitySource, Lazy,
    };
    pub use crate::entity_path;
    pub use crate::error::{BuildError, BuildResult};
    pub use crate::execution::{ExecResult, ExecutionError, Page, QueryFactory};
    pub use crate::planner::JoinSpec;
    pub use crate::projection::{
        constructor, fields, generated, Binding, ConstructorTarget, FieldTarget, Projection,
        ProjectionError, QueryProjection, Tuple,
    };
    pub use crate::sql::kind::{Bool, Float, Int, Text};
    pub use crate::sql::{
        all_of, any_of, constant, count_all, delete, select, select_from, update, CaseBuilder,
        Dialect, Expression, Predicate, PredicateBuilder, Query,
    };
    pub use crate::store::{MemoryStore, SqliteSession, StoreSession};
    pub use crate::value::{FromValue, Value, ValueType};
}

// Also export at crate root for convenience
pub use error::{BuildError, BuildResult};
pub use execution::{ExecutionError, Page, QueryFactory};
pub use sql::{select, select_from, Dialect, Expression, Predicate, Query};
pub use value::Value;
