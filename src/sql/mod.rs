//! SQL-shaped request model and rendering.
//!
//! - [`expr`] - typed expressions and the untyped tree beneath them
//! - [`kind`] - semantic kinds carried by [`Expression`]
//! - [`predicate`] - predicates and null-tolerant composition
//! - [`case`] - simple and searched case expressions
//! - [`query`] - select requests and their builder
//! - [`dml`] - bulk update/delete, insert
//! - [`ddl`] - CREATE TABLE from entity schemas
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod case;
pub mod ddl;
pub mod dialect;
pub mod dml;
pub mod expr;
pub mod kind;
pub mod predicate;
pub mod query;
pub mod token;


pub use case::CaseBuilder;
pub use dialect::{Dialect, SqlDialect};
pub use dml::{delete, update, Assignment, MutationKind, MutationRequest};
pub use expr::{
    constant, count_all, AggregateFunction, BinaryOperator, ColumnRef, Expr, Expression,
    IntoOperand, Operand, ScalarFunction, UnaryOperator,
};
pub use predicate::{all_of, any_of, Predicate, PredicateBuilder};
pub use query::{
    select, select_from, LimitOffset, NullsOrder, OrderByExpr, Query, QueryRequest, Select,
    SortDir, SubQuery,
};
pub use token::{Token, TokenStream};
