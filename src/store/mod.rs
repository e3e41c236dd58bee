//! The store collaborator.
//!
//! Queries are built and validated without I/O; a [`StoreSession`] is the
//! only thing that touches data. Two sessions ship with the crate:
//!
//! - [`MemoryStore`]: evaluates requests directly over in-memory tables and
//!   keeps an identity map of entities it has handed out
//! - [`SqliteSession`]: renders requests to SQLite SQL and runs them through
//!   `rusqlite`
//!
//! Both report fetch-join materialization through [`LoadedAssociations`].

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::entity::EntityKey;
use crate::projection::RowLayout;
use crate::sql::dml::MutationRequest;
use crate::sql::query::QueryRequest;
use crate::value::Value;

pub use memory::{Failure, MemoryConfig, MemoryStore, NullPlacement, StoreStats};
pub use sqlite::SqliteSession;

/// Errors raised by a store session.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One raw result row, laid out per the request's [`RowLayout`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// A session against some store.
///
/// Every call is synchronous. Timeouts and cancellation are reported as
/// [`StoreError::Timeout`] and [`StoreError::Cancelled`] and must reach the
/// caller unchanged.
pub trait StoreSession {
    /// Run a select request, returning rows in layout order.
    fn execute(&mut self, request: &QueryRequest) -> StoreResult<Vec<Row>>;

    /// Count the rows `request` matches, ignoring its ordering and paging.
    fn execute_count(&mut self, request: &QueryRequest) -> StoreResult<u64>;

    /// Apply a bulk update or delete, returning the affected row count.
    fn execute_mutation(&mut self, request: &MutationRequest) -> StoreResult<u64>;

    /// Whether `association` of `entity` was materialized by a fetch join.
    fn is_association_loaded(&self, entity: &EntityKey, association: &str) -> bool;

    /// Called before each execution.
    fn acquire(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// Called after each execution, on success and failure alike.
    fn release(&mut self) {}
}

// =============================================================================
// Load tracking
// =============================================================================

/// Which entity associations have been loaded by fetch joins.
#[derive(Debug, Clone, Default)]
pub struct LoadedAssociations {
    loaded: HashSet<(String, String)>,
}

impl LoadedAssociations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every fetched association of the entities in `rows`.
    pub fn record(&mut self, layout: &RowLayout, rows: &[Row]) {
        let entities = layout.fetched_entities();
        if entities.is_empty() {
            return;
        }
        for row in rows {
            for entity in &entities {
                let Some(id) = row.values().get(entity.key_slot) else {
                    continue;
                };
                if id.is_null() {
                    continue;
                }
                let key = EntityKey::new(entity.schema.table, id.clone()).to_string();
                for name in &entity.fetched {
                    self.loaded.insert((key.clone(), (*name).to_string()));
                }
            }
        }
    }

    pub fn contains(&self, entity: &EntityKey, association: &str) -> bool {
        self.loaded
            .contains(&(entity.to_string(), association.to_string()))
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }
}
