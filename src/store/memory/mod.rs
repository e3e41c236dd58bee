//! In-memory reference store.
//!
//! Tables are plain row vectors keyed by table name. Entities read through
//! the store are kept in an identity map: a later read of the same entity
//! returns the copy handed out first, until [`MemoryStore::clear`]. Bulk
//! mutations write the tables directly and leave that map alone, so a
//! read after a bulk update can observe stale entities.
//!
//! ```ignore
//! let mut store = MemoryStore::new();
//! store.persist(&Team { id: 1, name: "teamA".into() })?;
//! store.persist(&Member { id: 1, username: "member1".into(), age: 10, team_id: Some(1) })?;
//!
//! let factory = QueryFactory::new(store);
//! ```

mod eval;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use self::eval::{Evaluator, Planned};
use super::{LoadedAssociations, Row, StoreError, StoreResult, StoreSession};
use crate::entity::{Entity, EntityKey, EntitySchema};
use crate::projection::RowLayout;
use crate::sql::dml::MutationRequest;
use crate::sql::query::QueryRequest;
use crate::value::Value;

/// Where NULL sorts when an order key has no explicit null placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPlacement {
    /// Nulls first ascending, last descending.
    #[default]
    Smallest,
    /// Nulls last ascending, first descending.
    Largest,
}

/// The `[memory]` settings section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub null_placement: NullPlacement,
}

/// A failure to raise on the next store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Connection(String),
    Timeout(Duration),
    Cancelled,
    Constraint(String),
}

impl From<Failure> for StoreError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Connection(msg) => StoreError::Connection(msg),
            Failure::Timeout(after) => StoreError::Timeout(after),
            Failure::Cancelled => StoreError::Cancelled,
            Failure::Constraint(msg) => StoreError::Constraint(msg),
        }
    }
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub queries: u64,
    pub counts: u64,
    pub mutations: u64,
    pub acquired: u64,
    pub released: u64,
}

#[derive(Debug)]
pub(crate) struct Table {
    pub(crate) schema: &'static EntitySchema,
    pub(crate) rows: Vec<Vec<Value>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<&'static str, Table>,
    identity: HashMap<String, Vec<Value>>,
    loaded: LoadedAssociations,
    config: MemoryConfig,
    pending_failure: Option<Failure>,
    stats: StoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Create the table for `E` if it does not exist yet.
    pub fn register<E: Entity>(&mut self) -> &mut Self {
        let schema = E::schema();
        self.tables.entry(schema.table).or_insert_with(|| Table {
            schema,
            rows: Vec::new(),
        });
        self
    }

    /// Store a row for `entity` without managing it.
    pub fn insert<E: Entity>(&mut self, entity: &E) -> StoreResult<()> {
        self.register::<E>();
        let schema = E::schema();
        let values = entity.to_values();
        if values.len() != schema.columns.len() {
            return Err(StoreError::Constraint(format!(
                "`{}` row has {} values, table has {} columns",
                schema.table,
                values.len(),
                schema.columns.len()
            )));
        }
        for (column, value) in schema.columns.iter().zip(&values) {
            if value.is_null() && !column.nullable {
                return Err(StoreError::Constraint(format!(
                    "`{}.{}` is not nullable",
                    schema.table, column.name
                )));
            }
        }

        let key = entity.key();
        let table = self
            .tables
            .get_mut(schema.table)
            .ok_or_else(|| StoreError::UnknownTable(schema.table.to_string()))?;
        if let Some(index) = schema.key_index() {
            if table.rows.iter().any(|row| row.get(index) == Some(&key.id)) {
                return Err(StoreError::Constraint(format!("duplicate key {}", key)));
            }
        }
        table.rows.push(values);
        Ok(())
    }

    /// Store `entity` and manage it, as if it had just been read.
    pub fn persist<E: Entity>(&mut self, entity: &E) -> StoreResult<()> {
        self.insert(entity)?;
        self.identity
            .insert(entity.key().to_string(), entity.to_values());
        Ok(())
    }

    /// Forget every managed entity and every loaded association.
    pub fn clear(&mut self) {
        self.identity.clear();
        self.loaded.clear();
    }

    pub fn is_managed(&self, key: &EntityKey) -> bool {
        self.identity.contains_key(&key.to_string())
    }

    /// Raw rows of `table`, bypassing the identity map.
    pub fn rows(&self, table: &str) -> Option<&[Vec<Value>]> {
        self.tables.get(table).map(|t| t.rows.as_slice())
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Fail the next query, count, or mutation with `failure`.
    pub fn inject_failure(&mut self, failure: Failure) {
        self.pending_failure = Some(failure);
    }

    fn check_failure(&mut self) -> StoreResult<()> {
        match self.pending_failure.take() {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.tables, self.config.null_placement)
    }

    /// Replace entity slots with their managed copies, managing the rest.
    fn overlay(&mut self, layout: &RowLayout, rows: &mut [Vec<Value>]) {
        let ranges = layout.entity_ranges();
        if ranges.is_empty() {
            return;
        }
        for row in rows.iter_mut() {
            for (schema, range) in &ranges {
                let Some(key_index) = schema.key_index() else {
                    continue;
                };
                let Some(slots) = row.get_mut(range.clone()) else {
                    continue;
                };
                let id = &slots[key_index];
                if id.is_null() {
                    continue;
                }
                let key = EntityKey::new(schema.table, id.clone()).to_string();
                match self.identity.get(&key) {
                    Some(managed) if managed.len() == slots.len() => {
                        slots.clone_from_slice(managed);
                    }
                    _ => {
                        self.identity.insert(key, slots.to_vec());
                    }
                }
            }
        }
    }
}

impl StoreSession for MemoryStore {
    fn execute(&mut self, request: &QueryRequest) -> StoreResult<Vec<Row>> {
        self.check_failure()?;
        self.stats.queries += 1;

        let mut values = self.evaluator().run(request)?;
        let layout = request.layout();
        self.overlay(&layout, &mut values);

        let rows: Vec<Row> = values.into_iter().map(Row::new).collect();
        self.loaded.record(&layout, &rows);
        trace!(rows = rows.len(), "memory store query");
        Ok(rows)
    }

    fn execute_count(&mut self, request: &QueryRequest) -> StoreResult<u64> {
        self.check_failure()?;
        self.stats.counts += 1;
        self.evaluator().count(request)
    }

    fn execute_mutation(&mut self, request: &MutationRequest) -> StoreResult<u64> {
        self.check_failure()?;
        self.stats.mutations += 1;

        let planned = self.evaluator().plan(request)?;
        let table = self
            .tables
            .get_mut(request.target.table())
            .ok_or_else(|| StoreError::UnknownTable(request.target.table().to_string()))?;

        let affected = match planned {
            Planned::Delete(doomed) => {
                let mut index = 0;
                table.rows.retain(|_| {
                    let keep = !doomed.contains(&index);
                    index += 1;
                    keep
                });
                doomed.len()
            }
            Planned::Update(updates) => {
                let affected = updates.len();
                for (index, values) in updates {
                    if let Some(row) = table.rows.get_mut(index) {
                        *row = values;
                    }
                }
                affected
            }
        };
        trace!(
            table = table.schema.table,
            affected,
            "memory store mutation"
        );
        Ok(affected as u64)
    }

    fn is_association_loaded(&self, entity: &EntityKey, association: &str) -> bool {
        self.loaded.contains(entity, association)
    }

    fn acquire(&mut self) -> StoreResult<()> {
        self.stats.acquired += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.stats.released += 1;
    }
}
