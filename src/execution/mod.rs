//! Execution strategies.
//!
//! [`QueryFactory`] is the only part of the crate that performs I/O. It
//! owns a [`StoreSession`] and runs built queries against it, shaping each
//! raw row through the query's projection:
//!
//! | operation | result |
//! |-----------|--------|
//! | [`fetch_list`](QueryFactory::fetch_list) | every row, honouring paging |
//! | [`fetch_one`](QueryFactory::fetch_one) | `None`, the single row, or [`ExecutionError::TooManyResults`] |
//! | [`fetch_first`](QueryFactory::fetch_first) | the first row with the limit capped at 1 |
//! | [`fetch_counted`](QueryFactory::fetch_counted) | a [`Page`]: the paged rows plus the unpaged total |
//! | [`fetch_count`](QueryFactory::fetch_count) | the unpaged total alone |
//! | [`execute_update`](QueryFactory::execute_update) / [`execute_delete`](QueryFactory::execute_delete) | affected row count |
//!
//! Each operation consumes the [`Query`] it runs; running the same request
//! again means building it again.
//!
//! Bulk mutations go straight to the store. Entities already read through
//! the session are not refreshed; callers that keep entity copies across a
//! bulk mutation must re-read them (for the memory store, after `clear()`).

mod scope;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{QuerySettings, Settings};
use crate::entity::EntityKey;
use crate::error::BuildError;
use crate::projection::{Projection, ProjectionError, RowView};
use crate::sql::dml::{MutationKind, MutationRequest};
use crate::sql::query::Query;
use crate::store::{Row, StoreError, StoreSession};

pub use scope::SessionScope;

/// Errors raised while executing a query.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid request: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("expected at most one result, found {found}")]
    TooManyResults { found: usize },

    #[error("failed to shape result row: {0}")]
    Projection(#[from] ProjectionError),
}

impl ExecutionError {
    /// True when the store reported a timeout or cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ExecutionError::Store(StoreError::Timeout(_) | StoreError::Cancelled)
        )
    }
}

pub type ExecResult<T> = Result<T, ExecutionError>;

/// One page of results and the total count ignoring paging.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether rows exist past this page.
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

// =============================================================================
// Query factory
// =============================================================================

/// Runs built queries and bulk mutations against one store session.
pub struct QueryFactory<S: StoreSession> {
    session: S,
    settings: QuerySettings,
}

impl<S: StoreSession> QueryFactory<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            settings: QuerySettings::default(),
        }
    }

    pub fn with_settings(session: S, settings: &Settings) -> Self {
        Self {
            session,
            settings: settings.query.clone(),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Whether a fetch join materialized `association` on `entity`.
    pub fn is_association_loaded(&self, entity: &EntityKey, association: &str) -> bool {
        self.session.is_association_loaded(entity, association)
    }

    pub fn fetch_list<P: Projection>(&mut self, query: Query<P>) -> ExecResult<Vec<P::Output>> {
        self.log_sql("fetch_list", &query);
        let rows = {
            let mut session = SessionScope::acquire(&mut self.session)?;
            session.execute(query.request())?
        };
        debug!(operation = "fetch_list", rows = rows.len(), "executed query");
        shape(&query, &rows)
    }

    /// The single matching row, or `None`. More than one match is an error,
    /// never resolved by picking a row.
    pub fn fetch_one<P: Projection>(&mut self, query: Query<P>) -> ExecResult<Option<P::Output>> {
        self.log_sql("fetch_one", &query);
        let rows = {
            let mut session = SessionScope::acquire(&mut self.session)?;
            session.execute(query.request())?
        };
        debug!(operation = "fetch_one", rows = rows.len(), "executed query");
        if rows.len() > 1 {
            return Err(ExecutionError::TooManyResults { found: rows.len() });
        }
        Ok(shape(&query, &rows)?.pop())
    }

    /// The first row in the query's order; extra rows are never fetched.
    pub fn fetch_first<P: Projection>(&mut self, query: Query<P>) -> ExecResult<Option<P::Output>> {
        self.log_sql("fetch_first", &query);
        let request = query.request().capped(1);
        let rows = {
            let mut session = SessionScope::acquire(&mut self.session)?;
            session.execute(&request)?
        };
        debug!(operation = "fetch_first", rows = rows.len(), "executed query");
        Ok(shape(&query, &rows)?.into_iter().next())
    }

    /// The paged rows together with the number of rows the query matches
    /// without paging. Both reads use one session scope.
    pub fn fetch_counted<P: Projection>(&mut self, query: Query<P>) -> ExecResult<Page<P::Output>> {
        self.log_sql("fetch_counted", &query);
        let (rows, total) = {
            let mut session = SessionScope::acquire(&mut self.session)?;
            let rows = session.execute(query.request())?;
            let total = session.execute_count(&query.request().unpaged())?;
            (rows, total)
        };
        debug!(
            operation = "fetch_counted",
            rows = rows.len(),
            total,
            "executed query"
        );
        let limit_offset = &query.request().limit_offset;
        Ok(Page {
            items: shape(&query, &rows)?,
            total,
            offset: limit_offset.offset.unwrap_or(0),
            limit: limit_offset.limit,
        })
    }

    /// Number of rows the query matches, ignoring offset and limit.
    pub fn fetch_count<P: Projection>(&mut self, query: Query<P>) -> ExecResult<u64> {
        self.log_sql("fetch_count", &query);
        let total = {
            let mut session = SessionScope::acquire(&mut self.session)?;
            session.execute_count(query.request())?
        };
        debug!(operation = "fetch_count", total, "executed query");
        Ok(total)
    }

    pub fn execute_update(&mut self, request: &MutationRequest) -> ExecResult<u64> {
        if request.is_delete() {
            return Err(BuildError::InvalidAssignment(
                "execute_update needs an update request, got a delete".into(),
            )
            .into());
        }
        self.mutate("execute_update", request)
    }

    pub fn execute_delete(&mut self, request: &MutationRequest) -> ExecResult<u64> {
        if let MutationKind::Update(_) = request.kind {
            return Err(BuildError::InvalidAssignment(
                "execute_delete needs a delete request, got an update".into(),
            )
            .into());
        }
        self.mutate("execute_delete", request)
    }

    fn mutate(&mut self, operation: &'static str, request: &MutationRequest) -> ExecResult<u64> {
        if self.settings.log_sql {
            debug!(operation, sql = %request.to_sql(self.settings.dialect), "rendered mutation");
        }
        let affected = {
            let mut session = SessionScope::acquire(&mut self.session)?;
            session.execute_mutation(request)?
        };
        debug!(operation, affected, "executed mutation");
        warn!(
            table = request.target.table(),
            affected,
            "bulk mutation applied directly to the store; entities already read are not refreshed"
        );
        Ok(affected)
    }

    fn log_sql<P: Projection>(&self, operation: &'static str, query: &Query<P>) {
        if self.settings.log_sql {
            debug!(operation, sql = %query.to_sql(self.settings.dialect), "rendered query");
        }
    }
}

fn shape<P: Projection>(query: &Query<P>, rows: &[Row]) -> ExecResult<Vec<P::Output>> {
    let projection = query.projection();
    rows.iter()
        .map(|row| {
            let view = RowView::new(query.layout(), row.values())?;
            Ok(projection.shape(&view)?)
        })
        .collect()
}
