//! SQLite-backed store session.
//!
//! Requests are rendered with the SQLite dialect and run through
//! `rusqlite`. Result columns are decoded using the request's slot types,
//! so booleans stored as `0`/`1` come back as [`Value::Bool`].

use std::path::Path;
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, InterruptHandle};
use tracing::debug;

use super::{LoadedAssociations, Row, StoreError, StoreResult, StoreSession};
use crate::config::Settings;
use crate::entity::{Entity, EntityKey};
use crate::sql::ddl::CreateTable;
use crate::sql::dml::{Insert, MutationRequest};
use crate::sql::query::QueryRequest;
use crate::sql::Dialect;
use crate::value::{Value, ValueType};

const DIALECT: Dialect = Dialect::Sqlite;

pub struct SqliteSession {
    conn: Connection,
    loaded: LoadedAssociations,
}

impl SqliteSession {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(classify)?;
        debug!(path = %path.as_ref().display(), "opened sqlite store");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(
            Connection::open_in_memory().map_err(classify)?,
        ))
    }

    /// Open the database named by `[sqlite] path`; no path, or `:memory:`,
    /// opens a private in-memory database.
    pub fn open_from_settings(settings: &Settings) -> StoreResult<Self> {
        let mut session = match settings.sqlite.path.as_deref() {
            None | Some(":memory:") => Self::open_in_memory()?,
            Some(path) => Self::open(path)?,
        };
        if let Some(ms) = settings.sqlite.busy_timeout_ms {
            session = session.with_busy_timeout(Duration::from_millis(ms))?;
        }
        Ok(session)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            loaded: LoadedAssociations::new(),
        }
    }

    /// How long to wait on a locked database before failing.
    pub fn with_busy_timeout(self, timeout: Duration) -> StoreResult<Self> {
        self.conn.busy_timeout(timeout).map_err(classify)?;
        Ok(self)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Handle for cancelling a running statement from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    /// `CREATE TABLE IF NOT EXISTS` for `E`.
    pub fn create_table<E: Entity>(&self) -> StoreResult<()> {
        let sql = CreateTable::for_schema(E::schema())
            .if_not_exists()
            .to_sql(DIALECT);
        debug!(sql = %sql, "sqlite ddl");
        self.conn.execute_batch(&sql).map_err(classify)
    }

    pub fn insert<E: Entity>(&self, entity: &E) -> StoreResult<()> {
        let sql = Insert::into_table(E::schema()).to_sql(DIALECT);
        let values = entity.to_values();
        debug!(sql = %sql, "sqlite insert");
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(classify)?;
        Ok(())
    }
}

impl StoreSession for SqliteSession {
    fn execute(&mut self, request: &QueryRequest) -> StoreResult<Vec<Row>> {
        let sql = request.to_sql(DIALECT);
        debug!(sql = %sql, "sqlite query");

        let types = request.slot_types();
        let mut stmt = self.conn.prepare(&sql).map_err(classify)?;
        let mut cursor = stmt.query([]).map_err(classify)?;

        let mut rows = Vec::new();
        while let Some(row) = cursor.next().map_err(classify)? {
            let mut values = Vec::with_capacity(types.len());
            for (i, ty) in types.iter().enumerate() {
                values.push(decode(row.get_ref(i).map_err(classify)?, *ty)?);
            }
            rows.push(Row::new(values));
        }

        self.loaded.record(&request.layout(), &rows);
        Ok(rows)
    }

    fn execute_count(&mut self, request: &QueryRequest) -> StoreResult<u64> {
        let sql = request.to_count_sql(DIALECT);
        debug!(sql = %sql, "sqlite count");
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(classify)?;
        Ok(count.max(0) as u64)
    }

    fn execute_mutation(&mut self, request: &MutationRequest) -> StoreResult<u64> {
        let sql = request.to_sql(DIALECT);
        debug!(sql = %sql, "sqlite mutation");
        let affected = self.conn.execute(&sql, []).map_err(classify)?;
        Ok(affected as u64)
    }

    fn is_association_loaded(&self, entity: &EntityKey, association: &str) -> bool {
        self.loaded.contains(entity, association)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Int(n) => ToSqlOutput::Borrowed(ValueRef::Integer(*n)),
            Value::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

/// Decode one column using the type the request expects in that slot.
fn decode(value: ValueRef<'_>, expected: Option<ValueType>) -> StoreResult<Value> {
    Ok(match (value, expected) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(n), Some(ValueType::Bool)) => Value::Bool(n != 0),
        (ValueRef::Integer(n), Some(ValueType::Float)) => Value::Float(n as f64),
        (ValueRef::Integer(n), _) => Value::Int(n),
        (ValueRef::Real(f), Some(ValueType::Int)) if f.fract() == 0.0 => Value::Int(f as i64),
        (ValueRef::Real(f), _) => Value::Float(f),
        (ValueRef::Text(bytes), _) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| StoreError::Evaluation(format!("invalid UTF-8 in text column: {}", e)))?
                .to_string(),
        ),
        (ValueRef::Blob(_), _) => {
            return Err(StoreError::Evaluation(
                "blob columns are not supported".into(),
            ))
        }
    })
}

/// Lift constraint and interrupt failures into their own variants.
fn classify(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        match failure.code {
            ErrorCode::ConstraintViolation => {
                return StoreError::Constraint(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                )
            }
            ErrorCode::OperationInterrupted => return StoreError::Cancelled,
            _ => {}
        }
    }
    StoreError::Sqlite(err)
}
