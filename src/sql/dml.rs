//! Data manipulation: bulk UPDATE and DELETE, plus parameterized INSERT.
//!
//! Bulk mutations write straight to the store. Entities already loaded in a
//! session are not refreshed, so a read after a bulk update can return the
//! stale, cached state until the session's identity map is cleared.
//!
//! ```ignore
//! let changed = update(&m)
//!     .set(&m.username, "non-member")
//!     .filter(m.age.lt(28))
//!     .build()?;
//! let raised = update(&m).set(&m.age, m.age.add(1)).build()?;
//! let removed = delete(&m).filter(m.age.gt(18)).build()?;
//! ```

use std::collections::HashSet;
use std::fmt;

use super::dialect::Dialect;
use super::expr::{Expr, Expression, IntoOperand};
use super::kind::SqlKind;
use super::predicate::Predicate;
use super::token::{Token, TokenStream};
use crate::entity::{EntitySchema, EntitySource, SourceRef};
use crate::error::{BuildError, BuildResult};
use crate::planner::validate::validate_expr;
use crate::value::Value;

/// One `SET column = value` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    Update(Vec<Assignment>),
    Delete,
}

/// A validated bulk mutation against one source.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub target: SourceRef,
    pub kind: MutationKind,
    pub filter: Option<Predicate>,
}

impl MutationRequest {
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, MutationKind::Delete)
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match &self.kind {
            MutationKind::Update(assignments) => {
                ts.push(Token::Update).space();
                push_target(&mut ts, &self.target);
                ts.space().push(Token::Set).space();
                for (i, assignment) in assignments.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(assignment.column.clone()))
                        .space()
                        .push(Token::Eq)
                        .space();
                    ts.append(&assignment.value.to_tokens_for_dialect(dialect));
                }
            }
            MutationKind::Delete => {
                ts.push(Token::Delete).space().push(Token::From).space();
                push_target(&mut ts, &self.target);
            }
        }

        if let Some(filter) = &self.filter {
            ts.space().push(Token::Where).space();
            ts.append(&filter.expr().to_tokens_for_dialect(dialect));
        }

        ts
    }
}

impl fmt::Display for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

fn push_target(ts: &mut TokenStream, target: &SourceRef) {
    ts.push(Token::Ident(target.table().into()))
        .space()
        .push(Token::As)
        .space()
        .push(Token::Ident(target.alias.clone()));
}

fn and_filter(current: Option<Predicate>, next: Option<Predicate>) -> Option<Predicate> {
    match current {
        Some(existing) => Some(existing.and(next)),
        None => next,
    }
}

fn validate_filter(filter: &Option<Predicate>, target: &SourceRef) -> BuildResult<()> {
    match filter {
        Some(p) => validate_expr(p.expr(), std::slice::from_ref(target)),
        None => Ok(()),
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Start a bulk update of every `target` row matching the filter.
pub fn update<S: EntitySource>(target: &S) -> Update {
    Update {
        target: target.path().source(),
        assignments: Vec::new(),
        filter: None,
    }
}

#[derive(Debug, Clone)]
#[must_use = "builders have no effect until used"]
pub struct Update {
    target: SourceRef,
    assignments: Vec<(Expr, Expr)>,
    filter: Option<Predicate>,
}

impl Update {
    /// Assign `value` to `column`. The value may refer to the row's current
    /// values, e.g. `m.age.add(1)`.
    pub fn set<K: SqlKind>(mut self, column: &Expression<K>, value: impl IntoOperand<K>) -> Self {
        self.assignments
            .push((column.expr().clone(), value.into_operand()));
        self
    }

    pub fn set_null<K: SqlKind>(mut self, column: &Expression<K>) -> Self {
        self.assignments
            .push((column.expr().clone(), Expr::Literal(Value::Null)));
        self
    }

    /// Add a WHERE condition, ANDed with earlier ones.
    pub fn filter(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
        self.filter = and_filter(self.filter.take(), predicate.into());
        self
    }

    pub fn build(self) -> BuildResult<MutationRequest> {
        if self.assignments.is_empty() {
            return Err(BuildError::InvalidAssignment(
                "update sets no columns".into(),
            ));
        }

        let schema = self.target.schema;
        let mut seen = HashSet::new();
        let mut assignments = Vec::with_capacity(self.assignments.len());

        for (column, value) in self.assignments {
            let name = assignment_column(&column, &self.target, schema)?;
            if !seen.insert(name.clone()) {
                return Err(BuildError::InvalidAssignment(format!(
                    "column `{}` is assigned twice",
                    name
                )));
            }
            if name == schema.key {
                return Err(BuildError::InvalidAssignment(format!(
                    "key column `{}` cannot be updated",
                    name
                )));
            }
            let nullable = schema.column(&name).is_some_and(|c| c.nullable);
            if matches!(value, Expr::Literal(Value::Null)) && !nullable {
                return Err(BuildError::InvalidAssignment(format!(
                    "column `{}` is not nullable",
                    name
                )));
            }
            validate_expr(&value, std::slice::from_ref(&self.target))?;
            assignments.push(Assignment {
                column: name,
                value,
            });
        }
        validate_filter(&self.filter, &self.target)?;

        Ok(MutationRequest {
            target: self.target,
            kind: MutationKind::Update(assignments),
            filter: self.filter,
        })
    }
}

fn assignment_column(
    column: &Expr,
    target: &SourceRef,
    schema: &EntitySchema,
) -> BuildResult<String> {
    let Expr::Column(c) = column else {
        return Err(BuildError::InvalidAssignment(
            "only a column can be assigned".into(),
        ));
    };
    if c.source != target.alias {
        return Err(BuildError::InvalidAssignment(format!(
            "`{}` is not a column of the updated source `{}`",
            c, target.alias
        )));
    }
    let declared = schema
        .column(&c.column)
        .ok_or_else(|| BuildError::UnknownColumn {
            source_alias: target.alias.clone(),
            column: c.column.clone(),
        })?;
    if declared.value_type != c.value_type {
        return Err(BuildError::TypeMismatch {
            left: c.value_type,
            right: declared.value_type,
            context: format!("column {}", c),
        });
    }
    Ok(c.column.clone())
}

// =============================================================================
// DELETE
// =============================================================================

/// Start a bulk delete of every `target` row matching the filter.
pub fn delete<S: EntitySource>(target: &S) -> Delete {
    Delete {
        target: target.path().source(),
        filter: None,
    }
}

#[derive(Debug, Clone)]
#[must_use = "builders have no effect until used"]
pub struct Delete {
    target: SourceRef,
    filter: Option<Predicate>,
}

impl Delete {
    /// Add a WHERE condition, ANDed with earlier ones.
    pub fn filter(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
        self.filter = and_filter(self.filter.take(), predicate.into());
        self
    }

    pub fn build(self) -> BuildResult<MutationRequest> {
        validate_filter(&self.filter, &self.target)?;
        Ok(MutationRequest {
            target: self.target,
            kind: MutationKind::Delete,
            filter: self.filter,
        })
    }
}

// =============================================================================
// INSERT
// =============================================================================

/// Parameterized single-row INSERT covering every column of a schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insert {
    schema: &'static EntitySchema,
}

impl Insert {
    pub fn into_table(schema: &'static EntitySchema) -> Self {
        Self { schema }
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens().serialize(dialect)
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Insert)
            .space()
            .push(Token::Into)
            .space()
            .push(Token::Ident(self.schema.table.into()))
            .space()
            .lparen();
        for (i, column) in self.schema.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(column.name.into()));
        }
        ts.rparen().space().push(Token::Values).space().lparen();
        for i in 0..self.schema.columns.len() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Placeholder(i + 1));
        }
        ts.rparen();
        ts
    }
}
