//! Build-time validation of assembled requests.
//!
//! Checks that every column reference names a visible source, an existing
//! column, and the column's declared type; that a join condition only sees
//! the sources declared before it; that subqueries do not reuse an
//! enclosing alias; and that aggregate requests only select, filter, and
//! sort by grouped or aggregated values.

use crate::entity::SourceRef;
use crate::error::{BuildError, BuildResult};
use crate::planner::JoinClause;
use crate::projection::SelectItem;
use crate::sql::expr::{ColumnRef, Expr};
use crate::sql::query::QueryRequest;
use crate::sql::Dialect;
use crate::value::Value;

/// How to treat column references to aliases outside the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterRefs {
    /// Leave them for the enclosing request to check (subqueries built on
    /// their own may correlate with a query that does not exist yet).
    Deferred,
    /// Every alias must resolve.
    Checked,
}

/// Validate a request whose enclosing requests expose `outer`.
pub fn validate_request(
    request: &QueryRequest,
    outer: &[SourceRef],
    refs: OuterRefs,
) -> BuildResult<()> {
    let local = request.scope();

    for source in &local {
        if outer.iter().any(|o| o.alias == source.alias) {
            return Err(BuildError::AliasCollision {
                alias: source.alias.clone(),
            });
        }
    }

    let mut visible = outer.to_vec();
    visible.extend(local.iter().cloned());
    let check = |expr: &Expr| check_expr(expr, &visible, refs);

    for item in &request.projection.items {
        match item {
            SelectItem::Expr(e) => check(e)?,
            SelectItem::Entity(selection) => {
                if !local.iter().any(|s| s.alias == selection.source.alias) {
                    return Err(BuildError::UnknownSource(selection.source.alias.clone()));
                }
            }
        }
    }
    for (i, join) in request.joins.iter().enumerate() {
        if let Some(on) = &join.on {
            check_declared_before(on.expr(), &request.joins[i + 1..])?;
            check(on.expr())?;
        }
    }
    if let Some(filter) = &request.filter {
        check(filter.expr())?;
    }
    for e in &request.group_by {
        check(e)?;
    }
    if let Some(having) = &request.having {
        check(having.expr())?;
    }
    for o in &request.order_by {
        check(&o.expr)?;
    }

    check_grouping(request)
}

/// Validate an expression that stands outside any select request, such as
/// a mutation filter or assignment.
pub fn validate_expr(expr: &Expr, scope: &[SourceRef]) -> BuildResult<()> {
    check_expr(expr, scope, OuterRefs::Checked)
}

fn check_expr(expr: &Expr, visible: &[SourceRef], refs: OuterRefs) -> BuildResult<()> {
    let mut result = Ok(());
    expr.walk(&mut |e| {
        if result.is_ok() {
            match e {
                Expr::Column(c) => result = check_column(c, visible, refs),
                Expr::Literal(Value::Float(f)) if !f.is_finite() => {
                    result = Err(BuildError::NonFiniteLiteral(f.to_string()))
                }
                _ => {}
            }
        }
    });
    result?;

    for subquery in expr.subqueries() {
        validate_request(subquery, visible, refs)?;
    }
    Ok(())
}

fn check_column(column: &ColumnRef, visible: &[SourceRef], refs: OuterRefs) -> BuildResult<()> {
    let Some(source) = visible.iter().find(|s| s.alias == column.source) else {
        return match refs {
            OuterRefs::Deferred => Ok(()),
            OuterRefs::Checked => Err(BuildError::UnknownSource(column.source.clone())),
        };
    };

    let declared = source
        .schema
        .column(&column.column)
        .ok_or_else(|| BuildError::UnknownColumn {
            source_alias: source.alias.clone(),
            column: column.column.clone(),
        })?;

    if declared.value_type != column.value_type {
        return Err(BuildError::TypeMismatch {
            left: column.value_type,
            right: declared.value_type,
            context: format!("column {}", column),
        });
    }
    Ok(())
}

/// A join condition must not name a source joined after it.
fn check_declared_before(on: &Expr, later: &[JoinClause]) -> BuildResult<()> {
    let mut result = Ok(());
    on.walk(&mut |e| {
        if let Expr::Column(c) = e {
            if result.is_ok() && later.iter().any(|j| j.target.alias == c.source) {
                result = Err(BuildError::UnknownSource(c.source.clone()));
            }
        }
    });
    result
}

/// The first column in `expr` that is neither grouped nor inside an
/// aggregate.
fn ungrouped<'a>(expr: &'a Expr, group_by: &[Expr]) -> Option<&'a Expr> {
    if group_by.contains(expr) || matches!(expr, Expr::Aggregate { .. }) {
        return None;
    }
    if let Expr::Column(_) = expr {
        return Some(expr);
    }
    expr.children()
        .into_iter()
        .find_map(|child| ungrouped(child, group_by))
}

fn check_grouping(request: &QueryRequest) -> BuildResult<()> {
    if !request.is_aggregate() {
        return Ok(());
    }

    let require_grouped = |expr: &Expr, clause: &str| match ungrouped(expr, &request.group_by) {
        Some(column) => Err(BuildError::ProjectionMismatch(format!(
            "`{}` in {} must appear in group by or inside an aggregate",
            column.to_tokens().serialize(Dialect::default()),
            clause
        ))),
        None => Ok(()),
    };

    for item in &request.projection.items {
        match item {
            SelectItem::Entity(selection) => {
                return Err(BuildError::ProjectionMismatch(format!(
                    "entity `{}` cannot be selected in an aggregate request",
                    selection.source.alias
                )))
            }
            SelectItem::Expr(e) => require_grouped(e, "select")?,
        }
    }
    if let Some(having) = &request.having {
        require_grouped(having.expr(), "having")?;
    }
    for o in &request.order_by {
        require_grouped(&o.expr, "order by")?;
    }
    Ok(())
}
