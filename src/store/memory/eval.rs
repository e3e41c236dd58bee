//! Request evaluation over in-memory tables.
//!
//! A request is evaluated in the order SQL defines: the cross product of
//! its `from` sources, each join in declaration order, `where`, grouping
//! and `having`, the select list, ordering, `distinct`, then paging.
//! Predicates use three-valued logic; a row is kept only when its
//! predicate is `TRUE`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::trace;

use super::{NullPlacement, Table};
use crate::entity::SourceRef;
use crate::planner::JoinType;
use crate::sql::dml::{Assignment, MutationKind, MutationRequest};
use crate::sql::expr::{
    AggregateFunction, BinaryOperator, ColumnRef, Expr, ScalarFunction, UnaryOperator,
};
use crate::sql::query::{NullsOrder, OrderByExpr, QueryRequest, SortDir};
use crate::store::{StoreError, StoreResult};
use crate::value::{Value, ValueType};

/// One combined row: a slot per visible source, `None` where an outer join
/// found no match.
type Joined<'s> = Vec<Option<&'s [Value]>>;

/// Rows a request has in scope while an expression is evaluated.
///
/// A grouped context holds every row of one group; column references read
/// the group's first row and aggregates fold over all of them.
#[derive(Clone, Copy)]
struct Ctx<'a, 's> {
    scope: &'a [SourceRef],
    rows: &'a [Joined<'s>],
    grouped: bool,
    outer: Option<&'a Ctx<'a, 's>>,
}

/// Rows touched by a bulk mutation.
pub(super) enum Planned {
    Delete(HashSet<usize>),
    Update(Vec<(usize, Vec<Value>)>),
}

pub(super) struct Evaluator<'s> {
    tables: &'s HashMap<&'static str, Table>,
    null_placement: NullPlacement,
}

impl<'s> Evaluator<'s> {
    pub(super) fn new(tables: &'s HashMap<&'static str, Table>, null_placement: NullPlacement) -> Self {
        Self {
            tables,
            null_placement,
        }
    }

    /// Evaluate a request into raw rows.
    pub(super) fn run(&self, request: &QueryRequest) -> StoreResult<Vec<Vec<Value>>> {
        self.select(request, None)
    }

    pub(super) fn count(&self, request: &QueryRequest) -> StoreResult<u64> {
        Ok(self.select(&request.unpaged(), None)?.len() as u64)
    }

    /// Decide which rows a mutation affects and, for updates, their new values.
    ///
    /// Every assignment reads the row as it was before the statement.
    pub(super) fn plan(&self, request: &MutationRequest) -> StoreResult<Planned> {
        let table = self.table(&request.target)?;
        let scope = std::slice::from_ref(&request.target);

        let mut matched = Vec::new();
        for (index, values) in table.rows.iter().enumerate() {
            let row: Joined<'s> = vec![Some(values.as_slice())];
            let ctx = Ctx {
                scope,
                rows: std::slice::from_ref(&row),
                grouped: false,
                outer: None,
            };
            let keep = match &request.filter {
                Some(filter) => self.eval(filter.expr(), &ctx)?.truth() == Some(true),
                None => true,
            };
            if keep {
                matched.push((index, self.assign(&request.kind, &request.target, values, &ctx)?));
            }
        }
        trace!(
            table = request.target.table(),
            matched = matched.len(),
            "planned bulk mutation"
        );

        Ok(match request.kind {
            MutationKind::Delete => Planned::Delete(matched.into_iter().map(|(i, _)| i).collect()),
            MutationKind::Update(_) => Planned::Update(matched),
        })
    }

    fn assign(
        &self,
        kind: &MutationKind,
        target: &SourceRef,
        current: &[Value],
        ctx: &Ctx<'_, 's>,
    ) -> StoreResult<Vec<Value>> {
        let MutationKind::Update(assignments) = kind else {
            return Ok(Vec::new());
        };
        let mut values = current.to_vec();
        for Assignment { column, value } in assignments {
            let index = target.schema.column_index(column).ok_or_else(|| {
                StoreError::Evaluation(format!("unknown column `{}.{}`", target.alias, column))
            })?;
            values[index] = self.eval(value, ctx)?;
        }
        Ok(values)
    }

    fn table(&self, source: &SourceRef) -> StoreResult<&'s Table> {
        self.tables
            .get(source.table())
            .ok_or_else(|| StoreError::UnknownTable(source.table().to_string()))
    }

    // =========================================================================
    // Select pipeline
    // =========================================================================

    fn select(
        &self,
        request: &QueryRequest,
        outer: Option<&Ctx<'_, 's>>,
    ) -> StoreResult<Vec<Vec<Value>>> {
        let scope = request.scope();
        let rows = self.join_rows(request, &scope, outer)?;
        let rows = self.filter_rows(request, &scope, rows, outer)?;

        let slots = request.layout().slot_exprs();
        let mut output = Vec::new();
        if request.is_aggregate() {
            for group in self.group_rows(request, &scope, rows, outer)? {
                let ctx = Ctx {
                    scope: &scope,
                    rows: &group,
                    grouped: true,
                    outer,
                };
                if let Some(having) = &request.having {
                    if self.eval(having.expr(), &ctx)?.truth() != Some(true) {
                        continue;
                    }
                }
                output.push(self.project(&ctx, &slots, &request.order_by)?);
            }
        } else {
            for row in &rows {
                let ctx = Ctx {
                    scope: &scope,
                    rows: std::slice::from_ref(row),
                    grouped: false,
                    outer,
                };
                output.push(self.project(&ctx, &slots, &request.order_by)?);
            }
        }

        if !request.order_by.is_empty() {
            output.sort_by(|a, b| self.compare_keys(&a.0, &b.0, &request.order_by));
        }

        if request.distinct {
            let mut seen: Vec<Vec<Value>> = Vec::new();
            output.retain(|(_, values)| {
                if seen.contains(values) {
                    false
                } else {
                    seen.push(values.clone());
                    true
                }
            });
        }

        let offset = request
            .limit_offset
            .offset
            .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let limit = request
            .limit_offset
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        Ok(output
            .into_iter()
            .map(|(_, values)| values)
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn join_rows(
        &self,
        request: &QueryRequest,
        scope: &[SourceRef],
        outer: Option<&Ctx<'_, 's>>,
    ) -> StoreResult<Vec<Joined<'s>>> {
        let mut rows: Vec<Joined<'s>> = vec![Vec::new()];
        for source in &request.sources {
            let table = self.table(source)?;
            let mut next = Vec::with_capacity(rows.len() * table.rows.len());
            for row in &rows {
                for values in &table.rows {
                    let mut combined = row.clone();
                    combined.push(Some(values.as_slice()));
                    next.push(combined);
                }
            }
            rows = next;
        }

        for (i, join) in request.joins.iter().enumerate() {
            let table = self.table(&join.target)?;
            let visible = &scope[..request.sources.len() + i + 1];
            let condition = join.condition();

            let mut next = Vec::new();
            for row in rows {
                let mut matched = false;
                for values in &table.rows {
                    let mut candidate = row.clone();
                    candidate.push(Some(values.as_slice()));
                    let keep = match &condition {
                        Some(condition) => {
                            let ctx = Ctx {
                                scope: visible,
                                rows: std::slice::from_ref(&candidate),
                                grouped: false,
                                outer,
                            };
                            self.eval(condition, &ctx)?.truth() == Some(true)
                        }
                        None => true,
                    };
                    if keep {
                        matched = true;
                        next.push(candidate);
                    }
                }
                if !matched && join.join_type == JoinType::Left {
                    let mut extended = row;
                    extended.push(None);
                    next.push(extended);
                }
            }
            trace!(
                alias = %join.target.alias,
                join_type = ?join.join_type,
                rows = next.len(),
                "joined"
            );
            rows = next;
        }
        Ok(rows)
    }

    fn filter_rows(
        &self,
        request: &QueryRequest,
        scope: &[SourceRef],
        rows: Vec<Joined<'s>>,
        outer: Option<&Ctx<'_, 's>>,
    ) -> StoreResult<Vec<Joined<'s>>> {
        let Some(filter) = &request.filter else {
            return Ok(rows);
        };
        let before = rows.len();
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let keep = {
                let ctx = Ctx {
                    scope,
                    rows: std::slice::from_ref(&row),
                    grouped: false,
                    outer,
                };
                self.eval(filter.expr(), &ctx)?.truth() == Some(true)
            };
            if keep {
                kept.push(row);
            }
        }
        trace!(before, after = kept.len(), "filtered");
        Ok(kept)
    }

    /// Groups in order of first appearance. Without `group by` the whole
    /// input is one group, even when empty.
    fn group_rows(
        &self,
        request: &QueryRequest,
        scope: &[SourceRef],
        rows: Vec<Joined<'s>>,
        outer: Option<&Ctx<'_, 's>>,
    ) -> StoreResult<Vec<Vec<Joined<'s>>>> {
        if request.group_by.is_empty() {
            return Ok(vec![rows]);
        }

        let mut keys: Vec<Vec<Value>> = Vec::new();
        let mut groups: Vec<Vec<Joined<'s>>> = Vec::new();
        for row in rows {
            let key = {
                let ctx = Ctx {
                    scope,
                    rows: std::slice::from_ref(&row),
                    grouped: false,
                    outer,
                };
                request
                    .group_by
                    .iter()
                    .map(|e| self.eval(e, &ctx))
                    .collect::<StoreResult<Vec<_>>>()?
            };
            match keys.iter().position(|k| *k == key) {
                Some(i) => groups[i].push(row),
                None => {
                    keys.push(key);
                    groups.push(vec![row]);
                }
            }
        }
        Ok(groups)
    }

    /// Sort keys and slot values of one output row.
    fn project(
        &self,
        ctx: &Ctx<'_, 's>,
        slots: &[Expr],
        order_by: &[OrderByExpr],
    ) -> StoreResult<(Vec<Value>, Vec<Value>)> {
        let keys = order_by
            .iter()
            .map(|o| self.eval(&o.expr, ctx))
            .collect::<StoreResult<Vec<_>>>()?;
        let values = slots
            .iter()
            .map(|e| self.eval(e, ctx))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((keys, values))
    }

    fn compare_keys(&self, a: &[Value], b: &[Value], order_by: &[OrderByExpr]) -> Ordering {
        for ((x, y), order) in a.iter().zip(b).zip(order_by) {
            let ord = self.compare_key(x, y, order);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// An explicit null placement holds whatever the direction; otherwise
    /// nulls sort as the configured extreme.
    fn compare_key(&self, x: &Value, y: &Value, order: &OrderByExpr) -> Ordering {
        let nulls_first = match order.nulls {
            Some(NullsOrder::First) => true,
            Some(NullsOrder::Last) => false,
            None => matches!(
                (self.null_placement, order.dir),
                (NullPlacement::Smallest, SortDir::Asc) | (NullPlacement::Largest, SortDir::Desc)
            ),
        };
        match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = x.sql_cmp(y).unwrap_or(Ordering::Equal);
                match order.dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                }
            }
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn eval(&self, expr: &Expr, ctx: &Ctx<'_, 's>) -> StoreResult<Value> {
        match expr {
            Expr::Column(column) => self.column(column, ctx),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::BinaryOp { left, op, right } => self.binary(left, *op, right, ctx),
            Expr::UnaryOp { op, expr } => {
                let value = self.eval(expr, ctx)?;
                match op {
                    UnaryOperator::Not => Ok(truth_value(value.truth().map(|b| !b))),
                    UnaryOperator::Minus => negate(value),
                }
            }
            Expr::Function { func, args } => self.function(*func, args, ctx),
            Expr::Aggregate {
                func,
                arg,
                distinct,
            } => self.aggregate(*func, arg.as_deref(), *distinct, ctx),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                let operand = operand
                    .as_ref()
                    .map(|e| self.eval(e, ctx))
                    .transpose()?;
                for (when, then) in when_clauses {
                    let candidate = self.eval(when, ctx)?;
                    let hit = match &operand {
                        Some(operand) => operand.sql_eq(&candidate) == Some(true),
                        None => candidate.truth() == Some(true),
                    };
                    if hit {
                        return self.eval(then, ctx);
                    }
                }
                match else_clause {
                    Some(otherwise) => self.eval(otherwise, ctx),
                    None => Ok(Value::Null),
                }
            }
            Expr::In {
                expr,
                values,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let list = values
                    .iter()
                    .map(|e| self.eval(e, ctx))
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(negate_if(in_list(&value, &list), *negated))
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let list: Vec<Value> = self
                    .select(subquery, Some(ctx))?
                    .into_iter()
                    .filter_map(|row| row.into_iter().next())
                    .collect();
                Ok(negate_if(in_list(&value, &list), *negated))
            }
            Expr::Subquery(request) => {
                let mut rows = self.select(request, Some(ctx))?;
                match rows.len() {
                    0 => Ok(Value::Null),
                    1 => Ok(rows.swap_remove(0).into_iter().next().unwrap_or(Value::Null)),
                    n => Err(StoreError::Evaluation(format!(
                        "scalar subquery returned {} rows",
                        n
                    ))),
                }
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let low = self.eval(low, ctx)?;
                let high = self.eval(high, ctx)?;
                let above = value.sql_cmp(&low).map(|o| o != Ordering::Less);
                let below = value.sql_cmp(&high).map(|o| o != Ordering::Greater);
                Ok(negate_if(and3(above, below), *negated))
            }
            Expr::IsNull { expr, negated } => {
                Ok(Value::Bool(self.eval(expr, ctx)?.is_null() != *negated))
            }
            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => match (self.eval(expr, ctx)?, self.eval(pattern, ctx)?) {
                (Value::Text(text), Value::Text(pattern)) => {
                    let matched = like_regex(&pattern, *escape)?.is_match(&text);
                    Ok(Value::Bool(matched != *negated))
                }
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                (text, pattern) => Err(StoreError::Evaluation(format!(
                    "LIKE needs text operands, got {} and {}",
                    text, pattern
                ))),
            },
            Expr::Cast { expr, to } => cast(self.eval(expr, ctx)?, *to),
        }
    }

    /// Resolve a column in this request's sources, then in enclosing ones.
    fn column(&self, column: &ColumnRef, ctx: &Ctx<'_, 's>) -> StoreResult<Value> {
        let mut current = Some(ctx);
        while let Some(frame) = current {
            if let Some(pos) = frame.scope.iter().position(|s| s.alias == column.source) {
                let index = frame.scope[pos]
                    .schema
                    .column_index(&column.column)
                    .ok_or_else(|| StoreError::Evaluation(format!("unknown column {}", column)))?;
                let slot = frame.rows.first().and_then(|row| row.get(pos).copied().flatten());
                return Ok(slot
                    .and_then(|values| values.get(index).cloned())
                    .unwrap_or(Value::Null));
            }
            current = frame.outer;
        }
        Err(StoreError::Evaluation(format!(
            "unresolved source `{}`",
            column.source
        )))
    }

    fn binary(
        &self,
        left: &Expr,
        op: BinaryOperator,
        right: &Expr,
        ctx: &Ctx<'_, 's>,
    ) -> StoreResult<Value> {
        match op {
            BinaryOperator::And => {
                let l = self.eval(left, ctx)?.truth();
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(right, ctx)?.truth();
                return Ok(truth_value(and3(l, r)));
            }
            BinaryOperator::Or => {
                let l = self.eval(left, ctx)?.truth();
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(right, ctx)?.truth();
                return Ok(truth_value(or3(l, r)));
            }
            _ => {}
        }

        let l = self.eval(left, ctx)?;
        let r = self.eval(right, ctx)?;
        if op.is_comparison() {
            return Ok(truth_value(l.sql_cmp(&r).map(|ord| compare(op, ord))));
        }
        if op == BinaryOperator::Concat {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            return Ok(Value::Text(format!("{}{}", text_of(&l), text_of(&r))));
        }
        arithmetic(op, l, r)
    }

    fn function(
        &self,
        func: ScalarFunction,
        args: &[Expr],
        ctx: &Ctx<'_, 's>,
    ) -> StoreResult<Value> {
        if func == ScalarFunction::Coalesce {
            for arg in args {
                let value = self.eval(arg, ctx)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            return Ok(Value::Null);
        }

        let value = match args.first() {
            Some(arg) => self.eval(arg, ctx)?,
            None => Value::Null,
        };
        match value {
            Value::Null => Ok(Value::Null),
            Value::Text(s) => Ok(match func {
                ScalarFunction::Upper => Value::Text(s.to_uppercase()),
                ScalarFunction::Lower => Value::Text(s.to_lowercase()),
                ScalarFunction::Length => Value::Int(s.chars().count() as i64),
                ScalarFunction::Coalesce => Value::Text(s),
            }),
            other => Err(StoreError::Evaluation(format!(
                "{} needs a text argument, got {}",
                func.name(),
                other
            ))),
        }
    }

    fn aggregate(
        &self,
        func: AggregateFunction,
        arg: Option<&Expr>,
        distinct: bool,
        ctx: &Ctx<'_, 's>,
    ) -> StoreResult<Value> {
        if !ctx.grouped {
            return Err(StoreError::Evaluation(format!(
                "{} used outside a grouped request",
                func.name()
            )));
        }
        let Some(arg) = arg else {
            return Ok(Value::Int(ctx.rows.len() as i64));
        };

        let mut values = Vec::with_capacity(ctx.rows.len());
        for row in ctx.rows {
            let row_ctx = Ctx {
                scope: ctx.scope,
                rows: std::slice::from_ref(row),
                grouped: false,
                outer: ctx.outer,
            };
            let value = self.eval(arg, &row_ctx)?;
            if value.is_null() || (distinct && values.contains(&value)) {
                continue;
            }
            values.push(value);
        }

        match func {
            AggregateFunction::Count => Ok(Value::Int(values.len() as i64)),
            AggregateFunction::Sum => sum(&values),
            AggregateFunction::Avg => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let total: f64 = values.iter().filter_map(Value::as_f64).sum();
                Ok(Value::Float(total / values.len() as f64))
            }
            AggregateFunction::Min => Ok(extreme(values, Ordering::Less)),
            AggregateFunction::Max => Ok(extreme(values, Ordering::Greater)),
        }
    }
}

// =============================================================================
// Value helpers
// =============================================================================

fn truth_value(truth: Option<bool>) -> Value {
    truth.map_or(Value::Null, Value::Bool)
}

fn negate_if(truth: Option<bool>, negated: bool) -> Value {
    truth_value(if negated { truth.map(|b| !b) } else { truth })
}

fn and3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn compare(op: BinaryOperator, ord: Ordering) -> bool {
    match op {
        BinaryOperator::Eq => ord == Ordering::Equal,
        BinaryOperator::Ne => ord != Ordering::Equal,
        BinaryOperator::Lt => ord == Ordering::Less,
        BinaryOperator::Lte => ord != Ordering::Greater,
        BinaryOperator::Gt => ord == Ordering::Greater,
        BinaryOperator::Gte => ord != Ordering::Less,
        _ => false,
    }
}

/// `value IN (list)`: unknown when no element matches but one is NULL.
fn in_list(value: &Value, list: &[Value]) -> Option<bool> {
    if list.is_empty() {
        return Some(false);
    }
    if value.is_null() {
        return None;
    }
    let mut unknown = false;
    for item in list {
        match value.sql_eq(item) {
            Some(true) => return Some(true),
            Some(false) => {}
            None => unknown = true,
        }
    }
    if unknown {
        None
    } else {
        Some(false)
    }
}

fn negate(value: Value) -> StoreResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| overflow("-")),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(StoreError::Evaluation(format!("cannot negate {}", other))),
    }
}

fn overflow(op: &str) -> StoreError {
    StoreError::Evaluation(format!("integer overflow in `{}`", op))
}

fn arithmetic(op: BinaryOperator, l: Value, r: Value) -> StoreResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let division_by_zero = || StoreError::Evaluation("division by zero".into());

    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOperator::Div | BinaryOperator::Mod) && b == 0 {
            return Err(division_by_zero());
        }
        let result = match op {
            BinaryOperator::Plus => a.checked_add(b),
            BinaryOperator::Minus => a.checked_sub(b),
            BinaryOperator::Mul => a.checked_mul(b),
            BinaryOperator::Div => a.checked_div(b),
            BinaryOperator::Mod => a.checked_rem(b),
            _ => None,
        };
        return result.map(Value::Int).ok_or_else(|| overflow(op.symbol()));
    }

    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(StoreError::Evaluation(format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            l,
            r
        )));
    };
    if matches!(op, BinaryOperator::Div | BinaryOperator::Mod) && b == 0.0 {
        return Err(division_by_zero());
    }
    let result = match op {
        BinaryOperator::Plus => a + b,
        BinaryOperator::Minus => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div => a / b,
        BinaryOperator::Mod => a % b,
        other => {
            return Err(StoreError::Evaluation(format!(
                "`{}` is not arithmetic",
                other.symbol()
            )))
        }
    };
    Ok(Value::Float(result))
}

fn sum(values: &[Value]) -> StoreResult<Value> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        let mut total: i64 = 0;
        for value in values {
            if let Value::Int(n) = value {
                total = total.checked_add(*n).ok_or_else(|| overflow("SUM"))?;
            }
        }
        return Ok(Value::Int(total));
    }
    Ok(Value::Float(values.iter().filter_map(Value::as_f64).sum()))
}

fn extreme(values: Vec<Value>, want: Ordering) -> Value {
    values
        .into_iter()
        .reduce(|best, v| if v.sql_cmp(&best) == Some(want) { v } else { best })
        .unwrap_or(Value::Null)
}

/// Text form of a value, as a cast to text produces it.
fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => ryu::Buffer::new().format(*f).to_string(),
        Value::Text(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
    }
}

fn cast(value: Value, to: ValueType) -> StoreResult<Value> {
    let invalid = |v: &Value| StoreError::Evaluation(format!("cannot cast {} to {}", v, to));
    if value.is_null() {
        return Ok(Value::Null);
    }
    match to {
        ValueType::Text => Ok(Value::Text(text_of(&value))),
        ValueType::Int => match value {
            Value::Int(n) => Ok(Value::Int(n)),
            Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
            Value::Bool(b) => Ok(Value::Int(i64::from(b))),
            Value::Text(ref s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid(&value)),
            other => Err(invalid(&other)),
        },
        ValueType::Float => match value {
            Value::Int(n) => Ok(Value::Float(n as f64)),
            Value::Float(f) => Ok(Value::Float(f)),
            Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
            Value::Text(ref s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid(&value)),
            other => Err(invalid(&other)),
        },
        ValueType::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::Int(n) => Ok(Value::Bool(n != 0)),
            Value::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid(&value)),
            },
            other => Err(invalid(&other)),
        },
    }
}

/// Translate a LIKE pattern to an anchored regex. `%` and `_` are the
/// wildcards; the escape character makes the next character literal.
fn like_regex(pattern: &str, escape: Option<char>) -> StoreResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            let literal = chars.next().ok_or_else(|| {
                StoreError::Evaluation(format!("LIKE pattern `{}` ends with its escape", pattern))
            })?;
            source.push_str(&regex::escape(literal.encode_utf8(&mut [0; 4])));
        } else if c == '%' {
            source.push_str(".*");
        } else if c == '_' {
            source.push('.');
        } else {
            source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| StoreError::Evaluation(e.to_string()))
}
