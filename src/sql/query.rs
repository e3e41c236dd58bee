//! Query requests and the fluent builder that assembles them.
//!
//! ```ignore
//! let m = QMember::new("m");
//! let query = select((m.username.clone(), m.age.clone()))
//!     .from(&m)
//!     .filter(m.age.goe(18))
//!     .order_by(m.age.desc())
//!     .limit(10)
//!     .build()?;
//! ```
//!
//! Builder steps only accumulate. Every check (aliases, joins, columns,
//! paging, grouping) runs in [`Select::build`], which either returns an
//! immutable [`Query`] or the first [`BuildError`] found.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, Expression};
use super::kind::SqlKind;
use super::predicate::{all_of, Predicate};
use super::token::{Token, TokenStream};
use crate::entity::{EntitySource, SourceRef};
use crate::error::{BuildError, BuildResult};
use crate::planner::validate::{validate_request, OuterRefs};
use crate::planner::{JoinBuilder, JoinClause, JoinKind, JoinSpec};
use crate::projection::{FetchedAssociation, Projection, ProjectionSpec, RowLayout, SelectItem};
use crate::value::ValueType;

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY key. Without an explicit null placement the store decides
/// where nulls sort.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// Dialects without NULLS FIRST/LAST get a leading `expr IS NULL` key.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        let expr = self.expr.to_tokens_for_dialect(dialect);

        if let Some(nulls) = self.nulls {
            if !dialect.supports_nulls_ordering() {
                ts.append(&expr).space().push(Token::IsNull).space();
                ts.push(match nulls {
                    NullsOrder::First => Token::Desc,
                    NullsOrder::Last => Token::Asc,
                });
                ts.comma().space();
            }
        }

        ts.append(&expr).space().push(match self.dir {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        });

        if let Some(nulls) = self.nulls {
            if dialect.supports_nulls_ordering() {
                ts.space().push(match nulls {
                    NullsOrder::First => Token::NullsFirst,
                    NullsOrder::Last => Token::NullsLast,
                });
            }
        }

        ts
    }
}

// =============================================================================
// LIMIT / OFFSET
// =============================================================================

/// Pagination window. Both bounds are optional; an offset alone skips rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitOffset {
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }

    /// Delegates to `SqlDialect::emit_limit_offset()` for the actual formatting.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(self.limit, self.offset)
    }
}

// =============================================================================
// Query Request
// =============================================================================

/// A fully assembled, validated select request.
///
/// Immutable once built; stores and strategies only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub projection: ProjectionSpec,
    pub distinct: bool,
    pub sources: Vec<SourceRef>,
    pub joins: Vec<JoinClause>,
    pub filter: Option<Predicate>,
    pub group_by: Vec<Expr>,
    pub having: Option<Predicate>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: LimitOffset,
}

impl QueryRequest {
    /// Every source visible in the request: `from` sources, then join targets.
    pub fn scope(&self) -> Vec<SourceRef> {
        self.sources
            .iter()
            .cloned()
            .chain(self.joins.iter().map(|j| j.target.clone()))
            .collect()
    }

    pub fn layout(&self) -> RowLayout {
        RowLayout::new(self.projection.items.clone())
    }

    pub fn slot_types(&self) -> Vec<Option<ValueType>> {
        self.layout().slot_types()
    }

    /// Whether rows are collapsed into groups.
    ///
    /// True with a `group by`, a `having`, or any aggregate in the select
    /// list. An aggregate request without `group by` has exactly one group,
    /// even over zero rows.
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_some()
            || self.projection.items.iter().any(|item| match item {
                SelectItem::Expr(e) => e.contains_aggregate(),
                SelectItem::Entity(_) => false,
            })
    }

    /// The same request without ordering or paging, for counting.
    pub fn unpaged(&self) -> QueryRequest {
        QueryRequest {
            order_by: Vec::new(),
            limit_offset: LimitOffset::default(),
            ..self.clone()
        }
    }

    /// The same request with its limit capped at `limit`.
    pub fn capped(&self, limit: u64) -> QueryRequest {
        let mut request = self.clone();
        request.limit_offset.limit = Some(match request.limit_offset.limit {
            Some(existing) => existing.min(limit),
            None => limit,
        });
        request
    }

    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        // Columns, one slot per line
        for (i, slot) in self.layout().slot_exprs().iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&slot.to_tokens_for_dialect(dialect));
        }

        // FROM
        for (i, source) in self.sources.iter().enumerate() {
            if i == 0 {
                ts.newline().push(Token::From).space();
            } else {
                ts.comma().space();
            }
            ts.push(Token::Ident(source.table().into()))
                .space()
                .push(Token::As)
                .space()
                .push(Token::Ident(source.alias.clone()));
        }

        // JOINs
        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        // WHERE
        if let Some(filter) = &self.filter {
            ts.newline().push(Token::Where).space();
            ts.append(&filter.expr().to_tokens_for_dialect(dialect));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        // HAVING
        if let Some(having) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&having.expr().to_tokens_for_dialect(dialect));
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect));
            }
        }

        // LIMIT / OFFSET
        if !self.limit_offset.is_empty() {
            ts.newline();
            ts.append(&self.limit_offset.to_tokens(dialect));
        }

        ts
    }

    /// Generate SQL string for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    /// `SELECT COUNT(*)` over the unpaged request.
    pub fn to_count_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::FunctionName("COUNT".into()))
            .lparen()
            .push(Token::Star)
            .rparen()
            .space()
            .push(Token::From)
            .space()
            .lparen()
            .newline()
            .append(&self.unpaged().to_tokens_for_dialect(dialect))
            .newline()
            .rparen()
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident("counted".into()));
        ts.serialize(dialect)
    }
}

impl fmt::Display for QueryRequest {
    /// Formats the request using the default dialect (Postgres).
    ///
    /// For dialect-specific SQL, use [`QueryRequest::to_sql`] instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Subqueries
// =============================================================================

/// A single-column request usable as a scalar value or an `IN` list.
pub struct SubQuery<K> {
    request: Box<QueryRequest>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for SubQuery<K> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> fmt::Debug for SubQuery<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubQuery").field(&self.request).finish()
    }
}

impl<K: SqlKind> SubQuery<K> {
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn into_request(self) -> Box<QueryRequest> {
        self.request
    }

    /// Use the subquery as a scalar expression.
    ///
    /// Evaluating it fails if it yields more than one row; zero rows give `NULL`.
    pub fn as_expression(&self) -> Expression<K> {
        Expression::new(Expr::Subquery(self.request.clone()))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Start a request selecting `projection`.
///
/// A single expression yields its bare value, an entity path yields the
/// entity, a tuple of either yields [`Tuple`](crate::projection::Tuple)
/// rows, and the DTO projections yield the DTO type.
pub fn select<P: Projection>(projection: P) -> Select<P> {
    Select::new(projection)
}

/// Select a whole entity from its own source: `select(m).from(m)`.
pub fn select_from<S>(source: &S) -> Select<S>
where
    S: EntitySource + Projection + Clone,
{
    select(source.clone()).from(source)
}

/// A request under construction.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until used"]
pub struct Select<P> {
    projection: P,
    distinct: bool,
    sources: Vec<SourceRef>,
    joins: Vec<JoinSpec>,
    filter: Option<Predicate>,
    group_by: Vec<Expr>,
    having: Option<Predicate>,
    order_by: Vec<OrderByExpr>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<P: Projection> Select<P> {
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            distinct: false,
            sources: Vec::new(),
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Remove duplicate result rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a root source. Several sources form a cross product.
    pub fn from<S: EntitySource>(mut self, source: &S) -> Self {
        self.sources.push(source.path().source());
        self
    }

    pub fn join(mut self, spec: JoinSpec) -> Self {
        self.joins.push(spec);
        self
    }

    /// Add a WHERE condition, ANDed with earlier ones. An absent predicate
    /// is ignored.
    pub fn filter(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
        self.filter = match (self.filter.take(), predicate.into()) {
            (Some(existing), next) => Some(existing.and(next)),
            (None, next) => next,
        };
        self
    }

    /// AND every present predicate into the WHERE clause.
    pub fn filter_all<I, Q>(self, predicates: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<Option<Predicate>>,
    {
        self.filter(all_of(predicates))
    }

    pub fn group_by<K: SqlKind>(mut self, expr: &Expression<K>) -> Self {
        self.group_by.push(expr.expr().clone());
        self
    }

    /// Add a HAVING condition, ANDed with earlier ones.
    pub fn having(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
        self.having = match (self.having.take(), predicate.into()) {
            (Some(existing), next) => Some(existing.and(next)),
            (None, next) => next,
        };
        self
    }

    /// Append a sort key. Earlier keys take precedence.
    pub fn order_by(mut self, order: OrderByExpr) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validate and freeze the request.
    pub fn build(self) -> BuildResult<Query<P>> {
        let request = self.assemble(OuterRefs::Checked)?;
        Ok(Query {
            layout: Arc::new(request.layout()),
            projection: self.projection,
            request,
        })
    }

    fn assemble(&self, refs: OuterRefs) -> BuildResult<QueryRequest> {
        if self.sources.is_empty() {
            return Err(BuildError::MissingSource);
        }
        let limit_offset = LimitOffset {
            limit: paging("limit", self.limit)?,
            offset: paging("offset", self.offset)?,
        };

        let mut scope: Vec<SourceRef> = Vec::new();
        for source in &self.sources {
            if scope.iter().any(|s| s.alias == source.alias) {
                return Err(BuildError::AliasCollision {
                    alias: source.alias.clone(),
                });
            }
            scope.push(source.clone());
        }

        let mut joins = Vec::with_capacity(self.joins.len());
        for spec in &self.joins {
            let clause = JoinBuilder::new(&scope).resolve(spec.clone())?;
            scope.push(clause.target.clone());
            joins.push(clause);
        }

        let mut projection = self.projection.spec();
        attach_fetched(&mut projection, &joins)?;

        let request = QueryRequest {
            projection,
            distinct: self.distinct,
            sources: self.sources.clone(),
            joins,
            filter: self.filter.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit_offset,
        };
        validate_request(&request, &[], refs)?;
        Ok(request)
    }
}

impl<K: SqlKind> Select<Expression<K>> {
    /// Build as a subquery.
    ///
    /// References to aliases of an enclosing request are checked when that
    /// request is built; the subquery's own aliases must not repeat them.
    pub fn into_subquery(self) -> BuildResult<SubQuery<K>> {
        let request = self.assemble(OuterRefs::Deferred)?;
        Ok(SubQuery {
            request: Box::new(request),
            _kind: PhantomData,
        })
    }
}

fn paging(clause: &'static str, value: Option<i64>) -> BuildResult<Option<u64>> {
    match value {
        Some(v) if v < 0 => Err(BuildError::NegativePaging { clause, value: v }),
        Some(v) => Ok(Some(v as u64)),
        None => Ok(None),
    }
}

fn attach_fetched(projection: &mut ProjectionSpec, joins: &[JoinClause]) -> BuildResult<()> {
    for join in joins.iter().filter(|j| j.fetch) {
        let JoinKind::Relational { owner, association } = &join.kind else {
            continue;
        };
        let selection = projection
            .items
            .iter_mut()
            .find_map(|item| match item {
                SelectItem::Entity(sel) if &sel.source.alias == owner => Some(sel),
                _ => None,
            })
            .ok_or_else(|| {
                BuildError::MalformedJoin(format!(
                    "fetch join `{}.{}` needs `{}` in the select list",
                    owner, association.name, owner
                ))
            })?;
        selection.fetched.push(FetchedAssociation {
            name: association.name,
            target: join.target.clone(),
        });
    }
    Ok(())
}

// =============================================================================
// Built query
// =============================================================================

/// A validated request paired with the projection that shapes its rows.
///
/// Not `Clone`: each execution consumes its query. Keep the [`Select`]
/// and build again to run the same request twice.
///
/// ```compile_fail
/// use quarry::prelude::*;
///
/// fn twice<S: StoreSession, P: Projection>(factory: &mut QueryFactory<S>, query: Query<P>) {
///     let _ = factory.fetch_list(query);
///     let _ = factory.fetch_count(query);
/// }
/// ```
#[derive(Debug)]
#[must_use = "a query does nothing until passed to a QueryFactory operation"]
pub struct Query<P> {
    projection: P,
    request: QueryRequest,
    layout: Arc<RowLayout>,
}

impl<P: Projection> Query<P> {
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.request.to_sql(dialect)
    }
}
