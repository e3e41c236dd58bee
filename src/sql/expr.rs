//! Expression AST and the typed expression layer.
//!
//! [`Expr`] is the untyped tree stored inside requests and rendered to SQL.
//! [`Expression<K>`] wraps an `Expr` with a compile-time [`SqlKind`], so that
//! `member.age.eq("ten")` fails to compile instead of failing in the store.
//! Code that assembles expressions dynamically uses the checked constructors
//! on `Expr` (`Expr::binary`, `Expr::between`, ...), which report mismatched
//! operand types as [`BuildError::TypeMismatch`].
//!
//! ```ignore
//! let adult = m.age.goe(18).and(m.username.like("member%"));
//! let label = m.age.when(10).then("ten").otherwise("other");
//! ```

use std::fmt;
use std::marker::PhantomData;

use super::dialect::{Dialect, SqlDialect};
use super::kind::{Bool, Float, Int, Numeric, Ordered, SqlKind, Text};
use super::predicate::Predicate;
use super::query::{OrderByExpr, QueryRequest, SubQuery};
use super::token::{Token, TokenStream};
use crate::error::{BuildError, BuildResult};
use crate::projection::Binding;
use crate::value::{Value, ValueType};

// =============================================================================
// Untyped AST
// =============================================================================

/// A typed column reference: `alias.column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub source: String,
    pub column: String,
    pub value_type: ValueType,
}

impl ColumnRef {
    pub fn new(source: impl Into<String>, column: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
            value_type,
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    // String
    Concat,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Lte | Self::Gt | Self::Gte
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Plus | Self::Minus | Self::Mul | Self::Div | Self::Mod
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Concat => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// Scalar functions with a known result type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Upper,
    Lower,
    Length,
    Coalesce,
}

impl ScalarFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Upper => "UPPER",
            Self::Lower => "LOWER",
            Self::Length => "LENGTH",
            Self::Coalesce => "COALESCE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// SQL expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Function {
        func: ScalarFunction,
        args: Vec<Expr>,
    },
    /// `arg = None` is `COUNT(*)`.
    Aggregate {
        func: AggregateFunction,
        arg: Option<Box<Expr>>,
        distinct: bool,
    },
    /// Branches are tried in order; the first match wins.
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<QueryRequest>,
        negated: bool,
    },
    /// Scalar subquery.
    Subquery(Box<QueryRequest>),
    /// Inclusive on both ends.
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<char>,
        negated: bool,
    },
    Cast {
        expr: Box<Expr>,
        to: ValueType,
    },
}

/// Escape character used by the `contains`/`starts_with`/`ends_with` helpers.
pub const LIKE_ESCAPE: char = '!';

impl Expr {
    pub fn column(source: impl Into<String>, column: impl Into<String>, ty: ValueType) -> Self {
        Expr::Column(ColumnRef::new(source, column, ty))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Inferred result type; `None` for an untyped `NULL`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Expr::Column(c) => Some(c.value_type),
            Expr::Literal(v) => v.value_type(),
            Expr::BinaryOp { left, op, right } => {
                if op.is_comparison() || op.is_logical() {
                    Some(ValueType::Bool)
                } else if *op == BinaryOperator::Concat {
                    Some(ValueType::Text)
                } else {
                    match (left.value_type(), right.value_type()) {
                        (Some(ValueType::Int), Some(ValueType::Int)) => Some(ValueType::Int),
                        (Some(l), Some(r)) if l.is_numeric() && r.is_numeric() => {
                            Some(ValueType::Float)
                        }
                        (Some(t), None) | (None, Some(t)) => Some(t),
                        _ => None,
                    }
                }
            }
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => Some(ValueType::Bool),
                UnaryOperator::Minus => expr.value_type(),
            },
            Expr::Function { func, args } => match func {
                ScalarFunction::Upper | ScalarFunction::Lower => Some(ValueType::Text),
                ScalarFunction::Length => Some(ValueType::Int),
                ScalarFunction::Coalesce => args.iter().find_map(Expr::value_type),
            },
            Expr::Aggregate { func, arg, .. } => match func {
                AggregateFunction::Count => Some(ValueType::Int),
                AggregateFunction::Avg => Some(ValueType::Float),
                _ => arg.as_ref().and_then(|a| a.value_type()),
            },
            Expr::Case {
                when_clauses,
                else_clause,
                ..
            } => when_clauses
                .iter()
                .find_map(|(_, then)| then.value_type())
                .or_else(|| else_clause.as_ref().and_then(|e| e.value_type())),
            Expr::In { .. }
            | Expr::InSubquery { .. }
            | Expr::Between { .. }
            | Expr::IsNull { .. }
            | Expr::Like { .. } => Some(ValueType::Bool),
            Expr::Subquery(request) => request.slot_types().first().copied().flatten(),
            Expr::Cast { to, .. } => Some(*to),
        }
    }

    /// Direct operands of this node. Subqueries are opaque.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Subquery(_) => Vec::new(),
            Expr::BinaryOp { left, right, .. } => vec![&**left, &**right],
            Expr::UnaryOp { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::InSubquery { expr, .. } => vec![&**expr],
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::Aggregate { arg, .. } => arg.iter().map(|a| a.as_ref()).collect(),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => operand
                .iter()
                .map(|o| o.as_ref())
                .chain(when_clauses.iter().flat_map(|(when, then)| [when, then]))
                .chain(else_clause.iter().map(|e| e.as_ref()))
                .collect(),
            Expr::In { expr, values, .. } => std::iter::once(expr.as_ref()).chain(values).collect(),
            Expr::Between {
                expr, low, high, ..
            } => vec![&**expr, &**low, &**high],
            Expr::Like { expr, pattern, .. } => vec![&**expr, &**pattern],
        }
    }

    /// Visit this node and every descendant, not descending into subqueries.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    /// Subqueries nested directly in this expression tree.
    pub fn subqueries(&self) -> Vec<&QueryRequest> {
        let mut found = Vec::new();
        self.walk(&mut |e| match e {
            Expr::Subquery(request) => found.push(request.as_ref()),
            Expr::InSubquery { subquery, .. } => found.push(subquery.as_ref()),
            _ => {}
        });
        found
    }

    // =========================================================================
    // Checked constructors
    // =========================================================================

    /// Build a binary operation, rejecting operands of the wrong type.
    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> BuildResult<Expr> {
        let lt = left.value_type();
        let rt = right.value_type();
        let context = || format!("`{}` operands", op.symbol());

        if op.is_comparison() {
            if let (Some(l), Some(r)) = (lt, rt) {
                if !l.is_comparable_with(r) {
                    return Err(BuildError::TypeMismatch {
                        left: l,
                        right: r,
                        context: context(),
                    });
                }
            }
        } else {
            let accepts = |t: ValueType| {
                if op.is_logical() {
                    t == ValueType::Bool
                } else if op.is_arithmetic() {
                    t.is_numeric()
                } else {
                    t == ValueType::Text
                }
            };
            let expected = if op.is_logical() {
                ValueType::Bool
            } else if op.is_arithmetic() {
                ValueType::Int
            } else {
                ValueType::Text
            };
            for (side, other) in [(lt, rt), (rt, lt)] {
                if let Some(t) = side {
                    if !accepts(t) {
                        return Err(BuildError::TypeMismatch {
                            left: t,
                            right: other.unwrap_or(expected),
                            context: context(),
                        });
                    }
                }
            }
        }

        Ok(Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// `expr BETWEEN low AND high`. The bounds are not checked for `low <= high`.
    pub fn between(expr: Expr, low: Expr, high: Expr) -> BuildResult<Expr> {
        for bound in [&low, &high] {
            ensure_comparable(&expr, bound, "BETWEEN")?;
        }
        Ok(Expr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
            negated: false,
        })
    }

    pub fn in_list(expr: Expr, values: Vec<Expr>) -> BuildResult<Expr> {
        for value in &values {
            ensure_comparable(&expr, value, "IN")?;
        }
        Ok(Expr::In {
            expr: Box::new(expr),
            values,
            negated: false,
        })
    }

    pub fn like(expr: Expr, pattern: Expr) -> BuildResult<Expr> {
        for side in [&expr, &pattern] {
            if let Some(t) = side.value_type() {
                if t != ValueType::Text {
                    return Err(BuildError::TypeMismatch {
                        left: t,
                        right: ValueType::Text,
                        context: "LIKE operands".into(),
                    });
                }
            }
        }
        Ok(Expr::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
            escape: None,
            negated: false,
        })
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column(c) => {
                ts.push(Token::Ident(c.source.clone()))
                    .push(Token::Dot)
                    .push(Token::Ident(c.column.clone()));
            }

            Expr::Literal(value) => {
                ts.push(value_token(value));
            }

            Expr::BinaryOp { left, op, right } => {
                if *op == BinaryOperator::Concat && !dialect.supports_concat_operator() {
                    ts.push(Token::FunctionName("CONCAT".into())).lparen();
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.comma().space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                    ts.rparen();
                } else {
                    ts.append(&operand_tokens(left, dialect));
                    ts.space().push(binary_op_to_token(*op)).space();
                    ts.append(&operand_tokens(right, dialect));
                }
            }

            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Not => ts.push(Token::Not).space(),
                    UnaryOperator::Minus => ts.push(Token::Minus),
                };
                ts.append(&operand_tokens(expr, dialect));
            }

            Expr::Function { func, args } => {
                ts.push(Token::FunctionName(func.name().into())).lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Aggregate {
                func,
                arg,
                distinct,
            } => {
                ts.push(Token::FunctionName(func.name().into())).lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                match arg {
                    Some(arg) => ts.append(&arg.to_tokens_for_dialect(dialect)),
                    None => ts.push(Token::Star),
                };
                ts.rparen();
            }

            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                if let Some(op) = operand {
                    ts.space().append(&op.to_tokens_for_dialect(dialect));
                }
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&when.to_tokens_for_dialect(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&then.to_tokens_for_dialect(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens_for_dialect(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::Subquery(request) => {
                ts.lparen();
                ts.append(&request.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // "x IN ()" is invalid SQL; an empty list never matches.
                if values.is_empty() {
                    let always = Value::Bool(*negated);
                    ts.push(value_token(&always));
                } else {
                    ts.append(&operand_tokens(expr, dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens_for_dialect(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                ts.append(&operand_tokens(expr, dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                ts.append(&operand_tokens(expr, dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Between).space();
                ts.append(&operand_tokens(low, dialect));
                ts.space().push(Token::And).space();
                ts.append(&operand_tokens(high, dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&operand_tokens(expr, dialect));
                ts.space()
                    .push(if *negated { Token::IsNotNull } else { Token::IsNull });
            }

            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                ts.append(&operand_tokens(expr, dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Like).space();
                ts.append(&operand_tokens(pattern, dialect));
                if let Some(esc) = escape {
                    ts.space()
                        .push(Token::Escape)
                        .space()
                        .push(Token::LitString(esc.to_string()));
                }
            }

            Expr::Cast { expr, to } => {
                ts.push(Token::Cast).lparen();
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space()
                    .push(Token::As)
                    .space()
                    .push(Token::Raw(dialect.cast_type_name(*to).into()));
                ts.rparen();
            }
        }

        ts
    }
}

fn ensure_comparable(left: &Expr, right: &Expr, context: &str) -> BuildResult<()> {
    match (left.value_type(), right.value_type()) {
        (Some(l), Some(r)) if !l.is_comparable_with(r) => Err(BuildError::TypeMismatch {
            left: l,
            right: r,
            context: format!("{} operands", context),
        }),
        _ => Ok(()),
    }
}

/// Render a nested operand, parenthesizing compound expressions.
fn operand_tokens(expr: &Expr, dialect: Dialect) -> TokenStream {
    let compound = matches!(
        expr,
        Expr::BinaryOp { .. }
            | Expr::UnaryOp {
                op: UnaryOperator::Not,
                ..
            }
            | Expr::Between { .. }
            | Expr::In { .. }
            | Expr::InSubquery { .. }
            | Expr::IsNull { .. }
            | Expr::Like { .. }
    );
    let inner = expr.to_tokens_for_dialect(dialect);
    if !compound {
        return inner;
    }
    let mut ts = TokenStream::new();
    ts.parenthesized(&inner);
    ts
}

pub(crate) fn value_token(value: &Value) -> Token {
    match value {
        Value::Null => Token::LitNull,
        Value::Int(n) => Token::LitInt(*n),
        Value::Float(f) => Token::LitFloat(*f),
        Value::Text(s) => Token::LitString(s.clone()),
        Value::Bool(b) => Token::LitBool(*b),
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Mod => Token::Mod,
        BinaryOperator::Concat => Token::Concat,
    }
}

// =============================================================================
// Operands
// =============================================================================

/// A value usable where an operand of kind `K` is expected.
///
/// Numeric kinds accept each other, so `age.goe(avg_subquery)` compiles.
pub trait IntoOperand<K: SqlKind> {
    fn into_operand(self) -> Expr;
}

/// A value whose kind is fixed by its own type.
///
/// Used where the result kind is inferred from the operand, such as
/// [`constant`] or the first `then` of a case expression.
pub trait Operand {
    type Kind: SqlKind;
    fn into_expr(self) -> Expr;
}

macro_rules! literal_operands {
    ($($ty:ty => $kind:ty),* $(,)?) => {$(
        impl Operand for $ty {
            type Kind = $kind;
            fn into_expr(self) -> Expr {
                Expr::Literal(Value::from(self))
            }
        }

        impl IntoOperand<$kind> for $ty {
            fn into_operand(self) -> Expr {
                Expr::Literal(Value::from(self))
            }
        }
    )*};
}

literal_operands!(
    i64 => Int,
    i32 => Int,
    f64 => Float,
    &str => Text,
    String => Text,
    bool => Bool,
);

impl IntoOperand<Float> for i64 {
    fn into_operand(self) -> Expr {
        Expr::Literal(Value::Int(self))
    }
}

impl IntoOperand<Float> for i32 {
    fn into_operand(self) -> Expr {
        Expr::Literal(Value::Int(self as i64))
    }
}

impl<K: SqlKind> Operand for Expression<K> {
    type Kind = K;
    fn into_expr(self) -> Expr {
        self.expr
    }
}

impl<K: SqlKind> Operand for &Expression<K> {
    type Kind = K;
    fn into_expr(self) -> Expr {
        self.expr.clone()
    }
}

impl<K: SqlKind> IntoOperand<K> for Expression<K> {
    fn into_operand(self) -> Expr {
        self.expr
    }
}

impl<K: SqlKind> IntoOperand<K> for &Expression<K> {
    fn into_operand(self) -> Expr {
        self.expr.clone()
    }
}

macro_rules! numeric_cross_operands {
    ($from:ty => $to:ty) => {
        impl IntoOperand<$to> for Expression<$from> {
            fn into_operand(self) -> Expr {
                self.expr
            }
        }

        impl IntoOperand<$to> for &Expression<$from> {
            fn into_operand(self) -> Expr {
                self.expr.clone()
            }
        }

        impl IntoOperand<$to> for SubQuery<$from> {
            fn into_operand(self) -> Expr {
                Expr::Subquery(self.into_request())
            }
        }
    };
}

numeric_cross_operands!(Int => Float);
numeric_cross_operands!(Float => Int);

impl<K: SqlKind> IntoOperand<K> for SubQuery<K> {
    fn into_operand(self) -> Expr {
        Expr::Subquery(self.into_request())
    }
}

// =============================================================================
// Typed Expressions
// =============================================================================

/// An expression whose result kind is known at compile time.
pub struct Expression<K> {
    expr: Expr,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for Expression<K> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K> fmt::Debug for Expression<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.expr).finish()
    }
}

/// A literal expression. The kind follows the value's Rust type.
pub fn constant<V: Operand>(value: V) -> Expression<V::Kind> {
    Expression::new(value.into_expr())
}

/// `COUNT(*)`.
pub fn count_all() -> Expression<Int> {
    Expression::new(Expr::Aggregate {
        func: AggregateFunction::Count,
        arg: None,
        distinct: false,
    })
}

impl<K: SqlKind> Expression<K> {
    pub(crate) fn new(expr: Expr) -> Self {
        Self {
            expr,
            _kind: PhantomData,
        }
    }

    /// Column `column` of the source aliased `source`.
    pub fn column(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(Expr::column(source, column, K::TYPE))
    }

    /// A typed `NULL`.
    pub fn null() -> Self {
        Self::new(Expr::Literal(Value::Null))
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    pub fn value_type(&self) -> ValueType {
        K::TYPE
    }

    fn compare(&self, op: BinaryOperator, rhs: Expr) -> Predicate {
        Predicate::from_expr(Expr::BinaryOp {
            left: Box::new(self.expr.clone()),
            op,
            right: Box::new(rhs),
        })
    }

    fn unary_aggregate<R: SqlKind>(&self, func: AggregateFunction, distinct: bool) -> Expression<R> {
        Expression::new(Expr::Aggregate {
            func,
            arg: Some(Box::new(self.expr.clone())),
            distinct,
        })
    }

    pub fn eq(&self, rhs: impl IntoOperand<K>) -> Predicate {
        self.compare(BinaryOperator::Eq, rhs.into_operand())
    }

    pub fn ne(&self, rhs: impl IntoOperand<K>) -> Predicate {
        self.compare(BinaryOperator::Ne, rhs.into_operand())
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::from_expr(Expr::IsNull {
            expr: Box::new(self.expr.clone()),
            negated: false,
        })
    }

    pub fn is_not_null(&self) -> Predicate {
        Predicate::from_expr(Expr::IsNull {
            expr: Box::new(self.expr.clone()),
            negated: true,
        })
    }

    pub fn in_list<I, V>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: IntoOperand<K>,
    {
        Predicate::from_expr(Expr::In {
            expr: Box::new(self.expr.clone()),
            values: values.into_iter().map(IntoOperand::into_operand).collect(),
            negated: false,
        })
    }

    pub fn not_in<I, V>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: IntoOperand<K>,
    {
        Predicate::from_expr(Expr::In {
            expr: Box::new(self.expr.clone()),
            values: values.into_iter().map(IntoOperand::into_operand).collect(),
            negated: true,
        })
    }

    pub fn in_subquery(&self, subquery: SubQuery<K>) -> Predicate {
        Predicate::from_expr(Expr::InSubquery {
            expr: Box::new(self.expr.clone()),
            subquery: subquery.into_request(),
            negated: false,
        })
    }

    pub fn not_in_subquery(&self, subquery: SubQuery<K>) -> Predicate {
        Predicate::from_expr(Expr::InSubquery {
            expr: Box::new(self.expr.clone()),
            subquery: subquery.into_request(),
            negated: true,
        })
    }

    pub fn count(&self) -> Expression<Int> {
        self.unary_aggregate(AggregateFunction::Count, false)
    }

    pub fn count_distinct(&self) -> Expression<Int> {
        self.unary_aggregate(AggregateFunction::Count, true)
    }

    pub fn max(&self) -> Expression<K> {
        self.unary_aggregate(AggregateFunction::Max, false)
    }

    pub fn min(&self) -> Expression<K> {
        self.unary_aggregate(AggregateFunction::Min, false)
    }

    pub fn coalesce(&self, fallback: impl IntoOperand<K>) -> Expression<K> {
        Expression::new(Expr::Function {
            func: ScalarFunction::Coalesce,
            args: vec![self.expr.clone(), fallback.into_operand()],
        })
    }

    /// The value converted to text, e.g. for concatenation with a number.
    pub fn string_value(&self) -> Expression<Text> {
        Expression::new(Expr::Cast {
            expr: Box::new(self.expr.clone()),
            to: ValueType::Text,
        })
    }

    pub fn asc(&self) -> OrderByExpr {
        OrderByExpr::asc(self.expr.clone())
    }

    pub fn desc(&self) -> OrderByExpr {
        OrderByExpr::desc(self.expr.clone())
    }

    /// Bind this expression to the DTO field named after its column.
    pub fn bind(&self) -> Binding {
        Binding::new(self.expr.clone())
    }

    /// Bind this expression to the DTO field `name`.
    pub fn alias(&self, name: impl Into<String>) -> Binding {
        Binding::named(name, self.expr.clone())
    }
}

impl<K: Ordered> Expression<K> {
    pub fn lt(&self, rhs: impl IntoOperand<K>) -> Predicate {
        self.compare(BinaryOperator::Lt, rhs.into_operand())
    }

    pub fn loe(&self, rhs: impl IntoOperand<K>) -> Predicate {
        self.compare(BinaryOperator::Lte, rhs.into_operand())
    }

    pub fn gt(&self, rhs: impl IntoOperand<K>) -> Predicate {
        self.compare(BinaryOperator::Gt, rhs.into_operand())
    }

    pub fn goe(&self, rhs: impl IntoOperand<K>) -> Predicate {
        self.compare(BinaryOperator::Gte, rhs.into_operand())
    }

    /// Inclusive range. `low <= high` is not checked.
    pub fn between(&self, low: impl IntoOperand<K>, high: impl IntoOperand<K>) -> Predicate {
        Predicate::from_expr(Expr::Between {
            expr: Box::new(self.expr.clone()),
            low: Box::new(low.into_operand()),
            high: Box::new(high.into_operand()),
            negated: false,
        })
    }

    pub fn not_between(&self, low: impl IntoOperand<K>, high: impl IntoOperand<K>) -> Predicate {
        Predicate::from_expr(Expr::Between {
            expr: Box::new(self.expr.clone()),
            low: Box::new(low.into_operand()),
            high: Box::new(high.into_operand()),
            negated: true,
        })
    }
}

impl<K: Numeric> Expression<K> {
    fn arithmetic(&self, op: BinaryOperator, rhs: Expr) -> Expression<K> {
        Expression::new(Expr::BinaryOp {
            left: Box::new(self.expr.clone()),
            op,
            right: Box::new(rhs),
        })
    }

    pub fn add(&self, rhs: impl IntoOperand<K>) -> Expression<K> {
        self.arithmetic(BinaryOperator::Plus, rhs.into_operand())
    }

    pub fn subtract(&self, rhs: impl IntoOperand<K>) -> Expression<K> {
        self.arithmetic(BinaryOperator::Minus, rhs.into_operand())
    }

    pub fn multiply(&self, rhs: impl IntoOperand<K>) -> Expression<K> {
        self.arithmetic(BinaryOperator::Mul, rhs.into_operand())
    }

    pub fn divide(&self, rhs: impl IntoOperand<K>) -> Expression<K> {
        self.arithmetic(BinaryOperator::Div, rhs.into_operand())
    }

    pub fn modulo(&self, rhs: impl IntoOperand<K>) -> Expression<K> {
        self.arithmetic(BinaryOperator::Mod, rhs.into_operand())
    }

    pub fn negate(&self) -> Expression<K> {
        Expression::new(Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: Box::new(self.expr.clone()),
        })
    }

    pub fn sum(&self) -> Expression<K> {
        self.unary_aggregate(AggregateFunction::Sum, false)
    }

    pub fn avg(&self) -> Expression<Float> {
        self.unary_aggregate(AggregateFunction::Avg, false)
    }
}

impl Expression<Text> {
    fn like_pattern(&self, pattern: Expr, escape: Option<char>, negated: bool) -> Predicate {
        Predicate::from_expr(Expr::Like {
            expr: Box::new(self.expr.clone()),
            pattern: Box::new(pattern),
            escape,
            negated,
        })
    }

    /// SQL `LIKE` with `%` and `_` wildcards.
    pub fn like(&self, pattern: impl IntoOperand<Text>) -> Predicate {
        self.like_pattern(pattern.into_operand(), None, false)
    }

    pub fn not_like(&self, pattern: impl IntoOperand<Text>) -> Predicate {
        self.like_pattern(pattern.into_operand(), None, true)
    }

    pub fn contains(&self, needle: &str) -> Predicate {
        let pattern = format!("%{}%", escape_like(needle));
        self.like_pattern(Expr::literal(pattern), Some(LIKE_ESCAPE), false)
    }

    pub fn starts_with(&self, prefix: &str) -> Predicate {
        let pattern = format!("{}%", escape_like(prefix));
        self.like_pattern(Expr::literal(pattern), Some(LIKE_ESCAPE), false)
    }

    pub fn ends_with(&self, suffix: &str) -> Predicate {
        let pattern = format!("%{}", escape_like(suffix));
        self.like_pattern(Expr::literal(pattern), Some(LIKE_ESCAPE), false)
    }

    pub fn concat(&self, rhs: impl IntoOperand<Text>) -> Expression<Text> {
        Expression::new(Expr::BinaryOp {
            left: Box::new(self.expr.clone()),
            op: BinaryOperator::Concat,
            right: Box::new(rhs.into_operand()),
        })
    }

    pub fn upper(&self) -> Expression<Text> {
        Expression::new(Expr::Function {
            func: ScalarFunction::Upper,
            args: vec![self.expr.clone()],
        })
    }

    pub fn lower(&self) -> Expression<Text> {
        Expression::new(Expr::Function {
            func: ScalarFunction::Lower,
            args: vec![self.expr.clone()],
        })
    }

    pub fn length(&self) -> Expression<Int> {
        Expression::new(Expr::Function {
            func: ScalarFunction::Length,
            args: vec![self.expr.clone()],
        })
    }
}

impl Expression<Bool> {
    pub fn is_true(&self) -> Predicate {
        self.compare(BinaryOperator::Eq, Expr::Literal(Value::Bool(true)))
    }

    pub fn into_predicate(self) -> Predicate {
        Predicate::from_expr(self.expr)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}
