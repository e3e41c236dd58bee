//! Predicates and null-tolerant composition.
//!
//! A [`Predicate`] is a boolean expression. Composition treats an absent
//! predicate (`None`) as the identity: `p.and(None) == p`, `p.or(None) == p`,
//! and folding zero predicates yields `None`, which a request reads as
//! "no filter". This is what lets search criteria be optional without
//! null checks at every call site:
//!
//! ```ignore
//! fn username_eq(name: Option<&str>) -> Option<Predicate> {
//!     name.map(|n| m.username.eq(n))
//! }
//!
//! let filter = all_of([username_eq(cond.name), age_eq(cond.age)]);
//! ```

use super::expr::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{BuildError, BuildResult};
use crate::value::ValueType;

/// A boolean-valued expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate(Expr);

impl Predicate {
    /// Wrap an expression already known to be boolean.
    pub(crate) fn from_expr(expr: Expr) -> Self {
        Predicate(expr)
    }

    /// Wrap an arbitrary expression, checking that it is boolean.
    pub fn try_from_expr(expr: Expr) -> BuildResult<Self> {
        match expr.value_type() {
            None | Some(ValueType::Bool) => Ok(Predicate(expr)),
            Some(other) => Err(BuildError::TypeMismatch {
                left: other,
                right: ValueType::Bool,
                context: "predicate".into(),
            }),
        }
    }

    /// Build a comparison from untyped operands, checking operand types.
    pub fn compare(left: Expr, op: BinaryOperator, right: Expr) -> BuildResult<Self> {
        if !op.is_comparison() {
            return Self::try_from_expr(Expr::binary(left, op, right)?);
        }
        Ok(Predicate(Expr::binary(left, op, right)?))
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    pub fn into_expr(self) -> Expr {
        self.0
    }

    fn combine(self, op: BinaryOperator, other: Option<Predicate>) -> Predicate {
        match other {
            Some(other) => Predicate(Expr::BinaryOp {
                left: Box::new(self.0),
                op,
                right: Box::new(other.0),
            }),
            None => self,
        }
    }

    /// Conjunction. An absent operand leaves `self` unchanged.
    pub fn and(self, other: impl Into<Option<Predicate>>) -> Predicate {
        self.combine(BinaryOperator::And, other.into())
    }

    /// Disjunction. An absent operand leaves `self` unchanged.
    pub fn or(self, other: impl Into<Option<Predicate>>) -> Predicate {
        self.combine(BinaryOperator::Or, other.into())
    }

    pub fn not(self) -> Predicate {
        Predicate(Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(self.0),
        })
    }
}

fn fold<I, P>(predicates: I, op: BinaryOperator) -> Option<Predicate>
where
    I: IntoIterator<Item = P>,
    P: Into<Option<Predicate>>,
{
    predicates
        .into_iter()
        .filter_map(|p| -> Option<Predicate> { p.into() })
        .fold(None, |acc: Option<Predicate>, p| match acc {
            Some(acc) => Some(acc.combine(op, Some(p))),
            None => Some(p),
        })
}

/// AND of every present predicate; `None` when none are present.
pub fn all_of<I, P>(predicates: I) -> Option<Predicate>
where
    I: IntoIterator<Item = P>,
    P: Into<Option<Predicate>>,
{
    fold(predicates, BinaryOperator::And)
}

/// OR of every present predicate; `None` when none are present.
pub fn any_of<I, P>(predicates: I) -> Option<Predicate>
where
    I: IntoIterator<Item = P>,
    P: Into<Option<Predicate>>,
{
    fold(predicates, BinaryOperator::Or)
}

/// Binary form of [`all_of`].
pub fn and(a: impl Into<Option<Predicate>>, b: impl Into<Option<Predicate>>) -> Option<Predicate> {
    all_of([a.into(), b.into()])
}

/// Binary form of [`any_of`].
pub fn or(a: impl Into<Option<Predicate>>, b: impl Into<Option<Predicate>>) -> Option<Predicate> {
    any_of([a.into(), b.into()])
}

/// Negation; an absent predicate stays absent.
pub fn not(p: impl Into<Option<Predicate>>) -> Option<Predicate> {
    p.into().map(Predicate::not)
}

// =============================================================================
// Accumulator
// =============================================================================

/// Owned accumulator for dynamically assembled filters.
///
/// Each call consumes the builder and returns it, so a partially built filter
/// can be cloned and inspected without aliasing.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct PredicateBuilder {
    current: Option<Predicate>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(self, p: impl Into<Option<Predicate>>) -> Self {
        Self {
            current: and(self.current, p),
        }
    }

    pub fn or(self, p: impl Into<Option<Predicate>>) -> Self {
        Self {
            current: or(self.current, p),
        }
    }

    pub fn and_not(self, p: impl Into<Option<Predicate>>) -> Self {
        self.and(not(p))
    }

    pub fn has_value(&self) -> bool {
        self.current.is_some()
    }

    pub fn value(&self) -> Option<&Predicate> {
        self.current.as_ref()
    }

    pub fn build(self) -> Option<Predicate> {
        self.current
    }
}

impl From<PredicateBuilder> for Option<Predicate> {
    fn from(builder: PredicateBuilder) -> Self {
        builder.current
    }
}
