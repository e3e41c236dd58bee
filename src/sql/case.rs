//! Case expressions.
//!
//! Two forms, both evaluated top to bottom with the first matching branch
//! winning:
//!
//! - simple: `m.age.when(10).then("ten").when(20).then("twenty").otherwise("other")`
//! - searched: `CaseBuilder::when(m.age.between(0, 20)).then("0-20").otherwise("other")`
//!
//! The result kind is fixed by the first `then`; later branches must agree.

use std::marker::PhantomData;

use super::expr::{Expr, Expression, IntoOperand, Operand};
use super::kind::SqlKind;
use super::predicate::Predicate;

fn finish(operand: Option<Expr>, branches: Vec<(Expr, Expr)>, otherwise: Option<Expr>) -> Expr {
    Expr::Case {
        operand: operand.map(Box::new),
        when_clauses: branches,
        else_clause: otherwise.map(Box::new),
    }
}

// =============================================================================
// Simple case
// =============================================================================

impl<K: SqlKind> Expression<K> {
    /// Start a simple case expression comparing this expression to `value`.
    pub fn when(&self, value: impl IntoOperand<K>) -> SimpleCaseStart<K> {
        SimpleCaseStart {
            operand: self.expr().clone(),
            pending: value.into_operand(),
            _kind: PhantomData,
        }
    }
}

#[must_use = "case expressions need `then`"]
pub struct SimpleCaseStart<K> {
    operand: Expr,
    pending: Expr,
    _kind: PhantomData<fn() -> K>,
}

impl<K: SqlKind> SimpleCaseStart<K> {
    pub fn then<V: Operand>(self, result: V) -> SimpleCase<K, V::Kind> {
        SimpleCase {
            operand: self.operand,
            branches: vec![(self.pending, result.into_expr())],
            _kinds: PhantomData,
        }
    }
}

#[must_use = "case expressions need `otherwise` or `end`"]
pub struct SimpleCase<K, R> {
    operand: Expr,
    branches: Vec<(Expr, Expr)>,
    _kinds: PhantomData<fn() -> (K, R)>,
}

impl<K: SqlKind, R: SqlKind> SimpleCase<K, R> {
    pub fn when(self, value: impl IntoOperand<K>) -> SimpleCaseWhen<K, R> {
        SimpleCaseWhen {
            case: self,
            pending: value.into_operand(),
        }
    }

    pub fn otherwise(self, result: impl IntoOperand<R>) -> Expression<R> {
        Expression::new(finish(
            Some(self.operand),
            self.branches,
            Some(result.into_operand()),
        ))
    }

    /// Close the expression; unmatched rows yield `NULL`.
    pub fn end(self) -> Expression<R> {
        Expression::new(finish(Some(self.operand), self.branches, None))
    }
}

#[must_use = "case expressions need `then`"]
pub struct SimpleCaseWhen<K, R> {
    case: SimpleCase<K, R>,
    pending: Expr,
}

impl<K: SqlKind, R: SqlKind> SimpleCaseWhen<K, R> {
    pub fn then(mut self, result: impl IntoOperand<R>) -> SimpleCase<K, R> {
        self.case
            .branches
            .push((self.pending, result.into_operand()));
        self.case
    }
}

// =============================================================================
// Searched case
// =============================================================================

/// Entry point for searched case expressions.
pub struct CaseBuilder;

impl CaseBuilder {
    pub fn when(condition: Predicate) -> CaseStart {
        CaseStart {
            pending: condition.into_expr(),
        }
    }
}

#[must_use = "case expressions need `then`"]
pub struct CaseStart {
    pending: Expr,
}

impl CaseStart {
    pub fn then<V: Operand>(self, result: V) -> Case<V::Kind> {
        Case {
            branches: vec![(self.pending, result.into_expr())],
            _kind: PhantomData,
        }
    }
}

#[must_use = "case expressions need `otherwise` or `end`"]
pub struct Case<R> {
    branches: Vec<(Expr, Expr)>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: SqlKind> Case<R> {
    pub fn when(self, condition: Predicate) -> CaseWhen<R> {
        CaseWhen {
            case: self,
            pending: condition.into_expr(),
        }
    }

    pub fn otherwise(self, result: impl IntoOperand<R>) -> Expression<R> {
        Expression::new(finish(None, self.branches, Some(result.into_operand())))
    }

    pub fn end(self) -> Expression<R> {
        Expression::new(finish(None, self.branches, None))
    }
}

#[must_use = "case expressions need `then`"]
pub struct CaseWhen<R> {
    case: Case<R>,
    pending: Expr,
}

impl<R: SqlKind> CaseWhen<R> {
    pub fn then(mut self, result: impl IntoOperand<R>) -> Case<R> {
        self.case
            .branches
            .push((self.pending, result.into_operand()));
        self.case
    }
}
