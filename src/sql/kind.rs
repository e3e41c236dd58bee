//! Compile-time kinds for typed expressions.
//!
//! Each kind is an uninhabited marker naming a [`ValueType`] and the Rust type
//! a slot of that kind decodes to. Capability traits gate which operators an
//! expression exposes: ordering comparisons need [`Ordered`], arithmetic and
//! `sum`/`avg` need [`Numeric`].

use crate::value::{FromValue, ValueType};

pub trait SqlKind: 'static {
    const TYPE: ValueType;
    type Native: FromValue;
}

/// Kinds supporting `<`, `<=`, `>`, `>=` and `between`.
pub trait Ordered: SqlKind {}

/// Kinds supporting arithmetic and numeric aggregates.
pub trait Numeric: Ordered {}

#[derive(Debug, Clone, Copy)]
pub enum Int {}

#[derive(Debug, Clone, Copy)]
pub enum Float {}

#[derive(Debug, Clone, Copy)]
pub enum Text {}

#[derive(Debug, Clone, Copy)]
pub enum Bool {}

impl SqlKind for Int {
    const TYPE: ValueType = ValueType::Int;
    type Native = i64;
}

impl SqlKind for Float {
    const TYPE: ValueType = ValueType::Float;
    type Native = f64;
}

impl SqlKind for Text {
    const TYPE: ValueType = ValueType::Text;
    type Native = String;
}

impl SqlKind for Bool {
    const TYPE: ValueType = ValueType::Bool;
    type Native = bool;
}

impl Ordered for Int {}
impl Ordered for Float {}
impl Ordered for Text {}

impl Numeric for Int {}
impl Numeric for Float {}
