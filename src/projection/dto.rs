//! DTO projection strategies.
//!
//! Three ways to build a plain data type from selected expressions. All of
//! them read the same slots and produce the same values; they differ in how
//! the target is constructed and when a mismatch is caught.
//!
//! - [`fields`]: start from `Default` and assign each binding to the field of
//!   the same name. Names and types are checked when the projection is built.
//! - [`constructor`]: pass values positionally to a declared parameter list.
//!   Arity and types are checked when the projection is built.
//! - [`generated`]: a [`QueryProjection`] impl over the exact expression
//!   tuple, checked by the compiler.

use std::any::type_name;
use std::marker::PhantomData;

use super::{
    DtoStrategy, Projection, ProjectionError, ProjectionShape, ProjectionSpec, RowView,
    SelectItem,
};
use crate::entity::ColumnDef;
use crate::error::{BuildError, BuildResult};
use crate::sql::expr::{Expr, Expression};
use crate::sql::kind::SqlKind;
use crate::value::{FromValue, Value, ValueType};

// =============================================================================
// Bindings
// =============================================================================

/// An expression feeding one DTO field or parameter.
///
/// Column expressions bind to the field named after the column unless
/// renamed with [`Expression::alias`].
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    name: Option<String>,
    expr: Expr,
}

impl Binding {
    pub fn new(expr: Expr) -> Self {
        let name = match &expr {
            Expr::Column(c) => Some(c.column.clone()),
            _ => None,
        };
        Self { name, expr }
    }

    pub fn named(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: Some(name.into()),
            expr,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

fn check_type(
    target: &str,
    binding: &Binding,
    expected: ValueType,
    nullable: bool,
) -> BuildResult<()> {
    match binding.expr.value_type() {
        Some(found) if found != expected => Err(BuildError::ProjectionMismatch(format!(
            "{} expects {} for `{}`, expression yields {}",
            target,
            expected,
            binding.name().unwrap_or("?"),
            found
        ))),
        None if !nullable => Err(BuildError::ProjectionMismatch(format!(
            "{} cannot take NULL for `{}`",
            target,
            binding.name().unwrap_or("?")
        ))),
        _ => Ok(()),
    }
}

fn dto_spec<D>(strategy: DtoStrategy, exprs: impl IntoIterator<Item = Expr>) -> ProjectionSpec {
    ProjectionSpec {
        shape: ProjectionShape::Dto {
            target: type_name::<D>(),
            strategy,
        },
        items: exprs.into_iter().map(SelectItem::Expr).collect(),
    }
}

// =============================================================================
// Field strategy
// =============================================================================

/// A default-constructible target whose fields are assigned by name.
pub trait FieldTarget: Default {
    /// Assignable fields with their declared types.
    fn fields() -> &'static [ColumnDef];

    fn assign(&mut self, field: &str, value: Value) -> Result<(), ProjectionError>;
}

pub struct FieldProjection<D> {
    bindings: Vec<Binding>,
    _target: PhantomData<fn() -> D>,
}

impl<D> Clone for FieldProjection<D> {
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
            _target: PhantomData,
        }
    }
}

/// Project into `D` by field name.
///
/// Covers setter-style ("bean") binding as well: [`FieldTarget::assign`]
/// is the single entry point whether the target stores the value directly
/// or runs setter logic. Each field may be bound once.
pub fn fields<D: FieldTarget>(
    bindings: impl IntoIterator<Item = Binding>,
) -> BuildResult<FieldProjection<D>> {
    let bindings: Vec<Binding> = bindings.into_iter().collect();
    let target = type_name::<D>();

    for (i, binding) in bindings.iter().enumerate() {
        let name = binding.name().ok_or_else(|| {
            BuildError::ProjectionMismatch(format!(
                "{}: computed expression needs an alias to bind to a field",
                target
            ))
        })?;
        if bindings[..i].iter().any(|earlier| earlier.name() == Some(name)) {
            return Err(BuildError::ProjectionMismatch(format!(
                "{} field `{}` is bound twice",
                target, name
            )));
        }
        let field = D::fields()
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                BuildError::ProjectionMismatch(format!("{} has no field `{}`", target, name))
            })?;
        check_type(target, binding, field.value_type, field.nullable)?;
    }

    Ok(FieldProjection {
        bindings,
        _target: PhantomData,
    })
}

impl<D: FieldTarget> Projection for FieldProjection<D> {
    type Output = D;

    fn spec(&self) -> ProjectionSpec {
        dto_spec::<D>(
            DtoStrategy::Field,
            self.bindings.iter().map(|b| b.expr.clone()),
        )
    }

    fn shape(&self, row: &RowView<'_>) -> Result<D, ProjectionError> {
        let mut target = D::default();
        for (i, binding) in self.bindings.iter().enumerate() {
            let name = binding.name().unwrap_or_default();
            target.assign(name, row.value(i)?.clone())?;
        }
        Ok(target)
    }
}

// =============================================================================
// Constructor strategy
// =============================================================================

/// A target built from a positional parameter list.
pub trait ConstructorTarget: Sized {
    /// Parameter types in order.
    fn parameters() -> &'static [ColumnDef];

    fn construct(args: Vec<Value>) -> Result<Self, ProjectionError>;
}

pub struct ConstructorProjection<D> {
    bindings: Vec<Binding>,
    _target: PhantomData<fn() -> D>,
}

impl<D> Clone for ConstructorProjection<D> {
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
            _target: PhantomData,
        }
    }
}

/// Project into `D` through its declared constructor.
pub fn constructor<D: ConstructorTarget>(
    bindings: impl IntoIterator<Item = Binding>,
) -> BuildResult<ConstructorProjection<D>> {
    let bindings: Vec<Binding> = bindings.into_iter().collect();
    let target = type_name::<D>();
    let params = D::parameters();

    if params.len() != bindings.len() {
        return Err(BuildError::ProjectionMismatch(format!(
            "{} takes {} arguments, {} given",
            target,
            params.len(),
            bindings.len()
        )));
    }
    for (param, binding) in params.iter().zip(&bindings) {
        check_type(target, binding, param.value_type, param.nullable)?;
    }

    Ok(ConstructorProjection {
        bindings,
        _target: PhantomData,
    })
}

impl<D: ConstructorTarget> Projection for ConstructorProjection<D> {
    type Output = D;

    fn spec(&self) -> ProjectionSpec {
        dto_spec::<D>(
            DtoStrategy::Constructor,
            self.bindings.iter().map(|b| b.expr.clone()),
        )
    }

    fn shape(&self, row: &RowView<'_>) -> Result<D, ProjectionError> {
        let args = (0..self.bindings.len())
            .map(|i| row.value(i).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        D::construct(args)
    }
}

// =============================================================================
// Generated constructor strategy
// =============================================================================

/// A compile-time mapping from an exact expression list to `Self`.
///
/// Implementing this trait binds the target type to the query layer: its
/// signature names the kinds of the selected expressions. Prefer a separate
/// DTO type over reusing a domain type, which would otherwise change whenever
/// the query does.
pub trait QueryProjection<Args>: Sized {
    fn project(args: Args) -> Self;
}

/// One argument of a generated constructor.
pub trait ArgSlot {
    type Value;

    fn arg_expr(&self) -> Expr;

    fn extract(value: Value) -> Result<Self::Value, ProjectionError>;
}

impl<K: SqlKind> ArgSlot for Expression<K> {
    type Value = K::Native;

    fn arg_expr(&self) -> Expr {
        self.expr().clone()
    }

    fn extract(value: Value) -> Result<K::Native, ProjectionError> {
        K::Native::from_value(value)
    }
}

/// An argument that accepts `NULL`, passed as `Option`.
pub struct Nullable<K>(Expression<K>);

impl<K: SqlKind> Expression<K> {
    pub fn nullable(&self) -> Nullable<K> {
        Nullable(self.clone())
    }
}

impl<K: SqlKind> ArgSlot for Nullable<K> {
    type Value = Option<K::Native>;

    fn arg_expr(&self) -> Expr {
        self.0.expr().clone()
    }

    fn extract(value: Value) -> Result<Option<K::Native>, ProjectionError> {
        Option::<K::Native>::from_value(value)
    }
}

/// An ordered list of constructor arguments.
pub trait ArgList {
    type Values;

    fn exprs(&self) -> Vec<Expr>;

    fn extract(row: &RowView<'_>) -> Result<Self::Values, ProjectionError>;
}

macro_rules! arg_list {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: ArgSlot),+> ArgList for ($($name,)+) {
            type Values = ($($name::Value,)+);

            fn exprs(&self) -> Vec<Expr> {
                vec![$(self.$idx.arg_expr()),+]
            }

            fn extract(row: &RowView<'_>) -> Result<Self::Values, ProjectionError> {
                Ok(($($name::extract(row.value($idx)?.clone())?,)+))
            }
        }
    };
}

arg_list!(A: 0);
arg_list!(A: 0, B: 1);
arg_list!(A: 0, B: 1, C: 2);
arg_list!(A: 0, B: 1, C: 2, D: 3);
arg_list!(A: 0, B: 1, C: 2, D: 3, E: 4);
arg_list!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

pub struct GeneratedProjection<D, A> {
    args: A,
    _target: PhantomData<fn() -> D>,
}

/// Project into `D` through its [`QueryProjection`] impl.
pub fn generated<D, A>(args: A) -> GeneratedProjection<D, A>
where
    A: ArgList,
    D: QueryProjection<A::Values>,
{
    GeneratedProjection {
        args,
        _target: PhantomData,
    }
}

impl<D, A> Projection for GeneratedProjection<D, A>
where
    A: ArgList,
    D: QueryProjection<A::Values>,
{
    type Output = D;

    fn spec(&self) -> ProjectionSpec {
        dto_spec::<D>(DtoStrategy::GeneratedConstructor, self.args.exprs())
    }

    fn shape(&self, row: &RowView<'_>) -> Result<D, ProjectionError> {
        Ok(D::project(A::extract(row)?))
    }
}
