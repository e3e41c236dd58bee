//! Entity schemas and typed paths.
//!
//! An entity is a Rust type mapped to one table. Its [`EntitySchema`] is
//! static metadata: columns, the key column, and declared associations.
//! Queries refer to entities through aliased paths ([`EntityPath`]), so the
//! same entity can appear twice in one request (self-joins, subqueries).
//!
//! Associations are declared on both sides but owned by one: the many-to-one
//! side carries the foreign key, while a one-to-many association is a derived
//! view resolved by looking up rows whose foreign key matches the owner's key.
//! No entity holds another by pointer; association fields are [`Lazy`] values
//! filled only when a fetch join materializes them.

use std::fmt;
use std::marker::PhantomData;

use crate::projection::ProjectionError;
use crate::sql::expr::{AggregateFunction, Expr, Expression};
use crate::sql::kind::{Int, SqlKind};
use crate::value::{FromValue, Value, ValueType};

// =============================================================================
// Schema metadata
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub value_type: ValueType,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            nullable: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// This side holds the foreign key.
    ManyToOne,
    /// Derived view over the other side's foreign key.
    OneToMany,
}

/// A declared association from one entity to another.
///
/// Rows match when `owner.local_column = target.target_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationDef {
    pub name: &'static str,
    pub target: &'static str,
    pub local_column: &'static str,
    pub target_column: &'static str,
    pub cardinality: Cardinality,
}

impl AssociationDef {
    pub const fn many_to_one(
        name: &'static str,
        target: &'static str,
        foreign_key: &'static str,
        target_key: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            local_column: foreign_key,
            target_column: target_key,
            cardinality: Cardinality::ManyToOne,
        }
    }

    pub const fn one_to_many(
        name: &'static str,
        target: &'static str,
        key: &'static str,
        mapped_by: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            local_column: key,
            target_column: mapped_by,
            cardinality: Cardinality::OneToMany,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    pub table: &'static str,
    pub key: &'static str,
    pub columns: &'static [ColumnDef],
    pub associations: &'static [AssociationDef],
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn key_index(&self) -> Option<usize> {
        self.column_index(self.key)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.name == name)
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Identity of one stored entity: its table and key value.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKey {
    pub table: &'static str,
    pub id: Value,
}

impl EntityKey {
    pub fn new(table: &'static str, id: impl Into<Value>) -> Self {
        Self {
            table,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.id)
    }
}

/// A type mapped to one table.
pub trait Entity: Sized {
    fn schema() -> &'static EntitySchema;

    /// Materialize from the entity's column slots.
    fn from_row(row: &EntityRow<'_>) -> Result<Self, ProjectionError>;

    /// Column values in schema order.
    fn to_values(&self) -> Vec<Value>;

    fn key(&self) -> EntityKey {
        let schema = Self::schema();
        let values = self.to_values();
        let id = schema
            .key_index()
            .and_then(|i| values.get(i).cloned())
            .unwrap_or(Value::Null);
        EntityKey::new(schema.table, id)
    }
}

/// An association field: loaded by a fetch join, or not loaded at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Lazy<T> {
    #[default]
    NotLoaded,
    /// `None` when the association is loaded but empty (a null foreign key).
    Loaded(Option<T>),
}

impl<T> Lazy<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Lazy::Loaded(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Lazy::Loaded(Some(value)) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct FetchedRow<'a> {
    name: &'static str,
    row: Option<EntityRow<'a>>,
}

/// Borrowed view of one entity's slots within a result row.
#[derive(Debug, Clone)]
pub struct EntityRow<'a> {
    schema: &'static EntitySchema,
    values: &'a [Value],
    fetched: Vec<FetchedRow<'a>>,
}

impl<'a> EntityRow<'a> {
    pub fn new(schema: &'static EntitySchema, values: &'a [Value]) -> Self {
        Self {
            schema,
            values,
            fetched: Vec::new(),
        }
    }

    pub(crate) fn with_fetched(mut self, name: &'static str, row: Option<EntityRow<'a>>) -> Self {
        self.fetched.push(FetchedRow { name, row });
        self
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn value(&self, column: &str) -> Result<&'a Value, ProjectionError> {
        self.schema
            .column_index(column)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| ProjectionError::UnknownField(column.to_string()))
    }

    pub fn get<T: FromValue>(&self, column: &str) -> Result<T, ProjectionError> {
        T::from_value(self.value(column)?.clone())
    }

    pub fn key(&self) -> EntityKey {
        let id = self
            .schema
            .key_index()
            .and_then(|i| self.values.get(i).cloned())
            .unwrap_or(Value::Null);
        EntityKey::new(self.schema.table, id)
    }

    /// True when the key slot is NULL, i.e. an unmatched outer join.
    pub fn is_absent(&self) -> bool {
        self.key().id.is_null()
    }

    /// The association named `name`, loaded only if the query fetched it.
    pub fn association<T: Entity>(&self, name: &str) -> Result<Lazy<T>, ProjectionError> {
        match self.fetched.iter().find(|f| f.name == name) {
            None => Ok(Lazy::NotLoaded),
            Some(FetchedRow { row: None, .. }) => Ok(Lazy::Loaded(None)),
            Some(FetchedRow { row: Some(row), .. }) => {
                Ok(Lazy::Loaded(Some(T::from_row(row)?)))
            }
        }
    }
}

// =============================================================================
// Paths
// =============================================================================

/// One aliased use of an entity within a request.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub alias: String,
    pub schema: &'static EntitySchema,
}

impl SourceRef {
    pub fn table(&self) -> &'static str {
        self.schema.table
    }
}

/// Anything that names an aliased entity: a bare [`EntityPath`] or a
/// generated path struct wrapping one.
pub trait EntitySource {
    type Entity: Entity;

    fn path(&self) -> &EntityPath<Self::Entity>;
}

/// An aliased reference to entity `E`.
pub struct EntityPath<E> {
    alias: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityPath<E> {
    fn clone(&self) -> Self {
        Self {
            alias: self.alias.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for EntityPath<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityPath").field(&self.alias).finish()
    }
}

impl<E: Entity> EntityPath<E> {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            _entity: PhantomData,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn schema(&self) -> &'static EntitySchema {
        E::schema()
    }

    pub fn source(&self) -> SourceRef {
        SourceRef {
            alias: self.alias.clone(),
            schema: E::schema(),
        }
    }

    /// Typed column reference. Existence and type are checked when the
    /// request is built.
    pub fn column<K: SqlKind>(&self, name: &str) -> Expression<K> {
        Expression::column(self.alias.clone(), name)
    }

    pub fn association(&self, name: &str) -> AssociationPath {
        AssociationPath {
            owner: self.source(),
            name: name.to_string(),
        }
    }

    /// `COUNT(alias.key)`.
    pub fn count(&self) -> Expression<Int> {
        let key_type = E::schema()
            .column(E::schema().key)
            .map(|c| c.value_type)
            .unwrap_or(ValueType::Int);
        Expression::new(Expr::Aggregate {
            func: AggregateFunction::Count,
            arg: Some(Box::new(Expr::column(
                self.alias.clone(),
                E::schema().key,
                key_type,
            ))),
            distinct: false,
        })
    }
}

impl<E: Entity> EntitySource for EntityPath<E> {
    type Entity = E;

    fn path(&self) -> &EntityPath<E> {
        self
    }
}

/// A declared association reached from an aliased owner.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationPath {
    pub owner: SourceRef,
    pub name: String,
}

/// Declare a path struct exposing typed columns of an entity.
///
/// ```ignore
/// entity_path! {
///     pub struct QMember for Member {
///         id: Int = "id",
///         username: Text = "username",
///         age: Int = "age",
///     }
/// }
///
/// let m = QMember::new("m");
/// let adults = m.age.goe(18);
/// ```
#[macro_export]
macro_rules! entity_path {
    ($(#[$meta:meta])* $vis:vis struct $name:ident for $entity:ty {
        $($field:ident : $kind:ident = $column:literal),* $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis struct $name {
            path: $crate::entity::EntityPath<$entity>,
            $(pub $field: $crate::sql::Expression<$crate::sql::kind::$kind>,)*
        }

        impl $name {
            pub fn new(alias: &str) -> Self {
                let path = $crate::entity::EntityPath::<$entity>::new(alias);
                Self {
                    $($field: path.column::<$crate::sql::kind::$kind>($column),)*
                    path,
                }
            }
        }

        impl $crate::entity::EntitySource for $name {
            type Entity = $entity;

            fn path(&self) -> &$crate::entity::EntityPath<$entity> {
                &self.path
            }
        }

        impl $crate::projection::SelectTarget for $name {
            fn select_item(&self) -> $crate::projection::SelectItem {
                $crate::projection::SelectItem::entity(self.path.source())
            }
        }

        impl $crate::projection::Projection for $name {
            type Output = $entity;

            fn spec(&self) -> $crate::projection::ProjectionSpec {
                $crate::projection::Projection::spec(&self.path)
            }

            fn shape(
                &self,
                row: &$crate::projection::RowView<'_>,
            ) -> ::std::result::Result<$entity, $crate::projection::ProjectionError> {
                $crate::projection::Projection::shape(&self.path, row)
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::entity::EntityPath<$entity>;

            fn deref(&self) -> &Self::Target {
                &self.path
            }
        }
    };
}
