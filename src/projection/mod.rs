//! Projection engine: shaping result rows into output values.
//!
//! A request's select list is a sequence of [`SelectItem`]s. Each item
//! occupies one or more slots of a raw row: a scalar expression takes one
//! slot, an entity takes one slot per column (plus the columns of every
//! association fetched with it). [`RowLayout`] records that mapping once per
//! request, and a [`Projection`] turns each [`RowView`] into its output:
//!
//! | projection | output |
//! |------------|--------|
//! | `Expression<K>` | `Option<K::Native>` (bare, not a 1-tuple) |
//! | `EntityPath<E>` | `E` |
//! | `(A, B, ..)` | [`Tuple`] |
//! | [`dto::fields`] / [`dto::constructor`] / [`dto::generated`] | the DTO type |

pub mod dto;
mod tuple;

use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;

use crate::entity::{Entity, EntityPath, EntityRow, EntitySchema, SourceRef};
use crate::sql::expr::{Expr, Expression};
use crate::sql::kind::SqlKind;
use crate::value::{FromValue, Value, ValueType};

pub use dto::{
    constructor, fields, generated, ArgList, ArgSlot, Binding, ConstructorProjection,
    ConstructorTarget, FieldProjection, FieldTarget, GeneratedProjection, Nullable,
    QueryProjection,
};
pub use tuple::Tuple;

/// Errors raised while shaping a row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("unexpected NULL for non-nullable {target}")]
    UnexpectedNull { target: &'static str },

    #[error("not part of the selected row: {0}")]
    NotSelected(String),

    #[error("unknown target field `{0}`")]
    UnknownField(String),

    #[error("row has {found} slots, projection expects {expected}")]
    SlotCount { expected: usize, found: usize },
}

// =============================================================================
// Select items
// =============================================================================

/// One entry of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Expr(Expr),
    Entity(EntitySelection),
}

impl SelectItem {
    pub fn entity(source: SourceRef) -> Self {
        SelectItem::Entity(EntitySelection {
            source,
            fetched: Vec::new(),
        })
    }
}

/// A whole entity in the select list, with the associations fetched into it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySelection {
    pub source: SourceRef,
    pub fetched: Vec<FetchedAssociation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAssociation {
    pub name: &'static str,
    pub target: SourceRef,
}

fn column_slots(source: &SourceRef) -> impl Iterator<Item = Expr> + '_ {
    source
        .schema
        .columns
        .iter()
        .map(move |c| Expr::column(source.alias.clone(), c.name, c.value_type))
}

// =============================================================================
// Projection spec
// =============================================================================

/// How a DTO is constructed from its feeding expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtoStrategy {
    Field,
    Constructor,
    GeneratedConstructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionShape {
    Scalar,
    Entity,
    Tuple,
    Dto {
        target: &'static str,
        strategy: DtoStrategy,
    },
}

/// Target shape plus the ordered items feeding it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionSpec {
    pub shape: ProjectionShape,
    pub items: Vec<SelectItem>,
}

impl ProjectionSpec {
    /// True for the generated-constructor strategy, whose target type is
    /// bound to the query layer by a trait impl.
    pub fn is_query_coupled(&self) -> bool {
        matches!(
            self.shape,
            ProjectionShape::Dto {
                strategy: DtoStrategy::GeneratedConstructor,
                ..
            }
        )
    }
}

/// Something that can be selected and shaped.
pub trait Projection {
    type Output;

    fn spec(&self) -> ProjectionSpec;

    fn shape(&self, row: &RowView<'_>) -> Result<Self::Output, ProjectionError>;
}

/// A single element of a tuple projection.
pub trait SelectTarget {
    fn select_item(&self) -> SelectItem;
}

impl<K: SqlKind> SelectTarget for Expression<K> {
    fn select_item(&self) -> SelectItem {
        SelectItem::Expr(self.expr().clone())
    }
}

impl<E: Entity> SelectTarget for EntityPath<E> {
    fn select_item(&self) -> SelectItem {
        SelectItem::entity(self.source())
    }
}

impl<K: SqlKind> Projection for Expression<K> {
    type Output = Option<K::Native>;

    fn spec(&self) -> ProjectionSpec {
        ProjectionSpec {
            shape: ProjectionShape::Scalar,
            items: vec![self.select_item()],
        }
    }

    fn shape(&self, row: &RowView<'_>) -> Result<Self::Output, ProjectionError> {
        Option::<K::Native>::from_value(row.value(0)?.clone())
    }
}

impl<E: Entity> Projection for EntityPath<E> {
    type Output = E;

    fn spec(&self) -> ProjectionSpec {
        ProjectionSpec {
            shape: ProjectionShape::Entity,
            items: vec![self.select_item()],
        }
    }

    fn shape(&self, row: &RowView<'_>) -> Result<E, ProjectionError> {
        E::from_row(&row.entity(0)?)
    }
}

// =============================================================================
// Row layout
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct FetchedSpan {
    name: &'static str,
    schema: &'static EntitySchema,
    start: usize,
    len: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct ItemSpan {
    start: usize,
    len: usize,
    schema: Option<&'static EntitySchema>,
    fetched: Vec<FetchedSpan>,
}

/// Mapping from select items to raw row slots.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    items: Vec<SelectItem>,
    spans: Vec<ItemSpan>,
    width: usize,
}

/// Key slot of an entity in a row, with the associations fetched into it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySlots {
    pub schema: &'static EntitySchema,
    pub key_slot: usize,
    pub fetched: Vec<&'static str>,
}

impl RowLayout {
    pub fn new(items: Vec<SelectItem>) -> Self {
        let mut spans = Vec::with_capacity(items.len());
        let mut width = 0;

        for item in &items {
            match item {
                SelectItem::Expr(_) => {
                    spans.push(ItemSpan {
                        start: width,
                        len: 1,
                        schema: None,
                        fetched: Vec::new(),
                    });
                    width += 1;
                }
                SelectItem::Entity(selection) => {
                    let schema = selection.source.schema;
                    let start = width;
                    width += schema.columns.len();
                    let mut fetched = Vec::with_capacity(selection.fetched.len());
                    for f in &selection.fetched {
                        let len = f.target.schema.columns.len();
                        fetched.push(FetchedSpan {
                            name: f.name,
                            schema: f.target.schema,
                            start: width,
                            len,
                        });
                        width += len;
                    }
                    spans.push(ItemSpan {
                        start,
                        len: schema.columns.len(),
                        schema: Some(schema),
                        fetched,
                    });
                }
            }
        }

        Self {
            items,
            spans,
            width,
        }
    }

    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    /// Number of raw slots per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Slot expressions in row order.
    pub fn slot_exprs(&self) -> Vec<Expr> {
        let mut slots = Vec::with_capacity(self.width);
        for item in &self.items {
            match item {
                SelectItem::Expr(e) => slots.push(e.clone()),
                SelectItem::Entity(selection) => {
                    slots.extend(column_slots(&selection.source));
                    for f in &selection.fetched {
                        slots.extend(column_slots(&f.target));
                    }
                }
            }
        }
        slots
    }

    pub fn slot_types(&self) -> Vec<Option<ValueType>> {
        self.slot_exprs().iter().map(Expr::value_type).collect()
    }

    /// Index of the scalar item equal to `expr`.
    pub fn position(&self, expr: &Expr) -> Option<usize> {
        self.items
            .iter()
            .position(|item| matches!(item, SelectItem::Expr(e) if e == expr))
    }

    /// Index of the entity item selected under `alias`.
    pub fn entity_position(&self, alias: &str) -> Option<usize> {
        self.items.iter().position(
            |item| matches!(item, SelectItem::Entity(sel) if sel.source.alias == alias),
        )
    }

    /// Slot ranges of every entity in the row, fetched associations included.
    pub fn entity_ranges(&self) -> Vec<(&'static EntitySchema, Range<usize>)> {
        let mut ranges = Vec::new();
        for span in &self.spans {
            let Some(schema) = span.schema else { continue };
            ranges.push((schema, span.start..span.start + span.len));
            for f in &span.fetched {
                ranges.push((f.schema, f.start..f.start + f.len));
            }
        }
        ranges
    }

    /// Entities in the row whose associations were fetched, for load tracking.
    pub fn fetched_entities(&self) -> Vec<EntitySlots> {
        self.spans
            .iter()
            .filter(|span| !span.fetched.is_empty())
            .filter_map(|span| {
                let schema = span.schema?;
                Some(EntitySlots {
                    schema,
                    key_slot: span.start + schema.key_index()?,
                    fetched: span.fetched.iter().map(|f| f.name).collect(),
                })
            })
            .collect()
    }
}

// =============================================================================
// Row view
// =============================================================================

/// One raw row read through its layout.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    layout: &'a Arc<RowLayout>,
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    pub fn new(layout: &'a Arc<RowLayout>, values: &'a [Value]) -> Result<Self, ProjectionError> {
        if values.len() != layout.width {
            return Err(ProjectionError::SlotCount {
                expected: layout.width,
                found: values.len(),
            });
        }
        Ok(Self { layout, values })
    }

    pub fn layout(&self) -> &'a Arc<RowLayout> {
        self.layout
    }

    /// Number of select items.
    pub fn len(&self) -> usize {
        self.layout.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.items.is_empty()
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Value of the scalar item at `item`.
    pub fn value(&self, item: usize) -> Result<&'a Value, ProjectionError> {
        match self.layout.spans.get(item) {
            Some(span) if span.schema.is_none() => Ok(&self.values[span.start]),
            Some(_) => Err(ProjectionError::NotSelected(format!(
                "item {} is an entity, not a scalar",
                item
            ))),
            None => Err(ProjectionError::NotSelected(format!("item {}", item))),
        }
    }

    /// Entity slots of the entity item at `item`.
    pub fn entity(&self, item: usize) -> Result<EntityRow<'a>, ProjectionError> {
        let span = self
            .layout
            .spans
            .get(item)
            .ok_or_else(|| ProjectionError::NotSelected(format!("item {}", item)))?;
        let schema = span.schema.ok_or_else(|| {
            ProjectionError::NotSelected(format!("item {} is a scalar, not an entity", item))
        })?;

        let mut row = EntityRow::new(schema, &self.values[span.start..span.start + span.len]);
        for f in &span.fetched {
            let target = EntityRow::new(f.schema, &self.values[f.start..f.start + f.len]);
            let target = if target.is_absent() { None } else { Some(target) };
            row = row.with_fetched(f.name, target);
        }
        Ok(row)
    }

    pub fn to_tuple(&self) -> Tuple {
        Tuple::new(Arc::clone(self.layout), self.values.to_vec())
    }
}
