use std::sync::Arc;

use super::{Projection, ProjectionError, ProjectionShape, ProjectionSpec, RowLayout, RowView, SelectTarget};
use crate::entity::{Entity, EntitySource};
use crate::sql::expr::Expression;
use crate::sql::kind::SqlKind;
use crate::value::{FromValue, Value};

/// A heterogeneous result row, read back by the expressions that produced it.
///
/// ```ignore
/// let query = select((m.username.clone(), m.age.clone())).from(&m).build()?;
/// let row = factory.fetch_first(query)?.expect("a member");
/// let name: Option<String> = row.get(&m.username)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    layout: Arc<RowLayout>,
    values: Vec<Value>,
}

impl Tuple {
    pub(crate) fn new(layout: Arc<RowLayout>, values: Vec<Value>) -> Self {
        Self { layout, values }
    }

    fn view(&self) -> Result<RowView<'_>, ProjectionError> {
        RowView::new(&self.layout, &self.values)
    }

    /// Number of selected items.
    pub fn len(&self) -> usize {
        self.layout.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.items().is_empty()
    }

    /// Raw slot values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the scalar item at `index`.
    pub fn value(&self, index: usize) -> Result<&Value, ProjectionError> {
        let view = self.view()?;
        view.value(index)
    }

    /// Value of a selected expression, decoded to its native type.
    pub fn get<K: SqlKind>(&self, expr: &Expression<K>) -> Result<Option<K::Native>, ProjectionError> {
        let index = self
            .layout
            .position(expr.expr())
            .ok_or_else(|| ProjectionError::NotSelected(format!("{:?}", expr.expr())))?;
        Option::<K::Native>::from_value(self.value(index)?.clone())
    }

    /// A selected entity; `None` when an outer join found no match.
    pub fn entity<S: EntitySource>(&self, source: &S) -> Result<Option<S::Entity>, ProjectionError> {
        let alias = source.path().alias();
        let index = self
            .layout
            .entity_position(alias)
            .ok_or_else(|| ProjectionError::NotSelected(format!("entity `{}`", alias)))?;
        let row = self.view()?.entity(index)?;
        if row.is_absent() {
            return Ok(None);
        }
        S::Entity::from_row(&row).map(Some)
    }
}

macro_rules! tuple_projection {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: SelectTarget),+> Projection for ($($name,)+) {
            type Output = Tuple;

            fn spec(&self) -> ProjectionSpec {
                ProjectionSpec {
                    shape: ProjectionShape::Tuple,
                    items: vec![$(self.$idx.select_item()),+],
                }
            }

            fn shape(&self, row: &RowView<'_>) -> Result<Tuple, ProjectionError> {
                Ok(row.to_tuple())
            }
        }
    };
}

tuple_projection!(A: 0, B: 1);
tuple_projection!(A: 0, B: 1, C: 2);
tuple_projection!(A: 0, B: 1, C: 2, D: 3);
tuple_projection!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_projection!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_projection!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_projection!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
