//! Join declaration and resolution.
//!
//! Three kinds of join:
//!
//! - relational: follows a declared association from an owner alias to a
//!   target alias (`JoinSpec::inner(&m.association("team"), &t)`); the key
//!   equality comes from the association, an `on` predicate narrows it
//! - condition: joins an unrelated source on an arbitrary predicate
//!   (`JoinSpec::left_on(&t).on(m.username.eq(t.name.clone()))`)
//! - cross: every pairing, no predicate
//!
//! A fetch flag on a relational join loads the association into the owner
//! entity's result. On an outer join an `on` predicate only decides which
//! target rows attach; owner rows without a match are still returned.

use tracing::debug;

use crate::entity::{AssociationDef, AssociationPath, Cardinality, EntitySource, SourceRef};
use crate::error::{BuildError, BuildResult};
use crate::sql::expr::{BinaryOperator, Expr};
use crate::sql::predicate::Predicate;
use crate::sql::token::{Token, TokenStream};
use crate::sql::Dialect;

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Cross,
}

/// A join as declared by the caller, before resolution.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct JoinSpec {
    join_type: JoinType,
    association: Option<AssociationPath>,
    target: SourceRef,
    on: Option<Predicate>,
    fetch: bool,
}

impl JoinSpec {
    fn new(join_type: JoinType, association: Option<AssociationPath>, target: SourceRef) -> Self {
        Self {
            join_type,
            association,
            target,
            on: None,
            fetch: false,
        }
    }

    /// Inner join along a declared association.
    pub fn inner<S: EntitySource>(association: &AssociationPath, target: &S) -> Self {
        Self::new(
            JoinType::Inner,
            Some(association.clone()),
            target.path().source(),
        )
    }

    /// Left outer join along a declared association.
    pub fn left<S: EntitySource>(association: &AssociationPath, target: &S) -> Self {
        Self::new(
            JoinType::Left,
            Some(association.clone()),
            target.path().source(),
        )
    }

    /// Inner join on an arbitrary condition; requires [`JoinSpec::on`].
    pub fn inner_on<S: EntitySource>(target: &S) -> Self {
        Self::new(JoinType::Inner, None, target.path().source())
    }

    /// Left outer join on an arbitrary condition; requires [`JoinSpec::on`].
    pub fn left_on<S: EntitySource>(target: &S) -> Self {
        Self::new(JoinType::Left, None, target.path().source())
    }

    pub fn cross<S: EntitySource>(target: &S) -> Self {
        Self::new(JoinType::Cross, None, target.path().source())
    }

    /// Add a join predicate. Repeated calls are ANDed; an absent predicate
    /// is ignored.
    pub fn on(mut self, predicate: impl Into<Option<Predicate>>) -> Self {
        self.on = match (self.on.take(), predicate.into()) {
            (Some(existing), next) => Some(existing.and(next)),
            (None, next) => next,
        };
        self
    }

    /// Load the association into the owner entity's result.
    pub fn fetch(mut self) -> Self {
        self.fetch = true;
        self
    }

    pub fn target(&self) -> &SourceRef {
        &self.target
    }
}

/// How a resolved join matches rows.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinKind {
    Relational {
        owner: String,
        association: AssociationDef,
    },
    Condition,
    Cross,
}

/// A resolved, validated join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub kind: JoinKind,
    pub target: SourceRef,
    pub on: Option<Predicate>,
    pub fetch: bool,
}

impl JoinClause {
    /// Key equality implied by a relational join.
    pub fn key_condition(&self) -> Option<Expr> {
        let JoinKind::Relational { owner, association } = &self.kind else {
            return None;
        };
        let key_ty = self
            .target
            .schema
            .column(association.target_column)
            .map(|c| c.value_type)?;
        Some(Expr::BinaryOp {
            left: Box::new(Expr::column(owner.clone(), association.local_column, key_ty)),
            op: BinaryOperator::Eq,
            right: Box::new(Expr::column(
                self.target.alias.clone(),
                association.target_column,
                key_ty,
            )),
        })
    }

    /// Full `ON` condition: key equality (if any) ANDed with the caller's predicate.
    pub fn condition(&self) -> Option<Expr> {
        let on = self.on.as_ref().map(|p| p.expr().clone());
        match (self.key_condition(), on) {
            (Some(key), Some(on)) => Some(Expr::BinaryOp {
                left: Box::new(key),
                op: BinaryOperator::And,
                right: Box::new(on),
            }),
            (key, on) => key.or(on),
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
            JoinType::Cross => ts.push(Token::Cross),
        };

        ts.space().push(Token::Join).space();
        ts.push(Token::Ident(self.target.table().into()))
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident(self.target.alias.clone()));

        if let Some(on) = self.condition() {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

/// Resolves join declarations against the sources already in a request.
pub struct JoinBuilder<'a> {
    scope: &'a [SourceRef],
}

impl<'a> JoinBuilder<'a> {
    /// `scope` holds every source visible to the new join: `from` sources
    /// and the targets of earlier joins.
    pub fn new(scope: &'a [SourceRef]) -> Self {
        Self { scope }
    }

    fn lookup(&self, alias: &str) -> Option<&SourceRef> {
        self.scope.iter().find(|s| s.alias == alias)
    }

    pub fn resolve(&self, spec: JoinSpec) -> BuildResult<JoinClause> {
        if self.lookup(&spec.target.alias).is_some() {
            return Err(BuildError::AliasCollision {
                alias: spec.target.alias,
            });
        }

        let kind = match (&spec.association, spec.join_type) {
            (Some(_), JoinType::Cross) => {
                return Err(BuildError::MalformedJoin(
                    "a cross join cannot follow an association".into(),
                ))
            }
            (Some(path), _) => self.resolve_association(path, &spec)?,
            (None, JoinType::Cross) => {
                if spec.fetch {
                    return Err(BuildError::MalformedJoin(format!(
                        "cross join to `{}` cannot be fetched",
                        spec.target.alias
                    )));
                }
                if spec.on.is_some() {
                    return Err(BuildError::MalformedJoin(format!(
                        "cross join to `{}` takes no `on` predicate",
                        spec.target.alias
                    )));
                }
                JoinKind::Cross
            }
            (None, _) => {
                if spec.on.is_none() {
                    return Err(BuildError::MalformedJoin(format!(
                        "condition join to `{}` needs an `on` predicate",
                        spec.target.alias
                    )));
                }
                if spec.fetch {
                    return Err(BuildError::MalformedJoin(format!(
                        "condition join to `{}` has no association to fetch",
                        spec.target.alias
                    )));
                }
                JoinKind::Condition
            }
        };

        debug!(
            target = %spec.target.alias,
            table = spec.target.table(),
            join_type = ?spec.join_type,
            fetch = spec.fetch,
            "resolved join"
        );

        Ok(JoinClause {
            join_type: spec.join_type,
            kind,
            target: spec.target,
            on: spec.on,
            fetch: spec.fetch,
        })
    }

    fn resolve_association(&self, path: &AssociationPath, spec: &JoinSpec) -> BuildResult<JoinKind> {
        let owner = self
            .lookup(&path.owner.alias)
            .ok_or_else(|| BuildError::UnknownSource(path.owner.alias.clone()))?;
        let association = owner.schema.association(&path.name).ok_or_else(|| {
            BuildError::UnknownAssociation {
                source_alias: owner.alias.clone(),
                association: path.name.clone(),
            }
        })?;

        if association.target != spec.target.table() {
            return Err(BuildError::MalformedJoin(format!(
                "association `{}.{}` leads to `{}`, not `{}`",
                owner.alias,
                association.name,
                association.target,
                spec.target.table()
            )));
        }
        if spec.fetch && association.cardinality == Cardinality::OneToMany {
            return Err(BuildError::MalformedJoin(format!(
                "collection association `{}.{}` cannot be fetched",
                owner.alias, association.name
            )));
        }

        Ok(JoinKind::Relational {
            owner: owner.alias.clone(),
            association: association.clone(),
        })
    }
}
