//! CREATE TABLE for entity schemas.

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};
use crate::entity::EntitySchema;

/// CREATE TABLE statement derived from an [`EntitySchema`].
#[derive(Debug, Clone, Copy)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    schema: &'static EntitySchema,
    if_not_exists: bool,
}

impl CreateTable {
    pub fn for_schema(schema: &'static EntitySchema) -> Self {
        Self {
            schema,
            if_not_exists: false,
        }
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create).space().push(Token::Table);
        if self.if_not_exists {
            ts.space().push(Token::IfNotExists);
        }
        ts.space()
            .push(Token::Ident(self.schema.table.into()))
            .space()
            .lparen();

        for (i, column) in self.schema.columns.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            ts.newline().indent(1);
            ts.push(Token::Ident(column.name.into()))
                .space()
                .push(Token::Raw(dialect.column_type_name(column.value_type).into()));
            if column.name == self.schema.key {
                ts.space().push(Token::PrimaryKey);
            } else if !column.nullable {
                ts.space().push(Token::NotNull);
            }
        }

        ts.newline().rparen();
        ts
    }
}
