//! SQLite SQL dialect.
//!
//! SQLite differences from ANSI:
//! - No boolean storage class; booleans are INTEGER 1/0
//! - OFFSET requires a LIMIT (`LIMIT -1` means unbounded)
//! - Type affinities instead of strict column types

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;
use crate::value::ValueType;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quoted(ident, '"')
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::bool_literal(b, true)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::limit_offset(limit, offset, Some("-1"))
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, helpers::SQLITE_RENAMES)
    }

    fn column_type_name(&self, ty: ValueType) -> &'static str {
        match ty {
            ValueType::Int | ValueType::Bool => "INTEGER",
            ValueType::Float => "REAL",
            ValueType::Text => "TEXT",
        }
    }
}
