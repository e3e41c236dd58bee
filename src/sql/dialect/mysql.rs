//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), returns 1/0
//! - `||` is logical OR by default (use CONCAT())
//! - OFFSET requires a LIMIT
//! - No NULLS FIRST/LAST
//! - CAST targets are SIGNED/DOUBLE/CHAR, not column types

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;
use crate::value::ValueType;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quoted(ident, '`')
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::bool_literal(b, true)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".into()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::limit_offset(limit, offset, Some("18446744073709551615"))
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, helpers::MYSQL_RENAMES)
    }

    fn column_type_name(&self, ty: ValueType) -> &'static str {
        match ty {
            ValueType::Int => "BIGINT",
            ValueType::Float => "DOUBLE",
            ValueType::Text => "TEXT",
            ValueType::Bool => "TINYINT(1)",
        }
    }

    fn cast_type_name(&self, ty: ValueType) -> &'static str {
        match ty {
            ValueType::Int | ValueType::Bool => "SIGNED",
            ValueType::Float => "DOUBLE",
            ValueType::Text => "CHAR",
        }
    }
}
