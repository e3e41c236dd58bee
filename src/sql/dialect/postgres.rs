//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - NULLS FIRST/LAST
//! - `$n` bind parameters

use super::helpers;
use super::SqlDialect;
use crate::value::ValueType;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quoted(ident, '"')
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::bool_literal(b, false)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap(name, helpers::POSTGRES_RENAMES)
    }

    fn column_type_name(&self, ty: ValueType) -> &'static str {
        match ty {
            ValueType::Int => "BIGINT",
            ValueType::Float => "DOUBLE PRECISION",
            ValueType::Text => "TEXT",
            ValueType::Bool => "BOOLEAN",
        }
    }
}
