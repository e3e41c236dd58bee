//! Building blocks shared by the dialect implementations.

use super::super::token::{Token, TokenStream};
#[cfg(test)]
use super::Dialect;

/// Wrap `text` in `quote`, doubling any embedded quote character.
///
/// Covers ANSI identifiers (`"`), MySQL identifiers (`` ` ``) and string
/// literals (`'`).
pub fn quoted(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Spell a boolean either as a keyword or as `1`/`0`.
pub fn bool_literal(b: bool, numeric: bool) -> &'static str {
    match (b, numeric) {
        (true, false) => "true",
        (false, false) => "false",
        (true, true) => "1",
        (false, true) => "0",
    }
}

/// `LIMIT n OFFSET m`, either part optional.
///
/// Dialects that cannot write OFFSET on its own pass `unbounded`, the
/// literal that stands in for "no limit" when only an offset is present.
pub fn limit_offset(limit: Option<u64>, offset: Option<u64>, unbounded: Option<&str>) -> TokenStream {
    let limit = match (limit, offset, unbounded) {
        (Some(n), _, _) => Some(n.to_string()),
        (None, Some(_), Some(literal)) => Some(literal.to_string()),
        (None, _, _) => None,
    };

    let mut ts = TokenStream::new();
    if let Some(n) = limit {
        ts.push(Token::Limit).space().push(Token::Raw(n));
    }
    if let Some(m) = offset {
        if !ts.is_empty() {
            ts.space();
        }
        ts.push(Token::Offset).space().push(Token::Raw(m.to_string()));
    }
    ts
}

/// Look `name` up case-insensitively in a dialect's rename table.
pub fn remap(name: &str, table: &[(&str, &'static str)]) -> Option<&'static str> {
    table
        .iter()
        .find(|(from, _)| from.eq_ignore_ascii_case(name))
        .map(|(_, to)| *to)
}

pub const POSTGRES_RENAMES: &[(&str, &str)] =
    &[("NVL", "COALESCE"), ("IFNULL", "COALESCE"), ("ISNULL", "COALESCE")];

pub const SQLITE_RENAMES: &[(&str, &str)] = &[("NVL", "IFNULL"), ("CHAR_LENGTH", "LENGTH")];

// LENGTH counts bytes in MySQL
pub const MYSQL_RENAMES: &[(&str, &str)] = &[
    ("LENGTH", "CHAR_LENGTH"),
    ("NVL", "IFNULL"),
    ("SUBSTR", "SUBSTRING"),
];
