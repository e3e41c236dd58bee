//! SQL Tokens - the atomic units of rendered statements.
//!
//! Tokens are dialect-agnostic representations that serialize
//! to dialect-specific strings.

use super::dialect::{Dialect, SqlDialect};

/// SQL Token - every element a rendered statement is made of.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    Cross,
    GroupBy,
    Having,
    OrderBy,
    Asc,
    Desc,
    NullsFirst,
    NullsLast,
    Limit,
    Offset,
    Case,
    When,
    Then,
    Else,
    End,
    In,
    Between,
    Like,
    Escape,
    Cast,
    IsNull,
    IsNotNull,
    Distinct,
    Null,

    // === DDL / DML Keywords ===
    Create,
    Table,
    IfNotExists,
    PrimaryKey,
    NotNull,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Integer literal
    LitInt(i64),
    /// Float literal
    LitFloat(f64),
    /// String literal
    LitString(String),
    /// Boolean literal
    LitBool(bool),
    /// NULL literal
    LitNull,
    /// Positional bind parameter, 1-based.
    Placeholder(usize),

    /// Function name, remapped per dialect.
    FunctionName(String),

    /// Raw SQL passed directly to output without escaping.
    ///
    /// Only for fixed fragments chosen by a dialect (type names, sentinel
    /// limits). Never for values that come from a caller.
    Raw(String),
}

impl Token {
    /// Fixed spelling shared by every dialect, `None` for tokens whose
    /// text depends on the dialect or on a payload.
    pub fn keyword(&self) -> Option<&'static str> {
        let text = match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::As => "AS",
            Self::On => "ON",
            Self::Join => "JOIN",
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Cross => "CROSS",
            Self::GroupBy => "GROUP BY",
            Self::Having => "HAVING",
            Self::OrderBy => "ORDER BY",
            Self::Asc => "ASC",
            Self::Desc => "DESC",
            Self::NullsFirst => "NULLS FIRST",
            Self::NullsLast => "NULLS LAST",
            Self::Limit => "LIMIT",
            Self::Offset => "OFFSET",
            Self::Case => "CASE",
            Self::When => "WHEN",
            Self::Then => "THEN",
            Self::Else => "ELSE",
            Self::End => "END",
            Self::In => "IN",
            Self::Between => "BETWEEN",
            Self::Like => "LIKE",
            Self::Escape => "ESCAPE",
            Self::Cast => "CAST",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Distinct => "DISTINCT",
            Self::Null => "NULL",
            Self::Create => "CREATE",
            Self::Table => "TABLE",
            Self::IfNotExists => "IF NOT EXISTS",
            Self::PrimaryKey => "PRIMARY KEY",
            Self::NotNull => "NOT NULL",
            Self::Insert => "INSERT",
            Self::Into => "INTO",
            Self::Values => "VALUES",
            Self::Update => "UPDATE",
            Self::Set => "SET",
            Self::Delete => "DELETE",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Star => "*",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Space => " ",
            Self::Newline => "\n",
            Self::LitNull => "NULL",
            _ => return None,
        };
        Some(text)
    }

    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        if let Some(text) = self.keyword() {
            return text.to_string();
        }
        match self {
            Token::Concat => dialect.concat_operator().into(),
            Token::Indent(n) => "  ".repeat(*n),
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::LitInt(n) => n.to_string(),
            Token::LitFloat(f) => {
                if !f.is_finite() {
                    panic!("non-finite float {f} has no SQL literal")
                }
                ryu::Buffer::new().format(*f).to_string()
            }
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).into(),
            Token::Placeholder(n) => dialect.placeholder(*n),
            Token::FunctionName(name) => match dialect.remap_function(name) {
                Some(renamed) => renamed.to_string(),
                None => name.to_uppercase(),
            },
            Token::Raw(s) => s.clone(),
            other => unreachable!("{other:?} has a fixed spelling"),
        }
    }
}

/// An ordered run of tokens, rendered in one pass per dialect.
///
/// Builders push onto a stream and splice sub-streams in with
/// [`append`](TokenStream::append); nothing is rendered until
/// [`serialize`](TokenStream::serialize).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.extend(other.tokens.iter().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn serialize(&self, dialect: Dialect) -> String {
        let mut out = String::with_capacity(self.tokens.len() * 6);
        for token in &self.tokens {
            out.push_str(&token.serialize(dialect));
        }
        out
    }

    // Layout and punctuation shorthands
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, depth: usize) -> &mut Self {
        self.push(Token::Indent(depth))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }

    /// Wrap `inner` in parentheses.
    pub fn parenthesized(&mut self, inner: &TokenStream) -> &mut Self {
        self.lparen().append(inner).rparen()
    }
}
