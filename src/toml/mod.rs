//! The TOML codec: its token set, mill configuration, Pratt command table and expression
//! model.
//!
//! # Example
//! ```
//! use std::rc::Rc;
//! use token_mill::toml::{TomlExpr, TomlParser, TomlSyntax};
//!
//! let parser = TomlParser::new(Rc::new(TomlSyntax::default())).unwrap();
//! let root = parser.parse("title = \"example\"\ncount = 0x10\n").unwrap();
//! match root.get("count") {
//!     Some(TomlExpr::Int(int)) => assert_eq!(int.val, 16),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

mod grammar;
mod model;

#[cfg(test)]
mod __tests__;

use crate::{Commands, Type};
use std::rc::Rc;

pub const EOL: Type = Type::new("eol", 0);
pub const WHITESPACE: Type = Type::new("space", 0);
pub const TEXT: Type = Type::new("text", 15);
pub const INT: Type = Type::new("int", 0);
pub const EOF: Type = Type::new("eof", 0);
pub const ESCAPE: Type = Type::new("escape", 0);
pub const ESCAPED: Type = Type::new("escaped", 0);
pub const COMMENT: Type = Type::new("comment", 0);
pub const EQUALS: Type = Type::new("equals", 5);
pub const COMMA: Type = Type::new("comma", 0);
pub const DOT: Type = Type::new("dot", 40);
pub const MINUS: Type = Type::new("minus", 20);
pub const PLUS: Type = Type::new("plus", 20);
pub const COLON: Type = Type::new("colon", 25);
pub const UNDERSCORE: Type = Type::new("underscore", 30);
pub const RADIX_PREFIX: Type = Type::new("radix", 0);
pub const L_BRACKET: Type = Type::new("l-bracket", 0);
pub const R_BRACKET: Type = Type::new("r-bracket", 0);
pub const DOUBLE_L_BRACKET: Type = Type::new("ll-bracket", 0);
pub const DOUBLE_R_BRACKET: Type = Type::new("rr-bracket", 0);
pub const L_BRACE: Type = Type::new("l-brace", 0);
pub const R_BRACE: Type = Type::new("r-brace", 0);
pub const D_QUOTE: Type = Type::new("d-quote", 0);
pub const TRI_D_QUOTE: Type = Type::new("tri-d-quote", 0);
pub const S_QUOTE: Type = Type::new("s-quote", 0);
pub const TRI_S_QUOTE: Type = Type::new("tri-s-quote", 0);

#[derive(Debug, Clone)]
/// The construction parameters of a TOML document.
pub struct TomlSyntax {
    pub eol: String,
    /// Strip a leading U+FEFF.
    pub bom: bool,
    /// Treat the entire document as one implicit root table; when unset, key-value pairs
    /// are only accepted under an explicit table header.
    pub global: bool,
    /// Accept the signaling NaN literal `snan`.
    pub snan: bool,
    /// Accept the quiet NaN literals `nan` and `qnan`.
    pub qnan: bool,
}

impl Default for TomlSyntax {
    fn default() -> Self {
        Self {
            eol: "\n".to_string(),
            bom: true,
            global: true,
            snan: false,
            qnan: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// The source retained with an expression for round-trip formatting: its verbatim slice,
/// the block comment lines above it and the trailing inline comment.
pub struct Snippet {
    pub source: Option<String>,
    pub comments: Vec<String>,
    pub trailing: Option<String>,
}

#[derive(Debug, Clone)]
/// A 64-bit integer with its declared bit length.
pub struct Int {
    pub val: i64,
    pub bits: u8,
    pub radix: u32,
    pub snippet: Snippet,
}

#[derive(Debug, Clone)]
/// An IEEE-754 double.
pub struct Float {
    pub val: f64,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A calendar date; the month and day travel together.
pub struct LocalDate {
    pub year: i32,
    pub month_day: Option<(u8, u8)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A wall-clock time; the minute and second travel together, the fraction keeps its
/// digit text.
pub struct LocalTime {
    pub hour: u8,
    pub min_sec: Option<(u8, u8)>,
    pub fraction: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The tri-valued time offset, plus "none" for local date-times.
pub enum Offset {
    None,
    Z,
    Plus(u8, u8),
    Minus(u8, u8),
}

#[derive(Debug, Clone)]
/// An RFC 3339 date-time assembly: any of the four shapes, depending on which parts are
/// present.
pub struct DateTime {
    pub date: Option<LocalDate>,
    pub time: Option<LocalTime>,
    pub offset: Offset,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The quote style a text expression was written in.
pub enum QuoteStyle {
    Bare,
    Basic,
    MultiBasic,
    Literal,
    MultiLiteral,
}

#[derive(Debug, Clone)]
/// A string or bare key.
pub struct Text {
    pub val: String,
    pub quote: QuoteStyle,
    pub snippet: Snippet,
}

#[derive(Debug, Clone)]
/// A mapping from key to (key text, value) pair; `inline` distinguishes the immutable
/// `{ .. }` form from block tables.
pub struct TomlTable {
    entries: Vec<(Text, TomlExpr)>,
    pub inline: bool,
    pub snippet: Snippet,
}

#[derive(Debug, Clone)]
/// An ordered sequence; `inline` distinguishes `[ .. ]` arrays from arrays of tables.
pub struct Seq {
    pub items: Vec<TomlExpr>,
    pub inline: bool,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, PartialEq)]
/// The tagged expression variants of the TOML model.
pub enum TomlExpr {
    Int(Int),
    Float(Float),
    DateTime(DateTime),
    Text(Text),
    Table(TomlTable),
    Seq(Seq),
}

#[derive(Debug, Clone)]
/// The nodes the TOML command table produces: finished expressions plus the key-path and
/// pair shapes the document loop routes.
pub enum TomlNode {
    Expr(TomlExpr),
    Key(Vec<Text>),
    Pair(Vec<Text>, TomlExpr),
}

/// The document-level TOML parser.
pub struct TomlParser {
    syntax: Rc<TomlSyntax>,
    commands: Rc<Commands<TomlNode>>,
}
