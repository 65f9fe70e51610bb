//! The delimiter-separated-values codec: its token set, mill configuration, Pratt command
//! table and tabular data model.
//!
//! # Example
//! ```
//! use std::rc::Rc;
//! use token_mill::dsv::{DsvParser, DsvSyntax};
//!
//! let syntax = Rc::new(DsvSyntax::new(";", "\n"));
//! let parser = DsvParser::new(syntax).unwrap();
//! let table = parser.parse("a;b\n1;2\n3;4\n").unwrap();
//! assert_eq!(table.height(), 3);
//! assert_eq!(table.read_value(1, 1).unwrap(), Some("2".to_string()));
//! ```

mod cell;
mod chain;
mod grammar;
mod table;

#[cfg(test)]
mod __tests__;

use crate::{Commands, EscapeScheme, Position, Type};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

pub const SEPARATOR: Type = Type::new("sep", 10);
pub const EOL: Type = Type::new("eol", 0);
pub const WHITESPACE: Type = Type::new("space", 0);
pub const TEXT: Type = Type::new("text", 0);
pub const INT: Type = Type::new("int", 0);
pub const L_QUOTE: Type = Type::new("l-quote", 0);
pub const R_QUOTE: Type = Type::new("r-quote", 0);
pub const ESCAPE: Type = Type::new("escape", 0);
pub const ESCAPED: Type = Type::new("escaped", 0);
pub const EOF: Type = Type::new("eof", 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Policy for reading rows shorter than the header row.
pub enum RowSymmetry {
    /// Missing cells read as empty strings.
    Empty,
    /// Missing cells read as nulls.
    Null,
    /// A short row is an error carrying the offending row's line.
    Throw,
}

impl Default for RowSymmetry {
    fn default() -> Self {
        RowSymmetry::Empty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The (row, column) address of a cell.
pub struct CellIndex {
    pub row: usize,
    pub col: usize,
}

/// A cell-scoped value transformation applied on read.
pub type CellHook = dyn Fn(&CellIndex, &DsvSyntax, &str) -> String;

/// A user override resolving a raw escape (operator included) into its replacement.
pub type EscapeHook = dyn Fn(&str) -> Option<String>;

#[derive(Clone)]
/// The construction parameters of a DSV document: delimiter, line terminator, quoting,
/// escape encodings, whitespace policy and the read hooks.
pub struct DsvSyntax {
    pub delimiter: String,
    pub eol: String,
    /// Strip a leading U+FEFF.
    pub bom: bool,
    /// The configured header; empty means the first row becomes the header.
    pub header: Vec<String>,
    /// The opening and closing quote; `None` makes quote characters literal.
    pub quotes: Option<(String, String)>,
    /// Reject unquoted whitespace the spaces policy does not allow.
    pub strict: bool,
    pub leading_spaces: bool,
    pub trailing_spaces: bool,
    pub escapes: Vec<EscapeScheme>,
    pub escape_hook: Option<Rc<EscapeHook>>,
    /// The nested-object operator in header names.
    pub nop: Option<char>,
    /// The nested-array operator in header names.
    pub nap: Option<char>,
    pub parse_hook: Option<Rc<CellHook>>,
    pub symmetry: RowSymmetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How one fragment of a cell's text chain is interpreted.
pub enum FragmentKind {
    /// Unquoted source text.
    Plain,
    /// Text inside a quoted section, taken verbatim.
    Raw,
    /// A raw escape (operator included), resolved on read.
    Escaped,
    /// The opening quote mark.
    FieldStart,
    /// The closing quote mark.
    FieldEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One fragment of a cell's text chain.
pub struct Fragment {
    pub text: String,
    pub kind: FragmentKind,
    next: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The forward-linked series of text fragments making up one cell, stored as an arena
/// with integer next-links.
pub struct Chain {
    fragments: Vec<Fragment>,
    head: Option<usize>,
    tail: Option<usize>,
}

#[derive(Clone)]
/// A single table cell: a text chain, its address, and the cell-scoped read hooks.
pub struct Cell {
    chain: Chain,
    index: CellIndex,
    position: Option<Position>,
    parsers: Vec<Rc<CellHook>>,
}

#[derive(Debug, Clone)]
/// An ordered sequence of cells.
pub struct Row {
    cells: Vec<Cell>,
}

#[derive(Clone)]
/// The 2D collection of parsed rows; row 0 is reserved for the header.
pub struct Table {
    rows: Vec<Row>,
    syntax: Rc<DsvSyntax>,
}

#[derive(Debug, Clone)]
/// The expressions the DSV command table produces.
pub enum DsvNode {
    Cell(Cell),
    Row(Row),
}

/// The document-level DSV parser: builds the mill, applies the `Sep=` override and drives
/// the Pratt loop one row at a time.
pub struct DsvParser {
    syntax: Rc<DsvSyntax>,
    commands: Rc<Commands<DsvNode>>,
}

impl Debug for DsvSyntax {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsvSyntax")
            .field("delimiter", &self.delimiter)
            .field("eol", &self.eol)
            .field("quotes", &self.quotes)
            .field("strict", &self.strict)
            .field("symmetry", &self.symmetry)
            .finish()
    }
}

impl Debug for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("chain", &self.chain)
            .field("index", &self.index)
            .finish()
    }
}

impl Debug for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("rows", &self.rows).finish()
    }
}

impl CellIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}
