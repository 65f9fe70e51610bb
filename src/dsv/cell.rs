use super::{Cell, CellHook, CellIndex, Chain, DsvSyntax, FragmentKind, Row};
use crate::Position;
use std::rc::Rc;

impl Cell {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            index: CellIndex::new(0, 0),
            position: None,
            parsers: Vec::new(),
        }
    }

    /// The null cell: an empty field between two delimiters.
    pub fn null() -> Self {
        Self::new(Chain::new())
    }

    /// A cell built from a plain value.
    pub fn from_value(value: &str) -> Self {
        let mut chain = Chain::new();
        chain.push(value.to_string(), FragmentKind::Plain);
        Self::new(chain)
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub(crate) fn set_index(&mut self, row: usize, col: usize) {
        self.index = CellIndex::new(row, col);
    }

    /// The (row, col) address of the cell within its table.
    pub fn index(&self) -> CellIndex {
        self.index
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Attach a cell-scoped read hook.
    pub fn add_parser(&mut self, hook: Rc<CellHook>) {
        self.parsers.push(hook);
    }

    pub fn is_null(&self) -> bool {
        self.chain.is_empty()
    }

    /// The resolved value of the cell; `None` for the null cell.
    ///
    /// Unquoted content is trimmed on the sides the spaces policy disallows, escapes are
    /// resolved, and the syntax-level then cell-scoped read hooks are applied.
    pub fn value(&self, syntax: &DsvSyntax) -> Option<String> {
        if self.chain.is_empty() {
            return None;
        }
        let mut out = self.chain.text(syntax);
        if !self.chain.quoted() {
            if !syntax.leading_spaces {
                out = out.trim_start().to_string();
            }
            if !syntax.trailing_spaces {
                out = out.trim_end().to_string();
            }
        }
        if let Some(hook) = &syntax.parse_hook {
            out = hook(&self.index, syntax, &out);
        }
        for hook in &self.parsers {
            out = hook(&self.index, syntax, &out);
        }
        Some(out)
    }

    /// Render the cell back to source form.
    ///
    /// A parsed cell reproduces its verbatim source; a constructed cell is quoted and
    /// escape-doubled when its value requires it.
    pub fn render(&self, syntax: &DsvSyntax) -> String {
        if self.chain.quoted() || self.chain.iter().any(|f| f.kind == FragmentKind::Escaped) {
            return self.chain.raw();
        }
        let text = self.chain.raw();
        let needs_quotes = match &syntax.quotes {
            Some((open, _)) if !open.is_empty() => {
                text.contains(&syntax.delimiter)
                    || text.contains(&syntax.eol)
                    || text.contains(open.as_str())
            }
            _ => false,
        };
        if !needs_quotes {
            return text;
        }
        let (open, close) = syntax.quotes.as_ref().unwrap();
        let inner = text.replace(close.as_str(), &close.repeat(2));
        format!("{}{}{}", open, inner, close)
    }
}

impl Row {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    pub fn from_cell(cell: Cell) -> Self {
        Self { cells: vec![cell] }
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn append(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn prepend(&mut self, cell: Cell) {
        self.cells.insert(0, cell);
    }

    pub fn insert(&mut self, at: usize, cell: Cell) {
        let at = at.min(self.cells.len());
        self.cells.insert(at, cell);
    }

    /// Exchange the cell at `at`, returning the prior one.
    pub fn replace(&mut self, at: usize, cell: Cell) -> Option<Cell> {
        if at < self.cells.len() {
            Some(std::mem::replace(&mut self.cells[at], cell))
        } else {
            None
        }
    }

    /// Concatenate another row's cells onto this one.
    pub fn merge(&mut self, other: Row) {
        self.cells.extend(other.cells);
    }

    pub fn get(&self, at: usize) -> Option<&Cell> {
        self.cells.get(at)
    }

    pub fn get_mut(&mut self, at: usize) -> Option<&mut Cell> {
        self.cells.get_mut(at)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub(crate) fn cells_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.cells
    }

    /// Position of the row's first positioned cell.
    pub fn position(&self) -> Option<Position> {
        self.cells.iter().find_map(|c| c.position())
    }
}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}
