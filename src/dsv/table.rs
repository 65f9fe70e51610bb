use super::{Cell, CellIndex, DsvSyntax, Row, RowSymmetry, Table};
use crate::format::{insert_path, JsonSink, Step, TextSink};
use crate::DataError;
use ptree::TreeItem;
use serde_json::Value;
use std::rc::Rc;

impl Table {
    pub fn new(syntax: Rc<DsvSyntax>) -> Self {
        Self {
            rows: Vec::new(),
            syntax,
        }
    }

    /// A table whose header row is built from the given names.
    pub fn with_header(header: Vec<String>, syntax: Rc<DsvSyntax>) -> Self {
        let cells = header.iter().map(|h| Cell::from_value(h)).collect();
        let mut table = Self::new(syntax);
        table.rows.push(Row::from_cells(cells));
        table.reindex();
        table
    }

    pub fn syntax(&self) -> &Rc<DsvSyntax> {
        &self.syntax
    }

    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn header_values(&self) -> Vec<String> {
        match self.header() {
            Some(row) => row
                .iter()
                .map(|c| c.value(&self.syntax).unwrap_or_default())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Total number of rows, the header included.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns the header declares.
    pub fn width(&self) -> usize {
        self.header().map_or(0, |h| h.len())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn reindex(&mut self) {
        for (r, row) in self.rows.iter_mut().enumerate() {
            for (c, cell) in row.cells_mut().iter_mut().enumerate() {
                cell.set_index(r, c);
            }
        }
    }

    fn row_at(&self, row: usize) -> Result<&Row, DataError> {
        self.rows
            .get(row)
            .ok_or_else(|| DataError::expression(format!("Row {} is out of bounds.", row)))
    }

    fn asymmetric(&self, row: &Row) -> DataError {
        let message = format!(
            "Row holds {} cells but the header declares {}.",
            row.len(),
            self.width()
        );
        match row.position() {
            Some(at) => DataError::expression_at(at, message),
            None => DataError::expression(message),
        }
    }

    /// Append a parsed or constructed row.
    pub fn append_row(&mut self, row: Row) {
        self.rows.push(row);
        self.reindex();
    }

    /// Append a single cell as a one-cell row.
    pub fn append_cell(&mut self, cell: Cell) {
        self.append_row(Row::from_cell(cell));
    }

    /// Remove a row, shifting higher rows down.
    pub fn delete_row(&mut self, row: usize) -> Result<Row, DataError> {
        if row >= self.rows.len() {
            return Err(DataError::expression(format!(
                "Row {} is out of bounds.",
                row
            )));
        }
        let removed = self.rows.remove(row);
        self.reindex();
        Ok(removed)
    }

    /// Remove a column, shifting higher columns left.
    pub fn delete_col(&mut self, col: usize) -> Result<Vec<Cell>, DataError> {
        if col >= self.width() {
            return Err(DataError::expression(format!(
                "Column {} is out of bounds.",
                col
            )));
        }
        let mut removed = Vec::new();
        for row in &mut self.rows {
            if col < row.len() {
                removed.push(row.cells_mut().remove(col));
            }
        }
        self.reindex();
        Ok(removed)
    }

    /// Append one column; missing cells are filled with nulls, surplus cells are dropped.
    pub fn append_col(&mut self, cells: Vec<Cell>) {
        let mut cells = cells.into_iter();
        for row in &mut self.rows {
            row.append(cells.next().unwrap_or_else(Cell::null));
        }
        self.reindex();
    }

    pub fn read_cell(&self, row: usize, col: usize) -> Result<&Cell, DataError> {
        self.row_at(row)?.get(col).ok_or_else(|| {
            DataError::expression(format!("Cell ({}, {}) is out of bounds.", row, col))
        })
    }

    /// The resolved value at an address; `None` for a null cell.
    pub fn read_value(&self, row: usize, col: usize) -> Result<Option<String>, DataError> {
        Ok(self.read_cell(row, col)?.value(&self.syntax))
    }

    /// Exchange the cell at an address, returning the prior one.
    pub fn replace_cell(&mut self, row: usize, col: usize, cell: Cell) -> Result<Cell, DataError> {
        let width = self.rows.get(row).map_or(0, |r| r.len());
        if col >= width {
            return Err(DataError::expression(format!(
                "Cell ({}, {}) is out of bounds.",
                row, col
            )));
        }
        let prior = self.rows[row].replace(col, cell).unwrap();
        self.reindex();
        Ok(prior)
    }

    /// Exchange two cells; both addresses must be live.
    pub fn swap(&mut self, a: CellIndex, b: CellIndex) -> Result<(), DataError> {
        let first = self.read_cell(a.row, a.col)?.clone();
        let second = self.read_cell(b.row, b.col)?.clone();
        self.rows[a.row].replace(a.col, second);
        self.rows[b.row].replace(b.col, first);
        self.reindex();
        Ok(())
    }

    /// Merge two columns; the merger decides the resulting cell, which lands in `c1` while
    /// `c2` is deleted.
    pub fn merge_cols<F: Fn(&Cell, &Cell) -> Cell>(
        &mut self,
        c1: usize,
        c2: usize,
        merger: F,
    ) -> Result<(), DataError> {
        if c1 >= self.width() || c2 >= self.width() || c1 == c2 {
            return Err(DataError::expression(format!(
                "Columns ({}, {}) cannot be merged.",
                c1, c2
            )));
        }
        for row in &mut self.rows {
            let left = row.get(c1).cloned().unwrap_or_else(Cell::null);
            let right = row.get(c2).cloned().unwrap_or_else(Cell::null);
            let merged = merger(&left, &right);
            if c1 < row.len() {
                row.replace(c1, merged);
            } else {
                while row.len() < c1 {
                    row.append(Cell::null());
                }
                row.append(merged);
            }
        }
        self.delete_col(c2)?;
        Ok(())
    }

    /// Merge two rows cell-wise; the result lands in `r1` while `r2` is deleted.
    pub fn merge_rows<F: Fn(&Cell, &Cell) -> Cell>(
        &mut self,
        r1: usize,
        r2: usize,
        merger: F,
    ) -> Result<(), DataError> {
        if r1 >= self.rows.len() || r2 >= self.rows.len() || r1 == r2 {
            return Err(DataError::expression(format!(
                "Rows ({}, {}) cannot be merged.",
                r1, r2
            )));
        }
        let width = self.rows[r1].len().max(self.rows[r2].len());
        let mut merged = Row::new();
        for col in 0..width {
            let left = self.rows[r1].get(col).cloned().unwrap_or_else(Cell::null);
            let right = self.rows[r2].get(col).cloned().unwrap_or_else(Cell::null);
            merged.append(merger(&left, &right));
        }
        self.rows[r1] = merged;
        self.delete_row(r2)?;
        Ok(())
    }

    /// Row-concatenate another table; the header of `other` is discarded.
    pub fn merge_table(&mut self, other: Table) {
        let mut rows = other.rows.into_iter();
        rows.next();
        self.rows.extend(rows);
        self.reindex();
    }

    /// Split a row in two; the splitter yields the pair replacing each cell, distributed
    /// over the two resulting rows.
    pub fn split_row<F: Fn(&Cell) -> (Cell, Cell)>(
        &mut self,
        row: usize,
        splitter: F,
    ) -> Result<(), DataError> {
        if row >= self.rows.len() {
            return Err(DataError::expression(format!(
                "Row {} is out of bounds.",
                row
            )));
        }
        let mut upper = Row::new();
        let mut lower = Row::new();
        for cell in self.rows[row].iter() {
            let (a, b) = splitter(cell);
            upper.append(a);
            lower.append(b);
        }
        self.rows[row] = upper;
        self.rows.insert(row + 1, lower);
        self.reindex();
        Ok(())
    }

    /// Split a column in two, as [split_row](Table::split_row) but column-wise.
    pub fn split_col<F: Fn(&Cell) -> (Cell, Cell)>(
        &mut self,
        col: usize,
        splitter: F,
    ) -> Result<(), DataError> {
        if col >= self.width() {
            return Err(DataError::expression(format!(
                "Column {} is out of bounds.",
                col
            )));
        }
        for row in &mut self.rows {
            if col < row.len() {
                let (a, b) = splitter(row.get(col).unwrap());
                row.replace(col, a);
                row.insert(col + 1, b);
            }
        }
        self.reindex();
        Ok(())
    }

    /// Mirror the table across the main diagonal, or the anti diagonal when `anti` is set.
    /// Applying the same transpose twice is the identity.
    pub fn transpose(&mut self, anti: bool) {
        let height = self.rows.len();
        let width = self.rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut rows: Vec<Row> = Vec::with_capacity(width);
        for c in 0..width {
            let mut row = Row::new();
            for r in 0..height {
                let (sr, sc) = if anti {
                    (height - 1 - r, width - 1 - c)
                } else {
                    (r, c)
                };
                let cell = self.rows[sr].get(sc).cloned().unwrap_or_else(Cell::null);
                row.append(cell);
            }
            rows.push(row);
        }
        self.rows = rows;
        self.reindex();
    }

    /// Reverse the row order, or the column order when `columns` is set.
    pub fn flip(&mut self, columns: bool) {
        if columns {
            for row in &mut self.rows {
                row.cells_mut().reverse();
            }
        } else {
            self.rows.reverse();
        }
        self.reindex();
    }

    fn filled(&self, row: &Row) -> Result<Vec<Option<String>>, DataError> {
        let width = self.width().max(row.len());
        if row.len() < self.width() && self.syntax.symmetry == RowSymmetry::Throw {
            return Err(self.asymmetric(row));
        }
        let mut out = Vec::with_capacity(width);
        for col in 0..width {
            match row.get(col) {
                Some(cell) => out.push(cell.value(&self.syntax)),
                None => out.push(match self.syntax.symmetry {
                    RowSymmetry::Empty => Some(String::new()),
                    _ => None,
                }),
            }
        }
        Ok(out)
    }

    /// All data rows as strings, missing and null cells filled per the symmetry policy.
    pub fn read_all(&self) -> Result<Vec<Vec<String>>, DataError> {
        let mut out = Vec::new();
        for row in self.rows.iter().skip(1) {
            out.push(
                self.filled(row)?
                    .into_iter()
                    .map(|v| v.unwrap_or_default())
                    .collect(),
            );
        }
        Ok(out)
    }

    /// All data rows with nulls preserved.
    pub fn read_options(&self) -> Result<Vec<Vec<Option<String>>>, DataError> {
        self.rows.iter().skip(1).map(|r| self.filled(r)).collect()
    }

    /// Render the table back to delimited text in source order.
    pub fn format_text(&self, sink: &mut TextSink) {
        for row in &self.rows {
            for (col, cell) in row.iter().enumerate() {
                if col > 0 {
                    sink.append(&self.syntax.delimiter);
                }
                sink.append(&cell.render(&self.syntax));
            }
            sink.append(&self.syntax.eol);
        }
    }

    fn header_path(&self, name: &str) -> Vec<Step> {
        let segments: Vec<&str> = match self.syntax.nop {
            Some(nop) => name.split(nop).collect(),
            None => vec![name],
        };
        let mut steps = Vec::new();
        for segment in segments {
            match self.syntax.nap {
                Some(nap) => {
                    let mut parts = segment.split(nap);
                    if let Some(key) = parts.next() {
                        if !key.is_empty() {
                            steps.push(Step::Key(key.to_string()));
                        }
                    }
                    for part in parts {
                        match part.parse::<usize>() {
                            Ok(index) => steps.push(Step::Index(index)),
                            Err(_) => steps.push(Step::Key(part.to_string())),
                        }
                    }
                }
                None => steps.push(Step::Key(segment.to_string())),
            }
        }
        if steps.is_empty() {
            steps.push(Step::Key(name.to_string()));
        }
        steps
    }

    /// Emit the data rows to a JSON sink, reconstructing the tree the nested-header
    /// operators describe; empty cells become null leaves.
    pub fn format_json(&self, sink: &mut JsonSink) -> Result<(), DataError> {
        let paths: Vec<Vec<Step>> = self
            .header_values()
            .iter()
            .map(|name| self.header_path(name))
            .collect();
        for row in self.rows.iter().skip(1) {
            let values = self.filled(row)?;
            let mut root = Value::Object(serde_json::Map::new());
            for (col, value) in values.into_iter().enumerate() {
                let leaf = match value {
                    Some(v) if !v.is_empty() => Value::String(v),
                    Some(_) => Value::Null,
                    None => Value::Null,
                };
                match paths.get(col) {
                    Some(path) => insert_path(&mut root, path, leaf),
                    None => insert_path(
                        &mut root,
                        &[Step::Key(format!("{}", col))],
                        leaf,
                    ),
                }
            }
            sink.append(root);
        }
        Ok(())
    }

    /// Print the table as a tree (debugging).
    pub fn print(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(self)
    }
}

impl std::fmt::Display for Table {
    /// Best-effort round-trip rendering.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sink = TextSink::pretty();
        self.format_text(&mut sink);
        write!(f, "{}", sink.data())
    }
}

impl TreeItem for Cell {
    type Child = Cell;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{:?}", self.chain().raw())
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        std::borrow::Cow::from(Vec::new())
    }
}

impl TreeItem for Row {
    type Child = Cell;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        write!(f, "row # {} cells", self.len())
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        std::borrow::Cow::from(self.cells.clone())
    }
}

impl TreeItem for Table {
    type Child = Row;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        write!(f, "table # {} x {}", self.height(), self.width())
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        std::borrow::Cow::from(self.rows.clone())
    }
}
