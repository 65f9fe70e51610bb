use crate::dsv::{Cell, CellIndex, DsvParser, DsvSyntax, Row, Table};
use std::rc::Rc;

fn sample() -> Table {
    DsvParser::new(Rc::new(DsvSyntax::new(",", "\n")))
        .unwrap()
        .parse("h1,h2,h3\na,b,c\nd,e,f\n")
        .unwrap()
}

fn values(table: &Table) -> Vec<Vec<String>> {
    table.read_all().unwrap()
}

#[test]
fn cells_expose_their_index() {
    let table = sample();
    assert_eq!(table.read_cell(1, 2).unwrap().index(), CellIndex::new(1, 2));
    assert_eq!(table.read_cell(2, 0).unwrap().index(), CellIndex::new(2, 0));
}

#[test]
fn transposing_twice_is_the_identity() {
    let mut table = sample();
    let before = values(&table);
    table.transpose(false);
    table.transpose(false);
    assert_eq!(values(&table), before);

    table.transpose(true);
    table.transpose(true);
    assert_eq!(values(&table), before);
}

#[test]
fn transpose_mirrors_across_the_diagonal() {
    let mut table = sample();
    table.transpose(false);
    assert_eq!(table.header_values(), vec!["h1", "a", "d"]);
    assert_eq!(
        values(&table),
        vec![
            vec!["h2".to_string(), "b".to_string(), "e".to_string()],
            vec!["h3".to_string(), "c".to_string(), "f".to_string()],
        ]
    );
}

#[test]
fn flip_reverses_row_or_column_order() {
    let mut table = sample();
    table.flip(false);
    assert_eq!(table.header_values(), vec!["d", "e", "f"]);
    table.flip(false);
    let mut table = sample();
    table.flip(true);
    assert_eq!(table.header_values(), vec!["h3", "h2", "h1"]);
}

#[test]
fn swap_exchanges_two_live_cells() {
    let mut table = sample();
    table
        .swap(CellIndex::new(1, 0), CellIndex::new(2, 2))
        .unwrap();
    assert_eq!(table.read_value(1, 0).unwrap(), Some("f".to_string()));
    assert_eq!(table.read_value(2, 2).unwrap(), Some("a".to_string()));
    assert!(table
        .swap(CellIndex::new(1, 0), CellIndex::new(9, 9))
        .is_err());
}

#[test]
fn replace_cell_returns_the_prior_one() {
    let mut table = sample();
    let syntax = Rc::clone(table.syntax());
    let prior = table
        .replace_cell(1, 1, Cell::from_value("B"))
        .unwrap();
    assert_eq!(prior.value(&syntax), Some("b".to_string()));
    assert_eq!(table.read_value(1, 1).unwrap(), Some("B".to_string()));
}

#[test]
fn row_and_column_deletion_shift_the_rest() {
    let mut table = sample();
    table.delete_row(1).unwrap();
    assert_eq!(values(&table), vec![vec!["d", "e", "f"]]);

    let mut table = sample();
    table.delete_col(1).unwrap();
    assert_eq!(table.header_values(), vec!["h1", "h3"]);
    assert_eq!(
        values(&table),
        vec![vec!["a".to_string(), "c".to_string()], vec![
            "d".to_string(),
            "f".to_string()
        ]]
    );
}

#[test]
fn appended_columns_fill_missing_cells_with_nulls() {
    let mut table = sample();
    table.append_col(vec![
        Cell::from_value("h4"),
        Cell::from_value("x"),
    ]);
    assert_eq!(table.header_values(), vec!["h1", "h2", "h3", "h4"]);
    assert_eq!(table.read_value(2, 3).unwrap(), None);
}

#[test]
fn merge_and_split_are_symmetric_enough() {
    let mut table = sample();
    let syntax = Rc::clone(table.syntax());
    let merge_syntax = Rc::clone(&syntax);
    table
        .merge_cols(0, 1, move |left, right| {
            let mut joined = left.value(&merge_syntax).unwrap_or_default();
            joined.push_str(&right.value(&merge_syntax).unwrap_or_default());
            Cell::from_value(&joined)
        })
        .unwrap();
    assert_eq!(table.header_values(), vec!["h1h2", "h3"]);
    assert_eq!(
        values(&table),
        vec![
            vec!["ab".to_string(), "c".to_string()],
            vec!["de".to_string(), "f".to_string()]
        ]
    );

    let split_syntax = Rc::clone(&syntax);
    table
        .split_col(0, move |cell| {
            let joined = cell.value(&split_syntax).unwrap_or_default();
            let head: String = joined.chars().take(1).collect();
            let tail: String = joined.chars().skip(1).collect();
            (Cell::from_value(&head), Cell::from_value(&tail))
        })
        .unwrap();
    assert_eq!(table.header_values(), vec!["h", "1h2", "h3"]);
}

#[test]
fn merge_rows_and_split_rows() {
    let mut table = sample();
    let syntax = Rc::clone(table.syntax());
    let merge_syntax = Rc::clone(&syntax);
    table
        .merge_rows(1, 2, move |a, b| {
            let mut joined = a.value(&merge_syntax).unwrap_or_default();
            joined.push_str(&b.value(&merge_syntax).unwrap_or_default());
            Cell::from_value(&joined)
        })
        .unwrap();
    assert_eq!(values(&table), vec![vec!["ad", "be", "cf"]]);

    table
        .split_row(1, |cell| {
            (cell.clone(), Cell::from_value("-"))
        })
        .unwrap();
    assert_eq!(
        values(&table),
        vec![
            vec!["ad".to_string(), "be".to_string(), "cf".to_string()],
            vec!["-".to_string(), "-".to_string(), "-".to_string()]
        ]
    );
}

#[test]
fn merging_tables_discards_the_other_header() {
    let mut table = sample();
    let other = DsvParser::new(Rc::new(DsvSyntax::new(",", "\n")))
        .unwrap()
        .parse("x1,x2,x3\ng,h,i\n")
        .unwrap();
    table.merge_table(other);
    assert_eq!(table.height(), 4);
    assert_eq!(
        values(&table).last().unwrap(),
        &vec!["g".to_string(), "h".to_string(), "i".to_string()]
    );
}

#[test]
fn constructed_rows_render_with_quoting() {
    let syntax = Rc::new(DsvSyntax::new(",", "\n"));
    let mut table = Table::with_header(
        vec!["k".to_string()],
        Rc::clone(&syntax),
    );
    table.append_row(Row::from_cell(Cell::from_value("a,b")));
    let mut sink = crate::format::TextSink::pretty();
    table.format_text(&mut sink);
    assert_eq!(sink.data(), "k\n\"a,b\"\n");
}

#[test]
fn cell_scoped_parsers_apply_after_the_syntax_hook() {
    let table = sample();
    let syntax = Rc::clone(table.syntax());
    let mut cell = table.read_cell(1, 0).unwrap().clone();
    cell.add_parser(Rc::new(|_, _, raw| format!("<{}>", raw)));
    assert_eq!(cell.value(&syntax), Some("<a>".to_string()));
}
