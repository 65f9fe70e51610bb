use crate::dsv::{DsvParser, DsvSyntax, RowSymmetry};
use crate::format::{JsonSink, TextSink};
use crate::DataError;
use serde_json::json;
use std::rc::Rc;

fn parser(syntax: DsvSyntax) -> DsvParser {
    DsvParser::new(Rc::new(syntax)).unwrap()
}

#[test]
fn quoted_cells_with_embedded_separator_and_empty_field() {
    let source = "jan,feb,mar\n\"a\",\"\",\"b,b\"\n";
    let table = parser(DsvSyntax::new(",", "\n")).parse(source).unwrap();

    assert_eq!(table.height(), 2);
    assert_eq!(table.header_values(), vec!["jan", "feb", "mar"]);
    assert_eq!(
        table.read_options().unwrap(),
        vec![vec![
            Some("a".to_string()),
            Some("".to_string()),
            Some("b,b".to_string())
        ]]
    );

    let mut sink = TextSink::pretty();
    table.format_text(&mut sink);
    assert_eq!(sink.data(), source);
}

#[test]
fn empty_field_between_delimiters_is_null() {
    let table = parser(DsvSyntax::new(",", "\n"))
        .parse("a,b,c\nx,,z\n")
        .unwrap();
    assert_eq!(
        table.read_options().unwrap(),
        vec![vec![Some("x".to_string()), None, Some("z".to_string())]]
    );
    assert_eq!(
        table.read_all().unwrap(),
        vec![vec!["x".to_string(), "".to_string(), "z".to_string()]]
    );
}

#[test]
fn leading_and_trailing_empty_fields() {
    let table = parser(DsvSyntax::new(",", "\n"))
        .parse("a,b,c\n,m,\n")
        .unwrap();
    assert_eq!(
        table.read_options().unwrap(),
        vec![vec![None, Some("m".to_string()), None]]
    );
}

#[test]
fn doubled_quotes_resolve_on_read() {
    let table = parser(DsvSyntax::new(",", "\n"))
        .parse("k\n\"a\"\"b\"\n")
        .unwrap();
    assert_eq!(table.read_value(1, 0).unwrap(), Some("a\"b".to_string()));
}

#[test]
fn quoted_line_terminator_stays_in_the_cell() {
    let table = parser(DsvSyntax::new(",", "\n"))
        .parse("h,i\n\"1\n2\",3\n4,5\n")
        .unwrap();
    assert_eq!(table.read_value(1, 0).unwrap(), Some("1\n2".to_string()));
    assert_eq!(table.read_value(2, 1).unwrap(), Some("5".to_string()));
}

#[test]
fn self_describing_separator_overrides_the_delimiter() {
    let table = parser(DsvSyntax::new(",", "\n"))
        .parse("Sep=;\nx;y\n1;2\n")
        .unwrap();
    assert_eq!(table.header_values(), vec!["x", "y"]);
    assert_eq!(table.read_value(1, 1).unwrap(), Some("2".to_string()));
}

#[test]
fn configured_header_keeps_the_first_row_as_data() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.header = vec!["left".to_string(), "right".to_string()];
    let table = parser(syntax).parse("1,2\n3,4\n").unwrap();
    assert_eq!(table.header_values(), vec!["left", "right"]);
    assert_eq!(table.height(), 3);
    assert_eq!(table.read_value(1, 0).unwrap(), Some("1".to_string()));
}

#[test]
fn short_rows_throw_when_configured() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.symmetry = RowSymmetry::Throw;
    let err = parser(syntax).parse("a,b,c\n1,2\n").unwrap_err();
    match err {
        DataError::Syntax { position, .. } => assert_eq!(position.line, 2),
        other => panic!("expected a syntax error, got {}", other),
    }
}

#[test]
fn short_rows_fill_as_nulls_when_configured() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.symmetry = RowSymmetry::Null;
    let table = parser(syntax).parse("a,b,c\n1,2\n").unwrap();
    assert_eq!(
        table.read_options().unwrap(),
        vec![vec![Some("1".to_string()), Some("2".to_string()), None]]
    );
}

#[test]
fn strict_mode_rejects_disallowed_leading_whitespace() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.strict = true;
    syntax.leading_spaces = false;
    let err = parser(syntax).parse("a,b\n x,y\n").unwrap_err();
    assert!(matches!(err, DataError::Syntax { .. }), "got {}", err);
}

#[test]
fn lenient_mode_trims_disallowed_whitespace() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.leading_spaces = false;
    let table = parser(syntax).parse("a,b\n x,y\n").unwrap();
    assert_eq!(table.read_value(1, 0).unwrap(), Some("x".to_string()));
}

#[test]
fn nested_header_projection_to_json() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.nop = Some('.');
    syntax.nap = Some('#');
    let table = parser(syntax).parse("a,b.c,b.d#0,b.d#1\n1,2,3,4\n").unwrap();

    let mut sink = JsonSink::new();
    table.format_json(&mut sink).unwrap();
    assert_eq!(
        sink.data(),
        json!({"a": "1", "b": {"c": "2", "d": ["3", "4"]}})
    );
}

#[test]
fn projection_turns_empty_cells_into_null_leaves() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.nop = Some('.');
    let table = parser(syntax).parse("a,b.c\n1,\n").unwrap();
    let mut sink = JsonSink::new();
    table.format_json(&mut sink).unwrap();
    assert_eq!(sink.data(), json!({"a": "1", "b": {"c": null}}));
}

#[test]
fn escape_hook_overrides_resolution() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.escape_hook = Some(Rc::new(|raw: &str| {
        if raw == "\"\"" {
            Some("<q>".to_string())
        } else {
            None
        }
    }));
    let table = parser(syntax).parse("k\n\"a\"\"b\"\n").unwrap();
    assert_eq!(table.read_value(1, 0).unwrap(), Some("a<q>b".to_string()));
}

#[test]
fn parse_hook_transforms_every_read() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.parse_hook = Some(Rc::new(|_, _, raw: &str| raw.to_uppercase()));
    let table = parser(syntax).parse("k\nabc\n").unwrap();
    assert_eq!(table.read_value(1, 0).unwrap(), Some("ABC".to_string()));
}

#[test]
fn distinct_quote_pair() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax.quotes = Some(("<".to_string(), ">".to_string()));
    syntax.escapes = Vec::new();
    let table = parser(syntax).parse("k,l\n<a,b>,c\n").unwrap();
    assert_eq!(table.read_value(1, 0).unwrap(), Some("a,b".to_string()));
    assert_eq!(table.read_value(1, 1).unwrap(), Some("c".to_string()));
}

#[test]
fn blank_lines_are_skipped() {
    let table = parser(DsvSyntax::new(",", "\n"))
        .parse("a,b\n\n1,2\n\n")
        .unwrap();
    assert_eq!(table.height(), 2);
}
