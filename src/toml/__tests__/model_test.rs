use crate::format::{JsonSink, TextSink};
use crate::toml::{
    DateTime, Float, Int, LocalDate, LocalTime, Offset, QuoteStyle, Seq, Snippet, Text, TomlExpr,
    TomlParser, TomlSyntax, TomlTable,
};
use std::collections::HashSet;
use std::rc::Rc;

#[test]
fn equality_ignores_the_retained_snippet() {
    let parsed = TomlParser::new(Rc::new(TomlSyntax::default()))
        .unwrap()
        .parse("a = 5\n")
        .unwrap();
    let built = TomlExpr::Int(Int::new(5, 3, 10));
    assert_eq!(parsed.get("a"), Some(&built));

    let mut with_comment = Int::new(5, 3, 10);
    with_comment.snippet = Snippet::of("5".to_string());
    with_comment.snippet.comments.push("noise".to_string());
    assert_eq!(TomlExpr::Int(with_comment), built);
}

#[test]
fn float_equality_is_bitwise() {
    assert_eq!(
        TomlExpr::Float(Float::new(f64::NAN)),
        TomlExpr::Float(Float::new(f64::NAN))
    );
    assert_ne!(
        TomlExpr::Float(Float::new(0.1)),
        TomlExpr::Float(Float::new(0.2))
    );
}

#[test]
fn expressions_hash_consistently() {
    let mut seen = HashSet::new();
    assert!(seen.insert(TomlExpr::Int(Int::new(5, 3, 10))));
    assert!(!seen.insert(TomlExpr::Int(Int::new(5, 3, 10))));
    assert!(seen.insert(TomlExpr::Text(Text::bare("5"))));
}

#[test]
fn date_time_renders_every_shape() {
    let date = DateTime::date(LocalDate {
        year: 1979,
        month_day: Some((5, 27)),
    });
    assert_eq!(date.rfc3339(), "1979-05-27");

    let time = DateTime::time(LocalTime {
        hour: 7,
        min_sec: Some((32, 0)),
        fraction: None,
    });
    assert_eq!(time.rfc3339(), "07:32:00");

    let mut both = DateTime::date(LocalDate {
        year: 1979,
        month_day: Some((5, 27)),
    });
    both.time = Some(LocalTime {
        hour: 7,
        min_sec: Some((32, 0)),
        fraction: None,
    });
    both.offset = Offset::Z;
    assert_eq!(both.rfc3339(), "1979-05-27T07:32:00Z");
}

#[test]
fn constructed_expressions_render_canonically() {
    let mut table = TomlTable::block();
    table.insert(Text::bare("count"), TomlExpr::Int(Int::new(3, 2, 10)));
    table.insert(
        Text::bare("name"),
        TomlExpr::Text(Text::quoted("a\"b", QuoteStyle::Basic)),
    );
    table.insert(Text::bare("whole"), TomlExpr::Float(Float::new(2.0)));
    let mut seq = Seq::new(true);
    seq.push(TomlExpr::Int(Int::new(1, 1, 10)));
    seq.push(TomlExpr::Int(Int::new(2, 2, 10)));
    table.insert(Text::bare("items"), TomlExpr::Seq(seq));

    let mut sink = TextSink::pretty();
    TomlExpr::Table(table).format(&mut sink, &TomlSyntax::default());
    assert_eq!(
        sink.data(),
        "count = 3\nname = \"a\\\"b\"\nwhole = 2.0\nitems = [1, 2]\n"
    );
}

#[test]
fn the_sink_contract_reverse_and_data() {
    let mut sink = TextSink::pretty();
    sink.append("b");
    sink.append("a");
    sink.reverse();
    assert_eq!(sink.data(), "ab");

    let mut json = JsonSink::new();
    json.append(serde_json::json!(1));
    json.append(serde_json::json!(2));
    json.reverse();
    assert_eq!(json.data(), serde_json::json!([2, 1]));
}

#[test]
fn inline_tables_never_emit_block_children() {
    let mut inner = TomlTable::braced();
    inner.insert(Text::bare("x"), TomlExpr::Int(Int::new(1, 1, 10)));
    let mut table = TomlTable::block();
    table.insert(Text::bare("p"), TomlExpr::Table(inner));

    let mut sink = TextSink::pretty();
    TomlExpr::Table(table).format(&mut sink, &TomlSyntax::default());
    assert_eq!(sink.data(), "p = { x = 1 }\n");
}
