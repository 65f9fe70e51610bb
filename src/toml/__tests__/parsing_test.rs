use crate::toml::{
    Offset, QuoteStyle, TomlExpr, TomlParser, TomlSyntax, TomlTable,
};
use crate::DataError;
use serde_json::json;
use std::rc::Rc;

fn parse(source: &str) -> TomlTable {
    TomlParser::new(Rc::new(TomlSyntax::default()))
        .unwrap()
        .parse(source)
        .unwrap()
}

fn parse_err(source: &str) -> DataError {
    TomlParser::new(Rc::new(TomlSyntax::default()))
        .unwrap()
        .parse(source)
        .unwrap_err()
}

fn int(table: &TomlTable, key: &str) -> i64 {
    match table.get(key) {
        Some(TomlExpr::Int(int)) => int.val,
        other => panic!("expected an int for '{}', got {:?}", key, other),
    }
}

fn float(table: &TomlTable, key: &str) -> f64 {
    match table.get(key) {
        Some(TomlExpr::Float(float)) => float.val,
        other => panic!("expected a float for '{}', got {:?}", key, other),
    }
}

fn text<'t>(table: &'t TomlTable, key: &str) -> &'t crate::toml::Text {
    match table.get(key) {
        Some(TomlExpr::Text(text)) => text,
        other => panic!("expected text for '{}', got {:?}", key, other),
    }
}

#[test]
fn integers_in_every_radix() {
    let root = parse("a = 42\nb = -17\nc = 1_000\nh = 0xDEAD_BEEF\no = 0o755\nbin = 0b1101\n");
    assert_eq!(int(&root, "a"), 42);
    assert_eq!(int(&root, "b"), -17);
    assert_eq!(int(&root, "c"), 1000);
    assert_eq!(int(&root, "h"), 3735928559);
    assert_eq!(int(&root, "o"), 493);
    assert_eq!(int(&root, "bin"), 13);

    match root.get("h") {
        Some(TomlExpr::Int(i)) => {
            assert_eq!(i.bits, 32);
            assert_eq!(i.radix, 16);
        }
        _ => unreachable!(),
    }
}

#[test]
fn oversized_integers_are_expression_errors() {
    let err = parse_err("big = 99999999999999999999\n");
    assert!(matches!(err, DataError::Expression { .. }), "got {}", err);
    let err = parse_err("h = 0xFFFF_FFFF_FFFF_FFFF_F\n");
    assert!(matches!(err, DataError::Expression { .. }), "got {}", err);
}

#[test]
fn floats_fractions_and_exponents() {
    let root = parse("pi = 3.14\nneg = -0.01\nsmall = 6.26e-34\nbig = 1e6\nplus = +1.5\n");
    assert!((float(&root, "pi") - 3.14).abs() < 1e-12);
    assert!((float(&root, "neg") + 0.01).abs() < 1e-12);
    assert!((float(&root, "small") - 6.26e-34).abs() < 1e-45);
    assert!((float(&root, "big") - 1e6).abs() < 1e-6);
    assert!((float(&root, "plus") - 1.5).abs() < 1e-12);
}

#[test]
fn non_finite_floats_are_gated_by_the_syntax() {
    let root = parse("a = inf\nb = -inf\nc = nan\n");
    assert!(float(&root, "a").is_infinite());
    assert!(float(&root, "b") < 0.0);
    assert!(float(&root, "c").is_nan());

    let mut syntax = TomlSyntax::default();
    syntax.qnan = false;
    let err = TomlParser::new(Rc::new(syntax))
        .unwrap()
        .parse("c = nan\n")
        .unwrap_err();
    assert!(matches!(err, DataError::Expression { .. }), "got {}", err);

    let mut syntax = TomlSyntax::default();
    syntax.snan = true;
    let root = TomlParser::new(Rc::new(syntax))
        .unwrap()
        .parse("s = snan\n")
        .unwrap();
    assert!(float(&root, "s").is_nan());
}

#[test]
fn triple_quoted_string_with_embedded_quotes() {
    let root = parse("s = \"\"\"a\"\"b\"\"\"\n");
    let s = text(&root, "s");
    assert_eq!(s.val, "a\"\"b");
    assert_eq!(s.quote, QuoteStyle::MultiBasic);
}

#[test]
fn string_escapes_resolve() {
    let root = parse("a = \"tab\\there\"\nu = \"\\u0041\"\nq = \"say \\\"hi\\\"\"\n");
    assert_eq!(text(&root, "a").val, "tab\there");
    assert_eq!(text(&root, "u").val, "A");
    assert_eq!(text(&root, "q").val, "say \"hi\"");
}

#[test]
fn literal_strings_keep_backslashes() {
    let root = parse("p = 'C:\\users'\n");
    let p = text(&root, "p");
    assert_eq!(p.val, "C:\\users");
    assert_eq!(p.quote, QuoteStyle::Literal);
}

#[test]
fn multiline_strings() {
    let root = parse("ml = \"\"\"\nline1\nline2\"\"\"\n");
    assert_eq!(text(&root, "ml").val, "line1\nline2");

    let root = parse("joined = \"\"\"one \\\n   two\"\"\"\n");
    assert_eq!(text(&root, "joined").val, "one two");
}

#[test]
fn invalid_unicode_escape_is_rejected_by_the_parser() {
    let err = parse_err("u = \"\\u00ZZ\"\n");
    assert!(matches!(err, DataError::Syntax { .. }), "got {}", err);
}

#[test]
fn all_four_date_time_shapes() {
    let root = parse(
        "d = 1979-05-27\nt = 07:32:00\nt2 = 07:32\ndt = 1979-05-27T07:32:00\nz = 1979-05-27T07:32:00Z\noff = 1979-05-27T00:32:00.999999-07:00\nplus = 1979-05-27T07:32:00+07:30\n",
    );
    match root.get("d") {
        Some(TomlExpr::DateTime(dt)) => {
            assert_eq!(dt.date.unwrap().year, 1979);
            assert_eq!(dt.date.unwrap().month_day, Some((5, 27)));
            assert!(dt.time.is_none());
            assert_eq!(dt.offset, Offset::None);
        }
        other => panic!("unexpected {:?}", other),
    }
    match root.get("t") {
        Some(TomlExpr::DateTime(dt)) => {
            let time = dt.time.clone().unwrap();
            assert_eq!((time.hour, time.min_sec), (7, Some((32, 0))));
            assert!(dt.date.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
    match root.get("t2") {
        Some(TomlExpr::DateTime(dt)) => {
            assert_eq!(dt.time.clone().unwrap().min_sec, Some((32, 0)));
        }
        other => panic!("unexpected {:?}", other),
    }
    match root.get("dt") {
        Some(TomlExpr::DateTime(dt)) => {
            assert!(dt.date.is_some() && dt.time.is_some());
            assert_eq!(dt.offset, Offset::None);
        }
        other => panic!("unexpected {:?}", other),
    }
    match root.get("z") {
        Some(TomlExpr::DateTime(dt)) => assert_eq!(dt.offset, Offset::Z),
        other => panic!("unexpected {:?}", other),
    }
    match root.get("off") {
        Some(TomlExpr::DateTime(dt)) => {
            assert_eq!(dt.offset, Offset::Minus(7, 0));
            assert_eq!(dt.time.clone().unwrap().fraction.as_deref(), Some("999999"));
            assert_eq!(dt.rfc3339(), "1979-05-27T00:32:00.999999-07:00");
        }
        other => panic!("unexpected {:?}", other),
    }
    match root.get("plus") {
        Some(TomlExpr::DateTime(dt)) => assert_eq!(dt.offset, Offset::Plus(7, 30)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn keys_in_all_their_shapes() {
    let root = parse(
        "a.b.c = 1\n\"my key\" = 2\nmy-key = 3\nmy_key = 4\n123 = 5\n3.14 = \"pi\"\n",
    );
    let a = match root.get("a") {
        Some(TomlExpr::Table(t)) => t,
        other => panic!("unexpected {:?}", other),
    };
    let b = match a.get("b") {
        Some(TomlExpr::Table(t)) => t,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(int(b, "c"), 1);
    assert_eq!(int(&root, "my key"), 2);
    assert_eq!(int(&root, "my-key"), 3);
    assert_eq!(int(&root, "my_key"), 4);
    assert_eq!(int(&root, "123"), 5);
    let three = match root.get("3") {
        Some(TomlExpr::Table(t)) => t,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(text(three, "14").val, "pi");
}

#[test]
fn table_headers_nest_and_reopen() {
    let root = parse("[server]\nhost = \"a\"\n[server.tls]\nport = 1\n[other]\nx = 2\n");
    let server = match root.get("server") {
        Some(TomlExpr::Table(t)) => t,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(text(server, "host").val, "a");
    let tls = match server.get("tls") {
        Some(TomlExpr::Table(t)) => t,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(int(tls, "port"), 1);
}

#[test]
fn arrays_of_tables_grow_in_order() {
    let root = parse("[[products]]\nname = \"a\"\n[[products]]\nname = \"b\"\n");
    match root.get("products") {
        Some(TomlExpr::Seq(seq)) => {
            assert!(!seq.inline);
            assert_eq!(seq.len(), 2);
            match seq.get(1) {
                Some(TomlExpr::Table(t)) => assert_eq!(text(t, "name").val, "b"),
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn inline_tables_and_arrays() {
    let root = parse("point = { x = 1, y = 2 }\ndata = [1, 2, 3]\nnested = [[1, 2], [3]]\n");
    match root.get("point") {
        Some(TomlExpr::Table(t)) => {
            assert!(t.inline);
            assert_eq!(int(t, "x"), 1);
            assert_eq!(int(t, "y"), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
    match root.get("data") {
        Some(TomlExpr::Seq(seq)) => {
            assert!(seq.inline);
            assert_eq!(seq.len(), 3);
        }
        other => panic!("unexpected {:?}", other),
    }
    match root.get("nested") {
        Some(TomlExpr::Seq(seq)) => {
            assert_eq!(seq.len(), 2);
            match (seq.get(0), seq.get(1)) {
                (Some(TomlExpr::Seq(a)), Some(TomlExpr::Seq(b))) => {
                    assert_eq!(a.len(), 2);
                    assert_eq!(b.len(), 1);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn multiline_arrays_allow_comments_and_trailing_commas() {
    let root = parse("a = [\n  1, # one\n  2,\n]\n");
    match root.get("a") {
        Some(TomlExpr::Seq(seq)) => assert_eq!(seq.len(), 2),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn comments_attach_to_the_following_expression() {
    let root = parse("# first\n# second\ntitle = \"x\" # inline\n");
    let title = root.get("title").unwrap();
    assert_eq!(
        title.snippet().comments,
        vec!["first".to_string(), "second".to_string()]
    );
    assert_eq!(title.snippet().trailing.as_deref(), Some("inline"));
}

#[test]
fn pretty_output_reproduces_comments_and_order() {
    let root = parse("# first\ntitle = \"x\" # inline\ncount = 2\n[t]\na = 1\n");
    let mut sink = crate::format::TextSink::pretty();
    TomlExpr::Table(root).format(&mut sink, &TomlSyntax::default());
    assert_eq!(
        sink.data(),
        "# first\ntitle = \"x\" # inline\ncount = 2\n\n[t]\na = 1\n"
    );
}

#[test]
fn minified_output_drops_comments_unless_retained() {
    let root = parse("# first\ntitle = \"x\"\n");
    let mut sink = crate::format::TextSink::minified(false, 10);
    TomlExpr::Table(root.clone()).format(&mut sink, &TomlSyntax::default());
    assert_eq!(sink.data(), "title=\"x\"\n");

    let mut sink = crate::format::TextSink::minified(true, 10);
    TomlExpr::Table(root).format(&mut sink, &TomlSyntax::default());
    assert_eq!(sink.data(), "# first\ntitle=\"x\"\n");
}

#[test]
fn duplicate_keys_replace_in_place() {
    let root = parse("a = 1\nb = 2\na = 3\n");
    assert_eq!(root.len(), 2);
    assert_eq!(int(&root, "a"), 3);
    assert_eq!(root.entries()[0].0.val, "a");
}

#[test]
fn pairs_require_a_header_without_the_global_table() {
    let mut syntax = TomlSyntax::default();
    syntax.global = false;
    let err = TomlParser::new(Rc::new(syntax.clone()))
        .unwrap()
        .parse("a = 1\n")
        .unwrap_err();
    assert!(matches!(err, DataError::Syntax { .. }), "got {}", err);

    let root = TomlParser::new(Rc::new(syntax))
        .unwrap()
        .parse("[t]\na = 1\n")
        .unwrap();
    assert!(root.get("t").is_some());
}

#[test]
fn json_emission_covers_the_value_set() {
    let root = parse(
        "name = \"x\"\nok = true\ncount = 3\nratio = 0.5\nwhen = 1979-05-27T07:32:00Z\n[child]\nitems = [1, 2]\n",
    );
    let mut sink = crate::format::JsonSink::new();
    TomlExpr::Table(root).format_json(&mut sink).unwrap();
    assert_eq!(
        sink.data(),
        json!({
            "name": "x",
            "ok": true,
            "count": 3,
            "ratio": 0.5,
            "when": "1979-05-27T07:32:00Z",
            "child": {"items": [1, 2]}
        })
    );
}

#[test]
fn non_finite_floats_cannot_reach_json() {
    let root = parse("bad = inf\n");
    let mut sink = crate::format::JsonSink::new();
    let err = TomlExpr::Table(root).format_json(&mut sink).unwrap_err();
    assert!(matches!(err, DataError::Format { .. }), "got {}", err);
}

#[test]
fn crlf_documents_parse_with_the_matching_terminator() {
    let mut syntax = TomlSyntax::default();
    syntax.eol = "\r\n".to_string();
    let root = TomlParser::new(Rc::new(syntax))
        .unwrap()
        .parse("a = 1\r\nb = 2\r\n")
        .unwrap();
    assert_eq!(int(&root, "a"), 1);
    assert_eq!(int(&root, "b"), 2);
}
