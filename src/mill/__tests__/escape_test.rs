use crate::dsv::{self, DsvSyntax};
use crate::{EscapeScheme, Token, Type};

fn lex(syntax: &DsvSyntax, source: &str) -> Vec<Token> {
    let mut mill = syntax.mill().unwrap();
    mill.process(source);
    mill.end();
    mill.processed().iter().cloned().collect()
}

fn shape(tokens: &[Token]) -> Vec<(Type, String)> {
    tokens.iter().map(|t| (t.kind, t.value.clone())).collect()
}

#[test]
fn doubled_quote_becomes_an_escape_pair() {
    let syntax = DsvSyntax::new(",", "\n");
    let tokens = lex(&syntax, "\"a\"\"b\"\n");
    assert_eq!(
        shape(&tokens),
        vec![
            (dsv::L_QUOTE, "\"".to_string()),
            (dsv::TEXT, "a".to_string()),
            (dsv::ESCAPE, "\"".to_string()),
            (dsv::ESCAPED, "\"".to_string()),
            (dsv::TEXT, "b".to_string()),
            (dsv::R_QUOTE, "\"".to_string()),
            (dsv::EOL, "\n".to_string()),
        ]
    );
}

#[test]
fn radix_escape_commits_at_max_digits() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax
        .escapes
        .push(EscapeScheme::new("\\", "u", vec!["n"], "", 4, 4, 16));
    let tokens = lex(&syntax, "a\\u0041,b\n");
    assert_eq!(
        shape(&tokens),
        vec![
            (dsv::TEXT, "a".to_string()),
            (dsv::ESCAPE, "\\".to_string()),
            (dsv::ESCAPED, "u0041".to_string()),
            (dsv::SEPARATOR, ",".to_string()),
            (dsv::TEXT, "b".to_string()),
            (dsv::EOL, "\n".to_string()),
        ]
    );
}

#[test]
fn invalid_radix_escape_rolls_back_to_the_prefix() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax
        .escapes
        .push(EscapeScheme::new("\\", "u", vec!["n"], "", 4, 4, 16));
    let tokens = lex(&syntax, "a\\u00ZZ,b\n");
    assert_eq!(
        shape(&tokens),
        vec![
            (dsv::TEXT, "a".to_string()),
            (dsv::ESCAPE, "\\".to_string()),
            (dsv::ESCAPED, "u".to_string()),
            (dsv::INT, "00".to_string()),
            (dsv::TEXT, "ZZ".to_string()),
            (dsv::SEPARATOR, ",".to_string()),
            (dsv::TEXT, "b".to_string()),
            (dsv::EOL, "\n".to_string()),
        ]
    );
    // the rolled back digits were re-read at their original columns
    let int = tokens.iter().find(|t| t.kind == dsv::INT).unwrap();
    assert_eq!(int.start, 4);
    let zz = tokens.iter().find(|t| t.value == "ZZ").unwrap();
    assert_eq!(zz.start, 6);
}

#[test]
fn escaped_line_terminator_advances_the_line() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax
        .escapes
        .push(EscapeScheme::new("\\", "u", vec!["n"], "", 4, 4, 16));
    let tokens = lex(&syntax, "a\\\nb\n");
    assert_eq!(
        shape(&tokens),
        vec![
            (dsv::TEXT, "a".to_string()),
            (dsv::ESCAPE, "\\".to_string()),
            (dsv::ESCAPED, "\n".to_string()),
            (dsv::TEXT, "b".to_string()),
            (dsv::EOL, "\n".to_string()),
        ]
    );
    let b = tokens.iter().find(|t| t.value == "b").unwrap();
    assert_eq!((b.line_start, b.start), (2, 1));
}

#[test]
fn suffixed_entity_escape() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax
        .escapes
        .push(EscapeScheme::new("&#", "", vec![], ";", 1, 7, 10));
    let tokens = lex(&syntax, "x&#38;y\n");
    assert_eq!(
        shape(&tokens),
        vec![
            (dsv::TEXT, "x".to_string()),
            (dsv::ESCAPE, "&#".to_string()),
            (dsv::ESCAPED, "38".to_string()),
            (dsv::TEXT, "y".to_string()),
            (dsv::EOL, "\n".to_string()),
        ]
    );
}

#[test]
fn every_escape_token_is_followed_by_its_body() {
    let mut syntax = DsvSyntax::new(",", "\n");
    syntax
        .escapes
        .push(EscapeScheme::new("\\", "u", vec!["n"], "", 4, 4, 16));
    for source in ["a\\n b\n", "\"x\"\"y\"\n", "q\\u00Z\n", "tail\\"] {
        let tokens = lex(&syntax, source);
        for (at, token) in tokens.iter().enumerate() {
            if token.kind == dsv::ESCAPE {
                assert_eq!(
                    tokens.get(at + 1).map(|t| t.kind),
                    Some(dsv::ESCAPED),
                    "in {:?}",
                    source
                );
            }
        }
    }
}
