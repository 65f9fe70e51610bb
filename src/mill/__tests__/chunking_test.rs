use crate::dsv::DsvSyntax;
use crate::toml::{self, TomlSyntax};
use crate::{Token, Type};

fn kinds_and_values(tokens: &[Token]) -> Vec<(Type, String)> {
    tokens.iter().map(|t| (t.kind, t.value.clone())).collect()
}

#[test]
fn crlf_across_chunk_boundary() {
    let mut syntax = TomlSyntax::default();
    syntax.eol = "\r\n".to_string();
    let mut mill = syntax.mill().unwrap();
    mill.process("x=1\r");
    mill.process("\ny=2\r\n");
    mill.end();

    let eols: Vec<&Token> = mill
        .processed()
        .iter()
        .filter(|t| t.kind == toml::EOL)
        .collect();
    assert_eq!(eols.len(), 2);
    assert_eq!(eols[0].value, "\r\n");
    assert_eq!((eols[0].line_start, eols[0].start), (1, 4));
    assert_eq!(eols[1].value, "\r\n");
    assert_eq!((eols[1].line_start, eols[1].start), (2, 4));
    assert_eq!(mill.frequency(toml::EOL), 2);
}

#[test]
fn chunk_split_equivalence() {
    let source = "name,qty\r\n\"a\"\"b\",12\r\n";
    let syntax = DsvSyntax::new(",", "\r\n");

    let mut whole = syntax.mill().unwrap();
    whole.process(source);
    whole.end();
    let expected: Vec<Token> = whole.processed().iter().cloned().collect();

    for (cut, _) in source.char_indices() {
        let mut mill = syntax.mill().unwrap();
        mill.process(&source[..cut]);
        mill.process(&source[cut..]);
        mill.end();
        let split: Vec<Token> = mill.processed().iter().cloned().collect();
        assert_eq!(split, expected, "split at byte {}", cut);
    }
}

#[test]
fn triple_quote_runs() {
    let syntax = TomlSyntax::default();
    let mut mill = syntax.mill().unwrap();
    mill.process("s = \"\"\"a\"\"b\"\"\"\n");
    mill.end();

    let significant: Vec<(Type, String)> = mill
        .processed()
        .iter()
        .filter(|t| t.kind != toml::WHITESPACE)
        .map(|t| (t.kind, t.value.clone()))
        .collect();
    assert_eq!(
        significant,
        vec![
            (toml::TEXT, "s".to_string()),
            (toml::EQUALS, "=".to_string()),
            (toml::TRI_D_QUOTE, "\"\"\"".to_string()),
            (toml::TEXT, "a".to_string()),
            (toml::TEXT, "\"\"".to_string()),
            (toml::TEXT, "b".to_string()),
            (toml::TRI_D_QUOTE, "\"\"\"".to_string()),
            (toml::EOL, "\n".to_string()),
        ]
    );
}

#[test]
fn radix_prefix_switches_the_int_channel() {
    let syntax = TomlSyntax::default();
    let mut mill = syntax.mill().unwrap();
    mill.process("h = 0xDEAD_BEEF\n");
    mill.end();

    let significant: Vec<(Type, String)> = mill
        .processed()
        .iter()
        .filter(|t| t.kind != toml::WHITESPACE)
        .map(|t| (t.kind, t.value.clone()))
        .collect();
    assert_eq!(
        significant,
        vec![
            (toml::TEXT, "h".to_string()),
            (toml::EQUALS, "=".to_string()),
            (toml::RADIX_PREFIX, "0x".to_string()),
            (toml::INT, "DEAD".to_string()),
            (toml::UNDERSCORE, "_".to_string()),
            (toml::INT, "BEEF".to_string()),
            (toml::EOL, "\n".to_string()),
        ]
    );
}

#[test]
fn double_brackets_need_one_character_of_lookahead() {
    let syntax = TomlSyntax::default();
    let mut mill = syntax.mill().unwrap();
    mill.process("[a]\n[[b]]\n");
    mill.end();

    let kinds: Vec<Type> = mill.processed().iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            toml::L_BRACKET,
            toml::TEXT,
            toml::R_BRACKET,
            toml::EOL,
            toml::DOUBLE_L_BRACKET,
            toml::TEXT,
            toml::DOUBLE_R_BRACKET,
            toml::EOL,
        ]
    );
}

#[test]
fn bom_is_stripped_when_configured() {
    let syntax = DsvSyntax::new(",", "\n");
    let mut mill = syntax.mill().unwrap();
    mill.process("\u{FEFF}a,b\n");
    mill.end();

    let first = mill.processed().get(0).unwrap();
    assert_eq!(
        (first.kind, first.value.as_str(), first.line_start, first.start),
        (crate::dsv::TEXT, "a", 1, 1)
    );
}

#[test]
fn end_terminates_the_last_row() {
    let syntax = DsvSyntax::new(",", "\n");
    let mut mill = syntax.mill().unwrap();
    mill.process("a,b");
    mill.end();

    let tokens: Vec<(Type, String)> =
        kinds_and_values(&mill.processed().iter().cloned().collect::<Vec<_>>());
    assert_eq!(
        tokens,
        vec![
            (crate::dsv::TEXT, "a".to_string()),
            (crate::dsv::SEPARATOR, ",".to_string()),
            (crate::dsv::TEXT, "b".to_string()),
            (crate::dsv::EOL, "\n".to_string()),
        ]
    );
    assert_eq!(mill.index_of(crate::dsv::TEXT), Some(0));
    assert_eq!(mill.last_index_of(crate::dsv::TEXT), Some(2));
}

#[test]
fn positions_stay_monotonic() {
    let syntax = TomlSyntax::default();
    let mut mill = syntax.mill().unwrap();
    mill.process("a = 1\nb = \"two\"\n[c]\nd = 2026-08-01\n");
    mill.end();

    let tokens: Vec<Token> = mill.processed().iter().cloned().collect();
    for token in &tokens {
        assert!(token.line_start <= token.line_end);
    }
    for pair in tokens.windows(2) {
        assert!(
            (pair[0].line_start, pair[0].start) <= (pair[1].line_start, pair[1].start),
            "{} before {}",
            pair[0],
            pair[1]
        );
    }
}
