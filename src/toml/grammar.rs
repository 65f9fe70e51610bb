use super::{
    DateTime, Float, Int, LocalDate, LocalTime, Offset, QuoteStyle, Seq, Snippet, Text, TomlExpr,
    TomlNode, TomlParser, TomlSyntax, TomlTable, COLON, COMMA, COMMENT, DOT, DOUBLE_L_BRACKET,
    DOUBLE_R_BRACKET, D_QUOTE, EOF, EOL, EQUALS, ESCAPE, ESCAPED, INT, L_BRACE, L_BRACKET, MINUS,
    PLUS, RADIX_PREFIX, R_BRACE, R_BRACKET, S_QUOTE, TEXT, TRI_D_QUOTE, TRI_S_QUOTE, UNDERSCORE,
    WHITESPACE,
};
use crate::mill::{Aggregate, CommentChannel, EscapeLead, RunQuote};
use crate::{
    Commands, CoreTypes, DataError, EscapeScheme, IInfix, IPrefix, ImplementationError, Mill,
    MillGrammar, Position, Pratt, QuoteContext, Token, TypeSet,
};
use std::rc::Rc;

fn core_types() -> CoreTypes {
    CoreTypes {
        eol: EOL,
        whitespace: WHITESPACE,
        text: TEXT,
        int: INT,
        eof: EOF,
        escape: ESCAPE,
        escaped: ESCAPED,
        radix_prefix: Some(RADIX_PREFIX),
    }
}

fn escape_schemes() -> Vec<EscapeScheme> {
    vec![
        EscapeScheme::new("\\", "u", vec!["n", "t", "r", "b", "f", "\"", "\\"], "", 4, 4, 16),
        EscapeScheme::new("\\", "U", vec![], "", 8, 8, 16),
    ]
}

impl TomlSyntax {
    /// Build the TOML mill: the fixed channel set plus the parameterized line terminator.
    pub fn mill(&self) -> Result<Mill, ImplementationError> {
        let registry = TypeSet::new(vec![
            EOL,
            WHITESPACE,
            TEXT,
            INT,
            EOF,
            ESCAPE,
            ESCAPED,
            COMMENT,
            EQUALS,
            COMMA,
            DOT,
            MINUS,
            PLUS,
            COLON,
            UNDERSCORE,
            RADIX_PREFIX,
            L_BRACKET,
            R_BRACKET,
            DOUBLE_L_BRACKET,
            DOUBLE_R_BRACKET,
            L_BRACE,
            R_BRACE,
            D_QUOTE,
            TRI_D_QUOTE,
            S_QUOTE,
            TRI_S_QUOTE,
        ])?;
        let grammar = MillGrammar {
            eol: self.eol.clone(),
            bom: self.bom,
            types: core_types(),
            escapes: escape_schemes(),
            registry,
        };
        let mut mill = Mill::new(grammar)?;
        mill.add_channel(Box::new(CommentChannel::new(COMMENT)), &['#'])?;
        mill.add_channel(Box::new(EscapeLead::new("\\", 0)), &['\\'])?;
        for (lexeme, kind) in [
            ("=", EQUALS),
            ("+", PLUS),
            ("-", MINUS),
            ("_", UNDERSCORE),
            (".", DOT),
            (",", COMMA),
            (":", COLON),
            ("{", L_BRACE),
            ("}", R_BRACE),
        ] {
            mill.add_channel(
                Box::new(Aggregate::new(vec![(lexeme, kind)], TEXT)),
                &[lexeme.chars().next().unwrap()],
            )?;
        }
        mill.add_channel(
            Box::new(Aggregate::new(
                vec![("[", L_BRACKET), ("[[", DOUBLE_L_BRACKET)],
                TEXT,
            )),
            &['['],
        )?;
        mill.add_channel(
            Box::new(Aggregate::new(
                vec![("]", R_BRACKET), ("]]", DOUBLE_R_BRACKET)],
                TEXT,
            )),
            &[']'],
        )?;
        mill.add_channel(
            Box::new(RunQuote::new(
                '"',
                D_QUOTE,
                TRI_D_QUOTE,
                QuoteContext::Basic,
                QuoteContext::TriBasic,
            )),
            &['"'],
        )?;
        mill.add_channel(
            Box::new(RunQuote::new(
                '\'',
                S_QUOTE,
                TRI_S_QUOTE,
                QuoteContext::Literal,
                QuoteContext::TriLiteral,
            )),
            &['\''],
        )?;
        Ok(mill)
    }
}

fn is_quote(kind: crate::Type) -> bool {
    kind == D_QUOTE || kind == TRI_D_QUOTE || kind == S_QUOTE || kind == TRI_S_QUOTE
}

fn is_eol_text(value: &str) -> bool {
    matches!(value, "\n" | "\r" | "\r\n")
}

/// Resolve an escape body into its replacement; the mill has already shaped it, the parser
/// rejects what the encoding does not cover.
fn resolve_escape(payload: &str, at: Position) -> Result<String, DataError> {
    if let Some(hex) = payload
        .strip_prefix('u')
        .or_else(|| payload.strip_prefix('U'))
    {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| {
                DataError::syntax(at, format!("Invalid unicode escape '{}'.", payload))
            });
    }
    match payload {
        "n" => Ok("\n".to_string()),
        "t" => Ok("\t".to_string()),
        "r" => Ok("\r".to_string()),
        "b" => Ok("\u{0008}".to_string()),
        "f" => Ok("\u{000C}".to_string()),
        "\"" => Ok("\"".to_string()),
        "\\" => Ok("\\".to_string()),
        other => Err(DataError::syntax(
            at,
            format!("Unsupported escape '{}'.", other),
        )),
    }
}

/// Read a string expression: everything between the opening quote token and its matching
/// closer, escapes resolved for the basic styles.
fn read_string(head: Token, parser: &mut Pratt<TomlNode>) -> Result<Text, DataError> {
    let close = head.kind;
    let style = if head.kind == D_QUOTE {
        QuoteStyle::Basic
    } else if head.kind == TRI_D_QUOTE {
        QuoteStyle::MultiBasic
    } else if head.kind == S_QUOTE {
        QuoteStyle::Literal
    } else {
        QuoteStyle::MultiLiteral
    };
    let multi = matches!(style, QuoteStyle::MultiBasic | QuoteStyle::MultiLiteral);
    let mut val = String::new();
    let mut source = head.value.clone();
    if multi && parser.peek(0).kind == EOL {
        // the newline right after the opening delimiter is trimmed
        let eol = parser.pop();
        source.push_str(&eol.value);
    }
    loop {
        let token = parser.pop();
        if token.kind == close {
            source.push_str(&token.value);
            break;
        }
        if token.kind == EOF {
            return Err(DataError::syntax(
                head.position(),
                "Unterminated string.".into(),
            ));
        }
        if token.kind == ESCAPE {
            let body = parser.pop();
            if body.kind != ESCAPED {
                return Err(DataError::syntax(
                    token.position(),
                    "Escape operator without an escape body.".into(),
                ));
            }
            source.push_str(&token.value);
            source.push_str(&body.value);
            if is_eol_text(&body.value) {
                // a line-ending backslash swallows the following whitespace
                loop {
                    let kind = parser.peek(0).kind;
                    if kind == WHITESPACE || kind == EOL {
                        let skipped = parser.pop();
                        source.push_str(&skipped.value);
                    } else {
                        break;
                    }
                }
            } else {
                val.push_str(&resolve_escape(&body.value, body.position())?);
            }
        } else {
            val.push_str(&token.value);
            source.push_str(&token.value);
        }
    }
    Ok(Text {
        val,
        quote: style,
        snippet: Snippet::of(source),
    })
}

/// One component of a dotted key.
fn key_piece(parser: &mut Pratt<TomlNode>) -> Result<Text, DataError> {
    let head = parser.pop();
    if head.kind == TEXT || head.kind == INT {
        Ok(Text::bare(&head.value))
    } else if is_quote(head.kind) {
        read_string(head, parser)
    } else {
        Err(DataError::syntax(
            head.position(),
            format!("Expected a key but found '{}'.", head.kind),
        ))
    }
}

/// Collect a digit run, merging `_`-joined integer tokens by adjacency. Returns the bare
/// digits, the verbatim source and the last consumed token.
fn gather_digits(head: Token, parser: &mut Pratt<TomlNode>) -> (String, String, Token) {
    let mut digits = head.value.clone();
    let mut source = head.value.clone();
    let mut last = head;
    loop {
        let underscore = parser.peek(0).clone();
        if underscore.kind != UNDERSCORE || !last.abuts(&underscore) {
            break;
        }
        let digit = parser.peek(1).clone();
        if digit.kind != INT || !underscore.abuts(&digit) {
            break;
        }
        parser.pop();
        parser.pop();
        digits.push_str(&digit.value);
        source.push('_');
        source.push_str(&digit.value);
        last = digit;
    }
    (digits, source, last)
}

fn int_source(int: &Int) -> String {
    int.snippet
        .source
        .clone()
        .unwrap_or_else(|| int.val.to_string())
}

/// Convert a parsed node into a value expression, resolving the special bare literals and
/// gating the NaN forms on the syntax flags.
fn to_value(syntax: &TomlSyntax, node: TomlNode, at: Position) -> Result<TomlExpr, DataError> {
    match node {
        TomlNode::Expr(TomlExpr::Text(text)) if text.is_bare() => match text.val.as_str() {
            "inf" => {
                let mut float = Float::new(f64::INFINITY);
                float.snippet = Snippet::of("inf".to_string());
                Ok(TomlExpr::Float(float))
            }
            "nan" | "qnan" => {
                if syntax.qnan {
                    let mut float = Float::new(f64::NAN);
                    float.snippet = Snippet::of(text.val.clone());
                    Ok(TomlExpr::Float(float))
                } else {
                    Err(DataError::expression_at(
                        at,
                        "The quiet NaN literal is not accepted by this syntax.".into(),
                    ))
                }
            }
            "snan" => {
                if syntax.snan {
                    let mut float = Float::new(f64::NAN);
                    float.snippet = Snippet::of("snan".to_string());
                    Ok(TomlExpr::Float(float))
                } else {
                    Err(DataError::expression_at(
                        at,
                        "The signaling NaN literal is not accepted by this syntax.".into(),
                    ))
                }
            }
            _ => Ok(TomlExpr::Text(text)),
        },
        TomlNode::Expr(expr) => Ok(expr),
        _ => Err(DataError::syntax(at, "Expected a value.".into())),
    }
}

/// Turn the left side of `=` into a key path.
fn keyify(node: TomlNode, at: Position) -> Result<Vec<Text>, DataError> {
    match node {
        TomlNode::Key(path) => Ok(path),
        TomlNode::Expr(TomlExpr::Text(text)) => Ok(vec![text]),
        TomlNode::Expr(TomlExpr::Int(int)) => Ok(vec![Text::bare(&int_source(&int))]),
        TomlNode::Expr(TomlExpr::Float(float)) => {
            // a dotted numeric key was assembled as a float; split it back apart
            let fallback = float.val.to_string();
            let source = float.snippet.source.unwrap_or(fallback);
            Ok(source.split('.').map(Text::bare).collect())
        }
        TomlNode::Expr(TomlExpr::DateTime(dt)) => {
            let fallback = dt.rfc3339();
            let source = dt.snippet.source.unwrap_or(fallback);
            Ok(vec![Text::bare(&source)])
        }
        _ => Err(DataError::syntax(at, "Expected a key.".into())),
    }
}

struct BareText;

impl IPrefix<TomlNode> for BareText {
    fn run(&self, head: Token, _parser: &mut Pratt<TomlNode>) -> Result<TomlNode, DataError> {
        Ok(TomlNode::Expr(TomlExpr::Text(Text::bare(&head.value))))
    }
}

struct StringCommand;

impl IPrefix<TomlNode> for StringCommand {
    fn run(&self, head: Token, parser: &mut Pratt<TomlNode>) -> Result<TomlNode, DataError> {
        Ok(TomlNode::Expr(TomlExpr::Text(read_string(head, parser)?)))
    }
}

struct IntCommand;

impl IPrefix<TomlNode> for IntCommand {
    fn run(&self, head: Token, parser: &mut Pratt<TomlNode>) -> Result<TomlNode, DataError> {
        let at = head.position();
        let (digits, source, _) = gather_digits(head, parser);
        let val = digits.parse::<i64>().map_err(|_| {
            DataError::expression_at(at, format!("Integer '{}' exceeds 64 bits.", source))
        })?;
        let bits = (64 - (val as u64).leading_zeros()).max(1) as u8;
        let mut int = Int::new(val, bits, 10);
        int.snippet = Snippet::of(source);
        Ok(TomlNode::Expr(TomlExpr::Int(int)))
    }
}

struct RadixCommand;

impl IPrefix<TomlNode> for RadixCommand {
    fn run(&self, head: Token, parser: &mut Pratt<TomlNode>) -> Result<TomlNode, DataError> {
        let at = head.position();
        let radix = match head.value.chars().nth(1) {
            Some('x') => 16,
            Some('o') => 8,
            _ => 2,
        };
        let first = parser.peek(0).clone();
        if first.kind != INT || !head.abuts(&first) {
            return Err(DataError::syntax(
                at,
                format!("Expected digits after '{}'.", head.value),
            ));
        }
        let first = parser.pop();
        let (digits, tail, _) = gather_digits(first, parser);
        let per_digit = match radix {
            16 => 4,
            8 => 3,
            _ => 1,
        };
        let bits = digits.chars().count() * per_digit;
        if bits > 64 {
            return Err(DataError::expression_at(
                at,
                format!("Integer '{}{}' exceeds 64 bits.", head.value, tail),
            ));
        }
        let val = u64::from_str_radix(&digits, radix).map_err(|_| {
            DataError::expression_at(at, format!("Integer '{}{}' exceeds 64 bits.", head.value, tail))
        })? as i64;
        let mut int = Int::new(val, bits.max(1) as u8, radix);
        int.snippet = Snippet::of(format!("{}{}", head.value, tail));
        Ok(TomlNode::Expr(TomlExpr::Int(int)))
    }
}

struct SignCommand {
    syntax: Rc<TomlSyntax>,
}

impl IPrefix<TomlNode> for SignCommand {
    fn run(&self, head: Token, parser: &mut Pratt<TomlNode>) -> Result<TomlNode, DataError> {
        let negative = head.kind == MINUS;
        let at = head.position();
        let node = parser.parse(EQUALS.precedence())?;
        match to_value(&self.syntax, node, at)? {
            TomlExpr::Int(mut int) => {
                if negative {
                    int.val = int.val.checked_neg().ok_or_else(|| {
                        DataError::expression_at(at, "Integer exceeds 64 bits.".into())
                    })?;
                }
                int.snippet.source = int
                    .snippet
                    .source
                    .map(|s| format!("{}{}", head.value, s));
                Ok(TomlNode::Expr(TomlExpr::Int(int)))
            }
            TomlExpr::Float(mut float) => {
                if negative {
                    float.val = -float.val;
                }
                float.snippet.source = float
                    .snippet
                    .source
                    .map(|s| format!("{}{}", head.value, s));
                Ok(TomlNode::Expr(TomlExpr::Float(float)))
            }
            TomlExpr::Text(text) if text.is_bare() && negative => {
                // a bare key may begin with a dash
                Ok(TomlNode::Expr(TomlExpr::Text(Text::bare(&format!(
                    "-{}",
                    text.val
                )))))
            }
            _ => Err(DataError::syntax(at, "A sign must precede a number.".into())),
        }
    }
}

struct DotCommand;

impl IInfix<TomlNode> for DotCommand {
    fn run(
        &self,
        left: TomlNode,
        head: Token,
        parser: &mut Pratt<TomlNode>,
    ) -> Result<TomlNode, DataError> {
        match left {
            TomlNode::Expr(TomlExpr::Text(text)) => {
                Ok(TomlNode::Key(vec![text, key_piece(parser)?]))
            }
            TomlNode::Key(mut path) => {
                path.push(key_piece(parser)?);
                Ok(TomlNode::Key(path))
            }
            TomlNode::Expr(TomlExpr::Int(int)) => {
                let next = parser.peek(0).clone();
                if next.kind == INT && head.abuts(&next) && parser.follows(&head) {
                    let first = parser.pop();
                    let (fraction, tail, _) = gather_digits(first, parser);
                    let source = int_source(&int);
                    let literal = format!("{}.{}", source.replace('_', ""), fraction);
                    let val = literal.parse::<f64>().map_err(|_| {
                        DataError::syntax(head.position(), format!("Invalid float '{}'.", literal))
                    })?;
                    let mut float = Float::new(val);
                    float.snippet = Snippet::of(format!("{}.{}", source, tail));
                    Ok(TomlNode::Expr(TomlExpr::Float(float)))
                } else {
                    // a dotted key led by digits
                    Ok(TomlNode::Key(vec![
                        Text::bare(&int_source(&int)),
                        key_piece(parser)?,
                    ]))
                }
            }
            TomlNode::Expr(TomlExpr::DateTime(mut dt)) => {
                let next = parser.peek(0).clone();
                let open = dt
                    .time
                    .as_ref()
                    .map_or(false, |time| time.fraction.is_none());
                if next.kind == INT && head.abuts(&next) && open && parser.follows(&head) {
                    let digits = parser.pop();
                    if let Some(time) = dt.time.as_mut() {
                        time.fraction = Some(digits.value.clone());
                    }
                    dt.snippet.source = dt
                        .snippet
                        .source
                        .map(|s| format!("{}.{}", s, digits.value));
                    Ok(TomlNode::Expr(TomlExpr::DateTime(dt)))
                } else {
                    Err(DataError::syntax(
                        head.position(),
                        "Unexpected '.' after a date-time.".into(),
                    ))
                }
            }
            _ => Err(DataError::syntax(head.position(), "Unexpected '.'.".into())),
        }
    }
}

fn expect_adjacent_int(
    prev: &Token,
    parser: &mut Pratt<TomlNode>,
    what: &str,
) -> Result<Token, DataError> {
    let next = parser.peek(0).clone();
    if next.kind != INT || !prev.abuts(&next) {
        return Err(DataError::syntax(
            prev.position(),
            format!("Expected {} digits.", what),
        ));
    }
    Ok(parser.pop())
}

fn two_digit(token: &Token, what: &str, cap: u8) -> Result<u8, DataError> {
    let parsed = token.value.parse::<u8>().map_err(|_| {
        DataError::expression_at(token.position(), format!("Invalid {} '{}'.", what, token.value))
    })?;
    if token.value.chars().count() != 2 || parsed > cap {
        return Err(DataError::expression_at(
            token.position(),
            format!("Invalid {} '{}'.", what, token.value),
        ));
    }
    Ok(parsed)
}

/// Read the `:mm[:ss[.frac]]` tail of a time whose hour is already known.
fn time_tail(
    hour: u8,
    hour_source: &str,
    colon: Token,
    parser: &mut Pratt<TomlNode>,
) -> Result<(LocalTime, String), DataError> {
    let minute_token = expect_adjacent_int(&colon, parser, "minute")?;
    let minute = two_digit(&minute_token, "minute", 59)?;
    let mut source = format!("{}:{}", hour_source, minute_token.value);
    let mut second = 0;
    let mut last = minute_token;
    let next = parser.peek(0).clone();
    if next.kind == COLON && last.abuts(&next) {
        let colon = parser.pop();
        let second_token = expect_adjacent_int(&colon, parser, "second")?;
        second = two_digit(&second_token, "second", 60)?;
        source.push(':');
        source.push_str(&second_token.value);
        last = second_token;
    }
    let mut fraction = None;
    let next = parser.peek(0).clone();
    if next.kind == DOT && last.abuts(&next) {
        let dot = parser.pop();
        let digits = expect_adjacent_int(&dot, parser, "fraction")?;
        source.push('.');
        source.push_str(&digits.value);
        fraction = Some(digits.value);
    }
    Ok((
        LocalTime {
            hour,
            min_sec: Some((minute, second)),
            fraction,
        },
        source,
    ))
}

struct ColonCommand;

impl IInfix<TomlNode> for ColonCommand {
    fn run(
        &self,
        left: TomlNode,
        head: Token,
        parser: &mut Pratt<TomlNode>,
    ) -> Result<TomlNode, DataError> {
        let int = match left {
            TomlNode::Expr(TomlExpr::Int(int)) if parser.follows(&head) => int,
            _ => {
                return Err(DataError::syntax(
                    head.position(),
                    "Unexpected ':'.".into(),
                ))
            }
        };
        if int.val < 0 || int.val > 23 {
            return Err(DataError::expression_at(
                head.position(),
                format!("Invalid hour '{}'.", int.val),
            ));
        }
        let (time, source) = time_tail(int.val as u8, &int_source(&int), head, parser)?;
        let mut dt = DateTime::time(time);
        dt.snippet = Snippet::of(source);
        Ok(TomlNode::Expr(TomlExpr::DateTime(dt)))
    }
}

/// Read the `hh:mm` of an offset whose sign is already consumed.
fn offset_tail(sign: Token, parser: &mut Pratt<TomlNode>) -> Result<(u8, u8, String), DataError> {
    let hour_token = expect_adjacent_int(&sign, parser, "offset hour")?;
    let hours = two_digit(&hour_token, "offset hour", 23)?;
    let next = parser.peek(0).clone();
    if next.kind != COLON || !hour_token.abuts(&next) {
        return Err(DataError::syntax(
            hour_token.position(),
            "Expected ':' in the offset.".into(),
        ));
    }
    let colon = parser.pop();
    let minute_token = expect_adjacent_int(&colon, parser, "offset minute")?;
    let minutes = two_digit(&minute_token, "offset minute", 59)?;
    let source = format!("{}:{}", hour_token.value, minute_token.value);
    Ok((hours, minutes, source))
}

struct DashCommand;

impl IInfix<TomlNode> for DashCommand {
    fn run(
        &self,
        left: TomlNode,
        head: Token,
        parser: &mut Pratt<TomlNode>,
    ) -> Result<TomlNode, DataError> {
        if !parser.follows(&head) {
            return Err(DataError::syntax(head.position(), "Unexpected '-'.".into()));
        }
        match left {
            TomlNode::Expr(TomlExpr::Int(int)) => {
                let month = parser.peek(0).clone();
                if month.kind == INT && head.abuts(&month) {
                    let second_dash = parser.peek(1).clone();
                    let day = parser.peek(2).clone();
                    if second_dash.kind == MINUS
                        && month.abuts(&second_dash)
                        && day.kind == INT
                        && second_dash.abuts(&day)
                    {
                        let month = parser.pop();
                        parser.pop();
                        let day = parser.pop();
                        let m = two_digit(&month, "month", 12)?;
                        let d = two_digit(&day, "day", 31)?;
                        if m == 0 || d == 0 {
                            return Err(DataError::expression_at(
                                head.position(),
                                "Months and days are 1-based.".into(),
                            ));
                        }
                        let mut dt = DateTime::date(LocalDate {
                            year: int.val as i32,
                            month_day: Some((m, d)),
                        });
                        dt.snippet = Snippet::of(format!(
                            "{}-{}-{}",
                            int_source(&int),
                            month.value,
                            day.value
                        ));
                        return Ok(TomlNode::Expr(TomlExpr::DateTime(dt)));
                    }
                    // not a date: a bare key like `5-3`
                    let month = parser.pop();
                    return Ok(TomlNode::Expr(TomlExpr::Text(Text::bare(&format!(
                        "{}-{}",
                        int_source(&int),
                        month.value
                    )))));
                }
                if month.kind == TEXT && head.abuts(&month) {
                    let tail = parser.pop();
                    return Ok(TomlNode::Expr(TomlExpr::Text(Text::bare(&format!(
                        "{}-{}",
                        int_source(&int),
                        tail.value
                    )))));
                }
                Err(DataError::syntax(head.position(), "Unexpected '-'.".into()))
            }
            TomlNode::Expr(TomlExpr::DateTime(mut dt)) => {
                if dt.time.is_none() || dt.offset != Offset::None {
                    return Err(DataError::syntax(
                        head.position(),
                        "Unexpected '-' after a date-time.".into(),
                    ));
                }
                let (hours, minutes, tail) = offset_tail(head, parser)?;
                dt.offset = Offset::Minus(hours, minutes);
                dt.snippet.source = dt.snippet.source.map(|s| format!("{}-{}", s, tail));
                Ok(TomlNode::Expr(TomlExpr::DateTime(dt)))
            }
            TomlNode::Expr(TomlExpr::Text(text)) => {
                if !text.is_bare() {
                    return Err(DataError::syntax(head.position(), "Unexpected '-'.".into()));
                }
                let tail = parser.pop();
                if tail.kind != TEXT && tail.kind != INT {
                    return Err(DataError::syntax(
                        tail.position(),
                        "Expected a key fragment after '-'.".into(),
                    ));
                }
                Ok(TomlNode::Expr(TomlExpr::Text(Text::bare(&format!(
                    "{}-{}",
                    text.val, tail.value
                )))))
            }
            TomlNode::Key(mut path) => {
                let tail = parser.pop();
                if tail.kind != TEXT && tail.kind != INT {
                    return Err(DataError::syntax(
                        tail.position(),
                        "Expected a key fragment after '-'.".into(),
                    ));
                }
                if let Some(last) = path.last_mut() {
                    last.val.push('-');
                    last.val.push_str(&tail.value);
                }
                Ok(TomlNode::Key(path))
            }
            _ => Err(DataError::syntax(head.position(), "Unexpected '-'.".into())),
        }
    }
}

struct PlusCommand;

impl IInfix<TomlNode> for PlusCommand {
    fn run(
        &self,
        left: TomlNode,
        head: Token,
        parser: &mut Pratt<TomlNode>,
    ) -> Result<TomlNode, DataError> {
        match left {
            TomlNode::Expr(TomlExpr::DateTime(mut dt))
                if dt.time.is_some() && dt.offset == Offset::None && parser.follows(&head) =>
            {
                let (hours, minutes, tail) = offset_tail(head, parser)?;
                dt.offset = Offset::Plus(hours, minutes);
                dt.snippet.source = dt.snippet.source.map(|s| format!("{}+{}", s, tail));
                Ok(TomlNode::Expr(TomlExpr::DateTime(dt)))
            }
            _ => Err(DataError::syntax(head.position(), "Unexpected '+'.".into())),
        }
    }
}

fn is_exponent_text(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some('e') | Some('E') => chars.all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Assemble a float from a mantissa and the exponent beginning at `head`.
fn exponent(
    mantissa_digits: &str,
    mantissa_source: &str,
    head: Token,
    parser: &mut Pratt<TomlNode>,
) -> Result<Float, DataError> {
    let at = head.position();
    let (exp, exp_source) = if head.value.chars().count() > 1 {
        let digits: String = head.value.chars().skip(1).collect();
        (digits.clone(), head.value.clone())
    } else {
        let sign = parser.peek(0).clone();
        if (sign.kind == PLUS || sign.kind == MINUS) && head.abuts(&sign) {
            let sign = parser.pop();
            let digits = expect_adjacent_int(&sign, parser, "exponent")?;
            (
                format!("{}{}", sign.value, digits.value),
                format!("{}{}{}", head.value, sign.value, digits.value),
            )
        } else {
            let digits = expect_adjacent_int(&head, parser, "exponent")?;
            (digits.value.clone(), format!("{}{}", head.value, digits.value))
        }
    };
    let literal = format!("{}e{}", mantissa_digits.replace('_', ""), exp);
    let val = literal
        .parse::<f64>()
        .map_err(|_| DataError::syntax(at, format!("Invalid float '{}'.", literal)))?;
    let mut float = Float::new(val);
    float.snippet = Snippet::of(format!("{}{}", mantissa_source, exp_source));
    Ok(float)
}

struct JoinCommand;

impl IInfix<TomlNode> for JoinCommand {
    fn run(
        &self,
        left: TomlNode,
        head: Token,
        parser: &mut Pratt<TomlNode>,
    ) -> Result<TomlNode, DataError> {
        if !parser.follows(&head) {
            return Err(DataError::syntax(
                head.position(),
                format!("Unexpected '{}'.", head.value),
            ));
        }
        match left {
            TomlNode::Expr(TomlExpr::Int(int)) => {
                if is_exponent_text(&head.value) {
                    let source = int_source(&int);
                    let float = exponent(&source, &source, head, parser)?;
                    return Ok(TomlNode::Expr(TomlExpr::Float(float)));
                }
                // a bare key led by digits, e.g. `2key`
                Ok(TomlNode::Expr(TomlExpr::Text(Text::bare(&format!(
                    "{}{}",
                    int_source(&int),
                    head.value
                )))))
            }
            TomlNode::Expr(TomlExpr::Float(float)) => {
                if !is_exponent_text(&head.value) {
                    return Err(DataError::syntax(
                        head.position(),
                        format!("Unexpected '{}' after a number.", head.value),
                    ));
                }
                let source = float
                    .snippet
                    .source
                    .clone()
                    .unwrap_or_else(|| float.val.to_string());
                let assembled = exponent(&source, &source, head, parser)?;
                Ok(TomlNode::Expr(TomlExpr::Float(assembled)))
            }
            TomlNode::Expr(TomlExpr::DateTime(mut dt)) => {
                if dt.time.is_none() && (head.value.starts_with('T') || head.value.starts_with('t'))
                {
                    let hour_digits: String = head.value.chars().skip(1).collect();
                    if hour_digits.is_empty() || !hour_digits.chars().all(|c| c.is_ascii_digit()) {
                        return Err(DataError::syntax(
                            head.position(),
                            format!("Invalid time '{}'.", head.value),
                        ));
                    }
                    let hour = hour_digits.parse::<u8>().map_err(|_| {
                        DataError::expression_at(
                            head.position(),
                            format!("Invalid hour '{}'.", hour_digits),
                        )
                    })?;
                    if hour > 23 || hour_digits.chars().count() != 2 {
                        return Err(DataError::expression_at(
                            head.position(),
                            format!("Invalid hour '{}'.", hour_digits),
                        ));
                    }
                    let colon = parser.peek(0).clone();
                    if colon.kind != COLON || !head.abuts(&colon) {
                        return Err(DataError::syntax(
                            head.position(),
                            "Expected ':' in the time.".into(),
                        ));
                    }
                    let colon = parser.pop();
                    let (time, tail) = time_tail(hour, &hour_digits, colon, parser)?;
                    let separator: String = head.value.chars().take(1).collect();
                    dt.time = Some(time);
                    dt.snippet.source = dt
                        .snippet
                        .source
                        .map(|s| format!("{}{}{}", s, separator, tail));
                    return Ok(TomlNode::Expr(TomlExpr::DateTime(dt)));
                }
                if dt.time.is_some()
                    && dt.offset == Offset::None
                    && (head.value == "Z" || head.value == "z")
                {
                    dt.offset = Offset::Z;
                    dt.snippet.source = dt.snippet.source.map(|s| format!("{}Z", s));
                    return Ok(TomlNode::Expr(TomlExpr::DateTime(dt)));
                }
                Err(DataError::syntax(
                    head.position(),
                    format!("Unexpected '{}' after a date-time.", head.value),
                ))
            }
            _ => Err(DataError::syntax(
                head.position(),
                format!("Unexpected '{}'.", head.value),
            )),
        }
    }
}

struct UnderscoreCommand;

impl IInfix<TomlNode> for UnderscoreCommand {
    fn run(
        &self,
        left: TomlNode,
        head: Token,
        parser: &mut Pratt<TomlNode>,
    ) -> Result<TomlNode, DataError> {
        if !parser.follows(&head) {
            return Err(DataError::syntax(head.position(), "Unexpected '_'.".into()));
        }
        let tail = parser.pop();
        if tail.kind != TEXT && tail.kind != INT || !head.abuts(&tail) {
            return Err(DataError::syntax(
                tail.position(),
                "Expected a key fragment after '_'.".into(),
            ));
        }
        match left {
            TomlNode::Expr(TomlExpr::Text(text)) if text.is_bare() => Ok(TomlNode::Expr(
                TomlExpr::Text(Text::bare(&format!("{}_{}", text.val, tail.value))),
            )),
            TomlNode::Key(mut path) => {
                if let Some(last) = path.last_mut() {
                    last.val.push('_');
                    last.val.push_str(&tail.value);
                }
                Ok(TomlNode::Key(path))
            }
            _ => Err(DataError::syntax(head.position(), "Unexpected '_'.".into())),
        }
    }
}

struct EqualsCommand {
    syntax: Rc<TomlSyntax>,
}

impl IInfix<TomlNode> for EqualsCommand {
    fn run(
        &self,
        left: TomlNode,
        head: Token,
        parser: &mut Pratt<TomlNode>,
    ) -> Result<TomlNode, DataError> {
        let keys = keyify(left, head.position())?;
        let at = parser.position();
        let node = parser.parse(EQUALS.precedence())?;
        let value = to_value(&self.syntax, node, at)?;
        Ok(TomlNode::Pair(keys, value))
    }
}

fn skip_layout(parser: &mut Pratt<TomlNode>) {
    loop {
        let kind = parser.peek(0).kind;
        if kind == WHITESPACE || kind == EOL || kind == COMMENT {
            parser.pop();
        } else {
            break;
        }
    }
}

type SeqProgress = (Seq, usize);

/// Parse the items of a sequence whose opening bracket is already consumed. The `usize`
/// counts the closing brackets consumed beyond this sequence's own (a `]]` closes two).
fn seq_continue(
    syntax: &Rc<TomlSyntax>,
    parser: &mut Pratt<TomlNode>,
    mut seq: Seq,
    mut expect_sep: bool,
) -> Result<SeqProgress, DataError> {
    loop {
        skip_layout(parser);
        let kind = parser.peek(0).kind;
        if kind == R_BRACKET {
            parser.pop();
            return Ok((seq, 0));
        }
        if kind == DOUBLE_R_BRACKET {
            parser.pop();
            return Ok((seq, 1));
        }
        if kind == EOF {
            let at = parser.position();
            return Err(DataError::syntax(at, "Unterminated array.".into()));
        }
        if expect_sep {
            if kind == COMMA {
                parser.pop();
                expect_sep = false;
                continue;
            }
            let at = parser.position();
            return Err(DataError::syntax(at, "Expected ',' or ']'.".into()));
        }
        if kind == L_BRACKET || kind == DOUBLE_L_BRACKET {
            let open = parser.pop();
            if open.kind == DOUBLE_L_BRACKET {
                let (first, extra) = seq_continue(syntax, parser, Seq::new(true), false)?;
                let mut nested = Seq::new(true);
                nested.push(TomlExpr::Seq(first));
                if extra == 0 {
                    let (nested, extra) = seq_continue(syntax, parser, nested, true)?;
                    seq.push(TomlExpr::Seq(nested));
                    if extra > 0 {
                        return Ok((seq, extra - 1));
                    }
                } else {
                    // the ']]' closed the inner pair at once
                    seq.push(TomlExpr::Seq(nested));
                }
            } else {
                let (nested, extra) = seq_continue(syntax, parser, Seq::new(true), false)?;
                seq.push(TomlExpr::Seq(nested));
                if extra > 0 {
                    return Ok((seq, extra - 1));
                }
            }
        } else {
            let at = parser.position();
            let node = parser.parse(0)?;
            seq.push(to_value(syntax, node, at)?);
        }
        expect_sep = true;
    }
}

struct ArrayCommand {
    syntax: Rc<TomlSyntax>,
}

impl IPrefix<TomlNode> for ArrayCommand {
    fn run(&self, head: Token, parser: &mut Pratt<TomlNode>) -> Result<TomlNode, DataError> {
        if head.kind == DOUBLE_L_BRACKET {
            let (first, extra) = seq_continue(&self.syntax, parser, Seq::new(true), false)?;
            let mut outer = Seq::new(true);
            outer.push(TomlExpr::Seq(first));
            if extra > 0 {
                return Ok(TomlNode::Expr(TomlExpr::Seq(outer)));
            }
            let (outer, extra) = seq_continue(&self.syntax, parser, outer, true)?;
            if extra > 0 {
                return Err(DataError::syntax(
                    head.position(),
                    "Unbalanced ']]'.".into(),
                ));
            }
            return Ok(TomlNode::Expr(TomlExpr::Seq(outer)));
        }
        let (seq, extra) = seq_continue(&self.syntax, parser, Seq::new(true), false)?;
        if extra > 0 {
            return Err(DataError::syntax(
                head.position(),
                "Unbalanced ']]'.".into(),
            ));
        }
        Ok(TomlNode::Expr(TomlExpr::Seq(seq)))
    }
}

/// Insert a (possibly dotted) pair into a table, materializing the intermediate tables.
fn insert_into(
    table: &mut TomlTable,
    keys: &[Text],
    value: TomlExpr,
    braced: bool,
) -> Result<(), DataError> {
    let (last, front) = keys.split_last().expect("a key path is never empty");
    let mut target = table;
    for key in front {
        if target.get(&key.val).is_none() {
            let child = if braced {
                TomlTable::braced()
            } else {
                TomlTable::block()
            };
            target.insert(key.clone(), TomlExpr::Table(child));
        }
        let slot = target.get_mut(&key.val).unwrap();
        target = match slot {
            TomlExpr::Table(child) => child,
            _ => {
                return Err(DataError::expression(format!(
                    "Key '{}' does not address a table.",
                    key.val
                )))
            }
        };
    }
    target.insert(last.clone(), value);
    Ok(())
}

struct InlineTableCommand {
    syntax: Rc<TomlSyntax>,
}

impl IPrefix<TomlNode> for InlineTableCommand {
    fn run(&self, head: Token, parser: &mut Pratt<TomlNode>) -> Result<TomlNode, DataError> {
        let mut table = TomlTable::braced();
        if parser.matches(R_BRACE) {
            parser.pop();
            return Ok(TomlNode::Expr(TomlExpr::Table(table)));
        }
        loop {
            if parser.matches(EOL) {
                return Err(DataError::syntax(
                    head.position(),
                    "An inline table must stay on one line.".into(),
                ));
            }
            let at = parser.position();
            let node = parser.parse(0)?;
            match node {
                TomlNode::Pair(keys, value) => insert_into(&mut table, &keys, value, true)?,
                _ => {
                    return Err(DataError::syntax(
                        at,
                        "Expected a key value pair.".into(),
                    ))
                }
            }
            if parser.matches(COMMA) {
                parser.pop();
                continue;
            }
            parser.consume(R_BRACE)?;
            break;
        }
        Ok(TomlNode::Expr(TomlExpr::Table(table)))
    }
}

fn commands(syntax: &Rc<TomlSyntax>) -> Result<Commands<TomlNode>, ImplementationError> {
    let mut commands = Commands::new();
    commands.add_skip(WHITESPACE);
    commands.add_prefix(TEXT, Rc::new(BareText))?;
    let string = Rc::new(StringCommand);
    for kind in [D_QUOTE, TRI_D_QUOTE, S_QUOTE, TRI_S_QUOTE] {
        commands.add_prefix(kind, string.clone())?;
    }
    commands.add_prefix(INT, Rc::new(IntCommand))?;
    commands.add_prefix(RADIX_PREFIX, Rc::new(RadixCommand))?;
    let sign = Rc::new(SignCommand {
        syntax: Rc::clone(syntax),
    });
    commands.add_prefix(PLUS, sign.clone())?;
    commands.add_prefix(MINUS, sign)?;
    let array = Rc::new(ArrayCommand {
        syntax: Rc::clone(syntax),
    });
    commands.add_prefix(L_BRACKET, array.clone())?;
    commands.add_prefix(DOUBLE_L_BRACKET, array)?;
    commands.add_prefix(
        L_BRACE,
        Rc::new(InlineTableCommand {
            syntax: Rc::clone(syntax),
        }),
    )?;
    commands.add_infix(
        EQUALS,
        Rc::new(EqualsCommand {
            syntax: Rc::clone(syntax),
        }),
    )?;
    commands.add_infix(DOT, Rc::new(DotCommand))?;
    commands.add_infix(MINUS, Rc::new(DashCommand))?;
    commands.add_infix(PLUS, Rc::new(PlusCommand))?;
    commands.add_infix(COLON, Rc::new(ColonCommand))?;
    commands.add_infix(TEXT, Rc::new(JoinCommand))?;
    commands.add_infix(UNDERSCORE, Rc::new(UnderscoreCommand))?;
    Ok(commands)
}

/// Navigate a header path, materializing block tables and following arrays of tables to
/// their last element.
fn resolve_path<'t>(
    mut target: &'t mut TomlTable,
    path: &[Text],
) -> Result<&'t mut TomlTable, DataError> {
    for key in path {
        if target.get(&key.val).is_none() {
            target.insert(key.clone(), TomlExpr::Table(TomlTable::block()));
        }
        let slot = target.get_mut(&key.val).unwrap();
        target = match slot {
            TomlExpr::Table(child) => child,
            TomlExpr::Seq(seq) if !seq.inline => match seq.items.last_mut() {
                Some(TomlExpr::Table(child)) => child,
                _ => {
                    return Err(DataError::expression(format!(
                        "Key '{}' does not address a table.",
                        key.val
                    )))
                }
            },
            _ => {
                return Err(DataError::expression(format!(
                    "Key '{}' does not address a table.",
                    key.val
                )))
            }
        };
    }
    Ok(target)
}

/// Apply a `[header]` or `[[header]]` line to the document.
fn define_header(
    root: &mut TomlTable,
    keys: &[Text],
    array: bool,
    comments: Vec<String>,
) -> Result<(), DataError> {
    let (last, front) = keys.split_last().expect("a header path is never empty");
    let parent = resolve_path(root, front)?;
    if array {
        let mut child = TomlTable::block();
        child.snippet.comments = comments;
        match parent.get_mut(&last.val) {
            Some(TomlExpr::Seq(seq)) if !seq.inline => {
                seq.push(TomlExpr::Table(child));
                Ok(())
            }
            Some(_) => Err(DataError::expression(format!(
                "Key '{}' is already used by another value.",
                last.val
            ))),
            None => {
                let mut seq = Seq::new(false);
                seq.push(TomlExpr::Table(child));
                parent.insert(last.clone(), TomlExpr::Seq(seq));
                Ok(())
            }
        }
    } else {
        match parent.get_mut(&last.val) {
            Some(TomlExpr::Table(table)) if !table.inline => {
                table.snippet.comments.extend(comments);
                Ok(())
            }
            Some(_) => Err(DataError::expression(format!(
                "Key '{}' is already used by another value.",
                last.val
            ))),
            None => {
                let mut child = TomlTable::block();
                child.snippet.comments = comments;
                parent.insert(last.clone(), TomlExpr::Table(child));
                Ok(())
            }
        }
    }
}

fn comment_text(value: &str) -> String {
    value.strip_prefix('#').unwrap_or(value).trim().to_string()
}

impl TomlParser {
    pub fn new(syntax: Rc<TomlSyntax>) -> Result<Self, ImplementationError> {
        let commands = Rc::new(commands(&syntax)?);
        Ok(Self { syntax, commands })
    }

    pub fn syntax(&self) -> &Rc<TomlSyntax> {
        &self.syntax
    }

    /// Parse a whole document into its root table.
    pub fn parse(&self, text: &str) -> Result<TomlTable, DataError> {
        let mut mill = self.syntax.mill()?;
        mill.process(text);
        mill.end();
        self.read(&mut mill)
    }

    /// Drain an already fed (and ended) mill into the root table.
    pub fn read(&self, mill: &mut Mill) -> Result<TomlTable, DataError> {
        let mut parser = Pratt::new(mill, Rc::clone(&self.commands));
        let mut root = TomlTable::block();
        let mut path: Vec<Text> = Vec::new();
        let mut comments: Vec<String> = Vec::new();
        let mut saw_header = false;
        loop {
            if parser.matches(EOF) {
                break;
            }
            if parser.matches(EOL) {
                parser.pop();
                continue;
            }
            if parser.matches(COMMENT) {
                let comment = parser.pop();
                comments.push(comment_text(&comment.value));
                continue;
            }
            if parser.matches(L_BRACKET) || parser.matches(DOUBLE_L_BRACKET) {
                let head = parser.pop();
                let array = head.kind == DOUBLE_L_BRACKET;
                let at = parser.position();
                let node = parser.parse(0)?;
                let keys = keyify(node, at)?;
                if array {
                    parser.consume(DOUBLE_R_BRACKET)?;
                } else {
                    parser.consume(R_BRACKET)?;
                }
                define_header(&mut root, &keys, array, std::mem::take(&mut comments))?;
                path = keys;
                saw_header = true;
                if parser.matches(COMMENT) {
                    parser.pop();
                }
                self.end_line(&mut parser)?;
                continue;
            }
            let at = parser.position();
            let node = parser.parse(0)?;
            let (keys, mut value) = match node {
                TomlNode::Pair(keys, value) => (keys, value),
                _ => {
                    return Err(DataError::syntax(
                        at,
                        "Expected a key value pair or a table header.".into(),
                    ))
                }
            };
            if !self.syntax.global && !saw_header {
                return Err(DataError::syntax(
                    at,
                    "Key value pairs before the first table header are not accepted by this syntax."
                        .into(),
                ));
            }
            value.snippet_mut().comments = std::mem::take(&mut comments);
            if parser.matches(COMMENT) {
                let comment = parser.pop();
                value.snippet_mut().trailing = Some(comment_text(&comment.value));
            }
            let target = resolve_path(&mut root, &path)?;
            insert_into(target, &keys, value, false)?;
            self.end_line(&mut parser)?;
        }
        Ok(root)
    }

    fn end_line(&self, parser: &mut Pratt<TomlNode>) -> Result<(), DataError> {
        if parser.matches(EOL) {
            parser.pop();
            Ok(())
        } else if parser.matches(EOF) {
            Ok(())
        } else {
            let at = parser.position();
            Err(DataError::syntax(at, "Expected the end of the line.".into()))
        }
    }
}
