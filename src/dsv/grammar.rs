use super::{
    Cell, Chain, DsvNode, DsvParser, DsvSyntax, FragmentKind, Row, RowSymmetry, Table, EOF, EOL,
    ESCAPE, ESCAPED, INT, L_QUOTE, R_QUOTE, SEPARATOR, TEXT, WHITESPACE,
};
use crate::mill::{Aggregate, DsvQuote, EscapeLead, QuoteMark};
use crate::{
    Commands, CoreTypes, DataError, EscapeScheme, IInfix, IPrefix, ImplementationError, Mill,
    MillGrammar, Pratt, Token, TypeSet,
};
use once_cell::sync::Lazy;
use regex::Regex;
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
        radix_prefix: None,
    }
}

impl DsvSyntax {
    /// The common DSV configuration: doubled double quotes, lenient whitespace, first row
    /// as header.
    pub fn new(delimiter: &str, eol: &str) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            eol: eol.to_string(),
            bom: true,
            header: Vec::new(),
            quotes: Some(("\"".to_string(), "\"".to_string())),
            strict: false,
            leading_spaces: true,
            trailing_spaces: true,
            escapes: vec![EscapeScheme::doubling("\"")],
            escape_hook: None,
            nop: None,
            nap: None,
            parse_hook: None,
            symmetry: RowSymmetry::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ImplementationError> {
        if self.delimiter.is_empty() {
            return Err(ImplementationError::new(
                "DsvSyntax".into(),
                "The delimiter must hold at least one character.".into(),
            ));
        }
        match self.eol.as_str() {
            "\r" | "\n" | "\r\n" => Ok(()),
            other => Err(ImplementationError::new(
                "DsvSyntax".into(),
                format!("Line terminator {:?} is not supported.", other),
            )),
        }
    }

    /// Resolve a raw escape (operator included) into its replacement, consulting the user
    /// hook first and the declared encodings after.
    pub fn resolve_escape(&self, raw: &str) -> String {
        if let Some(hook) = &self.escape_hook {
            if let Some(replacement) = hook(raw) {
                return replacement;
            }
        }
        for scheme in &self.escapes {
            if let Some(payload) = raw.strip_prefix(scheme.operator.as_str()) {
                if let Some(replacement) = scheme.resolve(payload) {
                    return replacement;
                }
            }
        }
        raw.to_string()
    }

    /// Build the mill for this syntax: channels for the separator, the line terminator,
    /// the quote pair and every escape operator.
    pub fn mill(&self) -> Result<Mill, ImplementationError> {
        self.validate()?;
        let registry = TypeSet::new(vec![
            SEPARATOR, EOL, WHITESPACE, TEXT, INT, L_QUOTE, R_QUOTE, ESCAPE, ESCAPED, EOF,
        ])?;
        let grammar = MillGrammar {
            eol: self.eol.clone(),
            bom: self.bom,
            types: core_types(),
            escapes: self.escapes.clone(),
            registry,
        };
        let mut mill = Mill::new(grammar)?;
        let key = self.delimiter.chars().next().unwrap();
        mill.add_channel(
            Box::new(Aggregate::new(
                vec![(self.delimiter.as_str(), SEPARATOR)],
                TEXT,
            )),
            &[key],
        )?;
        if let Some((open, close)) = &self.quotes {
            if !open.is_empty() && !close.is_empty() {
                if open == close {
                    let doubling = self.escapes.iter().position(|s| s.operator == *close);
                    mill.add_channel(
                        Box::new(DsvQuote::new(open, L_QUOTE, R_QUOTE, doubling)),
                        &[open.chars().next().unwrap()],
                    )?;
                } else {
                    mill.add_channel(
                        Box::new(QuoteMark::new(open, L_QUOTE, true)),
                        &[open.chars().next().unwrap()],
                    )?;
                    mill.add_channel(
                        Box::new(QuoteMark::new(close, R_QUOTE, false)),
                        &[close.chars().next().unwrap()],
                    )?;
                }
            }
        }
        for (index, scheme) in self.escapes.iter().enumerate() {
            let key = match scheme.operator.chars().next() {
                Some(c) => c,
                None => continue,
            };
            // an operator equal to the quote is carried by the quote channel
            if !mill.has_channel(key) {
                mill.add_channel(Box::new(EscapeLead::new(&scheme.operator, index)), &[key])?;
            }
        }
        Ok(mill)
    }
}

/// Read one cell: the head token and everything after it up to a separator or row boundary.
fn read_cell(syntax: &DsvSyntax, head: Token, parser: &mut Pratt<DsvNode>) -> Result<Cell, DataError> {
    let position = head.position();
    let mut chain = Chain::new();
    let mut pending = Some(head);
    loop {
        let token = match pending.take() {
            Some(token) => token,
            None => {
                let kind = parser.peek(0).kind;
                if kind == SEPARATOR || kind == EOL || kind == EOF {
                    break;
                }
                parser.pop()
            }
        };
        if token.kind == TEXT || token.kind == INT || token.kind == WHITESPACE {
            chain.push(token.value, FragmentKind::Plain);
        } else if token.kind == ESCAPE {
            let body = parser.pop();
            if body.kind != ESCAPED {
                return Err(DataError::syntax(
                    token.position(),
                    "Escape operator without an escape body.".into(),
                ));
            }
            let mut raw = token.value;
            raw.push_str(&body.value);
            chain.push(raw, FragmentKind::Escaped);
        } else if token.kind == L_QUOTE {
            chain.push(token.value, FragmentKind::FieldStart);
            loop {
                let inner = parser.pop();
                if inner.kind == R_QUOTE {
                    chain.push(inner.value, FragmentKind::FieldEnd);
                    break;
                }
                if inner.kind == EOF {
                    return Err(DataError::syntax(
                        position,
                        "Unterminated quoted field.".into(),
                    ));
                }
                if inner.kind == ESCAPE {
                    let body = parser.pop();
                    if body.kind != ESCAPED {
                        return Err(DataError::syntax(
                            inner.position(),
                            "Escape operator without an escape body.".into(),
                        ));
                    }
                    let mut raw = inner.value;
                    raw.push_str(&body.value);
                    chain.push(raw, FragmentKind::Escaped);
                } else {
                    chain.push(inner.value, FragmentKind::Raw);
                }
            }
        } else {
            return Err(DataError::syntax(
                token.position(),
                format!("Unexpected '{}'({:?}) in a cell.", token.kind, token.value),
            ));
        }
    }
    if syntax.strict {
        let fragments: Vec<_> = chain.iter().collect();
        if let Some(first) = fragments.first() {
            if !syntax.leading_spaces
                && first.kind == FragmentKind::Plain
                && !first.text.is_empty()
                && first.text.chars().all(char::is_whitespace)
            {
                return Err(DataError::syntax(
                    position,
                    "Leading whitespace is not allowed here.".into(),
                ));
            }
        }
        if let Some(last) = fragments.last() {
            if !syntax.trailing_spaces
                && last.kind == FragmentKind::Plain
                && !last.text.is_empty()
                && last.text.chars().all(char::is_whitespace)
                && fragments.len() > 1
            {
                return Err(DataError::syntax(
                    position,
                    "Trailing whitespace is not allowed here.".into(),
                ));
            }
        }
    }
    Ok(Cell::new(chain).with_position(position))
}

/// The field following a separator: a cell, or null when the row boundary or the next
/// separator arrives first.
fn next_field(syntax: &DsvSyntax, parser: &mut Pratt<DsvNode>) -> Result<Cell, DataError> {
    let kind = parser.peek(0).kind;
    if kind == SEPARATOR || kind == EOL || kind == EOF {
        return Ok(Cell::null());
    }
    let head = parser.pop();
    read_cell(syntax, head, parser)
}

struct CellCommand {
    syntax: Rc<DsvSyntax>,
}

impl IPrefix<DsvNode> for CellCommand {
    fn run(&self, head: Token, parser: &mut Pratt<DsvNode>) -> Result<DsvNode, DataError> {
        Ok(DsvNode::Cell(read_cell(&self.syntax, head, parser)?))
    }
}

/// A separator in prefix position: the row opens with an empty field.
struct LeadingSeparator {
    syntax: Rc<DsvSyntax>,
}

impl IPrefix<DsvNode> for LeadingSeparator {
    fn run(&self, head: Token, parser: &mut Pratt<DsvNode>) -> Result<DsvNode, DataError> {
        let mut row = Row::new();
        row.append(Cell::null().with_position(head.position()));
        row.append(next_field(&self.syntax, parser)?);
        Ok(DsvNode::Row(row))
    }
}

struct SeparatorCommand {
    syntax: Rc<DsvSyntax>,
}

impl IInfix<DsvNode> for SeparatorCommand {
    fn run(
        &self,
        left: DsvNode,
        _head: Token,
        parser: &mut Pratt<DsvNode>,
    ) -> Result<DsvNode, DataError> {
        let mut row = match left {
            DsvNode::Row(row) => row,
            DsvNode::Cell(cell) => Row::from_cell(cell),
        };
        row.append(next_field(&self.syntax, parser)?);
        Ok(DsvNode::Row(row))
    }
}

fn commands(syntax: &Rc<DsvSyntax>) -> Result<Commands<DsvNode>, ImplementationError> {
    let mut commands = Commands::new();
    let cell = Rc::new(CellCommand {
        syntax: Rc::clone(syntax),
    });
    for kind in [TEXT, INT, WHITESPACE, ESCAPE, L_QUOTE] {
        commands.add_prefix(kind, cell.clone())?;
    }
    commands.add_prefix(
        SEPARATOR,
        Rc::new(LeadingSeparator {
            syntax: Rc::clone(syntax),
        }),
    )?;
    commands.add_infix(
        SEPARATOR,
        Rc::new(SeparatorCommand {
            syntax: Rc::clone(syntax),
        }),
    )?;
    Ok(commands)
}

static SEP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^sep=(.)(\r\n|\r|\n)").unwrap());

impl DsvParser {
    pub fn new(syntax: Rc<DsvSyntax>) -> Result<Self, ImplementationError> {
        syntax.validate()?;
        let commands = Rc::new(commands(&syntax)?);
        Ok(Self { syntax, commands })
    }

    pub fn syntax(&self) -> &Rc<DsvSyntax> {
        &self.syntax
    }

    /// Probe the first line for the self-describing `Sep=<c>` override.
    fn resolve_separator<'t>(&self, text: &'t str) -> (Rc<DsvSyntax>, &'t str) {
        let probe = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        if let Some(found) = SEP_LINE.captures(probe) {
            let mut syntax: DsvSyntax = (*self.syntax).clone();
            syntax.delimiter = found[1].to_string();
            let rest = &probe[found.get(0).unwrap().end()..];
            (Rc::new(syntax), rest)
        } else {
            (Rc::clone(&self.syntax), text)
        }
    }

    /// Parse a whole document.
    pub fn parse(&self, text: &str) -> Result<Table, DataError> {
        let (syntax, body) = self.resolve_separator(text);
        let mut mill = syntax.mill()?;
        mill.process(body);
        mill.end();
        self.read(&mut mill, syntax)
    }

    /// Drain an already fed (and ended) mill into a table, one row per parse.
    pub fn read(&self, mill: &mut Mill, syntax: Rc<DsvSyntax>) -> Result<Table, DataError> {
        let mut parser = Pratt::new(mill, Rc::clone(&self.commands));
        let mut table = if syntax.header.is_empty() {
            Table::new(Rc::clone(&syntax))
        } else {
            Table::with_header(syntax.header.clone(), Rc::clone(&syntax))
        };
        loop {
            if parser.matches(EOF) {
                break;
            }
            if parser.matches(EOL) {
                parser.pop();
                continue;
            }
            let node = parser.parse(0)?;
            let row = match node {
                DsvNode::Row(row) => row,
                DsvNode::Cell(cell) => Row::from_cell(cell),
            };
            if parser.matches(EOL) {
                parser.pop();
            } else if !parser.matches(EOF) {
                let at = parser.position();
                return Err(DataError::syntax(at, "Expected the end of the row.".into()));
            }
            if syntax.symmetry == RowSymmetry::Throw
                && table.height() > 0
                && row.len() < table.width()
            {
                let at = row.position().unwrap_or(crate::Position::new(1, 1));
                return Err(DataError::syntax(
                    at,
                    format!(
                        "Row holds {} cells but the header declares {}.",
                        row.len(),
                        table.width()
                    ),
                ));
            }
            table.append_row(row);
        }
        Ok(table)
    }
}
