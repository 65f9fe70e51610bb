//! token_mill is a library for building configurable text-format codecs around a streaming
//! tokenizer (the *mill*) and a precedence driven ([Pratt]) expression parser.
//!
//! # Overview
//! Formats like delimiter-separated values (DSV) and TOML look simple but their lexical
//! grammars are not single-character: line terminators may be two characters, quotes come in
//! single and triple runs, delimiters and escape operators are user configured strings of
//! arbitrary length. The mill therefore works character-by-character through a set of
//! [channels](IChannel), each a small sub-state-machine which extends a partial lexeme,
//! commits it as its target token, or cancels and falls back with one character of lookahead.
//! Because every decision is made per character, source can be pushed to the mill in
//! arbitrary slices ([process](Mill::process)) and the resulting [Token] stream is identical
//! to a single-shot run, including line and column positions.
//!
//! # Design
//! The building blocks are kept independent so that a format is just a configuration:
//! * [Mill] is the streaming tokenizer; it owns the channels, the token queue and the position,
//!   escape and quote state shared between them ([MillCore]).
//! * [Pratt] is the parser; it pops tokens and dispatches them through a [Commands] table of
//!   [IPrefix]/[IInfix] commands keyed by token [Type]. A token type carries its own
//!   precedence; precedence `0` (and the synthesized end-of-file token) terminates a parse.
//! * [dsv] and [toml] are the two bundled formats: their token sets, mill configurations,
//!   command tables and expression models.
//! * [format] holds the output sinks ([TextSink](format::TextSink), [JsonSink](format::JsonSink))
//!   through which expressions render themselves.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use token_mill::dsv::{DsvParser, DsvSyntax};
//!
//! let syntax = Rc::new(DsvSyntax::new(",", "\n"));
//! let parser = DsvParser::new(syntax).unwrap();
//! let table = parser.parse("jan,feb,mar\n\"a\",\"\",\"b,b\"\n").unwrap();
//!
//! assert_eq!(table.header_values(), vec!["jan", "feb", "mar"]);
//! assert_eq!(
//!     table.read_all().unwrap(),
//!     vec![vec!["a".to_string(), "".to_string(), "b,b".to_string()]]
//! );
//! ```
//!
//! # License
//! [token_mill](crate) is provided under the MIT license.

mod error;
pub mod dsv;
pub mod format;
pub mod mill;
mod milling;
mod parsing;
mod queue;
mod registry;
mod token;
pub mod toml;
mod util;

use once_cell::unsync::OnceCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub use util::{Log, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A value tag identifying a lexical class.
///
/// A [Type] pairs an identifier, unique within a format, with the precedence the [Pratt]
/// parser consults when the type appears in infix position. Types are process-wide constants;
/// two types are the same type exactly when both fields agree.
pub struct Type {
    id: &'static str,
    precedence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A lexeme instance manufactured by the [Mill].
///
/// Tokens are immutable once manufactured and carry enough position information to
/// reconstruct an error location: the line span, and the 1-based column of the first
/// character.
pub struct Token {
    pub value: String,
    pub kind: Type,
    pub line_start: usize,
    pub line_end: usize,
    pub start: usize,
}

/// A closed, validated set of the [Type]s a format declares.
///
/// Constructing two types with an identical identifier but distinct precedence is a
/// programming error; [TypeSet::new] rejects such a set.
pub struct TypeSet {
    members: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An ordered sequence of tokens produced by the mill and drained by the parser.
pub struct TokenQueue {
    tokens: VecDeque<Token>,
}

#[derive(Debug, Clone)]
/// One escape encoding understood by the mill.
///
/// An encoding is an operator string which opens the escape, an optional radix selector
/// prefix (e.g. `u`), a set of recognized literal infix sequences (e.g. `n`, `apos`), an
/// optional suffix (e.g. `;`), a digit count range and the radix its digits are validated
/// against.
pub struct EscapeScheme {
    pub operator: String,
    pub prefix: String,
    pub infixes: Vec<String>,
    pub suffix: String,
    pub min: usize,
    pub max: usize,
    pub radix: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The verdict a channel returns for one observed character.
pub enum Decision {
    /// The character was taken: it extended the partial value or completed a commit.
    Consumed,
    /// The channel finalized its partial value (as its target or as a fallback) and the
    /// character must be dispatched again from scratch.
    Rejected,
}

/// An interface implemented by the mill channels, the per-first-character sub-state-machines
/// which accumulate one target lexeme each.
pub trait IChannel {
    /// Observe the next character, deciding to extend, commit or cancel.
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision;
    /// Whether the channel currently holds a partially built lexeme.
    fn is_pending(&self) -> bool;
    /// The partially built lexeme (diagnostics).
    fn pending_value(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which kind of quoted region is currently open in the source, if any.
pub enum QuoteContext {
    Closed,
    /// A DSV quoted field.
    Field,
    Basic,
    TriBasic,
    Literal,
    TriLiteral,
}

#[derive(Debug, Clone, Copy)]
/// The token types the mill itself needs to know to drive dispatch, position tracking and
/// escape handling. Every format supplies its own set.
pub struct CoreTypes {
    pub eol: Type,
    pub whitespace: Type,
    pub text: Type,
    pub int: Type,
    pub eof: Type,
    pub escape: Type,
    pub escaped: Type,
    /// Present when the format understands `0x`/`0o`/`0b` radix selectors.
    pub radix_prefix: Option<Type>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EscapeState {
    Start,
    Prefix(usize),
    Digits(usize),
    Suffix(usize),
    Infix,
    LineBreak(usize),
}

/// The state shared between the mill and its channels: the token queue, position counters,
/// the escape machinery and the quote context.
pub struct MillCore {
    queue: TokenQueue,
    types: CoreTypes,
    eol: String,
    keys: Vec<char>,
    escapes: Vec<EscapeScheme>,
    line: usize,
    column: usize,
    line_bump: bool,
    escape_count: usize,
    escape_scheme: Option<usize>,
    escape_state: EscapeState,
    escape_buffer: String,
    escape_start: (usize, usize),
    radix: u32,
    quote: QuoteContext,
    pushback: VecDeque<char>,
    log: OnceCell<Log<&'static str>>,
}

/// The construction parameters common to every mill: the line terminator, the BOM rule, the
/// format's [CoreTypes], its escape encodings and the validated [TypeSet].
pub struct MillGrammar {
    pub eol: String,
    pub bom: bool,
    pub types: CoreTypes,
    pub escapes: Vec<EscapeScheme>,
    pub registry: TypeSet,
}

/// The streaming tokenizer.
///
/// A mill owns a set of [channels](IChannel) keyed by their first character plus the three
/// fallback channels (integer, whitespace, text), and converts a chunked character stream
/// into a [TokenQueue]. At most one channel is active at a time; a new character either
/// extends the active channel's partial value or causes it to commit or cancel before the
/// character is dispatched again.
pub struct Mill {
    channels: Vec<Box<dyn IChannel>>,
    keys: Vec<(char, usize)>,
    int_channel: usize,
    space_channel: usize,
    text_channel: usize,
    active: Option<usize>,
    core: MillCore,
    bom: bool,
    started: bool,
    ended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The slot of a command in a [Commands] table.
pub enum Direction {
    Prefix,
    Infix,
    /// Reserved; no bundled format registers postfix commands.
    Postfix,
}

/// A command run when its token type appears in prefix position.
pub trait IPrefix<E> {
    fn run(&self, head: Token, parser: &mut Pratt<E>) -> Result<E, DataError>;
}

/// A command run when its token type appears in infix position, combining the expression
/// parsed so far with what follows.
pub trait IInfix<E> {
    fn run(&self, left: E, head: Token, parser: &mut Pratt<E>) -> Result<E, DataError>;
}

/// The (direction, type) to command table driving a [Pratt] parser, together with the token
/// types the parser treats as insignificant layout.
pub struct Commands<E> {
    prefix: Vec<(Type, Rc<dyn IPrefix<E>>)>,
    infix: Vec<(Type, Rc<dyn IInfix<E>>)>,
    skip: Vec<Type>,
}

/// The precedence driven top-down parser consuming a [Mill]'s token queue.
pub struct Pratt<'mill, E> {
    mill: &'mill mut Mill,
    commands: Rc<Commands<E>>,
    lookahead: VecDeque<Token>,
    last: Option<Token>,
    prior: Option<Token>,
    log: OnceCell<Log<&'static str>>,
}

#[derive(Debug)]
/// An error returned due to failed validation of a mill grammar, command table or syntax
/// configuration.
pub struct ImplementationError {
    message: String,
    what: String,
}

#[derive(Debug)]
/// The error taxonomy of the crate: one variant per failure stage, each carrying the
/// position data available at that stage and, for parse failures, the boxed underlying
/// cause.
pub enum DataError {
    /// The mill manufactured a token no channel could meaningfully accept.
    Token { token: Token, message: String },
    /// A parser-level failure.
    Parse {
        position: Position,
        message: String,
        cause: Option<Box<DataError>>,
    },
    /// A structural mismatch between the token stream and the grammar.
    Syntax { position: Position, message: String },
    /// A post-parse semantic violation (e.g. an integer exceeding 64 bits).
    Expression {
        position: Option<Position>,
        message: String,
    },
    /// A sink cannot represent a given expression.
    Format { message: String },
    Implementation(ImplementationError),
}
