//! A module consisting of the channel utilities of the mill.
//!
//! A channel is a small sub-state-machine owning one target lexeme (or a family of lexemes
//! sharing a first character). For every observed character a channel either extends its
//! partial value, commits the partial as its target token, or cancels: the partial is
//! committed as a fallback class and the character is dispatched again from scratch. This
//! single rollback rule is what lets two-character line terminators, triple quote runs,
//! radix selectors and `[[`-style double brackets lex correctly with one character of
//! lookahead, even when the source arrives in arbitrary chunks.

mod aggregate;
mod comment;
mod escape;
mod number;
mod quote;
mod text;

#[cfg(test)]
mod __tests__;

use crate::{QuoteContext, Type};

/// A channel matching a family of fixed lexemes sharing a first character, e.g. a
/// configured delimiter, a line terminator, or `[` against `[[`.
///
/// When the partial value stops being a prefix of any target it is committed as the longest
/// exactly matched target, or as the fallback class when nothing matched.
pub struct Aggregate {
    targets: Vec<(String, Type)>,
    fallback: Type,
    partial: String,
    start: (usize, usize),
}

/// The channel for a DSV quote pair whose opening and closing strings are equal.
///
/// Inside a quoted field a fully matched closing quote is held for one character: a second
/// quote beginning right after it is the doubling escape, anything else closes the field.
pub struct DsvQuote {
    quote: String,
    l_kind: Type,
    r_kind: Type,
    doubling: Option<usize>,
    partial: String,
    matched_close: bool,
    start: (usize, usize),
}

/// One side of a DSV quote pair with distinct opening and closing strings.
pub struct QuoteMark {
    value: String,
    kind: Type,
    opens: bool,
    partial: String,
    start: (usize, usize),
}

/// The channel for a TOML-style quote character, counting runs of up to six marks and
/// pairing single against triple delimiters through the shared quote context.
pub struct RunQuote {
    mark: char,
    single: Type,
    triple: Type,
    open_single: QuoteContext,
    open_triple: QuoteContext,
    run: usize,
    start: (usize, usize),
}

/// The channel matching an escape operator. Committing the operator emits an ESCAPE-class
/// token and flips the mill into escape mode; the staged escape text is then collected by
/// the mill core rather than by any channel.
pub struct EscapeLead {
    operator: String,
    scheme: usize,
    partial: String,
    start: (usize, usize),
}

/// The fallback channel for digit runs, also carrying the `0x`/`0o`/`0b` radix selector
/// when the format declares one.
pub struct IntChannel {
    partial: String,
    start: (usize, usize),
}

/// The fallback channel for whitespace runs.
pub struct SpaceChannel {
    partial: String,
    start: (usize, usize),
}

/// The fallback channel for everything no other channel takes.
pub struct TextChannel {
    partial: String,
    start: (usize, usize),
}

/// The channel for a line comment introduced by a marker character and ended by the line
/// terminator.
pub struct CommentChannel {
    kind: Type,
    partial: String,
    start: (usize, usize),
}
