use crate::mill::{IntChannel, SpaceChannel, TextChannel};
use crate::{
    CoreTypes, Decision, EscapeScheme, EscapeState, IChannel, ImplementationError, Log, Mill,
    MillCore, MillGrammar, Position, QuoteContext, Token, TokenQueue, Type,
};
use once_cell::unsync::OnceCell;
use std::collections::VecDeque;

impl QuoteContext {
    /// Whether the open region takes its content verbatim, with no escape processing.
    pub fn is_verbatim(&self) -> bool {
        matches!(self, QuoteContext::Literal | QuoteContext::TriLiteral)
    }
}

impl MillCore {
    fn new(types: CoreTypes, eol: String, escapes: Vec<EscapeScheme>) -> Self {
        Self {
            queue: TokenQueue::new(),
            types,
            eol,
            keys: Vec::new(),
            escapes,
            line: 1,
            column: 1,
            line_bump: false,
            escape_count: 0,
            escape_scheme: None,
            escape_state: EscapeState::Start,
            escape_buffer: String::new(),
            escape_start: (1, 1),
            radix: 10,
            quote: QuoteContext::Closed,
            pushback: VecDeque::new(),
            log: OnceCell::new(),
        }
    }

    pub fn types(&self) -> &CoreTypes {
        &self.types
    }

    /// The (line, column) the next observed character will be recorded at.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    pub fn set_radix(&mut self, radix: u32) {
        self.radix = radix;
    }

    pub fn quote(&self) -> QuoteContext {
        self.quote
    }

    pub fn set_quote(&mut self, quote: QuoteContext) {
        self.quote = quote;
    }

    /// Whether a channel is registered for the character.
    pub fn is_key(&self, ch: char) -> bool {
        self.keys.binary_search(&ch).is_ok()
    }

    pub fn eol_start(&self) -> char {
        self.eol.chars().next().unwrap_or('\n')
    }

    /// Manufacture a token and append it to the queue.
    ///
    /// Emitting the line terminator advances the line counter (through the pending bump
    /// applied when its last character is consumed) and, like whitespace, restores the
    /// default radix.
    pub fn emit(&mut self, kind: Type, value: String, start: (usize, usize)) {
        let token = Token::new(value, kind, start.0, self.line, start.1);
        if kind == self.types.eol {
            self.line_bump = true;
            self.radix = 10;
        } else if kind == self.types.whitespace {
            self.radix = 10;
        }
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            log.log_token(&token);
        }
        self.queue.push(token);
    }

    fn advance(&mut self) {
        if self.line_bump {
            self.line += 1;
            self.column = 1;
            self.line_bump = false;
        } else {
            self.column += 1;
        }
    }

    /// Open escape mode for the given scheme; the next characters are collected into the
    /// escape buffer until it commits as a single ESCAPED token.
    pub fn open_escape(&mut self, scheme: usize) {
        self.escape_count += 1;
        self.escape_scheme = Some(scheme);
        self.escape_state = EscapeState::Start;
        self.escape_buffer.clear();
    }

    /// Whether the escape counter is odd, i.e. the next character belongs to an escape.
    pub fn escape_open(&self) -> bool {
        self.escape_count % 2 == 1
    }

    fn commit_escape(&mut self) {
        let value = std::mem::take(&mut self.escape_buffer);
        let kind = self.types.escaped;
        let start = self.escape_start;
        self.emit(kind, value, start);
        self.escape_count += 1;
        self.escape_scheme = None;
        self.escape_state = EscapeState::Start;
    }

    fn commit_escape_line(&mut self) {
        self.commit_escape();
        self.line += 1;
        self.column = 1;
    }

    fn try_commit_infix(&mut self, scheme: &EscapeScheme) {
        let exact = scheme.infixes.iter().any(|i| *i == self.escape_buffer);
        let longer = scheme
            .infixes
            .iter()
            .any(|i| i.len() > self.escape_buffer.len() && i.starts_with(&self.escape_buffer));
        if exact && !longer && scheme.suffix.is_empty() {
            self.commit_escape();
        }
    }

    /// An invalid radix escape before `min` digits: the consumed digits and the offending
    /// character are re-prepended to the source, the column counter is rewound, and the
    /// ESCAPED token carries only the prefix.
    fn invalidate_escape(&mut self, scheme: &EscapeScheme, ch: char) {
        let prefix_len = scheme.prefix.chars().count();
        let digits: Vec<char> = self.escape_buffer.chars().skip(prefix_len).collect();
        self.pushback.push_front(ch);
        for c in digits.iter().rev() {
            self.pushback.push_front(*c);
            self.column -= 1;
        }
        self.escape_buffer = self.escape_buffer.chars().take(prefix_len).collect();
        self.commit_escape();
    }

    fn feed_escape(&mut self, ch: char) {
        let index = match self.escape_scheme {
            Some(i) => i,
            None => {
                // the counter is odd but no scheme is active; treat as a bare escape
                self.escape_buffer.push(ch);
                self.column += 1;
                self.commit_escape();
                return;
            }
        };
        let scheme = self.escapes[index].clone();
        match self.escape_state {
            EscapeState::Start => {
                self.escape_start = (self.line, self.column);
                // several schemes may share an operator and differ in their selector
                if let Some(better) = self.reselect(&scheme, ch) {
                    self.escape_scheme = Some(better);
                    let scheme = self.escapes[better].clone();
                    self.start_escape(&scheme, ch);
                } else {
                    self.start_escape(&scheme, ch);
                }
            }
            EscapeState::Prefix(got) => {
                if scheme.prefix.chars().nth(got) == Some(ch) {
                    self.escape_buffer.push(ch);
                    self.column += 1;
                    if got + 1 == scheme.prefix.chars().count() {
                        self.escape_state = EscapeState::Digits(0);
                    } else {
                        self.escape_state = EscapeState::Prefix(got + 1);
                    }
                } else {
                    self.commit_escape();
                    self.pushback.push_front(ch);
                }
            }
            EscapeState::Digits(count) => {
                if count < scheme.max && ch.is_digit(scheme.radix) {
                    self.escape_buffer.push(ch);
                    self.column += 1;
                    if count + 1 == scheme.max {
                        if scheme.suffix.is_empty() {
                            self.commit_escape();
                        } else {
                            self.escape_state = EscapeState::Suffix(0);
                        }
                    } else {
                        self.escape_state = EscapeState::Digits(count + 1);
                    }
                } else if !scheme.suffix.is_empty()
                    && scheme.suffix.chars().next() == Some(ch)
                    && count >= scheme.min
                {
                    self.column += 1;
                    if scheme.suffix.chars().count() == 1 {
                        self.commit_escape();
                    } else {
                        self.escape_state = EscapeState::Suffix(1);
                    }
                } else if count >= scheme.min {
                    // enough digits; the stray character simply ends the escape
                    self.commit_escape();
                    self.pushback.push_front(ch);
                } else {
                    self.invalidate_escape(&scheme, ch);
                }
            }
            EscapeState::Suffix(got) => {
                if scheme.suffix.chars().nth(got) == Some(ch) {
                    self.column += 1;
                    if got + 1 == scheme.suffix.chars().count() {
                        self.commit_escape();
                    } else {
                        self.escape_state = EscapeState::Suffix(got + 1);
                    }
                } else {
                    self.pushback.push_front(ch);
                    let matched: Vec<char> = scheme.suffix.chars().take(got).collect();
                    for c in matched.iter().rev() {
                        self.pushback.push_front(*c);
                        self.column -= 1;
                    }
                    self.commit_escape();
                }
            }
            EscapeState::Infix => {
                let mut candidate = self.escape_buffer.clone();
                candidate.push(ch);
                if scheme.infixes.iter().any(|i| i.starts_with(&candidate)) {
                    self.escape_buffer.push(ch);
                    self.column += 1;
                    self.try_commit_infix(&scheme);
                } else if scheme.infixes.iter().any(|i| *i == self.escape_buffer)
                    && !scheme.suffix.is_empty()
                    && scheme.suffix.chars().next() == Some(ch)
                {
                    self.column += 1;
                    if scheme.suffix.chars().count() == 1 {
                        self.commit_escape();
                    } else {
                        self.escape_state = EscapeState::Suffix(1);
                    }
                } else {
                    self.commit_escape();
                    self.pushback.push_front(ch);
                }
            }
            EscapeState::LineBreak(got) => {
                if self.eol.chars().nth(got) == Some(ch) {
                    self.escape_buffer.push(ch);
                    self.column += 1;
                    if got + 1 == self.eol.chars().count() {
                        self.commit_escape_line();
                    } else {
                        self.escape_state = EscapeState::LineBreak(got + 1);
                    }
                } else {
                    self.commit_escape();
                    self.pushback.push_front(ch);
                }
            }
        }
    }

    fn start_escape(&mut self, scheme: &EscapeScheme, ch: char) {
        if !scheme.prefix.is_empty() && scheme.prefix.chars().next() == Some(ch) {
            self.escape_buffer.push(ch);
            self.column += 1;
            self.escape_state = if scheme.prefix.chars().count() == 1 {
                EscapeState::Digits(0)
            } else {
                EscapeState::Prefix(1)
            };
        } else if scheme.prefix.is_empty() && scheme.max > 0 && ch.is_digit(scheme.radix) {
            self.escape_buffer.push(ch);
            self.column += 1;
            if scheme.max == 1 && scheme.suffix.is_empty() {
                self.commit_escape();
            } else {
                self.escape_state = EscapeState::Digits(1);
            }
        } else if ch == self.eol_start() {
            self.escape_buffer.push(ch);
            self.column += 1;
            if self.eol.chars().count() == 1 {
                self.commit_escape_line();
            } else {
                self.escape_state = EscapeState::LineBreak(1);
            }
        } else if scheme.infixes.iter().any(|i| i.starts_with(ch)) {
            self.escape_buffer.push(ch);
            self.column += 1;
            self.escape_state = EscapeState::Infix;
            self.try_commit_infix(scheme);
        } else {
            // not a recognized selector: the single character is the whole escape
            self.escape_buffer.push(ch);
            self.column += 1;
            self.commit_escape();
        }
    }

    /// Among the schemes sharing the active operator, pick the one whose selector matches
    /// the first escaped character.
    fn reselect(&self, current: &EscapeScheme, ch: char) -> Option<usize> {
        if !current.prefix.is_empty() && current.prefix.chars().next() == Some(ch) {
            return None;
        }
        self.escapes
            .iter()
            .position(|s| {
                s.operator == current.operator
                    && !s.prefix.is_empty()
                    && s.prefix.chars().next() == Some(ch)
            })
    }
}

impl Mill {
    /// Create a new mill for a format's grammar. The integer, whitespace and text fallback
    /// channels are always present; keyed channels are added with [add_channel](Mill::add_channel).
    pub fn new(grammar: MillGrammar) -> Result<Self, ImplementationError> {
        match grammar.eol.as_str() {
            "\r" | "\n" | "\r\n" => {}
            other => {
                return Err(ImplementationError::new(
                    "Mill".into(),
                    format!("Line terminator {:?} is not supported.", other),
                ))
            }
        }
        let types = grammar.types;
        for kind in [
            types.eol,
            types.whitespace,
            types.text,
            types.int,
            types.eof,
            types.escape,
            types.escaped,
        ] {
            if !grammar.registry.contains(kind) {
                return Err(ImplementationError::new(
                    "Mill".into(),
                    format!("Core type '{}' is missing from the registry.", kind),
                ));
            }
        }
        let core = MillCore::new(types, grammar.eol.clone(), grammar.escapes);
        let mut channels: Vec<Box<dyn IChannel>> = Vec::new();
        let int_channel = channels.len();
        channels.push(Box::new(IntChannel::new()));
        let space_channel = channels.len();
        channels.push(Box::new(SpaceChannel::new()));
        let text_channel = channels.len();
        channels.push(Box::new(TextChannel::new()));
        let mut mill = Self {
            channels,
            keys: Vec::new(),
            int_channel,
            space_channel,
            text_channel,
            active: None,
            core,
            bom: grammar.bom,
            started: false,
            ended: false,
        };
        let eol_channel = crate::mill::Aggregate::new(
            vec![(grammar.eol.as_str(), types.eol)],
            types.whitespace,
        );
        let key = grammar.eol.chars().next().unwrap();
        mill.add_channel(Box::new(eol_channel), &[key])?;
        Ok(mill)
    }

    /// Register a channel for the characters it is dispatched on.
    pub fn add_channel(
        &mut self,
        channel: Box<dyn IChannel>,
        keys: &[char],
    ) -> Result<(), ImplementationError> {
        let index = self.channels.len();
        self.channels.push(channel);
        for &key in keys {
            match self.keys.binary_search_by_key(&key, |e| e.0) {
                Ok(_) => {
                    return Err(ImplementationError::new(
                        "Mill".into(),
                        format!("A channel is already registered for {:?}.", key),
                    ))
                }
                Err(at) => self.keys.insert(at, (key, index)),
            }
            if let Err(at) = self.core.keys.binary_search(&key) {
                self.core.keys.insert(at, key);
            }
        }
        Ok(())
    }

    pub fn has_channel(&self, key: char) -> bool {
        self.keys.binary_search_by_key(&key, |e| e.0).is_ok()
    }

    /// Append a chunk to the source and drain it character by character. Chunks may split
    /// the document at any character boundary; the token stream is unaffected.
    pub fn process(&mut self, chunk: &str) {
        for ch in chunk.chars() {
            if !self.started {
                self.started = true;
                if self.bom && ch == '\u{FEFF}' {
                    continue;
                }
            }
            self.step(ch);
            self.drain();
        }
    }

    fn drain(&mut self) {
        while let Some(ch) = self.core.pushback.pop_front() {
            self.step(ch);
        }
    }

    fn step(&mut self, ch: char) {
        if self.core.escape_open() {
            self.core.feed_escape(ch);
            return;
        }
        if let Some(index) = self.active {
            match self.channels[index].feed(ch, &mut self.core) {
                Decision::Consumed => {
                    self.core.advance();
                    if !self.channels[index].is_pending() {
                        self.active = None;
                    }
                    return;
                }
                Decision::Rejected => {
                    self.active = None;
                }
            }
            // a rejecting channel may have opened escape mode (quote doubling)
            if self.core.escape_open() {
                self.core.feed_escape(ch);
                return;
            }
        }
        let index = self.route(ch);
        match self.channels[index].feed(ch, &mut self.core) {
            Decision::Consumed => {
                self.core.advance();
                if self.channels[index].is_pending() {
                    self.active = Some(index);
                }
            }
            Decision::Rejected => {
                // nothing accepted the character; it stands alone as text
                let start = self.core.position();
                let kind = self.core.types.text;
                self.core.emit(kind, ch.to_string(), start);
                self.core.advance();
            }
        }
    }

    fn route(&self, ch: char) -> usize {
        match self.keys.binary_search_by_key(&ch, |e| e.0) {
            Ok(index) => self.keys[index].1,
            Err(_) => {
                if ch.is_digit(self.core.radix) {
                    self.int_channel
                } else if ch.is_whitespace() {
                    self.space_channel
                } else {
                    self.text_channel
                }
            }
        }
    }

    /// Flush: force any partially built token to commit by feeding a synthetic line
    /// terminator, so that the last real token is always followed by EOL.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        for _ in 0..2 {
            let pending = self
                .active
                .map_or(false, |index| self.channels[index].is_pending())
                || self.core.escape_open();
            let terminated = match self.core.queue.last() {
                Some(token) => token.kind == self.core.types.eol,
                None => true,
            };
            if !pending && terminated {
                break;
            }
            let eol = self.core.eol.clone();
            for ch in eol.chars() {
                self.step(ch);
            }
            self.drain();
        }
        self.ended = true;
    }

    /// Pop the head of the queue; once drained the synthesized end-of-file token is
    /// returned forever.
    pub fn next(&mut self) -> Token {
        match self.core.queue.pop() {
            Some(token) => token,
            None => Token::new(
                String::new(),
                self.core.types.eof,
                self.core.line,
                self.core.line,
                self.core.column,
            ),
        }
    }

    /// Read-only view of the token queue.
    pub fn processed(&self) -> &TokenQueue {
        &self.core.queue
    }

    /// The source characters held back but not yet turned into tokens (diagnostics).
    pub fn unprocessed(&self) -> String {
        let mut rest: String = self.core.pushback.iter().collect();
        if let Some(index) = self.active {
            rest.push_str(self.channels[index].pending_value());
        }
        rest
    }

    pub fn frequency(&self, kind: Type) -> usize {
        self.core.queue.frequency(kind)
    }

    pub fn index_of(&self, kind: Type) -> Option<usize> {
        self.core.queue.index_of(kind)
    }

    pub fn last_index_of(&self, kind: Type) -> Option<usize> {
        self.core.queue.last_index_of(kind)
    }

    pub fn position(&self) -> Position {
        Position::new(self.core.line, self.core.column)
    }

    /// Set a log label to debug token production.
    pub fn set_log(&self, log: Log<&'static str>) -> Result<(), String> {
        self.core
            .log
            .set(log)
            .map_err(|err| format!("Log label {} is already assigned.", err))
    }
}
