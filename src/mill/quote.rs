use super::{DsvQuote, QuoteMark, RunQuote};
use crate::{Decision, IChannel, MillCore, QuoteContext, Type};

impl DsvQuote {
    /// Create the channel for a quote pair whose opening and closing strings are equal.
    /// ## Arguments
    /// * `quote` - The quote string.
    /// * `l_kind`, `r_kind` - The token types of the opening and closing quote.
    /// * `doubling` - Index of the escape scheme whose operator is the quote itself, when
    ///   the syntax declares quote doubling.
    pub fn new(quote: &str, l_kind: Type, r_kind: Type, doubling: Option<usize>) -> Self {
        Self {
            quote: quote.to_string(),
            l_kind,
            r_kind,
            doubling,
            partial: String::new(),
            matched_close: false,
            start: (1, 1),
        }
    }
}

impl IChannel for DsvQuote {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.matched_close {
            // one character decides: a second quote is the doubling escape, anything
            // else closes the field
            if self.quote.starts_with(ch) {
                if let Some(scheme) = self.doubling {
                    let value = std::mem::take(&mut self.partial);
                    let kind = core.types().escape;
                    core.emit(kind, value, self.start);
                    core.open_escape(scheme);
                    self.matched_close = false;
                    return Decision::Rejected;
                }
            }
            let value = std::mem::take(&mut self.partial);
            core.emit(self.r_kind, value, self.start);
            core.set_quote(QuoteContext::Closed);
            self.matched_close = false;
            return Decision::Rejected;
        }
        if self.partial.is_empty() {
            self.start = core.position();
        }
        let mut candidate = self.partial.clone();
        candidate.push(ch);
        if candidate == self.quote {
            if core.quote() == QuoteContext::Field {
                if self.doubling.is_some() {
                    // hold the fully matched close for one character of lookahead
                    self.partial = candidate;
                    self.matched_close = true;
                } else {
                    core.emit(self.r_kind, candidate, self.start);
                    core.set_quote(QuoteContext::Closed);
                    self.partial.clear();
                }
            } else {
                core.emit(self.l_kind, candidate, self.start);
                core.set_quote(QuoteContext::Field);
                self.partial.clear();
            }
            return Decision::Consumed;
        }
        if self.quote.starts_with(&candidate) {
            self.partial = candidate;
            return Decision::Consumed;
        }
        let value = std::mem::take(&mut self.partial);
        let kind = core.types().text;
        core.emit(kind, value, self.start);
        Decision::Rejected
    }

    fn is_pending(&self) -> bool {
        !self.partial.is_empty()
    }

    fn pending_value(&self) -> &str {
        &self.partial
    }
}

impl QuoteMark {
    pub fn new(value: &str, kind: Type, opens: bool) -> Self {
        Self {
            value: value.to_string(),
            kind,
            opens,
            partial: String::new(),
            start: (1, 1),
        }
    }
}

impl IChannel for QuoteMark {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.partial.is_empty() {
            self.start = core.position();
        }
        let mut candidate = self.partial.clone();
        candidate.push(ch);
        if candidate == self.value {
            core.emit(self.kind, candidate, self.start);
            core.set_quote(if self.opens {
                QuoteContext::Field
            } else {
                QuoteContext::Closed
            });
            self.partial.clear();
            return Decision::Consumed;
        }
        if self.value.starts_with(&candidate) {
            self.partial = candidate;
            return Decision::Consumed;
        }
        let value = std::mem::take(&mut self.partial);
        let kind = core.types().text;
        core.emit(kind, value, self.start);
        Decision::Rejected
    }

    fn is_pending(&self) -> bool {
        !self.partial.is_empty()
    }

    fn pending_value(&self) -> &str {
        &self.partial
    }
}

impl RunQuote {
    pub fn new(
        mark: char,
        single: Type,
        triple: Type,
        open_single: QuoteContext,
        open_triple: QuoteContext,
    ) -> Self {
        Self {
            mark,
            single,
            triple,
            open_single,
            open_triple,
            run: 0,
            start: (1, 1),
        }
    }

    fn flush(&mut self, core: &mut MillCore) {
        let mut n = std::mem::take(&mut self.run);
        let (line, mut column) = self.start;
        while n > 0 {
            let context = core.quote();
            if context == self.open_triple {
                if n >= 3 {
                    if n > 3 {
                        // everything but the last three marks is string content
                        let kind = core.types().text;
                        core.emit(kind, self.marks(n - 3), (line, column));
                        column += n - 3;
                        n = 3;
                    } else {
                        core.emit(self.triple, self.marks(3), (line, column));
                        core.set_quote(QuoteContext::Closed);
                        column += 3;
                        n = 0;
                    }
                } else {
                    let kind = core.types().text;
                    core.emit(kind, self.marks(n), (line, column));
                    n = 0;
                }
            } else if context == self.open_single {
                core.emit(self.single, self.marks(1), (line, column));
                core.set_quote(QuoteContext::Closed);
                column += 1;
                n -= 1;
            } else if context == QuoteContext::Closed {
                if n >= 3 {
                    core.emit(self.triple, self.marks(3), (line, column));
                    core.set_quote(self.open_triple);
                    column += 3;
                    n -= 3;
                } else {
                    core.emit(self.single, self.marks(1), (line, column));
                    core.set_quote(self.open_single);
                    column += 1;
                    n -= 1;
                }
            } else {
                // a quote character inside a string of the other flavor is content
                let kind = core.types().text;
                core.emit(kind, self.marks(n), (line, column));
                n = 0;
            }
        }
    }

    fn marks(&self, n: usize) -> String {
        std::iter::repeat(self.mark).take(n).collect()
    }
}

impl IChannel for RunQuote {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.run == 0 {
            self.start = core.position();
        }
        if ch == self.mark {
            self.run += 1;
            if self.run == 6 {
                self.flush(core);
            }
            return Decision::Consumed;
        }
        self.flush(core);
        Decision::Rejected
    }

    fn is_pending(&self) -> bool {
        self.run > 0
    }

    fn pending_value(&self) -> &str {
        ""
    }
}
