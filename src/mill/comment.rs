use super::CommentChannel;
use crate::{Decision, IChannel, MillCore, QuoteContext, Type};

impl CommentChannel {
    pub fn new(kind: Type) -> Self {
        Self {
            kind,
            partial: String::new(),
            start: (1, 1),
        }
    }
}

impl IChannel for CommentChannel {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.partial.is_empty() {
            self.start = core.position();
            // inside any quoted region the marker is plain content
            if core.quote() != QuoteContext::Closed {
                let kind = core.types().text;
                core.emit(kind, ch.to_string(), self.start);
                return Decision::Consumed;
            }
            self.partial.push(ch);
            return Decision::Consumed;
        }
        if ch == core.eol_start() {
            let value = std::mem::take(&mut self.partial);
            core.emit(self.kind, value, self.start);
            return Decision::Rejected;
        }
        self.partial.push(ch);
        Decision::Consumed
    }

    fn is_pending(&self) -> bool {
        !self.partial.is_empty()
    }

    fn pending_value(&self) -> &str {
        &self.partial
    }
}
