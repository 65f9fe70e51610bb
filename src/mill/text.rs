use super::{SpaceChannel, TextChannel};
use crate::{Decision, IChannel, MillCore};

impl TextChannel {
    pub fn new() -> Self {
        Self {
            partial: String::new(),
            start: (1, 1),
        }
    }
}

impl IChannel for TextChannel {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.partial.is_empty() {
            self.start = core.position();
        }
        if core.is_key(ch) || ch.is_whitespace() {
            let value = std::mem::take(&mut self.partial);
            let kind = core.types().text;
            core.emit(kind, value, self.start);
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

impl SpaceChannel {
    pub fn new() -> Self {
        Self {
            partial: String::new(),
            start: (1, 1),
        }
    }
}

impl IChannel for SpaceChannel {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.partial.is_empty() {
            self.start = core.position();
        }
        if ch.is_whitespace() && !core.is_key(ch) {
            self.partial.push(ch);
            return Decision::Consumed;
        }
        let value = std::mem::take(&mut self.partial);
        let kind = core.types().whitespace;
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
