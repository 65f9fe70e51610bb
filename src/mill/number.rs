use super::IntChannel;
use crate::{Decision, IChannel, MillCore};

impl IntChannel {
    pub fn new() -> Self {
        Self {
            partial: String::new(),
            start: (1, 1),
        }
    }
}

impl IChannel for IntChannel {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.partial.is_empty() {
            self.start = core.position();
        }
        if let Some(kind) = core.types().radix_prefix {
            // a lone leading zero followed by a selector switches the active radix
            if self.partial == "0" && core.radix() == 10 && matches!(ch, 'x' | 'o' | 'b') {
                let radix = match ch {
                    'x' => 16,
                    'o' => 8,
                    _ => 2,
                };
                let mut value = std::mem::take(&mut self.partial);
                value.push(ch);
                core.emit(kind, value, self.start);
                core.set_radix(radix);
                return Decision::Consumed;
            }
        }
        if ch.is_digit(core.radix()) {
            self.partial.push(ch);
            return Decision::Consumed;
        }
        let value = std::mem::take(&mut self.partial);
        let kind = core.types().int;
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
