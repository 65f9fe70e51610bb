use super::Aggregate;
use crate::{Decision, IChannel, MillCore, Type};

impl Aggregate {
    /// Create a new [Aggregate] channel for a set of fixed lexemes sharing their first
    /// character.
    /// ## Arguments
    /// * `targets` - The lexemes and the token types they commit as.
    /// * `fallback` - The token type a dead-end partial value is committed as.
    pub fn new(targets: Vec<(&str, Type)>, fallback: Type) -> Self {
        let mut targets: Vec<(String, Type)> =
            targets.into_iter().map(|(s, t)| (s.to_string(), t)).collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            targets,
            fallback,
            partial: String::new(),
            start: (1, 1),
        }
    }

    fn is_prefix(&self, candidate: &str) -> bool {
        self.targets.iter().any(|(s, _)| s.starts_with(candidate))
    }

    fn exact(&self, value: &str) -> Option<Type> {
        self.targets
            .iter()
            .find(|(s, _)| s == value)
            .map(|(_, t)| *t)
    }

    fn has_longer(&self, value: &str) -> bool {
        self.targets
            .iter()
            .any(|(s, _)| s.len() > value.len() && s.starts_with(value))
    }
}

impl IChannel for Aggregate {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.partial.is_empty() {
            self.start = core.position();
        }
        let mut candidate = self.partial.clone();
        candidate.push(ch);
        if self.is_prefix(&candidate) {
            self.partial = candidate;
            if let Some(kind) = self.exact(&self.partial) {
                if !self.has_longer(&self.partial) {
                    let value = std::mem::take(&mut self.partial);
                    core.emit(kind, value, self.start);
                }
            }
            return Decision::Consumed;
        }
        let value = std::mem::take(&mut self.partial);
        match self.exact(&value) {
            Some(kind) => core.emit(kind, value, self.start),
            None => core.emit(self.fallback, value, self.start),
        }
        Decision::Rejected
    }

    fn is_pending(&self) -> bool {
        !self.partial.is_empty()
    }

    fn pending_value(&self) -> &str {
        &self.partial
    }
}
