use super::EscapeLead;
use crate::{Decision, EscapeScheme, IChannel, MillCore};

impl EscapeScheme {
    /// Create a new escape encoding.
    /// ## Arguments
    /// * `operator` - The string which opens the escape (e.g. `\` or `&#`).
    /// * `prefix` - The radix selector expected after the operator (e.g. `u`); may be empty.
    /// * `infixes` - The recognized literal sequences (e.g. `n`, `apos`).
    /// * `suffix` - The string closing a radix escape (e.g. `;`); may be empty.
    /// * `min`, `max` - The accepted digit count range.
    /// * `radix` - The radix the digits are validated against.
    pub fn new(
        operator: &str,
        prefix: &str,
        infixes: Vec<&str>,
        suffix: &str,
        min: usize,
        max: usize,
        radix: u32,
    ) -> Self {
        Self {
            operator: operator.to_string(),
            prefix: prefix.to_string(),
            infixes: infixes.into_iter().map(|s| s.to_string()).collect(),
            suffix: suffix.to_string(),
            min,
            max,
            radix,
        }
    }

    /// The doubling encoding used by DSV quotes: the quote escapes itself.
    pub fn doubling(quote: &str) -> Self {
        Self::new(quote, "", vec![quote], "", 0, 0, 10)
    }

    /// Resolve the text captured after the operator into its replacement, if this scheme
    /// recognizes it.
    pub fn resolve(&self, payload: &str) -> Option<String> {
        if !self.prefix.is_empty() {
            if let Some(digits) = payload.strip_prefix(self.prefix.as_str()) {
                if !digits.is_empty() && digits.chars().all(|c| c.is_digit(self.radix)) {
                    return u32::from_str_radix(digits, self.radix)
                        .ok()
                        .and_then(char::from_u32)
                        .map(String::from);
                }
            }
        } else if self.max > 0
            && !payload.is_empty()
            && payload.chars().all(|c| c.is_digit(self.radix))
        {
            return u32::from_str_radix(payload, self.radix)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
        if self.infixes.iter().any(|i| i == payload) {
            let mapped = match payload {
                "n" => "\n",
                "r" => "\r",
                "t" => "\t",
                "b" => "\u{0008}",
                "f" => "\u{000C}",
                "0" => "\0",
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "apos" => "'",
                "quot" => "\"",
                other => other,
            };
            return Some(mapped.to_string());
        }
        if payload == "\n" || payload == "\r" || payload == "\r\n" {
            return Some(payload.to_string());
        }
        None
    }
}

impl EscapeLead {
    pub fn new(operator: &str, scheme: usize) -> Self {
        Self {
            operator: operator.to_string(),
            scheme,
            partial: String::new(),
            start: (1, 1),
        }
    }
}

impl IChannel for EscapeLead {
    fn feed(&mut self, ch: char, core: &mut MillCore) -> Decision {
        if self.partial.is_empty() {
            self.start = core.position();
            // inside a verbatim (literal) string the operator is plain content
            if core.quote().is_verbatim() {
                let kind = core.types().text;
                core.emit(kind, ch.to_string(), self.start);
                return Decision::Consumed;
            }
        }
        let mut candidate = self.partial.clone();
        candidate.push(ch);
        if candidate == self.operator {
            let kind = core.types().escape;
            core.emit(kind, candidate, self.start);
            core.open_escape(self.scheme);
            self.partial.clear();
            return Decision::Consumed;
        }
        if self.operator.starts_with(&candidate) {
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
