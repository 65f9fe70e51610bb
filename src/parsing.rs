use crate::{
    Commands, DataError, Direction, IInfix, IPrefix, ImplementationError, Log, Mill, Position,
    Pratt, Token, Type,
};
use once_cell::unsync::OnceCell;
use std::collections::VecDeque;
use std::rc::Rc;

impl<E> Commands<E> {
    pub fn new() -> Self {
        Self {
            prefix: Vec::new(),
            infix: Vec::new(),
            skip: Vec::new(),
        }
    }

    /// Register the command run when `kind` appears in prefix position.
    pub fn add_prefix(
        &mut self,
        kind: Type,
        command: Rc<dyn IPrefix<E>>,
    ) -> Result<(), ImplementationError> {
        match self.prefix.binary_search_by(|e| e.0.cmp(&kind)) {
            Ok(_) => Err(ImplementationError::new(
                "Commands".into(),
                format!("A prefix command is already registered for '{}'.", kind),
            )),
            Err(at) => {
                self.prefix.insert(at, (kind, command));
                Ok(())
            }
        }
    }

    /// Register the command run when `kind` appears in infix position.
    pub fn add_infix(
        &mut self,
        kind: Type,
        command: Rc<dyn IInfix<E>>,
    ) -> Result<(), ImplementationError> {
        match self.infix.binary_search_by(|e| e.0.cmp(&kind)) {
            Ok(_) => Err(ImplementationError::new(
                "Commands".into(),
                format!("An infix command is already registered for '{}'.", kind),
            )),
            Err(at) => {
                self.infix.insert(at, (kind, command));
                Ok(())
            }
        }
    }

    /// Mark a token type as insignificant layout which the parser may drop between
    /// expressions.
    pub fn add_skip(&mut self, kind: Type) {
        if let Err(at) = self.skip.binary_search(&kind) {
            self.skip.insert(at, kind);
        }
    }

    pub fn prefix_of(&self, kind: Type) -> Option<Rc<dyn IPrefix<E>>> {
        self.prefix
            .binary_search_by(|e| e.0.cmp(&kind))
            .ok()
            .map(|i| Rc::clone(&self.prefix[i].1))
    }

    pub fn infix_of(&self, kind: Type) -> Option<Rc<dyn IInfix<E>>> {
        self.infix
            .binary_search_by(|e| e.0.cmp(&kind))
            .ok()
            .map(|i| Rc::clone(&self.infix[i].1))
    }

    pub fn is_skip(&self, kind: Type) -> bool {
        self.skip.binary_search(&kind).is_ok()
    }

    /// Whether a command is registered in the given slot.
    pub fn has(&self, direction: Direction, kind: Type) -> bool {
        match direction {
            Direction::Prefix => self.prefix.binary_search_by(|e| e.0.cmp(&kind)).is_ok(),
            Direction::Infix => self.infix.binary_search_by(|e| e.0.cmp(&kind)).is_ok(),
            Direction::Postfix => false,
        }
    }
}

impl<E> Default for Commands<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'mill, E> Pratt<'mill, E> {
    pub fn new(mill: &'mill mut Mill, commands: Rc<Commands<E>>) -> Self {
        Self {
            mill,
            commands,
            lookahead: VecDeque::new(),
            last: None,
            prior: None,
            log: OnceCell::new(),
        }
    }

    fn fill(&mut self, upto: usize) {
        while self.lookahead.len() <= upto {
            let token = self.mill.next();
            self.lookahead.push_back(token);
        }
    }

    /// Ensure the lookahead holds at least `k + 1` tokens and return the k-th without
    /// removing it.
    pub fn peek(&mut self, k: usize) -> &Token {
        self.fill(k);
        &self.lookahead[k]
    }

    /// Remove and return the next token.
    pub fn pop(&mut self) -> Token {
        self.fill(0);
        let token = self.lookahead.pop_front().unwrap();
        self.prior = self.last.take();
        self.last = Some(token.clone());
        token
    }

    /// Whether `head` directly follows the token consumed before it, with nothing (not
    /// even dropped layout) in between. Adjacency-sensitive infix commands consult this
    /// before joining.
    pub fn follows(&self, head: &Token) -> bool {
        match &self.prior {
            Some(prior) => !self.commands.is_skip(prior.kind) && prior.abuts(head),
            None => false,
        }
    }

    fn drop_skipped(&mut self) {
        loop {
            let kind = self.peek(0).kind;
            if self.commands.is_skip(kind) {
                self.pop();
            } else {
                break;
            }
        }
    }

    /// Non-consuming check of the next significant token's type.
    pub fn matches(&mut self, kind: Type) -> bool {
        self.drop_skipped();
        self.peek(0).kind == kind
    }

    /// Pop the next significant token, erroring when its type differs from the expectation.
    pub fn consume(&mut self, kind: Type) -> Result<Token, DataError> {
        self.drop_skipped();
        let token = self.pop();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(DataError::syntax(
                token.position(),
                format!(
                    "Expected '{}' but found '{}'({:?}).",
                    kind, token.kind, token.value
                ),
            ))
        }
    }

    /// Position of the next significant token.
    pub fn position(&mut self) -> Position {
        self.drop_skipped();
        self.peek(0).position()
    }

    /// Parse one expression.
    ///
    /// The next token is popped and run through its prefix command; then, while the
    /// precedence carried by the next token's type exceeds `start_precedence` and an infix
    /// command is registered for it, the token is popped and its command combines the
    /// expression parsed so far with what follows. Precedence `0` (and the synthesized
    /// end-of-file token) always terminates.
    pub fn parse(&mut self, start_precedence: u32) -> Result<E, DataError> {
        self.drop_skipped();
        let head = self.pop();
        #[cfg(debug_assertions)]
        if let Some(log) = self.log.get() {
            if log.order() >= Log::Verbose(()).order() {
                println!("[{}; Parse]: prefix {}({:?})", log, head.kind, head.value);
            }
        }
        let command = self.commands.prefix_of(head.kind).ok_or_else(|| {
            DataError::syntax(
                head.position(),
                format!("Unexpected '{}'({:?}).", head.kind, head.value),
            )
        })?;
        let mut left = command.run(head, self)?;
        loop {
            self.drop_skipped();
            let kind = self.peek(0).kind;
            if kind.precedence() <= start_precedence {
                break;
            }
            let command = match self.commands.infix_of(kind) {
                Some(command) => command,
                None => break,
            };
            let head = self.pop();
            left = command.run(left, head, self)?;
        }
        Ok(left)
    }

    /// Set a log label to debug the parse.
    pub fn set_log(&self, log: Log<&'static str>) -> Result<(), String> {
        self.log
            .set(log)
            .map_err(|err| format!("Log label {} is already assigned.", err))
    }
}
