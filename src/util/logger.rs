use std::fmt::{Debug, Display, Formatter};

use crate::Token;

use super::Log;

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

impl<T> Log<T> {
    /// Function which return order of the log.
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }
}

impl<TL: Display> Log<TL> {
    pub fn log_token(&self, _token: &Token) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Success(()).order() {
            println!(
                "[{}; TokenSuccess]: {:?}({:?}) at {}",
                self,
                _token.kind,
                _token.value,
                _token.position()
            )
        }
    }

    pub fn log_failure<T: Debug>(&self, _what: &T, _at: crate::Position) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Result(()).order() {
            println!("[{}; Error]: {:?} at {}", self, _what, _at)
        }
    }
}
