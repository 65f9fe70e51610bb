use crate::{DataError, ImplementationError, Position, Token};
use std::error::Error;
use std::fmt::{Display, Formatter};

impl ImplementationError {
    pub fn new(what: String, message: String) -> Self {
        Self { message, what }
    }
}

impl Display for ImplementationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImplementationError: {}-{}", self.what, self.message)
    }
}

impl Error for ImplementationError {}

impl DataError {
    pub fn token(token: Token, message: String) -> Self {
        DataError::Token { token, message }
    }

    pub fn parse(position: Position, message: String, cause: Option<DataError>) -> Self {
        DataError::Parse {
            position,
            message,
            cause: cause.map(Box::new),
        }
    }

    pub fn syntax(position: Position, message: String) -> Self {
        DataError::Syntax { position, message }
    }

    pub fn expression(message: String) -> Self {
        DataError::Expression {
            position: None,
            message,
        }
    }

    pub fn expression_at(position: Position, message: String) -> Self {
        DataError::Expression {
            position: Some(position),
            message,
        }
    }

    pub fn formatting(message: String) -> Self {
        DataError::Format { message }
    }

    /// The most precise source position the error carries, if any.
    pub fn position(&self) -> Option<Position> {
        match self {
            DataError::Token { token, .. } => Some(token.position()),
            DataError::Parse { position, .. } | DataError::Syntax { position, .. } => {
                Some(*position)
            }
            DataError::Expression { position, .. } => *position,
            DataError::Format { .. } | DataError::Implementation(_) => None,
        }
    }
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Token { token, message } => {
                write!(f, "TokenError: {} at {}", message, token.position())
            }
            DataError::Parse {
                position, message, ..
            } => {
                write!(f, "ParseError: {} at {}", message, position)
            }
            DataError::Syntax { position, message } => {
                write!(f, "SyntaxError: {} at {}", message, position)
            }
            DataError::Expression { position, message } => match position {
                Some(p) => write!(f, "ExpressionError: {} at {}", message, p),
                None => write!(f, "ExpressionError: {}", message),
            },
            DataError::Format { message } => write!(f, "FormatError: {}", message),
            DataError::Implementation(err) => write!(f, "{}", err),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataError::Parse { cause, .. } => cause.as_ref().map(|c| c.as_ref() as _),
            _ => None,
        }
    }
}

impl From<ImplementationError> for DataError {
    fn from(err: ImplementationError) -> Self {
        DataError::Implementation(err)
    }
}
