// coldstart-core - Error types for bootstrap analysis
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Error types for loading bootstrap source.

use coldstart_parser::{HeapError, ParseError, Symbol};
use std::fmt;

/// Result type for bootstrap loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading and analyzing bootstrap source.
#[derive(Debug, Clone)]
pub enum Error {
    /// Undefined symbol reference
    UndefinedSymbol(Symbol),
    /// Invalid special form syntax
    InvalidSyntax { form: &'static str, message: String },
    /// Form the bootstrap analyzer does not evaluate
    Unsupported(String),
    /// Type tag or catch clause naming a type the runtime does not register
    UnknownType(String),
    /// Reader failure
    Parse(ParseError),
    /// Malformed heap structure
    Heap(HeapError),
    /// Internal error - invariant violation
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UndefinedSymbol(sym) => {
                write!(f, "Unable to resolve symbol: {}", sym)
            }
            Error::InvalidSyntax { form, message } => {
                write!(f, "Invalid '{}' syntax: {}", form, message)
            }
            Error::Unsupported(what) => {
                write!(f, "Unsupported: {}", what)
            }
            Error::UnknownType(name) => {
                write!(f, "Unknown type: {}", name)
            }
            Error::Parse(e) => write!(f, "{}", e),
            Error::Heap(e) => write!(f, "{}", e),
            Error::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<HeapError> for Error {
    fn from(e: HeapError) -> Self {
        Error::Heap(e)
    }
}

impl Error {
    /// Create an invalid syntax error.
    pub fn syntax(form: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidSyntax {
            form,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::UndefinedSymbol(Symbol::new("foo")).to_string(),
            "Unable to resolve symbol: foo"
        );
        assert_eq!(
            Error::syntax("let", "bindings must be a vector").to_string(),
            "Invalid 'let' syntax: bindings must be a vector"
        );
    }
}
