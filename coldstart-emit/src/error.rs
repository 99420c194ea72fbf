// coldstart-emit - Error types for emission and reconstruction
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Error types for snapshot emission and reconstruction.

use std::fmt;

use coldstart_parser::{HeapError, Symbol};

/// Result type for emission.
pub type Result<T> = std::result::Result<T, EmitError>;

/// How an emission error affects the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reported and skipped; the batch continues.
    Skip,
    /// The definition being emitted is rolled back; the batch continues.
    AbortSymbol,
    /// The batch stops.
    Fatal,
}

/// Errors raised while recording forms or emitting definitions.
#[derive(Debug, Clone, PartialEq)]
pub enum EmitError {
    /// Top-level form whose head is not a recognized defining construct.
    UnsupportedForm { head: String },
    /// Top-level form skipped: not a list, no symbol head, or an ignored head.
    SkippedForm { form: String, reason: &'static str },
    /// `ns` / `in-ns` without a usable namespace name.
    MalformedNamespace { form: String },
    /// Defining form without a symbol to define.
    MalformedDefinition { head: String },
    /// Recorded definition not found at finish time.
    UnresolvedSymbol { ns: String, symbol: Symbol },
    /// Expression kind with no snapshot form.
    UnsupportedExpr {
        kind: &'static str,
        definition: String,
    },
    /// Namespace value other than the core namespace.
    UnsupportedNamespace { name: String, definition: String },
    /// Malformed heap structure.
    Heap(HeapError),
}

impl EmitError {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            EmitError::SkippedForm { .. }
            | EmitError::MalformedNamespace { .. }
            | EmitError::MalformedDefinition { .. }
            | EmitError::UnresolvedSymbol { .. } => Severity::Skip,
            EmitError::UnsupportedExpr { .. } | EmitError::UnsupportedNamespace { .. } => {
                Severity::AbortSymbol
            }
            EmitError::UnsupportedForm { .. } | EmitError::Heap(_) => Severity::Fatal,
        }
    }
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::UnsupportedForm { head } => {
                write!(f, "Unsupported top-level form: {}", head)
            }
            EmitError::SkippedForm { form, reason } => {
                write!(f, "Skipped {}: {}", form, reason)
            }
            EmitError::MalformedNamespace { form } => {
                write!(f, "Expected a namespace name in {}", form)
            }
            EmitError::MalformedDefinition { head } => {
                write!(f, "Expected a symbol to define in '{}' form", head)
            }
            EmitError::UnresolvedSymbol { ns, symbol } => {
                write!(f, "Cannot find {} in namespace {}", symbol, ns)
            }
            EmitError::UnsupportedExpr { kind, definition } => {
                write!(f, "{} cannot be emitted (in {})", kind, definition)
            }
            EmitError::UnsupportedNamespace { name, definition } => {
                write!(
                    f,
                    "Only the core namespace can be emitted, found {} (in {})",
                    name, definition
                )
            }
            EmitError::Heap(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmitError::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeapError> for EmitError {
    fn from(e: HeapError) -> Self {
        EmitError::Heap(e)
    }
}

/// Errors raised while rebuilding a graph from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructError {
    /// Reference to a declaration that does not exist or comes later.
    UnknownDecl(String),
    /// Type name missing from the live type registry.
    UnknownType(String),
    /// Native procedure missing from the live native table.
    UnknownNative(String),
    /// Declaration of an unexpected kind.
    WrongKind {
        decl: String,
        expected: &'static str,
        got: String,
    },
    /// Required field missing from a declaration.
    MissingField { decl: String, field: &'static str },
    /// Fixup targeting a field that cannot take the value.
    BadTarget { target: String, reason: &'static str },
}

impl fmt::Display for ReconstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructError::UnknownDecl(name) => write!(f, "Unknown declaration: {}", name),
            ReconstructError::UnknownType(name) => write!(f, "Unknown type: {}", name),
            ReconstructError::UnknownNative(name) => write!(f, "Unknown native: {}", name),
            ReconstructError::WrongKind {
                decl,
                expected,
                got,
            } => write!(f, "{}: expected {}, got {}", decl, expected, got),
            ReconstructError::MissingField { decl, field } => {
                write!(f, "{}: missing field '{}'", decl, field)
            }
            ReconstructError::BadTarget { target, reason } => {
                write!(f, "Cannot assign {}: {}", target, reason)
            }
        }
    }
}

impl std::error::Error for ReconstructError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        let unresolved = EmitError::UnresolvedSymbol {
            ns: "user".into(),
            symbol: Symbol::new("x"),
        };
        assert_eq!(unresolved.severity(), Severity::Skip);
        let meta = EmitError::UnsupportedExpr {
            kind: "MetaExpr",
            definition: "user/x".into(),
        };
        assert_eq!(meta.severity(), Severity::AbortSymbol);
        let form = EmitError::UnsupportedForm {
            head: "doseq".into(),
        };
        assert_eq!(form.severity(), Severity::Fatal);
    }

    #[test]
    fn test_display() {
        let err = EmitError::UnresolvedSymbol {
            ns: "user".into(),
            symbol: Symbol::new("x"),
        };
        assert_eq!(err.to_string(), "Cannot find x in namespace user");
    }
}
