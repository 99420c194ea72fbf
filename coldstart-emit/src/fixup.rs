// coldstart-emit - Runtime fixup log
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Imperative actions run once, in order, after every static declaration
//! exists.

use std::fmt;
use std::sync::Arc;

use coldstart_parser::{Keyword, Symbol};

use crate::snapshot::{Init, keyword_const, string_const, symbol_const};

/// A field of a declaration, optionally an element of an array field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub decl: String,
    pub field: &'static str,
    pub index: Option<usize>,
}

impl FieldPath {
    pub fn new(decl: &str, field: &'static str) -> Self {
        FieldPath {
            decl: decl.to_string(),
            field,
            index: None,
        }
    }

    pub fn at(decl: &str, field: &'static str, index: usize) -> Self {
        FieldPath {
            decl: decl.to_string(),
            field,
            index: Some(index),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}.{}[{}]", self.decl, self.field, i),
            None => write!(f, "{}.{}", self.decl, self.field),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fixup {
    /// Bind a declared var into its namespace, replacing any existing mapping.
    InternVar {
        ns: Arc<str>,
        symbol: Symbol,
        decl: String,
    },
    /// Make sure a var exists, without a value or expression.
    DeclareVar { ns: Arc<str>, symbol: Symbol },
    /// Store a completed value into a field.
    AssignField { target: FieldPath, value: Init },
    /// Store the live var `ns/symbol`, interning it if needed.
    ResolveVar {
        target: FieldPath,
        ns: Arc<str>,
        symbol: Symbol,
    },
    /// Store the live type registered under `name`.
    ResolveType { target: FieldPath, name: Arc<str> },
    /// Store the namespace current during reconstruction.
    ResolveNamespace { target: FieldPath },
    /// Recompute a keyword's content hash.
    RehashKeyword { keyword: Keyword },
}

impl fmt::Display for Fixup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fixup::InternVar { ns, symbol, decl } => write!(
                f,
                "intern {} {} = {}",
                string_const(ns),
                symbol_const(symbol),
                decl
            ),
            Fixup::DeclareVar { ns, symbol } => {
                write!(f, "declare {} {}", string_const(ns), symbol_const(symbol))
            }
            Fixup::AssignField { target, value } => write!(f, "{} = {}", target, value),
            Fixup::ResolveVar { target, ns, symbol } => write!(
                f,
                "{} = var({}, {})",
                target,
                string_const(ns),
                symbol_const(symbol)
            ),
            Fixup::ResolveType { target, name } => {
                write!(f, "{} = type({})", target, string_const(name))
            }
            Fixup::ResolveNamespace { target } => write!(f, "{} = current_ns()", target),
            Fixup::RehashKeyword { keyword } => write!(f, "rehash {}", keyword_const(keyword)),
        }
    }
}
