// coldstart-parser - Lexical bindings and captured environments
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexical slots and the frame chains closures capture.

use std::fmt;

use crate::symbol::Symbol;
use crate::value::ValueId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub(crate) u32);

impl BindingId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub(crate) u32);

impl EnvId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env{}", self.0)
    }
}

/// A named lexical slot.
///
/// `frame` counts enclosing function scopes, `index` is the slot within that
/// frame. Two bindings with equal fields are still distinct slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub symbol: Symbol,
    pub frame: u32,
    pub index: u32,
    pub is_used: bool,
}

impl Binding {
    pub fn new(symbol: Symbol, frame: u32, index: u32) -> Self {
        Binding {
            symbol,
            frame,
            index,
            is_used: false,
        }
    }
}

/// One frame of captured slots, linked to its enclosing frame.
///
/// Each frame owns its slots; `parent` only points outward, so chains never
/// form cycles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalEnv {
    pub slots: Vec<Option<ValueId>>,
    pub parent: Option<EnvId>,
    pub frame: u32,
}
