// coldstart-emit - Interning registries
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Deduplicating tables of the constants a snapshot needs: strings, symbols,
//! keywords and lexical bindings. Each is listed once, in first-registration
//! order.

use std::sync::Arc;

use coldstart_parser::{BindingId, Keyword, Symbol};
use indexmap::{IndexMap, IndexSet};

use crate::snapshot::{BindingDecl, InternBlock};

/// Table lengths at some point of the walk, for rolling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryMark {
    strings: usize,
    symbols: usize,
    keywords: usize,
    bindings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Registries {
    strings: IndexSet<Arc<str>>,
    symbols: IndexSet<Symbol>,
    keywords: IndexSet<Keyword>,
    bindings: IndexMap<BindingId, BindingDecl>,
}

impl Registries {
    pub fn new() -> Self {
        Registries::default()
    }

    /// Register a string, returning the shared copy.
    pub fn string(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&interned));
        interned
    }

    /// Register a symbol and its name parts.
    pub fn symbol(&mut self, sym: &Symbol) {
        if self.symbols.contains(sym) {
            return;
        }
        if let Some(ns) = sym.namespace() {
            self.string(ns);
        }
        self.string(sym.name());
        self.symbols.insert(sym.clone());
    }

    /// Register a keyword and its name parts. Returns true the first time, when
    /// the caller owes a hash recomputation.
    pub fn keyword(&mut self, kw: &Keyword) -> bool {
        if self.keywords.contains(kw) {
            return false;
        }
        if let Some(ns) = kw.namespace() {
            self.string(ns);
        }
        self.string(kw.name());
        self.keywords.insert(kw.clone());
        true
    }

    #[must_use]
    pub fn binding(&self, id: BindingId) -> Option<&BindingDecl> {
        self.bindings.get(&id)
    }

    pub fn add_binding(&mut self, id: BindingId, decl: BindingDecl) {
        self.symbol(&decl.symbol);
        self.bindings.insert(id, decl);
    }

    #[must_use]
    pub fn mark(&self) -> RegistryMark {
        RegistryMark {
            strings: self.strings.len(),
            symbols: self.symbols.len(),
            keywords: self.keywords.len(),
            bindings: self.bindings.len(),
        }
    }

    /// Forget everything registered after `mark`.
    pub fn truncate(&mut self, mark: RegistryMark) {
        self.strings.truncate(mark.strings);
        self.symbols.truncate(mark.symbols);
        self.keywords.truncate(mark.keywords);
        self.bindings.truncate(mark.bindings);
    }

    pub fn into_block(self) -> InternBlock {
        InternBlock {
            strings: self.strings.into_iter().collect(),
            symbols: self.symbols.into_iter().collect(),
            keywords: self.keywords.into_iter().collect(),
            bindings: self.bindings.into_values().collect(),
        }
    }
}
