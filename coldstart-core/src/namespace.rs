// coldstart-core - Namespace registry
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Namespaces map unqualified symbols to vars.
//!
//! The registry always contains the core namespace and `user`; the core
//! namespace is current until a namespace form switches it. Every namespace
//! owns the heap value that stands for it at runtime.

use std::sync::Arc;

use coldstart_parser::{Heap, Symbol, ValueId};
use im::OrdMap;
use indexmap::IndexMap;

/// A namespace containing var bindings.
#[derive(Debug, Clone)]
pub struct Namespace {
    name: Arc<str>,
    value: ValueId,
    vars: OrdMap<Symbol, ValueId>,
}

impl Namespace {
    fn new(heap: &mut Heap, name: &str) -> Self {
        Namespace {
            name: Arc::from(name),
            value: heap.namespace_value(name),
            vars: OrdMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The runtime value standing for this namespace.
    #[must_use]
    pub fn value(&self) -> ValueId {
        self.value
    }

    /// Look up a var by unqualified name.
    #[must_use]
    pub fn find_var(&self, sym: &Symbol) -> Option<ValueId> {
        self.vars.get(&sym.unqualified()).copied()
    }

    /// All mappings, sorted by symbol.
    pub fn vars(&self) -> impl Iterator<Item = (&Symbol, ValueId)> {
        self.vars.iter().map(|(s, v)| (s, *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Registry of namespaces, in creation order.
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    namespaces: IndexMap<Arc<str>, Namespace>,
    current: Arc<str>,
}

impl NamespaceRegistry {
    /// The name of the core namespace.
    pub const CORE_NS: &'static str = "coldstart.core";

    /// Create a registry with the core and `user` namespaces. Core is current.
    pub fn new(heap: &mut Heap) -> Self {
        let mut registry = NamespaceRegistry {
            namespaces: IndexMap::new(),
            current: Arc::from(Self::CORE_NS),
        };
        registry.ensure(heap, Self::CORE_NS);
        registry.ensure(heap, "user");
        registry
    }

    /// Find or create a namespace.
    pub fn ensure(&mut self, heap: &mut Heap, name: &str) -> &mut Namespace {
        if !self.namespaces.contains_key(name) {
            log::debug!("creating namespace {}", name);
            let ns = Namespace::new(heap, name);
            self.namespaces.insert(Arc::clone(&ns.name), ns);
        }
        &mut self.namespaces[name]
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    #[must_use]
    pub fn current_name(&self) -> &str {
        &self.current
    }

    #[must_use]
    pub fn current(&self) -> Option<&Namespace> {
        self.find(&self.current)
    }

    /// Make `name` current, creating it if needed.
    pub fn set_current(&mut self, heap: &mut Heap, name: &str) {
        let ns = self.ensure(heap, name);
        self.current = Arc::clone(&ns.name);
    }

    /// Find or create the var named `sym` in namespace `ns`.
    pub fn intern(&mut self, heap: &mut Heap, ns: &str, sym: &Symbol) -> ValueId {
        let key = sym.unqualified();
        let namespace = self.ensure(heap, ns);
        if let Some(var) = namespace.vars.get(&key) {
            return *var;
        }
        let var = heap.var(ns, key.clone());
        namespace.vars.insert(key, var);
        var
    }

    /// Bind an already-built var under `sym`, replacing any previous mapping.
    /// Returns the var it replaced.
    pub fn intern_existing(
        &mut self,
        heap: &mut Heap,
        ns: &str,
        sym: &Symbol,
        var: ValueId,
    ) -> Option<ValueId> {
        let previous = self.ensure(heap, ns).vars.insert(sym.unqualified(), var);
        if let Some(old) = previous.filter(|&old| old != var) {
            log::debug!("{}/{} rebound, replacing {}", ns, sym.name(), old);
        }
        previous
    }

    /// Resolve a symbol as seen from namespace `from`.
    ///
    /// Qualified symbols look only in their namespace. Unqualified symbols look
    /// in `from`, then in the core namespace.
    #[must_use]
    pub fn resolve(&self, from: &str, sym: &Symbol) -> Option<ValueId> {
        if let Some(ns) = sym.namespace() {
            return self.find(ns)?.find_var(sym);
        }
        self.find(from)
            .and_then(|ns| ns.find_var(sym))
            .or_else(|| self.find(Self::CORE_NS)?.find_var(sym))
    }

    /// Namespaces in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }
}
