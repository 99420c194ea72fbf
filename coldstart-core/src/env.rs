// coldstart-core - Global environment
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The live global environment: namespaces, the type registry and the table
//! of native procedures.
//!
//! # Examples
//!
//! ```
//! use coldstart_core::GlobalEnv;
//! use coldstart_parser::{Heap, Symbol};
//!
//! let mut heap = Heap::new();
//! let env = GlobalEnv::new(&mut heap);
//!
//! // Built-in procedures are bound in the core namespace
//! assert!(env.namespaces().resolve("user", &Symbol::new("+")).is_some());
//! assert!(env.find_type("Int").is_some());
//! ```

use std::sync::Arc;

use coldstart_parser::{Heap, Symbol, ValueId};
use indexmap::IndexMap;

use crate::namespace::NamespaceRegistry;

/// Types registered at startup.
pub const BUILTIN_TYPES: &[&str] = &[
    "Nil",
    "Boolean",
    "Int",
    "Double",
    "Char",
    "String",
    "Symbol",
    "Keyword",
    "List",
    "Vector",
    "Map",
    "Set",
    "Fn",
    "Var",
    "Type",
    "Namespace",
    "Error",
    "ArgumentError",
];

/// Native procedures registered at startup.
pub const BUILTIN_NATIVES: &[&str] = &[
    "+", "-", "*", "/", "=", "<", ">", "<=", ">=", "not", "inc", "dec", "str", "print",
    "println", "first", "rest", "next", "cons", "conj", "count", "list", "vector",
    "hash-map", "hash-set", "get", "assoc", "apply", "identity", "nil?", "type", "meta",
    "with-meta", "ex-info",
];

/// The live global environment.
#[derive(Debug, Clone)]
pub struct GlobalEnv {
    namespaces: NamespaceRegistry,
    types: IndexMap<Arc<str>, ValueId>,
    natives: IndexMap<Arc<str>, ValueId>,
}

impl GlobalEnv {
    /// Create an environment with the built-in types and natives.
    pub fn new(heap: &mut Heap) -> Self {
        Self::with_builtins(heap, BUILTIN_TYPES, BUILTIN_NATIVES)
    }

    pub fn with_builtins(heap: &mut Heap, types: &[&str], natives: &[&str]) -> Self {
        let mut env = GlobalEnv {
            namespaces: NamespaceRegistry::new(heap),
            types: IndexMap::new(),
            natives: IndexMap::new(),
        };
        for name in types {
            env.register_type(heap, name);
        }
        for name in natives {
            env.register_native(heap, name);
        }
        env
    }

    #[must_use]
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    pub fn namespaces_mut(&mut self) -> &mut NamespaceRegistry {
        &mut self.namespaces
    }

    // ─────────────────────────────────────────────────────────────────────
    // Types
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<ValueId> {
        self.types.get(name).copied()
    }

    /// Register a type, returning the existing entry if already present.
    pub fn register_type(&mut self, heap: &mut Heap, name: &str) -> ValueId {
        if let Some(ty) = self.find_type(name) {
            return ty;
        }
        let ty = heap.type_value(name);
        self.types.insert(Arc::from(name), ty);
        ty
    }

    // ─────────────────────────────────────────────────────────────────────
    // Natives
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn find_native(&self, name: &str) -> Option<ValueId> {
        self.natives.get(name).copied()
    }

    /// Register a native procedure and bind it in the core namespace.
    pub fn register_native(&mut self, heap: &mut Heap, name: &str) -> ValueId {
        if let Some(native) = self.find_native(name) {
            return native;
        }
        let native = heap.native(name);
        self.natives.insert(Arc::from(name), native);
        let var = self
            .namespaces
            .intern(heap, NamespaceRegistry::CORE_NS, &Symbol::new(name));
        if let Ok(cell) = heap.var_cell_mut(var) {
            cell.value = Some(native);
        }
        native
    }

    pub fn native_names(&self) -> impl Iterator<Item = &str> {
        self.natives.keys().map(|k| k.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldstart_parser::Value;

    #[test]
    fn test_natives_bound_in_core() {
        let mut heap = Heap::new();
        let env = GlobalEnv::new(&mut heap);
        let var = env
            .namespaces()
            .resolve(NamespaceRegistry::CORE_NS, &Symbol::new("println"))
            .unwrap();
        let value = heap.var_cell(var).unwrap().value.unwrap();
        assert_eq!(value, env.find_native("println").unwrap());
        assert_eq!(heap.value(value), &Value::NativeProc(Arc::from("println")));
    }

    #[test]
    fn test_register_type_is_idempotent() {
        let mut heap = Heap::new();
        let mut env = GlobalEnv::with_builtins(&mut heap, &[], &[]);
        let a = env.register_type(&mut heap, "Int");
        let b = env.register_type(&mut heap, "Int");
        assert_eq!(a, b);
        assert!(env.find_type("Double").is_none());
    }
}
