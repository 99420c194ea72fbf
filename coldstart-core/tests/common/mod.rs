// coldstart-core - Common test utilities
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared helpers for analyzer integration tests.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```

pub use coldstart_core::{GlobalEnv, NamespaceRegistry, load_source};
#[allow(unused_imports)]
pub use coldstart_parser::{ExprKind, Heap, Symbol, Value, ValueId};

/// A heap and environment after loading some source.
#[derive(Debug)]
pub struct Loaded {
    pub heap: Heap,
    pub env: GlobalEnv,
}

impl Loaded {
    /// The var `ns/name`.
    ///
    /// # Panics
    ///
    /// Panics if the var does not exist.
    #[must_use]
    pub fn var(&self, ns: &str, name: &str) -> ValueId {
        self.env
            .namespaces()
            .find(ns)
            .and_then(|n| n.find_var(&Symbol::new(name)))
            .unwrap_or_else(|| panic!("no var {}/{}", ns, name))
    }

    /// The folded value of `ns/name`.
    #[must_use]
    pub fn value_of(&self, ns: &str, name: &str) -> Option<&Value> {
        let cell = self.heap.var_cell(self.var(ns, name)).ok()?;
        cell.value.map(|v| self.heap.value(v))
    }
}

/// Load `source` into a fresh environment.
///
/// # Returns
///
/// The loaded state, or an error message string.
pub fn load_str(source: &str) -> Result<Loaded, String> {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    load_source(&mut heap, &mut env, source, Some("test.clj")).map_err(|e| e.to_string())?;
    Ok(Loaded { heap, env })
}

/// Assert that loading `source` fails with a message containing `needle`.
#[macro_export]
macro_rules! assert_load_err {
    ($source:expr, $needle:expr) => {
        match $crate::common::load_str($source) {
            Ok(_) => panic!("Expected error for '{}'", $source),
            Err(msg) => assert!(
                msg.contains($needle),
                "Error for '{}' was '{}', expected it to contain '{}'",
                $source,
                msg,
                $needle
            ),
        }
    };
}
