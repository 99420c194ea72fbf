// coldstart-emit - Common test utilities
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared helpers for emitter integration tests.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#[allow(unused_imports)]
pub use coldstart_core::{GlobalEnv, NamespaceRegistry, load_source};
#[allow(unused_imports)]
pub use coldstart_emit::{
    EmitError, Emission, Emitter, EmitterConfig, FieldPath, Fixup, Init, Reconstruction, Snapshot,
    reconstruct,
};
#[allow(unused_imports)]
pub use coldstart_parser::{Heap, Keyword, Symbol, Value, ValueId, read_all};

/// The original heap and environment, plus what the emitter made of them.
#[derive(Debug)]
pub struct Compiled {
    pub heap: Heap,
    pub env: GlobalEnv,
    pub emission: Emission,
}

/// The result of replaying a snapshot into a fresh environment.
#[derive(Debug)]
pub struct Rebuilt {
    pub heap: Heap,
    pub env: GlobalEnv,
    pub reconstruction: Reconstruction,
}

impl Compiled {
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.emission.snapshot
    }

    /// Declaration names in statics order.
    #[allow(dead_code)]
    #[must_use]
    pub fn decl_names(&self) -> Vec<&str> {
        self.snapshot()
            .statics
            .iter()
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Field `field` of declaration `decl`.
    ///
    /// # Panics
    ///
    /// Panics if the declaration or the field is missing.
    #[must_use]
    pub fn field(&self, decl: &str, field: &str) -> &Init {
        self.snapshot()
            .decl(decl)
            .unwrap_or_else(|| panic!("no declaration {}", decl))
            .record
            .get(field)
            .unwrap_or_else(|| panic!("{} has no field {}", decl, field))
    }

    /// Number of declarations of record kind `kind`.
    #[allow(dead_code)]
    #[must_use]
    pub fn count_kind(&self, kind: &str) -> usize {
        self.snapshot()
            .statics
            .iter()
            .filter(|d| d.record.kind == kind)
            .count()
    }

    /// Replay the snapshot into a fresh environment.
    ///
    /// # Panics
    ///
    /// Panics if reconstruction fails.
    #[must_use]
    pub fn rebuild(&self) -> Rebuilt {
        let mut heap = Heap::new();
        let mut env = GlobalEnv::new(&mut heap);
        let reconstruction = reconstruct(self.snapshot(), &mut heap, &mut env)
            .unwrap_or_else(|e| panic!("reconstruction failed: {}", e));
        Rebuilt {
            heap,
            env,
            reconstruction,
        }
    }

    /// Vars whose rebuilt graph differs from the original.
    #[must_use]
    pub fn mismatches(&self) -> Vec<String> {
        let rebuilt = self.rebuild();
        rebuilt
            .reconstruction
            .mismatches(&self.heap, &self.env, &rebuilt.heap)
    }
}

/// Evaluate `source` as `test.clj` and emit everything it defines.
///
/// # Panics
///
/// Panics if evaluation or emission fails.
#[must_use]
pub fn compile(source: &str) -> Compiled {
    compile_with(source, EmitterConfig::default())
}

/// As [`compile`], with an explicit emitter configuration.
///
/// # Panics
///
/// Panics if evaluation or emission fails.
#[allow(dead_code)]
#[must_use]
pub fn compile_with(source: &str, config: EmitterConfig) -> Compiled {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    let forms = load_source(&mut heap, &mut env, source, Some("test.clj"))
        .unwrap_or_else(|e| panic!("failed to load '{}': {}", source, e));

    let mut emitter = Emitter::new(config);
    for form in forms {
        emitter
            .record_top_level_form(&heap, form)
            .unwrap_or_else(|e| panic!("failed to record form: {}", e));
    }
    let emission = emitter
        .finish(&heap, &env)
        .unwrap_or_else(|e| panic!("emission failed: {}", e));
    Compiled {
        heap,
        env,
        emission,
    }
}

/// Emit a hand-built environment. `forms` is only read and recorded, never
/// evaluated, so it names which vars to emit.
///
/// # Panics
///
/// Panics if reading or emission fails.
#[allow(dead_code)]
#[must_use]
pub fn emit_prepared(mut heap: Heap, env: GlobalEnv, forms: &str) -> Compiled {
    let forms = read_all(forms, &mut heap).unwrap_or_else(|e| panic!("read failed: {}", e));
    let mut emitter = Emitter::new(EmitterConfig::default());
    for form in forms {
        emitter
            .record_top_level_form(&heap, form)
            .unwrap_or_else(|e| panic!("failed to record form: {}", e));
    }
    let emission = emitter
        .finish(&heap, &env)
        .unwrap_or_else(|e| panic!("emission failed: {}", e));
    Compiled {
        heap,
        env,
        emission,
    }
}

/// Define `ns/name` directly, bypassing the analyzer.
#[allow(dead_code)]
pub fn define(heap: &mut Heap, env: &mut GlobalEnv, ns: &str, name: &str, value: ValueId) {
    let var = env.namespaces_mut().intern(heap, ns, &Symbol::new(name));
    if let Ok(cell) = heap.var_cell_mut(var) {
        cell.value = Some(value);
    }
}
