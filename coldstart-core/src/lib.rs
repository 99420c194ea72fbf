// coldstart-core - Global environment and bootstrap analyzer for coldstart
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # coldstart-core
//!
//! The live global environment (namespaces, types, native procedures) and the
//! bootstrap analyzer that turns top-level forms into var state for the
//! snapshot emitter.

pub mod analyze;
pub mod env;
pub mod error;
pub mod namespace;

pub use analyze::{Analyzer, TopLevel};
pub use env::{BUILTIN_NATIVES, BUILTIN_TYPES, GlobalEnv};
pub use error::{Error, Result};
pub use namespace::{Namespace, NamespaceRegistry};

// Re-export parser types for convenience
pub use coldstart_parser::{Heap, Symbol, ValueId};

/// Read and evaluate every top-level form of `source`.
///
/// Returns the forms in reading order, so a caller can hand them to the
/// emitter after evaluation.
pub fn load_source(
    heap: &mut Heap,
    env: &mut GlobalEnv,
    source: &str,
    file: Option<&str>,
) -> Result<Vec<ValueId>> {
    let mut parser = coldstart_parser::Parser::new(source, heap)?;
    if let Some(file) = file {
        parser = parser.with_file(file);
    }
    let forms = parser.parse_all()?;

    let mut analyzer = Analyzer::new(heap, env);
    for &form in &forms {
        analyzer.eval_top_level(form)?;
    }
    Ok(forms)
}
