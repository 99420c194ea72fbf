// coldstart-emit - Snapshot emitter and fixup executor for coldstart
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # coldstart-emit
//!
//! Ahead-of-time snapshots of a bootstrapped runtime image.
//!
//! The [`Emitter`] walks the vars defined by a bootstrap program and produces
//! a [`Snapshot`]: interned constants, static declarations and an ordered
//! fixup log. [`reconstruct`] runs that snapshot against a fresh heap and
//! environment, rebuilding an equivalent graph without reading the program
//! again.
//!
//! ```
//! use coldstart_core::{GlobalEnv, load_source};
//! use coldstart_emit::{Emitter, EmitterConfig, reconstruct};
//! use coldstart_parser::Heap;
//!
//! let mut heap = Heap::new();
//! let mut env = GlobalEnv::new(&mut heap);
//! let forms = load_source(&mut heap, &mut env, "(def x 42)", None).unwrap();
//!
//! let mut emitter = Emitter::new(EmitterConfig::default());
//! for form in forms {
//!     emitter.record_top_level_form(&heap, form).unwrap();
//! }
//! let emission = emitter.finish(&heap, &env).unwrap();
//! assert!(emission.snapshot.render_statics().contains("v_x = Var {"));
//!
//! let mut fresh = Heap::new();
//! let mut fresh_env = GlobalEnv::new(&mut fresh);
//! let rebuilt = reconstruct(&emission.snapshot, &mut fresh, &mut fresh_env).unwrap();
//! assert!(rebuilt.mismatches(&heap, &env, &fresh).is_empty());
//! ```

pub mod emitter;
pub mod error;
pub mod fixup;
pub mod mangle;
pub mod reconstruct;
pub mod registry;
pub mod snapshot;

pub use emitter::{Emission, Emitter, EmitterConfig};
pub use error::{EmitError, ReconstructError, Result, Severity};
pub use fixup::{FieldPath, Fixup};
pub use reconstruct::{Loaded, Reconstruction, reconstruct};
pub use snapshot::{BindingDecl, Decl, Init, InternBlock, Record, Snapshot};
