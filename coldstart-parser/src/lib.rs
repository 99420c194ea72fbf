// coldstart-parser - Object model and reader for the coldstart runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # coldstart-parser
//!
//! The runtime object model shared by the analyzer, the snapshot emitter and
//! the fixup executor: values, compiled expressions, lexical bindings and
//! captured environments, all allocated in a [`Heap`]. Also the reader that
//! turns bootstrap source into value trees.

pub mod collections;
pub mod equiv;
pub mod expr;
pub mod hash;
pub mod heap;
pub mod lexer;
pub mod lexical;
pub mod parser;
pub mod symbol;
pub mod value;

pub use collections::ARRAY_MAP_MAX_ENTRIES;
pub use equiv::{expr_graph_eq, graph_eq};
pub use expr::{CatchClause, Expr, ExprId, ExprKind, FnArity, Position};
pub use heap::{Heap, HeapError};
pub use lexer::Lexer;
pub use lexical::{Binding, BindingId, EnvId, LocalEnv};
pub use parser::{ParseError, Parser, read_all};
pub use symbol::{Keyword, Symbol};
pub use value::{
    ArrayMapVal, BitmapIndexedNode, FnVal, HashMapVal, KeywordVal, ListVal, Value, ValueId, VarCell,
    VarFlags, VectorVal,
};
