// coldstart-parser - Runtime value model
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The closed set of runtime values a snapshot can contain.
//!
//! Values live in a [`Heap`](crate::heap::Heap) and refer to each other by
//! [`ValueId`]. Two ids are the same object exactly when they are equal, which
//! is what identity-based deduplication keys on.

use std::fmt;
use std::sync::Arc;

use crate::expr::ExprId;
use crate::lexical::EnvId;
use crate::symbol::{Keyword, Symbol};

/// Index of a value in its heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Branching factor of vector tries and width of hash-map trie levels.
pub const BRANCH_WIDTH: usize = 32;
/// Bits of hash consumed per trie level.
pub const BRANCH_BITS: u32 = 5;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    Char(char),
    String(Arc<str>),
    Symbol(Symbol),
    Keyword(KeywordVal),
    List(ListVal),
    Vector(VectorVal),
    /// Interior node of a vector trie.
    VectorNode(Vec<Option<ValueId>>),
    /// Small map: flat alternating key/value array in insertion order.
    ArrayMap(ArrayMapVal),
    HashMap(HashMapVal),
    BitmapIndexedNode(BitmapIndexedNode),
    /// A set, backed by a map binding each element to itself.
    MapSet(ValueId),
    Fn(FnVal),
    Var(VarCell),
    /// Reference to a named entry of the runtime type registry.
    Type(Arc<str>),
    /// A namespace object; only the core namespace may be serialized.
    Namespace(Arc<str>),
    /// A built-in procedure, referenced by name.
    NativeProc(Arc<str>),
    /// An I/O writer handle. Never serialized; always reconstructed as no handle.
    OpaqueWriter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordVal {
    pub keyword: Keyword,
    pub content_hash: u32,
}

/// A cons cell. The empty list has no `first`, no `rest` and a zero count.
#[derive(Debug, Clone, PartialEq)]
pub struct ListVal {
    pub first: Option<ValueId>,
    pub rest: Option<ValueId>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorVal {
    /// Root of the trie, padded to [`BRANCH_WIDTH`] slots.
    pub root: Vec<Option<ValueId>>,
    /// Trailing elements not yet pushed into the trie.
    pub tail: Vec<Option<ValueId>>,
    pub count: usize,
    pub shift: u32,
    pub meta: Option<ValueId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayMapVal {
    pub array: Vec<ValueId>,
    pub meta: Option<ValueId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashMapVal {
    pub count: usize,
    pub root: Option<ValueId>,
    pub meta: Option<ValueId>,
}

/// Hash-array-mapped trie node. `array` holds two entries per set bit of
/// `bitmap`: a key and its value, or an empty key and a child node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitmapIndexedNode {
    pub bitmap: u32,
    pub array: Vec<Option<ValueId>>,
}

impl BitmapIndexedNode {
    /// Position in `array` of the pair selected by `bit`.
    #[must_use]
    pub fn pair_index(&self, bit: u32) -> usize {
        2 * (self.bitmap & (bit - 1)).count_ones() as usize
    }
}

/// A function value: a compiled closure expression plus its captured scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FnVal {
    pub is_macro: bool,
    pub expr: Option<ExprId>,
    pub env: Option<EnvId>,
    pub meta: Option<ValueId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarFlags {
    pub is_macro: bool,
    pub is_private: bool,
    pub is_dynamic: bool,
    pub is_used: bool,
    pub is_globally_used: bool,
}

/// A namespace-scoped variable, identified by `(ns, symbol)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarCell {
    pub ns: Arc<str>,
    pub symbol: Symbol,
    pub value: Option<ValueId>,
    pub expr: Option<ExprId>,
    pub flags: VarFlags,
    pub tagged_type: Option<ValueId>,
    /// Reader metadata map of the defining symbol, plus any docstring.
    pub meta: Option<ValueId>,
}

impl VarCell {
    pub fn new(ns: &str, symbol: Symbol) -> Self {
        VarCell {
            ns: Arc::from(ns),
            symbol,
            value: None,
            expr: None,
            flags: VarFlags::default(),
            tagged_type: None,
            meta: None,
        }
    }
}

impl Value {
    /// Name of the variant, as used in diagnostics and generated code.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Double(_) => "Double",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Keyword(_) => "Keyword",
            Value::List(_) => "List",
            Value::Vector(_) => "Vector",
            Value::VectorNode(_) => "VectorNode",
            Value::ArrayMap(_) => "ArrayMap",
            Value::HashMap(_) => "HashMap",
            Value::BitmapIndexedNode(_) => "BitmapIndexedNode",
            Value::MapSet(_) => "MapSet",
            Value::Fn(_) => "Fn",
            Value::Var(_) => "Var",
            Value::Type(_) => "Type",
            Value::Namespace(_) => "Namespace",
            Value::NativeProc(_) => "NativeProc",
            Value::OpaqueWriter => "OpaqueWriter",
        }
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_keyword(&self) -> Option<&Keyword> {
        match self {
            Value::Keyword(k) => Some(&k.keyword),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_var(&self) -> Option<&VarCell> {
        match self {
            Value::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Metadata map attached to a var, function or collection.
    #[must_use]
    pub fn meta(&self) -> Option<ValueId> {
        match self {
            Value::Vector(v) => v.meta,
            Value::ArrayMap(m) => m.meta,
            Value::HashMap(m) => m.meta,
            Value::Fn(f) => f.meta,
            Value::Var(cell) => cell.meta,
            _ => None,
        }
    }

    /// Slot holding the metadata map, for values that can carry one.
    pub fn meta_mut(&mut self) -> Option<&mut Option<ValueId>> {
        match self {
            Value::Vector(v) => Some(&mut v.meta),
            Value::ArrayMap(m) => Some(&mut m.meta),
            Value::HashMap(m) => Some(&mut m.meta),
            Value::Fn(f) => Some(&mut f.meta),
            Value::Var(cell) => Some(&mut cell.meta),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Scalars carry their whole payload inline.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Nil
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Double(_)
                | Value::Char(_)
                | Value::String(_)
        )
    }
}
