// coldstart-parser - Arena for values, expressions and lexical structures
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The heap owns every value, expression, binding and captured environment of
//! one runtime image. Everything else holds `Copy` ids into it.
//!
//! Ids are only meaningful for the heap that issued them; indexing a heap with
//! another heap's id either panics or yields an unrelated object.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::expr::{Expr, ExprId, Position};
use crate::hash::keyword_hash;
use crate::lexical::{Binding, BindingId, EnvId, LocalEnv};
use crate::symbol::{Keyword, Symbol};
use crate::value::{FnVal, KeywordVal, Value, ValueId, VarCell};

/// Errors raised while building or reading heap structures.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapError {
    /// Two distinct map keys share a full 32-bit hash.
    HashCollision { key: ValueId, existing: ValueId },
    /// A value of the wrong variant was found where a specific one was needed.
    WrongKind {
        expected: &'static str,
        got: &'static str,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::HashCollision { key, existing } => {
                write!(f, "hash collision between map keys {} and {}", key, existing)
            }
            HeapError::WrongKind { expected, got } => {
                write!(f, "expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for HeapError {}

/// Arena of runtime objects.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    values: Vec<Value>,
    exprs: Vec<Expr>,
    bindings: Vec<Binding>,
    envs: Vec<LocalEnv>,
    /// Source spans of list forms, recorded by the reader.
    form_positions: HashMap<ValueId, Position>,
    /// Reader metadata attached to symbol forms (`^:private name`).
    symbol_meta: HashMap<ValueId, ValueId>,
}

fn next_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    // ========================================================================
    // Allocation and access
    // ========================================================================

    pub fn alloc(&mut self, value: Value) -> ValueId {
        let id = ValueId(next_index(self.values.len()));
        self.values.push(value);
        id
    }

    #[must_use]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    #[must_use]
    pub fn get(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.index())
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(next_index(self.exprs.len()));
        self.exprs.push(expr);
        id
    }

    #[must_use]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub fn alloc_binding(&mut self, binding: Binding) -> BindingId {
        let id = BindingId(next_index(self.bindings.len()));
        self.bindings.push(binding);
        id
    }

    #[must_use]
    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.index()]
    }

    pub fn alloc_env(&mut self, env: LocalEnv) -> EnvId {
        let id = EnvId(next_index(self.envs.len()));
        self.envs.push(env);
        id
    }

    #[must_use]
    pub fn env(&self, id: EnvId) -> &LocalEnv {
        &self.envs[id.index()]
    }

    pub fn env_mut(&mut self, id: EnvId) -> &mut LocalEnv {
        &mut self.envs[id.index()]
    }

    /// Ids of every allocated value, in allocation order.
    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> + use<> {
        (0..next_index(self.values.len())).map(ValueId)
    }

    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    // ========================================================================
    // Reader side tables
    // ========================================================================

    pub fn set_form_position(&mut self, form: ValueId, pos: Position) {
        self.form_positions.insert(form, pos);
    }

    #[must_use]
    pub fn form_position(&self, form: ValueId) -> Option<&Position> {
        self.form_positions.get(&form)
    }

    pub fn set_symbol_meta(&mut self, symbol: ValueId, meta: ValueId) {
        self.symbol_meta.insert(symbol, meta);
    }

    #[must_use]
    pub fn symbol_meta(&self, symbol: ValueId) -> Option<ValueId> {
        self.symbol_meta.get(&symbol).copied()
    }

    // ========================================================================
    // Scalar and reference constructors
    // ========================================================================

    pub fn nil(&mut self) -> ValueId {
        self.alloc(Value::Nil)
    }

    pub fn boolean(&mut self, b: bool) -> ValueId {
        self.alloc(Value::Bool(b))
    }

    pub fn int(&mut self, i: i64) -> ValueId {
        self.alloc(Value::Int(i))
    }

    pub fn double(&mut self, d: f64) -> ValueId {
        self.alloc(Value::Double(d))
    }

    pub fn char(&mut self, c: char) -> ValueId {
        self.alloc(Value::Char(c))
    }

    pub fn string(&mut self, s: &str) -> ValueId {
        self.alloc(Value::String(Arc::from(s)))
    }

    pub fn symbol(&mut self, symbol: Symbol) -> ValueId {
        self.alloc(Value::Symbol(symbol))
    }

    /// Allocate a keyword value with its content hash filled in.
    pub fn keyword(&mut self, keyword: Keyword) -> ValueId {
        let content_hash = keyword_hash(keyword.namespace(), keyword.name());
        self.alloc(Value::Keyword(KeywordVal {
            keyword,
            content_hash,
        }))
    }

    pub fn type_value(&mut self, name: &str) -> ValueId {
        self.alloc(Value::Type(Arc::from(name)))
    }

    pub fn namespace_value(&mut self, name: &str) -> ValueId {
        self.alloc(Value::Namespace(Arc::from(name)))
    }

    pub fn native(&mut self, name: &str) -> ValueId {
        self.alloc(Value::NativeProc(Arc::from(name)))
    }

    pub fn writer(&mut self) -> ValueId {
        self.alloc(Value::OpaqueWriter)
    }

    /// Allocate an unbound var.
    pub fn var(&mut self, ns: &str, symbol: Symbol) -> ValueId {
        self.alloc(Value::Var(VarCell::new(ns, symbol)))
    }

    pub fn function(&mut self, f: FnVal) -> ValueId {
        self.alloc(Value::Fn(f))
    }

    /// Attach the metadata map `meta` to a var, function or collection.
    pub fn set_meta(&mut self, id: ValueId, meta: ValueId) -> Result<(), HeapError> {
        let value = self.value_mut(id);
        let got = value.kind_name();
        let slot = value.meta_mut().ok_or(HeapError::WrongKind {
            expected: "value with metadata",
            got,
        })?;
        *slot = Some(meta);
        Ok(())
    }

    /// The var cell behind `id`.
    pub fn var_cell(&self, id: ValueId) -> Result<&VarCell, HeapError> {
        match self.value(id) {
            Value::Var(cell) => Ok(cell),
            other => Err(HeapError::WrongKind {
                expected: "Var",
                got: other.kind_name(),
            }),
        }
    }

    pub fn var_cell_mut(&mut self, id: ValueId) -> Result<&mut VarCell, HeapError> {
        match self.value_mut(id) {
            Value::Var(cell) => Ok(cell),
            other => Err(HeapError::WrongKind {
                expected: "Var",
                got: other.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let mut heap = Heap::new();
        let a = heap.int(1);
        let b = heap.int(1);
        assert_ne!(a, b);
        assert_eq!(heap.value(a), heap.value(b));
        assert_eq!(heap.value_count(), 2);
    }

    #[test]
    fn test_keyword_gets_hash() {
        let mut heap = Heap::new();
        let kw = heap.keyword(Keyword::parse("a/b"));
        match heap.value(kw) {
            Value::Keyword(k) => assert_eq!(k.content_hash, keyword_hash(Some("a"), "b")),
            other => panic!("expected keyword, got {:?}", other),
        }
    }

    #[test]
    fn test_var_cell_access() {
        let mut heap = Heap::new();
        let v = heap.var("user", Symbol::new("x"));
        let one = heap.int(1);
        heap.var_cell_mut(v).unwrap().value = Some(one);
        assert_eq!(heap.var_cell(v).unwrap().value, Some(one));
        assert!(heap.var_cell(one).is_err());
    }
}
