// coldstart-parser - Structural comparison across heaps
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shape equality between object graphs, possibly in different heaps.
//!
//! Two graphs are equal when every reachable node has the same variant and
//! fields. A pair of nodes already under comparison is assumed equal, so
//! cyclic graphs compare in finite time. Keyword content hashes are not
//! compared; they are derived data.
//!
//! Vars are identified by namespace and symbol. Only a var at the root of the
//! comparison is compared by content; vars reached from it compare by name.

use std::collections::HashSet;

use crate::expr::{ExprId, ExprKind};
use crate::heap::Heap;
use crate::lexical::{BindingId, EnvId};
use crate::value::{Value, ValueId};

/// Compare value `a` of `left` with value `b` of `right`.
#[must_use]
pub fn graph_eq(left: &Heap, a: ValueId, right: &Heap, b: ValueId) -> bool {
    let mut eq = GraphEq::new(left, right);
    eq.root = Some((a, b));
    eq.values(a, b)
}

/// Compare expression `a` of `left` with expression `b` of `right`.
#[must_use]
pub fn expr_graph_eq(left: &Heap, a: ExprId, right: &Heap, b: ExprId) -> bool {
    GraphEq::new(left, right).exprs(a, b)
}

struct GraphEq<'a> {
    left: &'a Heap,
    right: &'a Heap,
    values: HashSet<(ValueId, ValueId)>,
    exprs: HashSet<(ExprId, ExprId)>,
    envs: HashSet<(EnvId, EnvId)>,
    root: Option<(ValueId, ValueId)>,
}

impl<'a> GraphEq<'a> {
    fn new(left: &'a Heap, right: &'a Heap) -> Self {
        GraphEq {
            left,
            right,
            values: HashSet::new(),
            exprs: HashSet::new(),
            envs: HashSet::new(),
            root: None,
        }
    }

    fn opt_values(&mut self, a: Option<ValueId>, b: Option<ValueId>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.values(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn value_slots(&mut self, a: &[Option<ValueId>], b: &[Option<ValueId>]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| self.opt_values(x, y))
    }

    fn values(&mut self, a: ValueId, b: ValueId) -> bool {
        if !self.values.insert((a, b)) {
            return true;
        }
        let (left, right) = (self.left, self.right);
        match (left.value(a), right.value(b)) {
            (Value::Nil, Value::Nil) | (Value::OpaqueWriter, Value::OpaqueWriter) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
            (Value::Char(x), Value::Char(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Symbol(x), Value::Symbol(y)) => x == y,
            (Value::Keyword(x), Value::Keyword(y)) => x.keyword == y.keyword,
            (Value::List(x), Value::List(y)) => {
                x.count == y.count
                    && self.opt_values(x.first, y.first)
                    && self.opt_values(x.rest, y.rest)
            }
            (Value::Vector(x), Value::Vector(y)) => {
                x.count == y.count
                    && x.shift == y.shift
                    && self.value_slots(&x.root, &y.root)
                    && self.value_slots(&x.tail, &y.tail)
                    && self.opt_values(x.meta, y.meta)
            }
            (Value::VectorNode(x), Value::VectorNode(y)) => self.value_slots(x, y),
            (Value::ArrayMap(x), Value::ArrayMap(y)) => {
                x.array.len() == y.array.len()
                    && x.array.iter().zip(&y.array).all(|(&p, &q)| self.values(p, q))
                    && self.opt_values(x.meta, y.meta)
            }
            (Value::HashMap(x), Value::HashMap(y)) => {
                x.count == y.count
                    && self.opt_values(x.root, y.root)
                    && self.opt_values(x.meta, y.meta)
            }
            (Value::BitmapIndexedNode(x), Value::BitmapIndexedNode(y)) => {
                x.bitmap == y.bitmap && self.value_slots(&x.array, &y.array)
            }
            (Value::MapSet(x), Value::MapSet(y)) => self.values(*x, *y),
            (Value::Fn(x), Value::Fn(y)) => {
                x.is_macro == y.is_macro
                    && self.opt_exprs(x.expr, y.expr)
                    && self.opt_envs(x.env, y.env)
                    && self.opt_values(x.meta, y.meta)
            }
            (Value::Var(x), Value::Var(y)) if self.root != Some((a, b)) => {
                x.ns == y.ns && x.symbol == y.symbol
            }
            (Value::Var(x), Value::Var(y)) => {
                x.ns == y.ns
                    && x.symbol == y.symbol
                    && x.flags == y.flags
                    && self.opt_values(x.value, y.value)
                    && self.opt_exprs(x.expr, y.expr)
                    && self.opt_values(x.tagged_type, y.tagged_type)
                    && self.opt_values(x.meta, y.meta)
            }
            (Value::Type(x), Value::Type(y))
            | (Value::Namespace(x), Value::Namespace(y))
            | (Value::NativeProc(x), Value::NativeProc(y)) => x == y,
            _ => false,
        }
    }

    fn opt_exprs(&mut self, a: Option<ExprId>, b: Option<ExprId>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.exprs(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn expr_seqs(&mut self, a: &[ExprId], b: &[ExprId]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| self.exprs(x, y))
    }

    fn exprs(&mut self, a: ExprId, b: ExprId) -> bool {
        if !self.exprs.insert((a, b)) {
            return true;
        }
        let (left, right) = (self.left, self.right);
        let (x, y) = (left.expr(a), right.expr(b));
        if x.pos != y.pos {
            return false;
        }
        match (&x.kind, &y.kind) {
            (
                ExprKind::Literal {
                    value: v1,
                    is_surrogate: s1,
                },
                ExprKind::Literal {
                    value: v2,
                    is_surrogate: s2,
                },
            ) => s1 == s2 && self.values(*v1, *v2),
            (ExprKind::Vector(e1), ExprKind::Vector(e2))
            | (ExprKind::Set(e1), ExprKind::Set(e2))
            | (ExprKind::Do(e1), ExprKind::Do(e2))
            | (ExprKind::Recur(e1), ExprKind::Recur(e2)) => self.expr_seqs(e1, e2),
            (
                ExprKind::Map {
                    keys: k1,
                    values: v1,
                },
                ExprKind::Map {
                    keys: k2,
                    values: v2,
                },
            ) => self.expr_seqs(k1, k2) && self.expr_seqs(v1, v2),
            (
                ExprKind::If {
                    cond: c1,
                    positive: p1,
                    negative: n1,
                },
                ExprKind::If {
                    cond: c2,
                    positive: p2,
                    negative: n2,
                },
            ) => self.exprs(*c1, *c2) && self.exprs(*p1, *p2) && self.exprs(*n1, *n2),
            (
                ExprKind::Def {
                    var: r1,
                    value: v1,
                    meta: m1,
                },
                ExprKind::Def {
                    var: r2,
                    value: v2,
                    meta: m2,
                },
            ) => self.values(*r1, *r2) && self.opt_exprs(*v1, *v2) && self.opt_exprs(*m1, *m2),
            (
                ExprKind::Call {
                    callable: c1,
                    args: a1,
                },
                ExprKind::Call {
                    callable: c2,
                    args: a2,
                },
            ) => self.exprs(*c1, *c2) && self.expr_seqs(a1, a2),
            (ExprKind::VarRef(v1), ExprKind::VarRef(v2))
            | (ExprKind::SetMacro(v1), ExprKind::SetMacro(v2)) => self.values(*v1, *v2),
            (ExprKind::Binding(b1), ExprKind::Binding(b2)) => self.bindings(*b1, *b2),
            (ExprKind::Meta { meta: m1, expr: e1 }, ExprKind::Meta { meta: m2, expr: e2 }) => {
                self.exprs(*m1, *m2) && self.exprs(*e1, *e2)
            }
            (ExprKind::FnArity(f1), ExprKind::FnArity(f2)) => {
                f1.params == f2.params
                    && self.expr_seqs(&f1.body, &f2.body)
                    && self.opt_values(f1.tagged_type, f2.tagged_type)
            }
            (
                ExprKind::Fn {
                    arities: a1,
                    variadic: v1,
                    self_name: s1,
                },
                ExprKind::Fn {
                    arities: a2,
                    variadic: v2,
                    self_name: s2,
                },
            ) => s1 == s2 && self.expr_seqs(a1, a2) && self.opt_exprs(*v1, *v2),
            (
                ExprKind::Let {
                    names: n1,
                    values: v1,
                    body: b1,
                },
                ExprKind::Let {
                    names: n2,
                    values: v2,
                    body: b2,
                },
            )
            | (
                ExprKind::Loop {
                    names: n1,
                    values: v1,
                    body: b1,
                },
                ExprKind::Loop {
                    names: n2,
                    values: v2,
                    body: b2,
                },
            ) => n1 == n2 && self.expr_seqs(v1, v2) && self.expr_seqs(b1, b2),
            (ExprKind::Throw(e1), ExprKind::Throw(e2)) => self.exprs(*e1, *e2),
            (ExprKind::Catch(c1), ExprKind::Catch(c2)) => {
                c1.symbol == c2.symbol
                    && self.values(c1.exc_type, c2.exc_type)
                    && self.expr_seqs(&c1.body, &c2.body)
            }
            (
                ExprKind::Try {
                    body: b1,
                    catches: c1,
                    finally: f1,
                },
                ExprKind::Try {
                    body: b2,
                    catches: c2,
                    finally: f2,
                },
            ) => self.expr_seqs(b1, b2) && self.expr_seqs(c1, c2) && self.expr_seqs(f1, f2),
            _ => false,
        }
    }

    fn bindings(&mut self, a: BindingId, b: BindingId) -> bool {
        self.left.binding(a) == self.right.binding(b)
    }

    fn opt_envs(&mut self, a: Option<EnvId>, b: Option<EnvId>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.envs(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn envs(&mut self, a: EnvId, b: EnvId) -> bool {
        if !self.envs.insert((a, b)) {
            return true;
        }
        let (left, right) = (self.left, self.right);
        let (x, y) = (left.env(a), right.env(b));
        x.frame == y.frame && self.value_slots(&x.slots, &y.slots) && self.opt_envs(x.parent, y.parent)
    }
}
