// coldstart-emit - Fixup executor
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Rebuilds an object graph from a [`Snapshot`].
//!
//! Reconstruction runs in three steps:
//! 1. the interning block becomes symbol, keyword and binding objects
//!    (keywords start with a zero hash);
//! 2. every static declaration is allocated, in order, each `Ref` pointing
//!    at an earlier one;
//! 3. the fixup log runs strictly in order, completing deferred fields,
//!    recomputing keyword hashes and populating the live namespaces.
//!
//! Placeholders become neutral values: an empty optional field, a shared nil
//! for a required value field, an empty `do` for a required expression field.

use std::collections::HashMap;
use std::sync::Arc;

use coldstart_core::GlobalEnv;
use coldstart_parser::hash::keyword_hash;
use coldstart_parser::{
    ArrayMapVal, Binding, BindingId, BitmapIndexedNode, CatchClause, EnvId, Expr, ExprId, ExprKind, FnArity,
    FnVal, HashMapVal, Heap, Keyword, KeywordVal, ListVal, LocalEnv, Position, Symbol, Value,
    ValueId, VarCell, VarFlags, VectorVal, graph_eq,
};
use indexmap::IndexMap;

use crate::error::ReconstructError;
use crate::fixup::{FieldPath, Fixup};
use crate::snapshot::{Decl, Init, InternBlock, Snapshot};

type Result<T> = std::result::Result<T, ReconstructError>;

/// A materialized declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded {
    Value(ValueId),
    Expr(ExprId),
    Env(EnvId),
}

impl Loaded {
    fn value(self) -> Option<ValueId> {
        match self {
            Loaded::Value(v) => Some(v),
            _ => None,
        }
    }

    fn expr(self) -> Option<ExprId> {
        match self {
            Loaded::Expr(e) => Some(e),
            _ => None,
        }
    }

    fn env(self) -> Option<EnvId> {
        match self {
            Loaded::Env(e) => Some(e),
            _ => None,
        }
    }

    fn kind_name(self) -> &'static str {
        match self {
            Loaded::Value(_) => "value",
            Loaded::Expr(_) => "expression",
            Loaded::Env(_) => "environment",
        }
    }
}

/// What a reconstruction produced.
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    decls: HashMap<String, Loaded>,
    vars: IndexMap<(Arc<str>, Symbol), ValueId>,
}

impl Reconstruction {
    #[must_use]
    pub fn decl(&self, name: &str) -> Option<Loaded> {
        self.decls.get(name).copied()
    }

    /// The value declared as `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<ValueId> {
        self.decl(name).and_then(Loaded::value)
    }

    /// A var interned or declared by the fixup log.
    #[must_use]
    pub fn var(&self, ns: &str, name: &str) -> Option<ValueId> {
        self.vars.get(&(Arc::from(ns), Symbol::new(name))).copied()
    }

    /// Vars interned or declared by the fixup log, in log order.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &Symbol, ValueId)> {
        self.vars.iter().map(|((ns, sym), var)| (ns.as_ref(), sym, *var))
    }

    /// Vars whose rebuilt state differs from the var of the same name in the
    /// original environment.
    #[must_use]
    pub fn mismatches(
        &self,
        original: &Heap,
        original_env: &GlobalEnv,
        rebuilt: &Heap,
    ) -> Vec<String> {
        self.vars()
            .filter(|(ns, sym, var)| {
                let source = original_env
                    .namespaces()
                    .find(ns)
                    .and_then(|namespace| namespace.find_var(sym));
                !source.is_some_and(|source| graph_eq(original, source, rebuilt, *var))
            })
            .map(|(ns, sym, _)| format!("{}/{}", ns, sym))
            .collect()
    }
}

/// Rebuild `snapshot` into `heap`, binding its vars in `env`.
pub fn reconstruct(
    snapshot: &Snapshot,
    heap: &mut Heap,
    env: &mut GlobalEnv,
) -> Result<Reconstruction> {
    let mut loader = Loader::new(heap, env);
    loader.interns(&snapshot.interns);
    for decl in &snapshot.statics {
        loader.declare(decl)?;
    }
    for fixup in &snapshot.fixups {
        log::trace!("fixup {}", fixup);
        loader.run(fixup)?;
    }
    log::debug!(
        "reconstructed {} declarations, {} fixups, {} vars",
        snapshot.statics.len(),
        snapshot.fixups.len(),
        loader.vars.len()
    );
    Ok(Reconstruction {
        decls: loader.decls,
        vars: loader.vars,
    })
}

struct Loader<'a> {
    heap: &'a mut Heap,
    env: &'a mut GlobalEnv,
    decls: HashMap<String, Loaded>,
    symbols: HashMap<Symbol, ValueId>,
    keywords: HashMap<Keyword, ValueId>,
    bindings: HashMap<String, BindingId>,
    vars: IndexMap<(Arc<str>, Symbol), ValueId>,
    nil: Option<ValueId>,
}

fn wrong(decl: &str, expected: &'static str, got: &Init) -> ReconstructError {
    ReconstructError::WrongKind {
        decl: decl.to_string(),
        expected,
        got: got.to_string(),
    }
}

fn missing(decl: &str, field: &'static str) -> ReconstructError {
    ReconstructError::MissingField {
        decl: decl.to_string(),
        field,
    }
}

fn uint<T: TryFrom<u64>>(init: Option<&Init>, decl: &str) -> Result<T> {
    let n = match init {
        None => 0,
        Some(Init::UInt(n)) => *n,
        Some(other) => return Err(wrong(decl, "unsigned integer", other)),
    };
    T::try_from(n).map_err(|_| wrong(decl, "smaller integer", &Init::UInt(n)))
}

fn flag(init: Option<&Init>, decl: &str) -> Result<bool> {
    match init {
        None => Ok(false),
        Some(Init::Bool(b)) => Ok(*b),
        Some(other) => Err(wrong(decl, "boolean", other)),
    }
}

fn symbol(init: Option<&Init>, decl: &str, field: &'static str) -> Result<Symbol> {
    match init {
        Some(Init::Symbol(sym)) => Ok(sym.clone()),
        Some(other) => Err(wrong(decl, "symbol", other)),
        None => Err(missing(decl, field)),
    }
}

fn symbols(init: Option<&Init>, decl: &str) -> Result<Vec<Symbol>> {
    match init {
        None => Ok(Vec::new()),
        Some(Init::Array(items)) => items
            .iter()
            .map(|item| symbol(Some(item), decl, "symbol"))
            .collect(),
        Some(other) => Err(wrong(decl, "array", other)),
    }
}

fn items<'i>(init: Option<&'i Init>, decl: &str) -> Result<&'i [Init]> {
    match init {
        None => Ok(&[]),
        Some(Init::Array(items)) => Ok(items),
        Some(other) => Err(wrong(decl, "array", other)),
    }
}

impl<'a> Loader<'a> {
    fn new(heap: &'a mut Heap, env: &'a mut GlobalEnv) -> Self {
        Loader {
            heap,
            env,
            decls: HashMap::new(),
            symbols: HashMap::new(),
            keywords: HashMap::new(),
            bindings: HashMap::new(),
            vars: IndexMap::new(),
            nil: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Interning block
    // ─────────────────────────────────────────────────────────────────────

    fn interns(&mut self, block: &InternBlock) {
        for sym in &block.symbols {
            self.symbol_value(sym);
        }
        for kw in &block.keywords {
            self.keyword_value(kw);
        }
        for b in &block.bindings {
            let id = self.heap.alloc_binding(Binding {
                symbol: b.symbol.clone(),
                frame: b.frame,
                index: b.index,
                is_used: b.is_used,
            });
            self.bindings.insert(b.name.clone(), id);
        }
    }

    fn symbol_value(&mut self, sym: &Symbol) -> ValueId {
        if let Some(&id) = self.symbols.get(sym) {
            return id;
        }
        let id = self.heap.symbol(sym.clone());
        self.symbols.insert(sym.clone(), id);
        id
    }

    /// The shared keyword object. Its hash stays zero until rehashed.
    fn keyword_value(&mut self, kw: &Keyword) -> ValueId {
        if let Some(&id) = self.keywords.get(kw) {
            return id;
        }
        let id = self.heap.alloc(Value::Keyword(KeywordVal {
            keyword: kw.clone(),
            content_hash: 0,
        }));
        self.keywords.insert(kw.clone(), id);
        id
    }

    // ─────────────────────────────────────────────────────────────────────
    // Initializers
    // ─────────────────────────────────────────────────────────────────────

    fn lookup(&self, name: &str) -> Result<Loaded> {
        self.decls
            .get(name)
            .copied()
            .ok_or_else(|| ReconstructError::UnknownDecl(name.to_string()))
    }

    fn value_of(&mut self, init: &Init, decl: &str) -> Result<ValueId> {
        match init {
            Init::Ref(name) => {
                let loaded = self.lookup(name)?;
                loaded.value().ok_or_else(|| ReconstructError::WrongKind {
                    decl: decl.to_string(),
                    expected: "value",
                    got: format!("{} {}", loaded.kind_name(), name),
                })
            }
            Init::Symbol(sym) => Ok(self.symbol_value(sym)),
            Init::Keyword(kw) => Ok(self.keyword_value(kw)),
            Init::Native(name) => self
                .env
                .find_native(name)
                .ok_or_else(|| ReconstructError::UnknownNative(name.to_string())),
            Init::NoHandle => Ok(self.heap.writer()),
            Init::Placeholder(_) => Ok(self.placeholder_nil()),
            other => Err(wrong(decl, "value", other)),
        }
    }

    fn placeholder_nil(&mut self) -> ValueId {
        match self.nil {
            Some(nil) => nil,
            None => {
                let nil = self.heap.nil();
                self.nil = Some(nil);
                nil
            }
        }
    }

    fn opt_value(&mut self, init: Option<&Init>, decl: &str) -> Result<Option<ValueId>> {
        match init {
            None | Some(Init::Empty | Init::Placeholder(_)) => Ok(None),
            Some(init) => self.value_of(init, decl).map(Some),
        }
    }

    fn req_value(
        &mut self,
        init: Option<&Init>,
        decl: &str,
        field: &'static str,
    ) -> Result<ValueId> {
        match init {
            None | Some(Init::Empty) => Err(missing(decl, field)),
            Some(init) => self.value_of(init, decl),
        }
    }

    fn value_slots(&mut self, init: Option<&Init>, decl: &str) -> Result<Vec<Option<ValueId>>> {
        items(init, decl)?
            .iter()
            .map(|item| self.opt_value(Some(item), decl))
            .collect()
    }

    fn expr_of(&mut self, init: &Init, decl: &str) -> Result<ExprId> {
        match init {
            Init::Ref(name) => {
                let loaded = self.lookup(name)?;
                loaded.expr().ok_or_else(|| ReconstructError::WrongKind {
                    decl: decl.to_string(),
                    expected: "expression",
                    got: format!("{} {}", loaded.kind_name(), name),
                })
            }
            Init::Placeholder(_) => Ok(self.heap.alloc_expr(Expr::new(ExprKind::Do(Vec::new())))),
            other => Err(wrong(decl, "expression", other)),
        }
    }

    fn opt_expr(&mut self, init: Option<&Init>, decl: &str) -> Result<Option<ExprId>> {
        match init {
            None | Some(Init::Empty) => Ok(None),
            Some(init) => self.expr_of(init, decl).map(Some),
        }
    }

    fn req_expr(&mut self, init: Option<&Init>, decl: &str, field: &'static str) -> Result<ExprId> {
        match init {
            None | Some(Init::Empty) => Err(missing(decl, field)),
            Some(init) => self.expr_of(init, decl),
        }
    }

    fn exprs(&mut self, init: Option<&Init>, decl: &str) -> Result<Vec<ExprId>> {
        items(init, decl)?
            .iter()
            .map(|item| self.expr_of(item, decl))
            .collect()
    }

    fn opt_env(&mut self, init: Option<&Init>, decl: &str) -> Result<Option<EnvId>> {
        match init {
            None | Some(Init::Empty | Init::Placeholder(_)) => Ok(None),
            Some(Init::Ref(name)) => {
                let loaded = self.lookup(name)?;
                loaded.env().map(Some).ok_or_else(|| ReconstructError::WrongKind {
                    decl: decl.to_string(),
                    expected: "environment",
                    got: format!("{} {}", loaded.kind_name(), name),
                })
            }
            Some(other) => Err(wrong(decl, "environment", other)),
        }
    }

    fn position(&self, init: Option<&Init>, decl: &str) -> Result<Position> {
        let record = match init {
            None => return Ok(Position::default()),
            Some(Init::Record(record)) if record.kind == "Position" => record,
            Some(other) => return Err(wrong(decl, "position", other)),
        };
        let file = match record.get("file") {
            None => None,
            Some(Init::InternedStr(s)) => Some(Arc::clone(s)),
            Some(other) => return Err(wrong(decl, "string", other)),
        };
        Ok(Position {
            file,
            start_line: uint(record.get("start_line"), decl)?,
            start_column: uint(record.get("start_column"), decl)?,
            end_line: uint(record.get("end_line"), decl)?,
            end_column: uint(record.get("end_column"), decl)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Static declarations
    // ─────────────────────────────────────────────────────────────────────

    fn declare(&mut self, decl: &Decl) -> Result<()> {
        let loaded = match decl.record.kind {
            "LocalEnv" => Loaded::Env(self.env_decl(decl)?),
            kind if kind.ends_with("Expr") => Loaded::Expr(self.expr_decl(decl)?),
            _ => Loaded::Value(self.value_decl(decl)?),
        };
        self.decls.insert(decl.name.clone(), loaded);
        Ok(())
    }

    fn value_decl(&mut self, decl: &Decl) -> Result<ValueId> {
        let name = decl.name.as_str();
        let f = |field: &str| decl.record.get(field);
        let value = match decl.record.kind {
            "Nil" => Value::Nil,
            "Bool" => Value::Bool(flag(f("b"), name)?),
            "Int" => match f("i") {
                Some(Init::Int(i)) => Value::Int(*i),
                Some(other) => return Err(wrong(name, "integer", other)),
                None => return Err(missing(name, "i")),
            },
            "Double" => match f("d") {
                Some(Init::Double(d)) => Value::Double(*d),
                Some(other) => return Err(wrong(name, "double", other)),
                None => return Err(missing(name, "d")),
            },
            "Char" => match f("ch") {
                Some(Init::Char(c)) => Value::Char(*c),
                Some(other) => return Err(wrong(name, "character", other)),
                None => return Err(missing(name, "ch")),
            },
            "String" => match f("s") {
                Some(Init::Str(s)) => Value::String(Arc::clone(s)),
                Some(other) => return Err(wrong(name, "string", other)),
                None => return Err(missing(name, "s")),
            },
            "List" => Value::List(ListVal {
                first: self.opt_value(f("first"), name)?,
                rest: self.opt_value(f("rest"), name)?,
                count: uint(f("count"), name)?,
            }),
            "Vector" => Value::Vector(VectorVal {
                root: self.value_slots(f("root"), name)?,
                tail: self.value_slots(f("tail"), name)?,
                count: uint(f("count"), name)?,
                shift: uint(f("shift"), name)?,
                meta: self.opt_value(f("meta"), name)?,
            }),
            "VectorNode" => Value::VectorNode(self.value_slots(f("array"), name)?),
            "ArrayMap" => {
                let mut array = Vec::new();
                for item in items(f("array"), name)? {
                    array.push(self.req_value(Some(item), name, "array")?);
                }
                Value::ArrayMap(ArrayMapVal {
                    array,
                    meta: self.opt_value(f("meta"), name)?,
                })
            }
            "HashMap" => Value::HashMap(HashMapVal {
                count: uint(f("count"), name)?,
                root: self.opt_value(f("root"), name)?,
                meta: self.opt_value(f("meta"), name)?,
            }),
            "BitmapIndexedNode" => Value::BitmapIndexedNode(BitmapIndexedNode {
                bitmap: uint(f("bitmap"), name)?,
                array: self.value_slots(f("array"), name)?,
            }),
            "MapSet" => Value::MapSet(self.req_value(f("map"), name, "map")?),
            "Fn" => Value::Fn(FnVal {
                is_macro: flag(f("is_macro"), name)?,
                expr: self.opt_expr(f("expr"), name)?,
                env: self.opt_env(f("env"), name)?,
                meta: self.opt_value(f("meta"), name)?,
            }),
            "Var" => {
                let ns = match f("ns") {
                    Some(Init::InternedStr(ns)) => Arc::clone(ns),
                    Some(other) => return Err(wrong(name, "string", other)),
                    None => return Err(missing(name, "ns")),
                };
                Value::Var(VarCell {
                    ns,
                    symbol: symbol(f("symbol"), name, "symbol")?,
                    value: self.opt_value(f("value"), name)?,
                    expr: self.opt_expr(f("expr"), name)?,
                    flags: VarFlags {
                        is_macro: flag(f("is_macro"), name)?,
                        is_private: flag(f("is_private"), name)?,
                        is_dynamic: flag(f("is_dynamic"), name)?,
                        is_used: flag(f("is_used"), name)?,
                        is_globally_used: flag(f("is_globally_used"), name)?,
                    },
                    tagged_type: self.opt_value(f("tagged_type"), name)?,
                    meta: self.opt_value(f("meta"), name)?,
                })
            }
            other => {
                return Err(ReconstructError::WrongKind {
                    decl: name.to_string(),
                    expected: "declaration kind",
                    got: other.to_string(),
                });
            }
        };
        Ok(self.heap.alloc(value))
    }

    fn env_decl(&mut self, decl: &Decl) -> Result<EnvId> {
        let name = decl.name.as_str();
        let env = LocalEnv {
            slots: self.value_slots(decl.record.get("slots"), name)?,
            parent: self.opt_env(decl.record.get("parent"), name)?,
            frame: uint(decl.record.get("frame"), name)?,
        };
        Ok(self.heap.alloc_env(env))
    }

    fn expr_decl(&mut self, decl: &Decl) -> Result<ExprId> {
        let name = decl.name.as_str();
        let f = |field: &str| decl.record.get(field);
        let pos = self.position(f("pos"), name)?;
        let kind = match decl.record.kind {
            "LiteralExpr" => ExprKind::Literal {
                value: self.req_value(f("value"), name, "value")?,
                is_surrogate: flag(f("is_surrogate"), name)?,
            },
            "VectorExpr" => ExprKind::Vector(self.exprs(f("elements"), name)?),
            "MapExpr" => ExprKind::Map {
                keys: self.exprs(f("keys"), name)?,
                values: self.exprs(f("values"), name)?,
            },
            "SetExpr" => ExprKind::Set(self.exprs(f("elements"), name)?),
            "IfExpr" => ExprKind::If {
                cond: self.req_expr(f("cond"), name, "cond")?,
                positive: self.req_expr(f("positive"), name, "positive")?,
                negative: self.req_expr(f("negative"), name, "negative")?,
            },
            "DefExpr" => ExprKind::Def {
                var: self.req_value(f("var"), name, "var")?,
                value: self.opt_expr(f("value"), name)?,
                meta: self.opt_expr(f("meta"), name)?,
            },
            "CallExpr" => ExprKind::Call {
                callable: self.req_expr(f("callable"), name, "callable")?,
                args: self.exprs(f("args"), name)?,
            },
            "RecurExpr" => ExprKind::Recur(self.exprs(f("args"), name)?),
            "VarRefExpr" => ExprKind::VarRef(self.req_value(f("var"), name, "var")?),
            "BindingExpr" => match f("binding") {
                Some(Init::Binding(binding)) => ExprKind::Binding(
                    *self
                        .bindings
                        .get(binding)
                        .ok_or_else(|| ReconstructError::UnknownDecl(binding.clone()))?,
                ),
                Some(other) => return Err(wrong(name, "binding", other)),
                None => return Err(missing(name, "binding")),
            },
            "DoExpr" => ExprKind::Do(self.exprs(f("body"), name)?),
            "FnArityExpr" => ExprKind::FnArity(FnArity {
                params: symbols(f("params"), name)?,
                body: self.exprs(f("body"), name)?,
                tagged_type: self.opt_value(f("tagged_type"), name)?,
            }),
            "FnExpr" => ExprKind::Fn {
                arities: self.exprs(f("arities"), name)?,
                variadic: self.opt_expr(f("variadic"), name)?,
                self_name: match f("self_name") {
                    None => None,
                    init => Some(symbol(init, name, "self_name")?),
                },
            },
            "LetExpr" => ExprKind::Let {
                names: symbols(f("names"), name)?,
                values: self.exprs(f("values"), name)?,
                body: self.exprs(f("body"), name)?,
            },
            "LoopExpr" => ExprKind::Loop {
                names: symbols(f("names"), name)?,
                values: self.exprs(f("values"), name)?,
                body: self.exprs(f("body"), name)?,
            },
            "ThrowExpr" => ExprKind::Throw(self.req_expr(f("exc"), name, "exc")?),
            "CatchExpr" => ExprKind::Catch(CatchClause {
                exc_type: self.req_value(f("exc_type"), name, "exc_type")?,
                symbol: symbol(f("symbol"), name, "symbol")?,
                body: self.exprs(f("body"), name)?,
            }),
            "TryExpr" => ExprKind::Try {
                body: self.exprs(f("body"), name)?,
                catches: self.exprs(f("catches"), name)?,
                finally: self.exprs(f("finally"), name)?,
            },
            other => {
                return Err(ReconstructError::WrongKind {
                    decl: name.to_string(),
                    expected: "expression kind",
                    got: other.to_string(),
                });
            }
        };
        Ok(self.heap.alloc_expr(Expr::at(pos, kind)))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Fixups
    // ─────────────────────────────────────────────────────────────────────

    fn run(&mut self, fixup: &Fixup) -> Result<()> {
        match fixup {
            Fixup::InternVar { ns, symbol, decl } => {
                let var = self.lookup(decl)?.value().ok_or_else(|| {
                    ReconstructError::WrongKind {
                        decl: decl.clone(),
                        expected: "Var",
                        got: "non-value declaration".to_string(),
                    }
                })?;
                self.env
                    .namespaces_mut()
                    .intern_existing(self.heap, ns, symbol, var);
                self.vars.insert((Arc::clone(ns), symbol.clone()), var);
            }
            Fixup::DeclareVar { ns, symbol } => {
                let var = self.env.namespaces_mut().intern(self.heap, ns, symbol);
                self.vars.insert((Arc::clone(ns), symbol.clone()), var);
            }
            Fixup::AssignField { target, value } => {
                let source = match value {
                    Init::Ref(name) => self.lookup(name)?,
                    other => Loaded::Value(self.value_of(other, &target.decl)?),
                };
                self.assign(target, source)?;
            }
            Fixup::ResolveVar { target, ns, symbol } => {
                let var = self.env.namespaces_mut().intern(self.heap, ns, symbol);
                self.assign(target, Loaded::Value(var))?;
            }
            Fixup::ResolveType { target, name } => {
                let ty = self
                    .env
                    .find_type(name)
                    .ok_or_else(|| ReconstructError::UnknownType(name.to_string()))?;
                self.assign(target, Loaded::Value(ty))?;
            }
            Fixup::ResolveNamespace { target } => {
                let ns = self
                    .env
                    .namespaces()
                    .current()
                    .map(|ns| ns.value())
                    .ok_or_else(|| ReconstructError::BadTarget {
                        target: target.to_string(),
                        reason: "no current namespace",
                    })?;
                self.assign(target, Loaded::Value(ns))?;
            }
            Fixup::RehashKeyword { keyword } => {
                let id = self.keyword_value(keyword);
                if let Value::Keyword(kw) = self.heap.value_mut(id) {
                    kw.content_hash = keyword_hash(keyword.namespace(), keyword.name());
                }
            }
        }
        Ok(())
    }

    fn assign(&mut self, target: &FieldPath, source: Loaded) -> Result<()> {
        let assigned = match self.lookup(&target.decl)? {
            Loaded::Value(id) => assign_value(self.heap.value_mut(id), target, source),
            Loaded::Expr(id) => assign_expr(&mut self.heap.expr_mut(id).kind, target, source),
            Loaded::Env(id) => assign_env(self.heap.env_mut(id), target, source),
        };
        assigned.ok_or_else(|| ReconstructError::BadTarget {
            target: target.to_string(),
            reason: "field cannot take this value",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field assignment
// ─────────────────────────────────────────────────────────────────────────────

fn set<T>(field: &mut Option<T>, item: Option<T>) -> Option<()> {
    *field = Some(item?);
    Some(())
}

fn set_req<T>(field: &mut T, item: Option<T>) -> Option<()> {
    *field = item?;
    Some(())
}

fn put<T>(slots: &mut [Option<T>], index: usize, item: Option<T>) -> Option<()> {
    *slots.get_mut(index)? = Some(item?);
    Some(())
}

fn put_req<T>(items: &mut [T], index: usize, item: Option<T>) -> Option<()> {
    *items.get_mut(index)? = item?;
    Some(())
}

fn assign_value(value: &mut Value, target: &FieldPath, source: Loaded) -> Option<()> {
    let (v, e, n) = (source.value(), source.expr(), source.env());
    match (value, target.field, target.index) {
        (Value::List(l), "first", None) => set(&mut l.first, v),
        (Value::List(l), "rest", None) => set(&mut l.rest, v),
        (Value::Vector(x), "root", Some(i)) => put(&mut x.root, i, v),
        (Value::Vector(x), "tail", Some(i)) => put(&mut x.tail, i, v),
        (Value::VectorNode(array), "array", Some(i)) => put(array, i, v),
        (Value::ArrayMap(m), "array", Some(i)) => put_req(&mut m.array, i, v),
        (Value::HashMap(m), "root", None) => set(&mut m.root, v),
        (Value::BitmapIndexedNode(node), "array", Some(i)) => put(&mut node.array, i, v),
        (Value::MapSet(map), "map", None) => set_req(map, v),
        (Value::Fn(f), "expr", None) => set(&mut f.expr, e),
        (Value::Fn(f), "env", None) => set(&mut f.env, n),
        (Value::Var(cell), "value", None) => set(&mut cell.value, v),
        (Value::Var(cell), "expr", None) => set(&mut cell.expr, e),
        (Value::Var(cell), "tagged_type", None) => set(&mut cell.tagged_type, v),
        (value, "meta", None) => set(value.meta_mut()?, v),
        _ => None,
    }
}

fn assign_expr(kind: &mut ExprKind, target: &FieldPath, source: Loaded) -> Option<()> {
    let (v, e) = (source.value(), source.expr());
    match (kind, target.field, target.index) {
        (ExprKind::Literal { value, .. }, "value", None) => set_req(value, v),
        (ExprKind::Vector(items) | ExprKind::Set(items), "elements", Some(i))
        | (ExprKind::Do(items), "body", Some(i))
        | (ExprKind::Recur(items), "args", Some(i)) => put_req(items, i, e),
        (ExprKind::Map { keys, .. }, "keys", Some(i)) => put_req(keys, i, e),
        (ExprKind::Map { values, .. }, "values", Some(i)) => put_req(values, i, e),
        (ExprKind::If { cond, .. }, "cond", None) => set_req(cond, e),
        (ExprKind::If { positive, .. }, "positive", None) => set_req(positive, e),
        (ExprKind::If { negative, .. }, "negative", None) => set_req(negative, e),
        (ExprKind::Def { var, .. }, "var", None) => set_req(var, v),
        (ExprKind::Def { value, .. }, "value", None) => set(value, e),
        (ExprKind::Def { meta, .. }, "meta", None) => set(meta, e),
        (ExprKind::Call { callable, .. }, "callable", None) => set_req(callable, e),
        (ExprKind::Call { args, .. }, "args", Some(i)) => put_req(args, i, e),
        (ExprKind::VarRef(var), "var", None) => set_req(var, v),
        (ExprKind::FnArity(arity), "body", Some(i)) => put_req(&mut arity.body, i, e),
        (ExprKind::FnArity(arity), "tagged_type", None) => set(&mut arity.tagged_type, v),
        (ExprKind::Fn { arities, .. }, "arities", Some(i)) => put_req(arities, i, e),
        (ExprKind::Fn { variadic, .. }, "variadic", None) => set(variadic, e),
        (ExprKind::Let { values, .. } | ExprKind::Loop { values, .. }, "values", Some(i)) => {
            put_req(values, i, e)
        }
        (ExprKind::Let { body, .. } | ExprKind::Loop { body, .. }, "body", Some(i)) => {
            put_req(body, i, e)
        }
        (ExprKind::Throw(exc), "exc", None) => set_req(exc, e),
        (ExprKind::Catch(clause), "exc_type", None) => set_req(&mut clause.exc_type, v),
        (ExprKind::Catch(clause), "body", Some(i)) => put_req(&mut clause.body, i, e),
        (ExprKind::Try { body, .. }, "body", Some(i)) => put_req(body, i, e),
        (ExprKind::Try { catches, .. }, "catches", Some(i)) => put_req(catches, i, e),
        (ExprKind::Try { finally, .. }, "finally", Some(i)) => put_req(finally, i, e),
        _ => None,
    }
}

fn assign_env(env: &mut LocalEnv, target: &FieldPath, source: Loaded) -> Option<()> {
    match (target.field, target.index) {
        ("slots", Some(i)) => put(&mut env.slots, i, source.value()),
        ("parent", None) => set(&mut env.parent, source.env()),
        _ => None,
    }
}
