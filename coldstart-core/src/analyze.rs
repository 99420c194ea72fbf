// coldstart-core - Bootstrap analyzer
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Analyzes top-level forms into compiled expressions and var state.
//!
//! The analyzer never calls procedures. A definition's value is whatever can
//! be folded without running code: literals, collection constructors whose
//! parts fold, function expressions and references to vars that already hold
//! a value. Anything else leaves the var with a compiled expression only.

use std::collections::HashMap;
use std::sync::Arc;

use coldstart_parser::{
    Binding, BindingId, CatchClause, EnvId, Expr, ExprId, ExprKind, FnArity, FnVal, Heap,
    Keyword, LocalEnv, Position, Symbol, Value, ValueId,
};
use im::OrdMap;

use crate::env::GlobalEnv;
use crate::error::{Error, Result};
use crate::namespace::NamespaceRegistry;

/// What a top-level form did.
#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    /// A var was defined or redefined.
    Defined(ValueId),
    /// The current namespace changed.
    Namespace(Arc<str>),
    /// The form was analyzed and otherwise had no effect.
    Evaluated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefKind {
    Def,
    Defonce,
    Defn,
    DefnPrivate,
    Defmacro,
    Defmulti,
}

impl DefKind {
    fn head(self) -> &'static str {
        match self {
            DefKind::Def => "def",
            DefKind::Defonce => "defonce",
            DefKind::Defn => "defn",
            DefKind::DefnPrivate => "defn-",
            DefKind::Defmacro => "defmacro",
            DefKind::Defmulti => "defmulti",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Special {
    Quote,
    If,
    Do,
    Let,
    Loop,
    Recur,
    Fn,
    Def,
    Var,
    Throw,
    Try,
    SetMacro,
    WithMeta,
}

impl Special {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "quote" => Special::Quote,
            "if" => Special::If,
            "do" => Special::Do,
            "let" | "let*" => Special::Let,
            "loop" | "loop*" => Special::Loop,
            "recur" => Special::Recur,
            "fn" | "fn*" => Special::Fn,
            "def" => Special::Def,
            "var" => Special::Var,
            "throw" => Special::Throw,
            "try" => Special::Try,
            "set-macro__" => Special::SetMacro,
            "with-meta" => Special::WithMeta,
            _ => return None,
        })
    }
}

/// Name of a special form or top-level head, if `sym` can denote one.
fn special_name(sym: &Symbol) -> Option<&str> {
    match sym.namespace() {
        None => Some(sym.name()),
        Some(ns) if ns == NamespaceRegistry::CORE_NS => Some(sym.name()),
        Some(_) => None,
    }
}

/// Analyzer over a heap and a global environment.
pub struct Analyzer<'a> {
    heap: &'a mut Heap,
    env: &'a mut GlobalEnv,
    locals: OrdMap<Symbol, BindingId>,
    /// Next free slot of each open frame; the first entry is the top level.
    frames: Vec<u32>,
    let_bindings: HashMap<ExprId, Vec<BindingId>>,
}

impl<'a> Analyzer<'a> {
    pub fn new(heap: &'a mut Heap, env: &'a mut GlobalEnv) -> Self {
        Analyzer {
            heap,
            env,
            locals: OrdMap::new(),
            frames: vec![0],
            let_bindings: HashMap::new(),
        }
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    #[must_use]
    pub fn env(&self) -> &GlobalEnv {
        self.env
    }

    // ─────────────────────────────────────────────────────────────────────
    // Top level
    // ─────────────────────────────────────────────────────────────────────

    /// Evaluate one top-level form.
    pub fn eval_top_level(&mut self, form: ValueId) -> Result<TopLevel> {
        self.locals = OrdMap::new();
        self.frames = vec![0];

        let items = match self.heap.value(form) {
            Value::List(list) if list.count > 0 => self.heap.list_elements(form)?,
            _ => {
                self.analyze(form, &Position::default())?;
                return Ok(TopLevel::Evaluated);
            }
        };
        let head = self.heap.value(items[0]).as_symbol().cloned();
        let kind = match head.as_ref().and_then(special_name) {
            Some("ns") => return self.switch_namespace("ns", &items),
            Some("in-ns") => return self.switch_namespace("in-ns", &items),
            Some("def") => DefKind::Def,
            Some("defonce") => DefKind::Defonce,
            Some("defn") => DefKind::Defn,
            Some("defn-") => DefKind::DefnPrivate,
            Some("defmacro") => DefKind::Defmacro,
            Some("defmulti") => DefKind::Defmulti,
            Some("defmethod") | Some("comment") => return Ok(TopLevel::Evaluated),
            _ => {
                self.analyze(form, &Position::default())?;
                return Ok(TopLevel::Evaluated);
            }
        };
        self.define(kind, &items, form)
    }

    fn switch_namespace(&mut self, head: &'static str, items: &[ValueId]) -> Result<TopLevel> {
        let name = items
            .get(1)
            .and_then(|&form| self.namespace_name(form))
            .ok_or_else(|| Error::syntax(head, "expected a namespace name symbol"))?;
        self.env.namespaces_mut().set_current(self.heap, &name);
        log::debug!("switched to namespace {}", name);
        Ok(TopLevel::Namespace(Arc::from(name)))
    }

    /// `foo.bar` or `'foo.bar`.
    fn namespace_name(&self, form: ValueId) -> Option<String> {
        match self.heap.value(form) {
            Value::Symbol(sym) => Some(sym.to_string()),
            Value::List(_) => {
                let items = self.heap.list_elements(form).ok()?;
                match items.as_slice() {
                    [quote, sym] if self.is_symbol_named(*quote, "quote") => {
                        self.heap.value(*sym).as_symbol().map(|s| s.to_string())
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn define(&mut self, kind: DefKind, items: &[ValueId], form: ValueId) -> Result<TopLevel> {
        let head = kind.head();
        let name_form = *items
            .get(1)
            .ok_or_else(|| Error::syntax(head, "missing name"))?;
        let sym = self
            .heap
            .value(name_form)
            .as_symbol()
            .cloned()
            .ok_or_else(|| Error::syntax(head, "name must be a symbol"))?;

        let ns: Arc<str> = Arc::from(self.env.namespaces().current_name());
        let var = self.env.namespaces_mut().intern(self.heap, &ns, &sym);
        self.apply_symbol_meta(var, name_form)?;
        {
            let cell = self.heap.var_cell_mut(var)?;
            match kind {
                DefKind::DefnPrivate => cell.flags.is_private = true,
                DefKind::Defmacro => cell.flags.is_macro = true,
                _ => {}
            }
        }
        if kind == DefKind::Defonce && self.heap.var_cell(var)?.value.is_some() {
            log::debug!("{}/{} already bound, defonce skipped", ns, sym.name());
            return Ok(TopLevel::Defined(var));
        }

        let pos = self.form_pos(form, &Position::default());
        let rest = &items[2..];
        let mut doc = None;
        let mut attrs = None;
        let expr = match kind {
            DefKind::Defmulti => None,
            DefKind::Def | DefKind::Defonce => match rest {
                [] => None,
                [value] => Some(self.analyze(*value, &pos)?),
                [d, value] if self.is_string(*d) => {
                    doc = Some(*d);
                    Some(self.analyze(*value, &pos)?)
                }
                _ => return Err(Error::syntax(head, "too many arguments")),
            },
            DefKind::Defn | DefKind::DefnPrivate | DefKind::Defmacro => {
                let mut tail = rest;
                if let Some(&d) = tail.first().filter(|&&f| self.is_string(f)) {
                    doc = Some(d);
                    tail = &tail[1..];
                }
                if let Some(&m) = tail
                    .first()
                    .filter(|&&f| matches!(self.heap.value(f), Value::ArrayMap(_) | Value::HashMap(_)))
                {
                    attrs = Some(m);
                    tail = &tail[1..];
                }
                Some(self.analyze_fn(Some(sym.unqualified()), tail, pos, false)?)
            }
        };
        let meta = self.var_meta(name_form, doc, attrs)?;

        let value = match expr {
            Some(e) => self.fold(e)?,
            None => None,
        };
        if kind == DefKind::Defmacro {
            if let Some(v) = value {
                if let Value::Fn(f) = self.heap.value_mut(v) {
                    f.is_macro = true;
                }
            }
        }
        let cell = self.heap.var_cell_mut(var)?;
        cell.expr = expr;
        cell.value = value;
        if meta.is_some() {
            cell.meta = meta;
        }
        log::debug!(
            "{} {}/{} (value: {})",
            head,
            ns,
            sym.name(),
            if value.is_some() { "folded" } else { "none" }
        );
        Ok(TopLevel::Defined(var))
    }

    /// Metadata map for a var: the name symbol's reader metadata, then `:doc`
    /// and the entries of a `defn` attribute map.
    fn var_meta(
        &mut self,
        name_form: ValueId,
        doc: Option<ValueId>,
        attrs: Option<ValueId>,
    ) -> Result<Option<ValueId>> {
        let reader_meta = self.heap.symbol_meta(name_form);
        if doc.is_none() && attrs.is_none() {
            return Ok(reader_meta);
        }
        let mut pairs = match reader_meta {
            Some(m) => self.heap.map_entries(m)?,
            None => Vec::new(),
        };
        if let Some(doc) = doc {
            let key = self.heap.keyword(Keyword::new("doc"));
            pairs.push((key, doc));
        }
        if let Some(attrs) = attrs {
            pairs.extend(self.heap.map_entries(attrs)?);
        }
        Ok(Some(self.heap.map(&pairs)?))
    }

    fn apply_symbol_meta(&mut self, var: ValueId, name_form: ValueId) -> Result<()> {
        let Some(meta) = self.heap.symbol_meta(name_form) else {
            return Ok(());
        };
        let mut flags = self.heap.var_cell(var)?.flags;
        let mut tagged_type = None;
        for (key, value) in self.heap.map_entries(meta)? {
            let Some(name) = self.heap.value(key).as_keyword().map(|k| k.name().to_string())
            else {
                continue;
            };
            let truthy = !matches!(self.heap.value(value), Value::Nil | Value::Bool(false));
            match name.as_str() {
                "private" => flags.is_private = truthy,
                "dynamic" => flags.is_dynamic = truthy,
                "macro" => flags.is_macro = truthy,
                "tag" => tagged_type = Some(self.resolve_type(value)?),
                _ => {}
            }
        }
        let cell = self.heap.var_cell_mut(var)?;
        cell.flags = flags;
        if tagged_type.is_some() {
            cell.tagged_type = tagged_type;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    /// Analyze a form. Forms without a recorded position inherit `parent`.
    pub fn analyze(&mut self, form: ValueId, parent: &Position) -> Result<ExprId> {
        let pos = self.form_pos(form, parent);
        let kind = match self.heap.value(form) {
            Value::Symbol(sym) => {
                let sym = sym.clone();
                return self.analyze_symbol(&sym, pos);
            }
            Value::List(list) if list.count > 0 => return self.analyze_list(form, pos),
            Value::Vector(_) => {
                let elements = self.heap.vector_elements(form)?;
                ExprKind::Vector(self.analyze_all(&elements, &pos)?)
            }
            Value::ArrayMap(_) | Value::HashMap(_) => {
                let entries = self.heap.map_entries(form)?;
                let mut keys = Vec::with_capacity(entries.len());
                let mut values = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    keys.push(self.analyze(k, &pos)?);
                    values.push(self.analyze(v, &pos)?);
                }
                ExprKind::Map { keys, values }
            }
            Value::MapSet(_) => {
                let elements = self.heap.set_elements(form)?;
                ExprKind::Set(self.analyze_all(&elements, &pos)?)
            }
            _ => ExprKind::Literal {
                value: form,
                is_surrogate: false,
            },
        };
        Ok(self.heap.alloc_expr(Expr::at(pos, kind)))
    }

    fn analyze_all(&mut self, forms: &[ValueId], pos: &Position) -> Result<Vec<ExprId>> {
        forms.iter().map(|&f| self.analyze(f, pos)).collect()
    }

    fn analyze_symbol(&mut self, sym: &Symbol, pos: Position) -> Result<ExprId> {
        if sym.namespace().is_none() {
            if let Some(&binding) = self.locals.get(sym) {
                self.heap.binding_mut(binding).is_used = true;
                return Ok(self.heap.alloc_expr(Expr::at(pos, ExprKind::Binding(binding))));
            }
        }
        let var = self.resolve_var(sym)?;
        Ok(self.heap.alloc_expr(Expr::at(pos, ExprKind::VarRef(var))))
    }

    fn resolve_var(&mut self, sym: &Symbol) -> Result<ValueId> {
        let from = self.env.namespaces().current_name();
        let var = self
            .env
            .namespaces()
            .resolve(from, sym)
            .ok_or_else(|| Error::UndefinedSymbol(sym.clone()))?;
        let foreign = self.heap.var_cell(var)?.ns.as_ref() != from;
        let cell = self.heap.var_cell_mut(var)?;
        cell.flags.is_used = true;
        if foreign {
            cell.flags.is_globally_used = true;
        }
        Ok(var)
    }

    fn analyze_list(&mut self, form: ValueId, pos: Position) -> Result<ExprId> {
        let items = self.heap.list_elements(form)?;
        let head = items[0];
        let args = &items[1..];

        let special = self
            .heap
            .value(head)
            .as_symbol()
            .and_then(special_name)
            .and_then(Special::from_name);
        match special {
            Some(Special::WithMeta) if args.len() == 2 && self.is_collection(args[0]) => {
                let meta = self.analyze(args[1], &pos)?;
                let expr = self.analyze(args[0], &pos)?;
                return Ok(self.heap.alloc_expr(Expr::at(pos, ExprKind::Meta { meta, expr })));
            }
            Some(Special::WithMeta) | None => {}
            Some(special) => return self.analyze_special(special, args, pos),
        }

        let callable = self.analyze(head, &pos)?;
        let args = self.analyze_all(args, &pos)?;
        Ok(self.heap.alloc_expr(Expr::at(pos, ExprKind::Call { callable, args })))
    }

    fn analyze_special(&mut self, special: Special, args: &[ValueId], pos: Position) -> Result<ExprId> {
        let kind = match special {
            Special::Quote => match args {
                [quoted] => ExprKind::Literal {
                    value: *quoted,
                    is_surrogate: false,
                },
                _ => return Err(Error::syntax("quote", "expects exactly one argument")),
            },
            Special::If => {
                let (cond, positive, negative) = match args {
                    [c, p] => (*c, *p, None),
                    [c, p, n] => (*c, *p, Some(*n)),
                    _ => return Err(Error::syntax("if", "expects 2 or 3 arguments")),
                };
                let cond = self.analyze(cond, &pos)?;
                let positive = self.analyze(positive, &pos)?;
                let negative = match negative {
                    Some(n) => self.analyze(n, &pos)?,
                    None => {
                        let nil = self.heap.nil();
                        self.heap.alloc_expr(Expr::at(
                            pos.clone(),
                            ExprKind::Literal {
                                value: nil,
                                is_surrogate: true,
                            },
                        ))
                    }
                };
                ExprKind::If {
                    cond,
                    positive,
                    negative,
                }
            }
            Special::Do => ExprKind::Do(self.analyze_all(args, &pos)?),
            Special::Let => return self.analyze_let("let", args, pos, false),
            Special::Loop => return self.analyze_let("loop", args, pos, true),
            Special::Recur => ExprKind::Recur(self.analyze_all(args, &pos)?),
            Special::Fn => {
                let named = args
                    .first()
                    .and_then(|&f| self.heap.value(f).as_symbol().cloned());
                return match named {
                    Some(name) => self.analyze_fn(Some(name), &args[1..], pos, true),
                    None => self.analyze_fn(None, args, pos, false),
                };
            }
            Special::Def => return self.analyze_def(args, pos),
            Special::Var => match args {
                [name] => {
                    let sym = self
                        .heap
                        .value(*name)
                        .as_symbol()
                        .cloned()
                        .ok_or_else(|| Error::syntax("var", "expects a symbol"))?;
                    ExprKind::Literal {
                        value: self.resolve_var(&sym)?,
                        is_surrogate: false,
                    }
                }
                _ => return Err(Error::syntax("var", "expects exactly one argument")),
            },
            Special::Throw => match args {
                [exc] => ExprKind::Throw(self.analyze(*exc, &pos)?),
                _ => return Err(Error::syntax("throw", "expects exactly one argument")),
            },
            Special::Try => return self.analyze_try(args, pos),
            Special::SetMacro => match args {
                [name] => {
                    let sym = self
                        .heap
                        .value(*name)
                        .as_symbol()
                        .cloned()
                        .ok_or_else(|| Error::syntax("set-macro__", "expects a symbol"))?;
                    let var = self.resolve_var(&sym)?;
                    let cell = self.heap.var_cell_mut(var)?;
                    cell.flags.is_macro = true;
                    if let Some(value) = cell.value {
                        if let Value::Fn(f) = self.heap.value_mut(value) {
                            f.is_macro = true;
                        }
                    }
                    ExprKind::SetMacro(var)
                }
                _ => return Err(Error::syntax("set-macro__", "expects exactly one argument")),
            },
            Special::WithMeta => {
                return Err(Error::Internal("with-meta reached special dispatch".into()));
            }
        };
        Ok(self.heap.alloc_expr(Expr::at(pos, kind)))
    }

    fn analyze_def(&mut self, args: &[ValueId], pos: Position) -> Result<ExprId> {
        let Some((&name_form, rest)) = args.split_first() else {
            return Err(Error::syntax("def", "missing name"));
        };
        let sym = self
            .heap
            .value(name_form)
            .as_symbol()
            .cloned()
            .ok_or_else(|| Error::syntax("def", "name must be a symbol"))?;
        let ns: Arc<str> = Arc::from(self.env.namespaces().current_name());
        let var = self.env.namespaces_mut().intern(self.heap, &ns, &sym);
        self.apply_symbol_meta(var, name_form)?;

        let value = match rest {
            [] => None,
            [value] => Some(self.analyze(*value, &pos)?),
            [doc, value] if self.is_string(*doc) => Some(self.analyze(*value, &pos)?),
            _ => return Err(Error::syntax("def", "too many arguments")),
        };
        let meta = self.heap.symbol_meta(name_form).map(|m| {
            self.heap.alloc_expr(Expr::at(
                pos.clone(),
                ExprKind::Literal {
                    value: m,
                    is_surrogate: false,
                },
            ))
        });
        Ok(self
            .heap
            .alloc_expr(Expr::at(pos, ExprKind::Def { var, value, meta })))
    }

    fn analyze_let(
        &mut self,
        head: &'static str,
        args: &[ValueId],
        pos: Position,
        is_loop: bool,
    ) -> Result<ExprId> {
        let Some((&bindings_form, body)) = args.split_first() else {
            return Err(Error::syntax(head, "missing binding vector"));
        };
        if !matches!(self.heap.value(bindings_form), Value::Vector(_)) {
            return Err(Error::syntax(head, "bindings must be a vector"));
        }
        let pairs = self.heap.vector_elements(bindings_form)?;
        if pairs.len() % 2 != 0 {
            return Err(Error::syntax(head, "bindings require an even number of forms"));
        }

        let saved = self.locals.clone();
        let mut names = Vec::with_capacity(pairs.len() / 2);
        let mut values = Vec::with_capacity(pairs.len() / 2);
        let mut bindings = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let name = self.local_name(pair[0], head)?;
            values.push(self.analyze(pair[1], &pos)?);
            bindings.push(self.bind_local(name.clone()));
            names.push(name);
        }
        let body = self.analyze_all(body, &pos)?;
        self.locals = saved;

        let kind = if is_loop {
            ExprKind::Loop {
                names,
                values,
                body,
            }
        } else {
            ExprKind::Let {
                names,
                values,
                body,
            }
        };
        let id = self.heap.alloc_expr(Expr::at(pos, kind));
        self.let_bindings.insert(id, bindings);
        Ok(id)
    }

    fn analyze_try(&mut self, args: &[ValueId], pos: Position) -> Result<ExprId> {
        let mut body = Vec::new();
        let mut catches = Vec::new();
        let mut finally = None;

        for &form in args {
            match self.clause_head(form) {
                Some("catch") => {
                    let items = self.heap.list_elements(form)?;
                    if items.len() < 3 {
                        return Err(Error::syntax("catch", "expects a type and a binding name"));
                    }
                    let clause_pos = self.form_pos(form, &pos);
                    let exc_type = self.resolve_type(items[1])?;
                    let symbol = self.local_name(items[2], "catch")?;
                    let saved = self.locals.clone();
                    self.bind_local(symbol.clone());
                    let clause_body = self.analyze_all(&items[3..], &clause_pos)?;
                    self.locals = saved;
                    catches.push(self.heap.alloc_expr(Expr::at(
                        clause_pos,
                        ExprKind::Catch(CatchClause {
                            exc_type,
                            symbol,
                            body: clause_body,
                        }),
                    )));
                }
                Some("finally") => {
                    if finally.is_some() {
                        return Err(Error::syntax("try", "only one finally clause allowed"));
                    }
                    let items = self.heap.list_elements(form)?;
                    finally = Some(self.analyze_all(&items[1..], &pos)?);
                }
                _ => {
                    if !catches.is_empty() || finally.is_some() {
                        return Err(Error::syntax(
                            "try",
                            "body forms must precede catch and finally",
                        ));
                    }
                    body.push(self.analyze(form, &pos)?);
                }
            }
        }
        Ok(self.heap.alloc_expr(Expr::at(
            pos,
            ExprKind::Try {
                body,
                catches,
                finally: finally.unwrap_or_default(),
            },
        )))
    }

    /// `catch` / `finally` if `form` is such a clause.
    fn clause_head(&self, form: ValueId) -> Option<&'static str> {
        if !matches!(self.heap.value(form), Value::List(l) if l.count > 0) {
            return None;
        }
        let items = self.heap.list_elements(form).ok()?;
        if self.is_symbol_named(items[0], "catch") {
            Some("catch")
        } else if self.is_symbol_named(items[0], "finally") {
            Some("finally")
        } else {
            None
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Functions
    // ─────────────────────────────────────────────────────────────────────

    /// Analyze `([params] body...)` or `(([params] body...) ...)`.
    ///
    /// With `bind_self`, the function's name is a local of its own frame.
    fn analyze_fn(
        &mut self,
        self_name: Option<Symbol>,
        tail: &[ValueId],
        pos: Position,
        bind_self: bool,
    ) -> Result<ExprId> {
        let mut arity_forms = Vec::new();
        match tail.first() {
            None => return Err(Error::syntax("fn", "missing parameter list")),
            Some(&first) if self.is_params_form(first) => {
                arity_forms.push((first, tail[1..].to_vec(), pos.clone()));
            }
            Some(_) => {
                for &form in tail {
                    if !matches!(self.heap.value(form), Value::List(l) if l.count > 0) {
                        return Err(Error::syntax("fn", "arity must be a list"));
                    }
                    let items = self.heap.list_elements(form)?;
                    let arity_pos = self.form_pos(form, &pos);
                    arity_forms.push((items[0], items[1..].to_vec(), arity_pos));
                }
            }
        }

        let saved = self.locals.clone();
        self.frames.push(0);
        if bind_self {
            if let Some(name) = &self_name {
                self.bind_local(name.clone());
            }
        }
        let arities = self.analyze_arities(&arity_forms);
        self.frames.pop();
        self.locals = saved;
        let (arities, variadic) = arities?;

        Ok(self.heap.alloc_expr(Expr::at(
            pos,
            ExprKind::Fn {
                arities,
                variadic,
                self_name,
            },
        )))
    }

    fn analyze_arities(
        &mut self,
        arity_forms: &[(ValueId, Vec<ValueId>, Position)],
    ) -> Result<(Vec<ExprId>, Option<ExprId>)> {
        let base_locals = self.locals.clone();
        let base_slot = self.frames.last().copied().unwrap_or(0);
        let mut fixed = Vec::new();
        let mut variadic = None;

        for (params, body, pos) in arity_forms {
            self.locals = base_locals.clone();
            if let Some(slot) = self.frames.last_mut() {
                *slot = base_slot;
            }
            let (arity, is_variadic) = self.analyze_arity(*params, body, pos.clone())?;
            if is_variadic {
                if variadic.is_some() {
                    return Err(Error::syntax("fn", "only one variadic arity allowed"));
                }
                variadic = Some(arity);
            } else {
                fixed.push(arity);
            }
        }
        Ok((fixed, variadic))
    }

    fn analyze_arity(
        &mut self,
        params_form: ValueId,
        body: &[ValueId],
        pos: Position,
    ) -> Result<(ExprId, bool)> {
        let (params, tagged_type) = self.params_of(params_form)?;
        let mut names = Vec::with_capacity(params.len());
        let mut is_variadic = false;
        let mut iter = params.iter();
        while let Some(&param) = iter.next() {
            let name = self.local_name(param, "fn")?;
            if name.name() == "&" {
                let Some(&rest) = iter.next() else {
                    return Err(Error::syntax("fn", "missing rest parameter after &"));
                };
                if iter.next().is_some() {
                    return Err(Error::syntax("fn", "only one parameter may follow &"));
                }
                let rest = self.local_name(rest, "fn")?;
                self.bind_local(rest.clone());
                names.push(rest);
                is_variadic = true;
                break;
            }
            self.bind_local(name.clone());
            names.push(name);
        }
        let body = self.analyze_all(body, &pos)?;
        let arity = self.heap.alloc_expr(Expr::at(
            pos,
            ExprKind::FnArity(FnArity {
                params: names,
                body,
                tagged_type,
            }),
        ));
        Ok((arity, is_variadic))
    }

    fn is_params_form(&self, form: ValueId) -> bool {
        match self.heap.value(form) {
            Value::Vector(_) => true,
            Value::List(_) => self.unwrap_tagged_params(form).is_some(),
            _ => false,
        }
    }

    /// `(with-meta [params] meta)`, as read from `^Type [params]`.
    fn unwrap_tagged_params(&self, form: ValueId) -> Option<(ValueId, ValueId)> {
        let items = self.heap.list_elements(form).ok()?;
        match items.as_slice() {
            [head, params, meta]
                if self.is_symbol_named(*head, "with-meta")
                    && matches!(self.heap.value(*params), Value::Vector(_)) =>
            {
                Some((*params, *meta))
            }
            _ => None,
        }
    }

    fn params_of(&mut self, form: ValueId) -> Result<(Vec<ValueId>, Option<ValueId>)> {
        if matches!(self.heap.value(form), Value::Vector(_)) {
            return Ok((self.heap.vector_elements(form)?, None));
        }
        let (params, meta) = self
            .unwrap_tagged_params(form)
            .ok_or_else(|| Error::syntax("fn", "parameter list must be a vector"))?;
        let mut tagged_type = None;
        for (key, value) in self.heap.map_entries(meta)? {
            if self.heap.value(key).as_keyword().is_some_and(|k| k.name() == "tag") {
                tagged_type = Some(self.resolve_type(value)?);
            }
        }
        Ok((self.heap.vector_elements(params)?, tagged_type))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Constant folding
    // ─────────────────────────────────────────────────────────────────────

    /// Fold an expression to a value without calling anything.
    pub fn fold(&mut self, expr: ExprId) -> Result<Option<ValueId>> {
        self.fold_in(expr, None)
    }

    fn fold_in(&mut self, expr: ExprId, env: Option<EnvId>) -> Result<Option<ValueId>> {
        let kind = self.heap.expr(expr).kind.clone();
        let folded = match kind {
            ExprKind::Literal { value, .. } => Some(value),
            ExprKind::Vector(elements) => self
                .fold_all(&elements, env)?
                .map(|values| self.heap.vector(&values)),
            ExprKind::Map { keys, values } => {
                match (self.fold_all(&keys, env)?, self.fold_all(&values, env)?) {
                    (Some(keys), Some(values)) => {
                        let pairs: Vec<_> = keys.into_iter().zip(values).collect();
                        Some(self.heap.map(&pairs)?)
                    }
                    _ => None,
                }
            }
            ExprKind::Set(elements) => match self.fold_all(&elements, env)? {
                Some(values) => Some(self.heap.set(&values)?),
                None => None,
            },
            ExprKind::Fn { .. } => Some(self.heap.function(FnVal {
                is_macro: false,
                expr: Some(expr),
                env,
                meta: None,
            })),
            ExprKind::VarRef(var) => self.heap.var_cell(var)?.value,
            ExprKind::Binding(binding) => self.lookup_slot(binding, env),
            ExprKind::Let { values, body, .. } => self.fold_let(expr, &values, &body, env)?,
            _ => None,
        };
        Ok(folded)
    }

    fn fold_all(&mut self, exprs: &[ExprId], env: Option<EnvId>) -> Result<Option<Vec<ValueId>>> {
        let mut values = Vec::with_capacity(exprs.len());
        for &e in exprs {
            match self.fold_in(e, env)? {
                Some(v) => values.push(v),
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }

    /// A `let` with foldable values and a single body form folds in a new
    /// frame holding those values, so closures in the body capture it.
    fn fold_let(
        &mut self,
        expr: ExprId,
        values: &[ExprId],
        body: &[ExprId],
        env: Option<EnvId>,
    ) -> Result<Option<ValueId>> {
        let [result] = body else {
            return Ok(None);
        };
        let Some(bindings) = self.let_bindings.get(&expr).cloned() else {
            return Ok(None);
        };
        let Some(values) = self.fold_all(values, env)? else {
            return Ok(None);
        };

        let mut frame = LocalEnv {
            parent: env,
            ..LocalEnv::default()
        };
        for (&binding, value) in bindings.iter().zip(values) {
            let Binding {
                frame: depth,
                index,
                ..
            } = *self.heap.binding(binding);
            frame.frame = depth;
            let index = index as usize;
            if frame.slots.len() <= index {
                frame.slots.resize(index + 1, None);
            }
            frame.slots[index] = Some(value);
        }
        let frame = self.heap.alloc_env(frame);
        self.fold_in(*result, Some(frame))
    }

    fn lookup_slot(&self, binding: BindingId, env: Option<EnvId>) -> Option<ValueId> {
        let Binding { frame, index, .. } = self.heap.binding(binding);
        let mut current = env;
        while let Some(id) = current {
            let env = self.heap.env(id);
            if env.frame == *frame {
                if let Some(Some(value)) = env.slots.get(*index as usize) {
                    return Some(*value);
                }
            }
            current = env.parent;
        }
        None
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    fn bind_local(&mut self, symbol: Symbol) -> BindingId {
        let frame = u32::try_from(self.frames.len().saturating_sub(1)).unwrap_or(u32::MAX);
        let index = match self.frames.last_mut() {
            Some(next) => {
                let index = *next;
                *next += 1;
                index
            }
            None => 0,
        };
        let binding = self
            .heap
            .alloc_binding(Binding::new(symbol.clone(), frame, index));
        self.locals.insert(symbol, binding);
        binding
    }

    fn local_name(&self, form: ValueId, head: &'static str) -> Result<Symbol> {
        self.heap
            .value(form)
            .as_symbol()
            .filter(|s| s.namespace().is_none())
            .cloned()
            .ok_or_else(|| Error::syntax(head, "binding name must be an unqualified symbol"))
    }

    fn resolve_type(&self, form: ValueId) -> Result<ValueId> {
        let name = match self.heap.value(form) {
            Value::Symbol(sym) => sym.to_string(),
            Value::String(s) => s.to_string(),
            other => {
                return Err(Error::syntax(
                    "tag",
                    format!("type must be a symbol, got {}", other.kind_name()),
                ));
            }
        };
        self.env
            .find_type(&name)
            .ok_or(Error::UnknownType(name))
    }

    fn form_pos(&self, form: ValueId, parent: &Position) -> Position {
        self.heap
            .form_position(form)
            .cloned()
            .unwrap_or_else(|| parent.clone())
    }

    fn is_string(&self, form: ValueId) -> bool {
        matches!(self.heap.value(form), Value::String(_))
    }

    fn is_collection(&self, form: ValueId) -> bool {
        matches!(
            self.heap.value(form),
            Value::Vector(_) | Value::ArrayMap(_) | Value::HashMap(_) | Value::MapSet(_)
        )
    }

    fn is_symbol_named(&self, form: ValueId, name: &str) -> bool {
        self.heap
            .value(form)
            .as_symbol()
            .and_then(special_name)
            .is_some_and(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldstart_parser::read_all;

    fn load(source: &str) -> (Heap, GlobalEnv, Vec<TopLevel>) {
        let mut heap = Heap::new();
        let mut env = GlobalEnv::new(&mut heap);
        let forms = read_all(source, &mut heap).unwrap();
        let mut analyzer = Analyzer::new(&mut heap, &mut env);
        let results = forms
            .into_iter()
            .map(|f| analyzer.eval_top_level(f).unwrap())
            .collect();
        (heap, env, results)
    }

    fn var(env: &GlobalEnv, ns: &str, name: &str) -> ValueId {
        env.namespaces()
            .find(ns)
            .and_then(|n| n.find_var(&Symbol::new(name)))
            .unwrap()
    }

    #[test]
    fn test_def_folds_literal() {
        let (heap, env, _) = load("(def x 42)");
        let cell = heap.var_cell(var(&env, "coldstart.core", "x")).unwrap();
        assert_eq!(heap.value(cell.value.unwrap()), &Value::Int(42));
        assert!(matches!(
            heap.expr(cell.expr.unwrap()).kind,
            ExprKind::Literal { .. }
        ));
    }

    #[test]
    fn test_ns_switches_current() {
        let (_, env, results) = load("(ns my.app) (def y 1)");
        assert_eq!(results[0], TopLevel::Namespace(Arc::from("my.app")));
        assert_eq!(env.namespaces().current_name(), "my.app");
        var(&env, "my.app", "y");
    }

    #[test]
    fn test_defn_self_reference_is_var_ref() {
        let (heap, env, _) = load("(defn f [] (f))");
        let f = var(&env, "coldstart.core", "f");
        let cell = heap.var_cell(f).unwrap();
        let ExprKind::Fn { arities, .. } = &heap.expr(cell.expr.unwrap()).kind else {
            panic!("expected fn");
        };
        let ExprKind::FnArity(arity) = &heap.expr(arities[0]).kind else {
            panic!("expected arity");
        };
        let ExprKind::Call { callable, .. } = &heap.expr(arity.body[0]).kind else {
            panic!("expected call");
        };
        assert_eq!(heap.expr(*callable).kind, ExprKind::VarRef(f));
        assert!(matches!(heap.value(cell.value.unwrap()), Value::Fn(_)));
    }

    #[test]
    fn test_locals_get_frame_and_slot() {
        let (heap, env, _) = load("(defn g [a b] (let [c a] b))");
        let cell = heap.var_cell(var(&env, "coldstart.core", "g")).unwrap();
        let ExprKind::Fn { arities, .. } = &heap.expr(cell.expr.unwrap()).kind else {
            panic!("expected fn");
        };
        let ExprKind::FnArity(arity) = &heap.expr(arities[0]).kind else {
            panic!("expected arity");
        };
        let ExprKind::Let { values, body, .. } = &heap.expr(arity.body[0]).kind else {
            panic!("expected let");
        };
        let ExprKind::Binding(a) = heap.expr(values[0]).kind else {
            panic!("expected binding");
        };
        let ExprKind::Binding(b) = heap.expr(body[0]).kind else {
            panic!("expected binding");
        };
        let a = heap.binding(a);
        let b = heap.binding(b);
        assert_eq!((a.frame, a.index, a.is_used), (1, 0, true));
        assert_eq!((b.frame, b.index, b.is_used), (1, 1, true));
    }

    #[test]
    fn test_flags_from_head_and_meta() {
        let (heap, env, _) = load(
            "(defn- hidden [] 1) (def ^:dynamic *level* 0) (defmacro m [x] x) (def ^Int n 3)",
        );
        let flags = |name| heap.var_cell(var(&env, "coldstart.core", name)).unwrap().flags;
        assert!(flags("hidden").is_private);
        assert!(flags("*level*").is_dynamic);
        assert!(flags("m").is_macro);
        let n = heap.var_cell(var(&env, "coldstart.core", "n")).unwrap();
        assert_eq!(n.tagged_type, env.find_type("Int"));
    }

    #[test]
    fn test_defmulti_has_no_value() {
        let (heap, env, _) = load("(defmulti area :shape) (defmethod area :circle [c] 1)");
        let cell = heap.var_cell(var(&env, "coldstart.core", "area")).unwrap();
        assert!(cell.value.is_none());
        assert!(cell.expr.is_none());
    }

    #[test]
    fn test_defonce_keeps_first_value() {
        let (heap, env, _) = load("(defonce a 1) (defonce a 2)");
        let cell = heap.var_cell(var(&env, "coldstart.core", "a")).unwrap();
        assert_eq!(heap.value(cell.value.unwrap()), &Value::Int(1));
    }

    #[test]
    fn test_let_closure_captures_frame() {
        let (heap, env, _) = load("(def g (let [x 1] (fn [] x)))");
        let cell = heap.var_cell(var(&env, "coldstart.core", "g")).unwrap();
        let Value::Fn(f) = heap.value(cell.value.unwrap()) else {
            panic!("expected fn");
        };
        let captured = heap.env(f.env.unwrap());
        assert_eq!(captured.frame, 0);
        assert_eq!(heap.value(captured.slots[0].unwrap()), &Value::Int(1));
    }

    #[test]
    fn test_undefined_symbol() {
        let mut heap = Heap::new();
        let mut env = GlobalEnv::new(&mut heap);
        let forms = read_all("(def x nope)", &mut heap).unwrap();
        let mut analyzer = Analyzer::new(&mut heap, &mut env);
        let err = analyzer.eval_top_level(forms[0]).unwrap_err();
        assert!(matches!(err, Error::UndefinedSymbol(s) if s.name() == "nope"));
    }

    #[test]
    fn test_try_catch_finally() {
        let (heap, env, _) =
            load("(defn t [] (try (throw (ex-info \"x\" {})) (catch Error e e) (finally 1)))");
        let cell = heap.var_cell(var(&env, "coldstart.core", "t")).unwrap();
        let ExprKind::Fn { arities, .. } = &heap.expr(cell.expr.unwrap()).kind else {
            panic!("expected fn");
        };
        let ExprKind::FnArity(arity) = &heap.expr(arities[0]).kind else {
            panic!("expected arity");
        };
        let ExprKind::Try {
            body,
            catches,
            finally,
        } = &heap.expr(arity.body[0]).kind
        else {
            panic!("expected try");
        };
        assert_eq!((body.len(), catches.len(), finally.len()), (1, 1, 1));
        let ExprKind::Catch(clause) = &heap.expr(catches[0]).kind else {
            panic!("expected catch");
        };
        assert_eq!(Some(clause.exc_type), env.find_type("Error"));
    }

    #[test]
    fn test_with_meta_on_vector_is_meta_expr() {
        let (heap, env, _) = load("(def v ^:foo [1 2])");
        let cell = heap.var_cell(var(&env, "coldstart.core", "v")).unwrap();
        assert!(matches!(
            heap.expr(cell.expr.unwrap()).kind,
            ExprKind::Meta { .. }
        ));
        assert!(cell.value.is_none());
    }

    #[test]
    fn test_variadic_and_tagged_arity() {
        let (heap, env, _) = load("(defn h (^Int [x] x) ([x & more] more))");
        let cell = heap.var_cell(var(&env, "coldstart.core", "h")).unwrap();
        let ExprKind::Fn {
            arities, variadic, ..
        } = &heap.expr(cell.expr.unwrap()).kind
        else {
            panic!("expected fn");
        };
        let ExprKind::FnArity(fixed) = &heap.expr(arities[0]).kind else {
            panic!("expected arity");
        };
        assert_eq!(fixed.tagged_type, env.find_type("Int"));
        let ExprKind::FnArity(rest) = &heap.expr(variadic.unwrap()).kind else {
            panic!("expected arity");
        };
        assert_eq!(rest.params.len(), 2);
    }
}
