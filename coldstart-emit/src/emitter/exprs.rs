// coldstart-emit - Expression emission
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use coldstart_parser::{Expr, ExprId, ExprKind, Position};

use super::{Emitted, NodeKey, Walk};
use crate::error::{EmitError, Result};
use crate::fixup::FieldPath;
use crate::snapshot::{Init, Record};

/// Declaration name prefix for an expression kind.
fn prefix(kind: &ExprKind) -> &'static str {
    match kind {
        ExprKind::Literal { .. } => "literalExpr",
        ExprKind::Vector(_) => "vectorExpr",
        ExprKind::Map { .. } => "mapExpr",
        ExprKind::Set(_) => "setExpr",
        ExprKind::If { .. } => "ifExpr",
        ExprKind::Def { .. } => "defExpr",
        ExprKind::Call { .. } => "callExpr",
        ExprKind::Recur(_) => "recurExpr",
        ExprKind::VarRef(_) => "varRefExpr",
        ExprKind::SetMacro(_) => "setMacroExpr",
        ExprKind::Binding(_) => "bindingExpr",
        ExprKind::Meta { .. } => "metaExpr",
        ExprKind::Do(_) => "doExpr",
        ExprKind::FnArity(_) => "fnArityExpr",
        ExprKind::Fn { .. } => "fnExpr",
        ExprKind::Let { .. } => "letExpr",
        ExprKind::Loop { .. } => "loopExpr",
        ExprKind::Throw(_) => "throwExpr",
        ExprKind::Catch(_) => "catchExpr",
        ExprKind::Try { .. } => "tryExpr",
    }
}

impl Walk<'_> {
    /// Emit the expression `id`, reached through the field `at`.
    pub(crate) fn expr(&mut self, id: ExprId, at: &FieldPath) -> Result<Emitted> {
        let heap = self.heap;
        let expr = heap.expr(id);
        let kind_name = expr.kind.kind_name();

        let key = NodeKey::Expr(id);
        if let Some(done) = self.seen(key, kind_name, at) {
            return Ok(done);
        }

        let (name, record) = match &expr.kind {
            ExprKind::Meta { .. } => {
                return Err(EmitError::UnsupportedExpr {
                    kind: kind_name,
                    definition: self.definition.clone(),
                });
            }
            // The var's own macro flag carries the effect.
            ExprKind::SetMacro(_) => return Ok(Emitted::Inline(Init::Placeholder(kind_name))),
            // A bare forward declaration needs no reconstruction.
            ExprKind::Def { value: None, .. } => {
                return Ok(Emitted::Inline(Init::Placeholder(kind_name)));
            }
            ExprKind::Literal {
                value,
                is_surrogate,
            } => {
                let (name, mut record) = self.open(key, expr);
                let value = self.value(*value, &FieldPath::new(&name, "value"))?;
                record.push("value", value.into_init());
                record.push("is_surrogate", Init::Bool(*is_surrogate));
                (name, record)
            }
            ExprKind::Vector(elements) | ExprKind::Set(elements) => {
                let (name, mut record) = self.open(key, expr);
                let elements = self.exprs(elements, &name, "elements")?;
                record.push("elements", elements);
                (name, record)
            }
            ExprKind::Map { keys, values } => {
                let (name, mut record) = self.open(key, expr);
                let keys = self.exprs(keys, &name, "keys")?;
                record.push("keys", keys);
                let values = self.exprs(values, &name, "values")?;
                record.push("values", values);
                (name, record)
            }
            ExprKind::If {
                cond,
                positive,
                negative,
            } => {
                let (name, mut record) = self.open(key, expr);
                let cond = self.expr(*cond, &FieldPath::new(&name, "cond"))?;
                record.push("cond", cond.into_init());
                let positive = self.expr(*positive, &FieldPath::new(&name, "positive"))?;
                record.push("positive", positive.into_init());
                let negative = self.expr(*negative, &FieldPath::new(&name, "negative"))?;
                record.push("negative", negative.into_init());
                (name, record)
            }
            ExprKind::Def { var, value, meta } => {
                let (name, mut record) = self.open(key, expr);
                let var = self.value(*var, &FieldPath::new(&name, "var"))?;
                record.push("var", var.into_init());
                let value = self.opt_expr(*value, &FieldPath::new(&name, "value"))?;
                record.push("value", value);
                let meta = self.opt_expr(*meta, &FieldPath::new(&name, "meta"))?;
                record.push("meta", meta);
                (name, record)
            }
            ExprKind::Call { callable, args } => {
                let (name, mut record) = self.open(key, expr);
                let callable = self.expr(*callable, &FieldPath::new(&name, "callable"))?;
                record.push("callable", callable.into_init());
                let args = self.exprs(args, &name, "args")?;
                record.push("args", args);
                (name, record)
            }
            ExprKind::Recur(args) => {
                let (name, mut record) = self.open(key, expr);
                let args = self.exprs(args, &name, "args")?;
                record.push("args", args);
                (name, record)
            }
            ExprKind::VarRef(var) => {
                let (name, mut record) = self.open(key, expr);
                let var = self.value(*var, &FieldPath::new(&name, "var"))?;
                record.push("var", var.into_init());
                (name, record)
            }
            ExprKind::Binding(binding) => {
                let (name, mut record) = self.open(key, expr);
                let binding = self.binding(*binding);
                record.push("binding", Init::Binding(binding));
                (name, record)
            }
            ExprKind::Do(body) => {
                let (name, mut record) = self.open(key, expr);
                let body = self.exprs(body, &name, "body")?;
                record.push("body", body);
                (name, record)
            }
            ExprKind::FnArity(arity) => {
                let (name, mut record) = self.open(key, expr);
                record.push("params", self.symbols(&arity.params));
                let body = self.exprs(&arity.body, &name, "body")?;
                record.push("body", body);
                let tagged = match arity.tagged_type {
                    Some(t) => self.value(t, &FieldPath::new(&name, "tagged_type"))?.into_init(),
                    None => Init::Empty,
                };
                record.push("tagged_type", tagged);
                (name, record)
            }
            ExprKind::Fn {
                arities,
                variadic,
                self_name,
            } => {
                let (name, mut record) = self.open(key, expr);
                let arities = self.exprs(arities, &name, "arities")?;
                record.push("arities", arities);
                let variadic = self.opt_expr(*variadic, &FieldPath::new(&name, "variadic"))?;
                record.push("variadic", variadic);
                if let Some(sym) = self_name {
                    self.state.registries.symbol(sym);
                    record.push("self_name", Init::Symbol(sym.clone()));
                }
                (name, record)
            }
            ExprKind::Let {
                names,
                values,
                body,
            }
            | ExprKind::Loop {
                names,
                values,
                body,
            } => {
                let (name, mut record) = self.open(key, expr);
                record.push("names", self.symbols(names));
                let values = self.exprs(values, &name, "values")?;
                record.push("values", values);
                let body = self.exprs(body, &name, "body")?;
                record.push("body", body);
                (name, record)
            }
            ExprKind::Throw(exc) => {
                let (name, mut record) = self.open(key, expr);
                let exc = self.expr(*exc, &FieldPath::new(&name, "exc"))?;
                record.push("exc", exc.into_init());
                (name, record)
            }
            ExprKind::Catch(clause) => {
                let (name, mut record) = self.open(key, expr);
                let exc_type = self.value(clause.exc_type, &FieldPath::new(&name, "exc_type"))?;
                record.push("exc_type", exc_type.into_init());
                self.state.registries.symbol(&clause.symbol);
                record.push("symbol", Init::Symbol(clause.symbol.clone()));
                let body = self.exprs(&clause.body, &name, "body")?;
                record.push("body", body);
                (name, record)
            }
            ExprKind::Try {
                body,
                catches,
                finally,
            } => {
                let (name, mut record) = self.open(key, expr);
                let body = self.exprs(body, &name, "body")?;
                record.push("body", body);
                let catches = self.exprs(catches, &name, "catches")?;
                record.push("catches", catches);
                let finally = self.exprs(finally, &name, "finally")?;
                record.push("finally", finally);
                (name, record)
            }
        };

        Ok(self.complete(key, name, record))
    }

    /// Enter `expr` under a fresh name, with its position recorded.
    fn open(&mut self, key: NodeKey, expr: &Expr) -> (String, Record) {
        let name = self.begin(key, prefix(&expr.kind));
        let mut record = Record::new(expr.kind.kind_name());
        record.push("pos", self.position(&expr.pos));
        (name, record)
    }

    fn opt_expr(&mut self, id: Option<ExprId>, at: &FieldPath) -> Result<Init> {
        match id {
            Some(id) => Ok(self.expr(id, at)?.into_init()),
            None => Ok(Init::Empty),
        }
    }

    fn exprs(&mut self, ids: &[ExprId], decl: &str, field: &'static str) -> Result<Init> {
        let mut array = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            array.push(self.expr(id, &FieldPath::at(decl, field, i))?.into_init());
        }
        Ok(Init::Array(array))
    }

    fn symbols(&mut self, symbols: &[coldstart_parser::Symbol]) -> Init {
        Init::Array(
            symbols
                .iter()
                .map(|sym| {
                    self.state.registries.symbol(sym);
                    Init::Symbol(sym.clone())
                })
                .collect(),
        )
    }

    /// Source span as a nested record; an unknown span is left out.
    fn position(&mut self, pos: &Position) -> Init {
        let mut record = Record::new("Position");
        if let Some(file) = &pos.file {
            record.push("file", Init::InternedStr(self.state.registries.string(file)));
        }
        record.push("start_line", Init::UInt(u64::from(pos.start_line)));
        record.push("start_column", Init::UInt(u64::from(pos.start_column)));
        record.push("end_line", Init::UInt(u64::from(pos.end_line)));
        record.push("end_column", Init::UInt(u64::from(pos.end_column)));
        Init::Record(record)
    }
}
