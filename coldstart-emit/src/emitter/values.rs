// coldstart-emit - Value emission
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use coldstart_core::NamespaceRegistry;
use coldstart_parser::hash::hash_str;
use coldstart_parser::{Value, ValueId};

use super::{Emitted, NodeKey, ScalarKey, Walk};
use crate::error::{EmitError, Result};
use crate::fixup::{FieldPath, Fixup};
use crate::mangle::mangle;
use crate::snapshot::{Init, Record};

fn count(n: usize) -> Init {
    Init::UInt(n as u64)
}

impl Walk<'_> {
    /// Emit the value `id`, reached through the field `at`.
    pub(crate) fn value(&mut self, id: ValueId, at: &FieldPath) -> Result<Emitted> {
        let heap = self.heap;
        let value = heap.value(id);
        match value {
            Value::Nil => Ok(self.scalar(ScalarKey::Nil, "nil".into(), Record::new("Nil"))),
            Value::Bool(b) => Ok(self.scalar(
                ScalarKey::Bool(*b),
                format!("bool_{}", b),
                Record::new("Bool").field("b", Init::Bool(*b)),
            )),
            Value::Int(i) => Ok(self.scalar(
                ScalarKey::Int(*i),
                format!("int_{}", mangle(&i.to_string())),
                Record::new("Int").field("i", Init::Int(*i)),
            )),
            Value::Double(d) => Ok(self.scalar(
                ScalarKey::Double(d.to_bits()),
                format!("double_{}", mangle(&format!("{:?}", d))),
                Record::new("Double").field("d", Init::Double(*d)),
            )),
            Value::Char(c) => Ok(self.scalar(
                ScalarKey::Char(*c),
                format!("char_{}", *c as u32),
                Record::new("Char").field("ch", Init::Char(*c)),
            )),
            Value::String(s) => Ok(self.scalar(
                ScalarKey::Str(s.clone()),
                format!("string_{:08x}", hash_str(s)),
                Record::new("String").field("s", Init::Str(s.clone())),
            )),
            Value::Symbol(sym) => {
                self.state.registries.symbol(sym);
                Ok(Emitted::Inline(Init::Symbol(sym.clone())))
            }
            Value::Keyword(kw) => {
                if self.state.registries.keyword(&kw.keyword) {
                    self.defer(Fixup::RehashKeyword {
                        keyword: kw.keyword.clone(),
                    });
                }
                Ok(Emitted::Inline(Init::Keyword(kw.keyword.clone())))
            }
            Value::NativeProc(name) => Ok(Emitted::Inline(Init::Native(name.clone()))),
            Value::OpaqueWriter => Ok(Emitted::Inline(Init::NoHandle)),
            Value::Var(cell) => {
                let ns = self.state.registries.string(&cell.ns);
                self.state.registries.symbol(&cell.symbol);
                self.defer(Fixup::ResolveVar {
                    target: at.clone(),
                    ns,
                    symbol: cell.symbol.clone(),
                });
                Ok(Emitted::Deferred("Var"))
            }
            Value::Type(name) => {
                let name = self.state.registries.string(name);
                self.defer(Fixup::ResolveType {
                    target: at.clone(),
                    name,
                });
                Ok(Emitted::Deferred("Type"))
            }
            Value::Namespace(name) => {
                if name.as_ref() != NamespaceRegistry::CORE_NS {
                    return Err(EmitError::UnsupportedNamespace {
                        name: name.to_string(),
                        definition: self.definition.clone(),
                    });
                }
                self.defer(Fixup::ResolveNamespace { target: at.clone() });
                Ok(Emitted::Deferred("Namespace"))
            }
            _ => self.reference(id, value, at),
        }
    }

    fn reference(&mut self, id: ValueId, value: &Value, at: &FieldPath) -> Result<Emitted> {
        let key = NodeKey::Value(id);
        if let Some(done) = self.seen(key, value.kind_name(), at) {
            return Ok(done);
        }

        let (name, record) = match value {
            Value::List(list) => {
                let name = self.begin(key, "list");
                let mut record = Record::new("List");
                let first = self.opt_value(list.first, &FieldPath::new(&name, "first"))?;
                record.push("first", first);
                let rest = self.opt_value(list.rest, &FieldPath::new(&name, "rest"))?;
                record.push("rest", rest);
                record.push("count", count(list.count));
                (name, record)
            }
            Value::Vector(vector) => {
                let name = self.begin(key, "vector");
                let root = self.slots(&vector.root, &name, "root")?;
                let tail = self.slots(&vector.tail, &name, "tail")?;
                let mut record = Record::new("Vector").field("root", root).field("tail", tail);
                record.push("count", count(vector.count));
                record.push("shift", Init::UInt(u64::from(vector.shift)));
                let meta = self.opt_value(vector.meta, &FieldPath::new(&name, "meta"))?;
                record.push("meta", meta);
                (name, record)
            }
            Value::VectorNode(array) => {
                let name = self.begin(key, "vectorNode");
                let array = self.slots(array, &name, "array")?;
                (name, Record::new("VectorNode").field("array", array))
            }
            Value::ArrayMap(map) => {
                let name = self.begin(key, "arrayMap");
                let mut array = Vec::with_capacity(map.array.len());
                for (i, &entry) in map.array.iter().enumerate() {
                    let at = FieldPath::at(&name, "array", i);
                    array.push(self.value(entry, &at)?.into_init());
                }
                let mut record = Record::new("ArrayMap").field("array", Init::Array(array));
                let meta = self.opt_value(map.meta, &FieldPath::new(&name, "meta"))?;
                record.push("meta", meta);
                (name, record)
            }
            Value::HashMap(map) => {
                let name = self.begin(key, "hashMap");
                let mut record = Record::new("HashMap");
                record.push("count", count(map.count));
                let root = self.opt_value(map.root, &FieldPath::new(&name, "root"))?;
                record.push("root", root);
                let meta = self.opt_value(map.meta, &FieldPath::new(&name, "meta"))?;
                record.push("meta", meta);
                (name, record)
            }
            Value::BitmapIndexedNode(node) => {
                let name = self.begin(key, "node");
                let array = self.slots(&node.array, &name, "array")?;
                let mut record = Record::new("BitmapIndexedNode");
                record.push("bitmap", Init::UInt(u64::from(node.bitmap)));
                record.push("array", array);
                (name, record)
            }
            Value::MapSet(map) => {
                let name = self.begin(key, "mapSet");
                let map = self.value(*map, &FieldPath::new(&name, "map"))?;
                (name, Record::new("MapSet").field("map", map.into_init()))
            }
            Value::Fn(f) => {
                let name = self.begin(key, "fn");
                let mut record = Record::new("Fn");
                record.push("is_macro", Init::Bool(f.is_macro));
                if let Some(expr) = f.expr {
                    let expr = self.expr(expr, &FieldPath::new(&name, "expr"))?;
                    record.push("expr", expr.into_init());
                }
                if let Some(env) = f.env {
                    let env = self.local_env(env, &FieldPath::new(&name, "env"))?;
                    record.push("env", env.into_init());
                }
                let meta = self.opt_value(f.meta, &FieldPath::new(&name, "meta"))?;
                record.push("meta", meta);
                (name, record)
            }
            other => {
                return Err(EmitError::Heap(coldstart_parser::HeapError::WrongKind {
                    expected: "reference value",
                    got: other.kind_name(),
                }));
            }
        };
        Ok(self.complete(key, name, record))
    }

    fn opt_value(&mut self, id: Option<ValueId>, at: &FieldPath) -> Result<Init> {
        match id {
            Some(id) => Ok(self.value(id, at)?.into_init()),
            None => Ok(Init::Empty),
        }
    }

    /// Emit a slot array; empty slots stay explicit.
    fn slots(
        &mut self,
        slots: &[Option<ValueId>],
        decl: &str,
        field: &'static str,
    ) -> Result<Init> {
        let mut array = Vec::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            array.push(self.opt_value(*slot, &FieldPath::at(decl, field, i))?);
        }
        Ok(Init::Array(array))
    }

    /// Fields of a top-level var declaration named `name`.
    pub(crate) fn var_record(&mut self, var: ValueId, name: &str) -> Result<Record> {
        let cell = self.heap.var_cell(var)?;
        let ns = self.state.registries.string(&cell.ns);
        self.state.registries.symbol(&cell.symbol);

        let mut record = Record::new("Var")
            .field("ns", Init::InternedStr(ns))
            .field("symbol", Init::Symbol(cell.symbol.clone()));
        let value = self.opt_value(cell.value, &FieldPath::new(name, "value"))?;
        record.push("value", value);
        if let Some(expr) = cell.expr {
            let expr = self.expr(expr, &FieldPath::new(name, "expr"))?;
            record.push("expr", expr.into_init());
        }
        let flags = cell.flags;
        record.push("is_macro", Init::Bool(flags.is_macro));
        record.push("is_private", Init::Bool(flags.is_private));
        record.push("is_dynamic", Init::Bool(flags.is_dynamic));
        record.push("is_used", Init::Bool(flags.is_used));
        record.push("is_globally_used", Init::Bool(flags.is_globally_used));
        let tagged = self.opt_value(cell.tagged_type, &FieldPath::new(name, "tagged_type"))?;
        record.push("tagged_type", tagged);
        let meta = self.opt_value(cell.meta, &FieldPath::new(name, "meta"))?;
        record.push("meta", meta);
        Ok(record)
    }
}
