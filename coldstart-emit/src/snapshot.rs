// coldstart-emit - Snapshot representation and rendering
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The emitter's output: an interning block, static declarations in
//! completion order, and the fixup log. Each renders to one deterministic text
//! stream.

use std::fmt;
use std::sync::Arc;

use coldstart_parser::{Keyword, Symbol};

use crate::fixup::Fixup;
use crate::mangle::mangle;

/// Initializer of a field or array element.
#[derive(Debug, Clone, PartialEq)]
pub enum Init {
    /// Explicit empty slot.
    Empty,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Char(char),
    /// String payload of a string declaration.
    Str(Arc<str>),
    /// Reference to an earlier declaration.
    Ref(String),
    /// Interned symbol constant.
    Symbol(Symbol),
    /// Interned keyword constant.
    Keyword(Keyword),
    /// Interned string constant.
    InternedStr(Arc<str>),
    /// Interned binding constant, by name.
    Binding(String),
    /// An existing native procedure.
    Native(Arc<str>),
    /// A writer with no underlying handle.
    NoHandle,
    /// Neutral value of the given kind, completed or replaced by a fixup.
    Placeholder(&'static str),
    Array(Vec<Init>),
    Record(Record),
}

/// A typed record. Fields at their default value are left out.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: &'static str,
    pub fields: Vec<(&'static str, Init)>,
}

impl Record {
    pub fn new(kind: &'static str) -> Self {
        Record {
            kind,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &'static str, init: Init) -> Self {
        self.push(name, init);
        self
    }

    /// Add a field unless it holds a default.
    pub fn push(&mut self, name: &'static str, init: Init) {
        let is_default = match &init {
            Init::Empty => true,
            Init::Bool(b) => !b,
            Init::UInt(n) => *n == 0,
            Init::Record(r) => r.fields.is_empty(),
            _ => false,
        };
        if !is_default {
            self.fields.push((name, init));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Init> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, init)| init)
    }
}

/// One static declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub name: String,
    pub record: Record,
}

/// A binding constant of the interning block.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingDecl {
    pub name: String,
    pub symbol: Symbol,
    pub frame: u32,
    pub index: u32,
    pub is_used: bool,
}

/// Constants every declaration may refer to, each listed once in
/// first-registration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InternBlock {
    pub strings: Vec<Arc<str>>,
    pub symbols: Vec<Symbol>,
    pub keywords: Vec<Keyword>,
    pub bindings: Vec<BindingDecl>,
}

/// A complete snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub interns: InternBlock,
    pub statics: Vec<Decl>,
    pub fixups: Vec<Fixup>,
}

impl Snapshot {
    #[must_use]
    pub fn decl(&self, name: &str) -> Option<&Decl> {
        self.statics.iter().find(|d| d.name == name)
    }

    pub fn render_interns(&self) -> String {
        self.interns.to_string()
    }

    pub fn render_statics(&self) -> String {
        let mut out = String::new();
        for decl in &self.statics {
            out.push_str(&decl.to_string());
        }
        out
    }

    pub fn render_fixups(&self) -> String {
        let mut out = String::new();
        for fixup in &self.fixups {
            out.push_str(&fixup.to_string());
            out.push('\n');
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn string_const(s: &str) -> String {
    format!("s_{}", mangle(s))
}

pub(crate) fn symbol_const(sym: &Symbol) -> String {
    format!("sym_{}", mangle(&sym.to_string()))
}

pub(crate) fn keyword_const(kw: &Keyword) -> String {
    match kw.namespace() {
        Some(ns) => format!("kw_{}_FW_{}", mangle(ns), mangle(kw.name())),
        None => format!("kw_{}", mangle(kw.name())),
    }
}

impl fmt::Display for Init {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Init::Empty => write!(f, "_"),
            Init::Bool(b) => write!(f, "{}", b),
            Init::Int(i) => write!(f, "{}", i),
            Init::UInt(n) => write!(f, "{}", n),
            Init::Double(d) => write!(f, "{:?}", d),
            Init::Char(c) => write!(f, "{:?}", c),
            Init::Str(s) => write!(f, "{:?}", s),
            Init::Ref(name) | Init::Binding(name) => write!(f, "{}", name),
            Init::Symbol(sym) => write!(f, "{}", symbol_const(sym)),
            Init::Keyword(kw) => write!(f, "{}", keyword_const(kw)),
            Init::InternedStr(s) => write!(f, "{}", string_const(s)),
            Init::Native(name) => write!(f, "native({:?})", name),
            Init::NoHandle => write!(f, "no_handle"),
            Init::Placeholder(kind) => write!(f, "<{}>", kind),
            Init::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Init::Record(record) => write!(f, "{}", record),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return write!(f, "{} {{}}", self.kind);
        }
        write!(f, "{} {{ ", self.kind)?;
        for (i, (name, init)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, init)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.record.fields.is_empty() {
            return writeln!(f, "{} = {} {{}}", self.name, self.record.kind);
        }
        writeln!(f, "{} = {} {{", self.name, self.record.kind)?;
        for (name, init) in &self.record.fields {
            writeln!(f, "    {}: {},", name, init)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for InternBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.strings {
            writeln!(f, "{} = {:?}", string_const(s), s)?;
        }
        for sym in &self.symbols {
            write!(f, "{} = Symbol {{ ", symbol_const(sym))?;
            if let Some(ns) = sym.namespace() {
                write!(f, "ns: {}, ", string_const(ns))?;
            }
            writeln!(f, "name: {} }}", string_const(sym.name()))?;
        }
        for kw in &self.keywords {
            write!(f, "{} = Keyword {{ ", keyword_const(kw))?;
            if let Some(ns) = kw.namespace() {
                write!(f, "ns: {}, ", string_const(ns))?;
            }
            writeln!(f, "name: {} }}", string_const(kw.name()))?;
        }
        for b in &self.bindings {
            write!(
                f,
                "{} = Binding {{ symbol: {}, index: {}, frame: {}",
                b.name,
                symbol_const(&b.symbol),
                b.index,
                b.frame
            )?;
            if b.is_used {
                write!(f, ", is_used: true")?;
            }
            writeln!(f, " }}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skips_defaults() {
        let mut record = Record::new("List");
        record.push("first", Init::Ref("int_1".into()));
        record.push("rest", Init::Empty);
        record.push("count", Init::UInt(0));
        record.push("is_macro", Init::Bool(false));
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.to_string(), "List { first: int_1 }");
    }

    #[test]
    fn test_decl_rendering() {
        let decl = Decl {
            name: "vector_1".into(),
            record: Record::new("Vector")
                .field(
                    "tail",
                    Init::Array(vec![Init::Ref("int_1".into()), Init::Empty]),
                )
                .field("count", Init::UInt(1)),
        };
        assert_eq!(
            decl.to_string(),
            "vector_1 = Vector {\n    tail: [int_1, _],\n    count: 1,\n}\n"
        );
    }

    #[test]
    fn test_intern_rendering() {
        let block = InternBlock {
            strings: vec![Arc::from("x")],
            symbols: vec![Symbol::new("x")],
            keywords: vec![Keyword::parse("a/b")],
            bindings: vec![],
        };
        assert_eq!(
            block.to_string(),
            "s_x = \"x\"\nsym_x = Symbol { name: s_x }\nkw_a_FW_b = Keyword { ns: s_a, name: s_b }\n"
        );
    }
}
