// coldstart-emit - Graph serializer
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Graph serializer: turns the var state left by the bootstrap analyzer into a
//! [`Snapshot`].
//!
//! The emitter works in two phases:
//! 1. Recording: each top-level form is inspected as it is read, and the
//!    names it defines are queued in definition order.
//! 2. Finishing: each queued var is looked up in the live environment and its
//!    value and compiled expression are walked once, producing static
//!    declarations, fixups and interned constants.
//!
//! Every node walk returns an [`Emitted`]: an inline initializer, the name of
//! a completed declaration, or a marker saying the field is filled in by a
//! fixup. Reference nodes are deduplicated by heap identity and scalars by
//! content. A node reached again while still being emitted is a cycle; the
//! field gets a placeholder and an assignment fixup.

mod exprs;
mod lexical;
mod values;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use coldstart_core::{GlobalEnv, NamespaceRegistry};
use coldstart_parser::{EnvId, ExprId, Heap, Symbol, Value, ValueId};
use indexmap::IndexSet;

use crate::error::{EmitError, Result, Severity};
use crate::fixup::{FieldPath, Fixup};
use crate::mangle::mangle;
use crate::registry::{Registries, RegistryMark};
use crate::snapshot::{Decl, Init, Record, Snapshot};

/// Heads that define a var, and so queue the name they define.
const DEFINING_HEADS: &[&str] = &[
    "def", "defn", "defn-", "defmacro", "defonce", "defmulti", "defmethod",
];

/// Heads with no effect on the snapshot.
const NO_OP_HEADS: &[&str] = &["comment", "add-doc-and-meta", "set-macro__", "refer"];

#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Namespace definitions belong to until the first namespace form.
    pub initial_ns: String,
    /// Extra heads skipped with a diagnostic instead of failing.
    pub ignored_heads: Vec<String>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        EmitterConfig {
            initial_ns: NamespaceRegistry::CORE_NS.to_string(),
            ignored_heads: Vec::new(),
        }
    }
}

/// Result of a finished batch.
#[derive(Debug, Clone)]
pub struct Emission {
    pub snapshot: Snapshot,
    /// Every non-fatal error, in the order it happened.
    pub diagnostics: Vec<EmitError>,
}

/// Records top-level forms, then serializes what they defined.
#[derive(Debug, Clone)]
pub struct Emitter {
    config: EmitterConfig,
    current_ns: Arc<str>,
    pending: IndexSet<(Arc<str>, Symbol)>,
    diagnostics: Vec<EmitError>,
}

impl Emitter {
    pub fn new(config: EmitterConfig) -> Self {
        let current_ns = Arc::from(config.initial_ns.as_str());
        Emitter {
            config,
            current_ns,
            pending: IndexSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Namespace new definitions are attributed to.
    #[must_use]
    pub fn current_ns(&self) -> &str {
        &self.current_ns
    }

    /// Queued definitions, first occurrence first.
    pub fn pending(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.pending.iter().map(|(ns, sym)| (ns.as_ref(), sym))
    }

    /// Inspect one top-level form.
    ///
    /// Skippable problems are logged and kept as diagnostics. Only an
    /// unrecognized head is returned as an error.
    pub fn record_top_level_form(&mut self, heap: &Heap, form: ValueId) -> Result<()> {
        match self.classify(heap, form) {
            Ok(()) => Ok(()),
            Err(e) if e.severity() == Severity::Fatal => Err(e),
            Err(e) => {
                log::warn!("{}", e);
                self.diagnostics.push(e);
                Ok(())
            }
        }
    }

    fn classify(&mut self, heap: &Heap, form: ValueId) -> Result<()> {
        let Value::List(_) = heap.value(form) else {
            return Err(skipped(heap, form, "not a list"));
        };
        let items = heap.list_elements(form)?;
        let Some(&head) = items.first() else {
            return Err(skipped(heap, form, "empty list"));
        };
        let Some(sym) = heap.value(head).as_symbol() else {
            return Err(skipped(heap, form, "head is not a symbol"));
        };
        let Some(name) = head_name(sym) else {
            let full = sym.to_string();
            if self.config.ignored_heads.contains(&full) {
                return Err(skipped(heap, form, "ignored head"));
            }
            return Err(EmitError::UnsupportedForm { head: full });
        };

        if DEFINING_HEADS.contains(&name) {
            let sym = items
                .get(1)
                .and_then(|&target| heap.value(target).as_symbol())
                .ok_or_else(|| EmitError::MalformedDefinition {
                    head: name.to_string(),
                })?;
            let ns = Arc::clone(&self.current_ns);
            if self.pending.insert((ns, sym.unqualified())) {
                log::debug!("recorded {} in {}", sym, self.current_ns);
            }
            return Ok(());
        }
        if NO_OP_HEADS.contains(&name) {
            return Ok(());
        }
        if name == "ns" || name == "in-ns" {
            let ns = items
                .get(1)
                .and_then(|&arg| namespace_name(heap, arg))
                .ok_or_else(|| EmitError::MalformedNamespace {
                    form: describe(heap, form),
                })?;
            log::debug!("switching to namespace {}", ns);
            self.current_ns = Arc::from(ns.as_str());
            return Ok(());
        }
        if self.config.ignored_heads.iter().any(|h| h == name) {
            return Err(skipped(heap, form, "ignored head"));
        }
        Err(EmitError::UnsupportedForm {
            head: name.to_string(),
        })
    }

    /// Serialize every recorded definition.
    ///
    /// A definition that cannot be found, or that reaches an unsupported
    /// construct, is rolled back and reported; the rest of the batch goes on.
    pub fn finish(self, heap: &Heap, env: &GlobalEnv) -> Result<Emission> {
        let Emitter {
            pending,
            mut diagnostics,
            ..
        } = self;
        let mut state = EmitState::default();

        for (ns, symbol) in pending {
            let Some(var) = env
                .namespaces()
                .find(&ns)
                .and_then(|namespace| namespace.find_var(&symbol))
            else {
                let e = EmitError::UnresolvedSymbol {
                    ns: ns.to_string(),
                    symbol,
                };
                log::warn!("{}", e);
                diagnostics.push(e);
                continue;
            };

            let checkpoint = state.checkpoint();
            let mut walk = Walk::new(heap, &mut state, format!("{}/{}", ns, symbol));
            match walk.definition(var, &ns, &symbol) {
                Ok(()) => log::debug!("emitted {}/{}", ns, symbol),
                Err(e) if e.severity() == Severity::Fatal => return Err(e),
                Err(e) => {
                    log::error!("{}/{} not emitted: {}", ns, symbol, e);
                    state.rollback(checkpoint);
                    diagnostics.push(e);
                }
            }
        }

        Ok(Emission {
            snapshot: state.into_snapshot(),
            diagnostics,
        })
    }
}

/// Head symbol name, if unqualified or qualified with the core namespace.
fn head_name(sym: &Symbol) -> Option<&str> {
    match sym.namespace() {
        None => Some(sym.name()),
        Some(ns) if ns == NamespaceRegistry::CORE_NS => Some(sym.name()),
        Some(_) => None,
    }
}

/// `foo` or `'foo`.
fn namespace_name(heap: &Heap, arg: ValueId) -> Option<String> {
    match heap.value(arg) {
        Value::Symbol(sym) => Some(sym.to_string()),
        Value::List(_) => {
            let items = heap.list_elements(arg).ok()?;
            match items.as_slice() {
                [quote, name] if heap.value(*quote).as_symbol()?.name() == "quote" => {
                    heap.value(*name).as_symbol().map(Symbol::to_string)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn describe(heap: &Heap, form: ValueId) -> String {
    let value = heap.value(form);
    if let Value::List(_) = value {
        if let Some(head) = heap
            .list_elements(form)
            .ok()
            .and_then(|items| items.first().copied())
        {
            if let Some(sym) = heap.value(head).as_symbol() {
                return format!("({} ...)", sym);
            }
        }
    }
    value.kind_name().to_string()
}

fn skipped(heap: &Heap, form: ValueId, reason: &'static str) -> EmitError {
    EmitError::SkippedForm {
        form: describe(heap, form),
        reason,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Emission state
// ─────────────────────────────────────────────────────────────────────────────

/// What a node walk produced for the field that reached it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Emitted {
    /// Safe to nest directly in the parent declaration.
    Inline(Init),
    /// A completed declaration.
    Named(String),
    /// Filled in by a fixup; the parent holds a placeholder of this kind.
    Deferred(&'static str),
}

impl Emitted {
    pub(crate) fn into_init(self) -> Init {
        match self {
            Emitted::Inline(init) => init,
            Emitted::Named(name) => Init::Ref(name),
            Emitted::Deferred(kind) => Init::Placeholder(kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NodeKey {
    Value(ValueId),
    Expr(ExprId),
    Env(EnvId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    InProgress(String),
    Done(String),
}

/// Content key of a scalar literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ScalarKey {
    Nil,
    Bool(bool),
    Int(i64),
    Double(u64),
    Char(char),
    Str(Arc<str>),
}

#[derive(Debug, Clone)]
enum Undo {
    Node(NodeKey),
    Scalar(ScalarKey),
    Name(String),
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    statics: usize,
    interns: usize,
    deferred: usize,
    registries: RegistryMark,
    journal: usize,
    next_id: u64,
}

/// Everything one batch accumulates.
#[derive(Debug, Default)]
pub(crate) struct EmitState {
    statics: Vec<Decl>,
    /// Namespace intern actions, one per emitted definition.
    interns: Vec<Fixup>,
    /// Every other fixup, in emission order.
    deferred: Vec<Fixup>,
    registries: Registries,
    nodes: HashMap<NodeKey, Status>,
    scalars: HashMap<ScalarKey, String>,
    names: HashSet<String>,
    journal: Vec<Undo>,
    next_id: u64,
}

impl EmitState {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            statics: self.statics.len(),
            interns: self.interns.len(),
            deferred: self.deferred.len(),
            registries: self.registries.mark(),
            journal: self.journal.len(),
            next_id: self.next_id,
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.statics.truncate(checkpoint.statics);
        self.interns.truncate(checkpoint.interns);
        self.deferred.truncate(checkpoint.deferred);
        self.registries.truncate(checkpoint.registries);
        while self.journal.len() > checkpoint.journal {
            match self.journal.pop() {
                Some(Undo::Node(key)) => {
                    self.nodes.remove(&key);
                }
                Some(Undo::Scalar(key)) => {
                    self.scalars.remove(&key);
                }
                Some(Undo::Name(name)) => {
                    self.names.remove(&name);
                }
                None => break,
            }
        }
        self.next_id = checkpoint.next_id;
    }

    /// Claim `base`, or the first free `base_N`.
    pub(crate) fn claim(&mut self, base: String) -> String {
        let mut name = base.clone();
        let mut n = 2;
        while self.names.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.names.insert(name.clone());
        self.journal.push(Undo::Name(name.clone()));
        name
    }

    fn into_snapshot(self) -> Snapshot {
        let mut fixups = self.interns;
        fixups.extend(self.deferred);
        Snapshot {
            interns: self.registries.into_block(),
            statics: self.statics,
            fixups,
        }
    }
}

/// One definition's traversal over the shared state.
pub(crate) struct Walk<'a> {
    heap: &'a Heap,
    state: &'a mut EmitState,
    /// `ns/name` of the definition, for diagnostics.
    definition: String,
}

impl<'a> Walk<'a> {
    fn new(heap: &'a Heap, state: &'a mut EmitState, definition: String) -> Self {
        Walk {
            heap,
            state,
            definition,
        }
    }

    /// Emit a top-level var and queue its namespace intern.
    fn definition(&mut self, var: ValueId, ns: &Arc<str>, symbol: &Symbol) -> Result<()> {
        let cell = self.heap.var_cell(var)?;
        let ns = self.state.registries.string(ns);
        self.state.registries.symbol(symbol);

        if cell.value.is_none() && cell.expr.is_none() {
            self.state.interns.push(Fixup::DeclareVar {
                ns,
                symbol: symbol.clone(),
            });
            return Ok(());
        }

        let name = self.state.claim(format!("v_{}", mangle(symbol.name())));
        let record = self.var_record(var, &name)?;
        self.state.statics.push(Decl {
            name: name.clone(),
            record,
        });
        log::trace!("declared {}", name);
        self.state.interns.push(Fixup::InternVar {
            ns,
            symbol: symbol.clone(),
            decl: name,
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dedup protocol
    // ─────────────────────────────────────────────────────────────────────

    /// The outcome for a node already entered, if any. Reaching a node still
    /// in progress queues an assignment into `at`.
    fn seen(&mut self, key: NodeKey, kind: &'static str, at: &FieldPath) -> Option<Emitted> {
        match self.state.nodes.get(&key)? {
            Status::Done(name) => Some(Emitted::Named(name.clone())),
            Status::InProgress(name) => {
                let value = Init::Ref(name.clone());
                self.defer(Fixup::AssignField {
                    target: at.clone(),
                    value,
                });
                Some(Emitted::Deferred(kind))
            }
        }
    }

    /// Mark a node in progress under a fresh `prefix_N` name.
    fn begin(&mut self, key: NodeKey, prefix: &str) -> String {
        self.state.next_id += 1;
        let name = self
            .state
            .claim(format!("{}_{}", prefix, self.state.next_id));
        self.state
            .nodes
            .insert(key, Status::InProgress(name.clone()));
        self.state.journal.push(Undo::Node(key));
        name
    }

    fn complete(&mut self, key: NodeKey, name: String, record: Record) -> Emitted {
        log::trace!("declared {} ({})", name, record.kind);
        self.state.statics.push(Decl {
            name: name.clone(),
            record,
        });
        self.state.nodes.insert(key, Status::Done(name.clone()));
        Emitted::Named(name)
    }

    /// Declare a scalar once per distinct content.
    fn scalar(&mut self, key: ScalarKey, base: String, record: Record) -> Emitted {
        if let Some(name) = self.state.scalars.get(&key) {
            return Emitted::Named(name.clone());
        }
        let name = self.state.claim(base);
        self.state.statics.push(Decl {
            name: name.clone(),
            record,
        });
        self.state.scalars.insert(key.clone(), name.clone());
        self.state.journal.push(Undo::Scalar(key));
        Emitted::Named(name)
    }

    fn defer(&mut self, fixup: Fixup) {
        log::trace!("deferred {}", fixup);
        self.state.deferred.push(fixup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldstart_parser::read_all;

    fn record(source: &str, config: EmitterConfig) -> (Emitter, Result<()>) {
        let mut heap = Heap::new();
        let forms = read_all(source, &mut heap).unwrap();
        let mut emitter = Emitter::new(config);
        let mut result = Ok(());
        for form in forms {
            result = emitter.record_top_level_form(&heap, form);
            if result.is_err() {
                break;
            }
        }
        (emitter, result)
    }

    #[test]
    fn test_first_definition_wins() {
        let (emitter, result) = record(
            "(def a 1) (defn b [] a) (def a 2) (comment (def c 3))",
            EmitterConfig::default(),
        );
        assert!(result.is_ok());
        let names: Vec<_> = emitter.pending().map(|(_, s)| s.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_namespace_forms_switch_context() {
        let (emitter, _) = record(
            "(ns my.app) (def x 1) (in-ns 'other) (def y 2) (defn- z [] y)",
            EmitterConfig::default(),
        );
        let pending: Vec<_> = emitter
            .pending()
            .map(|(ns, s)| format!("{}/{}", ns, s))
            .collect();
        assert_eq!(pending, vec!["my.app/x", "other/y", "other/z"]);
        assert_eq!(emitter.current_ns(), "other");
    }

    #[test]
    fn test_malformed_namespace_keeps_context() {
        let (emitter, result) = record("(ns 42) (def x 1)", EmitterConfig::default());
        assert!(result.is_ok());
        assert_eq!(emitter.current_ns(), NamespaceRegistry::CORE_NS);
        assert!(matches!(
            emitter.diagnostics.as_slice(),
            [EmitError::MalformedNamespace { .. }]
        ));
    }

    #[test]
    fn test_unknown_head_is_fatal() {
        let (_, result) = record("(doseq [x xs] x)", EmitterConfig::default());
        assert_eq!(
            result,
            Err(EmitError::UnsupportedForm {
                head: "doseq".into()
            })
        );
    }

    #[test]
    fn test_qualified_unknown_head_is_fatal() {
        let (emitter, result) = record("(def a 1) (my.lib/setup!)", EmitterConfig::default());
        assert_eq!(
            result,
            Err(EmitError::UnsupportedForm {
                head: "my.lib/setup!".into()
            })
        );
        assert!(emitter.diagnostics.is_empty());
    }

    #[test]
    fn test_core_qualified_head_is_recognized() {
        let (emitter, result) = record("(coldstart.core/def a 1)", EmitterConfig::default());
        assert!(result.is_ok());
        assert_eq!(emitter.pending().count(), 1);
    }

    #[test]
    fn test_qualified_head_can_be_ignored() {
        let config = EmitterConfig {
            ignored_heads: vec!["my.lib/setup!".into()],
            ..EmitterConfig::default()
        };
        let (emitter, result) = record("(my.lib/setup!) (def a 1)", config);
        assert!(result.is_ok());
        assert!(matches!(
            emitter.diagnostics.as_slice(),
            [EmitError::SkippedForm { reason: "ignored head", .. }]
        ));
    }

    #[test]
    fn test_ignored_heads_are_skipped() {
        let config = EmitterConfig {
            ignored_heads: vec!["doseq".into()],
            ..EmitterConfig::default()
        };
        let (emitter, result) = record("(doseq [x xs] x) 42 (1 2)", config);
        assert!(result.is_ok());
        let reasons: Vec<_> = emitter
            .diagnostics
            .iter()
            .map(|d| match d {
                EmitError::SkippedForm { reason, .. } => *reason,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(reasons, vec!["ignored head", "not a list", "head is not a symbol"]);
    }

    #[test]
    fn test_claim_suffixes_collisions() {
        let mut state = EmitState::default();
        assert_eq!(state.claim("v_x".into()), "v_x");
        assert_eq!(state.claim("v_x".into()), "v_x_2");
        assert_eq!(state.claim("v_x".into()), "v_x_3");
    }

    #[test]
    fn test_rollback_restores_names() {
        let mut state = EmitState::default();
        state.claim("kept".into());
        let checkpoint = state.checkpoint();
        state.claim("dropped".into());
        state.next_id = 9;
        state.rollback(checkpoint);
        assert!(state.names.contains("kept"));
        assert!(!state.names.contains("dropped"));
        assert_eq!(state.next_id, 0);
    }
}
