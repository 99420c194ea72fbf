// coldstart-emit - Binding and captured environment emission
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use coldstart_parser::{BindingId, EnvId};

use super::{Emitted, NodeKey, Walk};
use crate::error::Result;
use crate::fixup::{FieldPath, Fixup};
use crate::mangle::mangle;
use crate::snapshot::{BindingDecl, Init, Record};

impl Walk<'_> {
    /// Register a binding once per identity and return its constant name.
    pub(crate) fn binding(&mut self, id: BindingId) -> String {
        if let Some(decl) = self.state.registries.binding(id) {
            return decl.name.clone();
        }
        let binding = self.heap.binding(id);
        let mut base = format!(
            "binding_{}_{}_{}",
            mangle(binding.symbol.name()),
            binding.index,
            binding.frame
        );
        if binding.is_used {
            base.push_str("_used");
        }
        let name = self.state.claim(base);
        self.state.registries.add_binding(
            id,
            BindingDecl {
                name: name.clone(),
                symbol: binding.symbol.clone(),
                frame: binding.frame,
                index: binding.index,
                is_used: binding.is_used,
            },
        );
        name
    }

    /// Emit a captured frame.
    ///
    /// Slots are declared as placeholders and each filled by its own fixup,
    /// since a slot may hold a value that is not complete yet. The parent link
    /// is an ordinary reference: frame chains never loop.
    pub(crate) fn local_env(&mut self, id: EnvId, at: &FieldPath) -> Result<Emitted> {
        let key = NodeKey::Env(id);
        if let Some(done) = self.seen(key, "LocalEnv", at) {
            return Ok(done);
        }
        let heap = self.heap;
        let env = heap.env(id);
        let name = self.begin(key, "localEnv");

        let mut slots = Vec::with_capacity(env.slots.len());
        for (i, slot) in env.slots.iter().enumerate() {
            let Some(value) = *slot else {
                slots.push(Init::Empty);
                continue;
            };
            let target = FieldPath::at(&name, "slots", i);
            let kind = heap.value(value).kind_name();
            match self.value(value, &target)? {
                Emitted::Inline(init) => self.defer(Fixup::AssignField {
                    target,
                    value: init,
                }),
                Emitted::Named(decl) => self.defer(Fixup::AssignField {
                    target,
                    value: Init::Ref(decl),
                }),
                Emitted::Deferred(_) => {}
            }
            slots.push(Init::Placeholder(kind));
        }

        let mut record = Record::new("LocalEnv").field("slots", Init::Array(slots));
        if let Some(parent) = env.parent {
            let parent = self.local_env(parent, &FieldPath::new(&name, "parent"))?;
            record.push("parent", parent.into_init());
        }
        record.push("frame", Init::UInt(u64::from(env.frame)));
        Ok(self.complete(key, name, record))
    }
}
