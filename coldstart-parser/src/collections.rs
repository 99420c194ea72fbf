// coldstart-parser - Persistent collection builders and readers
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Building and walking the persistent collections stored in a [`Heap`].
//!
//! Builders produce the same node shapes the runtime uses: cons lists, 32-way
//! vector tries with a tail, flat array maps for small maps and bitmap-indexed
//! tries for larger ones. Readers walk those shapes back into element lists.

use std::collections::HashSet;

use crate::hash::{
    combine, hash_char, hash_f64, hash_i64, hash_name, hash_ordered, hash_str, hash_unordered,
};
use crate::heap::{Heap, HeapError};
use crate::value::{
    ArrayMapVal, BRANCH_BITS, BRANCH_WIDTH, BitmapIndexedNode, HashMapVal, ListVal, Value, ValueId, VectorVal,
};

/// Maps with more entries than this are built as hash tries.
pub const ARRAY_MAP_MAX_ENTRIES: usize = 8;

fn padded(chunk: &[ValueId]) -> Vec<Option<ValueId>> {
    let mut slots: Vec<Option<ValueId>> = chunk.iter().copied().map(Some).collect();
    slots.resize(BRANCH_WIDTH, None);
    slots
}

fn wrong_kind(expected: &'static str, got: &Value) -> HeapError {
    HeapError::WrongKind {
        expected,
        got: got.kind_name(),
    }
}

impl Heap {
    // ========================================================================
    // Lists
    // ========================================================================

    pub fn empty_list(&mut self) -> ValueId {
        self.alloc(Value::List(ListVal {
            first: None,
            rest: None,
            count: 0,
        }))
    }

    /// Build a fresh list of `items`. The last cell has no `rest`.
    pub fn list(&mut self, items: &[ValueId]) -> ValueId {
        let mut head = None;
        for (i, &item) in items.iter().enumerate().rev() {
            head = Some(self.alloc(Value::List(ListVal {
                first: Some(item),
                rest: head,
                count: items.len() - i,
            })));
        }
        match head {
            Some(id) => id,
            None => self.empty_list(),
        }
    }

    /// Prepend `first` onto an existing list, sharing it as the tail.
    pub fn cons(&mut self, first: ValueId, rest: ValueId) -> Result<ValueId, HeapError> {
        let count = match self.value(rest) {
            Value::List(l) => l.count + 1,
            other => return Err(wrong_kind("List", other)),
        };
        Ok(self.alloc(Value::List(ListVal {
            first: Some(first),
            rest: Some(rest),
            count,
        })))
    }

    /// Elements of a list, in order. Stops if the chain revisits a cell.
    pub fn list_elements(&self, id: ValueId) -> Result<Vec<ValueId>, HeapError> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id);
        while let Some(cell) = cursor {
            if !seen.insert(cell) {
                break;
            }
            match self.value(cell) {
                Value::List(l) => {
                    match l.first {
                        Some(first) => out.push(first),
                        None => break,
                    }
                    cursor = l.rest;
                }
                other => return Err(wrong_kind("List", other)),
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Vectors
    // ========================================================================

    /// Build a vector trie holding `items`.
    pub fn vector(&mut self, items: &[ValueId]) -> ValueId {
        let count = items.len();
        let tail_len = if count == 0 {
            0
        } else {
            (count - 1) % BRANCH_WIDTH + 1
        };
        let (trie_items, tail_items) = items.split_at(count - tail_len);

        let mut level: Vec<ValueId> = trie_items
            .chunks(BRANCH_WIDTH)
            .map(|leaf| self.alloc(Value::VectorNode(leaf.iter().copied().map(Some).collect())))
            .collect();
        let mut shift = BRANCH_BITS;
        while level.len() > BRANCH_WIDTH {
            level = level
                .chunks(BRANCH_WIDTH)
                .map(|branch| self.alloc(Value::VectorNode(padded(branch))))
                .collect();
            shift += BRANCH_BITS;
        }

        self.alloc(Value::Vector(VectorVal {
            root: padded(&level),
            tail: tail_items.iter().copied().map(Some).collect(),
            count,
            shift,
            meta: None,
        }))
    }

    pub fn vector_elements(&self, id: ValueId) -> Result<Vec<ValueId>, HeapError> {
        let Value::Vector(v) = self.value(id) else {
            return Err(wrong_kind("Vector", self.value(id)));
        };
        let mut out = Vec::with_capacity(v.count);
        self.collect_trie(&v.root, v.shift, &mut out)?;
        out.extend(v.tail.iter().flatten().copied());
        Ok(out)
    }

    fn collect_trie(
        &self,
        slots: &[Option<ValueId>],
        shift: u32,
        out: &mut Vec<ValueId>,
    ) -> Result<(), HeapError> {
        for &child in slots.iter().flatten() {
            match self.value(child) {
                Value::VectorNode(items) if shift <= BRANCH_BITS => {
                    out.extend(items.iter().flatten().copied());
                }
                Value::VectorNode(items) => self.collect_trie(items, shift - BRANCH_BITS, out)?,
                other => return Err(wrong_kind("VectorNode", other)),
            }
        }
        Ok(())
    }

    // ========================================================================
    // Maps and sets
    // ========================================================================

    /// Build a map, choosing the array or trie representation by size.
    pub fn map(&mut self, pairs: &[(ValueId, ValueId)]) -> Result<ValueId, HeapError> {
        if pairs.len() <= ARRAY_MAP_MAX_ENTRIES {
            Ok(self.array_map(pairs))
        } else {
            self.hash_map(pairs)
        }
    }

    /// Build a flat array map. Later duplicates replace earlier values in place.
    pub fn array_map(&mut self, pairs: &[(ValueId, ValueId)]) -> ValueId {
        let mut flat: Vec<ValueId> = Vec::with_capacity(pairs.len() * 2);
        for &(key, val) in pairs {
            match (0..flat.len()).step_by(2).find(|&i| self.equiv(flat[i], key)) {
                Some(i) => flat[i + 1] = val,
                None => {
                    flat.push(key);
                    flat.push(val);
                }
            }
        }
        self.alloc(Value::ArrayMap(ArrayMapVal {
            array: flat,
            meta: None,
        }))
    }

    /// Build a hash-array-mapped trie.
    pub fn hash_map(&mut self, pairs: &[(ValueId, ValueId)]) -> Result<ValueId, HeapError> {
        let root = self.alloc(Value::BitmapIndexedNode(BitmapIndexedNode::default()));
        let mut count = 0;
        for &(key, val) in pairs {
            let hash = self.hash_value(key);
            if self.trie_assoc(root, 0, hash, key, val)? {
                count += 1;
            }
        }
        Ok(self.alloc(Value::HashMap(HashMapVal {
            count,
            root: Some(root),
            meta: None,
        })))
    }

    fn trie_node_mut(&mut self, id: ValueId) -> Result<&mut BitmapIndexedNode, HeapError> {
        match self.value_mut(id) {
            Value::BitmapIndexedNode(node) => Ok(node),
            other => Err(wrong_kind("BitmapIndexedNode", other)),
        }
    }

    /// Insert into the trie rooted at `node`; returns whether a new key was added.
    fn trie_assoc(
        &mut self,
        node: ValueId,
        shift: u32,
        hash: u32,
        key: ValueId,
        val: ValueId,
    ) -> Result<bool, HeapError> {
        let bit = 1u32 << ((hash >> shift) & 0x1f);
        let (idx, slot) = match self.value(node) {
            Value::BitmapIndexedNode(n) => {
                let idx = n.pair_index(bit);
                let slot = (n.bitmap & bit != 0).then(|| (n.array[idx], n.array[idx + 1]));
                (idx, slot)
            }
            other => return Err(wrong_kind("BitmapIndexedNode", other)),
        };

        match slot {
            None => {
                let n = self.trie_node_mut(node)?;
                n.bitmap |= bit;
                n.array.insert(idx, Some(val));
                n.array.insert(idx, Some(key));
                Ok(true)
            }
            Some((None, Some(child))) => {
                self.trie_assoc(child, shift + BRANCH_BITS, hash, key, val)
            }
            Some((Some(existing), Some(_))) if self.equiv(existing, key) => {
                self.trie_node_mut(node)?.array[idx + 1] = Some(val);
                Ok(false)
            }
            Some((Some(existing), Some(existing_val))) => {
                let existing_hash = self.hash_value(existing);
                if existing_hash == hash {
                    return Err(HeapError::HashCollision { key, existing });
                }
                let child = self.alloc(Value::BitmapIndexedNode(BitmapIndexedNode::default()));
                let next = shift + BRANCH_BITS;
                self.trie_assoc(child, next, existing_hash, existing, existing_val)?;
                self.trie_assoc(child, next, hash, key, val)?;
                let n = self.trie_node_mut(node)?;
                n.array[idx] = None;
                n.array[idx + 1] = Some(child);
                Ok(true)
            }
            Some(_) => Err(HeapError::WrongKind {
                expected: "map entry",
                got: "empty trie slot",
            }),
        }
    }

    /// Key/value pairs of a map or of a set's backing map.
    pub fn map_entries(&self, id: ValueId) -> Result<Vec<(ValueId, ValueId)>, HeapError> {
        match self.value(id) {
            Value::ArrayMap(m) => Ok(m.array.chunks_exact(2).map(|p| (p[0], p[1])).collect()),
            Value::HashMap(m) => {
                let mut out = Vec::with_capacity(m.count);
                if let Some(root) = m.root {
                    self.collect_entries(root, &mut out)?;
                }
                Ok(out)
            }
            Value::MapSet(backing) => self.map_entries(*backing),
            other => Err(wrong_kind("map", other)),
        }
    }

    fn collect_entries(
        &self,
        node: ValueId,
        out: &mut Vec<(ValueId, ValueId)>,
    ) -> Result<(), HeapError> {
        let Value::BitmapIndexedNode(n) = self.value(node) else {
            return Err(wrong_kind("BitmapIndexedNode", self.value(node)));
        };
        for pair in n.array.chunks_exact(2) {
            match (pair[0], pair[1]) {
                (Some(k), Some(v)) => out.push((k, v)),
                (None, Some(child)) => self.collect_entries(child, out)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Value stored under `key`, if any.
    pub fn map_lookup(&self, map: ValueId, key: ValueId) -> Option<ValueId> {
        self.map_entries(map)
            .ok()?
            .into_iter()
            .find(|&(k, _)| self.equiv(k, key))
            .map(|(_, v)| v)
    }

    /// Build a set over a map binding each element to itself.
    pub fn set(&mut self, items: &[ValueId]) -> Result<ValueId, HeapError> {
        let pairs: Vec<(ValueId, ValueId)> = items.iter().map(|&x| (x, x)).collect();
        let backing = self.map(&pairs)?;
        Ok(self.alloc(Value::MapSet(backing)))
    }

    pub fn set_elements(&self, id: ValueId) -> Result<Vec<ValueId>, HeapError> {
        match self.value(id) {
            Value::MapSet(backing) => Ok(self
                .map_entries(*backing)?
                .into_iter()
                .map(|(k, _)| k)
                .collect()),
            other => Err(wrong_kind("MapSet", other)),
        }
    }

    // ========================================================================
    // Hashing and equality
    // ========================================================================

    /// Deterministic content hash used to place keys in hash tries.
    ///
    /// Functions, vars and other reference-only values hash by id.
    #[must_use]
    pub fn hash_value(&self, id: ValueId) -> u32 {
        match self.value(id) {
            Value::Nil => 0,
            Value::Bool(true) => 1231,
            Value::Bool(false) => 1237,
            Value::Int(i) => hash_i64(*i),
            Value::Double(d) => hash_f64(*d),
            Value::Char(c) => hash_char(*c),
            Value::String(s) => hash_str(s),
            Value::Symbol(s) => combine(0x5359_4d42, hash_name(s.namespace(), s.name())),
            Value::Keyword(k) => k.content_hash,
            Value::List(_) => self
                .list_elements(id)
                .map_or(0, |xs| hash_ordered(xs.into_iter().map(|x| self.hash_value(x)))),
            Value::Vector(_) => self
                .vector_elements(id)
                .map_or(0, |xs| hash_ordered(xs.into_iter().map(|x| self.hash_value(x)))),
            Value::ArrayMap(_) | Value::HashMap(_) => self.map_entries(id).map_or(0, |es| {
                hash_unordered(
                    es.into_iter()
                        .map(|(k, v)| combine(self.hash_value(k), self.hash_value(v))),
                )
            }),
            Value::MapSet(_) => self
                .set_elements(id)
                .map_or(0, |xs| hash_unordered(xs.into_iter().map(|x| self.hash_value(x)))),
            Value::Type(name) | Value::Namespace(name) | Value::NativeProc(name) => hash_str(name),
            _ => hash_i64(i64::from(id.0)),
        }
    }

    /// Structural equality of two values of this heap.
    #[must_use]
    pub fn equiv(&self, a: ValueId, b: ValueId) -> bool {
        a == b || crate::equiv::graph_eq(self, a, self, b)
    }
}
