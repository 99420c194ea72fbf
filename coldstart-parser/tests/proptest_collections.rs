// coldstart-parser - Property-based tests for persistent collections
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Builders and readers agree for collections of any size, and the content
//! hash is consistent with structural equality.

use coldstart_parser::{BitmapIndexedNode, Heap, Value, ValueId};
use proptest::prelude::*;

fn alloc_ints(heap: &mut Heap, xs: &[i64]) -> Vec<ValueId> {
    xs.iter().map(|&x| heap.int(x)).collect()
}

fn ints_of(heap: &Heap, ids: &[ValueId]) -> Vec<i64> {
    ids.iter()
        .map(|&id| match heap.value(id) {
            Value::Int(i) => *i,
            other => panic!("expected int, got {:?}", other),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn vector_elements_round_trip(xs in prop::collection::vec(any::<i64>(), 0..2000)) {
        let mut heap = Heap::new();
        let ids = alloc_ints(&mut heap, &xs);
        let v = heap.vector(&ids);
        let back = heap.vector_elements(v).unwrap();
        prop_assert_eq!(ints_of(&heap, &back), xs);
    }

    #[test]
    fn list_elements_round_trip(xs in prop::collection::vec(any::<i64>(), 0..100)) {
        let mut heap = Heap::new();
        let ids = alloc_ints(&mut heap, &xs);
        let l = heap.list(&ids);
        prop_assert_eq!(heap.list_elements(l).unwrap(), ids);
    }

    #[test]
    fn map_keeps_every_distinct_key(
        keys in prop::collection::hash_set(any::<i64>(), 0..300)
    ) {
        let mut heap = Heap::new();
        let keys: Vec<i64> = keys.into_iter().collect();
        let ids = alloc_ints(&mut heap, &keys);
        let pairs: Vec<_> = ids.iter().map(|&k| (k, k)).collect();
        let m = heap.map(&pairs).unwrap();
        let got_ids: Vec<ValueId> = heap.map_entries(m).unwrap().into_iter().map(|(k, _)| k).collect();
        let mut got = ints_of(&heap, &got_ids);
        let mut want = keys.clone();
        got.sort_unstable();
        want.sort_unstable();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn trie_nodes_are_consistent(keys in prop::collection::hash_set(any::<i64>(), 9..200)) {
        let mut heap = Heap::new();
        let keys: Vec<i64> = keys.into_iter().collect();
        let ids = alloc_ints(&mut heap, &keys);
        let pairs: Vec<_> = ids.iter().map(|&k| (k, k)).collect();
        heap.map(&pairs).unwrap();
        for id in heap.value_ids() {
            if let Value::BitmapIndexedNode(BitmapIndexedNode { bitmap, array }) = heap.value(id) {
                prop_assert_eq!(array.len(), 2 * bitmap.count_ones() as usize);
            }
        }
    }

    #[test]
    fn equal_values_hash_equally(xs in prop::collection::vec(any::<i64>(), 0..50)) {
        let mut heap = Heap::new();
        let a = alloc_ints(&mut heap, &xs);
        let b = alloc_ints(&mut heap, &xs);
        let va = heap.vector(&a);
        let vb = heap.vector(&b);
        prop_assert!(heap.equiv(va, vb));
        prop_assert_eq!(heap.hash_value(va), heap.hash_value(vb));
    }
}
