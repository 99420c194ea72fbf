// coldstart-emit - Snapshot round-trip tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Emitting a program and replaying the snapshot into a fresh environment
//! rebuilds every var with the same graph.

mod common;

use common::*;

const CORE: &str = NamespaceRegistry::CORE_NS;

/// Assert that every var `source` defines survives a round trip.
macro_rules! assert_round_trip {
    ($source:expr) => {
        let compiled = compile($source);
        assert!(
            compiled.emission.diagnostics.is_empty(),
            "Diagnostics for '{}': {:?}",
            $source,
            compiled.emission.diagnostics
        );
        let mismatches = compiled.mismatches();
        assert!(
            mismatches.is_empty(),
            "Round trip of '{}' differs in {:?}",
            $source,
            mismatches
        );
    };
}

fn numbers(n: usize) -> String {
    (0..n).map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_scalars() {
    assert_round_trip!(
        "(def n nil) (def t true) (def f false) (def i -7) (def d 1.5) (def c \\a) (def s \"text\")"
    );
}

#[test]
fn test_quoted_forms() {
    assert_round_trip!("(def q '(a b (c d))) (def sym 'ns/thing) (def empty '())");
}

#[test]
fn test_small_collections() {
    assert_round_trip!("(def v [1 [2 3] []]) (def m {:a 1 \"b\" [2]}) (def s #{:x :y})");
}

#[test]
fn test_large_vector() {
    let source = format!("(def big [{}])", numbers(100));
    assert_round_trip!(source.as_str());
    let compiled = compile(&source);
    assert!(compiled.count_kind("VectorNode") > 0);
}

#[test]
fn test_large_map() {
    let pairs: Vec<_> = (0..20).map(|i| format!(":k{} {}", i, i)).collect();
    let source = format!("(def big {{{}}})", pairs.join(" "));
    assert_round_trip!(source.as_str());
    let compiled = compile(&source);
    assert_eq!(compiled.count_kind("HashMap"), 1);
    assert!(compiled.count_kind("BitmapIndexedNode") > 0);
}

#[test]
fn test_keyword_hashes_recomputed() {
    let compiled = compile("(def k :some/key)");
    let rebuilt = compiled.rebuild();
    let var = rebuilt.reconstruction.var(CORE, "k").unwrap();
    let value = rebuilt.heap.var_cell(var).unwrap().value.unwrap();
    let original = compiled
        .heap
        .var_cell(
            compiled
                .env
                .namespaces()
                .find(CORE)
                .unwrap()
                .find_var(&Symbol::new("k"))
                .unwrap(),
        )
        .unwrap()
        .value
        .unwrap();
    let (Value::Keyword(a), Value::Keyword(b)) =
        (compiled.heap.value(original), rebuilt.heap.value(value))
    else {
        panic!("expected keywords");
    };
    assert_eq!(a.keyword, b.keyword);
    assert_eq!(a.content_hash, b.content_hash);
}

// =============================================================================
// Functions
// =============================================================================

#[test]
fn test_functions() {
    assert_round_trip!(
        "(defn inc2 [x] (inc (inc x)))
         (defn pick ([] nil) ([a] a) ([a & more] more))
         (def anon (fn named [n] (if (= n 0) n (named (dec n)))))"
    );
}

#[test]
fn test_control_flow() {
    assert_round_trip!(
        "(defn count-down [n] (loop [i n] (if (> i 0) (recur (dec i)) i)))
         (defn safe [f] (try (f) (catch Error e (str e)) (finally (println \"done\"))))
         (defn fail [] (throw (ex-info \"bad\" {:code 1})))
         (defn seq-of [] (do (println 1) [1 2]))"
    );
}

#[test]
fn test_closures() {
    assert_round_trip!(
        "(def adder (let [n 5] (fn [x] (+ x n))))
         (def nested (let [a 1] (let [b 2] (fn [] [a b]))))"
    );
}

#[test]
fn test_macros() {
    assert_round_trip!("(defmacro unless [c body] (list 'if c nil body)) (def m unless)");
}

#[test]
fn test_recursive_definitions() {
    assert_round_trip!(
        "(defn fact [n] (if (= n 0) 1 (* n (fact (dec n)))))
         (defn fact5 [] (fact 5))"
    );
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_namespaces() {
    assert_round_trip!("(def a 1) (ns my.lib) (def b coldstart.core/a) (in-ns 'other) (def c [1 2])");
}

#[test]
fn test_flags_and_types() {
    assert_round_trip!("(def ^:dynamic *x* 1) (def ^:private y 2) (def ^Int n 3) (defn ^String name-of [] \"n\")");
}

#[test]
fn test_var_metadata() {
    assert_round_trip!(
        "(def ^{:doc \"d\"} x 1) (def y \"Why.\" 2) (defn f \"Adds.\" {:added \"1.0\"} [a] a)"
    );
    let compiled = compile("(def ^{:doc \"d\"} x 1)");
    assert!(matches!(compiled.field("v_x", "meta"), Init::Ref(_)));
    let rebuilt = compiled.rebuild();
    let var = rebuilt.reconstruction.var(CORE, "x").unwrap();
    let meta = rebuilt.heap.var_cell(var).unwrap().meta.unwrap();
    let entries = rebuilt.heap.map_entries(meta).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(rebuilt.heap.value(entries[0].1), &Value::String("d".into()));
}

#[test]
fn test_collection_metadata() {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    let key = heap.keyword(Keyword::new("source"));
    let tag = heap.string("table");
    let meta = heap.map(&[(key, tag)]).unwrap();
    let one = heap.int(1);
    let vector = heap.vector(&[one]);
    heap.set_meta(vector, meta).unwrap();
    let map = heap.map(&[(key, one)]).unwrap();
    heap.set_meta(map, meta).unwrap();
    define(&mut heap, &mut env, CORE, "v", vector);
    define(&mut heap, &mut env, CORE, "m", map);

    let compiled = emit_prepared(heap, env, "(def v nil) (def m nil)");
    assert!(compiled.emission.diagnostics.is_empty());
    assert!(compiled.mismatches().is_empty());
}

#[test]
fn test_natives_resolve_by_name() {
    assert_round_trip!("(def p println) (def ops [+ - *])");
}

#[test]
fn test_defined_vars_listed_in_log_order() {
    let compiled = compile("(def z 1) (defmulti area :shape) (ns other) (def a 2)");
    let rebuilt = compiled.rebuild();
    let vars: Vec<_> = rebuilt
        .reconstruction
        .vars()
        .map(|(ns, sym, _)| format!("{}/{}", ns, sym))
        .collect();
    assert_eq!(vars, vec!["coldstart.core/z", "coldstart.core/area", "other/a"]);
}

#[test]
fn test_rebuilt_var_is_the_interned_var() {
    let compiled = compile("(defn f [] (f))");
    let rebuilt = compiled.rebuild();
    let var = rebuilt.reconstruction.var(CORE, "f").unwrap();
    let found = rebuilt
        .env
        .namespaces()
        .find(CORE)
        .and_then(|ns| ns.find_var(&Symbol::new("f")));
    assert_eq!(found, Some(var));
    assert_eq!(rebuilt.reconstruction.value("v_f"), Some(var));
}
