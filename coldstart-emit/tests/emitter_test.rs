// coldstart-emit - Emitter integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Integration tests for snapshot emission.
//!
//! Tests for: declarations, dedup, cycles, fixups, namespaces, rollback

mod common;

use common::*;

const CORE: &str = NamespaceRegistry::CORE_NS;

fn ref_to(name: &str) -> Init {
    Init::Ref(name.to_string())
}

// =============================================================================
// Declarations
// =============================================================================

#[test]
fn test_simple_definition() {
    let compiled = compile("(def x 42)");
    assert_eq!(compiled.decl_names(), vec!["int_42", "literalExpr_1", "v_x"]);
    assert_eq!(compiled.field("v_x", "value"), &ref_to("int_42"));
    assert_eq!(compiled.field("v_x", "expr"), &ref_to("literalExpr_1"));
    assert_eq!(compiled.field("literalExpr_1", "value"), &ref_to("int_42"));
    assert_eq!(
        compiled.snapshot().fixups,
        vec![Fixup::InternVar {
            ns: CORE.into(),
            symbol: Symbol::new("x"),
            decl: "v_x".into(),
        }]
    );
    assert_eq!(
        compiled.snapshot().render_fixups(),
        "intern s_coldstart_DOT_core sym_x = v_x\n"
    );
    assert!(compiled.emission.diagnostics.is_empty());
}

#[test]
fn test_expression_positions_are_kept() {
    let compiled = compile("\n  (def x 42)");
    let Init::Record(pos) = compiled.field("literalExpr_1", "pos") else {
        panic!("expected an inline position");
    };
    assert_eq!(pos.get("file"), Some(&Init::InternedStr("test.clj".into())));
    assert_eq!(pos.get("start_line"), Some(&Init::UInt(2)));
    assert!(compiled
        .snapshot()
        .interns
        .strings
        .iter()
        .any(|s| s.as_ref() == "test.clj"));
}

#[test]
fn test_definitions_in_recording_order() {
    let compiled = compile("(def b 2) (def a 1) (def b 3)");
    let interned: Vec<_> = compiled
        .snapshot()
        .fixups
        .iter()
        .filter_map(|f| match f {
            Fixup::InternVar { symbol, .. } => Some(symbol.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(interned, vec!["b", "a"]);
    // The last evaluation is what gets emitted.
    assert_eq!(compiled.field("v_b", "value"), &ref_to("int_3"));
}

#[test]
fn test_var_flags() {
    let compiled = compile("(defn- helper [] 1) (def ^:dynamic *depth* 0) (defn api [] (helper))");
    assert_eq!(compiled.field("v_helper", "is_private"), &Init::Bool(true));
    assert_eq!(compiled.field("v_helper", "is_used"), &Init::Bool(true));
    assert_eq!(
        compiled.field("v__STAR_depth_STAR_", "is_dynamic"),
        &Init::Bool(true)
    );
    assert!(compiled.mismatches().is_empty());
}

#[test]
fn test_defmulti_declares_without_value() {
    let compiled = compile("(defmulti area :shape)");
    assert!(compiled.snapshot().statics.is_empty());
    assert_eq!(
        compiled.snapshot().fixups,
        vec![Fixup::DeclareVar {
            ns: CORE.into(),
            symbol: Symbol::new("area"),
        }]
    );

    let rebuilt = compiled.rebuild();
    let var = rebuilt.reconstruction.var(CORE, "area").unwrap();
    let cell = rebuilt.heap.var_cell(var).unwrap();
    assert!(cell.value.is_none());
    assert!(cell.expr.is_none());
}

// =============================================================================
// Dedup
// =============================================================================

#[test]
fn test_scalars_dedup_by_content() {
    let compiled = compile("(def a [1 2 1])");
    assert_eq!(compiled.count_kind("Int"), 2);
    assert_eq!(
        compiled.field("vector_1", "tail"),
        &Init::Array(vec![ref_to("int_1"), ref_to("int_2"), ref_to("int_1")])
    );
    assert_eq!(compiled.field("vector_1", "count"), &Init::UInt(3));
}

#[test]
fn test_strings_dedup_across_definitions() {
    let compiled = compile("(def a \"hello\") (def b [\"hello\" \"world\"])");
    assert_eq!(compiled.count_kind("String"), 2);
    let Init::Array(tail) = compiled.field("vector_2", "tail") else {
        panic!("expected a tail array");
    };
    assert_eq!(&tail[0], compiled.field("v_a", "value"));
}

#[test]
fn test_shared_reference_emitted_once() {
    let compiled = compile("(def v [1 2]) (def w v)");
    assert_eq!(compiled.count_kind("Vector"), 1);
    assert_eq!(compiled.field("v_v", "value"), compiled.field("v_w", "value"));
}

#[test]
fn test_symbol_names_mangled() {
    let compiled = compile("(def valid? true) (def <=> 0)");
    let names = compiled.decl_names();
    assert!(names.contains(&"v_valid_Q_"));
    assert!(names.contains(&"v__LE__GT_"));
    assert!(names.contains(&"bool_true"));
    assert!(names.contains(&"int_0"));
}

#[test]
fn test_emission_is_deterministic() {
    let source = "(def m {:a 1 :b [2 3]}) (defn f [x] (if x (f nil) m)) (def s #{\"x\" 4})";
    let first = compile(source);
    let second = compile(source);
    assert_eq!(first.snapshot(), second.snapshot());
    assert_eq!(
        first.snapshot().render_statics(),
        second.snapshot().render_statics()
    );
}

// =============================================================================
// Fixups
// =============================================================================

#[test]
fn test_self_reference_resolves_var() {
    let compiled = compile("(defn f [] (f))");
    let fixups = &compiled.snapshot().fixups;
    assert!(matches!(&fixups[0], Fixup::InternVar { decl, .. } if decl == "v_f"));

    let (target, ns, symbol) = fixups
        .iter()
        .find_map(|f| match f {
            Fixup::ResolveVar { target, ns, symbol } => Some((target, ns, symbol)),
            _ => None,
        })
        .expect("a var resolution");
    assert!(target.decl.starts_with("varRefExpr_"));
    assert_eq!(target.field, "var");
    assert_eq!(ns.as_ref(), CORE);
    assert_eq!(symbol, &Symbol::new("f"));
    assert_eq!(
        compiled.field(&target.decl, "var"),
        &Init::Placeholder("Var")
    );

    // The var's expression and its function value share one declaration.
    let Init::Ref(fn_decl) = compiled.field("v_f", "value") else {
        panic!("expected a function reference");
    };
    assert_eq!(compiled.field(fn_decl, "expr"), compiled.field("v_f", "expr"));
}

#[test]
fn test_tagged_type_resolved_by_name() {
    let compiled = compile("(def ^String s \"hi\")");
    assert!(compiled.snapshot().fixups.contains(&Fixup::ResolveType {
        target: FieldPath::new("v_s", "tagged_type"),
        name: "String".into(),
    }));
    assert_eq!(
        compiled.field("v_s", "tagged_type"),
        &Init::Placeholder("Type")
    );
}

#[test]
fn test_keywords_interned_and_rehashed() {
    let compiled = compile("(def k {:a 1 :ns/b :a})");
    let keywords = &compiled.snapshot().interns.keywords;
    assert_eq!(
        keywords,
        &vec![Keyword::new("a"), Keyword::with_namespace("ns", "b")]
    );
    let rehashes = compiled
        .snapshot()
        .fixups
        .iter()
        .filter(|f| matches!(f, Fixup::RehashKeyword { .. }))
        .count();
    assert_eq!(rehashes, 2);
    assert!(compiled.snapshot().render_interns().contains("kw_ns_FW_b"));
}

#[test]
fn test_native_is_inline() {
    let compiled = compile("(def p println)");
    assert_eq!(compiled.field("v_p", "value"), &Init::Native("println".into()));
}

#[test]
fn test_closure_environment_filled_by_fixups() {
    let compiled = compile("(def g (let [x 1] (fn [] x)))");
    assert_eq!(compiled.count_kind("LocalEnv"), 1);
    let env = compiled
        .snapshot()
        .statics
        .iter()
        .find(|d| d.record.kind == "LocalEnv")
        .unwrap();
    assert_eq!(
        env.record.get("slots"),
        Some(&Init::Array(vec![Init::Placeholder("Int")]))
    );
    assert!(compiled.snapshot().fixups.contains(&Fixup::AssignField {
        target: FieldPath::at(&env.name, "slots", 0),
        value: ref_to("int_1"),
    }));

    let bindings = &compiled.snapshot().interns.bindings;
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].symbol, Symbol::new("x"));
    assert!(bindings[0].is_used);
    assert!(bindings[0].name.ends_with("_used"));
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn test_self_cycle_closed_by_fixup() {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    let one = heap.int(1);
    let ones = heap.list(&[one]);
    if let Value::List(list) = heap.value_mut(ones) {
        list.rest = Some(ones);
    }
    define(&mut heap, &mut env, CORE, "ones", ones);

    let compiled = emit_prepared(heap, env, "(def ones nil)");
    assert_eq!(compiled.decl_names(), vec!["int_1", "list_1", "v_ones"]);
    assert_eq!(compiled.field("list_1", "rest"), &Init::Placeholder("List"));
    assert!(compiled.snapshot().fixups.contains(&Fixup::AssignField {
        target: FieldPath::new("list_1", "rest"),
        value: ref_to("list_1"),
    }));

    let rebuilt = compiled.rebuild();
    let list = rebuilt.reconstruction.value("list_1").unwrap();
    let Value::List(cell) = rebuilt.heap.value(list) else {
        panic!("expected a list");
    };
    assert_eq!(cell.rest, Some(list));
    assert!(compiled.mismatches().is_empty());
}

#[test]
fn test_mutual_cycle() {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    let a = heap.int(1);
    let b = heap.int(2);
    let first = heap.list(&[a]);
    let second = heap.list(&[b]);
    if let Value::List(list) = heap.value_mut(first) {
        list.rest = Some(second);
    }
    if let Value::List(list) = heap.value_mut(second) {
        list.rest = Some(first);
    }
    define(&mut heap, &mut env, CORE, "ping", first);
    define(&mut heap, &mut env, CORE, "pong", second);

    let compiled = emit_prepared(heap, env, "(def ping nil) (def pong nil)");
    assert_eq!(compiled.count_kind("List"), 2);
    let assigns = compiled
        .snapshot()
        .fixups
        .iter()
        .filter(|f| matches!(f, Fixup::AssignField { .. }))
        .count();
    assert_eq!(assigns, 1);
    assert!(compiled.mismatches().is_empty());
}

// =============================================================================
// Namespaces
// =============================================================================

#[test]
fn test_definitions_follow_namespace_forms() {
    let compiled = compile("(ns other.ns) (def y 1)");
    assert_eq!(
        compiled.snapshot().fixups,
        vec![Fixup::InternVar {
            ns: "other.ns".into(),
            symbol: Symbol::new("y"),
            decl: "v_y".into(),
        }]
    );
    let rebuilt = compiled.rebuild();
    assert!(rebuilt.reconstruction.var("other.ns", "y").is_some());
    assert!(rebuilt.reconstruction.var(CORE, "y").is_none());
}

#[test]
fn test_core_namespace_value_resolved() {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    let core = env.namespaces().find(CORE).unwrap().value();
    define(&mut heap, &mut env, CORE, "here", core);

    let compiled = emit_prepared(heap, env, "(def here nil)");
    assert!(compiled.snapshot().fixups.contains(&Fixup::ResolveNamespace {
        target: FieldPath::new("v_here", "value"),
    }));
    let rebuilt = compiled.rebuild();
    let var = rebuilt.reconstruction.var(CORE, "here").unwrap();
    let value = rebuilt.heap.var_cell(var).unwrap().value.unwrap();
    assert_eq!(rebuilt.heap.value(value), &Value::Namespace(CORE.into()));
}

#[test]
fn test_other_namespace_value_aborts_definition() {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    let user = env.namespaces_mut().ensure(&mut heap, "user").value();
    define(&mut heap, &mut env, CORE, "there", user);

    let compiled = emit_prepared(heap, env, "(def there nil)");
    assert!(compiled.snapshot().statics.is_empty());
    assert!(compiled.snapshot().fixups.is_empty());
    assert!(matches!(
        compiled.emission.diagnostics.as_slice(),
        [EmitError::UnsupportedNamespace { name, .. }] if name == "user"
    ));
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_meta_expression_rolls_back_definition() {
    let with_meta = compile("(def a 1)\n(def m (with-meta [1 2] {:a 1}))\n(def b [a 2])");
    let without = compile("(def a 1)\n\n(def b [a 2])");

    assert!(matches!(
        with_meta.emission.diagnostics.as_slice(),
        [EmitError::UnsupportedExpr { kind: "MetaExpr", definition }]
            if definition == "coldstart.core/m"
    ));
    assert!(with_meta.snapshot().decl("v_m").is_none());
    assert!(with_meta.snapshot().interns.keywords.is_empty());
    assert_eq!(with_meta.snapshot(), without.snapshot());
}

#[test]
fn test_unresolved_definition_reported() {
    let mut heap = Heap::new();
    let env = GlobalEnv::new(&mut heap);
    let compiled = emit_prepared(heap, env, "(def ghost 1)");
    assert!(compiled.snapshot().statics.is_empty());
    assert!(matches!(
        compiled.emission.diagnostics.as_slice(),
        [EmitError::UnresolvedSymbol { ns, symbol }]
            if ns == CORE && symbol == &Symbol::new("ghost")
    ));
}

#[test]
fn test_unknown_top_level_form_is_fatal() {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    let forms = load_source(&mut heap, &mut env, "(def x 1) (println x)", None).unwrap();
    let mut emitter = Emitter::new(EmitterConfig::default());
    assert!(emitter.record_top_level_form(&heap, forms[0]).is_ok());
    assert_eq!(
        emitter.record_top_level_form(&heap, forms[1]),
        Err(EmitError::UnsupportedForm {
            head: "println".into()
        })
    );
}

#[test]
fn test_qualified_unknown_top_level_form_is_fatal() {
    let mut heap = Heap::new();
    let forms = read_all("(def x 1)\n(my.lib/setup!)", &mut heap).unwrap();
    let mut emitter = Emitter::new(EmitterConfig::default());
    assert!(emitter.record_top_level_form(&heap, forms[0]).is_ok());
    let err = emitter
        .record_top_level_form(&heap, forms[1])
        .unwrap_err();
    assert_eq!(
        err,
        EmitError::UnsupportedForm {
            head: "my.lib/setup!".into()
        }
    );
    assert_eq!(err.to_string(), "Unsupported top-level form: my.lib/setup!");
}

#[test]
fn test_configured_heads_are_skipped() {
    let config = EmitterConfig {
        ignored_heads: vec!["println".into()],
        ..EmitterConfig::default()
    };
    let compiled = compile_with("(def x 1) (println x) (def y 2)", config);
    assert!(compiled.snapshot().decl("v_x").is_some());
    assert!(compiled.snapshot().decl("v_y").is_some());
    assert!(matches!(
        compiled.emission.diagnostics.as_slice(),
        [EmitError::SkippedForm { reason: "ignored head", .. }]
    ));
}
