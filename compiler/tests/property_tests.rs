// Property-based tests for compiler invariants.
//
// Four categories:
// 1. Mapping parser: generated mapping strings parse field-for-field
// 2. Registry: growth per declaration and independence from declaration order
// 3. Round trips through the reference runtime (direct, recursive, list)
// 4. Block body asymmetry: rewrap(unwrap(block)) is the block
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;
use serde_json::{json, Value};
use tmc::ast::Mode;
use tmc::runtime::{BValue, Runtime};
use tmc::CompileOptions;

// ── Test helpers ────────────────────────────────────────────────────────────

const SEED: &str = "static A_TO_B: &[(&str, FromA)] = &[\n    (\"Node\", from_a_unknown),\n];\n";

fn compile(decls: &str) -> tmc::CompileOutput {
    tmc::compile(&format!("{SEED}{decls}"), &CompileOptions::default())
        .unwrap_or_else(|e| panic!("compile failed: {}", e))
}

fn arb_field() -> impl Strategy<Value = String> {
    "[a-z_$][a-zA-Z0-9_$]{0,8}"
}

fn arb_mode() -> impl Strategy<Value = Mode> {
    prop_oneof![
        Just(Mode::Direct),
        Just(Mode::Recursive),
        Just(Mode::MappedList),
        Just(Mode::BlockBody),
    ]
}

fn arb_mapping() -> impl Strategy<Value = Vec<(String, Mode, String)>> {
    prop::collection::vec((arb_field(), arb_mode(), arb_field()), 1..6)
}

fn render_mapping(fields: &[(String, Mode, String)], sep: &str) -> String {
    fields
        .iter()
        .map(|(a, mode, b)| format!("{}{}{}", a, mode.op(), b))
        .collect::<Vec<_>>()
        .join(sep)
}

fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[A-Z][a-zA-Z]{0,10}", 1..20).prop_map(|set| {
        set.into_iter()
            .filter(|t| t != "Node")
            .collect::<Vec<_>>()
    })
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ -~]{0,16}".prop_map(Value::String),
        Just(Value::Null),
    ]
}

// ── 1. Mapping parser ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn generated_mappings_parse(fields in arb_mapping(), spaced in any::<bool>()) {
        let sep = if spaced { " ,  " } else { "," };
        let text = render_mapping(&fields, sep);
        let parsed = tmc::parser::parse_fields(&text, 0)
            .unwrap_or_else(|e| panic!("`{}` failed: {}", text, e));

        prop_assert_eq!(parsed.len(), fields.len());
        for (got, (a, mode, b)) in parsed.iter().zip(&fields) {
            prop_assert_eq!(&got.a_field.name, a);
            prop_assert_eq!(got.mode, *mode);
            prop_assert_eq!(&got.b_field.name, b);
            prop_assert_eq!(&text[got.a_field.span.start..got.a_field.span.end], a.as_str());
        }
    }

    #[test]
    fn foreign_operator_is_malformed(
        a in arb_field(),
        b in arb_field(),
        op in prop::sample::select(vec!['#', '-', ':', '+', '!', '~']),
    ) {
        let text = format!("{a}{op}{b}");
        let err = tmc::parser::parse_fields(&text, 0).unwrap_err();
        let is_malformed = matches!(err, tmc::CompileError::MalformedMapping { .. });
        prop_assert!(is_malformed, "got {:?}", err);
    }
}

// ── 2. Registry ─────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn registry_grows_by_one_per_declaration(tags in arb_tags()) {
        let decls: String = tags
            .iter()
            .enumerate()
            .map(|(i, t)| format!("map!(\"{t}\", Ctor{i}, \"x=y\");\n"))
            .collect();
        let out = compile(&decls);
        prop_assert_eq!(out.registry.len_a(), tags.len() + 1);
        prop_assert_eq!(out.registry.len_b(), tags.len());
    }

    #[test]
    fn declaration_order_does_not_change_functions(
        (tags, shuffled) in arb_tags().prop_flat_map(|tags| {
            let shuffled = Just(tags.clone()).prop_shuffle();
            (Just(tags), shuffled)
        }),
        fields in arb_mapping(),
    ) {
        let mapping = render_mapping(&fields, ", ");
        let decls = |order: &[String]| -> String {
            order
                .iter()
                .map(|t| format!("map!(\"{t}\", B{t}, \"{mapping}\");\n"))
                .collect()
        };
        let first = compile(&decls(&tags));
        let second = compile(&decls(&shuffled));

        for tag in &tags {
            let x = first.registry.lookup(tag).unwrap();
            let y = second.registry.lookup(tag).unwrap();
            prop_assert_eq!(&x.to_b, &y.to_b);
            prop_assert_eq!(&x.to_a, &y.to_a);
            prop_assert_eq!(
                &second.registry.lookup_ctor(&format!("B{tag}")).unwrap().a_tag,
                tag
            );
        }
    }
}

// ── 3. Round trips ──────────────────────────────────────────────────────────

const TREE: &str = r#"
map!("Record", Rec, "field=field");
map!("Wrapper", Wrap, "inner>child");
map!("Program", Toplevel, "body@body");
map!("Identifier", SymbolRef, "name=name");
map!("BlockStatement", BlockStatement, "body@body");
map!("Loop", While, "body%body");
"#;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn direct_field_round_trips(v in arb_scalar()) {
        let out = compile(TREE);
        let rt = Runtime::new(&out.registry, &CompileOptions::default());
        let a = json!({"type": "Record", "field": v.clone()});
        let back = rt.round_trip(&a).unwrap();
        prop_assert_eq!(&back["field"], &v);
    }

    #[test]
    fn recursive_field_keeps_tag(name in "[a-z]{1,8}", start in 0u32..1000) {
        let out = compile(TREE);
        let rt = Runtime::new(&out.registry, &CompileOptions::default());
        let a = json!({
            "type": "Wrapper",
            "inner": {"type": "Identifier", "name": name, "start": start, "end": start + 1}
        });
        let back = rt.round_trip(&a).unwrap();
        prop_assert_eq!(&back["type"], "Wrapper");
        prop_assert_eq!(&back["inner"]["type"], "Identifier");
        prop_assert_eq!(back, a);
    }

    #[test]
    fn mapped_list_keeps_length_and_order(names in prop::collection::vec("[a-z]{1,6}", 0..12)) {
        let out = compile(TREE);
        let rt = Runtime::new(&out.registry, &CompileOptions::default());
        let body: Vec<Value> = names
            .iter()
            .map(|n| json!({"type": "Identifier", "name": n}))
            .collect();
        let a = json!({"type": "Program", "body": body});

        let b = rt.from_a(&a).unwrap();
        let Some(BValue::List(items)) = b.as_node().and_then(|n| n.get("body")) else {
            panic!("body is not a list");
        };
        prop_assert_eq!(items.len(), names.len());
        prop_assert_eq!(rt.to_a(&b).unwrap(), a);
    }
}

// ── 4. Block body ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn single_block_survives_unwrap_rewrap(names in prop::collection::vec("[a-z]{1,6}", 0..8)) {
        let out = compile(TREE);
        let rt = Runtime::new(&out.registry, &CompileOptions::default());
        let stmts: Vec<Value> = names
            .iter()
            .map(|n| json!({"type": "Identifier", "name": n}))
            .collect();
        let a = json!({
            "type": "Loop",
            "body": {"type": "BlockStatement", "body": stmts}
        });

        let b = rt.from_a(&a).unwrap();
        let Some(BValue::List(items)) = b.as_node().and_then(|n| n.get("body")) else {
            panic!("block body was not unwrapped");
        };
        prop_assert_eq!(items.len(), names.len());
        prop_assert_eq!(rt.to_a(&b).unwrap(), a);
    }
}
