//! Tests for the profile compiler.

use killwatch_core::{Attacker, Killmail, Victim};
use serde_json::{json, Value};

use super::*;
use crate::schema::{Field, FilterTree, Operator};

fn killmail(ship_type_id: i64, total_value: f64) -> Killmail {
    Killmail {
        killmail_id: 1,
        killmail_hash: Some("abc".into()),
        killmail_time: "2024-05-01T12:00:00Z".parse().unwrap(),
        solar_system_id: 30000142,
        victim: Victim {
            character_id: Some(90000001),
            corporation_id: Some(98000001),
            ship_type_id: Some(ship_type_id),
            ship_group_id: Some(26),
            character_name: Some("Victim Pilot".into()),
            ..Victim::default()
        },
        attackers: vec![
            Attacker {
                character_id: Some(90000002),
                corporation_id: Some(98000002),
                ship_type_id: Some(11387),
                final_blow: true,
                ..Attacker::default()
            },
            Attacker {
                character_id: Some(90000003),
                corporation_id: Some(98000002),
                ..Attacker::default()
            },
        ],
        total_value: Some(total_value),
        ship_value: None,
        fitted_value: None,
        module_tags: vec!["cloak".into(), "cyno".into()],
        is_npc: false,
        is_solo: false,
    }
}

fn eval(tree: &FilterTree, km: &Killmail) -> bool {
    compile(tree).unwrap()(km).unwrap()
}

fn leaf(field: &str, op: &str, value: Value) -> FilterTree {
    FilterTree::leaf(field, op, value)
}

// ── Groups ──────────────────────────────────────────────────────────

#[test]
fn and_requires_every_child() {
    let km = killmail(670, 150_000_000.0);
    let yes = leaf("victim_ship_type_id", "eq", json!(670));
    let no = leaf("victim_ship_type_id", "eq", json!(671));

    assert!(eval(&FilterTree::and(vec![yes.clone(), yes.clone()]), &km));
    assert!(!eval(&FilterTree::and(vec![yes.clone(), no.clone()]), &km));
    assert!(!eval(&FilterTree::and(vec![no.clone(), no.clone()]), &km));
}

#[test]
fn or_requires_any_child() {
    let km = killmail(670, 150_000_000.0);
    let yes = leaf("victim_ship_type_id", "eq", json!(670));
    let no = leaf("victim_ship_type_id", "eq", json!(671));

    assert!(eval(&FilterTree::or(vec![no.clone(), yes.clone()]), &km));
    assert!(!eval(&FilterTree::or(vec![no.clone(), no.clone()]), &km));
}

#[test]
fn short_circuit_skips_faulting_sibling() {
    // total_value is numeric; a numeric comparison on module_tags faults.
    let km = killmail(670, 150_000_000.0);
    let faulty = leaf("module_tags", "gt", json!(1));

    let or = FilterTree::or(vec![leaf("victim_ship_type_id", "eq", json!(670)), faulty.clone()]);
    assert_eq!(compile(&or).unwrap()(&km), Ok(true));

    let and = FilterTree::and(vec![leaf("victim_ship_type_id", "eq", json!(1)), faulty.clone()]);
    assert_eq!(compile(&and).unwrap()(&km), Ok(false));

    let err = compile(&faulty).unwrap()(&km).unwrap_err();
    assert!(matches!(err, EvaluationError::TypeMismatch { field: Field::ModuleTags, .. }));
}

#[test]
fn empty_group_is_rejected() {
    let err = compile(&FilterTree::and(vec![])).err().unwrap();
    assert_eq!(err, CompileError::EmptyGroup { path: "filter_tree".into() });

    let nested = FilterTree::and(vec![
        leaf("is_solo", "eq", json!(true)),
        FilterTree::or(vec![]),
    ]);
    assert_eq!(compile(&nested).err().unwrap().path(), "filter_tree.and[1]");
}

// ── Scenario: high-value ship kill ──────────────────────────────────

#[test]
fn ship_type_and_value_threshold() {
    let tree: FilterTree = serde_json::from_value(json!({
        "and": [
            {"field": "victim_ship_type_id", "operator": "eq", "value": 670},
            {"field": "total_value", "operator": "gt", "value": 100000000}
        ]
    }))
    .unwrap();

    let predicate = compile(&tree).unwrap();
    assert_eq!(predicate(&killmail(670, 150_000_000.0)), Ok(true));
    assert_eq!(predicate(&killmail(670, 50_000_000.0)), Ok(false));
    assert_eq!(predicate(&killmail(671, 150_000_000.0)), Ok(false));
}

// ── Leaf operators ──────────────────────────────────────────────────

#[test]
fn scalar_equality_is_loose() {
    let km = killmail(670, 1.0);
    assert!(eval(&leaf("victim_ship_type_id", "eq", json!("670")), &km));
    assert!(eval(&leaf("victim_character_name", "eq", json!("victim pilot")), &km));
    assert!(eval(&leaf("victim_ship_type_id", "ne", json!(1)), &km));
    assert!(!eval(&leaf("victim_ship_type_id", "ne", json!(670)), &km));
    assert!(eval(&leaf("is_solo", "eq", json!(false)), &km));
}

#[test]
fn equality_on_list_field_matches_any_element() {
    let km = killmail(670, 1.0);
    assert!(eval(&leaf("attacker_character_id", "eq", json!(90000003)), &km));
    assert!(eval(&leaf("character_id", "eq", json!(90000001)), &km));
    assert!(!eval(&leaf("attacker_character_id", "eq", json!(90000001)), &km));
}

#[test]
fn numeric_comparisons() {
    let km = killmail(670, 100.0);
    assert!(eval(&leaf("total_value", "gte", json!(100)), &km));
    assert!(!eval(&leaf("total_value", "gt", json!(100)), &km));
    assert!(eval(&leaf("total_value", "lte", json!(100.0)), &km));
    assert!(eval(&leaf("total_value", "lt", json!("100.5")), &km));
    assert!(eval(&leaf("attacker_count", "gte", json!(2)), &km));
}

#[test]
fn numeric_comparison_on_missing_value_is_false() {
    let km = killmail(670, 100.0);
    assert!(!eval(&leaf("ship_value", "gt", json!(0)), &km));
    assert!(!eval(&leaf("ship_value", "lt", json!(0)), &km));
}

#[test]
fn killmail_time_compares_as_timestamp() {
    let km = killmail(670, 1.0);
    assert!(eval(&leaf("killmail_time", "gte", json!("2024-05-01T00:00:00Z")), &km));
    assert!(!eval(&leaf("killmail_time", "gt", json!("2024-06-01T00:00:00+00:00")), &km));
}

#[test]
fn membership_operators() {
    let km = killmail(670, 1.0);
    assert!(eval(&leaf("victim_ship_group_id", "in", json!([30, 26])), &km));
    assert!(!eval(&leaf("victim_ship_group_id", "not_in", json!([30, 26])), &km));
    assert!(eval(&leaf("victim_ship_group_id", "not_in", json!([30])), &km));
}

#[test]
fn contains_operators_treat_field_as_list() {
    let km = killmail(670, 1.0);
    assert!(eval(&leaf("module_tags", "contains_any", json!(["cyno", "bubble"])), &km));
    assert!(eval(&leaf("module_tags", "contains_all", json!(["CLOAK", "cyno"])), &km));
    assert!(!eval(&leaf("module_tags", "contains_all", json!(["cloak", "bubble"])), &km));
    assert!(eval(&leaf("module_tags", "not_contains", json!(["bubble"])), &km));
    assert!(!eval(&leaf("module_tags", "not_contains", json!(["cyno"])), &km));
    assert!(eval(&leaf("attacker_corporation_id", "contains_all", json!([98000002])), &km));
}

#[test]
fn not_in_on_missing_value_is_true() {
    let km = killmail(670, 1.0);
    assert!(eval(&leaf("victim_alliance_id", "not_in", json!([99000001])), &km));
    assert!(!eval(&leaf("victim_alliance_id", "in", json!([99000001])), &km));
}

// ── Compile errors ──────────────────────────────────────────────────

#[test]
fn list_operators_require_non_empty_list() {
    for op in ["in", "not_in", "contains_any", "contains_all", "not_contains"] {
        for bad in [json!(5), json!([]), json!("cyno"), Value::Null] {
            let err = compile(&leaf("module_tags", op, bad.clone())).err();
            assert!(
                matches!(err, Some(CompileError::ExpectedList { .. })),
                "{op} with {bad} should fail, got {err:?}"
            );
        }
        assert!(compile(&leaf("module_tags", op, json!(["cyno"]))).is_ok(), "{op}");
    }
}

#[test]
fn scalar_operators_reject_lists() {
    let err = compile(&leaf("total_value", "gt", json!([1, 2]))).err().unwrap();
    assert_eq!(
        err,
        CompileError::ExpectedScalar {
            path: "filter_tree.value".into(),
            operator: Operator::Gt,
        }
    );
}

#[test]
fn numeric_operators_require_numeric_literal() {
    let err = compile(&leaf("total_value", "gt", json!("lots"))).err().unwrap();
    assert!(matches!(err, CompileError::InvalidValue { .. }));
    assert!(compile(&leaf("total_value", "gt", json!(true))).is_err());
}

#[test]
fn unknown_names_carry_suggestions() {
    let err = compile(&leaf("victim_shiptype_id", "eq", json!(1))).err().unwrap();
    assert_eq!(err.suggestion(), Some("victim_ship_type_id"));

    let err = compile(&leaf("total_value", "gtee", json!(1))).err().unwrap();
    assert!(matches!(err, CompileError::UnknownOperator { .. }));
    assert_eq!(err.path(), "filter_tree.operator");
}

#[test]
fn compilation_is_deterministic() {
    let tree = FilterTree::or(vec![
        leaf("module_tags", "contains_any", json!(["cyno"])),
        FilterTree::and(vec![
            leaf("solar_system_id", "eq", json!(30000142)),
            leaf("total_value", "lt", json!(10)),
        ]),
    ]);
    let a = compile_filter(&tree).unwrap();
    let b = compile_filter(&tree).unwrap();
    assert_eq!(a.plan, b.plan);
    for km in [killmail(670, 1.0), killmail(1, 1e9)] {
        assert_eq!((a.predicate)(&km), (b.predicate)(&km));
    }
}

// ── Index plans ─────────────────────────────────────────────────────

fn keys(pairs: &[(Field, i64)]) -> IndexPlan {
    IndexPlan::Keys(
        pairs
            .iter()
            .map(|&(field, value)| IndexKey { field, value })
            .collect(),
    )
}

#[test]
fn equality_leaves_are_indexed() {
    let plan = index_plan(&leaf("character_id", "in", json!([1, "2"]))).unwrap();
    assert_eq!(plan, keys(&[(Field::CharacterId, 1), (Field::CharacterId, 2)]));
}

#[test]
fn non_indexable_leaves_are_full_scan() {
    for tree in [
        leaf("total_value", "eq", json!(1)),
        leaf("solar_system_id", "gt", json!(1)),
        leaf("solar_system_id", "ne", json!(1)),
        leaf("module_tags", "contains_any", json!(["cyno"])),
    ] {
        assert!(index_plan(&tree).unwrap().is_full_scan(), "{tree:?}");
    }
}

#[test]
fn and_picks_most_selective_child() {
    let tree = FilterTree::and(vec![
        leaf("victim_ship_group_id", "in", json!([30, 659, 547])),
        leaf("total_value", "gt", json!(1)),
        leaf("solar_system_id", "eq", json!(30004759)),
    ]);
    assert_eq!(index_plan(&tree).unwrap(), keys(&[(Field::SolarSystemId, 30004759)]));
}

#[test]
fn or_is_indexed_only_when_every_branch_is() {
    let indexed = FilterTree::or(vec![
        leaf("character_id", "eq", json!(1)),
        leaf("corporation_id", "eq", json!(2)),
    ]);
    assert_eq!(
        index_plan(&indexed).unwrap(),
        keys(&[(Field::CharacterId, 1), (Field::CorporationId, 2)])
    );

    let mixed = FilterTree::or(vec![
        leaf("character_id", "eq", json!(1)),
        leaf("is_solo", "eq", json!(true)),
    ]);
    assert!(index_plan(&mixed).unwrap().is_full_scan());
}

// ── Validation reports ──────────────────────────────────────────────

#[test]
fn validation_collects_every_error() {
    let tree = FilterTree::and(vec![
        leaf("victim_shiptype_id", "eq", json!(670)),
        leaf("total_value", "greater", json!(1)),
        FilterTree::or(vec![]),
        leaf("module_tags", "contains_any", json!("cyno")),
    ]);
    let report = validate_filter_tree(&tree);

    assert!(!report.valid);
    let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "filter_tree.and[0].field",
            "filter_tree.and[1].operator",
            "filter_tree.and[2]",
            "filter_tree.and[3].value",
        ]
    );
    assert_eq!(
        report.errors[0].suggestion.as_deref(),
        Some("Did you mean 'victim_ship_type_id'?")
    );
}

#[test]
fn validation_warns_on_full_scan() {
    let report = validate_filter_tree(&leaf("total_value", "gt", json!(1)));
    assert!(report.valid);
    assert!(report.errors.is_empty());
    assert_eq!(report.warnings.len(), 1);

    let report = validate_filter_tree(&leaf("character_id", "eq", json!(1)));
    assert!(report.valid);
    assert!(report.warnings.is_empty());
}
