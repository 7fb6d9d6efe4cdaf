// Action Registry Integration Tests
//
// Weighted lookup, name bookkeeping, and the statistical coverage of the
// weight-offset sampling the worker loop relies on.

use std::collections::HashMap;

use sqlstorm::action::{default_registry, Action, ActionFactory, ActionRegistry, CustomSql};
use sqlstorm::config::AllConfig;
use sqlstorm::StressRng;

fn noop_factory(name: &str, weight: usize) -> ActionFactory {
    ActionFactory::new(name, weight, |_config: &AllConfig| {
        Box::new(CustomSql::new("SELECT 1;", Vec::new()).unwrap()) as Box<dyn Action>
    })
}

#[test]
fn insert_rejects_duplicate_names() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("a", 10)).unwrap();

    let err = registry.insert(noop_factory("a", 20)).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(registry.size(), 1);
}

#[test]
fn remove_fails_for_unknown_names() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("a", 10)).unwrap();

    assert!(registry.remove("b").is_err());
    registry.remove("a").unwrap();
    assert_eq!(registry.size(), 0);
    assert!(!registry.has("a"));
}

#[test]
fn lookup_returns_self_contained_factories() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("a", 10)).unwrap();

    let factory = registry.lookup("a").unwrap();
    // The registry can change or die; the looked-up factory keeps working.
    registry.remove("a").unwrap();
    drop(registry);

    assert_eq!(factory.name, "a");
    assert_eq!(factory.weight, 10);
    let _action = factory.build(&AllConfig::default());
}

#[test]
fn total_weight_sums_all_factories() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("a", 100)).unwrap();
    registry.insert(noop_factory("b", 250)).unwrap();
    registry.insert(noop_factory("c", 0)).unwrap();

    assert_eq!(registry.total_weight(), 350);
}

#[test]
fn weight_offsets_map_to_cumulative_ranges() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("a", 100)).unwrap();
    registry.insert(noop_factory("b", 100)).unwrap();
    registry.insert(noop_factory("c", 1000)).unwrap();

    assert_eq!(registry.lookup_by_weight_offset(0).unwrap().name, "a");
    assert_eq!(registry.lookup_by_weight_offset(100).unwrap().name, "a");
    assert_eq!(registry.lookup_by_weight_offset(101).unwrap().name, "b");
    assert_eq!(registry.lookup_by_weight_offset(200).unwrap().name, "b");
    assert_eq!(registry.lookup_by_weight_offset(201).unwrap().name, "c");
    assert_eq!(registry.lookup_by_weight_offset(1200).unwrap().name, "c");
    assert!(registry.lookup_by_weight_offset(1201).is_err());
}

#[test]
fn set_weight_changes_sampling() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("a", 100)).unwrap();
    registry.insert(noop_factory("b", 100)).unwrap();

    registry.set_weight("b", 300).unwrap();
    assert_eq!(registry.total_weight(), 400);
    assert_eq!(registry.lookup("b").unwrap().weight, 300);
    assert!(registry.set_weight("missing", 1).is_err());
}

#[test]
fn use_from_replaces_the_contents() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("old", 10)).unwrap();

    let other = ActionRegistry::new();
    other.insert(noop_factory("new", 20)).unwrap();

    registry.use_from(&other);

    assert_eq!(registry.size(), 1);
    assert!(registry.has("new"));
    assert!(!registry.has("old"));
}

#[test]
fn custom_sql_helpers_register_named_actions() {
    let registry = ActionRegistry::new();
    registry
        .make_custom_sql_action("checkpoint", "CHECKPOINT;", 5)
        .unwrap();
    registry
        .make_custom_table_sql_action("analyze_random", "ANALYZE {table};", 7)
        .unwrap();

    assert!(registry.has("checkpoint"));
    assert!(registry.has("analyze_random"));
    assert_eq!(registry.total_weight(), 12);
}

#[test]
fn default_registry_contains_the_standard_mix() {
    let registry = default_registry();

    for name in [
        "create_normal_table",
        "drop_table",
        "alter_table",
        "insert_some_data",
        "delete_some_data",
        "update_one_row",
    ] {
        assert!(registry.has(name), "missing {}", name);
    }
    assert!(registry.total_weight() >= 1000);
}

#[test]
fn weighted_sampling_converges_to_the_weight_ratio() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("rare", 10)).unwrap();
    registry.insert(noop_factory("common", 90)).unwrap();

    let total = registry.total_weight();
    let mut rng = StressRng::with_seed(99);
    let mut counts: HashMap<String, usize> = HashMap::new();

    let draws = 20_000;
    for _ in 0..draws {
        let offset = rng.number(0, total - 1);
        let factory = registry.lookup_by_weight_offset(offset).unwrap();
        *counts.entry(factory.name).or_default() += 1;
    }

    let rare = counts["rare"] as f64 / draws as f64;
    let common = counts["common"] as f64 / draws as f64;
    assert!((rare - 0.10).abs() < 0.02, "rare ratio was {}", rare);
    assert!((common - 0.90).abs() < 0.02, "common ratio was {}", common);
}

#[test]
fn cloned_registries_are_independent() {
    let registry = ActionRegistry::new();
    registry.insert(noop_factory("a", 10)).unwrap();

    let copy = registry.clone();
    copy.insert(noop_factory("b", 10)).unwrap();

    assert_eq!(registry.size(), 1);
    assert_eq!(copy.size(), 2);
}
