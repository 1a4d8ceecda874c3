use std::collections::BTreeSet;

use crate::plugin_system::dependency::{
    DependencyError, DependencyGraph, DependencyPolicy, MissingDependency,
};

fn graph(nodes: &[(&str, &[&str])]) -> DependencyGraph {
    DependencyGraph::new(
        nodes
            .iter()
            .map(|(name, deps)| (name.to_string(), deps.iter().map(|d| d.to_string()))),
    )
}

fn position(order: &[String], name: &str) -> usize {
    order
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("'{}' missing from {:?}", name, order))
}

#[test]
fn test_dependencies_come_first() {
    let g = graph(&[("app", &["db", "log"]), ("db", &["log"]), ("log", &[])]);
    let plan = g.resolve(["app"], |_| false);

    assert_eq!(plan.order, vec!["log", "db", "app"]);
    assert!(plan.missing.is_empty());
    assert!(plan.cycles.is_empty());
}

#[test]
fn test_every_plugin_appears_once() {
    let g = graph(&[("a", &["c"]), ("b", &["c"]), ("c", &[]), ("d", &[])]);
    let plan = g.resolve(["a", "b", "c", "d"], |_| false);

    assert_eq!(plan.order.len(), 4);
    let unique: BTreeSet<&String> = plan.order.iter().collect();
    assert_eq!(unique.len(), 4);
    assert!(position(&plan.order, "c") < position(&plan.order, "a"));
    assert!(position(&plan.order, "c") < position(&plan.order, "b"));
}

#[test]
fn test_missing_dependency_is_reported_not_fatal() {
    let g = graph(&[("a", &["b"]), ("b", &[]), ("c", &["z"])]);
    let plan = g.resolve(["a", "b", "c"], |_| false);

    assert!(position(&plan.order, "b") < position(&plan.order, "a"));
    assert!(plan.order.contains(&"c".to_string()));
    assert!(!plan.order.contains(&"z".to_string()));
    assert_eq!(
        plan.missing,
        vec![MissingDependency {
            plugin: "c".to_string(),
            dependency: "z".to_string(),
        }]
    );
}

#[test]
fn test_two_node_cycle() {
    let g = graph(&[("a", &["b"]), ("b", &["a"])]);
    let plan = g.resolve(["a", "b"], |_| false);

    assert!(plan.order.is_empty());
    assert_eq!(plan.cycles, vec![vec!["a", "b", "a"]]);
    assert!(plan.in_cycle("a"));
    assert!(plan.in_cycle("b"));
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let g = graph(&[("loop", &["loop"]), ("other", &[])]);
    let plan = g.resolve(["loop", "other"], |_| false);

    assert_eq!(plan.order, vec!["other"]);
    assert_eq!(plan.cycles, vec![vec!["loop", "loop"]]);
}

#[test]
fn test_dependent_of_cycle_is_still_ordered() {
    // top -> a <-> b, a -> base
    let g = graph(&[("top", &["a"]), ("a", &["b", "base"]), ("b", &["a"]), ("base", &[])]);
    let plan = g.resolve(["top"], |_| false);

    assert_eq!(plan.order, vec!["base", "top"]);
    assert_eq!(plan.cycles.len(), 1);
    assert!(plan.in_cycle("a") && plan.in_cycle("b"));
    assert!(!plan.in_cycle("top"));
    assert!(!plan.in_cycle("base"));
}

#[test]
fn test_cycle_through_finished_node_is_found() {
    // The edge closing the cycle starts at the deepest node
    let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a", "leaf"]), ("leaf", &[])]);
    let plan = g.resolve(["a"], |_| false);

    assert_eq!(plan.order, vec!["leaf"]);
    assert_eq!(plan.cycles, vec![vec!["a", "b", "c", "a"]]);
}

#[test]
fn test_settled_nodes_are_skipped() {
    let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["gone"])]);
    let plan = g.resolve(["a"], |name| name == "b");

    // "b" is settled, so "c" and its missing dependency are never reached
    assert_eq!(plan.order, vec!["a"]);
    assert!(plan.missing.is_empty());
}

#[test]
fn test_unknown_root_is_ignored() {
    let g = graph(&[("a", &[])]);
    let plan = g.resolve(["nope", "a"], |_| false);
    assert_eq!(plan.order, vec!["a"]);
}

#[test]
fn test_deep_chain_does_not_overflow() {
    let names: Vec<String> = (0..20_000).map(|i| format!("p{}", i)).collect();
    let g = DependencyGraph::new(names.iter().enumerate().map(|(i, name)| {
        let deps: Vec<String> = names.get(i + 1).cloned().into_iter().collect();
        (name.clone(), deps)
    }));
    let plan = g.resolve(["p0"], |_| false);

    assert_eq!(plan.order.len(), 20_000);
    assert_eq!(plan.order.first().map(String::as_str), Some("p19999"));
    assert_eq!(plan.order.last().map(String::as_str), Some("p0"));
}

#[test]
fn test_dependents_of() {
    let g = graph(&[("a", &["c"]), ("b", &["c"]), ("c", &[])]);
    assert_eq!(g.dependents_of("c"), vec!["a", "b"]);
    assert!(g.dependents_of("a").is_empty());
    assert!(g.dependents_of("missing").is_empty());
    assert!(g.contains("a"));
    assert_eq!(g.len(), 3);
}

#[test]
fn test_cycle_error_display() {
    let err = DependencyError::CyclicDependency(vec!["a".into(), "b".into(), "a".into()]);
    assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
}

#[test]
fn test_policy_default_and_serde() {
    assert_eq!(DependencyPolicy::default(), DependencyPolicy::BestEffort);
    let parsed: DependencyPolicy = serde_json::from_str("\"strict\"").unwrap();
    assert_eq!(parsed, DependencyPolicy::Strict);
    assert_eq!(
        serde_json::to_string(&DependencyPolicy::BestEffort).unwrap(),
        "\"best_effort\""
    );
}
