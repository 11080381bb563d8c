//! Property tests for state graph ordering.

#![allow(clippy::unwrap_used, missing_docs)]

use otter_core::{GraphError, Metadata, StateGraph, StateVariant};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn package(name: &str, require: &[String]) -> StateVariant {
    StateVariant::from_section(
        Metadata::new(name, "package", "installed"),
        json!({ "require": require }),
    )
    .unwrap()
}

/// Entry `i` may only require entries with a lower index, so the relation is
/// acyclic by construction.
fn acyclic_entries() -> impl Strategy<Value = Vec<StateVariant>> {
    (1usize..12)
        .prop_flat_map(|n| {
            let masks = proptest::collection::vec(any::<u16>(), n);
            (Just(n), masks)
        })
        .prop_map(|(n, masks)| {
            (0..n)
                .map(|i| {
                    let require: Vec<String> = (0..i)
                        .filter(|j| masks[i] & (1 << j) != 0)
                        .map(|j| format!("e{j}"))
                        .collect();
                    package(&format!("e{i}"), &require)
                })
                .collect()
        })
}

fn assert_requirements_first(graph: &StateGraph) {
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    for entry in graph.iter() {
        for requirement in entry.requirements() {
            assert!(
                placed.contains(requirement.as_str()),
                "{} placed before requirement {}",
                entry.metadata(),
                requirement
            );
        }
        placed.insert(&entry.metadata().name);
    }
}

proptest! {
    #[test]
    fn any_permutation_of_a_dag_is_accepted(
        shuffled in acyclic_entries().prop_shuffle(),
    ) {
        let expected: BTreeSet<Metadata> =
            shuffled.iter().map(|e| e.metadata().clone()).collect();
        let graph = StateGraph::from_entries(shuffled).unwrap();
        prop_assert_eq!(graph.len(), expected.len());
        let actual: BTreeSet<Metadata> = graph.iter().map(|e| e.metadata().clone()).collect();
        prop_assert_eq!(actual, expected);
        assert_requirements_first(&graph);
    }

    #[test]
    fn processed_form_reloads_to_the_same_entries(entries in acyclic_entries()) {
        let graph = StateGraph::from_entries(entries).unwrap();
        let reloaded = StateGraph::from_json(&graph.to_json().unwrap()).unwrap();
        prop_assert_eq!(reloaded.len(), graph.len());
        for entry in graph.iter() {
            prop_assert!(reloaded.contains(entry.metadata()));
        }
        assert_requirements_first(&reloaded);
    }

    #[test]
    fn rings_are_reported_as_cycles(len in 2usize..8) {
        let entries: Vec<StateVariant> = (0..len)
            .map(|i| package(&format!("r{i}"), &[format!("r{}", (i + 1) % len)]))
            .collect();
        let err = StateGraph::from_entries(entries).unwrap_err();
        match err {
            GraphError::Cycle { names } => prop_assert_eq!(names.len(), len),
            other => prop_assert!(false, "expected a cycle, got {}", other),
        }
    }

    #[test]
    fn unknown_requirement_is_missing_not_cyclic(entries in acyclic_entries()) {
        let mut entries = entries;
        entries.push(package("dangling", &["ghost".to_string()]));
        let err = StateGraph::from_entries(entries).unwrap_err();
        let is_missing = matches!(err, GraphError::MissingRequirement { .. });
        prop_assert!(is_missing);
    }
}
