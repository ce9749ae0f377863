//! Table-driven tests for stage registration and execution ordering.

mod common;

use std::sync::Arc;

use common::{conference_content, StubStage};
use taxonomist::pipeline::{RegistryError, StageRegistry};
use taxonomist::stages::{ATTRIBUTE_EXTRACTION, CATEGORY_DETECTION, ELEMENT_EXTRACTION};
use taxonomist::{default_registry, SchemaFactory};

/// A stage graph given as `(name, dependencies)` in registration order.
type Graph = &'static [(&'static str, &'static [&'static str])];

/// Represents a single ordering test case.
struct OrderTestCase {
    name: &'static str,
    graph: Graph,
    requested: Option<&'static [&'static str]>,
    /// Exact order expected, or the error substring when resolution fails.
    expected: Result<&'static [&'static str], &'static str>,
}

const ORDER_TESTS: &[OrderTestCase] = &[
    OrderTestCase {
        name: "empty_registry",
        graph: &[],
        requested: None,
        expected: Ok(&[]),
    },
    OrderTestCase {
        name: "linear_chain",
        graph: &[("a", &[]), ("b", &["a"]), ("c", &["b"])],
        requested: None,
        expected: Ok(&["a", "b", "c"]),
    },
    OrderTestCase {
        name: "registered_out_of_order",
        graph: &[("c", &["b"]), ("b", &["a"]), ("a", &[])],
        requested: None,
        expected: Ok(&["a", "b", "c"]),
    },
    OrderTestCase {
        name: "diamond_ties_follow_registration",
        graph: &[
            ("root", &[]),
            ("right", &["root"]),
            ("left", &["root"]),
            ("join", &["left", "right"]),
        ],
        requested: None,
        expected: Ok(&["root", "right", "left", "join"]),
    },
    OrderTestCase {
        name: "independent_roots",
        graph: &[("z", &[]), ("y", &[]), ("x", &["y"])],
        requested: None,
        expected: Ok(&["z", "y", "x"]),
    },
    OrderTestCase {
        name: "subset_pulls_in_dependencies",
        graph: &[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &["a"])],
        requested: Some(&["c"]),
        expected: Ok(&["a", "b", "c"]),
    },
    OrderTestCase {
        name: "subset_of_root_only",
        graph: &[("a", &[]), ("b", &["a"])],
        requested: Some(&["a"]),
        expected: Ok(&["a"]),
    },
    OrderTestCase {
        name: "subset_with_redundant_names",
        graph: &[("a", &[]), ("b", &["a"]), ("c", &["b"])],
        requested: Some(&["c", "a", "b"]),
        expected: Ok(&["a", "b", "c"]),
    },
    OrderTestCase {
        name: "two_stage_cycle",
        graph: &[("b", &["a"]), ("a", &["b"])],
        requested: None,
        expected: Err("Circular dependency detected among stages: a, b"),
    },
    OrderTestCase {
        name: "self_cycle",
        graph: &[("loop", &["loop"])],
        requested: None,
        expected: Err("Circular dependency detected among stages: loop"),
    },
    OrderTestCase {
        name: "cycle_outside_subset_is_ignored",
        graph: &[("a", &[]), ("x", &["y"]), ("y", &["x"])],
        requested: Some(&["a"]),
        expected: Ok(&["a"]),
    },
    OrderTestCase {
        name: "missing_dependency",
        graph: &[("a", &[]), ("b", &["ghost"])],
        requested: None,
        expected: Err("Stage 'b' depends on 'ghost', but 'ghost' is not registered"),
    },
    OrderTestCase {
        name: "unknown_requested_stage",
        graph: &[("a", &[]), ("b", &["a"])],
        requested: Some(&["summary"]),
        expected: Err("Unknown stage 'summary'. Available stages: a, b"),
    },
];

fn registry_from(graph: Graph) -> StageRegistry {
    let mut registry = StageRegistry::new();
    for (name, deps) in graph {
        registry
            .register(StubStage::new(name).depends_on(deps).build())
            .expect("Failed to register stub stage");
    }
    registry
}

#[test]
fn test_resolve_order() {
    for test_case in ORDER_TESTS {
        let registry = registry_from(test_case.graph);
        let requested: Option<Vec<String>> = test_case
            .requested
            .map(|names| names.iter().map(|n| n.to_string()).collect());

        let result = registry.resolve_order(requested.as_deref());

        match test_case.expected {
            Ok(expected) => {
                let order = result.unwrap_or_else(|e| {
                    panic!("Test '{}': Expected success but got error: {}", test_case.name, e)
                });
                assert_eq!(order, expected, "Test '{}': wrong order", test_case.name);
            }
            Err(expected_error) => {
                let error_msg = match result {
                    Ok(order) => panic!(
                        "Test '{}': Expected error but got order {:?}",
                        test_case.name, order
                    ),
                    Err(e) => e.to_string(),
                };
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

/// Every successful order places each stage after all of its dependencies.
#[test]
fn test_orders_respect_dependencies() {
    for test_case in ORDER_TESTS.iter().filter(|t| t.expected.is_ok()) {
        let registry = registry_from(test_case.graph);
        let order = registry.resolve_order(None);
        let Ok(order) = order else { continue };

        for (name, deps) in test_case.graph {
            let pos = order.iter().position(|n| n == name).unwrap();
            for dep in *deps {
                let dep_pos = order.iter().position(|n| n == dep).unwrap();
                assert!(
                    dep_pos < pos,
                    "Test '{}': '{}' ran before its dependency '{}'",
                    test_case.name,
                    name,
                    dep
                );
            }
        }
    }
}

#[test]
fn test_cycle_error_lists_stages() {
    let registry = registry_from(&[("extract", &["detect"]), ("detect", &["extract"])]);
    let err = registry.resolve_order(None).unwrap_err();
    assert_eq!(
        err,
        RegistryError::Cycle {
            stages: vec!["detect".to_string(), "extract".to_string()]
        }
    );
}

#[test]
fn test_duplicate_registration_keeps_original() {
    let mut registry = registry_from(&[("a", &[]), ("b", &["a"])]);

    let err = registry
        .register(StubStage::new("b").depends_on(&["zzz"]).build())
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateStage("b".to_string()));

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("b").unwrap().dependencies(), vec!["a"]);
    assert_eq!(registry.resolve_order(None).unwrap(), vec!["a", "b"]);
}

#[test]
fn test_get_unknown_stage() {
    let registry = registry_from(&[("a", &[])]);
    let err = registry.get("b").err().unwrap();
    assert!(matches!(err, RegistryError::UnknownStage { ref name, .. } if name == "b"));
}

#[test]
fn test_validate_reports_graph_problems() {
    let cases: &[(&str, Graph, &[&str])] = &[
        ("clean_chain", &[("a", &[]), ("b", &["a"])], &[]),
        (
            "multiple_roots",
            &[("a", &[]), ("b", &[])],
            &["Multiple root stages: a, b"],
        ),
        (
            "no_root",
            &[("a", &["b"]), ("b", &["a"])],
            &["No root stage", "Circular dependency"],
        ),
        (
            "missing_dependency",
            &[("a", &[]), ("b", &["ghost"])],
            &["'ghost' is not registered"],
        ),
    ];

    for (name, graph, expected) in cases {
        let warnings = registry_from(graph).validate();
        assert_eq!(
            warnings.len(),
            expected.len(),
            "Case '{}': unexpected warnings {:?}",
            name,
            warnings
        );
        for (warning, fragment) in warnings.iter().zip(expected.iter()) {
            assert!(
                warning.contains(fragment),
                "Case '{}': '{}' does not mention '{}'",
                name,
                warning,
                fragment
            );
        }
    }
}

#[test]
fn test_default_registry_with_custom_stage() {
    let content = conference_content();
    let schemas = Arc::new(SchemaFactory::new(content.clone()));
    let mut registry = default_registry(content, schemas).unwrap();

    registry
        .register(
            StubStage::new("sentiment_rollup")
                .depends_on(&[ELEMENT_EXTRACTION])
                .build(),
        )
        .unwrap();

    assert_eq!(
        registry.resolve_order(None).unwrap(),
        vec![
            CATEGORY_DETECTION,
            ELEMENT_EXTRACTION,
            ATTRIBUTE_EXTRACTION,
            "sentiment_rollup"
        ]
    );
    assert_eq!(
        registry
            .resolve_order(Some(&["sentiment_rollup".to_string()]))
            .unwrap(),
        vec![CATEGORY_DETECTION, ELEMENT_EXTRACTION, "sentiment_rollup"]
    );
    assert!(registry.validate().is_empty());
}
