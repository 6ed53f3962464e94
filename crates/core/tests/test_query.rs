//! Tests for graph queries and the call / data-flow helpers

use cpg_core::{
    build_from_file, find_callers, find_data_flow, query, CodePropertyGraph, CpgNode, EdgeType, GraphQuery, Location,
    NodeId, NodeType,
};
use tempfile::TempDir;

struct Fixture {
    graph: CodePropertyGraph,
    main: NodeId,
    helper: NodeId,
    helper_two: NodeId,
}

/// main → helper → helperTwo (call), main ⊃ value (ast_child)
fn fixture() -> Fixture {
    let mut graph = CodePropertyGraph::new();
    let add = |graph: &mut CodePropertyGraph, node_type, name: &str, line| {
        graph.add_node(CpgNode::new(node_type, Some(name.to_string()), Location::new("q.ts", line, 1)))
    };
    let main = add(&mut graph, NodeType::Function, "main", 1);
    let value = add(&mut graph, NodeType::Variable, "value", 2);
    let helper = add(&mut graph, NodeType::Function, "helper", 5);
    let helper_two = add(&mut graph, NodeType::Function, "helperTwo", 9);

    graph.add_edge(main, helper, EdgeType::Call);
    graph.add_edge(helper, helper_two, EdgeType::Call);
    graph.add_edge(main, value, EdgeType::AstChild);

    Fixture {
        graph,
        main,
        helper,
        helper_two,
    }
}

fn names(nodes: &[&CpgNode]) -> Vec<String> {
    let mut names: Vec<String> = nodes.iter().filter_map(|n| n.name()).map(String::from).collect();
    names.sort();
    names
}

// ── Filtering ──────────────────────────────────────────────────

#[test]
fn test_empty_query_returns_everything() {
    let f = fixture();
    let result = query(&f.graph, &GraphQuery::new());
    assert_eq!(result.nodes.len(), 4);
    assert_eq!(result.edges.len(), 3);
    assert!(result.paths.is_none());
}

#[test]
fn test_node_type_filter() {
    let f = fixture();
    let result = query(&f.graph, &GraphQuery::new().node_types([NodeType::Function]));
    assert_eq!(names(&result.nodes), vec!["helper", "helperTwo", "main"]);
    // Edges are filtered independently of nodes
    assert_eq!(result.edges.len(), 3);
}

#[test]
fn test_pattern_is_case_sensitive_substring() {
    let f = fixture();

    let result = query(&f.graph, &GraphQuery::new().pattern("helper"));
    assert_eq!(names(&result.nodes), vec!["helper", "helperTwo"]);

    let result = query(&f.graph, &GraphQuery::new().pattern("Helper"));
    assert!(result.nodes.is_empty());
}

#[test]
fn test_edge_type_filter() {
    let f = fixture();
    let result = query(&f.graph, &GraphQuery::new().edge_types([EdgeType::Call]));
    assert_eq!(result.edges.len(), 2);
    assert!(result.edges.iter().all(|e| e.edge_type() == EdgeType::Call));
    assert_eq!(result.nodes.len(), 4);
}

#[test]
fn test_unknown_type_names_match_nothing() {
    let f = fixture();

    let q = GraphQuery::from_type_names(Some(&["bogus"]), None);
    let result = query(&f.graph, &q);
    assert!(result.nodes.is_empty());
    assert_eq!(result.edges.len(), 3);

    let q = GraphQuery::from_type_names(None, Some(&["nope"]));
    let result = query(&f.graph, &q);
    assert!(result.edges.is_empty());
    assert_eq!(result.nodes.len(), 4);

    // One unknown name poisons the whole filter
    let q = GraphQuery::from_type_names(Some(&["variable", "bogus"]), Some(&["ast_child"]));
    let result = query(&f.graph, &q);
    assert!(result.nodes.is_empty());
    assert_eq!(result.edges.len(), 1);

    let q = GraphQuery::from_type_names(Some(&["function"]), Some(&["call", "calls"]));
    let result = query(&f.graph, &q);
    assert!(!result.nodes.is_empty());
    assert!(result.edges.is_empty());

    let q = GraphQuery::from_type_names(Some(&["variable"]), None);
    assert_eq!(names(&query(&f.graph, &q).nodes), vec!["value"]);
}

// ── Paths ──────────────────────────────────────────────────────

#[test]
fn test_bounded_paths() {
    let f = fixture();
    let q = GraphQuery::new()
        .pattern("main")
        .edge_types([EdgeType::Call])
        .max_depth(2);
    let paths = query(&f.graph, &q).paths.unwrap();

    assert_eq!(paths.len(), 3);
    assert!(paths.contains(&vec![f.main]));
    assert!(paths.contains(&vec![f.main, f.helper]));
    assert!(paths.contains(&vec![f.main, f.helper, f.helper_two]));
}

#[test]
fn test_paths_respect_depth() {
    let f = fixture();

    let q = GraphQuery::new().pattern("main").max_depth(0);
    assert_eq!(query(&f.graph, &q).paths.unwrap(), vec![vec![f.main]]);

    let q = GraphQuery::new()
        .pattern("main")
        .edge_types([EdgeType::Call])
        .max_depth(1);
    let paths = query(&f.graph, &q).paths.unwrap();
    assert!(paths.iter().all(|p| p.len() <= 2));
    assert_eq!(paths.len(), 2);
}

#[test]
fn test_paths_never_repeat_nodes() {
    let mut f = fixture();
    f.graph.add_edge(f.helper_two, f.main, EdgeType::Call);

    let q = GraphQuery::new()
        .pattern("main")
        .edge_types([EdgeType::Call])
        .max_depth(10);
    let paths = query(&f.graph, &q).paths.unwrap();
    assert_eq!(paths.len(), 3);
    for path in paths {
        let mut unique = path.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), path.len());
    }
}

#[test]
fn test_path_count_is_capped() {
    let f = fixture();
    let q = GraphQuery::new().max_depth(5);
    let result = f.graph.query().with_max_paths(1).run(&q);
    assert_eq!(result.paths.unwrap().len(), 1);
}

// ── Callers and data flow ──────────────────────────────────────

#[test]
fn test_find_callers_on_fixture() {
    let f = fixture();
    assert_eq!(names(&find_callers(&f.graph, "helper")), vec!["main"]);
    assert_eq!(names(&find_callers(&f.graph, "helperTwo")), vec!["helper"]);
    assert!(find_callers(&f.graph, "main").is_empty());
    assert!(find_callers(&f.graph, "missing").is_empty());
}

#[test]
fn test_transitive_callers() {
    let f = fixture();
    let all = f.graph.query().transitive_callers("helperTwo", None);
    assert_eq!(names(&all), vec!["helper", "main"]);

    let direct = f.graph.query().transitive_callers("helperTwo", Some(1));
    assert_eq!(names(&direct), vec!["helper"]);
}

#[test]
fn test_find_data_flow_unknown_variable() {
    let f = fixture();
    assert!(find_data_flow(&f.graph, "nothing").is_empty());
    // A binding with no flow edges yields nothing either
    assert!(find_data_flow(&f.graph, "value").is_empty());
}

#[test]
fn test_find_data_flow_on_built_graph() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("flow.ts");
    std::fs::write(
        &path,
        "function f(input: number) {\n  const doubled = input * 2;\n  return doubled;\n}\n",
    )
    .unwrap();
    let graph = build_from_file(&path);

    let doubled = find_data_flow(&graph, "doubled");
    assert!(doubled.iter().any(|e| e.edge_type() == EdgeType::Defines));
    assert!(doubled.iter().any(|e| e.edge_type() == EdgeType::Uses));
    assert!(doubled.iter().any(|e| e.edge_type() == EdgeType::DataFlow));
    assert!(doubled.iter().all(|e| e.edge_type().is_data_flow()));

    // Parameters are tracked like variables
    let input = find_data_flow(&graph, "input");
    assert!(input.iter().any(|e| e.edge_type() == EdgeType::Uses));
    assert!(input.iter().any(|e| e.edge_type() == EdgeType::DataFlow));
}
