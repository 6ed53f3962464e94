//! Tests for merging graphs

use chrono::{Duration, Utc};
use cpg_core::{build_from_file, merge, CodePropertyGraph};
use std::collections::HashSet;
use tempfile::TempDir;

fn build(dir: &TempDir, name: &str, source: &str) -> CodePropertyGraph {
    let path = dir.path().join(name);
    std::fs::write(&path, source).unwrap();
    build_from_file(&path)
}

fn node_ids(graph: &CodePropertyGraph) -> HashSet<String> {
    graph.nodes().map(|(_, n)| n.id().to_string()).collect()
}

fn edge_ids(graph: &CodePropertyGraph) -> HashSet<String> {
    graph.edges().map(|e| e.id().to_string()).collect()
}

#[test]
fn test_merge_of_disjoint_files_is_additive() {
    let tmp = TempDir::new().unwrap();
    let a = build(&tmp, "a.ts", "function a(x: number) { return x + 1; }");
    let b = build(&tmp, "b.ts", "function b() { const y = a(2); return y; }");

    let merged = merge([&a, &b]);

    assert_eq!(merged.node_count(), a.node_count() + b.node_count());
    assert_eq!(merged.edge_count(), a.edge_count() + b.edge_count());
    assert_eq!(merged.files().len(), 2);

    let mut expected = node_ids(&a);
    expected.extend(node_ids(&b));
    assert_eq!(node_ids(&merged), expected);
}

#[test]
fn test_merge_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let a = build(&tmp, "a.ts", "function a(x: number) { if (x) { return 1; } return 2; }");

    let merged = merge([&a, &a]);
    assert_eq!(merged.node_count(), a.node_count());
    assert_eq!(merged.edge_count(), a.edge_count());
    assert_eq!(edge_ids(&merged), edge_ids(&a));
}

#[test]
fn test_merge_keeps_endpoints_consistent() {
    let tmp = TempDir::new().unwrap();
    let a = build(&tmp, "a.ts", "function a() { return b(); }\nfunction b() { return 1; }");
    let c = build(&tmp, "c.ts", "let counter = 0;\ncounter += 1;");

    let merged = merge([&c, &a]);
    for edge in merged.edges() {
        let from = merged.node(edge.from()).unwrap();
        let to = merged.node(edge.to()).unwrap();
        // Edge ids embed their endpoint ids
        assert!(edge.id().contains(from.id()));
        assert!(edge.id().contains(to.id()));
    }
}

#[test]
fn test_merge_takes_latest_timestamp() {
    let mut older = CodePropertyGraph::new();
    let mut newer = CodePropertyGraph::new();
    let now = Utc::now();
    older.set_created_at(now - Duration::hours(2));
    newer.set_created_at(now);

    let merged = merge([&newer, &older]);
    assert_eq!(merged.metadata().created_at, now);
}

#[test]
fn test_merge_nothing_is_empty() {
    let merged = merge(std::iter::empty::<&CodePropertyGraph>());
    assert!(merged.is_empty());
    assert!(merged.files().is_empty());
    assert_eq!(merged.metadata().language, "typescript");
}

#[test]
fn test_merge_leaves_inputs_untouched() {
    let tmp = TempDir::new().unwrap();
    let a = build(&tmp, "a.ts", "const a = 1;");
    let b = build(&tmp, "b.ts", "const b = 2;");
    let (a_nodes, b_nodes) = (a.node_count(), b.node_count());

    let _ = merge([&a, &b]);
    assert_eq!(a.node_count(), a_nodes);
    assert_eq!(b.node_count(), b_nodes);
}

#[test]
fn test_merge_from_maps_every_handle() {
    let tmp = TempDir::new().unwrap();
    let a = build(&tmp, "a.ts", "function a() {}");
    let b = build(&tmp, "b.ts", "function b(p: string) { return p; }");

    let mut target = a.clone();
    let map = target.merge_from(b.clone());
    assert_eq!(map.len(), b.node_count());
    for (old, new) in map {
        assert_eq!(b.node(old).unwrap().id(), target.node(new).unwrap().id());
    }
}
