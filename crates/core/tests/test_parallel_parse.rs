//! Tests for parallel directory builds

use cpg_core::{CodePropertyGraph, CpgBuilder, CpgConfig};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

fn write_project(root: &Path, files: usize) {
    for i in 0..files {
        let next = (i + 1) % files;
        let source = format!(
            "export function f{i}(n: number): number {{\n  \
               if (n <= 0) {{ return 0; }}\n  \
               let acc = n;\n  \
               for (let k = 0; k < n; k++) {{ acc += k; }}\n  \
               return acc + f{next}(n - 1);\n\
             }}\n"
        );
        let dir = root.join(format!("mod{}", i % 4));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("f{i}.ts")), source).unwrap();
    }
}

fn build(root: &Path, parallel: bool) -> CodePropertyGraph {
    let mut config = CpgConfig::default();
    config.build.parallel = parallel;
    CpgBuilder::with_config(config).build_from_directory(root, None)
}

fn snapshot(graph: &CodePropertyGraph) -> (BTreeSet<String>, BTreeSet<String>) {
    (
        graph.nodes().map(|(_, n)| n.id().to_string()).collect(),
        graph.edges().map(|e| e.id().to_string()).collect(),
    )
}

#[test]
fn test_parallel_and_sequential_builds_agree() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), 24);

    let parallel = build(dir.path(), true);
    let sequential = build(dir.path(), false);

    assert_eq!(parallel.node_count(), sequential.node_count());
    assert_eq!(parallel.edge_count(), sequential.edge_count());
    assert_eq!(snapshot(&parallel), snapshot(&sequential));
    assert_eq!(parallel.files(), sequential.files());
}

#[test]
fn test_parallel_build_links_every_file() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), 12);

    let graph = build(dir.path(), true);
    assert_eq!(graph.files().len(), 12);

    // Each f{i} calls f{i+1} in another file, so every function has a caller
    for i in 0..12 {
        let callers = graph.query().find_callers(&format!("f{i}"));
        assert_eq!(callers.len(), 1, "f{i} should have exactly one caller");
    }
}

#[test]
fn test_parallel_build_of_empty_directory() {
    let dir = TempDir::new().unwrap();
    let graph = build(dir.path(), true);
    assert!(graph.is_empty());
    assert!(graph.files().is_empty());
}
