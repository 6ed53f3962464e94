//! Code property graph construction
//!
//! One file goes through four stages: extraction (nodes, containment, flow
//! skeletons), control flow, data flow, and call resolution. Directory builds
//! run those per file, in parallel when configured, then merge the results
//! and link calls across files.

mod calls;
mod cfg;
mod dataflow;
mod extract;
mod region;
mod scope;

pub use calls::link_across_files;

use chrono::Utc;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::CpgConfig;
use crate::discovery::discover_sources;
use crate::graph::{CodePropertyGraph, EdgeType, QueryEngine};
use crate::parser::{ParseError, SourceParser, SyntaxTree};

/// Builds code property graphs from TypeScript sources
#[derive(Debug, Clone, Default)]
pub struct CpgBuilder {
    parser: SourceParser,
    config: CpgConfig,
}

impl CpgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CpgConfig) -> Self {
        Self {
            parser: SourceParser::new(),
            config,
        }
    }

    pub fn config(&self) -> &CpgConfig {
        &self.config
    }

    /// Query engine over `graph` bounded by the configured path limit
    pub fn query<'g>(&self, graph: &'g CodePropertyGraph) -> QueryEngine<'g> {
        graph.query().with_max_paths(self.config.query.max_paths)
    }

    /// Build the graph of in-memory source attributed to `path`
    pub fn build_from_source(&self, source: &str, path: &Path) -> CodePropertyGraph {
        match self.parser.parse_source(source.to_string(), path) {
            Ok(tree) => build_tree(&tree, path),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Parse failed, returning empty graph");
                let mut graph = CodePropertyGraph::new();
                graph.add_file(path);
                graph
            }
        }
    }

    /// Build the graph of one file.
    ///
    /// Never fails: a missing or unreadable file yields an empty graph, and
    /// syntax errors yield whatever could be recovered.
    pub fn build_from_file(&self, path: impl AsRef<Path>) -> CodePropertyGraph {
        let path = path.as_ref();
        match self.parser.parse_file(path) {
            Ok(tree) => build_tree(&tree, path),
            Err(ParseError::FileRead(e)) => {
                debug!(path = %path.display(), error = %e, "Cannot read file, returning empty graph");
                CodePropertyGraph::new()
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Parse failed, returning empty graph");
                let mut graph = CodePropertyGraph::new();
                graph.add_file(path);
                graph
            }
        }
    }

    /// Build and merge the graphs of every source file under `root`.
    ///
    /// `include` overrides the configured include globs. A missing root
    /// yields an empty graph.
    pub fn build_from_directory(&self, root: impl AsRef<Path>, include: Option<&[String]>) -> CodePropertyGraph {
        let root = root.as_ref();
        let build = &self.config.build;
        let include = include.unwrap_or(&build.include);

        let files = match discover_sources(root, include, &build.exclude_dirs, build.respect_gitignore) {
            Ok(files) => files,
            Err(e) => {
                if root.exists() {
                    warn!(root = %root.display(), error = %e, "File discovery failed");
                } else {
                    debug!(root = %root.display(), "Root does not exist, returning empty graph");
                }
                return CodePropertyGraph::new();
            }
        };

        let graph = self.build_files(&files);
        info!(
            root = %root.display(),
            files = files.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built code property graph"
        );
        graph
    }

    /// Build each file independently, then merge sequentially and link calls
    /// across files
    pub fn build_files(&self, files: &[PathBuf]) -> CodePropertyGraph {
        let per_file: Vec<CodePropertyGraph> = if self.config.build.parallel {
            files.par_iter().map(|file| self.build_from_file(file)).collect()
        } else {
            files.iter().map(|file| self.build_from_file(file)).collect()
        };

        // Sequential merge
        let mut graph = CodePropertyGraph::new();
        for local in per_file {
            graph.merge_from(local);
        }
        for file in files {
            graph.add_file(file);
        }

        link_across_files(&mut graph);
        graph.set_created_at(Utc::now());
        graph
    }
}

/// Run every stage over one parsed file
fn build_tree(tree: &SyntaxTree, path: &Path) -> CodePropertyGraph {
    if tree.has_errors() {
        debug!(
            path = %path.display(),
            diagnostics = tree.diagnostics().len(),
            "Syntax errors, extracting what was recovered"
        );
    }

    let mut facts = extract::extract(tree, path);

    let flows: Vec<cfg::ControlFlow> = facts.regions.iter().map(cfg::build).collect();
    let mut cfg_edges = 0;
    for (region, flow) in facts.regions.iter().zip(&flows) {
        cfg_edges += cfg::emit(&mut facts.graph, region, flow);
    }

    let flow_edges = dataflow::build(&mut facts, &flows);
    let resolved = calls::resolve(&mut facts);

    let mut graph = facts.graph;
    graph.add_file(path);

    debug!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        cfg_edges,
        flow_edges,
        calls = graph.stats().count_edges(EdgeType::Call),
        resolved,
        "Built file graph"
    );
    graph
}
