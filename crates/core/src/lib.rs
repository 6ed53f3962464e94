//! CPG Core - Code Property Graph engine for TypeScript
//!
//! This crate builds a single graph that merges three views of a program:
//! - the AST (structural containment)
//! - the CFG (statement execution order)
//! - the PDG (definitions, uses and def-use chains)
//!
//! plus interprocedural call and return edges, and a small query engine over
//! the result. Builds are stateless: every call parses from disk.

pub mod builder;
pub mod config;
pub mod discovery;
pub mod graph;
pub mod parser;

pub use builder::{link_across_files, CpgBuilder};
pub use config::CpgConfig;
pub use discovery::discover_sources;
pub use graph::{
    CodePropertyGraph, CpgEdge, CpgNode, EdgeType, GraphMetadata, GraphQuery, GraphStats, Location, NodeId,
    NodeType, PropertyValue, QueryEngine, QueryResult,
};
pub use parser::{Diagnostic, ParseError, SourceParser, SyntaxTree};

use std::path::Path;

/// CPG Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the graph of one file with the default configuration
pub fn build_from_file(path: impl AsRef<Path>) -> CodePropertyGraph {
    CpgBuilder::new().build_from_file(path)
}

/// Build the graph of every source file under `root`.
///
/// `include_globs` defaults to all TypeScript sources; `node_modules` and
/// build-output directories are always skipped.
pub fn build_from_directory(root: impl AsRef<Path>, include_globs: Option<&[String]>) -> CodePropertyGraph {
    CpgBuilder::new().build_from_directory(root, include_globs)
}

/// Filter a graph and optionally enumerate bounded-depth paths
pub fn query<'g>(graph: &'g CodePropertyGraph, query: &GraphQuery) -> QueryResult<'g> {
    graph.query().run(query)
}

/// Function nodes that call a function named `function_name`
pub fn find_callers<'g>(graph: &'g CodePropertyGraph, function_name: &str) -> Vec<&'g CpgNode> {
    graph.query().find_callers(function_name)
}

/// Definition, use and def-use edges of a variable named `variable_name`
pub fn find_data_flow<'g>(graph: &'g CodePropertyGraph, variable_name: &str) -> Vec<&'g CpgEdge> {
    graph.query().find_data_flow(variable_name)
}

/// Union of graphs; see [`CodePropertyGraph::merge`]
pub fn merge<'a>(graphs: impl IntoIterator<Item = &'a CodePropertyGraph>) -> CodePropertyGraph {
    CodePropertyGraph::merge(graphs)
}
