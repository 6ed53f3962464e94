//! Code property graph data structures and operations

pub mod edges;
pub mod nodes;
pub mod query;

pub use edges::{CpgEdge, EdgeType};
pub use nodes::{CpgNode, Location, NodeType, Properties, PropertyValue, UnknownType};
pub use query::{GraphQuery, QueryEngine, QueryResult};

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Handle of a node inside one [`CodePropertyGraph`]
pub type NodeId = NodeIndex;

/// Handle of an edge inside one [`CodePropertyGraph`]
pub type EdgeId = EdgeIndex;

/// Maps handles of a merged-in graph to their handles in the target graph.
pub type MergeMap = HashMap<NodeId, NodeId>;

/// Language tag stamped on every graph built by this crate
pub const DEFAULT_LANGUAGE: &str = "typescript";

/// Graph-level metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphMetadata {
    /// Every file that contributed to the graph (sorted, deduplicated)
    pub files: Vec<PathBuf>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// The code property graph
///
/// An arena of nodes and edges (petgraph) where:
/// - nodes are syntactic/semantic units (functions, variables, statements, ...)
/// - edges are AST containment, control flow, data flow and call relations
///
/// Node and edge ids are positional strings, so adding an id that already
/// exists returns the existing handle. That makes unions of per-file graphs
/// plain map merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodePropertyGraph {
    /// The underlying directed graph
    graph: DiGraph<CpgNode, CpgEdge>,

    /// Node id → handle
    node_index: HashMap<String, NodeId>,

    /// Edge id → handle
    edge_index: HashMap<String, EdgeId>,

    metadata: GraphMetadata,
}

impl Default for CodePropertyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CodePropertyGraph {
    /// Create a new empty graph stamped with the current time
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
            metadata: GraphMetadata::default(),
        }
    }

    /// Add a node, or return the handle of the node that already has its id
    pub fn add_node(&mut self, node: CpgNode) -> NodeId {
        if let Some(&existing) = self.node_index.get(node.id()) {
            return existing;
        }

        self.add_file(node.file_path());
        let id = node.id().to_string();
        let handle = self.graph.add_node(node);
        self.node_index.insert(id, handle);
        handle
    }

    /// Add an edge without properties
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, edge_type: EdgeType) -> EdgeId {
        self.add_edge_with(from, to, edge_type, None, Properties::new())
    }

    /// Add an edge with properties.
    ///
    /// `tag` distinguishes parallel edges of the same type between the same
    /// endpoints (e.g. data flow of two different variables).
    ///
    /// # Panics
    ///
    /// Panics if `from` or `to` was not issued by this graph.
    pub fn add_edge_with(
        &mut self,
        from: NodeId,
        to: NodeId,
        edge_type: EdgeType,
        tag: Option<&str>,
        properties: Properties,
    ) -> EdgeId {
        let id = {
            let from_id = self.graph[from].id();
            let to_id = self.graph[to].id();
            match tag {
                Some(tag) => format!("{}:{}->{}#{}", edge_type, from_id, to_id, tag),
                None => format!("{}:{}->{}", edge_type, from_id, to_id),
            }
        };

        if let Some(&existing) = self.edge_index.get(&id) {
            return existing;
        }

        let edge = CpgEdge::new(id.clone(), edge_type, from, to, properties);
        let handle = self.graph.add_edge(from, to, edge);
        self.edge_index.insert(id, handle);
        handle
    }

    fn insert_edge(&mut self, edge: CpgEdge) -> EdgeId {
        if let Some(&existing) = self.edge_index.get(edge.id()) {
            return existing;
        }
        let id = edge.id().to_string();
        let handle = self.graph.add_edge(edge.from(), edge.to(), edge);
        self.edge_index.insert(id, handle);
        handle
    }

    /// Record a contributing file in the metadata (kept sorted and unique)
    pub fn add_file(&mut self, file: &Path) {
        if let Err(pos) = self.metadata.files.binary_search_by(|f| f.as_path().cmp(file)) {
            self.metadata.files.insert(pos, file.to_path_buf());
        }
    }

    /// Get a node by its handle
    pub fn node(&self, id: NodeId) -> Option<&CpgNode> {
        self.graph.node_weight(id)
    }

    /// Get a mutable reference to a node
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut CpgNode> {
        self.graph.node_weight_mut(id)
    }

    /// Look up a node handle by its string id
    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.node_index.get(id).copied()
    }

    /// Look up an edge by its string id
    pub fn edge_by_id(&self, id: &str) -> Option<&CpgEdge> {
        self.edge_index
            .get(id)
            .and_then(|&handle| self.graph.edge_weight(handle))
    }

    /// All nodes with their handles
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &CpgNode)> {
        self.graph
            .node_indices()
            .map(move |id| (id, &self.graph[id]))
    }

    /// All edges
    pub fn edges(&self) -> impl Iterator<Item = &CpgEdge> {
        self.graph.edge_weights()
    }

    /// Outgoing edges of a node
    pub fn edges_from(&self, node: NodeId) -> impl Iterator<Item = &CpgEdge> + '_ {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| edge.weight())
    }

    /// Incoming edges of a node
    pub fn edges_to(&self, node: NodeId) -> impl Iterator<Item = &CpgEdge> + '_ {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.weight())
    }

    /// Nodes of a given type
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = (NodeId, &CpgNode)> {
        self.nodes().filter(move |(_, n)| n.node_type() == node_type)
    }

    /// Structural parent (source of the incoming `ast_child` edge)
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.edges_to(node)
            .find(|e| e.edge_type() == EdgeType::AstChild)
            .map(|e| e.from())
    }

    /// Structural children in insertion order
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let mut children: Vec<(EdgeId, NodeId)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|e| e.weight().edge_type() == EdgeType::AstChild)
            .map(|e| (e.id(), e.target()))
            .collect();
        children.sort_by_key(|(edge, _)| *edge);
        children.into_iter().map(|(_, child)| child).collect()
    }

    /// Nearest enclosing function, following `ast_child` edges upward
    pub fn enclosing_function(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.parent(node);
        // Containment is a tree; the bound only guards against malformed input.
        for _ in 0..self.graph.node_count() {
            let id = current?;
            if self.graph[id].node_type() == NodeType::Function {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0 && self.graph.edge_count() == 0
    }

    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.metadata.files
    }

    pub fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.metadata.created_at = created_at;
    }

    pub fn set_language(&mut self, language: &str) {
        self.metadata.language = language.to_string();
    }

    /// Get the underlying petgraph
    pub fn inner_graph(&self) -> &DiGraph<CpgNode, CpgEdge> {
        &self.graph
    }

    /// Merge another graph into this one.
    ///
    /// Nodes and edges whose ids already exist are unified; everything else is
    /// added with fresh handles. The returned [`MergeMap`] maps handles of
    /// `other` to handles in `self`.
    pub fn merge_from(&mut self, other: CodePropertyGraph) -> MergeMap {
        let mut id_map: MergeMap = HashMap::with_capacity(other.node_count());
        let files = other.metadata.files;
        let (nodes, edges) = other.graph.into_nodes_edges();

        // 1. Re-add all nodes
        for (old_index, node) in nodes.into_iter().enumerate() {
            let new_id = self.add_node(node.weight);
            id_map.insert(NodeIndex::new(old_index), new_id);
        }

        // 2. Re-add all edges, remapping endpoints
        for edge in edges {
            let from = id_map[&edge.source()];
            let to = id_map[&edge.target()];
            self.insert_edge(edge.weight.remap(from, to));
        }

        for file in &files {
            self.add_file(file);
        }

        id_map
    }

    /// Union of several graphs into a new graph.
    ///
    /// Inputs are left untouched. `created_at` becomes the latest input
    /// timestamp; merging nothing yields an empty graph.
    pub fn merge<'a, I>(graphs: I) -> CodePropertyGraph
    where
        I: IntoIterator<Item = &'a CodePropertyGraph>,
    {
        let mut merged = CodePropertyGraph::new();
        let mut latest: Option<DateTime<Utc>> = None;
        let mut language: Option<String> = None;

        for graph in graphs {
            latest = Some(match latest {
                Some(t) => t.max(graph.metadata.created_at),
                None => graph.metadata.created_at,
            });
            language.get_or_insert_with(|| graph.metadata.language.clone());
            merged.merge_from(graph.clone());
        }

        if let Some(created_at) = latest {
            merged.metadata.created_at = created_at;
        }
        if let Some(language) = language {
            merged.metadata.language = language;
        }
        merged
    }

    /// Node and edge counts by type
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            files: self.metadata.files.len(),
            ..GraphStats::default()
        };
        for node in self.graph.node_weights() {
            *stats.nodes_by_type.entry(node.node_type()).or_default() += 1;
        }
        for edge in self.graph.edge_weights() {
            *stats.edges_by_type.entry(edge.edge_type()).or_default() += 1;
        }
        stats
    }

    /// Serialize the graph to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize a graph previously produced by [`Self::to_json`]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Get a query interface for filtering and traversal
    pub fn query(&self) -> QueryEngine<'_> {
        QueryEngine::new(self)
    }
}

/// Summary counts of a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub files: usize,
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
}

impl GraphStats {
    pub fn count_nodes(&self, node_type: NodeType) -> usize {
        self.nodes_by_type.get(&node_type).copied().unwrap_or(0)
    }

    pub fn count_edges(&self, edge_type: EdgeType) -> usize {
        self.edges_by_type.get(&edge_type).copied().unwrap_or(0)
    }
}
