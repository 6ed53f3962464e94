//! Query engine: filtering, bounded path search, caller and data-flow lookup

use super::{CodePropertyGraph, CpgEdge, CpgNode, EdgeType, NodeId, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Upper bound on the number of paths a single query collects
pub const DEFAULT_MAX_PATHS: usize = 10_000;

/// Filter and traversal parameters for [`QueryEngine::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQuery {
    /// Keep only nodes of these types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_types: Option<Vec<NodeType>>,

    /// Keep only edges of these types (also restricts path traversal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_types: Option<Vec<EdgeType>>,

    /// Case-sensitive substring the node name must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// When set, collect paths of up to `max_depth + 1` nodes from the matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl GraphQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_types(mut self, types: impl IntoIterator<Item = NodeType>) -> Self {
        self.node_types = Some(types.into_iter().collect());
        self
    }

    pub fn edge_types(mut self, types: impl IntoIterator<Item = EdgeType>) -> Self {
        self.edge_types = Some(types.into_iter().collect());
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Build a query from type names as they appear in serialized graphs.
    ///
    /// A filter holding any unknown name matches nothing, even when its other
    /// names are valid.
    pub fn from_type_names(node_types: Option<&[&str]>, edge_types: Option<&[&str]>) -> Self {
        Self {
            node_types: node_types.map(parse_all),
            edge_types: edge_types.map(parse_all),
            pattern: None,
            max_depth: None,
        }
    }

    fn accepts_node(&self, node: &CpgNode) -> bool {
        if let Some(types) = &self.node_types {
            if !types.contains(&node.node_type()) {
                return false;
            }
        }
        match &self.pattern {
            Some(pattern) => node.name().is_some_and(|name| name.contains(pattern.as_str())),
            None => true,
        }
    }

    fn accepts_edge(&self, edge: &CpgEdge) -> bool {
        match &self.edge_types {
            Some(types) => types.contains(&edge.edge_type()),
            None => true,
        }
    }
}

fn parse_all<T: std::str::FromStr>(names: &[&str]) -> Vec<T> {
    names
        .iter()
        .map(|n| n.parse())
        .collect::<Result<Vec<T>, _>>()
        .unwrap_or_default()
}

/// Output of [`QueryEngine::run`]
#[derive(Debug, Clone, Default)]
pub struct QueryResult<'g> {
    pub nodes: Vec<&'g CpgNode>,
    pub edges: Vec<&'g CpgEdge>,
    /// Present only when the query set `max_depth`
    pub paths: Option<Vec<Vec<NodeId>>>,
}

impl QueryResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// A read-only query interface over one graph
pub struct QueryEngine<'g> {
    graph: &'g CodePropertyGraph,
    max_paths: usize,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g CodePropertyGraph) -> Self {
        Self {
            graph,
            max_paths: DEFAULT_MAX_PATHS,
        }
    }

    pub fn with_max_paths(mut self, max_paths: usize) -> Self {
        self.max_paths = max_paths;
        self
    }

    /// Filter nodes and edges; optionally enumerate bounded paths
    pub fn run(&self, query: &GraphQuery) -> QueryResult<'g> {
        let matched: Vec<(NodeId, &'g CpgNode)> = self
            .graph
            .nodes()
            .filter(|(_, node)| query.accepts_node(node))
            .collect();

        let edges: Vec<&'g CpgEdge> = self
            .graph
            .edges()
            .filter(|edge| query.accepts_edge(edge))
            .collect();

        let paths = query.max_depth.map(|depth| {
            let seeds: Vec<NodeId> = matched.iter().map(|(id, _)| *id).collect();
            self.bounded_paths(&seeds, depth, query)
        });

        QueryResult {
            nodes: matched.into_iter().map(|(_, node)| node).collect(),
            edges,
            paths,
        }
    }

    /// Breadth-first enumeration of simple paths starting at `seeds` with at
    /// most `max_depth + 1` nodes. Every prefix is reported, including the
    /// single-node path of each seed.
    fn bounded_paths(&self, seeds: &[NodeId], max_depth: usize, query: &GraphQuery) -> Vec<Vec<NodeId>> {
        let mut paths = Vec::new();
        let mut queue: VecDeque<Vec<NodeId>> = seeds.iter().map(|&seed| vec![seed]).collect();

        while let Some(path) = queue.pop_front() {
            if paths.len() >= self.max_paths {
                break;
            }

            if path.len() <= max_depth {
                if let Some(&last) = path.last() {
                    let mut seen = HashSet::new();
                    for edge in self.graph.edges_from(last) {
                        if !query.accepts_edge(edge) {
                            continue;
                        }
                        let next = edge.to();
                        if path.contains(&next) || !seen.insert(next) {
                            continue;
                        }
                        if paths.len() + queue.len() >= self.max_paths {
                            break;
                        }
                        let mut extended = path.clone();
                        extended.push(next);
                        queue.push_back(extended);
                    }
                }
            }

            paths.push(path);
        }

        paths
    }

    /// Function nodes with an outgoing `call` edge to a function named `function_name`
    pub fn find_callers(&self, function_name: &str) -> Vec<&'g CpgNode> {
        let mut seen = HashSet::new();
        let mut callers = Vec::new();

        for (target, _) in self
            .graph
            .nodes_of_type(NodeType::Function)
            .filter(|(_, node)| node.name() == Some(function_name))
        {
            for edge in self.graph.edges_to(target) {
                if edge.edge_type() != EdgeType::Call || !seen.insert(edge.from()) {
                    continue;
                }
                if let Some(caller) = self.graph.node(edge.from()) {
                    callers.push(caller);
                }
            }
        }

        callers
    }

    /// Every `defines`/`uses`/`data_flow` edge touching a variable or parameter
    /// named `variable_name`, plus the `data_flow` edges tracking that variable
    pub fn find_data_flow(&self, variable_name: &str) -> Vec<&'g CpgEdge> {
        let bindings: HashSet<NodeId> = self
            .graph
            .nodes()
            .filter(|(_, node)| node.node_type().is_binding() && node.name() == Some(variable_name))
            .map(|(id, _)| id)
            .collect();

        if bindings.is_empty() {
            return Vec::new();
        }

        self.graph
            .edges()
            .filter(|edge| edge.edge_type().is_data_flow())
            .filter(|edge| {
                bindings.contains(&edge.from())
                    || bindings.contains(&edge.to())
                    || (edge.edge_type() == EdgeType::DataFlow
                        && edge.property("variable").and_then(|v| v.as_str()) == Some(variable_name))
            })
            .collect()
    }

    /// Every function that transitively calls `function_name`, up to `max_depth` hops
    pub fn transitive_callers(&self, function_name: &str, max_depth: Option<usize>) -> Vec<&'g CpgNode> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        for (id, _) in self
            .graph
            .nodes_of_type(NodeType::Function)
            .filter(|(_, node)| node.name() == Some(function_name))
        {
            visited.insert(id);
            queue.push_back((id, 0));
        }

        while let Some((current, depth)) = queue.pop_front() {
            if let Some(max) = max_depth {
                if depth >= max {
                    continue;
                }
            }

            for edge in self.graph.edges_to(current) {
                if edge.edge_type() != EdgeType::Call {
                    continue;
                }
                let caller = edge.from();
                if visited.insert(caller) {
                    if let Some(node) = self.graph.node(caller) {
                        result.push(node);
                    }
                    queue.push_back((caller, depth + 1));
                }
            }
        }

        result
    }
}
