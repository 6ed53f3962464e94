//! Edge types for the code property graph

use super::nodes::{Properties, PropertyValue, UnknownType};
use super::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An edge in the code property graph
///
/// Endpoints are arena handles issued by the owning [`super::CodePropertyGraph`],
/// so an edge can only ever point at nodes that exist in that graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpgEdge {
    id: String,
    edge_type: EdgeType,
    from: NodeId,
    to: NodeId,
    properties: Properties,
}

impl CpgEdge {
    pub(crate) fn new(id: String, edge_type: EdgeType, from: NodeId, to: NodeId, properties: Properties) -> Self {
        Self {
            id,
            edge_type,
            from,
            to,
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub(crate) fn remap(mut self, from: NodeId, to: NodeId) -> Self {
        self.from = from;
        self.to = to;
        self
    }
}

/// The kind of relationship an edge represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Structural containment (function → parameter, class → method, ...)
    AstChild,
    /// Execution may continue from the source statement to the target
    CfgSuccessor,
    /// Converse view of `CfgSuccessor`
    CfgPredecessor,
    /// A definition reaches a use (def-use chain)
    DataFlow,
    /// Caller function → resolved callee function
    Call,
    /// Callee function → call site consuming its value
    Return,
    /// Defining site → variable
    Defines,
    /// Reading site → variable
    Uses,
}

impl EdgeType {
    pub const ALL: [EdgeType; 8] = [
        EdgeType::AstChild,
        EdgeType::CfgSuccessor,
        EdgeType::CfgPredecessor,
        EdgeType::DataFlow,
        EdgeType::Call,
        EdgeType::Return,
        EdgeType::Defines,
        EdgeType::Uses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AstChild => "ast_child",
            Self::CfgSuccessor => "cfg_successor",
            Self::CfgPredecessor => "cfg_predecessor",
            Self::DataFlow => "data_flow",
            Self::Call => "call",
            Self::Return => "return",
            Self::Defines => "defines",
            Self::Uses => "uses",
        }
    }

    /// Edges that make up the program dependency view
    pub fn is_data_flow(&self) -> bool {
        matches!(self, Self::Defines | Self::Uses | Self::DataFlow)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownType(s.to_string()))
    }
}
