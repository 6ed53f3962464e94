//! Node types for the code property graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Extensible per-node / per-edge property bag
pub type Properties = BTreeMap<String, PropertyValue>;

/// A node in the code property graph: one syntactic or semantic unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpgNode {
    /// Positional identifier, unique within a graph
    id: String,

    /// The kind of unit this node represents
    node_type: NodeType,

    /// Present for named entities (functions, classes, variables, parameters)
    name: Option<String>,

    /// Position of the node's first token
    location: Location,

    properties: Properties,
}

impl CpgNode {
    pub fn new(node_type: NodeType, name: Option<String>, location: Location) -> Self {
        let id = format!("{}:{}:{}:{}", location.file.display(), node_type, location.line, location.column);
        Self {
            id,
            node_type,
            name,
            location,
            properties: Properties::new(),
        }
    }

    /// Replace the default positional id (file, type, line, column).
    ///
    /// The extractor uses byte ranges so that nested nodes starting at the
    /// same token (e.g. `f()()`) stay distinct.
    pub fn with_id(mut self, id: String) -> Self {
        self.id = id;
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn file_path(&self) -> &Path {
        &self.location.file
    }

    pub fn line(&self) -> u32 {
        self.location.line
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Shorthand for boolean flags such as `isAsync`; absent keys read as false
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.properties.get(key), Some(PropertyValue::Bool(true)))
    }
}

/// Source position of a node's first token (1-based line and column)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// The kind of unit a node represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A function declaration, function expression, arrow function or method
    Function,
    /// A class declaration or class expression (enums are modelled as classes)
    Class,
    /// A declared variable name (`const`/`let`/`var`, class field, catch binding)
    Variable,
    /// A formal parameter
    Parameter,
    /// A call or `new` expression
    Call,
    /// A statement that participates in control or data flow
    Statement,
    /// An expression site that defines a value (assignments, updates)
    Expression,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Function,
        NodeType::Class,
        NodeType::Variable,
        NodeType::Parameter,
        NodeType::Call,
        NodeType::Statement,
        NodeType::Expression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Variable => "variable",
            Self::Parameter => "parameter",
            Self::Call => "call",
            Self::Statement => "statement",
            Self::Expression => "expression",
        }
    }

    /// Variables and parameters both carry values that data flow tracks
    pub fn is_binding(&self) -> bool {
        matches!(self, Self::Variable | Self::Parameter)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownType(s.to_string()))
    }
}

/// A node or edge type name that is not part of the graph schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown graph type: {0}")]
pub struct UnknownType(pub String);

/// A property value: only a handful of shapes are ever stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
