//! Source parsing: TypeScript/JavaScript text → tree-sitter syntax tree
//!
//! The parser is the only stage that touches source text. It never fails on
//! malformed input: tree-sitter recovers with `ERROR`/`MISSING` nodes, which are
//! reported as [`Diagnostic`]s next to the partial tree.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

/// Error types for parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    #[error("Failed to parse {}: {} diagnostic(s)", .path.display(), .diagnostics.len())]
    Unparsable {
        path: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },
}

/// A syntax problem found while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Grammar flavour selected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    Tsx,
}

impl Dialect {
    /// `.tsx`/`.jsx` use the TSX grammar; everything else the TypeScript one
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") | Some("jsx") => Self::Tsx,
            _ => Self::TypeScript,
        }
    }

    fn language(self) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// A parsed file: the (possibly partial) tree plus the text it indexes into
pub struct SyntaxTree {
    tree: Tree,
    source: String,
    diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Stateless TypeScript parser front-end.
///
/// A fresh tree-sitter [`Parser`] is created per call so one `SourceParser`
/// can be shared across rayon workers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceParser;

impl SourceParser {
    pub fn new() -> Self {
        Self
    }

    /// File extensions handled by the parser
    pub fn file_extensions(&self) -> &[&str] {
        &[".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs"]
    }

    /// Read and parse a file
    pub fn parse_file(&self, path: &Path) -> Result<SyntaxTree, ParseError> {
        let source = std::fs::read_to_string(path)?;
        self.parse_source(source, path)
    }

    /// Parse source text that belongs to `path`
    pub fn parse_source(&self, source: String, path: &Path) -> Result<SyntaxTree, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&Dialect::from_path(path).language())
            .map_err(|e| ParseError::TreeSitter(e.to_string()))?;

        let tree = parser.parse(&source, None).ok_or_else(|| ParseError::Unparsable {
            path: path.to_path_buf(),
            diagnostics: vec![Diagnostic {
                line: 1,
                column: 1,
                message: "parser produced no tree".to_string(),
            }],
        })?;

        let diagnostics = collect_diagnostics(&tree);
        Ok(SyntaxTree {
            tree,
            source,
            diagnostics,
        })
    }
}

/// Walk only the subtrees flagged with errors and report each `ERROR`/`MISSING` node
fn collect_diagnostics(tree: &Tree) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let root = tree.root_node();
    if !root.has_error() {
        return diagnostics;
    }

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            let message = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                "unexpected syntax".to_string()
            };
            diagnostics.push(Diagnostic {
                line: pos.row as u32 + 1,
                column: pos.column as u32 + 1,
                message,
            });
        }

        let mut cursor = node.walk();
        let mut children: Vec<Node> = node
            .children(&mut cursor)
            .filter(|child| child.has_error() || child.is_missing())
            .collect();
        children.reverse();
        stack.extend(children);
    }

    diagnostics
}
