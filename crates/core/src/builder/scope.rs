//! Lexical scopes for name-based resolution of variables and functions

use crate::graph::NodeId;
use std::collections::HashMap;

pub(crate) type ScopeId = usize;

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    /// Function and module scopes receive hoisted `var` declarations
    hoist: bool,
    vars: HashMap<String, NodeId>,
    functions: HashMap<String, NodeId>,
}

/// Arena of scopes; scope 0 is the module scope
#[derive(Debug)]
pub(crate) struct ScopeTable {
    scopes: Vec<Scope>,
}

impl ScopeTable {
    pub const MODULE: ScopeId = 0;

    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                hoist: true,
                vars: HashMap::new(),
                functions: HashMap::new(),
            }],
        }
    }

    pub fn push(&mut self, parent: ScopeId, hoist: bool) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(parent),
            hoist,
            vars: HashMap::new(),
            functions: HashMap::new(),
        });
        self.scopes.len() - 1
    }

    /// Nearest enclosing function (or module) scope
    pub fn hoist_target(&self, mut scope: ScopeId) -> ScopeId {
        while !self.scopes[scope].hoist {
            match self.scopes[scope].parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
    }

    /// The first declaration of a name in a scope wins
    pub fn declare_var(&mut self, scope: ScopeId, name: &str, node: NodeId) {
        self.scopes[scope].vars.entry(name.to_string()).or_insert(node);
    }

    pub fn declare_function(&mut self, scope: ScopeId, name: &str, node: NodeId) {
        self.scopes[scope].functions.entry(name.to_string()).or_insert(node);
    }

    pub fn resolve_var(&self, scope: ScopeId, name: &str) -> Option<NodeId> {
        self.lookup(scope, |s| s.vars.get(name).copied())
    }

    pub fn resolve_function(&self, scope: ScopeId, name: &str) -> Option<NodeId> {
        self.lookup(scope, |s| s.functions.get(name).copied())
    }

    fn lookup(&self, mut scope: ScopeId, find: impl Fn(&Scope) -> Option<NodeId>) -> Option<NodeId> {
        loop {
            let current = &self.scopes[scope];
            if let Some(found) = find(current) {
                return Some(found);
            }
            scope = current.parent?;
        }
    }
}
