//! Flow regions: the statement skeleton of one function body (or module top level)
//!
//! The extractor fills a region with statements grouped into blocks; the CFG
//! and data-flow builders only ever look at regions, never at the syntax tree.

use crate::graph::NodeId;

use super::scope::ScopeId;

pub(crate) type StmtIdx = usize;
pub(crate) type BlockIdx = usize;

/// Control-relevant shape of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StmtKind {
    Simple,
    If,
    Loop,
    Switch,
    Try,
    Return,
    Throw,
    Break,
    Continue,
}

/// Which part of a compound statement a block is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArmRole {
    Then,
    Else,
    LoopBody,
    TryBody,
    Catch,
    Finally,
    Case { default: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockOwner {
    Root,
    Arm { stmt: StmtIdx, role: ArmRole },
}

#[derive(Debug)]
pub(crate) struct Block {
    pub owner: BlockOwner,
    pub stmts: Vec<StmtIdx>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessKind {
    Use,
    Def,
}

/// What an access refers to: a known binding node, or a name still to be
/// looked up in the scope table
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Binding {
    Node(NodeId),
    Name { name: String, scope: ScopeId },
}

/// One read or write of a binding, attributed to the site node where it happens
#[derive(Debug, Clone)]
pub(crate) struct Access {
    pub kind: AccessKind,
    pub target: Binding,
    pub site: NodeId,
}

impl Access {
    pub fn var(&self) -> Option<NodeId> {
        match self.target {
            Binding::Node(id) => Some(id),
            Binding::Name { .. } => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FlowStmt {
    pub site: NodeId,
    pub kind: StmtKind,
    pub block: BlockIdx,
    pub index: usize,
    /// Blocks owned by this statement, in source order
    pub arms: Vec<BlockIdx>,
    /// Reads and writes in evaluation order
    pub accesses: Vec<Access>,
}

#[derive(Debug)]
pub(crate) struct FlowRegion {
    /// Function node owning the body; `None` for the module top level
    pub owner: Option<NodeId>,
    pub blocks: Vec<Block>,
    pub stmts: Vec<FlowStmt>,
    /// Accesses evaluated before the first statement (parameter defaults)
    pub entry_accesses: Vec<Access>,
    /// Parameter nodes: definitions live at region entry
    pub params: Vec<NodeId>,
}

impl FlowRegion {
    pub const ROOT: BlockIdx = 0;

    pub fn new(owner: Option<NodeId>) -> Self {
        Self {
            owner,
            blocks: vec![Block {
                owner: BlockOwner::Root,
                stmts: Vec::new(),
            }],
            stmts: Vec::new(),
            entry_accesses: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn push_stmt(&mut self, block: BlockIdx, site: NodeId, kind: StmtKind) -> StmtIdx {
        let idx = self.stmts.len();
        let index = self.blocks[block].stmts.len();
        self.blocks[block].stmts.push(idx);
        self.stmts.push(FlowStmt {
            site,
            kind,
            block,
            index,
            arms: Vec::new(),
            accesses: Vec::new(),
        });
        idx
    }

    pub fn add_arm(&mut self, stmt: StmtIdx, role: ArmRole) -> BlockIdx {
        let idx = self.blocks.len();
        self.blocks.push(Block {
            owner: BlockOwner::Arm { stmt, role },
            stmts: Vec::new(),
        });
        self.stmts[stmt].arms.push(idx);
        idx
    }

    pub fn record(&mut self, stmt: Option<StmtIdx>, access: Access) {
        match stmt {
            Some(s) => self.stmts[s].accesses.push(access),
            None => self.entry_accesses.push(access),
        }
    }

    /// First arm of `stmt` whose role satisfies `pred`
    pub fn arm(&self, stmt: StmtIdx, pred: impl Fn(ArmRole) -> bool) -> Option<BlockIdx> {
        self.stmts[stmt]
            .arms
            .iter()
            .copied()
            .find(|&b| matches!(self.blocks[b].owner, BlockOwner::Arm { role, .. } if pred(role)))
    }

    pub fn role(&self, block: BlockIdx) -> Option<ArmRole> {
        match self.blocks[block].owner {
            BlockOwner::Root => None,
            BlockOwner::Arm { role, .. } => Some(role),
        }
    }
}
