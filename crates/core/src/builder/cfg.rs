//! Statement-level control flow for one flow region

use super::region::{ArmRole, BlockIdx, BlockOwner, FlowRegion, StmtIdx, StmtKind};
use crate::graph::{CodePropertyGraph, EdgeType, NodeId, Properties};

/// One control transfer out of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transfer {
    pub to: StmtIdx,
    pub label: Option<&'static str>,
}

/// Successor lists of every statement of a region, plus the entry statement
#[derive(Debug, Default)]
pub(crate) struct ControlFlow {
    pub succ: Vec<Vec<Transfer>>,
    /// Labels of the transfers that leave the region (return, fall off the end)
    pub exits: Vec<Vec<&'static str>>,
    pub entry: Option<StmtIdx>,
}

impl ControlFlow {
    /// Predecessor lists derived from the successor lists
    pub fn predecessors(&self) -> Vec<Vec<StmtIdx>> {
        let mut preds = vec![Vec::new(); self.succ.len()];
        for (from, transfers) in self.succ.iter().enumerate() {
            for transfer in transfers {
                if !preds[transfer.to].contains(&from) {
                    preds[transfer.to].push(from);
                }
            }
        }
        preds
    }
}

/// Where control goes next, before it lands on a statement
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Start of a block
    Enter(BlockIdx),
    /// Completion of a statement
    After(StmtIdx),
    /// Falling off the end of a block
    Leave(BlockIdx),
}

/// Resolved continuation: the statement reached and whether it was reached
/// by jumping back to a loop header
type Landing = Option<(StmtIdx, bool)>;

struct Resolver<'r> {
    region: &'r FlowRegion,
}

impl<'r> Resolver<'r> {
    /// Follow steps until a statement is reached; `None` means function exit
    fn resolve(&self, mut step: Step) -> Landing {
        let region = self.region;
        loop {
            step = match step {
                Step::Enter(block) => match region.blocks[block].stmts.first() {
                    Some(&first) => return Some((first, false)),
                    None => Step::Leave(block),
                },
                Step::After(stmt) => {
                    let current = &region.stmts[stmt];
                    match region.blocks[current.block].stmts.get(current.index + 1) {
                        Some(&next) => return Some((next, false)),
                        None => Step::Leave(current.block),
                    }
                }
                Step::Leave(block) => match region.blocks[block].owner {
                    BlockOwner::Root => return None,
                    BlockOwner::Arm { stmt, role } => match role {
                        ArmRole::Then | ArmRole::Else | ArmRole::Finally => Step::After(stmt),
                        ArmRole::LoopBody => return Some((stmt, true)),
                        ArmRole::TryBody | ArmRole::Catch => {
                            match region.arm(stmt, |r| r == ArmRole::Finally) {
                                Some(finally) => Step::Enter(finally),
                                None => Step::After(stmt),
                            }
                        }
                        ArmRole::Case { .. } => {
                            let arms = &region.stmts[stmt].arms;
                            let next = arms
                                .iter()
                                .position(|&b| b == block)
                                .and_then(|pos| arms.get(pos + 1));
                            match next {
                                Some(&next_case) => Step::Enter(next_case),
                                None => Step::After(stmt),
                            }
                        }
                    },
                },
            };
        }
    }

    /// Walk outward from `stmt` to the nearest enclosing statement matching `pred`
    fn enclosing(&self, stmt: StmtIdx, pred: impl Fn(StmtIdx, ArmRole) -> bool) -> Option<StmtIdx> {
        let region = self.region;
        let mut block = region.stmts[stmt].block;
        loop {
            match region.blocks[block].owner {
                BlockOwner::Root => return None,
                BlockOwner::Arm { stmt: owner, role } => {
                    if pred(owner, role) {
                        return Some(owner);
                    }
                    block = region.stmts[owner].block;
                }
            }
        }
    }

    /// Transfers to statements of the region, and labels of transfers out of it
    fn transfers(&self, stmt: StmtIdx) -> (Vec<Transfer>, Vec<&'static str>) {
        let region = self.region;
        let mut out = Vec::new();
        let mut exits = Vec::new();
        let mut push = |landing: Landing, label: Option<&'static str>| match landing {
            Some((to, back)) => out.push(Transfer {
                to,
                label: if back { Some("back") } else { label },
            }),
            None => {
                let label = label.unwrap_or("exit");
                if !exits.contains(&label) {
                    exits.push(label);
                }
            }
        };

        match region.stmts[stmt].kind {
            StmtKind::Simple => push(self.resolve(Step::After(stmt)), None),
            StmtKind::If => {
                match region.arm(stmt, |r| r == ArmRole::Then) {
                    Some(then) => push(self.resolve(Step::Enter(then)), Some("true")),
                    None => push(self.resolve(Step::After(stmt)), Some("true")),
                }
                match region.arm(stmt, |r| r == ArmRole::Else) {
                    Some(otherwise) => push(self.resolve(Step::Enter(otherwise)), Some("false")),
                    None => push(self.resolve(Step::After(stmt)), Some("false")),
                }
            }
            StmtKind::Loop => {
                if let Some(body) = region.arm(stmt, |r| r == ArmRole::LoopBody) {
                    push(self.resolve(Step::Enter(body)), Some("body"));
                }
                push(self.resolve(Step::After(stmt)), Some("exit"));
            }
            StmtKind::Switch => {
                let mut has_default = false;
                for &arm in &region.stmts[stmt].arms {
                    if let Some(ArmRole::Case { default }) = region.role(arm) {
                        has_default |= default;
                        push(self.resolve(Step::Enter(arm)), Some("case"));
                    }
                }
                if !has_default {
                    push(self.resolve(Step::After(stmt)), Some("exit"));
                }
            }
            StmtKind::Try => {
                let body = region.arm(stmt, |r| r == ArmRole::TryBody);
                match body {
                    Some(body) => push(self.resolve(Step::Enter(body)), None),
                    None => push(self.resolve(Step::After(stmt)), None),
                }
                // An empty try body can still throw before doing anything
                let body_empty = body.map_or(true, |b| region.blocks[b].stmts.is_empty());
                if body_empty {
                    if let Some(catch) = region.arm(stmt, |r| r == ArmRole::Catch) {
                        push(self.resolve(Step::Enter(catch)), Some("exception"));
                    }
                }
            }
            StmtKind::Throw => {
                let handler = self.enclosing(stmt, |owner, role| {
                    role == ArmRole::TryBody && region.arm(owner, |r| r == ArmRole::Catch).is_some()
                });
                match handler.and_then(|t| region.arm(t, |r| r == ArmRole::Catch)) {
                    Some(catch) => push(self.resolve(Step::Enter(catch)), Some("exception")),
                    None => push(None, Some("exception")),
                }
            }
            StmtKind::Break => {
                let target = self.enclosing(stmt, |owner, _| {
                    matches!(region.stmts[owner].kind, StmtKind::Loop | StmtKind::Switch)
                });
                if let Some(target) = target {
                    push(self.resolve(Step::After(target)), Some("break"));
                }
            }
            StmtKind::Continue => {
                let target = self.enclosing(stmt, |owner, role| {
                    role == ArmRole::LoopBody && region.stmts[owner].kind == StmtKind::Loop
                });
                if let Some(header) = target {
                    push(Some((header, true)), None);
                }
            }
            StmtKind::Return => push(None, Some("return")),
        }

        // The last statement of a try body may raise into the catch block
        let current = &region.stmts[stmt];
        if let BlockOwner::Arm {
            stmt: owner,
            role: ArmRole::TryBody,
        } = region.blocks[current.block].owner
        {
            if current.index + 1 == region.blocks[current.block].stmts.len() {
                if let Some(catch) = region.arm(owner, |r| r == ArmRole::Catch) {
                    push(self.resolve(Step::Enter(catch)), Some("exception"));
                }
            }
        }

        (out, exits)
    }
}

/// Compute the control flow of a region
pub(crate) fn build(region: &FlowRegion) -> ControlFlow {
    let resolver = Resolver { region };
    let (succ, exits) = (0..region.stmts.len()).map(|s| resolver.transfers(s)).unzip();
    ControlFlow {
        succ,
        exits,
        entry: resolver.resolve(Step::Enter(FlowRegion::ROOT)).map(|(s, _)| s),
    }
}

/// Emit `cfg_successor` edges with their `cfg_predecessor` converses, the
/// entry edge from the owning function to its first statement, and exit edges
/// from statements leaving the function back to the function node.
///
/// Edges are tagged with their label, so the two arms of an `if` that land on
/// the same statement stay distinct.
pub(crate) fn emit(graph: &mut CodePropertyGraph, region: &FlowRegion, flow: &ControlFlow) -> usize {
    let mut emitted = 0;
    let mut link = |graph: &mut CodePropertyGraph, from: NodeId, to: NodeId, label: Option<&str>| {
        let mut props = Properties::new();
        if let Some(label) = label {
            props.insert("label".to_string(), label.into());
        }
        graph.add_edge_with(from, to, EdgeType::CfgSuccessor, label, props.clone());
        graph.add_edge_with(to, from, EdgeType::CfgPredecessor, label, props);
        emitted += 1;
    };

    if let (Some(owner), Some(entry)) = (region.owner, flow.entry) {
        link(graph, owner, region.stmts[entry].site, Some("entry"));
    }
    // The module top level has no node to exit to
    if let Some(owner) = region.owner {
        for (from, labels) in flow.exits.iter().enumerate() {
            for &label in labels {
                link(graph, region.stmts[from].site, owner, Some(label));
            }
        }
    }
    for (from, transfers) in flow.succ.iter().enumerate() {
        for transfer in transfers {
            link(
                graph,
                region.stmts[from].site,
                region.stmts[transfer.to].site,
                transfer.label,
            );
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::NodeIndex;

    fn site(n: usize) -> NodeIndex {
        NodeIndex::new(n)
    }

    fn targets(flow: &ControlFlow, stmt: StmtIdx) -> Vec<(StmtIdx, Option<&'static str>)> {
        flow.succ[stmt].iter().map(|t| (t.to, t.label)).collect()
    }

    #[test]
    fn test_straight_line() {
        let mut region = FlowRegion::new(None);
        let a = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::Simple);
        let b = region.push_stmt(FlowRegion::ROOT, site(1), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(flow.entry, Some(a));
        assert_eq!(targets(&flow, a), vec![(b, None)]);
        assert!(flow.succ[b].is_empty());
        assert_eq!(flow.exits[b], vec!["exit"]);
        assert!(flow.exits[a].is_empty());
    }

    #[test]
    fn test_final_if_with_empty_arms_exits_on_both_branches() {
        let mut region = FlowRegion::new(None);
        let cond = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::If);
        region.add_arm(cond, ArmRole::Then);
        region.add_arm(cond, ArmRole::Else);

        let flow = build(&region);
        assert!(flow.succ[cond].is_empty());
        assert_eq!(flow.exits[cond], vec!["true", "false"]);
    }

    #[test]
    fn test_return_and_uncaught_throw_exit() {
        let mut region = FlowRegion::new(None);
        let ret = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::Return);
        let throw = region.push_stmt(FlowRegion::ROOT, site(1), StmtKind::Throw);

        let flow = build(&region);
        assert!(flow.succ[ret].is_empty());
        assert_eq!(flow.exits[ret], vec!["return"]);
        assert_eq!(flow.exits[throw], vec!["exception"]);
    }

    #[test]
    fn test_if_without_else_falls_through() {
        let mut region = FlowRegion::new(None);
        let cond = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::If);
        let then = region.add_arm(cond, ArmRole::Then);
        let inner = region.push_stmt(then, site(1), StmtKind::Simple);
        let after = region.push_stmt(FlowRegion::ROOT, site(2), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(targets(&flow, cond), vec![(inner, Some("true")), (after, Some("false"))]);
        assert_eq!(targets(&flow, inner), vec![(after, None)]);
    }

    #[test]
    fn test_loop_back_edge_and_exit() {
        let mut region = FlowRegion::new(None);
        let header = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::Loop);
        let body = region.add_arm(header, ArmRole::LoopBody);
        let first = region.push_stmt(body, site(1), StmtKind::Simple);
        let last = region.push_stmt(body, site(2), StmtKind::Simple);
        let after = region.push_stmt(FlowRegion::ROOT, site(3), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(targets(&flow, header), vec![(first, Some("body")), (after, Some("exit"))]);
        assert_eq!(targets(&flow, last), vec![(header, Some("back"))]);
    }

    #[test]
    fn test_break_and_continue() {
        let mut region = FlowRegion::new(None);
        let header = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::Loop);
        let body = region.add_arm(header, ArmRole::LoopBody);
        let cond = region.push_stmt(body, site(1), StmtKind::If);
        let then = region.add_arm(cond, ArmRole::Then);
        let brk = region.push_stmt(then, site(2), StmtKind::Break);
        let cont = region.push_stmt(body, site(3), StmtKind::Continue);
        let after = region.push_stmt(FlowRegion::ROOT, site(4), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(targets(&flow, brk), vec![(after, Some("break"))]);
        assert_eq!(targets(&flow, cont), vec![(header, Some("back"))]);
    }

    #[test]
    fn test_switch_fallthrough() {
        let mut region = FlowRegion::new(None);
        let switch = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::Switch);
        let first = region.add_arm(switch, ArmRole::Case { default: false });
        let a = region.push_stmt(first, site(1), StmtKind::Simple);
        let second = region.add_arm(switch, ArmRole::Case { default: false });
        let b = region.push_stmt(second, site(2), StmtKind::Simple);
        let after = region.push_stmt(FlowRegion::ROOT, site(3), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(
            targets(&flow, switch),
            vec![(a, Some("case")), (b, Some("case")), (after, Some("exit"))]
        );
        assert_eq!(targets(&flow, a), vec![(b, None)]);
        assert_eq!(targets(&flow, b), vec![(after, None)]);
    }

    #[test]
    fn test_try_catch_finally() {
        let mut region = FlowRegion::new(None);
        let try_stmt = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::Try);
        let body = region.add_arm(try_stmt, ArmRole::TryBody);
        let risky = region.push_stmt(body, site(1), StmtKind::Simple);
        let catch = region.add_arm(try_stmt, ArmRole::Catch);
        let handler = region.push_stmt(catch, site(2), StmtKind::Simple);
        let finally = region.add_arm(try_stmt, ArmRole::Finally);
        let cleanup = region.push_stmt(finally, site(3), StmtKind::Simple);
        let after = region.push_stmt(FlowRegion::ROOT, site(4), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(targets(&flow, try_stmt), vec![(risky, None)]);
        assert_eq!(
            targets(&flow, risky),
            vec![(cleanup, None), (handler, Some("exception"))]
        );
        assert_eq!(targets(&flow, handler), vec![(cleanup, None)]);
        assert_eq!(targets(&flow, cleanup), vec![(after, None)]);
    }

    #[test]
    fn test_throw_reaches_enclosing_catch() {
        let mut region = FlowRegion::new(None);
        let try_stmt = region.push_stmt(FlowRegion::ROOT, site(0), StmtKind::Try);
        let body = region.add_arm(try_stmt, ArmRole::TryBody);
        let loop_stmt = region.push_stmt(body, site(1), StmtKind::Loop);
        let loop_body = region.add_arm(loop_stmt, ArmRole::LoopBody);
        let throw = region.push_stmt(loop_body, site(2), StmtKind::Throw);
        let catch = region.add_arm(try_stmt, ArmRole::Catch);
        let handler = region.push_stmt(catch, site(3), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(targets(&flow, throw), vec![(handler, Some("exception"))]);
    }

    #[test]
    fn test_deep_nesting_resolves_without_recursion() {
        let mut region = FlowRegion::new(None);
        let mut block = FlowRegion::ROOT;
        let mut innermost = 0;
        for depth in 0..5_000 {
            let stmt = region.push_stmt(block, site(depth), StmtKind::If);
            block = region.add_arm(stmt, ArmRole::Then);
            innermost = stmt;
        }
        let leaf = region.push_stmt(block, site(5_000), StmtKind::Simple);

        let flow = build(&region);
        assert_eq!(targets(&flow, innermost)[0], (leaf, Some("true")));
        assert!(flow.succ[leaf].is_empty());
    }
}
