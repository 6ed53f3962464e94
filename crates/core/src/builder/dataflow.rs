//! Definitions, uses and def-use chains
//!
//! Reaching definitions are computed per flow region with a worklist over the
//! statement-level control flow. A definition is the pair (variable, site);
//! parameters are defined by their own node at region entry.

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::cfg::ControlFlow;
use super::extract::{CallFacts, FileFacts};
use super::region::{Access, AccessKind, FlowRegion};
use crate::graph::{CodePropertyGraph, EdgeType, NodeId, Properties};

/// (variable, defining site)
type Def = (NodeId, NodeId);
type DefSet = BTreeSet<Def>;

/// Emit `defines`, `uses` and `data_flow` edges for every region of a file.
/// Returns the number of edges written.
pub(crate) fn build(facts: &mut FileFacts, flows: &[ControlFlow]) -> usize {
    let origins = definition_sites(&facts.regions);
    let mut emitted = 0;

    for (index, (region, flow)) in facts.regions.iter().zip(flows).enumerate() {
        let entry = entry_state(region, index, &facts.var_regions, &origins);
        let states = reaching_definitions(region, flow, &entry);

        emitted += replay(&mut facts.graph, entry, &region.entry_accesses);
        for (stmt, state) in region.stmts.iter().zip(states) {
            emitted += replay(&mut facts.graph, state, &stmt.accesses);
        }
    }

    emitted + call_results(&mut facts.graph, &facts.calls)
}

/// Every site defining each variable, across all regions of the file
fn definition_sites(regions: &[FlowRegion]) -> HashMap<NodeId, Vec<NodeId>> {
    let mut origins: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for region in regions {
        for &param in &region.params {
            origins.entry(param).or_default().push(param);
        }
        for access in all_accesses(region) {
            if let (AccessKind::Def, Some(var)) = (access.kind, access.var()) {
                origins.entry(var).or_default().push(access.site);
            }
        }
    }
    origins
}

fn all_accesses(region: &FlowRegion) -> impl Iterator<Item = &Access> {
    region
        .entry_accesses
        .iter()
        .chain(region.stmts.iter().flat_map(|stmt| stmt.accesses.iter()))
}

/// Definitions live when the region starts: its parameters, plus every
/// definition of each variable captured from an enclosing region
fn entry_state(
    region: &FlowRegion,
    index: usize,
    var_regions: &HashMap<NodeId, usize>,
    origins: &HashMap<NodeId, Vec<NodeId>>,
) -> DefSet {
    let mut state: DefSet = region.params.iter().map(|&param| (param, param)).collect();

    for access in all_accesses(region) {
        let Some(var) = access.var() else { continue };
        if var_regions.get(&var).is_some_and(|&owner| owner != index) {
            for &site in origins.get(&var).into_iter().flatten() {
                state.insert((var, site));
            }
        }
    }
    state
}

fn kill_and_gen(state: &mut DefSet, var: NodeId, site: NodeId) {
    state.retain(|&(v, _)| v != var);
    state.insert((var, site));
}

fn transfer(mut state: DefSet, accesses: &[Access]) -> DefSet {
    for access in accesses {
        if let (AccessKind::Def, Some(var)) = (access.kind, access.var()) {
            kill_and_gen(&mut state, var, access.site);
        }
    }
    state
}

/// Classic forward worklist fixpoint; returns the in-state of every statement
fn reaching_definitions(region: &FlowRegion, flow: &ControlFlow, entry: &DefSet) -> Vec<DefSet> {
    let count = region.stmts.len();
    let preds = flow.predecessors();
    let start = transfer(entry.clone(), &region.entry_accesses);

    let mut ins = vec![DefSet::new(); count];
    let mut outs: Vec<Option<DefSet>> = vec![None; count];
    let mut queue: VecDeque<usize> = (0..count).collect();
    let mut queued = vec![true; count];

    while let Some(stmt) = queue.pop_front() {
        queued[stmt] = false;

        let mut input = if flow.entry == Some(stmt) {
            start.clone()
        } else {
            DefSet::new()
        };
        for &pred in &preds[stmt] {
            if let Some(out) = &outs[pred] {
                input.extend(out.iter().copied());
            }
        }

        let output = transfer(input.clone(), &region.stmts[stmt].accesses);
        ins[stmt] = input;

        if outs[stmt].as_ref() != Some(&output) {
            outs[stmt] = Some(output);
            for next in &flow.succ[stmt] {
                if !queued[next.to] {
                    queued[next.to] = true;
                    queue.push_back(next.to);
                }
            }
        }
    }

    ins
}

/// Walk accesses in evaluation order from `state`, writing edges
fn replay(graph: &mut CodePropertyGraph, mut state: DefSet, accesses: &[Access]) -> usize {
    let mut emitted = 0;
    for access in accesses {
        let Some(var) = access.var() else { continue };
        match access.kind {
            AccessKind::Use => {
                graph.add_edge(access.site, var, EdgeType::Uses);
                emitted += 1;

                let name = graph
                    .node(var)
                    .and_then(|node| node.name())
                    .unwrap_or_default()
                    .to_string();
                let reaching: Vec<NodeId> = state
                    .iter()
                    .filter(|&&(v, site)| v == var && site != access.site)
                    .map(|&(_, site)| site)
                    .collect();
                for def in reaching {
                    let mut props = Properties::new();
                    props.insert("variable".to_string(), name.as_str().into());
                    graph.add_edge_with(def, access.site, EdgeType::DataFlow, Some(&name), props);
                    emitted += 1;
                }
            }
            AccessKind::Def => {
                graph.add_edge(access.site, var, EdgeType::Defines);
                emitted += 1;
                kill_and_gen(&mut state, var, access.site);
            }
        }
    }
    emitted
}

/// A consumed call's value flows into the site that consumes it
fn call_results(graph: &mut CodePropertyGraph, calls: &[CallFacts]) -> usize {
    let mut emitted = 0;
    for call in calls {
        let Some(consumer) = call.consumer else { continue };
        if consumer == call.node {
            continue;
        }
        let mut props = Properties::new();
        props.insert("via".to_string(), "result".into());
        graph.add_edge_with(call.node, consumer, EdgeType::DataFlow, Some("result"), props);
        emitted += 1;
    }
    emitted
}
