//! Call-graph construction
//!
//! Resolution is name-based and deliberately approximate: no types, no import
//! resolution. Within a file, plain calls resolve through the lexical scope
//! chain and then to any free function of that name; `receiver.m()` resolves
//! to every class method named `m`; `new C()` resolves to `C`'s constructor.
//! Calls still unresolved after a directory build get a second chance
//! against functions parsed from the other files (see [`link_across_files`]).

use std::collections::HashMap;
use tracing::debug;

use super::extract::{CallFacts, Callee, ClassFacts, FileFacts, FunctionFacts};
use super::scope::ScopeTable;
use crate::graph::{CodePropertyGraph, EdgeType, NodeId, NodeType, Properties};

/// The parts of a call site that edge emission needs
struct CallSite {
    node: NodeId,
    caller: Option<NodeId>,
    consumed: bool,
    arg_count: usize,
    line: u32,
}

/// What a resolved callee offers to its call sites
struct Target<'t> {
    node: NodeId,
    params: &'t [(usize, NodeId)],
    returns: &'t [NodeId],
}

/// Resolve the calls of one file and emit call, return and argument edges.
/// Returns the number of call sites resolved.
pub(crate) fn resolve(facts: &mut FileFacts) -> usize {
    let FileFacts {
        graph,
        scopes,
        functions,
        function_index,
        classes,
        calls,
        ..
    } = facts;

    let mut resolved = 0;
    for call in calls.iter() {
        let targets = candidates(call, scopes, functions, function_index, classes);
        if let Some(node) = graph.node_mut(call.node) {
            node.set_property("resolved", !targets.is_empty());
        }
        if targets.is_empty() {
            continue;
        }
        resolved += 1;

        let site = CallSite {
            node: call.node,
            caller: call.caller,
            consumed: call.consumer.is_some(),
            arg_count: call.arg_count,
            line: call.line,
        };
        for target in targets {
            let Some(&index) = function_index.get(&target) else { continue };
            let callee = &functions[index];
            link(
                graph,
                &site,
                Target {
                    node: callee.node,
                    params: &callee.params,
                    returns: &callee.returns,
                },
            );
        }
    }
    resolved
}

fn method_named(functions: &[FunctionFacts], index: &HashMap<NodeId, usize>, method: NodeId, name: &str) -> bool {
    index
        .get(&method)
        .and_then(|&i| functions.get(i))
        .is_some_and(|f| f.name.as_deref() == Some(name))
}

fn candidates(
    call: &CallFacts,
    scopes: &ScopeTable,
    functions: &[FunctionFacts],
    index: &HashMap<NodeId, usize>,
    classes: &[ClassFacts],
) -> Vec<NodeId> {
    match &call.callee {
        Callee::Function(name) => {
            if let Some(function) = scopes.resolve_function(call.scope, name) {
                return vec![function];
            }
            functions
                .iter()
                .filter(|f| !f.is_method && f.name.as_deref() == Some(name.as_str()))
                .map(|f| f.node)
                .collect()
        }
        Callee::Method { name, .. } => classes
            .iter()
            .flat_map(|class| class.methods.iter().copied())
            .filter(|&method| method_named(functions, index, method, name))
            .collect(),
        Callee::Constructor(name) => classes
            .iter()
            .filter(|class| class.name.as_deref() == Some(name.as_str()))
            .flat_map(|class| class.methods.iter().copied())
            .filter(|&method| method_named(functions, index, method, "constructor"))
            .collect(),
        Callee::Dynamic => Vec::new(),
    }
}

/// Emit the interprocedural edges between one call site and one callee
fn link(graph: &mut CodePropertyGraph, site: &CallSite, target: Target<'_>) {
    if let Some(caller) = site.caller {
        let mut props = Properties::new();
        props.insert("line".to_string(), site.line.into());
        graph.add_edge_with(caller, target.node, EdgeType::Call, None, props);
    }

    if site.consumed {
        graph.add_edge(target.node, site.node, EdgeType::Return);
        for &ret in target.returns {
            let mut props = Properties::new();
            props.insert("via".to_string(), "return".into());
            graph.add_edge_with(ret, site.node, EdgeType::DataFlow, Some("return"), props);
        }
    }

    for &(index, param) in target.params {
        if index >= site.arg_count {
            continue;
        }
        let name = graph
            .node(param)
            .and_then(|node| node.name())
            .unwrap_or_default()
            .to_string();
        let mut props = Properties::new();
        props.insert("via".to_string(), "argument".into());
        props.insert("variable".to_string(), name.as_str().into());
        graph.add_edge_with(site.node, param, EdgeType::DataFlow, Some(&name), props);
    }
}

/// Resolve call sites left unresolved by their own file against functions
/// from every other file in the graph. Works purely on graph structure, so it
/// runs after per-file graphs have been merged. Returns the number of call
/// sites newly resolved.
pub fn link_across_files(graph: &mut CodePropertyGraph) -> usize {
    let mut free: HashMap<String, Vec<NodeId>> = HashMap::new();
    let mut methods: HashMap<String, Vec<NodeId>> = HashMap::new();
    let mut constructors: HashMap<String, Vec<NodeId>> = HashMap::new();
    let mut params: HashMap<NodeId, Vec<(usize, NodeId)>> = HashMap::new();
    let mut returns: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut pending: Vec<(String, NodeId)> = Vec::new();

    for (id, node) in graph.nodes() {
        match node.node_type() {
            NodeType::Function => {
                let Some(name) = node.name() else { continue };
                let owner = graph.parent(id).and_then(|p| graph.node(p));
                match owner {
                    Some(class) if class.node_type() == NodeType::Class => {
                        methods.entry(name.to_string()).or_default().push(id);
                        if name == "constructor" {
                            if let Some(class_name) = class.name() {
                                constructors.entry(class_name.to_string()).or_default().push(id);
                            }
                        }
                    }
                    _ if !node.flag("isMethod") => free.entry(name.to_string()).or_default().push(id),
                    _ => {}
                }
            }
            NodeType::Parameter => {
                let index = node.property("index").and_then(|v| v.as_number());
                if let (Some(function), Some(index)) = (graph.parent(id), index) {
                    params.entry(function).or_default().push((index as usize, id));
                }
            }
            NodeType::Statement if node.property("kind").and_then(|v| v.as_str()) == Some("return_statement") => {
                if let Some(function) = graph.enclosing_function(id) {
                    returns.entry(function).or_default().push(id);
                }
            }
            // An expression hanging directly off a function is an implicit return
            NodeType::Expression => {
                if let Some(function) = graph
                    .parent(id)
                    .filter(|&p| graph.node(p).is_some_and(|n| n.node_type() == NodeType::Function))
                {
                    returns.entry(function).or_default().push(id);
                }
            }
            NodeType::Call if node.property("resolved").and_then(|v| v.as_bool()) == Some(false) => {
                pending.push((node.id().to_string(), id));
            }
            _ => {}
        }
    }

    pending.sort();
    let mut linked = 0;

    for (_, call) in pending {
        let Some(node) = graph.node(call) else { continue };
        let Some(callee) = node.property("callee").and_then(|v| v.as_str()) else {
            continue;
        };
        let table = if node.flag("isConstructor") {
            &constructors
        } else if node.flag("isMethodCall") {
            &methods
        } else {
            &free
        };
        let Some(targets) = table.get(callee) else { continue };

        let site = CallSite {
            node: call,
            caller: graph.enclosing_function(call),
            consumed: node.flag("consumed"),
            arg_count: node
                .property("argCount")
                .and_then(|v| v.as_number())
                .unwrap_or_default() as usize,
            line: node.line(),
        };

        for &target in targets {
            link(
                graph,
                &site,
                Target {
                    node: target,
                    params: params.get(&target).map(Vec::as_slice).unwrap_or_default(),
                    returns: returns.get(&target).map(Vec::as_slice).unwrap_or_default(),
                },
            );
        }
        if let Some(node) = graph.node_mut(call) {
            node.set_property("resolved", true);
        }
        linked += 1;
    }

    debug!(linked, "Linked cross-file calls");
    linked
}
