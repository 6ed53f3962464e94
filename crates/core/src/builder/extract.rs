//! Node/edge extraction from a TypeScript syntax tree
//!
//! A single pre-order pass over the tree creates every graph node together
//! with its `ast_child` containment edge, and records what the later passes
//! need: flow regions (statement skeletons with their variable accesses),
//! function and class tables, and call sites.
//!
//! The walk is driven by an explicit task stack. Nesting depth of the input
//! never turns into recursion depth.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

use super::region::{Access, AccessKind, ArmRole, Binding, BlockIdx, FlowRegion, StmtIdx, StmtKind};
use super::scope::{ScopeId, ScopeTable};
use crate::graph::{CodePropertyGraph, CpgNode, EdgeType, Location, NodeId, NodeType};
use crate::parser::SyntaxTree;

/// Statement kinds that carry neither control nor value flow
const SKIPPED_STATEMENTS: &[&str] = &[
    "import_statement",
    "interface_declaration",
    "type_alias_declaration",
    "ambient_declaration",
    "empty_statement",
    "function_signature",
    "comment",
    "hash_bang_line",
];

/// Wrappers that pass a call's value through unchanged
const TRANSPARENT_PARENTS: &[&str] = &[
    "parenthesized_expression",
    "await_expression",
    "non_null_expression",
    "as_expression",
    "satisfies_expression",
    "type_assertion",
];

/// What a call expression targets, as far as names can tell
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Callee {
    /// `foo(...)`
    Function(String),
    /// `receiver.name(...)`
    Method { receiver: String, name: String },
    /// `new Name(...)`
    Constructor(String),
    /// Anything else (`f()()`, `super(...)`, computed members)
    Dynamic,
}

impl Callee {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Function(name) | Self::Constructor(name) => Some(name.as_str()),
            Self::Method { name, .. } => Some(name.as_str()),
            Self::Dynamic => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct FunctionFacts {
    pub node: NodeId,
    pub name: Option<String>,
    /// `(position, parameter node)`; destructured parameters share a position
    pub params: Vec<(usize, NodeId)>,
    /// Return statements and implicit-return expression bodies
    pub returns: Vec<NodeId>,
    pub is_method: bool,
}

#[derive(Debug)]
pub(crate) struct ClassFacts {
    pub name: Option<String>,
    pub methods: Vec<NodeId>,
}

#[derive(Debug)]
pub(crate) struct CallFacts {
    pub node: NodeId,
    /// Enclosing function; `None` for top-level calls
    pub caller: Option<NodeId>,
    pub scope: ScopeId,
    pub callee: Callee,
    pub arg_count: usize,
    /// Site that receives the call's value, when the value is used
    pub consumer: Option<NodeId>,
    pub line: u32,
}

/// Everything the extractor learned about one file
pub(crate) struct FileFacts {
    pub graph: CodePropertyGraph,
    /// Region 0 is the module top level
    pub regions: Vec<FlowRegion>,
    pub scopes: ScopeTable,
    pub functions: Vec<FunctionFacts>,
    pub function_index: HashMap<NodeId, usize>,
    pub classes: Vec<ClassFacts>,
    pub calls: Vec<CallFacts>,
    /// Region each variable or parameter was declared in
    pub var_regions: HashMap<NodeId, usize>,
}

impl FileFacts {
    fn new() -> Self {
        Self {
            graph: CodePropertyGraph::new(),
            regions: vec![FlowRegion::new(None)],
            scopes: ScopeTable::new(),
            functions: Vec::new(),
            function_index: HashMap::new(),
            classes: Vec::new(),
            calls: Vec::new(),
            var_regions: HashMap::new(),
        }
    }
}

/// Extract nodes, containment and flow facts from a parsed file
pub(crate) fn extract(tree: &SyntaxTree, path: &Path) -> FileFacts {
    let mut extractor = Extractor {
        source: tree.source(),
        path: path.to_path_buf(),
        tasks: Vec::new(),
        facts: FileFacts::new(),
    };
    extractor.run(tree.root());
    extractor.facts
}

/// Where the walk currently is
#[derive(Debug, Clone, Copy)]
struct Ctx {
    region: usize,
    block: BlockIdx,
    scope: ScopeId,
    /// Statement that owns accesses found here
    stmt: Option<StmtIdx>,
    /// Node accesses are attributed to (nearest call, expression or statement)
    site: Option<NodeId>,
    /// Structural parent for new nodes
    parent: Option<NodeId>,
    /// Index into `FileFacts::functions`
    function: Option<usize>,
}

impl Ctx {
    fn module() -> Self {
        Self {
            region: 0,
            block: FlowRegion::ROOT,
            scope: ScopeTable::MODULE,
            stmt: None,
            site: None,
            parent: None,
            function: None,
        }
    }

    /// Context for the statements of a nested block
    fn enter(self, block: BlockIdx, parent: NodeId) -> Self {
        Self {
            block,
            stmt: None,
            site: None,
            parent: Some(parent),
            ..self
        }
    }

    fn at_site(self, site: NodeId) -> Self {
        Self {
            site: Some(site),
            parent: Some(site),
            ..self
        }
    }
}

/// Name suggested by the surrounding syntax for an anonymous function or class
#[derive(Debug, Clone, Copy)]
struct Hint<'a> {
    name: &'a str,
    /// `const f = () => ...` makes `f` callable by name
    bindable: bool,
}

#[derive(Debug, Clone, Copy)]
enum BindMode {
    Declare { kind: &'static str, site: NodeId },
    Assign { site: NodeId },
    Param { index: usize, rest: bool, optional: bool, has_default: bool },
}

enum Task<'a> {
    Stmt(Node<'a>, Ctx),
    /// Opens the header of a `for (;;)` loop once its initializer is placed
    LoopHeader(Node<'a>, Ctx),
    Expr(Node<'a>, Ctx, Option<Hint<'a>>),
    Bind(Node<'a>, Ctx, BindMode),
}

struct Param<'a> {
    pattern: Node<'a>,
    default: Option<Node<'a>>,
    rest: bool,
    optional: bool,
}

struct Extractor<'a> {
    source: &'a str,
    path: PathBuf,
    tasks: Vec<Task<'a>>,
    facts: FileFacts,
}

impl<'a> Extractor<'a> {
    fn run(&mut self, root: Node<'a>) {
        self.schedule_statements(root, Ctx::module());

        while let Some(task) = self.tasks.pop() {
            match task {
                Task::Stmt(node, ctx) => self.statement(node, ctx),
                Task::LoopHeader(node, ctx) => self.loop_header(node, ctx),
                Task::Expr(node, ctx, hint) => self.expression(node, ctx, hint),
                Task::Bind(node, ctx, mode) => self.bind(node, ctx, mode),
            }
        }

        self.resolve_names();
    }

    /// Push tasks so they run in the given order
    fn schedule(&mut self, tasks: Vec<Task<'a>>) {
        self.tasks.extend(tasks.into_iter().rev());
    }

    fn schedule_statements(&mut self, node: Node<'a>, ctx: Ctx) {
        let tasks = named_children(node)
            .into_iter()
            .map(|child| Task::Stmt(child, ctx))
            .collect();
        self.schedule(tasks);
    }

    fn text(&self, node: Node<'a>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    fn node(&self, ts: Node<'a>, node_type: NodeType, name: Option<&str>) -> CpgNode {
        let pos = ts.start_position();
        let location = Location::new(self.path.clone(), pos.row as u32 + 1, pos.column as u32 + 1);
        let id = format!(
            "{}:{}:{}-{}",
            self.path.display(),
            node_type,
            ts.start_byte(),
            ts.end_byte()
        );
        CpgNode::new(node_type, name.map(str::to_string), location).with_id(id)
    }

    fn insert(&mut self, node: CpgNode, parent: Option<NodeId>) -> NodeId {
        let id = self.facts.graph.add_node(node);
        if let Some(parent) = parent {
            if parent != id {
                self.facts.graph.add_edge(parent, id, EdgeType::AstChild);
            }
        }
        id
    }

    fn record(&mut self, ctx: Ctx, kind: AccessKind, target: Binding, site: NodeId) {
        self.facts.regions[ctx.region].record(ctx.stmt, Access { kind, target, site });
    }

    /// Create a statement node and its flow statement in the current block
    fn open_stmt(&mut self, ts: Node<'a>, ctx: Ctx, kind: StmtKind) -> (Ctx, StmtIdx, NodeId) {
        let node = self.node(ts, NodeType::Statement, None).with_property("kind", ts.kind());
        let site = self.insert(node, ctx.parent);
        let stmt = self.facts.regions[ctx.region].push_stmt(ctx.block, site, kind);
        let inner = Ctx {
            stmt: Some(stmt),
            ..ctx.at_site(site)
        };
        (inner, stmt, site)
    }

    /// Create an expression site (assignment, update, implicit return)
    fn open_site(&mut self, ts: Node<'a>, ctx: Ctx) -> (Ctx, NodeId) {
        let node = self.node(ts, NodeType::Expression, None).with_property("kind", ts.kind());
        let site = self.insert(node, ctx.parent);
        (ctx.at_site(site), site)
    }

    fn arm(&mut self, ctx: Ctx, stmt: StmtIdx, role: ArmRole) -> BlockIdx {
        self.facts.regions[ctx.region].add_arm(stmt, role)
    }

    // ── statements ──────────────────────────────────────────────────

    fn statement(&mut self, node: Node<'a>, ctx: Ctx) {
        match node.kind() {
            "statement_block" => {
                let scope = self.facts.scopes.push(ctx.scope, false);
                self.schedule_statements(node, Ctx { scope, ..ctx });
            }
            "lexical_declaration" | "variable_declaration" => self.declaration(node, ctx),
            "expression_statement" => {
                let Some(expr) = first_named(node) else { return };
                if matches!(expr.kind(), "internal_module" | "module") {
                    self.namespace(expr, ctx);
                    return;
                }
                let (c, _, _) = self.open_stmt(node, ctx, StmtKind::Simple);
                self.schedule(vec![Task::Expr(expr, c, None)]);
            }
            "return_statement" | "throw_statement" => {
                let kind = if node.kind() == "return_statement" {
                    StmtKind::Return
                } else {
                    StmtKind::Throw
                };
                let (c, _, site) = self.open_stmt(node, ctx, kind);
                if let (StmtKind::Return, Some(function)) = (kind, ctx.function) {
                    self.facts.functions[function].returns.push(site);
                }
                let tasks = named_children(node)
                    .into_iter()
                    .map(|expr| Task::Expr(expr, c, None))
                    .collect();
                self.schedule(tasks);
            }
            "if_statement" => self.if_statement(node, ctx),
            "for_statement" => {
                let scope = self.facts.scopes.push(ctx.scope, false);
                let c = Ctx { scope, ..ctx };
                let mut tasks = Vec::new();
                if let Some(init) = node.child_by_field_name("initializer").filter(|n| n.is_named()) {
                    tasks.push(Task::Stmt(init, c));
                }
                tasks.push(Task::LoopHeader(node, c));
                self.schedule(tasks);
            }
            "for_in_statement" => self.for_in_statement(node, ctx),
            "while_statement" | "do_statement" => {
                let (c, stmt, site) = self.open_stmt(node, ctx, StmtKind::Loop);
                let mut tasks = Vec::new();
                if let Some(cond) = node.child_by_field_name("condition") {
                    tasks.push(Task::Expr(cond, c, None));
                }
                self.loop_body(node, ctx, stmt, site, &mut tasks);
                self.schedule(tasks);
            }
            "switch_statement" => self.switch_statement(node, ctx),
            "try_statement" => self.try_statement(node, ctx),
            "break_statement" => {
                self.open_stmt(node, ctx, StmtKind::Break);
            }
            "continue_statement" => {
                self.open_stmt(node, ctx, StmtKind::Continue);
            }
            "labeled_statement" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.schedule(vec![Task::Stmt(body, ctx)]);
                }
            }
            "export_statement" => {
                if let Some(decl) = node.child_by_field_name("declaration") {
                    self.schedule(vec![Task::Stmt(decl, ctx)]);
                } else if let Some(value) = node.child_by_field_name("value") {
                    let (c, _, _) = self.open_stmt(node, ctx, StmtKind::Simple);
                    self.schedule(vec![Task::Expr(value, c, None)]);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                self.function(node, ctx, None, false);
            }
            "class_declaration" | "abstract_class_declaration" | "enum_declaration" => {
                self.class(node, ctx, None);
            }
            "module" | "internal_module" => self.namespace(node, ctx),
            "ERROR" => self.schedule_statements(node, ctx),
            kind if SKIPPED_STATEMENTS.contains(&kind) || is_type_node(kind) => {}
            _ => {
                let (c, _, _) = self.open_stmt(node, ctx, StmtKind::Simple);
                self.schedule(vec![Task::Expr(node, c, None)]);
            }
        }
    }

    fn declaration(&mut self, node: Node<'a>, ctx: Ctx) {
        let kind = match node.child(0).map(|token| token.kind()) {
            Some("const") => "const",
            Some("let") => "let",
            _ => "var",
        };
        let (c, _, site) = self.open_stmt(node, ctx, StmtKind::Simple);

        let mut tasks = Vec::new();
        for declarator in named_children(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            if let Some(value) = declarator.child_by_field_name("value") {
                let hint = (name.kind() == "identifier").then(|| Hint {
                    name: self.text(name),
                    bindable: true,
                });
                tasks.push(Task::Expr(value, c, hint));
            }
            tasks.push(Task::Bind(name, c, BindMode::Declare { kind, site }));
        }
        self.schedule(tasks);
    }

    fn namespace(&mut self, node: Node<'a>, ctx: Ctx) {
        if let Some(body) = node.child_by_field_name("body") {
            self.schedule(vec![Task::Stmt(body, ctx)]);
        }
    }

    fn if_statement(&mut self, node: Node<'a>, ctx: Ctx) {
        let (c, stmt, site) = self.open_stmt(node, ctx, StmtKind::If);
        let mut tasks = Vec::new();

        if let Some(cond) = node.child_by_field_name("condition") {
            tasks.push(Task::Expr(cond, c, None));
        }
        if let Some(consequence) = node.child_by_field_name("consequence") {
            let arm = self.arm(ctx, stmt, ArmRole::Then);
            tasks.push(Task::Stmt(consequence, ctx.enter(arm, site)));
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            let arm = self.arm(ctx, stmt, ArmRole::Else);
            let body = if alternative.kind() == "else_clause" {
                first_named(alternative)
            } else {
                Some(alternative)
            };
            if let Some(body) = body {
                tasks.push(Task::Stmt(body, ctx.enter(arm, site)));
            }
        }
        self.schedule(tasks);
    }

    /// `for (init; cond; step)`: the initializer is already placed before this header
    fn loop_header(&mut self, node: Node<'a>, ctx: Ctx) {
        let (c, stmt, site) = self.open_stmt(node, ctx, StmtKind::Loop);
        let mut tasks = Vec::new();

        if let Some(cond) = node.child_by_field_name("condition").and_then(loop_expression) {
            tasks.push(Task::Expr(cond, c, None));
        }
        if let Some(step) = node.child_by_field_name("increment") {
            tasks.push(Task::Expr(step, c, None));
        }
        self.loop_body(node, ctx, stmt, site, &mut tasks);
        self.schedule(tasks);
    }

    fn for_in_statement(&mut self, node: Node<'a>, ctx: Ctx) {
        let scope = self.facts.scopes.push(ctx.scope, false);
        let outer = Ctx { scope, ..ctx };
        let (c, stmt, site) = self.open_stmt(node, outer, StmtKind::Loop);
        let mut tasks = Vec::new();

        if let Some(right) = node.child_by_field_name("right") {
            tasks.push(Task::Expr(right, c, None));
        }
        if let Some(left) = node.child_by_field_name("left") {
            let mode = match ["const", "let", "var"].into_iter().find(|t| has_token(node, t)) {
                Some(kind) => BindMode::Declare { kind, site },
                None => BindMode::Assign { site },
            };
            tasks.push(Task::Bind(left, c, mode));
        }
        self.loop_body(node, outer, stmt, site, &mut tasks);
        self.schedule(tasks);
    }

    fn loop_body(&mut self, node: Node<'a>, ctx: Ctx, stmt: StmtIdx, site: NodeId, tasks: &mut Vec<Task<'a>>) {
        if let Some(body) = node.child_by_field_name("body") {
            let arm = self.arm(ctx, stmt, ArmRole::LoopBody);
            tasks.push(Task::Stmt(body, ctx.enter(arm, site)));
        }
    }

    fn switch_statement(&mut self, node: Node<'a>, ctx: Ctx) {
        let (c, stmt, site) = self.open_stmt(node, ctx, StmtKind::Switch);
        let mut tasks = Vec::new();

        if let Some(value) = node.child_by_field_name("value") {
            tasks.push(Task::Expr(value, c, None));
        }

        let scope = self.facts.scopes.push(ctx.scope, false);
        let body_ctx = Ctx { scope, ..ctx };
        if let Some(body) = node.child_by_field_name("body") {
            for case in named_children(body) {
                let default = match case.kind() {
                    "switch_case" => false,
                    "switch_default" => true,
                    _ => continue,
                };
                let arm = self.arm(ctx, stmt, ArmRole::Case { default });
                if let Some(test) = case.child_by_field_name("value") {
                    tasks.push(Task::Expr(test, c, None));
                }
                let mut cursor = case.walk();
                let statements: Vec<Node<'a>> = case.children_by_field_name("body", &mut cursor).collect();
                let arm_ctx = body_ctx.enter(arm, site);
                tasks.extend(statements.into_iter().map(|s| Task::Stmt(s, arm_ctx)));
            }
        }
        self.schedule(tasks);
    }

    fn try_statement(&mut self, node: Node<'a>, ctx: Ctx) {
        let (_, stmt, site) = self.open_stmt(node, ctx, StmtKind::Try);
        let mut tasks = Vec::new();

        if let Some(body) = node.child_by_field_name("body") {
            let arm = self.arm(ctx, stmt, ArmRole::TryBody);
            tasks.push(Task::Stmt(body, ctx.enter(arm, site)));
        }

        if let Some(handler) = node.child_by_field_name("handler") {
            let arm = self.arm(ctx, stmt, ArmRole::Catch);
            let scope = self.facts.scopes.push(ctx.scope, false);
            let catch_ctx = Ctx { scope, ..ctx }.enter(arm, site);
            // The clause itself is the first statement of the catch block: it
            // defines the caught binding.
            let (clause_ctx, _, clause) = self.open_stmt(handler, catch_ctx, StmtKind::Simple);
            if let Some(param) = handler.child_by_field_name("parameter") {
                tasks.push(Task::Bind(
                    param,
                    clause_ctx,
                    BindMode::Declare {
                        kind: "catch",
                        site: clause,
                    },
                ));
            }
            if let Some(body) = handler.child_by_field_name("body") {
                tasks.push(Task::Stmt(
                    body,
                    Ctx {
                        parent: Some(clause),
                        ..catch_ctx
                    },
                ));
            }
        }

        if let Some(finalizer) = node.child_by_field_name("finalizer") {
            if let Some(body) = finalizer.child_by_field_name("body") {
                let arm = self.arm(ctx, stmt, ArmRole::Finally);
                tasks.push(Task::Stmt(body, ctx.enter(arm, site)));
            }
        }
        self.schedule(tasks);
    }

    // ── expressions ─────────────────────────────────────────────────

    fn expression(&mut self, node: Node<'a>, ctx: Ctx, hint: Option<Hint<'a>>) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier" => {
                if let Some(site) = ctx.site {
                    let target = Binding::Name {
                        name: self.text(node).to_string(),
                        scope: ctx.scope,
                    };
                    self.record(ctx, AccessKind::Use, target, site);
                }
            }
            "function_expression" | "function" | "generator_function" | "arrow_function" => {
                self.function(node, ctx, hint, false);
            }
            "method_definition" => {
                self.function(node, ctx, None, true);
            }
            "class" => {
                self.class(node, ctx, hint);
            }
            "call_expression" | "new_expression" => self.call(node, ctx),
            "assignment_expression" => {
                let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right"))
                else {
                    return self.descend(node, ctx);
                };
                let (c, site) = self.open_site(node, ctx);
                let hint = self.assignment_hint(left);
                self.schedule(vec![
                    Task::Expr(right, c, hint),
                    Task::Bind(left, c, BindMode::Assign { site }),
                ]);
            }
            "augmented_assignment_expression" => {
                let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right"))
                else {
                    return self.descend(node, ctx);
                };
                let (c, site) = self.open_site(node, ctx);
                self.schedule(vec![
                    Task::Expr(left, c, None),
                    Task::Expr(right, c, None),
                    Task::Bind(left, c, BindMode::Assign { site }),
                ]);
            }
            "update_expression" => {
                let Some(argument) = node.child_by_field_name("argument") else {
                    return self.descend(node, ctx);
                };
                let (c, site) = self.open_site(node, ctx);
                self.schedule(vec![
                    Task::Expr(argument, c, None),
                    Task::Bind(argument, c, BindMode::Assign { site }),
                ]);
            }
            "pair" => {
                let mut tasks = Vec::new();
                let key = node.child_by_field_name("key");
                let hint = match key {
                    Some(key) if key.kind() == "computed_property_name" => {
                        tasks.push(Task::Expr(key, ctx, None));
                        None
                    }
                    Some(key) => Some(Hint {
                        name: self.text(key).trim_matches(|c: char| c == '"' || c == '\''),
                        bindable: false,
                    }),
                    None => None,
                };
                if let Some(value) = node.child_by_field_name("value") {
                    tasks.push(Task::Expr(value, ctx, hint));
                }
                self.schedule(tasks);
            }
            kind if is_type_node(kind) => {}
            _ => self.descend(node, ctx),
        }
    }

    fn descend(&mut self, node: Node<'a>, ctx: Ctx) {
        let tasks = named_children(node)
            .into_iter()
            .filter(|child| !is_type_node(child.kind()))
            .map(|child| Task::Expr(child, ctx, None))
            .collect();
        self.schedule(tasks);
    }

    fn assignment_hint(&self, left: Node<'a>) -> Option<Hint<'a>> {
        let target = match left.kind() {
            "identifier" => left,
            "member_expression" => left.child_by_field_name("property")?,
            _ => return None,
        };
        Some(Hint {
            name: self.text(target),
            bindable: false,
        })
    }

    fn call(&mut self, node: Node<'a>, ctx: Ctx) {
        let is_new = node.kind() == "new_expression";
        let target = node.child_by_field_name(if is_new { "constructor" } else { "function" });
        let callee = target.map_or(Callee::Dynamic, |t| self.callee(t, is_new));
        let arguments: Vec<Node<'a>> = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        let consumed = is_consumed(node);
        let line = node.start_position().row as u32 + 1;

        let name = match (&callee, target) {
            (Callee::Dynamic, _) | (_, None) => None,
            (_, Some(t)) => Some(compact(self.text(t))),
        };
        let mut cpg = self
            .node(node, NodeType::Call, name.as_deref())
            .with_property("argCount", arguments.len())
            .with_property("isMethodCall", matches!(callee, Callee::Method { .. }))
            .with_property("isConstructor", is_new)
            .with_property("consumed", consumed)
            .with_property("resolved", false);
        if let Some(short) = callee.name() {
            cpg = cpg.with_property("callee", short);
        }
        if let Callee::Method { receiver, .. } = &callee {
            cpg = cpg.with_property("receiver", receiver.as_str());
        }
        let id = self.insert(cpg, ctx.parent);

        let caller = ctx.function.map(|f| self.facts.functions[f].node);
        self.facts.calls.push(CallFacts {
            node: id,
            caller,
            scope: ctx.scope,
            callee,
            arg_count: arguments.len(),
            consumer: if consumed { ctx.site } else { None },
            line,
        });

        let c = ctx.at_site(id);
        let mut tasks: Vec<Task<'a>> = target.into_iter().map(|t| Task::Expr(t, c, None)).collect();
        tasks.extend(arguments.into_iter().map(|arg| Task::Expr(arg, c, None)));
        self.schedule(tasks);
    }

    fn callee(&self, target: Node<'a>, is_new: bool) -> Callee {
        match target.kind() {
            "identifier" => {
                let name = self.text(target).to_string();
                if is_new {
                    Callee::Constructor(name)
                } else {
                    Callee::Function(name)
                }
            }
            "member_expression" => {
                let Some(property) = target.child_by_field_name("property") else {
                    return Callee::Dynamic;
                };
                let name = self.text(property).to_string();
                if is_new {
                    return Callee::Constructor(name);
                }
                let receiver = target
                    .child_by_field_name("object")
                    .map(|object| compact(self.text(object)))
                    .unwrap_or_default();
                Callee::Method { receiver, name }
            }
            _ => Callee::Dynamic,
        }
    }

    // ── functions and classes ───────────────────────────────────────

    /// Create a function node, its flow region and scope, and schedule its
    /// parameters and body
    fn function(&mut self, node: Node<'a>, ctx: Ctx, hint: Option<Hint<'a>>, method: bool) -> NodeId {
        let kind = node.kind();
        let own_name = node.child_by_field_name("name").map(|n| self.text(n));
        let name = own_name.or(hint.map(|h| h.name));
        let params = parameters(node);

        let mut cpg = self
            .node(node, NodeType::Function, name)
            .with_property("isAsync", has_token(node, "async"))
            .with_property("isArrow", kind == "arrow_function")
            .with_property("isGenerator", kind.starts_with("generator") || has_token(node, "*"))
            .with_property("isMethod", method)
            .with_property("paramCount", params.len());
        if method {
            cpg = cpg.with_property("isStatic", has_token(node, "static"));
        }
        let id = self.insert(cpg, ctx.parent);

        let scope = self.facts.scopes.push(ctx.scope, true);
        match (kind, own_name, hint) {
            ("function_declaration" | "generator_function_declaration", Some(name), _) => {
                self.facts.scopes.declare_function(ctx.scope, name, id);
            }
            // A named function expression sees its own name only inside its body
            (_, Some(name), _) if !method => self.facts.scopes.declare_function(scope, name, id),
            (_, None, Some(hint)) if hint.bindable && !method => {
                self.facts.scopes.declare_function(ctx.scope, hint.name, id);
            }
            _ => {}
        }

        let region = self.facts.regions.len();
        self.facts.regions.push(FlowRegion::new(Some(id)));
        let index = self.facts.functions.len();
        self.facts.functions.push(FunctionFacts {
            node: id,
            name: name.map(str::to_string),
            params: Vec::new(),
            returns: Vec::new(),
            is_method: method,
        });
        self.facts.function_index.insert(id, index);

        let inner = Ctx {
            region,
            block: FlowRegion::ROOT,
            scope,
            stmt: None,
            site: Some(id),
            parent: Some(id),
            function: Some(index),
        };

        let mut tasks = Vec::new();
        for (position, param) in params.iter().enumerate() {
            if let Some(default) = param.default {
                tasks.push(Task::Expr(default, inner, None));
            }
            tasks.push(Task::Bind(
                param.pattern,
                inner,
                BindMode::Param {
                    index: position,
                    rest: param.rest,
                    optional: param.optional,
                    has_default: param.default.is_some(),
                },
            ));
        }

        match node.child_by_field_name("body") {
            Some(body) if body.kind() == "statement_block" => {
                tasks.extend(named_children(body).into_iter().map(|s| Task::Stmt(s, inner)));
            }
            Some(body) => {
                // Expression-bodied arrow: the body is an implicit return
                let (c, site) = self.open_site(body, inner);
                let stmt = self.facts.regions[region].push_stmt(FlowRegion::ROOT, site, StmtKind::Return);
                self.facts.functions[index].returns.push(site);
                tasks.push(Task::Expr(body, Ctx { stmt: Some(stmt), ..c }, None));
            }
            None => {}
        }

        self.schedule(tasks);
        id
    }

    fn class(&mut self, node: Node<'a>, ctx: Ctx, hint: Option<Hint<'a>>) -> NodeId {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .or(hint.map(|h| h.name));
        let is_enum = node.kind() == "enum_declaration";
        let base = heritage(node);

        let mut cpg = self
            .node(node, NodeType::Class, name)
            .with_property("isAbstract", node.kind() == "abstract_class_declaration")
            .with_property("isEnum", is_enum);
        if let Some(base) = base {
            cpg = cpg.with_property("extends", compact(self.text(base)));
        }
        let id = self.insert(cpg, ctx.parent);

        let class_index = self.facts.classes.len();
        self.facts.classes.push(ClassFacts {
            name: name.map(str::to_string),
            methods: Vec::new(),
        });
        if is_enum {
            return id;
        }

        let c = ctx.at_site(id);
        let mut tasks = Vec::new();
        if let Some(base) = base {
            tasks.push(Task::Expr(base, c, None));
        }

        let members = node.child_by_field_name("body").map(named_children).unwrap_or_default();
        for member in members {
            match member.kind() {
                "method_definition" | "abstract_method_signature" => {
                    let method = self.function(member, c, None, true);
                    self.facts.classes[class_index].methods.push(method);
                }
                "public_field_definition" | "field_definition" => {
                    let Some(field) = member
                        .child_by_field_name("name")
                        .or_else(|| member.child_by_field_name("property"))
                    else {
                        continue;
                    };
                    let value = member.child_by_field_name("value");

                    if let Some(value) = value.filter(|v| {
                        matches!(v.kind(), "arrow_function" | "function_expression" | "function")
                    }) {
                        let hint = Hint {
                            name: self.text(field),
                            bindable: false,
                        };
                        let method = self.function(value, c, Some(hint), true);
                        self.facts.classes[class_index].methods.push(method);
                        continue;
                    }

                    let var_node = self
                        .node(field, NodeType::Variable, Some(self.text(field)))
                        .with_property("declarationKind", "field")
                        .with_property("isField", true);
                    let var = self.insert(var_node, Some(id));
                    self.facts.var_regions.insert(var, ctx.region);
                    if let Some(value) = value {
                        tasks.push(Task::Expr(value, c, None));
                    }
                    self.record(c, AccessKind::Def, Binding::Node(var), id);
                }
                _ => {}
            }
        }

        self.schedule(tasks);
        id
    }

    // ── bindings ────────────────────────────────────────────────────

    fn bind(&mut self, node: Node<'a>, ctx: Ctx, mode: BindMode) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => self.bind_name(node, ctx, mode),
            "object_pattern" | "array_pattern" => {
                let tasks = named_children(node)
                    .into_iter()
                    .map(|child| Task::Bind(child, ctx, mode))
                    .collect();
                self.schedule(tasks);
            }
            "pair_pattern" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.schedule(vec![Task::Bind(value, ctx, mode)]);
                }
            }
            "assignment_pattern" | "object_assignment_pattern" => {
                let mut tasks = Vec::new();
                if let Some(default) = node.child_by_field_name("right") {
                    tasks.push(Task::Expr(default, ctx, None));
                }
                if let Some(target) = node.child_by_field_name("left") {
                    tasks.push(Task::Bind(target, ctx, mode));
                }
                self.schedule(tasks);
            }
            "rest_pattern" | "parenthesized_expression" | "non_null_expression" => {
                if let Some(inner) = first_named(node) {
                    self.schedule(vec![Task::Bind(inner, ctx, mode)]);
                }
            }
            // Writing through a property reads the object
            "member_expression" | "subscript_expression" => {
                self.schedule(vec![Task::Expr(node, ctx, None)]);
            }
            _ => {}
        }
    }

    fn bind_name(&mut self, node: Node<'a>, ctx: Ctx, mode: BindMode) {
        let name = self.text(node);
        match mode {
            BindMode::Declare { kind, site } => {
                let var_node = self
                    .node(node, NodeType::Variable, Some(name))
                    .with_property("declarationKind", kind);
                let var = self.insert(var_node, ctx.parent);
                let scope = if kind == "var" {
                    self.facts.scopes.hoist_target(ctx.scope)
                } else {
                    ctx.scope
                };
                self.facts.scopes.declare_var(scope, name, var);
                self.facts.var_regions.insert(var, ctx.region);
                self.record(ctx, AccessKind::Def, Binding::Node(var), site);
            }
            BindMode::Param {
                index,
                rest,
                optional,
                has_default,
            } => {
                let param_node = self
                    .node(node, NodeType::Parameter, Some(name))
                    .with_property("index", index)
                    .with_property("isRest", rest)
                    .with_property("isOptional", optional)
                    .with_property("hasDefault", has_default);
                let param = self.insert(param_node, ctx.parent);
                self.facts.scopes.declare_var(ctx.scope, name, param);
                self.facts.var_regions.insert(param, ctx.region);
                self.facts.regions[ctx.region].params.push(param);
                if let Some(function) = ctx.function {
                    self.facts.functions[function].params.push((index, param));
                }
            }
            BindMode::Assign { site } => {
                let target = Binding::Name {
                    name: name.to_string(),
                    scope: ctx.scope,
                };
                self.record(ctx, AccessKind::Def, target, site);
            }
        }
    }

    /// Replace name references with the binding they resolve to; names that
    /// resolve nowhere (globals, typos) are dropped
    fn resolve_names(&mut self) {
        let FileFacts { scopes, regions, .. } = &mut self.facts;
        for region in regions.iter_mut() {
            resolve_accesses(scopes, &mut region.entry_accesses);
            for stmt in region.stmts.iter_mut() {
                resolve_accesses(scopes, &mut stmt.accesses);
            }
        }
    }
}

fn resolve_accesses(scopes: &ScopeTable, accesses: &mut Vec<Access>) {
    accesses.retain_mut(|access| {
        let resolved = match &access.target {
            Binding::Node(var) => Some(*var),
            Binding::Name { name, scope } => scopes.resolve_var(*scope, name),
        };
        match resolved {
            Some(var) => {
                access.target = Binding::Node(var);
                true
            }
            None => false,
        }
    });
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

fn first_named<'t>(node: Node<'t>) -> Option<Node<'t>> {
    named_children(node).into_iter().next()
}

/// Whether `node` has an anonymous child token of the given kind
fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

fn is_type_node(kind: &str) -> bool {
    kind.ends_with("_type")
        || matches!(
            kind,
            "type_annotation"
                | "type_arguments"
                | "type_parameters"
                | "type_identifier"
                | "type_query"
                | "type_predicate_annotation"
                | "asserts_annotation"
                | "omitting_type_annotation"
                | "opting_type_annotation"
                | "implements_clause"
                | "decorator"
                | "comment"
        )
}

/// Condition of a `for (;;)` header, which may be wrapped in a statement
fn loop_expression(node: Node<'_>) -> Option<Node<'_>> {
    if !node.is_named() {
        return None;
    }
    match node.kind() {
        "empty_statement" => None,
        "expression_statement" => first_named(node),
        _ => Some(node),
    }
}

/// Whether the value of a call flows anywhere
fn is_consumed(node: Node<'_>) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            kind if TRANSPARENT_PARENTS.contains(&kind) => current = parent,
            "expression_statement" => return false,
            _ => return true,
        }
    }
    false
}

fn parameters<'t>(node: Node<'t>) -> Vec<Param<'t>> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![Param {
            pattern: single,
            default: None,
            rest: false,
            optional: false,
        }];
    }
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };

    named_children(list)
        .into_iter()
        .filter_map(|param| match param.kind() {
            "required_parameter" | "optional_parameter" => {
                let pattern = param.child_by_field_name("pattern")?;
                if pattern.kind() == "this" {
                    return None;
                }
                let (pattern, rest) = if pattern.kind() == "rest_pattern" {
                    (first_named(pattern)?, true)
                } else {
                    (pattern, false)
                };
                Some(Param {
                    pattern,
                    default: param.child_by_field_name("value"),
                    rest,
                    optional: param.kind() == "optional_parameter",
                })
            }
            "assignment_pattern" => Some(Param {
                pattern: param.child_by_field_name("left")?,
                default: param.child_by_field_name("right"),
                rest: false,
                optional: false,
            }),
            "rest_pattern" => Some(Param {
                pattern: first_named(param)?,
                default: None,
                rest: true,
                optional: false,
            }),
            "identifier" | "object_pattern" | "array_pattern" => Some(Param {
                pattern: param,
                default: None,
                rest: false,
                optional: false,
            }),
            _ => None,
        })
        .collect()
}

/// The `extends` expression of a class, if any
fn heritage<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let heritage = named_children(node)
        .into_iter()
        .find(|child| child.kind() == "class_heritage")?;
    for clause in named_children(heritage) {
        match clause.kind() {
            "extends_clause" => {
                return clause
                    .child_by_field_name("value")
                    .or_else(|| first_named(clause));
            }
            "implements_clause" => {}
            _ => return Some(clause),
        }
    }
    None
}

/// Source text with all whitespace removed, for names spanning lines
fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}
