//! Control-flow layer.
//!
//! Walks the AST with an explicit stack of `(node, Flow)` pairs and adds
//! `Cfg` edges. `Flow::next` is the node control reaches when the current
//! statement completes normally; loops and switches push their own break and
//! continue targets. Each step only adds the out-edges of its own node, so
//! the order in which the stack is drained does not change the result.

use std::collections::HashMap;

use tracing::debug;

use crate::ir::{CfgEdge, Graph, LabelType, NodeId, NodeKind};

/// Where control goes after a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flow {
    pub next: Option<NodeId>,
    pub break_to: Option<NodeId>,
    pub continue_to: Option<NodeId>,
}

impl Flow {
    fn with_next(self, next: Option<NodeId>) -> Self {
        Self { next, ..self }
    }

    /// Fresh scope: nothing to fall into, no enclosing loop.
    fn function_body() -> Self {
        Self::default()
    }
}

pub type Step = fn(&mut CfgWalk<'_>, NodeId, Flow);

/// Label type to CFG step. Label types without an entry are leaves.
#[derive(Clone)]
pub struct CfgTable {
    steps: HashMap<LabelType, Step>,
}

impl CfgTable {
    pub fn standard() -> Self {
        let mut steps: HashMap<LabelType, Step> = HashMap::new();
        steps.insert(LabelType::File, step_multi_path);
        steps.insert(LabelType::StatementBlock, step_block);
        steps.insert(LabelType::If, step_if);
        steps.insert(LabelType::While, step_loop);
        steps.insert(LabelType::DoWhile, step_loop);
        steps.insert(LabelType::For, step_loop);
        steps.insert(LabelType::ForEach, step_loop);
        steps.insert(LabelType::Break, step_break);
        steps.insert(LabelType::Continue, step_continue);
        steps.insert(LabelType::Return, step_terminal);
        steps.insert(LabelType::Throw, step_terminal);
        steps.insert(LabelType::Switch, step_switch);
        steps.insert(LabelType::SwitchSection, step_switch_section);
        steps.insert(LabelType::Try, step_try);
        steps.insert(LabelType::CatchClause, step_enter_body);
        steps.insert(LabelType::Using, step_enter_body);
        steps.insert(LabelType::MethodDeclaration, step_declaration);
        steps.insert(LabelType::ClassDeclaration, step_declaration);
        Self { steps }
    }

    pub fn get(&self, label: LabelType) -> Step {
        self.steps.get(&label).copied().unwrap_or(step_leaf)
    }

    pub fn insert(&mut self, label: LabelType, step: Step) {
        self.steps.insert(label, step);
    }
}

pub struct CfgWalk<'g> {
    graph: &'g mut Graph,
    stack: Vec<(NodeId, Flow)>,
}

impl CfgWalk<'_> {
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    pub fn edge(&mut self, from: NodeId, to: NodeId, kind: CfgEdge) {
        self.graph.add_cfg_edge(from, to, kind);
    }

    pub fn visit(&mut self, id: NodeId, flow: Flow) {
        self.stack.push((id, flow));
    }

    /// Edge to `flow.next`, if there is one.
    pub fn fall_through(&mut self, from: NodeId, flow: Flow, kind: CfgEdge) {
        if let Some(next) = flow.next {
            self.edge(from, next, kind);
        }
    }

    /// Enter `children[0]` from `from` and chain the children so each one
    /// falls into the following one, the last into `flow.next`.
    pub fn thread(&mut self, from: NodeId, children: &[NodeId], flow: Flow) {
        let Some(first) = children.first() else {
            self.fall_through(from, flow, CfgEdge::Always);
            return;
        };
        self.edge(from, *first, CfgEdge::Always);
        self.chain(children, flow);
    }

    fn chain(&mut self, children: &[NodeId], flow: Flow) {
        for (i, child) in children.iter().enumerate() {
            let next = children.get(i + 1).copied().or(flow.next);
            self.visit(*child, flow.with_next(next));
        }
    }
}

/// Add CFG edges to `graph`. Returns the entry node.
///
/// Function and class bodies that only appear inside expressions (callbacks,
/// function values) are not reached from the root; they get their own
/// entry so every statement of the file ends up in the layer.
pub fn build_cfg(graph: &mut Graph, table: &CfgTable) -> Option<NodeId> {
    let root = graph.root()?;
    let mut walk = CfgWalk {
        graph,
        stack: vec![(root, Flow::default())],
    };
    drain(&mut walk, table);

    let mut detached = walk.graph.nodes_of(LabelType::MethodDeclaration);
    detached.extend(walk.graph.nodes_of(LabelType::ClassDeclaration));
    detached.sort_unstable();
    for id in detached {
        if walk.graph.cfg_predecessors(id).is_empty() && walk.graph.cfg_successors(id).is_empty()
        {
            debug!(node = %id, "building detached body");
            walk.visit(id, Flow::function_body());
            drain(&mut walk, table);
        }
    }
    Some(root)
}

fn drain(walk: &mut CfgWalk<'_>, table: &CfgTable) {
    while let Some((id, flow)) = walk.stack.pop() {
        let step = table.get(walk.graph.label(id));
        step(walk, id, flow);
    }
}

fn step_leaf(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    walk.fall_through(id, flow, CfgEdge::Always);
}

fn step_terminal(_walk: &mut CfgWalk<'_>, _id: NodeId, _flow: Flow) {}

/// Every child is an entry point of its own; children still fall into
/// each other.
fn step_multi_path(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let children = walk.graph.ast_children(id);
    if children.is_empty() {
        walk.fall_through(id, flow, CfgEdge::Always);
        return;
    }
    for child in &children {
        walk.edge(id, *child, CfgEdge::Always);
    }
    walk.chain(&children, flow);
}

fn step_block(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let in_class = walk
        .graph
        .ast_parent(id)
        .is_some_and(|p| walk.graph.label(p) == LabelType::ClassDeclaration);
    if in_class {
        return step_multi_path(walk, id, flow);
    }
    let children = walk.graph.ast_children(id);
    walk.thread(id, &children, flow);
}

fn step_if(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let NodeKind::If {
        true_branch,
        false_branch,
        ..
    } = walk.graph.kind(id)
    else {
        return step_leaf(walk, id, flow);
    };
    let (true_branch, false_branch) = (*true_branch, *false_branch);

    walk.edge(id, true_branch, CfgEdge::True);
    walk.visit(true_branch, flow);
    match false_branch {
        Some(other) => {
            walk.edge(id, other, CfgEdge::False);
            walk.visit(other, flow);
        }
        None => walk.fall_through(id, flow, CfgEdge::False),
    }
}

/// Loop bodies run on `True` and come back to the loop node; `False`
/// leaves the loop.
fn step_loop(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let body = match walk.graph.kind(id) {
        NodeKind::While { body, .. }
        | NodeKind::DoWhile { body, .. }
        | NodeKind::For { body, .. }
        | NodeKind::ForEach { body, .. } => *body,
        _ => return step_leaf(walk, id, flow),
    };
    walk.edge(id, body, CfgEdge::True);
    walk.visit(
        body,
        Flow {
            next: Some(id),
            break_to: flow.next,
            continue_to: Some(id),
        },
    );
    walk.fall_through(id, flow, CfgEdge::False);
}

fn step_break(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    if let Some(target) = flow.break_to {
        walk.edge(id, target, CfgEdge::Break);
    }
}

fn step_continue(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    if let Some(target) = flow.continue_to {
        walk.edge(id, target, CfgEdge::Continue);
    }
}

/// Sections fall through into the next one; `break` leaves the switch.
fn step_switch(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let sections: Vec<NodeId> = walk
        .graph
        .ast_children(id)
        .into_iter()
        .filter(|c| walk.graph.label(*c) == LabelType::SwitchSection)
        .collect();
    let has_default = sections.iter().any(|s| {
        matches!(
            walk.graph.kind(*s),
            NodeKind::SwitchSection { case_value: None }
        )
    });

    let inner = Flow {
        break_to: flow.next,
        ..flow
    };
    for (i, section) in sections.iter().enumerate() {
        walk.edge(id, *section, CfgEdge::Always);
        let next = sections.get(i + 1).copied().or(flow.next);
        walk.visit(*section, inner.with_next(next));
    }
    if !has_default {
        walk.fall_through(id, flow, CfgEdge::Always);
    }
}

fn step_switch_section(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let case_value = match walk.graph.kind(id) {
        NodeKind::SwitchSection { case_value } => *case_value,
        _ => None,
    };
    let statements: Vec<NodeId> = walk
        .graph
        .ast_children(id)
        .into_iter()
        .filter(|c| Some(*c) != case_value)
        .collect();
    walk.thread(id, &statements, flow);
}

/// Body and every handler are entered from the try node; all of them
/// continue into the finalizer when there is one.
fn step_try(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let (body, finalizer) = match walk.graph.kind(id) {
        NodeKind::Try { body, finalizer } => (*body, *finalizer),
        _ => return step_leaf(walk, id, flow),
    };
    let handlers: Vec<NodeId> = walk
        .graph
        .ast_children(id)
        .into_iter()
        .filter(|c| walk.graph.label(*c) == LabelType::CatchClause)
        .collect();

    let after = finalizer.or(flow.next);
    walk.edge(id, body, CfgEdge::Always);
    walk.visit(body, flow.with_next(after));
    for handler in handlers {
        walk.edge(id, handler, CfgEdge::Always);
        walk.visit(handler, flow.with_next(after));
    }
    if let Some(finalizer) = finalizer {
        walk.visit(finalizer, flow);
    }
}

fn step_enter_body(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let body = match walk.graph.kind(id) {
        NodeKind::CatchClause { body, .. } | NodeKind::Using { body, .. } => *body,
        _ => return step_leaf(walk, id, flow),
    };
    walk.edge(id, body, CfgEdge::Always);
    walk.visit(body, flow);
}

/// Declarations enter their body in a fresh scope and fall through to the
/// next statement.
fn step_declaration(walk: &mut CfgWalk<'_>, id: NodeId, flow: Flow) {
    let body = match walk.graph.kind(id) {
        NodeKind::MethodDeclaration { body, .. } | NodeKind::ClassDeclaration { body, .. } => {
            *body
        }
        _ => None,
    };
    if let Some(body) = body {
        walk.edge(id, body, CfgEdge::Always);
        walk.visit(body, Flow::function_body());
    }
    walk.fall_through(id, flow, CfgEdge::Always);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ir::Language;
    use crate::syntax::testing::{build, find};

    pub(crate) fn with_cfg(language: Language, file: &str, code: &str) -> Graph {
        let mut graph = build(language, file, code);
        build_cfg(&mut graph, &CfgTable::standard());
        graph
    }

    /// No node mixes `Always` with conditional out-edges, and no node has
    /// two `True` or two `False` out-edges.
    pub(crate) fn assert_cfg_invariant(graph: &Graph) {
        for id in graph.node_ids() {
            let out = graph.cfg_successors(id);
            let always = out.iter().any(|(_, k)| *k == CfgEdge::Always);
            let conditional = out.iter().any(|(_, k)| k.is_conditional());
            assert!(!(always && conditional), "node {id} mixes edge kinds");
            assert!(out.iter().filter(|(_, k)| *k == CfgEdge::True).count() <= 1);
            assert!(out.iter().filter(|(_, k)| *k == CfgEdge::False).count() <= 1);
        }
    }

    fn succ(graph: &Graph, id: NodeId) -> Vec<(crate::ir::LabelType, CfgEdge)> {
        graph
            .cfg_successors(id)
            .into_iter()
            .map(|(n, k)| (graph.label(n), k))
            .collect()
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn if_without_else_falls_through_on_false() {
        let graph = with_cfg(Language::JavaScript, "a.js", "if (a) { b(); }\nc();\n");
        assert_cfg_invariant(&graph);
        let if_node = find(&graph, |k| matches!(k, NodeKind::If { .. }));
        assert_eq!(
            succ(&graph, if_node),
            vec![
                (LabelType::StatementBlock, CfgEdge::True),
                (LabelType::MethodInvocation, CfgEdge::False)
            ]
        );
        // `b()` flows into `c()`.
        let b = find(&graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == "b")
        });
        let c = find(&graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == "c")
        });
        assert_eq!(graph.cfg_successors(b), vec![(c, CfgEdge::Always)]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn loop_body_returns_to_loop_and_break_leaves() {
        let code = "while (x) { if (y) { break; } z(); }\nw();\n";
        let graph = with_cfg(Language::JavaScript, "a.js", code);
        assert_cfg_invariant(&graph);
        let looping = find(&graph, |k| matches!(k, NodeKind::While { .. }));
        let z = find(&graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == "z")
        });
        let w = find(&graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == "w")
        });
        let brk = find(&graph, |k| matches!(k, NodeKind::Break));

        assert_eq!(graph.cfg_successors(z), vec![(looping, CfgEdge::Always)]);
        assert_eq!(graph.cfg_successors(brk), vec![(w, CfgEdge::Break)]);
        assert!(graph.cfg_successors(looping).contains(&(w, CfgEdge::False)));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn switch_sections_fall_through() {
        let code = "switch (v) { case 1: a(); case 2: b(); break; default: c(); }\nd();\n";
        let graph = with_cfg(Language::JavaScript, "a.js", code);
        assert_cfg_invariant(&graph);
        let a = find(&graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == "a")
        });
        let switch = find(&graph, |k| matches!(k, NodeKind::Switch { .. }));
        let sections = graph.ast_children(switch);
        // value + three sections, no direct edge to `d()` because of default
        assert_eq!(graph.cfg_successors(switch).len(), 3);
        assert_eq!(graph.cfg_successors(a), vec![(sections[2], CfgEdge::Always)]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn return_terminates_path() {
        let graph = with_cfg(
            Language::JavaScript,
            "a.js",
            "function f() { return 1; g(); }\n",
        );
        let ret = find(&graph, |k| matches!(k, NodeKind::Return { .. }));
        assert!(graph.cfg_successors(ret).is_empty());
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn callback_bodies_are_reached() {
        let code = "app.get('/', (req, res) => {\n  const id = req.query.id;\n  db.query(id);\n});\n";
        let graph = with_cfg(Language::JavaScript, "a.js", code);
        assert_cfg_invariant(&graph);
        let decl = find(&graph, |k| matches!(k, NodeKind::VariableDeclaration { .. }));
        assert!(graph.in_cfg(decl));
        let call = find(&graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == "db.query")
        });
        assert_eq!(graph.cfg_predecessors(call), vec![(decl, CfgEdge::Always)]);
    }

    #[cfg(feature = "python")]
    #[test]
    fn try_handlers_join_finalizer() {
        let code = "try:\n    a()\nexcept E:\n    b()\nfinally:\n    c()\nd()\n";
        let graph = with_cfg(Language::Python, "a.py", code);
        assert_cfg_invariant(&graph);
        let c = find(&graph, |k| {
            matches!(k, NodeKind::MethodInvocation { expression, .. } if expression == "c")
        });
        let fin = graph.ast_parent(c).unwrap();
        let preds = graph.cfg_predecessors(fin);
        assert_eq!(preds.len(), 2);
    }

    #[cfg(feature = "python")]
    #[test]
    fn class_body_is_multi_path() {
        let code = "class A:\n    def f(self):\n        return 1\n    def g(self):\n        return 2\n";
        let graph = with_cfg(Language::Python, "a.py", code);
        assert_cfg_invariant(&graph);
        let class = find(&graph, |k| matches!(k, NodeKind::ClassDeclaration { .. }));
        let NodeKind::ClassDeclaration { body: Some(body), .. } = graph.kind(class) else {
            unreachable!()
        };
        let succs = graph.cfg_successors(*body);
        assert_eq!(succs.len(), 2);
        assert!(succs.iter().all(|(n, k)| *k == CfgEdge::Always
            && graph.label(*n) == LabelType::MethodDeclaration));
    }
}
