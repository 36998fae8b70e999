use std::collections::HashSet;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::{Language, LabelType, Node, NodeId, NodeKind, Position};

/// Kind of a control-flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CfgEdge {
    Always,
    True,
    False,
    Break,
    Continue,
}

impl CfgEdge {
    pub fn is_conditional(self) -> bool {
        matches!(self, Self::True | Self::False)
    }
}

/// Edge of the per-file multigraph. The layer decides how an edge is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum EdgeLabel {
    /// Parent to child, `index` orders siblings.
    Ast { index: usize },
    Cfg { kind: CfgEdge },
    /// Use site to the definition it resolved to.
    Ctx,
}

/// Syntax graph of one source file.
///
/// Node ids index directly into the underlying petgraph storage. Nodes are
/// never removed, so an id handed out by [`Graph::add_node`] stays valid for
/// the lifetime of the graph.
#[derive(Debug, Clone)]
pub struct Graph {
    inner: DiGraph<Node, EdgeLabel>,
    language: Language,
    path: PathBuf,
    root: Option<NodeId>,
    unsupported: Vec<NodeId>,
    resolved: HashSet<NodeId>,
}

impl Graph {
    pub fn new(language: Language, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: DiGraph::new(),
            language,
            path: path.into(),
            root: None,
            unsupported: Vec::new(),
            resolved: HashSet::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        to_id(self.inner.add_node(node))
    }

    /// Panics if `id` was not allocated by this graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.inner[to_index(id)]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn label(&self, id: NodeId) -> LabelType {
        self.node(id).label_type()
    }

    pub fn position(&self, id: NodeId) -> Position {
        self.node(id).position
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.inner[to_index(id)].kind = kind;
    }

    pub fn set_origin(&mut self, id: NodeId, position: Position, cst_kind: &str) {
        let node = &mut self.inner[to_index(id)];
        node.position = position;
        node.cst_kind = cst_kind.to_string();
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.node_indices().map(to_id)
    }

    /// Ids of every node with the given label type, in allocation order.
    pub fn nodes_of(&self, label: LabelType) -> Vec<NodeId> {
        self.node_ids().filter(|id| self.label(*id) == label).collect()
    }

    pub fn mark_unsupported(&mut self, id: NodeId) {
        self.unsupported.push(id);
    }

    /// Placeholder nodes left behind by lenient lowering.
    pub fn unsupported(&self) -> &[NodeId] {
        &self.unsupported
    }

    // ── AST layer ──────────────────────────────────────────────────

    /// Appends `child` as the last AST child of `parent`.
    pub fn add_ast_edge(&mut self, parent: NodeId, child: NodeId) {
        let index = self
            .inner
            .edges_directed(to_index(parent), Direction::Outgoing)
            .filter(|e| matches!(e.weight(), EdgeLabel::Ast { .. }))
            .count();
        self.inner
            .add_edge(to_index(parent), to_index(child), EdgeLabel::Ast { index });
    }

    /// AST children ordered by their edge index.
    pub fn ast_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<(usize, NodeId)> = self
            .inner
            .edges_directed(to_index(id), Direction::Outgoing)
            .filter_map(|e| match e.weight() {
                EdgeLabel::Ast { index } => Some((*index, to_id(e.target()))),
                _ => None,
            })
            .collect();
        children.sort_unstable();
        children.into_iter().map(|(_, child)| child).collect()
    }

    pub fn ast_parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner
            .edges_directed(to_index(id), Direction::Incoming)
            .find(|e| matches!(e.weight(), EdgeLabel::Ast { .. }))
            .map(|e| to_id(e.source()))
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ast_ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.ast_parent(id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.ast_parent(parent);
        }
        out
    }

    /// Every node of the subtree rooted at `id`, in pre-order.
    pub fn ast_descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let children = self.ast_children(current);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    // ── CFG layer ──────────────────────────────────────────────────

    pub fn add_cfg_edge(&mut self, from: NodeId, to: NodeId, kind: CfgEdge) {
        self.inner
            .add_edge(to_index(from), to_index(to), EdgeLabel::Cfg { kind });
    }

    /// Outgoing CFG edges in insertion order.
    pub fn cfg_successors(&self, id: NodeId) -> Vec<(NodeId, CfgEdge)> {
        self.cfg_edges(id, Direction::Outgoing)
    }

    /// Incoming CFG edges in insertion order.
    pub fn cfg_predecessors(&self, id: NodeId) -> Vec<(NodeId, CfgEdge)> {
        self.cfg_edges(id, Direction::Incoming)
    }

    fn cfg_edges(&self, id: NodeId, direction: Direction) -> Vec<(NodeId, CfgEdge)> {
        let mut edges: Vec<_> = self
            .inner
            .edges_directed(to_index(id), direction)
            .filter_map(|e| match e.weight() {
                EdgeLabel::Cfg { kind } => {
                    let other = match direction {
                        Direction::Outgoing => e.target(),
                        Direction::Incoming => e.source(),
                    };
                    Some((e.id().index(), to_id(other), *kind))
                }
                _ => None,
            })
            .collect();
        edges.sort_unstable_by_key(|(edge, _, _)| *edge);
        edges.into_iter().map(|(_, n, k)| (n, k)).collect()
    }

    /// Whether the node takes part in the control-flow layer.
    pub fn in_cfg(&self, id: NodeId) -> bool {
        Some(id) == self.root
            || self
                .inner
                .edges_directed(to_index(id), Direction::Incoming)
                .any(|e| matches!(e.weight(), EdgeLabel::Cfg { .. }))
    }

    /// Nearest node, starting at `id` itself, that takes part in the
    /// control-flow layer. Expressions map to their enclosing statement.
    pub fn first_cfg_parent(&self, id: NodeId) -> Option<NodeId> {
        if self.in_cfg(id) {
            return Some(id);
        }
        self.ast_ancestors(id)
            .into_iter()
            .find(|ancestor| self.in_cfg(*ancestor))
    }

    // ── Symbol-context layer ───────────────────────────────────────

    pub fn add_ctx_edge(&mut self, from: NodeId, to: NodeId) {
        self.inner.add_edge(to_index(from), to_index(to), EdgeLabel::Ctx);
    }

    /// Records that the definitions of `id` have been searched for, even if
    /// none were found.
    pub fn mark_resolved(&mut self, id: NodeId) {
        self.resolved.insert(id);
    }

    pub fn is_resolved(&self, id: NodeId) -> bool {
        self.resolved.contains(&id)
    }

    /// Definitions cached for a use site, ordered by node id.
    pub fn ctx_targets(&self, id: NodeId) -> Vec<NodeId> {
        let mut targets: Vec<NodeId> = self
            .inner
            .edges_directed(to_index(id), Direction::Outgoing)
            .filter(|e| matches!(e.weight(), EdgeLabel::Ctx))
            .map(|e| to_id(e.target()))
            .collect();
        targets.sort_unstable();
        targets
    }

    // ── Export ─────────────────────────────────────────────────────

    /// Exports the graph to Graphviz DOT. AST edges are drawn grey, CFG
    /// edges carry their kind as label, context edges are dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph G {\n");
        for id in self.node_ids() {
            let node = self.node(id);
            out.push_str(&format!(
                "    {} [label=\"{}:{} {}\"];\n",
                id,
                node.position.line,
                node.label_type(),
                escape_dot(&node_caption(&node.kind))
            ));
        }
        for edge in self.inner.edge_references() {
            let (a, b) = (to_id(edge.source()), to_id(edge.target()));
            match edge.weight() {
                EdgeLabel::Ast { .. } => {
                    out.push_str(&format!("    {a} -> {b} [color=grey];\n"));
                }
                EdgeLabel::Cfg { kind } => {
                    out.push_str(&format!("    {a} -> {b} [label=\"{kind:?}\"];\n"));
                }
                EdgeLabel::Ctx => {
                    out.push_str(&format!("    {a} -> {b} [style=dashed];\n"));
                }
            }
        }
        out.push('}');
        out
    }

    /// Exports the graph to JSON: node ids are rendered as strings.
    pub fn to_json(&self) -> serde_json::Value {
        let nodes: Vec<serde_json::Value> = self
            .node_ids()
            .map(|id| {
                let mut value = serde_json::to_value(self.node(id))
                    .unwrap_or(serde_json::Value::Null);
                if let serde_json::Value::Object(map) = &mut value {
                    map.insert("id".into(), serde_json::Value::String(id.to_string()));
                }
                value
            })
            .collect();
        let edges: Vec<serde_json::Value> = self
            .inner
            .edge_references()
            .map(|e| {
                serde_json::json!({
                    "source": to_id(e.source()).to_string(),
                    "target": to_id(e.target()).to_string(),
                    "label": e.weight(),
                })
            })
            .collect();
        serde_json::json!({
            "path": self.path.display().to_string(),
            "language": self.language,
            "root": self.root.map(|r| r.to_string()),
            "nodes": nodes,
            "edges": edges,
        })
    }
}

fn to_index(id: NodeId) -> NodeIndex {
    NodeIndex::new(id.index())
}

fn to_id(index: NodeIndex) -> NodeId {
    NodeId(index.index() as u32)
}

fn node_caption(kind: &NodeKind) -> String {
    match kind {
        NodeKind::SymbolLookup { symbol } => symbol.clone(),
        NodeKind::Literal { value, .. } => value.clone(),
        NodeKind::MethodInvocation { expression, .. }
        | NodeKind::MemberAccess { expression, .. }
        | NodeKind::ElementAccess { expression, .. } => expression.clone(),
        NodeKind::BinaryOperation { operator, .. }
        | NodeKind::UnaryExpression { operator, .. } => operator.clone(),
        NodeKind::VariableDeclaration { variables, .. }
        | NodeKind::Assignment { variables, .. } => variables.join(","),
        NodeKind::MethodDeclaration { name, .. } | NodeKind::ClassDeclaration { name, .. } => {
            name.clone().unwrap_or_default()
        }
        NodeKind::Unsupported { cst_kind } => cst_kind.clone(),
        _ => String::new(),
    }
}

fn escape_dot(s: &str) -> String {
    let short: String = s.chars().take(40).collect();
    short.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', " ")
}
