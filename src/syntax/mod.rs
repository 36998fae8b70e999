//! Syntax graph builder: lowers a CST into the AST layer of a [`Graph`].
//!
//! Each language registers a reader per CST kind. The builder keeps an
//! explicit work stack of `(pre-assigned id, cst node)` pairs, so deep trees
//! never grow the native stack. A reader fills in the node it was handed and
//! schedules its children through [`ReaderCtx::lower`].

pub mod javascript;
pub mod python;
pub mod typescript;

use std::collections::HashMap;

use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::ir::{Graph, Language, LiteralKind, Node, NodeId, NodeKind, Position};
use crate::parser::{Cst, CstNode};

/// What a reader produced for the node it was given.
pub enum Lowered<'c> {
    Node(NodeKind),
    /// The node is the lowering of this descendant (parentheses, expression
    /// statements, type assertions).
    Alias(&'c CstNode),
}

pub type Reader = for<'c, 'g> fn(&mut ReaderCtx<'c, 'g>, &'c CstNode) -> Result<Lowered<'c>>;

/// CST kind name to reader for one language.
#[derive(Clone, Default)]
pub struct ReaderTable {
    readers: HashMap<&'static str, Reader>,
}

impl ReaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kinds: &[&'static str], reader: Reader) -> &mut Self {
        for kind in kinds {
            self.readers.insert(kind, reader);
        }
        self
    }

    pub fn get(&self, kind: &str) -> Option<Reader> {
        self.readers.get(kind).copied()
    }

    /// Copy of this table without the given kinds.
    pub fn without(&self, kinds: &[&str]) -> Self {
        let mut table = self.clone();
        table.readers.retain(|k, _| !kinds.contains(k));
        table
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

/// Reader tables for every supported language.
#[derive(Clone)]
pub struct Readers {
    tables: HashMap<Language, ReaderTable>,
}

impl Readers {
    pub fn standard() -> Self {
        let mut tables = HashMap::new();
        tables.insert(Language::JavaScript, javascript::table());
        tables.insert(Language::TypeScript, typescript::table());
        tables.insert(Language::Python, python::table());
        Self { tables }
    }

    pub fn table(&self, language: Language) -> Option<&ReaderTable> {
        self.tables.get(&language)
    }

    pub fn insert(&mut self, language: Language, table: ReaderTable) {
        self.tables.insert(language, table);
    }
}

/// How the builder treats CST kinds with no reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoweringMode {
    /// Fail the file with [`AnalysisError::UnsupportedConstruct`].
    #[default]
    Strict,
    /// Keep an `Unsupported` placeholder and carry on.
    Lenient,
}

pub struct GraphBuilder<'r> {
    readers: &'r Readers,
    mode: LoweringMode,
}

struct BuildState<'c> {
    graph: Graph,
    source: &'c str,
    pending: Vec<(NodeId, &'c CstNode)>,
}

impl<'r> GraphBuilder<'r> {
    pub fn new(readers: &'r Readers, mode: LoweringMode) -> Self {
        Self { readers, mode }
    }

    pub fn build(&self, cst: &Cst, path: &std::path::Path) -> Result<Graph> {
        let language = cst.language;
        let table = self.readers.table(language).ok_or_else(|| AnalysisError::Parse {
            file: path.display().to_string(),
            message: format!("no reader table for {language}"),
        })?;

        let mut state = BuildState {
            graph: Graph::new(language, path),
            source: &cst.source,
            pending: Vec::new(),
        };
        let root = state.graph.add_node(placeholder(&cst.root));
        state.graph.set_root(root);
        state.pending.push((root, &cst.root));

        while let Some((id, cst_node)) = state.pending.pop() {
            state.graph.set_origin(id, cst_node.position(), cst_node.kind);
            let Some(reader) = table.get(cst_node.kind) else {
                self.unsupported(&mut state, language, id, cst_node)?;
                continue;
            };

            let mark = state.pending.len();
            let lowered = {
                let mut ctx = ReaderCtx {
                    state: &mut state,
                    id,
                    language,
                };
                reader(&mut ctx, cst_node)
            };

            match lowered {
                Ok(Lowered::Node(kind)) => {
                    state.graph.set_kind(id, kind);
                    // Children were scheduled in source order; pop them in
                    // the same order.
                    state.pending[mark..].reverse();
                }
                Ok(Lowered::Alias(target)) => {
                    state.pending.truncate(mark);
                    state.pending.push((id, target));
                }
                Err(e @ AnalysisError::UnsupportedConstruct { .. })
                    if self.mode == LoweringMode::Lenient =>
                {
                    debug!(node = %id, error = %e, "reader gave up, keeping placeholder");
                    state.pending.truncate(mark);
                    state.graph.mark_unsupported(id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(state.graph)
    }

    fn unsupported(
        &self,
        state: &mut BuildState<'_>,
        language: Language,
        id: NodeId,
        node: &CstNode,
    ) -> Result<()> {
        let position = node.position();
        match self.mode {
            LoweringMode::Strict => Err(AnalysisError::UnsupportedConstruct {
                language,
                kind: node.kind.to_string(),
                line: position.line,
                column: position.column,
            }),
            LoweringMode::Lenient => {
                debug!(
                    language = %language,
                    kind = node.kind,
                    line = position.line,
                    "no reader for construct, lowering to placeholder"
                );
                state.graph.set_kind(
                    id,
                    NodeKind::Unsupported {
                        cst_kind: node.kind.to_string(),
                    },
                );
                state.graph.mark_unsupported(id);
                Ok(())
            }
        }
    }
}

fn placeholder(node: &CstNode) -> Node {
    Node {
        kind: NodeKind::Unsupported {
            cst_kind: node.kind.to_string(),
        },
        position: node.position(),
        cst_kind: node.kind.to_string(),
    }
}

/// Handle a reader gets on the graph under construction.
pub struct ReaderCtx<'c, 'g> {
    state: &'g mut BuildState<'c>,
    id: NodeId,
    language: Language,
}

impl<'c, 'g> ReaderCtx<'c, 'g> {
    /// Id pre-assigned to the node being read.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn text(&self, node: &CstNode) -> &'c str {
        node.text(self.state.source)
    }

    /// Full source text of the file being lowered.
    pub fn source(&self) -> &'c str {
        self.state.source
    }

    /// Source text with whitespace removed and optional chaining flattened,
    /// the form name matchers compare against.
    pub fn expression_text(&self, node: &CstNode) -> String {
        self.text(node)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .replace("?.", ".")
    }

    /// Allocate a node for `child` under the current node and schedule it.
    pub fn lower(&mut self, child: &'c CstNode) -> NodeId {
        self.lower_under(self.id, child)
    }

    pub fn lower_opt(&mut self, child: Option<&'c CstNode>) -> Option<NodeId> {
        child.map(|c| self.lower(c))
    }

    /// Lower every named child that is not a comment.
    pub fn lower_named_children(&mut self, node: &'c CstNode) {
        for child in node.named_children() {
            self.lower(child);
        }
    }

    /// Allocate a node for `child` under `parent` (usually a forked node).
    pub fn lower_under(&mut self, parent: NodeId, child: &'c CstNode) -> NodeId {
        let id = self.state.graph.add_node(placeholder(child));
        self.state.graph.add_ast_edge(parent, id);
        self.state.pending.push((id, child));
        id
    }

    /// Create a synthetic node under `parent`, positioned at `at`. It must
    /// be given its kind with [`ReaderCtx::fill`].
    pub fn fork(&mut self, parent: NodeId, at: &CstNode) -> NodeId {
        let id = self.state.graph.add_node(placeholder(at));
        self.state.graph.add_ast_edge(parent, id);
        id
    }

    pub fn fill(&mut self, id: NodeId, kind: NodeKind) {
        self.state.graph.set_kind(id, kind);
    }

    /// Synthetic node with a known kind.
    pub fn synthetic(&mut self, parent: NodeId, at: &CstNode, kind: NodeKind) -> NodeId {
        let id = self.fork(parent, at);
        self.fill(id, kind);
        id
    }

    /// Required field, or a capability gap naming the missing piece.
    pub fn field(&self, node: &'c CstNode, field: &str) -> Result<&'c CstNode> {
        node.child_by_field(field)
            .ok_or_else(|| self.unsupported_at(node, &format!("{}.{field}", node.kind)))
    }

    pub fn unsupported_at(&self, node: &CstNode, what: &str) -> AnalysisError {
        let position = node.position();
        AnalysisError::UnsupportedConstruct {
            language: self.language,
            kind: what.to_string(),
            line: position.line,
            column: position.column,
        }
    }

    /// Left fold `operands` into nested binary operations. The outermost
    /// operation is the current node, inner ones are forked so that every
    /// operation's AST children are exactly its two operands.
    pub fn fold_binary(
        &mut self,
        node: &'c CstNode,
        operator: &str,
        operands: Vec<Operand<'c>>,
    ) -> Result<NodeKind> {
        if operands.len() < 2 {
            return Err(self.unsupported_at(node, node.kind));
        }
        let inner_count = operands.len() - 2;
        let mut chain = Vec::with_capacity(inner_count);
        let mut parent = self.id;
        for _ in 0..inner_count {
            let inner = self.fork(parent, node);
            chain.push(inner);
            parent = inner;
        }

        let mut operands = operands.into_iter();
        let mut left = match operands.next() {
            Some(first) => self.place(parent, node, first),
            None => return Err(self.unsupported_at(node, node.kind)),
        };
        for id in chain.iter().rev() {
            let Some(operand) = operands.next() else { break };
            let right = self.place(*id, node, operand);
            self.fill(
                *id,
                NodeKind::BinaryOperation {
                    operator: operator.to_string(),
                    left,
                    right,
                },
            );
            left = *id;
        }
        let last = operands
            .next()
            .ok_or_else(|| self.unsupported_at(node, node.kind))?;
        let right = self.place(self.id, node, last);
        Ok(NodeKind::BinaryOperation {
            operator: operator.to_string(),
            left,
            right,
        })
    }

    /// String with interpolated expressions: `"<raw>" + e1 + e2 ...`.
    pub fn interpolated(
        &mut self,
        node: &'c CstNode,
        raw: String,
        parts: Vec<&'c CstNode>,
    ) -> Result<NodeKind> {
        let literal = NodeKind::Literal {
            value: raw,
            literal_kind: LiteralKind::Template,
        };
        if parts.is_empty() {
            return Ok(literal);
        }
        let mut operands = vec![Operand::Synthetic(literal)];
        operands.extend(parts.into_iter().map(Operand::Cst));
        self.fold_binary(node, "+", operands)
    }

    fn place(&mut self, parent: NodeId, at: &'c CstNode, operand: Operand<'c>) -> NodeId {
        match operand {
            Operand::Cst(child) => self.lower_under(parent, child),
            Operand::Synthetic(kind) => self.synthetic(parent, at, kind),
        }
    }

    pub fn position(&self) -> Position {
        self.state.graph.position(self.id)
    }
}

/// Operand of a folded binary chain.
pub enum Operand<'c> {
    Cst(&'c CstNode),
    Synthetic(NodeKind),
}

/// Names bound by an assignment target or declaration pattern.
///
/// Identifiers bind themselves; member and subscript targets bind their full
/// text; destructuring patterns bind every identifier on their left sides.
pub(crate) fn binding_names(source: &str, target: &CstNode) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![target];
    while let Some(node) = stack.pop() {
        match node.kind {
            "identifier"
            | "shorthand_property_identifier_pattern"
            | "shorthand_property_identifier"
            | "this" => names.push(node.text(source).to_string()),
            "member_expression" | "subscript_expression" | "attribute" | "subscript" => names.push(
                node.text(source)
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect(),
            ),
            "pair_pattern" => stack.extend(node.child_by_field("value")),
            "assignment_pattern" | "object_assignment_pattern" => {
                stack.extend(node.child_by_field("left"))
            }
            "comment" | "type_annotation" => {}
            _ => {
                let children: Vec<&CstNode> = node.named_children().collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }
    names
}

/// Strip one layer of matching quotes.
pub(crate) fn unquote(s: &str) -> &str {
    for q in ['"', '\'', '`'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
