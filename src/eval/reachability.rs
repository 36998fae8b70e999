//! Branch liveness.
//!
//! A node is live when some path of CFG predecessors leads from it back to
//! an entry (the file root or a function/class declaration) without taking
//! a conditional edge its condition rules out. Conditions are folded from
//! literals, the usual boolean/comparison operators and single-definition
//! variables.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::eval::generic::literal_value;
use crate::eval::symbols;
use crate::ir::{CfgEdge, Graph, LabelType, NodeId, NodeKind, Value};

#[derive(Debug, Default)]
pub struct Liveness {
    live: HashMap<NodeId, bool>,
    folded: HashMap<NodeId, Option<Value>>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&mut self, graph: &mut Graph, id: NodeId, max_search_nodes: usize) -> bool {
        let Some(start) = statement_of(graph, id) else {
            return false;
        };
        if let Some(known) = self.live.get(&start) {
            return *known;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        let mut live = false;
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            // Unproven dead code still gets checked.
            if visited.len() > max_search_nodes {
                tracing::debug!(node = start.0, "liveness budget exhausted, assuming live");
                live = true;
                break;
            }
            if self.live.get(&node) == Some(&true) {
                live = true;
                break;
            }
            let preds = graph.cfg_predecessors(node);
            if preds.is_empty() {
                if Some(node) == graph.root() || is_entry(graph.label(node)) {
                    live = true;
                    break;
                }
                continue;
            }
            for (pred, edge) in preds {
                if !self.edge_pruned(graph, pred, edge, max_search_nodes) {
                    queue.push_back(pred);
                }
            }
        }
        self.live.insert(start, live);
        live
    }

    /// A `True` edge whose condition folds to false, or the reverse.
    fn edge_pruned(&mut self, graph: &mut Graph, from: NodeId, edge: CfgEdge, max: usize) -> bool {
        if !edge.is_conditional() {
            return false;
        }
        let condition = match graph.kind(from) {
            NodeKind::If { condition, .. }
            | NodeKind::While { condition, .. }
            | NodeKind::DoWhile { condition, .. } => *condition,
            NodeKind::For {
                condition: Some(condition),
                ..
            } => *condition,
            _ => return false,
        };
        match self.fold(graph, condition, max) {
            Some(value) => value.truthy() != (edge == CfgEdge::True),
            None => false,
        }
    }

    /// Constant value of an expression, when it has one.
    pub fn fold(&mut self, graph: &mut Graph, id: NodeId, max: usize) -> Option<Value> {
        if let Some(known) = self.folded.get(&id) {
            return known.clone();
        }
        // Guard against self-referencing definitions while folding.
        self.folded.insert(id, None);
        let value = self.fold_uncached(graph, id, max);
        self.folded.insert(id, value.clone());
        value
    }

    fn fold_uncached(&mut self, graph: &mut Graph, id: NodeId, max: usize) -> Option<Value> {
        match graph.kind(id).clone() {
            NodeKind::Literal {
                value,
                literal_kind,
            } => literal_value(&value, literal_kind),
            NodeKind::UnaryExpression { operator, operand } => {
                let inner = self.fold(graph, operand, max)?;
                match operator.as_str() {
                    "!" | "not" => Some(Value::Bool(!inner.truthy())),
                    "-" => inner.as_number().map(|n| Value::Number(-n)),
                    _ => None,
                }
            }
            NodeKind::BinaryOperation {
                operator,
                left,
                right,
            } => {
                let l = self.fold(graph, left, max);
                let r = self.fold(graph, right, max);
                fold_binary(&operator, l, r)
            }
            NodeKind::SymbolLookup { .. } => {
                let defs = symbols::resolve(graph, id, max).ok()?;
                let [only] = defs.as_slice() else {
                    return None;
                };
                let value = match graph.kind(*only) {
                    NodeKind::VariableDeclaration { value, .. } => (*value)?,
                    NodeKind::Assignment {
                        value, operator, ..
                    } if operator == "=" => *value,
                    _ => return None,
                };
                self.fold(graph, value, max)
            }
            _ => None,
        }
    }
}

/// Nearest node in the control-flow layer containing `id`. `None` when the
/// enclosing statement was never threaded, e.g. code after a `return`.
fn statement_of(graph: &Graph, id: NodeId) -> Option<NodeId> {
    let mut current = id;
    loop {
        if graph.in_cfg(current) {
            return Some(current);
        }
        let parent = graph.ast_parent(current)?;
        if matches!(
            graph.label(parent),
            LabelType::StatementBlock | LabelType::File
        ) {
            return None;
        }
        current = parent;
    }
}

fn is_entry(label: LabelType) -> bool {
    matches!(
        label,
        LabelType::File | LabelType::MethodDeclaration | LabelType::ClassDeclaration
    )
}

fn fold_binary(operator: &str, left: Option<Value>, right: Option<Value>) -> Option<Value> {
    // Short-circuit operators decide on one side alone.
    match operator {
        "&&" | "and" => {
            return match (left, right) {
                (Some(l), _) if !l.truthy() => Some(Value::Bool(false)),
                (Some(_), Some(r)) => Some(Value::Bool(r.truthy())),
                (None, Some(r)) if !r.truthy() => Some(Value::Bool(false)),
                _ => None,
            }
        }
        "||" | "or" => {
            return match (left, right) {
                (Some(l), _) if l.truthy() => Some(Value::Bool(true)),
                (Some(_), Some(r)) => Some(Value::Bool(r.truthy())),
                (None, Some(r)) if r.truthy() => Some(Value::Bool(true)),
                _ => None,
            }
        }
        _ => {}
    }
    let (l, r) = (left?, right?);
    let value = match operator {
        "==" | "===" => Value::Bool(l == r),
        "!=" | "!==" => Value::Bool(l != r),
        "<" | "<=" | ">" | ">=" => {
            let (a, b) = (l.as_number()?, r.as_number()?);
            Value::Bool(match operator {
                "<" => a < b,
                "<=" => a <= b,
                ">" => a > b,
                _ => a >= b,
            })
        }
        "+" => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::Str(a), b) => Value::Str(format!("{a}{b}")),
            (a, Value::Str(b)) => Value::Str(format!("{a}{b}")),
            _ => return None,
        },
        _ => return None,
    };
    Some(value)
}
