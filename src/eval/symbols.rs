//! Symbol search over the control-flow layer.
//!
//! A lookup resolves to the definitions that reach it: starting from the
//! statement that contains the lookup, CFG predecessors are walked breadth
//! first, and each path stops at the first node that binds the symbol.
//! Results are cached on the graph as `Ctx` edges.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

use crate::error::{AnalysisError, Result};
use crate::ir::{Graph, LabelType, NodeId, NodeKind};

/// Definitions reaching the `SymbolLookup` node `lookup`, ordered by id.
///
/// Visiting more than `max_nodes` CFG nodes aborts the search; walking past
/// an unsupported construct fails it with `MissingCase`.
pub fn resolve(graph: &mut Graph, lookup: NodeId, max_nodes: usize) -> Result<Vec<NodeId>> {
    if graph.is_resolved(lookup) {
        return Ok(graph.ctx_targets(lookup));
    }
    let NodeKind::SymbolLookup { symbol } = graph.kind(lookup) else {
        return Ok(Vec::new());
    };
    let symbol = symbol.clone();

    let definitions = search(graph, lookup, &symbol, max_nodes)?;
    for definition in &definitions {
        graph.add_ctx_edge(lookup, *definition);
    }
    graph.mark_resolved(lookup);
    trace!(node = %lookup, symbol = %symbol, found = definitions.len(), "resolved symbol");
    Ok(definitions)
}

fn search(graph: &Graph, lookup: NodeId, symbol: &str, max_nodes: usize) -> Result<Vec<NodeId>> {
    let Some(start) = graph.first_cfg_parent(lookup) else {
        return Ok(Vec::new());
    };

    let mut found = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    enqueue_predecessors(graph, start, &mut queue);

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        if visited.len() > max_nodes {
            return Err(AnalysisError::Aborted {
                node: lookup,
                limit: "max_search_nodes",
                max: max_nodes,
            });
        }

        match graph.kind(node) {
            NodeKind::MethodDeclaration { parameters, .. } => {
                let bound = parameters
                    .map(|list| bound_parameters(graph, list, symbol))
                    .unwrap_or_default();
                if !bound.is_empty() {
                    found.extend(bound);
                } else if graph.cfg_predecessors(node).is_empty() {
                    // Function value: continue in the scope that created it.
                    if let Some(outer) = graph
                        .ast_parent(node)
                        .and_then(|parent| graph.first_cfg_parent(parent))
                    {
                        queue.push_back(outer);
                    }
                } else {
                    enqueue_predecessors(graph, node, &mut queue);
                }
            }
            // A placeholder may hide a definition.
            NodeKind::Unsupported { .. } => {
                return Err(AnalysisError::MissingCase {
                    node,
                    label_type: LabelType::Unsupported,
                })
            }
            NodeKind::For {
                initializer: Some(init),
                ..
            } if graph.kind(*init).defines(symbol) => found.push(*init),
            kind if kind.defines(symbol) => found.push(node),
            _ => enqueue_predecessors(graph, node, &mut queue),
        }
    }

    found.sort_unstable();
    found.dedup();
    Ok(found)
}

fn enqueue_predecessors(graph: &Graph, node: NodeId, queue: &mut VecDeque<NodeId>) {
    queue.extend(graph.cfg_predecessors(node).into_iter().map(|(pred, _)| pred));
}

fn bound_parameters(graph: &Graph, list: NodeId, symbol: &str) -> Vec<NodeId> {
    graph
        .ast_children(list)
        .into_iter()
        .filter(|p| {
            graph.label(*p) == LabelType::Parameter
                && match graph.kind(*p) {
                    // Destructured parameters bind several comma-joined names.
                    NodeKind::Parameter { name, .. } => name.split(',').any(|n| n == symbol),
                    _ => false,
                }
        })
        .collect()
}
