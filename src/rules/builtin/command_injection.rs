//! F004: tainted data reaching a process execution API.
//!
//! Python's `subprocess` functions only go through a shell when asked to;
//! an argument vector passed without `shell=True` cannot inject commands,
//! so those calls are skipped.

use super::{scan_sink_uses, sink_uses, ECMASCRIPT};
use crate::error::Result;
use crate::eval::EvalSession;
use crate::ir::{Graph, LabelType, Language, NodeId, NodeKind};
use crate::rules::{Dispatcher, FindingId, Match};

pub(super) fn register(dispatcher: &mut Dispatcher) {
    dispatcher
        .register(FindingId::F004, &[Language::Python], scan_python)
        .register(FindingId::F004, ECMASCRIPT, scan);
}

fn scan(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
    let uses = sink_uses(session);
    scan_sink_uses(session, uses, "Command injection")
}

fn scan_python(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
    let graph = session.graph();
    let uses = sink_uses(session)
        .into_iter()
        .filter(|u| !(is_argument_vector(graph, u.input) && !uses_shell(graph, u.at)))
        .collect();
    scan_sink_uses(session, uses, "Command injection")
}

fn is_argument_vector(graph: &Graph, input: NodeId) -> bool {
    graph.label(input) == LabelType::ArrayInitializer
}

/// `shell=` present and not a literal false value.
fn uses_shell(graph: &Graph, call: NodeId) -> bool {
    let NodeKind::MethodInvocation {
        arguments: Some(list),
        ..
    } = graph.kind(call)
    else {
        return false;
    };
    graph.ast_children(*list).into_iter().any(|arg| match graph.kind(arg) {
        NodeKind::NamedArgument { name, value } if name == "shell" => !matches!(
            graph.kind(*value),
            NodeKind::Literal { value, .. } if value == "false" || value == "null" || value == "0"
        ),
        _ => false,
    })
}
