//! Built-in findings: evaluator overrides and entry points.

mod command_injection;
mod insecure_crypto;
mod path_traversal;
mod sources;
mod sql_injection;
mod weak_random;
mod xss;

use tracing::debug;

use super::{Dispatcher, Match};
use crate::error::Result;
use crate::eval::{EvalRegistry, EvalSession};
use crate::ir::{Graph, LabelType, Language, NodeId, NodeKind};

pub(crate) const ECMASCRIPT: &[Language] = &[Language::JavaScript, Language::TypeScript];
pub(crate) const ALL_LANGUAGES: &[Language] =
    &[Language::JavaScript, Language::TypeScript, Language::Python];

/// Overrides for every built-in finding.
pub fn register_overrides(registry: &mut EvalRegistry) {
    sources::register(registry);
    weak_random::register_overrides(registry);
    insecure_crypto::register_overrides(registry);
}

pub fn register_entry_points(dispatcher: &mut Dispatcher) {
    sql_injection::register(dispatcher);
    command_injection::register(dispatcher);
    xss::register(dispatcher);
    weak_random::register(dispatcher);
    insecure_crypto::register(dispatcher);
    path_traversal::register(dispatcher);
}

/// A sink and the node whose taint decides it.
pub(super) struct SinkUse {
    pub at: NodeId,
    pub input: NodeId,
    pub sink: String,
}

/// Calls and assignment targets named by the catalog's sinks, each paired
/// with the input that must stay clean: the first positional argument of a
/// call, the assigned value of a property write.
pub(super) fn sink_uses(session: &EvalSession<'_>) -> Vec<SinkUse> {
    let sinks = &session.rules().sinks;
    let graph = session.graph();
    let mut uses = Vec::new();
    for id in graph.node_ids() {
        match graph.kind(id) {
            NodeKind::MethodInvocation {
                expression: name,
                arguments,
                ..
            }
            | NodeKind::ObjectCreation {
                name, arguments, ..
            } if sinks.matches(name) => {
                let input = arguments
                    .and_then(|list| positional_arguments(graph, list).first().copied());
                if let Some(input) = input {
                    uses.push(SinkUse {
                        at: id,
                        input,
                        sink: name.clone(),
                    });
                }
            }
            NodeKind::Assignment {
                variables, value, ..
            } => {
                if let Some(target) = variables.iter().find(|v| sinks.matches(v)) {
                    uses.push(SinkUse {
                        at: id,
                        input: *value,
                        sink: target.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    uses
}

/// Report every live sink whose input is tainted.
pub(crate) fn sink_scan(session: &mut EvalSession<'_>, what: &str) -> Result<Vec<Match>> {
    scan_sink_uses(session, sink_uses(session), what)
}

pub(super) fn scan_sink_uses(
    session: &mut EvalSession<'_>,
    uses: Vec<SinkUse>,
    what: &str,
) -> Result<Vec<Match>> {
    let mut matches = Vec::new();
    for sink_use in uses {
        if !session.is_live(sink_use.at) {
            debug!(node = %sink_use.at, sink = %sink_use.sink, "sink in dead code");
            continue;
        }
        if session.evaluate(sink_use.input)?.danger {
            matches.push(report(
                session.graph(),
                sink_use.at,
                format!("{what}: user-controlled data reaches `{}`", sink_use.sink),
            ));
        }
    }
    Ok(matches)
}

/// Children of an argument list that are not keyword arguments.
pub(crate) fn positional_arguments(graph: &Graph, list: NodeId) -> Vec<NodeId> {
    graph
        .ast_children(list)
        .into_iter()
        .filter(|arg| graph.label(*arg) != LabelType::NamedArgument)
        .collect()
}

pub(crate) fn report(graph: &Graph, node: NodeId, description: String) -> Match {
    let position = graph.position(node);
    Match {
        node,
        line: position.line,
        column: position.column,
        description,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cfg::tests::with_cfg;
    use crate::eval::Evaluator;
    use crate::rules::{FindingId, FindingOutcome};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Run one finding over `code` with the standard tables.
    pub(crate) fn run(finding: FindingId, language: Language, code: &str) -> FindingOutcome {
        let file = match language {
            Language::Python => "t.py",
            Language::TypeScript => "t.ts",
            _ => "t.js",
        };
        let mut graph = with_cfg(language, file, code);
        Dispatcher::standard().run(finding, &mut graph, &Evaluator::standard())
    }

    pub(crate) fn lines(outcome: &FindingOutcome) -> Vec<usize> {
        match outcome {
            FindingOutcome::Failed(e) => panic!("finding failed: {e}"),
            other => other.matches().iter().map(|m| m.line).collect(),
        }
    }

    #[cfg(feature = "javascript")]
    const LOOP: &str = "let x = req.query.a;\nlet y;\nwhile (c) {\n  db.query(y);\n  y = x;\n  x = db.query(y);\n}\nconst z = req.body.z;\nconn.query('SELECT ' + z);\ndb.query('SELECT 1');\n";

    #[cfg(feature = "javascript")]
    fn located(matches: &[Match]) -> Vec<(usize, usize, String)> {
        let mut located: Vec<_> = matches
            .iter()
            .map(|m| (m.line, m.column, m.description.clone()))
            .collect();
        located.sort();
        located
    }

    #[cfg(feature = "javascript")]
    /// Sinks of `code` scanned in `order` (indexes into the sink list).
    fn scan_in_order(code: &str, order: &[usize]) -> Vec<(usize, usize, String)> {
        let mut graph = with_cfg(Language::JavaScript, "t.js", code);
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        let mut uses: Vec<Option<SinkUse>> = sink_uses(&session).into_iter().map(Some).collect();
        let ordered: Vec<SinkUse> = order.iter().filter_map(|i| uses[*i].take()).collect();
        located(&scan_sink_uses(&mut session, ordered, "SQL injection").unwrap())
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn repeated_runs_report_the_same_matches() {
        let first = run(FindingId::F001, Language::JavaScript, LOOP);
        let second = run(FindingId::F001, Language::JavaScript, LOOP);
        assert_eq!(located(first.matches()), located(second.matches()));
        assert_eq!(lines(&first), vec![4, 6, 9]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn reversed_sink_order_reports_the_same_matches() {
        let forward = located(run(FindingId::F001, Language::JavaScript, LOOP).matches());
        let count = {
            let mut graph = with_cfg(Language::JavaScript, "t.js", LOOP);
            let evaluator = Evaluator::standard();
            let session = evaluator.session(&mut graph, FindingId::F001);
            sink_uses(&session).len()
        };
        let reversed: Vec<usize> = (0..count).rev().collect();
        assert_eq!(scan_in_order(LOOP, &reversed), forward);
    }

    #[cfg(feature = "javascript")]
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn sink_order_does_not_change_matches(order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
            let expected = scan_in_order(LOOP, &[0, 1, 2, 3]);
            prop_assert_eq!(scan_in_order(LOOP, &order), expected);
        }
    }
}
