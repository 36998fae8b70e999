//! F052: broken algorithms, weak APIs, weak curves, old protocols and short
//! keys.
//!
//! Shapes reported:
//! - calls or member reads of an API that is weak by itself (`hashlib.md5`,
//!   `crypto.createCipher`, `AES.MODE_ECB`), names a small curve
//!   (`ec.SECP192R1`) or a broken protocol (`ssl.PROTOCOL_TLSv1`);
//! - an algorithm-selecting call whose first argument evaluates to a weak
//!   algorithm or curve name, directly or through variables;
//! - option entries such as `namedCurve` or `secureProtocol` whose value
//!   evaluates to a weak curve or protocol;
//! - a key generation call asking for fewer than [`MIN_KEY_BITS`] bits.

use super::{positional_arguments, report, ALL_LANGUAGES};
use crate::error::Result;
use crate::eval::{EvalRegistry, EvalSession, RuleArgs};
use crate::ir::{Graph, LabelType, LiteralKind, NodeId, NodeKind};
use crate::rules::catalog::RuleSet;
use crate::rules::{Dispatcher, FindingId, Match};

const WEAK_API: &str = "weak_crypto_api";
const ALGORITHM_PREFIX: &str = "algorithm:";
const CURVE_PREFIX: &str = "curve:";
const PROTOCOL_PREFIX: &str = "protocol:";
pub const MIN_KEY_BITS: f64 = 2048.0;
const KEY_SIZE_NAMES: [&str; 3] = ["key_size", "modulusLength", "bits"];
const CURVE_OPTIONS: [&str; 2] = ["namedCurve", "curve"];
const PROTOCOL_OPTIONS: [&str; 5] = [
    "secureProtocol",
    "minVersion",
    "maxVersion",
    "ssl_version",
    "protocol",
];

pub(super) fn register_overrides(registry: &mut EvalRegistry) {
    registry.add_override(FindingId::F052, ALL_LANGUAGES, LabelType::Literal, mark_literal);
    for label in [
        LabelType::MethodInvocation,
        LabelType::MemberAccess,
        LabelType::ObjectCreation,
    ] {
        registry.add_override(FindingId::F052, ALL_LANGUAGES, label, mark_weak_api);
    }
}

pub(super) fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register(FindingId::F052, ALL_LANGUAGES, scan);
}

fn mark_literal(args: &mut RuleArgs<'_>) -> Result<()> {
    if let NodeKind::Literal {
        value,
        literal_kind: LiteralKind::String,
    } = args.kind()
    {
        let lowered = value.to_lowercase();
        for (matcher, prefix) in [
            (&args.rules.insecure_literals, ALGORITHM_PREFIX),
            (&args.rules.weak_curves, CURVE_PREFIX),
            (&args.rules.weak_protocols, PROTOCOL_PREFIX),
        ] {
            if matcher.matches(value) {
                args.eval.triggers.insert(format!("{prefix}{lowered}"));
            }
        }
    }
    Ok(())
}

fn mark_weak_api(args: &mut RuleArgs<'_>) -> Result<()> {
    if let Some(name) = api_name(args.kind()) {
        if weakness(args.rules, name).is_some() {
            args.eval.triggers.insert(WEAK_API.to_string());
        }
    }
    Ok(())
}

fn api_name(kind: &NodeKind) -> Option<&str> {
    match kind {
        NodeKind::MethodInvocation { expression, .. } | NodeKind::MemberAccess { expression, .. } => {
            Some(expression)
        }
        NodeKind::ObjectCreation { name, .. } => Some(name),
        _ => None,
    }
}

/// Why an API name is weak by itself, if it is. Curve classes are matched
/// on their last segment so `ec.SECP192R1` and `SECP192R1` both count.
fn weakness(rules: &RuleSet, name: &str) -> Option<&'static str> {
    if rules.triggers.matches(name) {
        Some("is broken or weak")
    } else if rules.weak_protocols.matches(name) {
        Some("selects a broken protocol version")
    } else if name
        .rsplit('.')
        .next()
        .is_some_and(|last| rules.weak_curves.matches(last))
    {
        Some("uses a curve under 224 bits")
    } else {
        None
    }
}

enum Candidate {
    WeakApi {
        at: NodeId,
        name: String,
        reason: &'static str,
    },
    Configured {
        at: NodeId,
        name: String,
        arguments: NodeId,
    },
    OptionEntry {
        at: NodeId,
        key: String,
        value: NodeId,
        prefix: &'static str,
    },
}

fn candidates(session: &EvalSession<'_>) -> Vec<Candidate> {
    let rules = session.rules();
    let graph = session.graph();
    let mut found = Vec::new();
    for id in graph.node_ids() {
        let kind = graph.kind(id);
        if let Some((key, value)) = option_entry(kind) {
            let prefix = if CURVE_OPTIONS.contains(&key) {
                Some(CURVE_PREFIX)
            } else if PROTOCOL_OPTIONS.contains(&key) {
                Some(PROTOCOL_PREFIX)
            } else {
                None
            };
            if let Some(prefix) = prefix {
                found.push(Candidate::OptionEntry {
                    at: id,
                    key: key.to_string(),
                    value,
                    prefix,
                });
            }
            continue;
        }
        let Some(name) = api_name(kind) else {
            continue;
        };
        if let Some(reason) = weakness(rules, name) {
            found.push(Candidate::WeakApi {
                at: id,
                name: name.to_string(),
                reason,
            });
            continue;
        }
        let arguments = match kind {
            NodeKind::MethodInvocation { arguments, .. }
            | NodeKind::ObjectCreation { arguments, .. } => *arguments,
            _ => None,
        };
        if let Some(arguments) = arguments.filter(|_| rules.sinks.matches(name)) {
            found.push(Candidate::Configured {
                at: id,
                name: name.to_string(),
                arguments,
            });
        }
    }
    found
}

fn option_entry(kind: &NodeKind) -> Option<(&str, NodeId)> {
    match kind {
        NodeKind::NamedArgument { name, value } => Some((name, *value)),
        NodeKind::Pair { key, value } => Some((key, *value)),
        _ => None,
    }
}

/// Arguments that name a key size: keyword arguments or option object
/// entries called `key_size`, `modulusLength` or `bits`.
fn key_size_arguments(graph: &Graph, arguments: NodeId) -> Vec<NodeId> {
    graph
        .ast_descendants(arguments)
        .into_iter()
        .filter_map(|id| match graph.kind(id) {
            NodeKind::NamedArgument { name, value } if KEY_SIZE_NAMES.contains(&name.as_str()) => {
                Some(*value)
            }
            NodeKind::Pair { key, value } if KEY_SIZE_NAMES.contains(&key.as_str()) => {
                Some(*value)
            }
            _ => None,
        })
        .collect()
}

fn scan(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
    let mut matches = Vec::new();
    for candidate in candidates(session) {
        match candidate {
            Candidate::WeakApi { at, name, reason } => {
                if session.is_live(at) && session.evaluate(at)?.has_trigger(WEAK_API) {
                    matches.push(report(
                        session.graph(),
                        at,
                        format!("Insecure cryptography: `{name}` {reason}"),
                    ));
                }
            }
            Candidate::OptionEntry {
                at,
                key,
                value,
                prefix,
            } => {
                if !session.is_live(at) {
                    continue;
                }
                let evaluation = session.evaluate(value)?;
                if let Some(weak) = evaluation.triggers.iter().find_map(|t| t.strip_prefix(prefix)) {
                    matches.push(report(
                        session.graph(),
                        at,
                        format!("Insecure cryptography: `{key}` is set to weak `{weak}`"),
                    ));
                }
            }
            Candidate::Configured {
                at,
                name,
                arguments,
            } => {
                if !session.is_live(at) {
                    continue;
                }
                let positional = positional_arguments(session.graph(), arguments);
                let mut key_sizes = key_size_arguments(session.graph(), arguments);
                if let Some(first) = positional.first() {
                    let evaluation = session.evaluate(*first)?;
                    let weak = evaluation.triggers.iter().find_map(|t| {
                        t.strip_prefix(ALGORITHM_PREFIX)
                            .map(|a| ("algorithm", a))
                            .or_else(|| t.strip_prefix(CURVE_PREFIX).map(|c| ("curve", c)))
                    });
                    if let Some((what, weak)) = weak {
                        matches.push(report(
                            session.graph(),
                            at,
                            format!("Insecure cryptography: `{name}` uses weak {what} `{weak}`"),
                        ));
                        continue;
                    }
                    key_sizes.insert(0, *first);
                }
                for size_node in key_sizes {
                    let bits = session.evaluate(size_node)?.value.and_then(|v| v.as_number());
                    if let Some(bits) = bits.filter(|b| *b < MIN_KEY_BITS) {
                        matches.push(report(
                            session.graph(),
                            at,
                            format!(
                                "Insecure cryptography: `{name}` generates a {bits}-bit key, below {MIN_KEY_BITS}"
                            ),
                        ));
                        break;
                    }
                }
            }
        }
    }
    Ok(matches)
}
