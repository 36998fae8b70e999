//! F034: non-cryptographic random number generators.

use super::{report, ALL_LANGUAGES};
use crate::error::Result;
use crate::eval::{EvalRegistry, EvalSession, RuleArgs};
use crate::ir::{LabelType, NodeKind};
use crate::rules::{Dispatcher, FindingId, Match};

const TRIGGER: &str = "weak_random";

pub(super) fn register_overrides(registry: &mut EvalRegistry) {
    registry.add_override(
        FindingId::F034,
        ALL_LANGUAGES,
        LabelType::MethodInvocation,
        mark_generator,
    );
}

pub(super) fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register(FindingId::F034, ALL_LANGUAGES, scan);
}

fn mark_generator(args: &mut RuleArgs<'_>) -> Result<()> {
    if let NodeKind::MethodInvocation { expression, .. } = args.kind() {
        if args.rules.triggers.matches(expression) {
            args.eval.triggers.insert(TRIGGER.to_string());
        }
    }
    Ok(())
}

/// Every live call to a generator is a match, whatever its arguments.
fn scan(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
    let triggers = &session.rules().triggers;
    let candidates: Vec<_> = session
        .graph()
        .nodes_of(LabelType::MethodInvocation)
        .into_iter()
        .filter_map(|id| match session.graph().kind(id) {
            NodeKind::MethodInvocation { expression, .. } if triggers.matches(expression) => {
                Some((id, expression.clone()))
            }
            _ => None,
        })
        .collect();

    let mut matches = Vec::new();
    for (id, callee) in candidates {
        if !session.is_live(id) {
            continue;
        }
        if session.evaluate(id)?.has_trigger(TRIGGER) {
            matches.push(report(
                session.graph(),
                id,
                format!("Insecure randomness: `{callee}` is not a cryptographic generator"),
            ));
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{lines, run};
    use crate::ir::Language;
    use crate::rules::{FindingId, FindingOutcome};
    use pretty_assertions::assert_eq;

    #[cfg(feature = "javascript")]
    #[test]
    fn flags_math_random() {
        let code = "const token = Math.random().toString(36);\n";
        let outcome = run(FindingId::F034, Language::JavaScript, code);
        assert_eq!(lines(&outcome), vec![1]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn crypto_random_bytes_is_safe() {
        let code = "const token = crypto.randomBytes(16).toString('hex');\n";
        let outcome = run(FindingId::F034, Language::JavaScript, code);
        assert!(matches!(outcome, FindingOutcome::Safe));
    }

    #[cfg(feature = "python")]
    #[test]
    fn flags_each_python_call() {
        let code = "import random\na = random.random()\nb = random.randint(1, 6)\n";
        let outcome = run(FindingId::F034, Language::Python, code);
        assert_eq!(lines(&outcome), vec![2, 3]);
    }

    #[cfg(feature = "python")]
    #[test]
    fn unreachable_call_is_ignored() {
        let code = "def f():\n    return 1\n    random.random()\n";
        let outcome = run(FindingId::F034, Language::Python, code);
        assert!(matches!(outcome, FindingOutcome::Safe));
    }
}
