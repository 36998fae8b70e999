//! Taint sources and sanitizers shared by the injection findings.

use super::ALL_LANGUAGES;
use crate::error::Result;
use crate::eval::{EvalRegistry, RuleArgs};
use crate::ir::{LabelType, NodeKind};
use crate::rules::FindingId;

const TAINT_FINDINGS: [FindingId; 4] = [
    FindingId::F001,
    FindingId::F004,
    FindingId::F008,
    FindingId::F063,
];

pub(super) fn register(registry: &mut EvalRegistry) {
    for finding in TAINT_FINDINGS {
        for label in [
            LabelType::MemberAccess,
            LabelType::ElementAccess,
            LabelType::MethodInvocation,
            LabelType::SymbolLookup,
        ] {
            registry.add_override(finding, ALL_LANGUAGES, label, mark_source);
        }
        for label in [LabelType::MethodInvocation, LabelType::ObjectCreation] {
            registry.add_override(finding, ALL_LANGUAGES, label, apply_sanitizer);
        }
    }
}

fn mark_source(args: &mut RuleArgs<'_>) -> Result<()> {
    let name = match args.kind() {
        NodeKind::MemberAccess { expression, .. }
        | NodeKind::ElementAccess { expression, .. }
        | NodeKind::MethodInvocation { expression, .. } => expression,
        NodeKind::SymbolLookup { symbol } => symbol,
        _ => return Ok(()),
    };
    if args.rules.sources.matches(name) {
        args.eval.danger = true;
    }
    Ok(())
}

fn apply_sanitizer(args: &mut RuleArgs<'_>) -> Result<()> {
    let name = match args.kind() {
        NodeKind::MethodInvocation { expression, .. } => expression,
        NodeKind::ObjectCreation { name, .. } => name,
        _ => return Ok(()),
    };
    if args.rules.sanitizers.matches(name) {
        args.eval.danger = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::cfg::tests::with_cfg;
    use crate::eval::tests::{call, first_argument};
    use crate::eval::Evaluator;
    use crate::ir::Language;
    use crate::rules::FindingId;

    fn argument_danger(language: Language, file: &str, code: &str, sink: &str) -> bool {
        let mut graph = with_cfg(language, file, code);
        let arg = first_argument(&graph, call(&graph, sink));
        let evaluator = Evaluator::standard();
        let mut session = evaluator.session(&mut graph, FindingId::F001);
        session.evaluate(arg).unwrap().danger
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn express_request_fields_are_sources() {
        assert!(argument_danger(
            Language::JavaScript,
            "a.js",
            "use(req.params['id']);\n",
            "use"
        ));
        assert!(argument_danger(
            Language::JavaScript,
            "a.js",
            "const { name } = req.body;\nuse(`hi ${name}`);\n",
            "use"
        ));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn sanitizers_clear_taint() {
        assert!(!argument_danger(
            Language::JavaScript,
            "a.js",
            "const id = parseInt(req.query.id);\nuse(id);\n",
            "use"
        ));
    }

    #[cfg(feature = "python")]
    #[test]
    fn flask_request_is_a_source() {
        assert!(argument_danger(
            Language::Python,
            "a.py",
            "from flask import request\nname = request.args.get('name')\nuse(name)\n",
            "use"
        ));
        assert!(!argument_danger(
            Language::Python,
            "a.py",
            "uid = int(request.args['id'])\nuse(uid)\n",
            "use"
        ));
    }
}
