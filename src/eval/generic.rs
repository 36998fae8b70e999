//! Language-independent evaluation rules, one per label type.

use super::{EvalRegistry, RuleArgs};
use crate::error::Result;
use crate::ir::{LabelType, LiteralKind, NodeKind, Value};

/// Unary operators whose result is the operand's value.
const VALUE_PRESERVING_UNARY: &[&str] = &["await", "+", "...", "*", "**"];

pub fn register(registry: &mut EvalRegistry) {
    for label in LabelType::ALL {
        let rule: super::Rule = match label {
            LabelType::Unsupported => continue,
            LabelType::SymbolLookup => evaluate_lookup,
            LabelType::Literal => evaluate_literal,
            LabelType::UnaryExpression => evaluate_unary,
            LabelType::TernaryOperation => evaluate_ternary,
            LabelType::VariableDeclaration
            | LabelType::Assignment
            | LabelType::Parameter
            | LabelType::Using
            | LabelType::NamedArgument
            | LabelType::Pair
            | LabelType::Return
            | LabelType::Throw => evaluate_forward,
            // Binary operations, invocations, accesses, containers and
            // statements: OR of their dependencies, value unknown.
            _ => evaluate_join,
        };
        registry.set_generic(label, rule);
    }
}

fn evaluate_join(args: &mut RuleArgs<'_>) -> Result<()> {
    args.join_dependencies();
    Ok(())
}

fn evaluate_forward(args: &mut RuleArgs<'_>) -> Result<()> {
    args.forward_dependencies();
    if let NodeKind::Assignment { operator, .. } = args.kind() {
        if operator != "=" && operator != ":=" {
            args.eval.value = None;
        }
    }
    Ok(())
}

/// OR of the reaching definitions; a value only when a single definition
/// reaches.
fn evaluate_lookup(args: &mut RuleArgs<'_>) -> Result<()> {
    args.forward_dependencies();
    Ok(())
}

fn evaluate_literal(args: &mut RuleArgs<'_>) -> Result<()> {
    if let NodeKind::Literal {
        value,
        literal_kind,
    } = args.kind()
    {
        args.eval.value = literal_value(value, *literal_kind);
    }
    Ok(())
}

pub(crate) fn literal_value(text: &str, kind: LiteralKind) -> Option<Value> {
    match kind {
        LiteralKind::String | LiteralKind::Template | LiteralKind::Regex => {
            Some(Value::Str(text.to_string()))
        }
        LiteralKind::Number => parse_number(text).map(Value::Number),
        LiteralKind::Boolean => Some(Value::Bool(matches!(text, "true" | "True"))),
        LiteralKind::Null => Some(Value::Null),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let cleaned = cleaned.trim_end_matches(['n', 'j', 'J', 'l', 'L']);
    let lower = cleaned.to_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return i64::from_str_radix(oct, 8).ok().map(|n| n as f64);
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return i64::from_str_radix(bin, 2).ok().map(|n| n as f64);
    }
    lower.parse::<f64>().ok()
}

fn evaluate_unary(args: &mut RuleArgs<'_>) -> Result<()> {
    args.join_dependencies();
    if let NodeKind::UnaryExpression { operator, operand } = args.kind() {
        if VALUE_PRESERVING_UNARY.contains(&operator.as_str()) {
            args.eval.value = args.get(*operand).value;
        }
    }
    Ok(())
}

/// Either branch may be taken; the value is known only when both agree.
fn evaluate_ternary(args: &mut RuleArgs<'_>) -> Result<()> {
    args.join_dependencies();
    if let NodeKind::TernaryOperation {
        true_value,
        false_value,
        ..
    } = args.kind()
    {
        let (a, b) = (args.get(*true_value).value, args.get(*false_value).value);
        if a.is_some() && a == b {
            args.eval.value = a;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_label_but_unsupported_has_a_rule() {
        let mut registry = EvalRegistry::new();
        register(&mut registry);
        for label in LabelType::ALL {
            assert_eq!(
                registry.generic(label).is_some(),
                label != LabelType::Unsupported,
                "{label}"
            );
        }
    }

    #[test]
    fn numbers_in_source_notation() {
        assert_eq!(parse_number("1_024"), Some(1024.0));
        assert_eq!(parse_number("0x10"), Some(16.0));
        assert_eq!(parse_number("2048n"), Some(2048.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn literal_values() {
        assert_eq!(
            literal_value("md5", LiteralKind::String),
            Some(Value::Str("md5".into()))
        );
        assert_eq!(
            literal_value("True", LiteralKind::Boolean),
            Some(Value::Bool(true))
        );
        assert_eq!(literal_value("None", LiteralKind::Null), Some(Value::Null));
    }
}
