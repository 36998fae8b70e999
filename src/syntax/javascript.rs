//! Readers for the tree-sitter JavaScript grammar. The TypeScript table
//! starts from this one.

use super::{binding_names, unquote, Lowered, ReaderCtx, ReaderTable};
use crate::error::Result;
use crate::ir::{LiteralKind, NodeKind};
use crate::parser::CstNode;

pub fn table() -> ReaderTable {
    let mut t = ReaderTable::new();
    t.register(&["program"], read_program)
        .register(&["statement_block", "class_body"], read_block)
        .register(&["comment", "hash_bang_line"], read_comment)
        .register(
            &["empty_statement", "debugger_statement", "decorator"],
            read_pass,
        )
        .register(&["expression_statement", "parenthesized_expression"], read_inner)
        .register(&["else_clause", "finally_clause"], read_inner_body)
        .register(&["labeled_statement", "class_static_block"], read_labeled)
        .register(&["lexical_declaration", "variable_declaration"], read_declaration)
        .register(&["variable_declarator"], read_declarator)
        .register(&["field_definition"], read_field)
        .register(&["import_statement"], read_import)
        .register(&["export_statement"], read_export)
        .register(
            &[
                "function_declaration",
                "generator_function_declaration",
                "function_expression",
                "function",
                "generator_function",
                "arrow_function",
                "method_definition",
            ],
            read_function,
        )
        .register(&["formal_parameters"], read_parameters)
        .register(&["class_declaration", "class"], read_class)
        .register(&["if_statement"], read_if)
        .register(&["while_statement"], read_while)
        .register(&["do_statement"], read_do)
        .register(&["for_statement"], read_for)
        .register(&["for_in_statement"], read_for_in)
        .register(&["switch_statement"], read_switch)
        .register(&["switch_case", "switch_default"], read_switch_case)
        .register(&["return_statement"], read_return)
        .register(&["throw_statement"], read_throw)
        .register(&["break_statement"], read_break)
        .register(&["continue_statement"], read_continue)
        .register(&["try_statement"], read_try)
        .register(&["catch_clause"], read_catch)
        .register(&["call_expression"], read_call)
        .register(&["arguments"], read_arguments)
        .register(&["new_expression"], read_new)
        .register(&["member_expression"], read_member)
        .register(&["subscript_expression"], read_subscript)
        .register(
            &[
                "identifier",
                "property_identifier",
                "shorthand_property_identifier",
                "private_property_identifier",
                "this",
                "super",
                "meta_property",
            ],
            read_identifier,
        )
        .register(&["number"], read_number)
        .register(&["string"], read_string)
        .register(&["template_string"], read_template)
        .register(&["true", "false"], read_boolean)
        .register(&["null", "undefined"], read_null)
        .register(&["regex"], read_regex)
        .register(&["binary_expression"], read_binary)
        .register(
            &["unary_expression", "update_expression"],
            read_unary,
        )
        .register(
            &["await_expression", "spread_element", "yield_expression"],
            read_keyword_unary,
        )
        .register(&["ternary_expression"], read_ternary)
        .register(&["assignment_expression"], read_assignment)
        .register(&["augmented_assignment_expression"], read_augmented_assignment)
        .register(&["sequence_expression", "array"], read_array)
        .register(&["object"], read_object)
        .register(&["pair"], read_pair)
        .register(
            &[
                "jsx_element",
                "jsx_self_closing_element",
                "jsx_opening_element",
                "jsx_attribute",
                "jsx_fragment",
            ],
            read_jsx,
        )
        .register(&["jsx_expression"], read_jsx_expression);
    t
}

pub(super) fn read_program<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    ctx.lower_named_children(node);
    Ok(Lowered::Node(NodeKind::File))
}

pub(super) fn read_block<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    ctx.lower_named_children(node);
    Ok(Lowered::Node(NodeKind::StatementBlock))
}

pub(super) fn read_comment<'c>(
    _ctx: &mut ReaderCtx<'c, '_>,
    _node: &'c CstNode,
) -> Result<Lowered<'c>> {
    Ok(Lowered::Node(NodeKind::Comment))
}

pub(super) fn read_pass<'c>(
    _ctx: &mut ReaderCtx<'c, '_>,
    _node: &'c CstNode,
) -> Result<Lowered<'c>> {
    Ok(Lowered::Node(NodeKind::Pass))
}

/// Transparent wrappers around a single expression.
pub(super) fn read_inner<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let mut inner = node.named_children().filter(|c| c.kind != "comment");
    match (inner.next(), inner.next()) {
        (Some(only), None) => Ok(Lowered::Alias(only)),
        (None, _) => Ok(Lowered::Node(NodeKind::Pass)),
        (Some(_), Some(_)) => {
            ctx.lower_named_children(node);
            Ok(Lowered::Node(NodeKind::ArrayInitializer))
        }
    }
}

fn read_inner_body<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    match node.child_by_field("body") {
        Some(body) => Ok(Lowered::Alias(body)),
        None => read_inner(ctx, node),
    }
}

fn read_labeled<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(Lowered::Alias(ctx.field(node, "body")?))
}

/// `let a = 1, b = 2;` becomes a block of declarations.
fn read_declaration<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let declarators: Vec<&CstNode> = node
        .named_children()
        .filter(|c| c.kind == "variable_declarator")
        .collect();
    match declarators.as_slice() {
        [only] => Ok(Lowered::Alias(*only)),
        many => {
            for declarator in many.iter().copied() {
                ctx.lower(declarator);
            }
            Ok(Lowered::Node(NodeKind::StatementBlock))
        }
    }
}

pub(super) fn type_text(ctx: &ReaderCtx<'_, '_>, node: Option<&CstNode>) -> Option<String> {
    node.map(|t| ctx.text(t).trim_start_matches(':').trim().to_string())
}

fn read_declarator<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let name = ctx.field(node, "name")?;
    let variables = binding_names(ctx.source(), name);
    let variable_type = type_text(ctx, node.child_by_field("type"));
    let value = ctx.lower_opt(node.child_by_field("value"));
    Ok(Lowered::Node(NodeKind::VariableDeclaration {
        variables,
        variable_type,
        value,
    }))
}

pub(super) fn read_field<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let name = node
        .child_by_field("property")
        .or_else(|| node.child_by_field("name"))
        .ok_or_else(|| ctx.unsupported_at(node, "field_definition.property"))?;
    let variable_type = type_text(ctx, node.child_by_field("type"));
    let value = ctx.lower_opt(node.child_by_field("value"));
    Ok(Lowered::Node(NodeKind::VariableDeclaration {
        variables: vec![ctx.text(name).to_string()],
        variable_type,
        value,
    }))
}

fn read_import<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let module = node
        .child_by_field("source")
        .map(|s| unquote(ctx.text(s)).to_string())
        .unwrap_or_default();
    let names = node
        .child_of_kind("import_clause")
        .map(|clause| binding_names(ctx.source(), clause))
        .unwrap_or_default();
    Ok(Lowered::Node(NodeKind::Import { module, names }))
}

fn read_export<'c>(_ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    if let Some(inner) = node
        .child_by_field("declaration")
        .or_else(|| node.child_by_field("value"))
    {
        return Ok(Lowered::Alias(inner));
    }
    Ok(Lowered::Node(NodeKind::Pass))
}

pub(super) fn read_function<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let name = node.child_by_field("name").map(|n| ctx.text(n).to_string());
    let parameters = if let Some(params) = node.child_by_field("parameters") {
        Some(ctx.lower(params))
    } else if let Some(single) = node.child_by_field("parameter") {
        // `x => ...`
        let list = ctx.fork(ctx.id(), single);
        for name in binding_names(ctx.source(), single) {
            ctx.synthetic(
                list,
                single,
                NodeKind::Parameter {
                    name,
                    variable_type: None,
                    default: None,
                },
            );
        }
        ctx.fill(list, NodeKind::ParameterList);
        Some(list)
    } else {
        None
    };
    let body = ctx.lower_opt(node.child_by_field("body"));
    Ok(Lowered::Node(NodeKind::MethodDeclaration {
        name,
        parameters,
        body,
    }))
}

fn read_parameters<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let list = ctx.id();
    for param in node.named_children() {
        match param.kind {
            "comment" => {}
            "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
                for name in binding_names(ctx.source(), param) {
                    ctx.synthetic(
                        list,
                        param,
                        NodeKind::Parameter {
                            name,
                            variable_type: None,
                            default: None,
                        },
                    );
                }
            }
            "assignment_pattern" => {
                let left = ctx.field(param, "left")?;
                let right = ctx.field(param, "right")?;
                let names = binding_names(ctx.source(), left);
                let id = ctx.fork(list, param);
                let default = ctx.lower_under(id, right);
                ctx.fill(
                    id,
                    NodeKind::Parameter {
                        name: names.join(","),
                        variable_type: None,
                        default: Some(default),
                    },
                );
            }
            _ => {
                ctx.lower(param);
            }
        }
    }
    Ok(Lowered::Node(NodeKind::ParameterList))
}

pub(super) fn read_class<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let name = node.child_by_field("name").map(|n| ctx.text(n).to_string());
    let body = ctx.lower_opt(node.child_by_field("body"));
    Ok(Lowered::Node(NodeKind::ClassDeclaration { name, body }))
}

fn read_if<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let condition = ctx.lower(ctx.field(node, "condition")?);
    let true_branch = ctx.lower(ctx.field(node, "consequence")?);
    let false_branch = ctx.lower_opt(node.child_by_field("alternative"));
    Ok(Lowered::Node(NodeKind::If {
        condition,
        true_branch,
        false_branch,
    }))
}

fn read_while<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let condition = ctx.lower(ctx.field(node, "condition")?);
    let body = ctx.lower(ctx.field(node, "body")?);
    Ok(Lowered::Node(NodeKind::While { condition, body }))
}

fn read_do<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let body = ctx.lower(ctx.field(node, "body")?);
    let condition = ctx.lower(ctx.field(node, "condition")?);
    Ok(Lowered::Node(NodeKind::DoWhile { condition, body }))
}

/// Header slots that hold `;` alone are absent.
fn header_slot<'c>(node: &'c CstNode, fields: &[&str]) -> Option<&'c CstNode> {
    fields
        .iter()
        .find_map(|f| node.child_by_field(f))
        .filter(|c| c.named && c.kind != "empty_statement")
}

fn read_for<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let initializer = ctx.lower_opt(header_slot(node, &["initializer"]));
    let condition = ctx.lower_opt(header_slot(node, &["condition"]));
    let update = ctx.lower_opt(header_slot(node, &["increment", "update"]));
    let body = ctx.lower(ctx.field(node, "body")?);
    Ok(Lowered::Node(NodeKind::For {
        initializer,
        condition,
        update,
        body,
    }))
}

fn read_for_in<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let left = ctx.field(node, "left")?;
    let variables = binding_names(ctx.source(), left);
    let iterable = ctx.lower(ctx.field(node, "right")?);
    let body = ctx.lower(ctx.field(node, "body")?);
    Ok(Lowered::Node(NodeKind::ForEach {
        variables,
        iterable,
        body,
    }))
}

/// The switch body is flattened: sections are direct children of the switch.
fn read_switch<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let value = ctx.lower(ctx.field(node, "value")?);
    if let Some(body) = node.child_by_field("body") {
        for section in body
            .named_children()
            .filter(|c| c.kind == "switch_case" || c.kind == "switch_default")
        {
            ctx.lower(section);
        }
    }
    Ok(Lowered::Node(NodeKind::Switch { value }))
}

fn read_switch_case<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let case_value = ctx.lower_opt(node.child_by_field("value"));
    for statement in node.children_by_field("body") {
        ctx.lower(statement);
    }
    Ok(Lowered::Node(NodeKind::SwitchSection { case_value }))
}

fn read_return<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let value = ctx.lower_opt(node.named_children().find(|c| c.kind != "comment"));
    Ok(Lowered::Node(NodeKind::Return { value }))
}

fn read_throw<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let value = ctx.lower_opt(node.named_children().find(|c| c.kind != "comment"));
    Ok(Lowered::Node(NodeKind::Throw { value }))
}

pub(super) fn read_break<'c>(
    _ctx: &mut ReaderCtx<'c, '_>,
    _node: &'c CstNode,
) -> Result<Lowered<'c>> {
    Ok(Lowered::Node(NodeKind::Break))
}

pub(super) fn read_continue<'c>(
    _ctx: &mut ReaderCtx<'c, '_>,
    _node: &'c CstNode,
) -> Result<Lowered<'c>> {
    Ok(Lowered::Node(NodeKind::Continue))
}

fn read_try<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let body = ctx.lower(ctx.field(node, "body")?);
    ctx.lower_opt(node.child_by_field("handler"));
    let finalizer = ctx.lower_opt(node.child_by_field("finalizer"));
    Ok(Lowered::Node(NodeKind::Try { body, finalizer }))
}

fn read_catch<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let variable = node
        .child_by_field("parameter")
        .map(|p| binding_names(ctx.source(), p).join(","));
    let body = ctx.lower(ctx.field(node, "body")?);
    Ok(Lowered::Node(NodeKind::CatchClause { variable, body }))
}

/// The receiver of `a.b.c(x)` is `a.b`; plain calls have none unless the
/// callee is itself a computed expression.
fn read_call<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let function = ctx.field(node, "function")?;
    let expression = ctx.expression_text(function);
    let object = match function.kind {
        "identifier" | "import" | "super" => None,
        "member_expression" => ctx.lower_opt(function.child_by_field("object")),
        _ => Some(ctx.lower(function)),
    };
    let arguments = match node.child_by_field("arguments") {
        Some(args) if args.kind == "template_string" => {
            // Tagged template: the template is the single argument.
            let list = ctx.fork(ctx.id(), args);
            ctx.lower_under(list, args);
            ctx.fill(list, NodeKind::ArgumentList);
            Some(list)
        }
        other => ctx.lower_opt(other),
    };
    Ok(Lowered::Node(NodeKind::MethodInvocation {
        expression,
        object,
        arguments,
    }))
}

pub(super) fn read_arguments<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    for arg in node.named_children().filter(|c| c.kind != "comment") {
        ctx.lower(arg);
    }
    Ok(Lowered::Node(NodeKind::ArgumentList))
}

fn read_new<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let constructor = ctx.field(node, "constructor")?;
    let name = ctx.expression_text(constructor);
    let arguments = ctx.lower_opt(node.child_by_field("arguments"));
    Ok(Lowered::Node(NodeKind::ObjectCreation { name, arguments }))
}

fn read_member<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let expression = ctx.expression_text(node);
    let member = ctx.text(ctx.field(node, "property")?).to_string();
    let object = ctx.lower(ctx.field(node, "object")?);
    Ok(Lowered::Node(NodeKind::MemberAccess {
        expression,
        member,
        object,
    }))
}

fn read_subscript<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let expression = ctx.expression_text(node);
    let object = ctx.lower(ctx.field(node, "object")?);
    let index = ctx.lower(ctx.field(node, "index")?);
    Ok(Lowered::Node(NodeKind::ElementAccess {
        expression,
        object,
        index,
    }))
}

pub(super) fn read_identifier<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    Ok(Lowered::Node(NodeKind::SymbolLookup {
        symbol: ctx.text(node).to_string(),
    }))
}

pub(super) fn literal(value: &str, literal_kind: LiteralKind) -> Lowered<'static> {
    Lowered::Node(NodeKind::Literal {
        value: value.to_string(),
        literal_kind,
    })
}

fn read_number<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal(ctx.text(node), LiteralKind::Number))
}

fn read_string<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal(unquote(ctx.text(node)), LiteralKind::String))
}

fn read_template<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let raw = unquote(ctx.text(node)).to_string();
    let parts: Vec<&CstNode> = node
        .named_children()
        .filter(|c| c.kind == "template_substitution")
        .filter_map(|sub| sub.named_children().find(|c| c.kind != "comment"))
        .collect();
    Ok(Lowered::Node(ctx.interpolated(node, raw, parts)?))
}

fn read_boolean<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal(ctx.text(node), LiteralKind::Boolean))
}

fn read_null<'c>(_ctx: &mut ReaderCtx<'c, '_>, _node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal("null", LiteralKind::Null))
}

fn read_regex<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal(ctx.text(node), LiteralKind::Regex))
}

fn read_binary<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let operator = ctx.text(ctx.field(node, "operator")?).to_string();
    let left = ctx.lower(ctx.field(node, "left")?);
    let right = ctx.lower(ctx.field(node, "right")?);
    Ok(Lowered::Node(NodeKind::BinaryOperation {
        operator,
        left,
        right,
    }))
}

fn read_unary<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let operator = ctx.text(ctx.field(node, "operator")?).to_string();
    let operand = ctx.lower(ctx.field(node, "argument")?);
    Ok(Lowered::Node(NodeKind::UnaryExpression { operator, operand }))
}

/// `await x`, `...x`, `yield x`: the keyword is the operator.
fn read_keyword_unary<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let operator = match node.kind {
        "await_expression" => "await",
        "spread_element" => "...",
        _ => "yield",
    };
    match node.named_children().find(|c| c.kind != "comment") {
        Some(arg) => {
            let operand = ctx.lower(arg);
            Ok(Lowered::Node(NodeKind::UnaryExpression {
                operator: operator.into(),
                operand,
            }))
        }
        None => Ok(literal("null", LiteralKind::Null)),
    }
}

fn read_ternary<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let condition = ctx.lower(ctx.field(node, "condition")?);
    let true_value = ctx.lower(ctx.field(node, "consequence")?);
    let false_value = ctx.lower(ctx.field(node, "alternative")?);
    Ok(Lowered::Node(NodeKind::TernaryOperation {
        condition,
        true_value,
        false_value,
    }))
}

fn read_assignment<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let left = ctx.field(node, "left")?;
    let variables = binding_names(ctx.source(), left);
    let value = ctx.lower(ctx.field(node, "right")?);
    Ok(Lowered::Node(NodeKind::Assignment {
        variables,
        operator: "=".into(),
        value,
    }))
}

/// `x += y` becomes `x = x + y` with a synthetic binary operation.
pub(super) fn read_augmented_assignment<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let left = ctx.field(node, "left")?;
    let right = ctx.field(node, "right")?;
    let operator = ctx.text(ctx.field(node, "operator")?).to_string();
    let variables = binding_names(ctx.source(), left);

    let value = ctx.fork(ctx.id(), node);
    let kind = {
        let l = ctx.lower_under(value, left);
        let r = ctx.lower_under(value, right);
        NodeKind::BinaryOperation {
            operator: operator.trim_end_matches('=').to_string(),
            left: l,
            right: r,
        }
    };
    ctx.fill(value, kind);
    Ok(Lowered::Node(NodeKind::Assignment {
        variables,
        operator,
        value,
    }))
}

pub(super) fn read_array<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    for element in node.named_children().filter(|c| c.kind != "comment") {
        ctx.lower(element);
    }
    Ok(Lowered::Node(NodeKind::ArrayInitializer))
}

pub(super) fn read_object<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    for entry in node.named_children().filter(|c| c.kind != "comment") {
        ctx.lower(entry);
    }
    Ok(Lowered::Node(NodeKind::Object))
}

pub(super) fn read_pair<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let key = unquote(ctx.text(ctx.field(node, "key")?)).to_string();
    let value = ctx.lower(ctx.field(node, "value")?);
    Ok(Lowered::Node(NodeKind::Pair { key, value }))
}

/// JSX trees keep only the embedded expressions and nested elements.
fn read_jsx<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    for child in node.named_children().filter(|c| {
        matches!(
            c.kind,
            "jsx_element"
                | "jsx_self_closing_element"
                | "jsx_opening_element"
                | "jsx_attribute"
                | "jsx_expression"
                | "jsx_fragment"
        )
    }) {
        ctx.lower(child);
    }
    Ok(Lowered::Node(NodeKind::ArrayInitializer))
}

fn read_jsx_expression<'c>(
    _ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    match node.named_children().find(|c| c.kind != "comment") {
        Some(inner) => Ok(Lowered::Alias(inner)),
        None => Ok(literal("null", LiteralKind::Null)),
    }
}

#[cfg(all(test, feature = "javascript"))]
mod tests {
    use super::super::testing::*;
    use crate::ir::{Language, LabelType, NodeKind};

    fn js(code: &str) -> crate::ir::Graph {
        let graph = build(Language::JavaScript, "a.js", code);
        assert_tree(&graph);
        graph
    }

    #[test]
    fn lowers_member_call_with_receiver() {
        let graph = js("db.query(req.query.id);\n");
        let call = find(&graph, |k| matches!(k, NodeKind::MethodInvocation { .. }));
        let NodeKind::MethodInvocation { expression, object, arguments } = graph.kind(call) else {
            unreachable!()
        };
        assert_eq!(expression, "db.query");
        assert!(matches!(graph.kind(object.unwrap()), NodeKind::SymbolLookup { symbol } if symbol == "db"));
        let args = graph.ast_children(arguments.unwrap());
        assert_eq!(args.len(), 1);
        assert!(matches!(
            graph.kind(args[0]),
            NodeKind::MemberAccess { expression, member, .. } if expression == "req.query.id" && member == "id"
        ));
    }

    #[test]
    fn expression_statement_is_transparent() {
        let graph = js("foo();\n");
        let root = graph.root().unwrap();
        let children = graph.ast_children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(graph.label(children[0]), LabelType::MethodInvocation);
        assert_eq!(graph.node(children[0]).cst_kind, "call_expression");
    }

    #[test]
    fn multiple_declarators_become_block() {
        let graph = js("let a = 1, b = a;\n");
        assert_eq!(graph.nodes_of(LabelType::VariableDeclaration).len(), 2);
        assert_eq!(graph.nodes_of(LabelType::StatementBlock).len(), 1);
    }

    #[test]
    fn template_string_folds_substitutions() {
        let graph = js("const q = `SELECT ${a} AND ${b}`;\n");
        let bins = graph.nodes_of(LabelType::BinaryOperation);
        assert_eq!(bins.len(), 2);
        for bin in bins {
            assert_eq!(graph.ast_children(bin).len(), 2);
        }
    }

    #[test]
    fn arrow_function_single_parameter() {
        let graph = js("const f = x => x + 1;\n");
        let param = find(&graph, |k| matches!(k, NodeKind::Parameter { .. }));
        assert!(matches!(graph.kind(param), NodeKind::Parameter { name, .. } if name == "x"));
        assert_eq!(graph.nodes_of(LabelType::ParameterList).len(), 1);
    }

    #[test]
    fn switch_sections_are_flattened() {
        let graph = js("switch (x) { case 1: a(); break; default: b(); }\n");
        let switch = find(&graph, |k| matches!(k, NodeKind::Switch { .. }));
        let sections: Vec<_> = graph
            .ast_children(switch)
            .into_iter()
            .filter(|c| graph.label(*c) == LabelType::SwitchSection)
            .collect();
        assert_eq!(sections.len(), 2);
        assert!(matches!(graph.kind(sections[1]), NodeKind::SwitchSection { case_value: None }));
    }

    #[test]
    fn destructuring_binds_every_name() {
        let graph = js("const { a, b: c } = obj;\n");
        let decl = find(&graph, |k| matches!(k, NodeKind::VariableDeclaration { .. }));
        let NodeKind::VariableDeclaration { variables, .. } = graph.kind(decl) else {
            unreachable!()
        };
        assert_eq!(variables, &vec!["a".to_string(), "c".to_string()]);
    }
}
