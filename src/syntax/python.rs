//! Readers for the tree-sitter Python grammar.

use super::javascript::{
    literal, read_array, read_block, read_break, read_comment, read_continue, read_identifier,
    read_inner, read_object, read_pair, read_pass, type_text,
};
use super::{binding_names, unquote, Lowered, Operand, ReaderCtx, ReaderTable};
use crate::error::Result;
use crate::ir::{LiteralKind, NodeId, NodeKind};
use crate::parser::CstNode;

pub fn table() -> ReaderTable {
    let mut t = ReaderTable::new();
    t.register(&["module"], read_module)
        .register(&["block"], read_block)
        .register(&["comment"], read_comment)
        .register(
            &[
                "pass_statement",
                "global_statement",
                "nonlocal_statement",
                "assert_statement",
                "delete_statement",
                "future_import_statement",
                "ellipsis",
                "print_statement",
                "exec_statement",
                "type_alias_statement",
            ],
            read_pass,
        )
        .register(&["expression_statement", "parenthesized_expression"], read_inner)
        .register(&["decorated_definition"], read_decorated)
        .register(&["function_definition", "lambda"], read_function)
        .register(&["parameters", "lambda_parameters"], read_parameters)
        .register(&["class_definition"], read_class)
        .register(&["import_statement"], read_import)
        .register(&["import_from_statement"], read_import_from)
        .register(&["assignment"], read_assignment)
        .register(&["augmented_assignment"], read_augmented_assignment)
        .register(&["named_expression"], read_named_expression)
        .register(&["if_statement"], read_if)
        .register(&["else_clause", "finally_clause"], read_clause_body)
        .register(&["while_statement"], read_while)
        .register(&["match_statement"], read_match)
        .register(&["for_statement"], read_for)
        .register(&["try_statement"], read_try)
        .register(&["except_clause", "except_group_clause"], read_except)
        .register(&["with_statement"], read_with)
        .register(&["return_statement"], read_return)
        .register(&["raise_statement"], read_raise)
        .register(&["break_statement"], read_break)
        .register(&["continue_statement"], read_continue)
        .register(&["call"], read_call)
        .register(&["argument_list"], read_arguments)
        .register(&["keyword_argument"], read_keyword_argument)
        .register(&["attribute"], read_attribute)
        .register(&["subscript"], read_subscript)
        .register(&["identifier"], read_identifier)
        .register(&["integer", "float"], read_number)
        .register(&["string"], read_string)
        .register(&["concatenated_string"], read_concatenated_string)
        .register(&["true", "false"], read_boolean)
        .register(&["none"], read_none)
        .register(&["binary_operator", "boolean_operator"], read_binary)
        .register(&["comparison_operator"], read_comparison)
        .register(&["not_operator"], read_not)
        .register(&["unary_operator"], read_unary)
        .register(&["await", "yield"], read_keyword_unary)
        .register(
            &["list_splat", "dictionary_splat", "list_splat_pattern"],
            read_splat,
        )
        .register(&["conditional_expression"], read_conditional)
        .register(
            &[
                "list",
                "tuple",
                "set",
                "expression_list",
                "pattern_list",
                "list_comprehension",
                "set_comprehension",
                "dictionary_comprehension",
                "generator_expression",
            ],
            read_array,
        )
        .register(&["for_in_clause"], read_for_in_clause)
        .register(&["if_clause"], read_inner)
        .register(&["dictionary"], read_object)
        .register(&["pair"], read_pair)
        .register(&["slice"], read_array);
    t
}

fn read_module<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    ctx.lower_named_children(node);
    Ok(Lowered::Node(NodeKind::File))
}

fn read_decorated<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(Lowered::Alias(ctx.field(node, "definition")?))
}

fn read_function<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let name = node.child_by_field("name").map(|n| ctx.text(n).to_string());
    let parameters = ctx.lower_opt(node.child_by_field("parameters"));
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
        let (name_node, type_node, default_node) = match param.kind {
            "comment" | "keyword_separator" | "positional_separator" => continue,
            "identifier" => (Some(param), None, None),
            "typed_parameter" => (
                param.named_children().find(|c| c.kind != "type"),
                param.child_by_field("type"),
                None,
            ),
            "default_parameter" | "typed_default_parameter" => (
                param.child_by_field("name"),
                param.child_by_field("type"),
                param.child_by_field("value"),
            ),
            // *args, **kwargs
            _ => (Some(param), None, None),
        };
        let name = name_node
            .map(|n| binding_names(ctx.source(), n).join(","))
            .unwrap_or_default();
        let variable_type = type_text(ctx, type_node);
        let id = ctx.fork(list, param);
        let default = default_node.map(|d| ctx.lower_under(id, d));
        ctx.fill(
            id,
            NodeKind::Parameter {
                name,
                variable_type,
                default,
            },
        );
    }
    Ok(Lowered::Node(NodeKind::ParameterList))
}

fn read_class<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let name = node.child_by_field("name").map(|n| ctx.text(n).to_string());
    let body = ctx.lower_opt(node.child_by_field("body"));
    Ok(Lowered::Node(NodeKind::ClassDeclaration { name, body }))
}

fn read_import<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let names: Vec<String> = node
        .children_by_field("name")
        .map(|n| ctx.text(n).to_string())
        .collect();
    let module = names.first().cloned().unwrap_or_default();
    Ok(Lowered::Node(NodeKind::Import { module, names }))
}

fn read_import_from<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let module = node
        .child_by_field("module_name")
        .map(|m| ctx.text(m).to_string())
        .unwrap_or_default();
    let names = node
        .children_by_field("name")
        .map(|n| ctx.text(n).to_string())
        .collect();
    Ok(Lowered::Node(NodeKind::Import { module, names }))
}

/// `x = v` binds; `x: T` alone only declares.
fn read_assignment<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let left = ctx.field(node, "left")?;
    let variables = binding_names(ctx.source(), left);
    let variable_type = type_text(ctx, node.child_by_field("type"));
    match node.child_by_field("right") {
        Some(right) if variable_type.is_none() => {
            let value = ctx.lower(right);
            Ok(Lowered::Node(NodeKind::Assignment {
                variables,
                operator: "=".into(),
                value,
            }))
        }
        right => {
            let value = ctx.lower_opt(right);
            Ok(Lowered::Node(NodeKind::VariableDeclaration {
                variables,
                variable_type,
                value,
            }))
        }
    }
}

fn read_augmented_assignment<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let left = ctx.field(node, "left")?;
    let right = ctx.field(node, "right")?;
    let operator = ctx.text(ctx.field(node, "operator")?).to_string();
    let variables = binding_names(ctx.source(), left);

    let value = ctx.fork(ctx.id(), node);
    let l = ctx.lower_under(value, left);
    let r = ctx.lower_under(value, right);
    ctx.fill(
        value,
        NodeKind::BinaryOperation {
            operator: operator.trim_end_matches('=').to_string(),
            left: l,
            right: r,
        },
    );
    Ok(Lowered::Node(NodeKind::Assignment {
        variables,
        operator,
        value,
    }))
}

/// `(y := f())`
fn read_named_expression<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let name = ctx.text(ctx.field(node, "name")?).to_string();
    let value = ctx.lower(ctx.field(node, "value")?);
    Ok(Lowered::Node(NodeKind::Assignment {
        variables: vec![name],
        operator: ":=".into(),
        value,
    }))
}

/// `elif` clauses become nested `If` nodes, each the false branch of the
/// previous one.
fn read_if<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let condition = ctx.lower(ctx.field(node, "condition")?);
    let true_branch = ctx.lower(ctx.field(node, "consequence")?);

    let mut chain: Vec<(NodeId, NodeId, NodeId)> = vec![(ctx.id(), condition, true_branch)];
    let mut final_else = None;
    for alternative in node.children_by_field("alternative") {
        let parent = chain.last().map(|(id, _, _)| *id).unwrap_or(ctx.id());
        match alternative.kind {
            "elif_clause" => {
                let elif = ctx.fork(parent, alternative);
                let cond = ctx.lower_under(elif, ctx.field(alternative, "condition")?);
                let then = ctx.lower_under(elif, ctx.field(alternative, "consequence")?);
                chain.push((elif, cond, then));
            }
            _ => {
                final_else = Some(ctx.lower_under(parent, alternative));
            }
        }
    }

    for i in (1..chain.len()).rev() {
        let (id, condition, true_branch) = chain[i];
        let false_branch = chain.get(i + 1).map(|(next, _, _)| *next).or(final_else);
        ctx.fill(
            id,
            NodeKind::If {
                condition,
                true_branch,
                false_branch,
            },
        );
    }
    Ok(Lowered::Node(NodeKind::If {
        condition,
        true_branch,
        false_branch: chain.get(1).map(|(next, _, _)| *next).or(final_else),
    }))
}

fn read_clause_body<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    match node
        .child_by_field("body")
        .or_else(|| node.child_of_kind("block"))
    {
        Some(body) => Ok(Lowered::Alias(body)),
        None => Err(ctx.unsupported_at(node, &format!("{}.body", node.kind))),
    }
}

fn read_while<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let condition = ctx.lower(ctx.field(node, "condition")?);
    let body = ctx.lower(ctx.field(node, "body")?);
    Ok(Lowered::Node(NodeKind::While { condition, body }))
}

/// `match` lowers to a switch whose sections never fall through: each
/// case body is followed by a synthetic `break`.
fn read_match<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let subject = ctx.field(node, "subject")?;
    let value = ctx.lower(subject);
    let subject_name = (subject.kind == "identifier").then(|| ctx.text(subject).to_string());
    let clauses = node.child_by_field("body").unwrap_or(node);
    for clause in clauses.named_children().filter(|c| c.kind == "case_clause") {
        read_case_clause(ctx, clause, subject_name.as_deref())?;
    }
    Ok(Lowered::Node(NodeKind::Switch { value }))
}

const LITERAL_PATTERNS: &[&str] = &[
    "string",
    "concatenated_string",
    "integer",
    "float",
    "true",
    "false",
    "none",
];

fn read_case_clause<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    clause: &'c CstNode,
    subject: Option<&str>,
) -> Result<()> {
    let parent = ctx.id();
    let section = ctx.fork(parent, clause);
    let patterns: Vec<&'c CstNode> = clause
        .named_children()
        .filter(|c| c.kind == "case_pattern")
        .collect();
    let inner: Vec<&'c CstNode> = match patterns.as_slice() {
        [only] => only.named_children().collect(),
        _ => Vec::new(),
    };

    // Captured names, and whether each one binds the whole subject.
    let mut captures: Vec<(&'c CstNode, bool)> = Vec::new();
    let case_value = match (patterns.len(), inner.as_slice()) {
        // `case _:`
        (1, []) => None,
        (1, [literal]) if LITERAL_PATTERNS.contains(&literal.kind) => {
            Some(ctx.lower_under(section, *literal))
        }
        (1, [name]) if name.kind == "dotted_name" && ctx.text(name).contains('.') => {
            let symbol = ctx.text(name).to_string();
            Some(ctx.synthetic(section, *name, NodeKind::SymbolLookup { symbol }))
        }
        // `case name:` matches anything.
        (1, [name]) if name.kind == "dotted_name" => {
            captures.push((*name, true));
            None
        }
        _ => {
            for pattern in &patterns {
                captures.extend(pattern_captures(ctx, *pattern).into_iter().map(|c| (c, false)));
            }
            patterns.first().map(|p| ctx.lower_under(section, *p))
        }
    };

    for (capture, whole_subject) in captures {
        let name = ctx.text(capture).to_string();
        let declaration = ctx.fork(section, capture);
        let value = match subject {
            Some(symbol) if whole_subject => ctx.synthetic(
                declaration,
                capture,
                NodeKind::SymbolLookup {
                    symbol: symbol.to_string(),
                },
            ),
            // Part of the subject: left as a placeholder, so evaluating it
            // fails the finding instead of reading as clean.
            _ => ctx.fork(declaration, capture),
        };
        ctx.fill(
            declaration,
            NodeKind::VariableDeclaration {
                variables: vec![name],
                variable_type: None,
                value: Some(value),
            },
        );
    }

    let consequence = ctx.field(clause, "consequence")?;
    ctx.lower_under(section, consequence);
    ctx.synthetic(section, clause, NodeKind::Break);
    ctx.fill(section, NodeKind::SwitchSection { case_value });
    Ok(())
}

/// Names bound inside a structural pattern: bare names outside class
/// positions, `as` targets and star captures.
fn pattern_captures<'c>(ctx: &ReaderCtx<'c, '_>, pattern: &'c CstNode) -> Vec<&'c CstNode> {
    let mut captures = Vec::new();
    let mut stack = vec![pattern];
    while let Some(node) = stack.pop() {
        for child in node.named_children() {
            match child.kind {
                "dotted_name" if node.kind != "class_pattern" => {
                    if !ctx.text(child).contains('.') {
                        captures.push(child);
                    }
                }
                "as_pattern_target" => captures.push(child),
                "identifier" if node.kind == "splat_pattern" => captures.push(child),
                _ => stack.push(child),
            }
        }
    }
    captures.retain(|c| ctx.text(c) != "_");
    captures.sort_by_key(|c| c.span.start_byte);
    captures
}

fn read_for<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
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

fn read_try<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let body = ctx.lower(ctx.field(node, "body")?);
    let mut finalizer = None;
    for clause in node.named_children() {
        match clause.kind {
            "except_clause" | "except_group_clause" => {
                ctx.lower(clause);
            }
            "finally_clause" => finalizer = Some(ctx.lower(clause)),
            _ => {}
        }
    }
    Ok(Lowered::Node(NodeKind::Try { body, finalizer }))
}

/// `except E as e:` binds `e`.
fn read_except<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let alias = node
        .child_by_field("alias")
        .or_else(|| {
            node.child_of_kind("as_pattern")
                .and_then(|p| p.child_by_field("alias"))
        })
        .or_else(|| {
            // Older grammars: `except E as e` without fields.
            node.children
                .iter()
                .skip_while(|c| c.kind != "as")
                .find(|c| c.named)
        });
    let variable = alias.map(|a| binding_names(ctx.source(), a).join(","));
    let body = node
        .named_children()
        .filter(|c| c.kind == "block")
        .last()
        .ok_or_else(|| ctx.unsupported_at(node, "except_clause.block"))?;
    let body = ctx.lower(body);
    Ok(Lowered::Node(NodeKind::CatchClause { variable, body }))
}

/// `with open(p) as f:` binds `f` to the context value.
fn read_with<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let items: Vec<&CstNode> = node
        .child_of_kind("with_clause")
        .map(|clause| {
            clause
                .named_children()
                .filter(|c| c.kind == "with_item")
                .collect()
        })
        .unwrap_or_default();

    let mut variables = Vec::new();
    let mut values = Vec::new();
    for item in items {
        let value = ctx.field(item, "value")?;
        match value.kind {
            "as_pattern" => {
                if let Some(alias) = value.child_by_field("alias") {
                    variables.extend(binding_names(ctx.source(), alias));
                }
                let inner = value
                    .named_children()
                    .next()
                    .ok_or_else(|| ctx.unsupported_at(value, "as_pattern"))?;
                values.push(inner);
            }
            _ => values.push(value),
        }
    }

    let value = match values.as_slice() {
        [] => return Err(ctx.unsupported_at(node, "with_statement.with_item")),
        [single] => ctx.lower(*single),
        many => {
            let list = ctx.fork(ctx.id(), node);
            for v in many.iter().copied() {
                ctx.lower_under(list, v);
            }
            ctx.fill(list, NodeKind::ArrayInitializer);
            list
        }
    };
    let body = ctx.lower(ctx.field(node, "body")?);
    Ok(Lowered::Node(NodeKind::Using {
        variables,
        value,
        body,
    }))
}

fn read_return<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let value = ctx.lower_opt(node.named_children().find(|c| c.kind != "comment"));
    Ok(Lowered::Node(NodeKind::Return { value }))
}

fn read_raise<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let value = ctx.lower_opt(node.named_children().find(|c| c.kind != "comment"));
    Ok(Lowered::Node(NodeKind::Throw { value }))
}

fn read_call<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let function = ctx.field(node, "function")?;
    let expression = ctx.expression_text(function);
    let object = match function.kind {
        "identifier" => None,
        "attribute" => ctx.lower_opt(function.child_by_field("object")),
        _ => Some(ctx.lower(function)),
    };
    let arguments = match node.child_by_field("arguments") {
        Some(args) if args.kind == "generator_expression" => {
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

fn read_arguments<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    for arg in node.named_children().filter(|c| c.kind != "comment") {
        ctx.lower(arg);
    }
    Ok(Lowered::Node(NodeKind::ArgumentList))
}

fn read_keyword_argument<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let name = ctx.text(ctx.field(node, "name")?).to_string();
    let value = ctx.lower(ctx.field(node, "value")?);
    Ok(Lowered::Node(NodeKind::NamedArgument { name, value }))
}

fn read_attribute<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let expression = ctx.expression_text(node);
    let member = ctx.text(ctx.field(node, "attribute")?).to_string();
    let object = ctx.lower(ctx.field(node, "object")?);
    Ok(Lowered::Node(NodeKind::MemberAccess {
        expression,
        member,
        object,
    }))
}

fn read_subscript<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let expression = ctx.expression_text(node);
    let object = ctx.lower(ctx.field(node, "value")?);
    let index = ctx.lower(ctx.field(node, "subscript")?);
    Ok(Lowered::Node(NodeKind::ElementAccess {
        expression,
        object,
        index,
    }))
}

fn read_number<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal(ctx.text(node), LiteralKind::Number))
}

/// Plain strings are literals; f-strings fold their interpolations.
fn read_string<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let raw: String = node
        .children
        .iter()
        .filter(|c| c.kind == "string_content" || c.kind == "escape_sequence")
        .map(|c| ctx.text(c))
        .collect();
    let raw = if node.children.is_empty() {
        strip_prefix_quotes(ctx.text(node)).to_string()
    } else {
        raw
    };
    let parts: Vec<&CstNode> = node
        .children
        .iter()
        .filter(|c| c.kind == "interpolation")
        .filter_map(|i| {
            i.child_by_field("expression")
                .or_else(|| i.named_children().next())
        })
        .collect();
    if parts.is_empty() {
        return Ok(literal(&raw, LiteralKind::String));
    }
    Ok(Lowered::Node(ctx.interpolated(node, raw, parts)?))
}

fn strip_prefix_quotes(text: &str) -> &str {
    let body = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let body = body
        .strip_prefix("\"\"\"")
        .and_then(|b| b.strip_suffix("\"\"\""))
        .or_else(|| body.strip_prefix("'''").and_then(|b| b.strip_suffix("'''")))
        .unwrap_or(body);
    unquote(body)
}

fn read_concatenated_string<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let operands = node
        .named_children()
        .filter(|c| c.kind == "string")
        .map(Operand::Cst)
        .collect();
    Ok(Lowered::Node(ctx.fold_binary(node, "+", operands)?))
}

fn read_boolean<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal(&ctx.text(node).to_lowercase(), LiteralKind::Boolean))
}

fn read_none<'c>(_ctx: &mut ReaderCtx<'c, '_>, _node: &'c CstNode) -> Result<Lowered<'c>> {
    Ok(literal("null", LiteralKind::Null))
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

/// `a < b < c` keeps the first operator; all operands stay dependencies.
fn read_comparison<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let operator = node
        .children
        .iter()
        .find(|c| !c.named)
        .map(|c| ctx.text(c).to_string())
        .unwrap_or_else(|| "==".into());
    let operands = node
        .named_children()
        .filter(|c| c.kind != "comment")
        .map(Operand::Cst)
        .collect();
    Ok(Lowered::Node(ctx.fold_binary(node, &operator, operands)?))
}

fn read_not<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let operand = ctx.lower(ctx.field(node, "argument")?);
    Ok(Lowered::Node(NodeKind::UnaryExpression {
        operator: "not".into(),
        operand,
    }))
}

fn read_unary<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let operator = ctx.text(ctx.field(node, "operator")?).to_string();
    let operand = ctx.lower(ctx.field(node, "argument")?);
    Ok(Lowered::Node(NodeKind::UnaryExpression { operator, operand }))
}

fn read_keyword_unary<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    match node.named_children().find(|c| c.kind != "comment") {
        Some(arg) => {
            let operand = ctx.lower(arg);
            Ok(Lowered::Node(NodeKind::UnaryExpression {
                operator: node.kind.to_string(),
                operand,
            }))
        }
        None => Ok(literal("null", LiteralKind::Null)),
    }
}

fn read_splat<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let operator = if node.kind == "dictionary_splat" { "**" } else { "*" };
    let arg = node
        .named_children()
        .next()
        .ok_or_else(|| ctx.unsupported_at(node, node.kind))?;
    let operand = ctx.lower(arg);
    Ok(Lowered::Node(NodeKind::UnaryExpression {
        operator: operator.into(),
        operand,
    }))
}

/// `a if cond else b`
fn read_conditional<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let parts: Vec<&CstNode> = node.named_children().filter(|c| c.kind != "comment").collect();
    let [when_true, condition, when_false] = parts.as_slice() else {
        return Err(ctx.unsupported_at(node, "conditional_expression"));
    };
    let (when_true, condition, when_false) = (*when_true, *condition, *when_false);
    let true_value = ctx.lower(when_true);
    let condition = ctx.lower(condition);
    let false_value = ctx.lower(when_false);
    Ok(Lowered::Node(NodeKind::TernaryOperation {
        condition,
        true_value,
        false_value,
    }))
}

/// In comprehensions only the iterable can carry data in.
fn read_for_in_clause<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    Ok(Lowered::Alias(ctx.field(node, "right")?))
}

#[cfg(all(test, feature = "python"))]
mod tests {
    use super::super::testing::*;
    use crate::ir::{Language, LabelType, NodeKind};

    fn py(code: &str) -> crate::ir::Graph {
        let graph = build(Language::Python, "a.py", code);
        assert_tree(&graph);
        graph
    }

    #[test]
    fn elif_chain_nests_if_nodes() {
        let graph = py("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n");
        let ifs = graph.nodes_of(LabelType::If);
        assert_eq!(ifs.len(), 2);
        let NodeKind::If { false_branch, .. } = graph.kind(ifs[0]) else {
            unreachable!()
        };
        assert_eq!(*false_branch, Some(ifs[1]));
        let NodeKind::If { false_branch: last, .. } = graph.kind(ifs[1]) else {
            unreachable!()
        };
        assert_eq!(graph.label(last.unwrap()), LabelType::StatementBlock);
        assert_eq!(graph.ast_parent(ifs[1]), Some(ifs[0]));
    }

    #[test]
    fn f_string_interpolations_are_operands() {
        let graph = py("q = f\"SELECT {a} FROM t\"\n");
        let bin = find(&graph, |k| matches!(k, NodeKind::BinaryOperation { .. }));
        let children = graph.ast_children(bin);
        assert_eq!(children.len(), 2);
        assert!(matches!(graph.kind(children[1]), NodeKind::SymbolLookup { symbol } if symbol == "a"));
    }

    #[test]
    fn with_statement_binds_alias() {
        let graph = py("with open(path) as f:\n    data = f.read()\n");
        let using = find(&graph, |k| matches!(k, NodeKind::Using { .. }));
        let NodeKind::Using { variables, value, .. } = graph.kind(using) else {
            unreachable!()
        };
        assert_eq!(variables, &vec!["f".to_string()]);
        assert_eq!(graph.label(*value), LabelType::MethodInvocation);
    }

    #[test]
    fn parameters_with_defaults_and_types() {
        let graph = py("def handler(req, limit: int = 10, *args, **kwargs):\n    pass\n");
        let names: Vec<String> = graph
            .nodes_of(LabelType::Parameter)
            .into_iter()
            .filter_map(|id| match graph.kind(id) {
                NodeKind::Parameter { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["req", "limit", "args", "kwargs"]);
    }

    #[test]
    fn except_clause_binds_variable() {
        let graph = py("try:\n    run()\nexcept ValueError as e:\n    log(e)\nfinally:\n    done()\n");
        let catch = find(&graph, |k| matches!(k, NodeKind::CatchClause { .. }));
        assert!(matches!(
            graph.kind(catch),
            NodeKind::CatchClause { variable: Some(v), .. } if v == "e"
        ));
        let try_node = find(&graph, |k| matches!(k, NodeKind::Try { .. }));
        assert!(matches!(graph.kind(try_node), NodeKind::Try { finalizer: Some(_), .. }));
    }

    #[test]
    fn match_lowers_to_switch_without_fall_through() {
        let graph = py("match mode:\n    case 'a':\n        x = 1\n    case _:\n        x = 2\n");
        let switch = find(&graph, |k| matches!(k, NodeKind::Switch { .. }));
        let sections: Vec<_> = graph
            .ast_children(switch)
            .into_iter()
            .filter(|c| graph.label(*c) == LabelType::SwitchSection)
            .collect();
        assert_eq!(sections.len(), 2);
        assert!(matches!(
            graph.kind(sections[0]),
            NodeKind::SwitchSection { case_value: Some(v) } if graph.label(*v) == LabelType::Literal
        ));
        assert!(matches!(graph.kind(sections[1]), NodeKind::SwitchSection { case_value: None }));
        for section in sections {
            let last = *graph.ast_children(section).last().unwrap();
            assert_eq!(graph.label(last), LabelType::Break);
        }
    }

    #[test]
    fn capture_pattern_binds_the_subject() {
        let graph = py("match mode:\n    case other:\n        use(other)\n");
        let decl = find(&graph, |k| matches!(k, NodeKind::VariableDeclaration { .. }));
        let NodeKind::VariableDeclaration { variables, value: Some(value), .. } = graph.kind(decl) else {
            unreachable!()
        };
        assert_eq!(variables, &vec!["other".to_string()]);
        assert!(matches!(graph.kind(*value), NodeKind::SymbolLookup { symbol } if symbol == "mode"));
    }

    #[test]
    fn structural_pattern_captures_stay_opaque() {
        let code = "match point:\n    case Point(x=px, y=0):\n        use(px)\n";
        let graph = build_lenient(&crate::syntax::Readers::standard(), Language::Python, "a.py", code);
        assert_tree(&graph);
        assert_eq!(graph.unsupported().len(), 1);
        let decl = find(&graph, |k| matches!(k, NodeKind::VariableDeclaration { .. }));
        let NodeKind::VariableDeclaration { variables, value: Some(value), .. } = graph.kind(decl) else {
            unreachable!()
        };
        assert_eq!(variables, &vec!["px".to_string()]);
        assert_eq!(graph.label(*value), LabelType::Unsupported);
    }
}
