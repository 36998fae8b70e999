//! TypeScript readers: the JavaScript table plus type-level constructs.
//! Types never carry taint, so most of them lower to inert nodes.

use super::javascript::{self, read_class, read_field, read_pass, type_text};
use super::{binding_names, Lowered, ReaderCtx, ReaderTable};
use crate::error::Result;
use crate::ir::NodeKind;
use crate::parser::CstNode;

pub fn table() -> ReaderTable {
    let mut t = javascript::table();
    t.register(
        &[
            "as_expression",
            "satisfies_expression",
            "non_null_expression",
            "type_assertion",
            "instantiation_expression",
        ],
        read_type_wrapper,
    )
    .register(
        &[
            "type_alias_declaration",
            "interface_declaration",
            "enum_declaration",
        ],
        read_type_declaration,
    )
    .register(&["abstract_class_declaration"], read_class)
    .register(&["public_field_definition"], read_field)
    .register(&["required_parameter", "optional_parameter"], read_parameter)
    .register(&["internal_module", "module"], read_namespace)
    .register(
        &[
            "ambient_declaration",
            "import_alias",
            "function_signature",
            "method_signature",
            "abstract_method_signature",
            "index_signature",
            "property_signature",
        ],
        read_pass,
    );
    t
}

/// `x as T`, `x!`, `<T>x`: the value is the wrapped expression.
fn read_type_wrapper<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let inner = node
        .named_children()
        .find(|c| c.kind != "comment" && !is_type_node(c.kind))
        .ok_or_else(|| ctx.unsupported_at(node, node.kind))?;
    Ok(Lowered::Alias(inner))
}

fn is_type_node(kind: &str) -> bool {
    kind.ends_with("_type")
        || matches!(
            kind,
            "type_identifier" | "type_arguments" | "predefined_type" | "type_annotation"
        )
}

fn read_type_declaration<'c>(
    ctx: &mut ReaderCtx<'c, '_>,
    node: &'c CstNode,
) -> Result<Lowered<'c>> {
    let name = ctx.text(ctx.field(node, "name")?).to_string();
    Ok(Lowered::Node(NodeKind::TypeDeclaration { name }))
}

fn read_parameter<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let pattern = ctx.field(node, "pattern")?;
    let name = binding_names(ctx.source(), pattern).join(",");
    let variable_type = type_text(ctx, node.child_by_field("type"));
    let default = ctx.lower_opt(node.child_by_field("value"));
    Ok(Lowered::Node(NodeKind::Parameter {
        name,
        variable_type,
        default,
    }))
}

/// `namespace N { ... }` is treated like a class body.
fn read_namespace<'c>(ctx: &mut ReaderCtx<'c, '_>, node: &'c CstNode) -> Result<Lowered<'c>> {
    let name = node.child_by_field("name").map(|n| ctx.text(n).to_string());
    let body = ctx.lower_opt(node.child_by_field("body"));
    Ok(Lowered::Node(NodeKind::ClassDeclaration { name, body }))
}

#[cfg(all(test, feature = "typescript"))]
mod tests {
    use super::super::testing::*;
    use crate::ir::{Language, LabelType, NodeKind};

    #[test]
    fn typed_parameters_and_declarations() {
        let code = r#"
interface User { id: string }
type Id = string;
function load(id: string, limit: number = 10): void {
    const q: string = id as string;
    db.query(q!);
}
"#;
        let graph = build(Language::TypeScript, "a.ts", code);
        assert_tree(&graph);
        assert_eq!(graph.nodes_of(LabelType::TypeDeclaration).len(), 2);

        let params: Vec<_> = graph
            .nodes_of(LabelType::Parameter)
            .into_iter()
            .map(|id| graph.kind(id).clone())
            .collect();
        assert!(matches!(
            &params[0],
            NodeKind::Parameter { name, variable_type: Some(t), default: None } if name == "id" && t == "string"
        ));
        assert!(matches!(&params[1], NodeKind::Parameter { default: Some(_), .. }));

        let decl = find(&graph, |k| matches!(k, NodeKind::VariableDeclaration { .. }));
        let NodeKind::VariableDeclaration { variable_type, value, .. } = graph.kind(decl) else {
            unreachable!()
        };
        assert_eq!(variable_type.as_deref(), Some("string"));
        // `id as string` lowers straight to the identifier.
        assert_eq!(graph.label(value.unwrap()), LabelType::SymbolLookup);
    }

    #[test]
    fn class_with_typed_fields() {
        let code = "class Repo { private pool: Pool = makePool(); run(sql: string) { this.pool.query(sql); } }\n";
        let graph = build(Language::TypeScript, "a.ts", code);
        assert_tree(&graph);
        assert_eq!(graph.nodes_of(LabelType::ClassDeclaration).len(), 1);
        assert_eq!(graph.nodes_of(LabelType::MethodDeclaration).len(), 1);
        let field = find(&graph, |k| matches!(k, NodeKind::VariableDeclaration { .. }));
        assert!(matches!(
            graph.kind(field),
            NodeKind::VariableDeclaration { variables, .. } if variables == &vec!["pool".to_string()]
        ));
    }
}
