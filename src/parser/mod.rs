//! Concrete syntax tree adapter.
//!
//! Wraps the tree-sitter grammars behind an owned, lifetime-free tree so the
//! rest of the pipeline never touches tree-sitter types. The adapter only
//! parses; it knows nothing about the graph IR.

use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::ir::{Language, Position};

/// Zero-based row/column as reported by the grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start: Point,
    pub end: Point,
}

/// One node of a concrete syntax tree.
#[derive(Debug, Clone)]
pub struct CstNode {
    pub kind: &'static str,
    /// False for anonymous tokens such as operators and punctuation.
    pub named: bool,
    /// Field name under which the parent holds this node.
    pub field: Option<&'static str>,
    pub span: Span,
    pub children: Vec<CstNode>,
    error: bool,
}

impl CstNode {
    pub fn child_by_field(&self, field: &str) -> Option<&CstNode> {
        self.children.iter().find(|c| c.field == Some(field))
    }

    pub fn children_by_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a CstNode> {
        self.children.iter().filter(move |c| c.field == Some(field))
    }

    pub fn named_children(&self) -> impl Iterator<Item = &CstNode> {
        self.children.iter().filter(|c| c.named)
    }

    pub fn first_named_child(&self) -> Option<&CstNode> {
        self.named_children().next()
    }

    pub fn child_of_kind(&self, kind: &str) -> Option<&CstNode> {
        self.children.iter().find(|c| c.kind == kind)
    }

    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.span.start_byte..self.span.end_byte)
            .unwrap_or("")
    }

    /// 1-based position of the node's first character.
    pub fn position(&self) -> Position {
        Position {
            line: self.span.start.row + 1,
            column: self.span.start.column + 1,
        }
    }

    fn first_error(&self) -> Option<&CstNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.error {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

// Deeply nested sources must not overflow the stack on drop.
impl Drop for CstNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// A parsed file: the source text and the tree over it.
#[derive(Debug, Clone)]
pub struct Cst {
    pub language: Language,
    pub source: String,
    pub root: CstNode,
}

impl Cst {
    /// Parse `source` with the grammar for `language`.
    ///
    /// Fails when the grammar is not compiled in or when the tree contains a
    /// syntax error; a partial tree is never handed to the builder.
    pub fn parse(language: Language, path: &Path, source: &str) -> Result<Self> {
        let grammar = grammar(language, path).ok_or_else(|| AnalysisError::Parse {
            file: path.display().to_string(),
            message: format!("no grammar available for {language}"),
        })?;

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| AnalysisError::Parse {
                file: path.display().to_string(),
                message: format!("Failed to load {language} grammar: {e}"),
            })?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalysisError::Parse {
                file: path.display().to_string(),
                message: format!("tree-sitter failed to parse {language}"),
            })?;

        let root = convert(&tree);
        if let Some(bad) = root.first_error() {
            let at = bad.position();
            return Err(AnalysisError::Parse {
                file: path.display().to_string(),
                message: format!("syntax error at {}:{}", at.line, at.column),
            });
        }

        Ok(Self {
            language,
            source: source.to_string(),
            root,
        })
    }

    pub fn text(&self, node: &CstNode) -> &str {
        node.text(&self.source)
    }
}

/// Grammar for a language, `None` when its feature is disabled.
#[allow(unused_variables)]
fn grammar(language: Language, path: &Path) -> Option<tree_sitter::Language> {
    match language {
        #[cfg(feature = "python")]
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        #[cfg(feature = "javascript")]
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        #[cfg(feature = "typescript")]
        Language::TypeScript => {
            let is_tsx = path.extension().is_some_and(|ext| ext == "tsx");
            let lang = if is_tsx {
                tree_sitter_typescript::LANGUAGE_TSX
            } else {
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT
            };
            Some(lang.into())
        }
        _ => None,
    }
}

/// Copy a tree-sitter tree into owned nodes with a cursor walk.
fn convert(tree: &tree_sitter::Tree) -> CstNode {
    let mut cursor = tree.walk();
    let mut stack = vec![leaf(cursor.node(), None)];

    loop {
        if cursor.goto_first_child() {
            stack.push(leaf(cursor.node(), cursor.field_name()));
            continue;
        }
        loop {
            let Some(done) = stack.pop() else {
                // The root is returned below before the stack can empty.
                return leaf(tree.root_node(), None);
            };
            let Some(parent) = stack.last_mut() else {
                return done;
            };
            parent.children.push(done);
            if cursor.goto_next_sibling() {
                stack.push(leaf(cursor.node(), cursor.field_name()));
                break;
            }
            cursor.goto_parent();
        }
    }
}

fn leaf(node: tree_sitter::Node, field: Option<&'static str>) -> CstNode {
    let start = node.start_position();
    let end = node.end_position();
    CstNode {
        kind: node.kind(),
        named: node.is_named(),
        field,
        span: Span {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start: Point {
                row: start.row,
                column: start.column,
            },
            end: Point {
                row: end.row,
                column: end.column,
            },
        },
        children: Vec::new(),
        error: node.is_error() || node.is_missing(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "javascript")]
    #[test]
    fn parses_javascript_with_fields() {
        let code = "const x = db.query(id);\n";
        let cst = Cst::parse(Language::JavaScript, Path::new("a.js"), code).unwrap();
        assert_eq!(cst.root.kind, "program");

        let decl = cst.root.first_named_child().unwrap();
        assert_eq!(decl.kind, "lexical_declaration");
        let declarator = decl.first_named_child().unwrap();
        let value = declarator.child_by_field("value").unwrap();
        assert_eq!(value.kind, "call_expression");
        assert_eq!(cst.text(value), "db.query(id)");
        assert_eq!(value.position(), Position { line: 1, column: 11 });
    }

    #[cfg(feature = "python")]
    #[test]
    fn parses_python_lines_one_based() {
        let code = "import os\n\nos.system(cmd)\n";
        let cst = Cst::parse(Language::Python, Path::new("a.py"), code).unwrap();
        let stmt = cst.root.named_children().nth(1).unwrap();
        assert_eq!(stmt.position().line, 3);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn syntax_error_is_reported() {
        let err = Cst::parse(Language::JavaScript, Path::new("bad.js"), "let = ;").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
    }

    #[cfg(feature = "typescript")]
    #[test]
    fn handles_tsx_file() {
        let code = "const el = <div>{name}</div>;\n";
        let cst = Cst::parse(Language::TypeScript, Path::new("a.tsx"), code).unwrap();
        assert_eq!(cst.root.kind, "program");
    }

    #[test]
    fn dropping_a_deep_tree_does_not_recurse() {
        let point = Point { row: 0, column: 0 };
        let node = |children| CstNode {
            kind: "parenthesized_expression",
            named: true,
            field: None,
            span: Span {
                start_byte: 0,
                end_byte: 0,
                start: point,
                end: point,
            },
            children,
            error: false,
        };
        let mut root = node(Vec::new());
        for _ in 0..200_000 {
            root = node(vec![root]);
        }
        assert!(root.first_error().is_none());
        drop(root);
    }

    #[test]
    fn unknown_language_has_no_grammar() {
        let err = Cst::parse(Language::Unknown, Path::new("a.rb"), "x = 1").unwrap_err();
        assert!(err.to_string().contains("no grammar"));
    }
}
