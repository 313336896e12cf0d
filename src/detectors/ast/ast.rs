//! detectors/ast/ast.rs
//!
//! Syntax tree access. One tree-sitter parser per language and thread.

use std::cell::RefCell;

use tree_sitter::{Language as Grammar, Node, Parser, Tree};

use crate::detectors::language::Language;
use crate::error::AnalysisError;

thread_local! {
    static JS_PARSER: RefCell<Option<Parser>> = RefCell::new(make_parser(tree_sitter_javascript::language()));
    static TS_PARSER: RefCell<Option<Parser>> = RefCell::new(make_parser(tree_sitter_typescript::language_typescript()));
    static TSX_PARSER: RefCell<Option<Parser>> = RefCell::new(make_parser(tree_sitter_typescript::language_tsx()));
    static PY_PARSER: RefCell<Option<Parser>> = RefCell::new(make_parser(tree_sitter_python::language()));
    static RS_PARSER: RefCell<Option<Parser>> = RefCell::new(make_parser(tree_sitter_rust::language()));
}

fn make_parser(grammar: Grammar) -> Option<Parser> {
    let mut p = Parser::new();
    p.set_language(&grammar).ok()?;
    Some(p)
}

/// Parse `source` with the grammar matching `file`'s extension.
pub fn parse_source(file: &str, source: &str) -> Result<Tree, AnalysisError> {
    let lang = Language::from_path(file).ok_or_else(|| AnalysisError::Parse {
        file: file.to_string(),
        reason: "unsupported language".into(),
    })?;

    let slot = match lang {
        // JSX is part of the javascript grammar.
        Language::JavaScript | Language::Jsx => &JS_PARSER,
        Language::TypeScript => &TS_PARSER,
        Language::Tsx => &TSX_PARSER,
        Language::Python => &PY_PARSER,
        Language::Rust => &RS_PARSER,
    };

    let tree = slot.with(|p| {
        p.borrow_mut()
            .as_mut()
            .and_then(|parser| parser.parse(source, None))
    });

    tree.ok_or_else(|| AnalysisError::Parse {
        file: file.to_string(),
        reason: format!("{lang} parser produced no tree"),
    })
}

pub fn node_text<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    node.utf8_text(source.as_bytes()).ok()
}

pub fn field_text<'a>(node: Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field)
        .and_then(|n| node_text(n, source))
}

/// 1-based inclusive line range of a node.
pub fn line_range(node: Node) -> (u32, u32) {
    let start = node.start_position().row as u32 + 1;
    let end = node.end_position().row as u32 + 1;
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_supported_language() {
        for (file, src) in [
            ("a.js", "function f() { return 1; }"),
            ("a.jsx", "const C = () => <div className=\"c\" />;"),
            ("a.ts", "function f(x: number): number { return x; }"),
            ("a.tsx", "const C = (): JSX.Element => <div />;"),
            ("a.py", "def f():\n    return 1\n"),
            ("a.rs", "fn f() -> u32 { 1 }"),
        ] {
            let tree = parse_source(file, src).unwrap();
            assert!(!tree.root_node().has_error(), "{file} parsed with errors");
        }
    }

    #[test]
    fn unsupported_files_are_parse_errors() {
        assert!(matches!(
            parse_source("notes.md", "# hi"),
            Err(AnalysisError::Parse { .. })
        ));
    }

    #[test]
    fn line_range_is_one_based() {
        let src = "\n\nfunction f() {\n  return 1;\n}\n";
        let tree = parse_source("a.js", src).unwrap();
        let f = tree.root_node().named_child(0).unwrap();
        assert_eq!(line_range(f), (3, 5));
    }
}
