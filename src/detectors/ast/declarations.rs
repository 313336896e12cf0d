//! detectors/ast/declarations.rs
//!
//! Collects function-like declarations with their line ranges.
//!
//! Three shapes are recognized in every supported language:
//! - standalone named functions
//! - closures/lambdas bound directly to a variable (named after the binding)
//! - methods inside a class-like construct, named `Class.method`
//!
//! Nested declarations are recorded independently, so ranges may nest.

use tree_sitter::{Node, Tree};

use crate::detectors::ast::ast::{field_text, line_range, node_text};
use crate::detectors::language::Language;
use crate::state::{Declaration, DeclarationKind};

pub const ANONYMOUS: &str = "anonymous";
pub const ANONYMOUS_CLASS: &str = "AnonymousClass";

/// Initializer kinds that make a variable binding a declaration.
const ES_FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

pub fn index_declarations(tree: &Tree, source: &str, lang: Language) -> Vec<Declaration> {
    let mut out = Vec::new();
    visit(tree.root_node(), source, lang, None, &mut out);
    out
}

fn visit(node: Node, source: &str, lang: Language, class: Option<&str>, out: &mut Vec<Declaration>) {
    let step = if lang.is_ecmascript() {
        ecmascript(node, source, class)
    } else {
        match lang {
            Language::Python => python(node, source, class),
            _ => rust(node, source, class),
        }
    };

    if let Some((name, kind)) = step.declaration {
        let (start_line, end_line) = line_range(node);
        out.push(Declaration {
            name,
            start_line,
            end_line,
            kind,
        });
    }

    let child_class = match &step.scope {
        Scope::Inherit => class,
        Scope::Class(name) => Some(name.as_str()),
        Scope::Function => None,
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, lang, child_class, out);
    }
}

/* ============================================================
   Per-node decisions
   ============================================================ */

/// What a node contributes and what class context its children see.
struct Step {
    declaration: Option<(String, DeclarationKind)>,
    scope: Scope,
}

enum Scope {
    Inherit,
    Class(String),
    Function,
}

impl Step {
    fn inherit() -> Self {
        Step {
            declaration: None,
            scope: Scope::Inherit,
        }
    }

    fn function_body() -> Self {
        Step {
            declaration: None,
            scope: Scope::Function,
        }
    }

    fn declares(name: String, kind: DeclarationKind) -> Self {
        Step {
            declaration: Some((name, kind)),
            scope: Scope::Function,
        }
    }

    fn class(name: &str) -> Self {
        Step {
            declaration: None,
            scope: Scope::Class(name.to_string()),
        }
    }

    /// A function-like node: a method inside a class context, a plain
    /// function otherwise.
    fn function_or_method(name: &str, class: Option<&str>) -> Self {
        match class {
            Some(c) => Step::declares(format!("{c}.{name}"), DeclarationKind::Method),
            None => Step::declares(name.to_string(), DeclarationKind::Function),
        }
    }
}

fn ecmascript(node: Node, source: &str, class: Option<&str>) -> Step {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            let name = field_text(node, "name", source).unwrap_or(ANONYMOUS);
            Step::declares(name.to_string(), DeclarationKind::Function)
        }

        "variable_declarator" => {
            let bound = node
                .child_by_field_name("value")
                .is_some_and(|v| ES_FUNCTION_VALUES.contains(&v.kind()));
            if !bound {
                return Step::inherit();
            }
            Step::declares(binding_name(node, "name", "identifier", source), DeclarationKind::ArrowBound)
        }

        "class_declaration" | "abstract_class_declaration" | "class" => {
            Step::class(field_text(node, "name", source).unwrap_or(ANONYMOUS_CLASS))
        }

        // Object-literal methods are not class members.
        "method_definition" => match class {
            Some(c) => {
                let name = field_text(node, "name", source).unwrap_or(ANONYMOUS);
                Step::declares(format!("{c}.{name}"), DeclarationKind::Method)
            }
            None => Step::function_body(),
        },

        // `export default function () {}` and `export default () => {}`.
        "arrow_function" | "function_expression" | "function" | "generator_function" => {
            if node.parent().is_some_and(|p| p.kind() == "export_statement") {
                let name = field_text(node, "name", source).unwrap_or(ANONYMOUS);
                Step::declares(name.to_string(), DeclarationKind::Function)
            } else {
                Step::function_body()
            }
        }

        _ => Step::inherit(),
    }
}

fn python(node: Node, source: &str, class: Option<&str>) -> Step {
    match node.kind() {
        "function_definition" => {
            let name = field_text(node, "name", source).unwrap_or(ANONYMOUS);
            Step::function_or_method(name, class)
        }

        "class_definition" => Step::class(field_text(node, "name", source).unwrap_or(ANONYMOUS_CLASS)),

        "assignment" => {
            let bound = node
                .child_by_field_name("right")
                .is_some_and(|v| v.kind() == "lambda");
            if !bound {
                return Step::inherit();
            }
            Step::declares(binding_name(node, "left", "identifier", source), DeclarationKind::ArrowBound)
        }

        "lambda" => Step::function_body(),

        _ => Step::inherit(),
    }
}

fn rust(node: Node, source: &str, class: Option<&str>) -> Step {
    match node.kind() {
        "function_item" => {
            let name = field_text(node, "name", source).unwrap_or(ANONYMOUS);
            Step::function_or_method(name, class)
        }

        "impl_item" => {
            let ty = field_text(node, "type", source)
                .map(|t| t.split('<').next().unwrap_or(t).trim())
                .unwrap_or(ANONYMOUS_CLASS);
            Step::class(ty)
        }

        "trait_item" => Step::class(field_text(node, "name", source).unwrap_or(ANONYMOUS_CLASS)),

        "let_declaration" => {
            let bound = node
                .child_by_field_name("value")
                .is_some_and(|v| v.kind() == "closure_expression");
            if !bound {
                return Step::inherit();
            }
            Step::declares(binding_name(node, "pattern", "identifier", source), DeclarationKind::ArrowBound)
        }

        "closure_expression" => Step::function_body(),

        _ => Step::inherit(),
    }
}

/// Name of a variable binding; destructuring patterns are anonymous.
fn binding_name(node: Node, field: &str, identifier_kind: &str, source: &str) -> String {
    node.child_by_field_name(field)
        .filter(|n| n.kind() == identifier_kind)
        .and_then(|n| node_text(n, source))
        .unwrap_or(ANONYMOUS)
        .to_string()
}
