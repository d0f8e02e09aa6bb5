// Detectors that only need the plain syntax tree

use super::Finding;
use crate::analyzers::python::parser::{has_token, named_children, node_line, SyntaxTree};
use tree_sitter::Node;

const INTROSPECTION_CALLS: &[&str] = &["globals", "locals", "vars", "dir"];
const DYNAMIC_EXECUTION_CALLS: &[&str] = &["eval", "exec"];

fn findings_for<F>(tree: &SyntaxTree, mut matcher: F) -> Vec<Finding>
where
    F: FnMut(Node<'_>, &SyntaxTree) -> Option<String>,
{
    tree.nodes()
        .into_iter()
        .filter_map(|node| matcher(node, tree).map(|message| (node_line(node), message)))
        .collect()
}

pub fn detect_generator_delegation(tree: &SyntaxTree) -> Vec<Finding> {
    findings_for(tree, |node, _| {
        (node.kind() == "yield" && has_token(node, "from"))
            .then(|| "'yield from' statement is not fully supported in Cython".to_string())
    })
}

pub fn detect_async_control_flow(tree: &SyntaxTree) -> Vec<Finding> {
    findings_for(tree, |node, _| {
        let construct = match node.kind() {
            "function_definition" => "function",
            "for_statement" => "for loop",
            "with_statement" => "with block",
            _ => return None,
        };
        has_token(node, "async").then(|| {
            format!(
                "Async/await syntax (async {}) is not fully supported in Cython",
                construct
            )
        })
    })
}

/// `x: int = 0` as a statement. Parameter and return annotations are not statements.
pub fn detect_annotation_statements(tree: &SyntaxTree) -> Vec<Finding> {
    findings_for(tree, |node, _| {
        (node.kind() == "assignment" && node.child_by_field_name("type").is_some())
            .then(|| "Type annotations may not be fully supported in Cython".to_string())
    })
}

/// Name of a plainly called function (`name(...)`), ignoring attribute calls.
fn called_name<'t>(node: Node<'_>, tree: &'t SyntaxTree) -> Option<&'t str> {
    if node.kind() != "call" {
        return None;
    }
    let function = node.child_by_field_name("function")?;
    (function.kind() == "identifier").then(|| tree.text(function))
}

pub fn detect_runtime_introspection(tree: &SyntaxTree) -> Vec<Finding> {
    findings_for(tree, |node, tree| {
        called_name(node, tree)
            .filter(|name| INTROSPECTION_CALLS.contains(name))
            .map(|name| {
                format!(
                    "Introspection function '{}' may not work as expected in Cython",
                    name
                )
            })
    })
}

pub fn detect_dynamic_code_execution(tree: &SyntaxTree) -> Vec<Finding> {
    findings_for(tree, |node, tree| {
        called_name(node, tree)
            .filter(|name| DYNAMIC_EXECUTION_CALLS.contains(name))
            .map(|name| format!("'{}' function may not be supported in Cython", name))
    })
}

/// `except:` with no exception type. `except*` always names a type.
pub fn detect_bare_except(tree: &SyntaxTree) -> Vec<Finding> {
    findings_for(tree, |node, _| {
        if node.kind() != "except_clause" {
            return None;
        }
        let typed = named_children(node)
            .iter()
            .any(|child| child.kind() != "block");
        (!typed).then(|| "Bare 'except:' clause may behave differently in Cython".to_string())
    })
}
