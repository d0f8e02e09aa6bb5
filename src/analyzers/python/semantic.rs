//! Class-level facts resolved from a parsed module.
//!
//! Detectors that need to know about base classes, metaclasses or the names a
//! class body binds depend only on [`SemanticTree`]. [`ModuleModel`] is the
//! tree-sitter backed implementation; it resolves metaclasses inherited from
//! classes defined in the same module and from a few well-known stdlib bases.

use super::parser::{named_children, node_line, SyntaxTree};
use std::collections::{BTreeSet, HashMap};
use tree_sitter::Node;

/// What the analyzer knows about one class statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFacts {
    pub name: String,
    pub line: usize,
    /// Positional base expressions as written.
    pub bases: Vec<String>,
    /// Metaclass given explicitly, via `__metaclass__`, or inherited.
    pub metaclass: Option<String>,
    /// Names bound directly in the class body.
    pub locals: BTreeSet<String>,
}

pub trait SemanticTree: Send + Sync {
    /// Every class statement in the module, nested ones included, in source order.
    fn classes(&self) -> &[ClassFacts];
}

/// Stdlib bases whose metaclass is not `type`.
const KNOWN_METACLASS_BASES: &[(&str, &str)] = &[
    ("ABC", "ABCMeta"),
    ("abc.ABC", "abc.ABCMeta"),
    ("Enum", "EnumMeta"),
    ("IntEnum", "EnumMeta"),
    ("StrEnum", "EnumMeta"),
    ("Flag", "EnumMeta"),
    ("IntFlag", "EnumMeta"),
    ("enum.Enum", "enum.EnumMeta"),
    ("enum.IntEnum", "enum.EnumMeta"),
];

#[derive(Debug, Clone, Default)]
pub struct ModuleModel {
    classes: Vec<ClassFacts>,
}

impl SemanticTree for ModuleModel {
    fn classes(&self) -> &[ClassFacts] {
        &self.classes
    }
}

impl ModuleModel {
    pub fn build(tree: &SyntaxTree) -> Self {
        let mut classes: Vec<ClassFacts> = tree
            .nodes()
            .into_iter()
            .filter(|node| node.kind() == "class_definition")
            .map(|node| class_facts(node, tree))
            .collect();
        resolve_inherited_metaclasses(&mut classes);
        Self { classes }
    }
}

fn class_facts(node: Node<'_>, tree: &SyntaxTree) -> ClassFacts {
    let name = node
        .child_by_field_name("name")
        .map(|n| tree.text(n).to_string())
        .unwrap_or_default();

    let mut bases = Vec::new();
    let mut metaclass = None;
    if let Some(arguments) = node.child_by_field_name("superclasses") {
        for argument in named_children(arguments) {
            match argument.kind() {
                "keyword_argument" => {
                    let key = argument.child_by_field_name("name").map(|n| tree.text(n));
                    if key == Some("metaclass") {
                        metaclass = argument
                            .child_by_field_name("value")
                            .map(|v| tree.text(v).to_string());
                    }
                }
                "dictionary_splat" => {}
                _ => bases.push(tree.text(argument).to_string()),
            }
        }
    }

    let mut locals = BTreeSet::new();
    let mut legacy_metaclass = None;
    if let Some(body) = node.child_by_field_name("body") {
        collect_bindings(body, tree, &mut locals, &mut legacy_metaclass);
    }

    ClassFacts {
        name,
        line: node_line(node),
        bases,
        metaclass: metaclass.or(legacy_metaclass),
        locals,
    }
}

/// Gather names bound by the statements of a class body. Nested function and
/// class bodies are separate scopes and are not entered.
fn collect_bindings(
    block: Node<'_>,
    tree: &SyntaxTree,
    locals: &mut BTreeSet<String>,
    legacy_metaclass: &mut Option<String>,
) {
    for statement in named_children(block) {
        match statement.kind() {
            "expression_statement" => {
                for expr in named_children(statement) {
                    bind_assignment(expr, tree, locals, legacy_metaclass);
                }
            }
            "function_definition" | "class_definition" => {
                if let Some(name) = statement.child_by_field_name("name") {
                    locals.insert(tree.text(name).to_string());
                }
            }
            "decorated_definition" => {
                if let Some(name) = statement
                    .child_by_field_name("definition")
                    .and_then(|def| def.child_by_field_name("name"))
                {
                    locals.insert(tree.text(name).to_string());
                }
            }
            "import_statement" | "import_from_statement" => {
                bind_imports(statement, tree, locals);
            }
            "if_statement" | "for_statement" | "while_statement" | "try_statement"
            | "with_statement" => {
                for child in named_children(statement) {
                    collect_clause(child, tree, locals, legacy_metaclass);
                }
            }
            _ => {}
        }
    }
}

fn collect_clause(
    node: Node<'_>,
    tree: &SyntaxTree,
    locals: &mut BTreeSet<String>,
    legacy_metaclass: &mut Option<String>,
) {
    match node.kind() {
        "block" => collect_bindings(node, tree, locals, legacy_metaclass),
        "elif_clause" | "else_clause" | "except_clause" | "finally_clause" => {
            for child in named_children(node) {
                if child.kind() == "block" {
                    collect_bindings(child, tree, locals, legacy_metaclass);
                }
            }
        }
        _ => {}
    }
}

fn bind_assignment(
    expr: Node<'_>,
    tree: &SyntaxTree,
    locals: &mut BTreeSet<String>,
    legacy_metaclass: &mut Option<String>,
) {
    if !matches!(expr.kind(), "assignment" | "augmented_assignment") {
        return;
    }
    if let Some(left) = expr.child_by_field_name("left") {
        let mut names = Vec::new();
        target_names(left, tree, &mut names);
        for name in names {
            if name == "__metaclass__" {
                *legacy_metaclass = expr
                    .child_by_field_name("right")
                    .map(|v| tree.text(v).to_string());
            }
            locals.insert(name);
        }
    }
    // `a = b = value` nests the second assignment on the right.
    if let Some(right) = expr.child_by_field_name("right") {
        bind_assignment(right, tree, locals, legacy_metaclass);
    }
}

fn target_names(target: Node<'_>, tree: &SyntaxTree, names: &mut Vec<String>) {
    match target.kind() {
        "identifier" => names.push(tree.text(target).to_string()),
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" => {
            for child in named_children(target) {
                target_names(child, tree, names);
            }
        }
        _ => {}
    }
}

fn bind_imports(statement: Node<'_>, tree: &SyntaxTree, locals: &mut BTreeSet<String>) {
    let module = statement.child_by_field_name("module_name");
    for child in named_children(statement) {
        if Some(child) == module {
            continue;
        }
        match child.kind() {
            "aliased_import" => {
                if let Some(alias) = child.child_by_field_name("alias") {
                    locals.insert(tree.text(alias).to_string());
                }
            }
            "dotted_name" => {
                let text = tree.text(child);
                let first = text.split('.').next().unwrap_or(text);
                locals.insert(first.to_string());
            }
            _ => {}
        }
    }
}

/// Propagate metaclasses from bases to subclasses until nothing changes.
fn resolve_inherited_metaclasses(classes: &mut [ClassFacts]) {
    loop {
        let known: HashMap<String, String> = classes
            .iter()
            .filter_map(|c| c.metaclass.clone().map(|m| (c.name.clone(), m)))
            .chain(
                KNOWN_METACLASS_BASES
                    .iter()
                    .map(|(base, meta)| (base.to_string(), meta.to_string())),
            )
            .collect();

        let mut changed = false;
        for class in classes.iter_mut().filter(|c| c.metaclass.is_none()) {
            if let Some(meta) = class.bases.iter().find_map(|base| known.get(base)) {
                class.metaclass = Some(meta.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::python::parser::parse_source;
    use indoc::indoc;

    fn model(source: &str) -> ModuleModel {
        ModuleModel::build(&parse_source(source).unwrap())
    }

    #[test]
    fn test_collects_bases_and_keyword_metaclass() {
        let m = model("class A(B, C, metaclass=Meta):\n    pass\n");
        let class = &m.classes()[0];
        assert_eq!(class.name, "A");
        assert_eq!(class.bases, vec!["B", "C"]);
        assert_eq!(class.metaclass.as_deref(), Some("Meta"));
    }

    #[test]
    fn test_dotted_bases_are_kept_verbatim() {
        let m = model("class Employee(models.Model):\n    name = 1\n");
        assert_eq!(m.classes()[0].bases, vec!["models.Model"]);
        assert!(m.classes()[0].metaclass.is_none());
    }

    #[test]
    fn test_metaclass_inherited_within_module() {
        let m = model(indoc! {"
            class Base(metaclass=Registry):
                pass

            class Child(Base):
                pass

            class GrandChild(Child):
                pass
        "});
        assert!(m.classes().iter().all(|c| c.metaclass.as_deref() == Some("Registry")));
    }

    #[test]
    fn test_metaclass_from_known_stdlib_base() {
        let m = model("class Shape(ABC):\n    pass\n");
        assert_eq!(m.classes()[0].metaclass.as_deref(), Some("ABCMeta"));
    }

    #[test]
    fn test_legacy_metaclass_attribute() {
        let m = model("class Old(object):\n    __metaclass__ = Meta\n");
        assert_eq!(m.classes()[0].metaclass.as_deref(), Some("Meta"));
    }

    #[test]
    fn test_locals_include_assignments_methods_and_branches() {
        let m = model(indoc! {"
            class Bag:
                __dict__ = {}
                a = b = 2
                x, y = 1, 2
                def method(self):
                    inner = 3
                if DEBUG:
                    flag = True
        "});
        let locals = &m.classes()[0].locals;
        for name in ["__dict__", "a", "b", "x", "y", "method", "flag"] {
            assert!(locals.contains(name), "missing {}", name);
        }
        assert!(!locals.contains("inner"));
    }

    #[test]
    fn test_nested_classes_are_reported() {
        let m = model("class Outer:\n    class Meta:\n        ordering = []\n");
        let names: Vec<_> = m.classes().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Outer", "Meta"]);
        assert!(m.classes()[0].locals.contains("Meta"));
    }
}
