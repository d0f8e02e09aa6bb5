//! Tree-sitter parser integration for Python
//!
//! Wraps the concrete syntax tree together with the source it was parsed from
//! so detectors can read node text without threading the source around.

use tree_sitter::{Node, Parser, Tree};

/// Parsed Python module.
#[derive(Debug)]
pub struct SyntaxTree {
    tree: Tree,
    source: String,
}

/// Why a unit could not be turned into a usable syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub line: usize,
    pub message: String,
}

impl SyntaxTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node_text(node, &self.source)
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> Vec<Node<'_>> {
        descendants(self.root())
    }
}

/// Parse Python source. Sources with syntax errors are rejected, reporting
/// the first erroneous location.
pub fn parse_source(content: &str) -> Result<SyntaxTree, ParseFailure> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParseFailure {
            line: 1,
            message: format!("Python grammar unavailable: {}", e),
        })?;

    let tree = parser.parse(content, None).ok_or_else(|| ParseFailure {
        line: 1,
        message: "Parser produced no syntax tree".to_string(),
    })?;

    if tree.root_node().has_error() {
        let line = first_error(tree.root_node()).map_or(1, node_line);
        return Err(ParseFailure {
            line,
            message: format!("Could not parse file: invalid syntax near line {}", line),
        });
    }

    Ok(SyntaxTree {
        tree,
        source: content.to_string(),
    })
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    descendants(root)
        .into_iter()
        .find(|node| node.is_error() || node.is_missing())
}

/// Preorder traversal without recursion so deeply nested sources cannot blow the stack.
pub fn descendants(root: Node<'_>) -> Vec<Node<'_>> {
    let mut nodes = Vec::new();
    let mut cursor = root.walk();
    loop {
        nodes.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return nodes;
            }
        }
    }
}

/// Get text for a tree-sitter node
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Get the line number for a tree-sitter node (1-indexed)
pub fn node_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Named children, skipping comments.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

/// True when one of the node's anonymous tokens is `token` (`async`, `from`, ...).
pub fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}
