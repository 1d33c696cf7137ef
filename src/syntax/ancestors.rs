//! Upward searches through a node's parent chain

use super::tree::{SyntaxKind, SyntaxNode};

/// Nearest strict ancestor of `node` satisfying `predicate`.
///
/// The walk starts at the parent, never looks at siblings or children and
/// returns `None` once it passes the root.
pub fn nearest_ancestor<'t, P>(node: SyntaxNode<'t>, predicate: P) -> Option<SyntaxNode<'t>>
where
    P: Fn(SyntaxNode<'t>) -> bool,
{
    node.ancestors().find(|&ancestor| predicate(ancestor))
}

pub fn is_return_statement(node: SyntaxNode<'_>) -> bool {
    node.kind() == SyntaxKind::ReturnStatement
}

/// Arrow functions, function expressions and function declarations
pub fn is_function_like(node: SyntaxNode<'_>) -> bool {
    node.kind().is_function_like()
}
