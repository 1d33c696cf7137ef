//! Arena-backed syntax tree
//!
//! Nodes live in a flat `Vec` owned by [`SyntaxTree`]. Children are stored
//! as index lists and every node keeps the index of its parent, so walking
//! upward never needs shared ownership. [`SyntaxNode`] is a cheap `Copy`
//! cursor pairing the tree with an index.

use super::span::{LineIndex, Span};
use serde::Serialize;
use std::fmt;

/// Index of a node in its tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SyntaxKind {
    SourceFile,

    // Statements
    Block,
    EmptyStatement,
    ExpressionStatement,
    VariableStatement,
    VariableDeclaration,
    FunctionDeclaration,
    ClassDeclaration,
    ImportDeclaration,
    TypeDeclaration,
    ReturnStatement,
    IfStatement,
    LoopStatement,
    SwitchStatement,
    CaseClause,
    TryStatement,
    CatchClause,
    ThrowStatement,
    JumpStatement,

    // Class members
    PropertyDeclaration,
    MethodDeclaration,
    GetAccessor,
    Constructor,
    Parameter,
    /// Constructor parameter with an accessibility modifier (declares a field)
    ParameterProperty,
    Decorator,

    // Expressions
    ArrowFunction,
    FunctionExpression,
    Identifier,
    ThisExpression,
    SuperExpression,
    Literal,
    TemplateLiteral,
    ArrayLiteral,
    ObjectLiteral,
    PropertyAssignment,
    SpreadElement,
    PropertyAccess,
    ElementAccess,
    Call,
    New,
    Binary,
    Assignment,
    Conditional,
    Unary,
    Parenthesized,
    AsExpression,

    /// Anything the parser could not make sense of
    Unknown,
}

impl SyntaxKind {
    /// Function literals and declarations (not methods)
    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            SyntaxKind::ArrowFunction
                | SyntaxKind::FunctionExpression
                | SyntaxKind::FunctionDeclaration
        )
    }

    /// Every construct that introduces a parameter list and a body
    pub fn is_callable(self) -> bool {
        self.is_function_like()
            || matches!(
                self,
                SyntaxKind::MethodDeclaration | SyntaxKind::GetAccessor | SyntaxKind::Constructor
            )
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An identifier-like name attached to a node, with its own span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

impl Name {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: SyntaxKind,
    span: Span,
    /// Declared name, referenced identifier or accessed member
    name: Option<Name>,
    /// Declared type text: variable/parameter/property annotations,
    /// function return types, `as` target types
    type_annotation: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed source file
pub struct SyntaxTree {
    source: String,
    nodes: Vec<NodeData>,
    root: NodeId,
    line_index: LineIndex,
}

impl SyntaxTree {
    /// Root node (always a `SourceFile`)
    pub fn root(&self) -> SyntaxNode<'_> {
        self.node(self.root)
    }

    pub fn node(&self, id: NodeId) -> SyntaxNode<'_> {
        SyntaxNode { tree: self, id }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 1-based (line, column) of a byte offset
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        self.line_index.line_col(&self.source, offset)
    }

    /// All nodes in document pre-order
    pub fn preorder(&self) -> Preorder<'_> {
        self.root().preorder()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node(
            f: &mut fmt::Formatter<'_>,
            node: SyntaxNode<'_>,
            depth: usize,
        ) -> fmt::Result {
            write!(f, "{}{:?}", "  ".repeat(depth), node.kind())?;
            if let Some(name) = node.name() {
                write!(f, " {}", name)?;
            }
            if let Some(ty) = node.type_annotation() {
                write!(f, ": {}", ty)?;
            }
            writeln!(f)?;
            for child in node.children() {
                write_node(f, child, depth + 1)?;
            }
            Ok(())
        }
        write_node(f, self.root(), 0)
    }
}

/// Builds a [`SyntaxTree`] bottom-up: children are allocated first, and
/// allocating a parent links its children back to it.
#[derive(Default)]
pub(crate) struct TreeBuilder {
    nodes: Vec<NodeData>,
}

impl TreeBuilder {
    pub(crate) fn alloc(&mut self, kind: SyntaxKind, span: Span, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in &children {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(NodeData {
            kind,
            span,
            name: None,
            type_annotation: None,
            parent: None,
            children,
        });
        id
    }

    pub(crate) fn set_name(&mut self, id: NodeId, name: Name) {
        self.nodes[id.index()].name = Some(name);
    }

    pub(crate) fn set_type_annotation(&mut self, id: NodeId, text: String) {
        self.nodes[id.index()].type_annotation = Some(text);
    }

    pub(crate) fn finish(self, source: String, root: NodeId) -> SyntaxTree {
        let line_index = LineIndex::new(&source);
        SyntaxTree {
            source,
            nodes: self.nodes,
            root,
            line_index,
        }
    }
}

/// A node cursor: tree reference plus index
#[derive(Clone, Copy)]
pub struct SyntaxNode<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> SyntaxNode<'t> {
    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn tree(self) -> &'t SyntaxTree {
        self.tree
    }

    pub fn kind(self) -> SyntaxKind {
        self.tree.data(self.id).kind
    }

    pub fn span(self) -> Span {
        self.tree.data(self.id).span
    }

    /// Source text covered by this node
    pub fn text(self) -> &'t str {
        let span = self.span();
        &self.tree.source[span.start..span.end]
    }

    pub fn name(self) -> Option<&'t str> {
        self.tree.data(self.id).name.as_ref().map(|n| n.text.as_str())
    }

    pub fn name_span(self) -> Option<Span> {
        self.tree.data(self.id).name.as_ref().map(|n| n.span)
    }

    pub fn type_annotation(self) -> Option<&'t str> {
        self.tree.data(self.id).type_annotation.as_deref()
    }

    pub fn parent(self) -> Option<SyntaxNode<'t>> {
        self.tree.data(self.id).parent.map(|id| self.tree.node(id))
    }

    pub fn children(self) -> impl DoubleEndedIterator<Item = SyntaxNode<'t>> + 't {
        let tree = self.tree;
        tree.data(self.id).children.iter().map(move |&id| tree.node(id))
    }

    pub fn child(self, index: usize) -> Option<SyntaxNode<'t>> {
        self.tree
            .data(self.id)
            .children
            .get(index)
            .map(|&id| self.tree.node(id))
    }

    pub fn last_child(self) -> Option<SyntaxNode<'t>> {
        self.tree
            .data(self.id)
            .children
            .last()
            .map(|&id| self.tree.node(id))
    }

    /// Position of this node among its parent's children
    pub fn index_in_parent(self) -> Option<usize> {
        let parent = self.parent()?;
        self.tree
            .data(parent.id)
            .children
            .iter()
            .position(|&id| id == self.id)
    }

    /// Strict ancestors, nearest first
    pub fn ancestors(self) -> Ancestors<'t> {
        Ancestors {
            next: self.parent(),
        }
    }

    /// This node and all its descendants in pre-order
    pub fn preorder(self) -> Preorder<'t> {
        Preorder {
            tree: self.tree,
            stack: vec![self.id],
        }
    }

    /// Object of a property/element access, or callee of a call or `new`
    pub fn receiver(self) -> Option<SyntaxNode<'t>> {
        match self.kind() {
            SyntaxKind::PropertyAccess
            | SyntaxKind::ElementAccess
            | SyntaxKind::Call
            | SyntaxKind::New => self.child(0),
            _ => None,
        }
    }

    /// Arguments of a call or `new` expression
    pub fn arguments(self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        let skip = match self.kind() {
            SyntaxKind::Call | SyntaxKind::New => 1,
            _ => usize::MAX,
        };
        self.children().skip(skip)
    }

    /// Body of a function-like node (block or, for arrows, an expression)
    pub fn body(self) -> Option<SyntaxNode<'t>> {
        if !self.kind().is_callable() {
            return None;
        }
        self.last_child()
            .filter(|c| !matches!(c.kind(), SyntaxKind::Parameter | SyntaxKind::ParameterProperty))
    }

    /// Parameters of a function-like node
    pub fn parameters(self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        self.children()
            .filter(|c| matches!(c.kind(), SyntaxKind::Parameter | SyntaxKind::ParameterProperty))
    }

    /// Dotted name of an identifier/property-access chain (`Rx.Observable`)
    pub fn dotted_name(self) -> Option<String> {
        match self.kind() {
            SyntaxKind::Identifier => self.name().map(String::from),
            SyntaxKind::ThisExpression => Some("this".to_string()),
            SyntaxKind::PropertyAccess => {
                let receiver = self.receiver()?.dotted_name()?;
                Some(format!("{}.{}", receiver, self.name()?))
            }
            SyntaxKind::Parenthesized => self.child(0)?.dotted_name(),
            _ => None,
        }
    }
}

impl PartialEq for SyntaxNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for SyntaxNode<'_> {}

impl fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}..{}", self.kind(), self.span().start, self.span().end)?;
        if let Some(name) = self.name() {
            write!(f, " {:?}", name)?;
        }
        Ok(())
    }
}

/// Iterator over strict ancestors, nearest first
pub struct Ancestors<'t> {
    next: Option<SyntaxNode<'t>>,
}

impl<'t> Iterator for Ancestors<'t> {
    type Item = SyntaxNode<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Depth-first pre-order iterator (node, then children left to right)
pub struct Preorder<'t> {
    tree: &'t SyntaxTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Preorder<'t> {
    type Item = SyntaxNode<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let children = &self.tree.data(id).children;
        self.stack.extend(children.iter().rev());
        Some(self.tree.node(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `a.b(c)` built by hand
    fn sample() -> SyntaxTree {
        let source = "a.b(c)".to_string();
        let mut b = TreeBuilder::default();
        let a = b.alloc(SyntaxKind::Identifier, Span::new(0, 1), vec![]);
        b.set_name(a, Name::new("a", Span::new(0, 1)));
        let access = b.alloc(SyntaxKind::PropertyAccess, Span::new(0, 3), vec![a]);
        b.set_name(access, Name::new("b", Span::new(2, 3)));
        let c = b.alloc(SyntaxKind::Identifier, Span::new(4, 5), vec![]);
        b.set_name(c, Name::new("c", Span::new(4, 5)));
        let call = b.alloc(SyntaxKind::Call, Span::new(0, 6), vec![access, c]);
        let stmt = b.alloc(SyntaxKind::ExpressionStatement, Span::new(0, 6), vec![call]);
        let root = b.alloc(SyntaxKind::SourceFile, Span::new(0, 6), vec![stmt]);
        b.finish(source, root)
    }

    #[test]
    fn test_preorder_is_document_order() {
        let tree = sample();
        let kinds: Vec<SyntaxKind> = tree.preorder().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                SyntaxKind::SourceFile,
                SyntaxKind::ExpressionStatement,
                SyntaxKind::Call,
                SyntaxKind::PropertyAccess,
                SyntaxKind::Identifier,
                SyntaxKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_parent_links() {
        let tree = sample();
        let access = tree
            .preorder()
            .find(|n| n.kind() == SyntaxKind::PropertyAccess)
            .unwrap();
        assert_eq!(access.parent().map(|p| p.kind()), Some(SyntaxKind::Call));
        assert_eq!(access.index_in_parent(), Some(0));
        assert_eq!(access.name(), Some("b"));
        assert_eq!(access.name_span(), Some(Span::new(2, 3)));
        assert_eq!(access.dotted_name().as_deref(), Some("a.b"));

        let chain: Vec<SyntaxKind> = access.ancestors().map(|n| n.kind()).collect();
        assert_eq!(
            chain,
            vec![
                SyntaxKind::Call,
                SyntaxKind::ExpressionStatement,
                SyntaxKind::SourceFile
            ]
        );
        assert!(tree.root().parent().is_none());
    }

    #[test]
    fn test_call_accessors() {
        let tree = sample();
        let call = tree.preorder().find(|n| n.kind() == SyntaxKind::Call).unwrap();
        assert_eq!(call.receiver().map(|r| r.kind()), Some(SyntaxKind::PropertyAccess));
        let args: Vec<&str> = call.arguments().map(|a| a.text()).collect();
        assert_eq!(args, vec!["c"]);
    }
}
