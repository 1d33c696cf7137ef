//! Type resolution for receiver expressions
//!
//! The subscription rule only needs to know the *name* of an expression's
//! type. [`TypeResolver`] is the seam where a real type checker can be
//! plugged in; [`DeclaredTypeResolver`] is the built-in implementation that
//! reads declared annotations and constructor calls straight off the tree.

use crate::syntax::{nearest_ancestor, SyntaxKind, SyntaxNode};

/// Semantic type information for an expression
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedType {
    /// Name of the type's symbol (`Subject`, `Observable`, ...)
    pub symbol: Option<String>,
}

impl ResolvedType {
    pub fn named(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
        }
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
}

/// Answers "what is the type of this expression?"
///
/// `None` means unresolved and is treated as "not a match" by callers, never
/// as an error.
pub trait TypeResolver {
    fn resolve_type(&self, node: SyntaxNode<'_>) -> Option<ResolvedType>;
}

impl<F> TypeResolver for F
where
    F: Fn(SyntaxNode<'_>) -> Option<ResolvedType>,
{
    fn resolve_type(&self, node: SyntaxNode<'_>) -> Option<ResolvedType> {
        self(node)
    }
}

/// Default bound on how many declarations are followed for one query
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Resolves types from declarations in the same file.
///
/// - identifiers go through lexical scopes to their declaration and use its
///   annotation, or its initializer when there is none;
/// - `this.x` and `obj.x` look members up in the class (and its base
///   classes) declared in this file;
/// - `new X()` is `X`, `e as T` is `T`, parentheses are transparent;
/// - calls use the declared return type of the function or method.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredTypeResolver {
    max_depth: usize,
}

impl Default for DeclaredTypeResolver {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DeclaredTypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn resolve(&self, node: SyntaxNode<'_>, depth: usize) -> Option<String> {
        if depth > self.max_depth {
            log::trace!("type resolution depth exceeded at {:?}", node);
            return None;
        }
        let depth = depth + 1;
        match node.kind() {
            SyntaxKind::Parenthesized => self.resolve(node.child(0)?, depth),
            SyntaxKind::AsExpression => match node.type_annotation() {
                Some(annotation) => annotation_symbol(annotation),
                // `as const`
                None => self.resolve(node.child(0)?, depth),
            },
            SyntaxKind::New => {
                let callee = node.receiver()?.dotted_name()?;
                last_segment(&callee).map(String::from)
            }
            SyntaxKind::ThisExpression => {
                nearest_class(node).and_then(|class| class.name()).map(String::from)
            }
            SyntaxKind::Identifier => {
                let declaration = find_declaration(node, node.name()?)?;
                self.declared_type(declaration, depth)
            }
            SyntaxKind::PropertyAccess => {
                let class = self.class_of(node.receiver()?, depth)?;
                let member = self.find_member(class, node.name()?, MemberUse::Value, depth)?;
                self.declared_type(member, depth)
            }
            SyntaxKind::Call => self.return_type(node.receiver()?, depth),
            _ => None,
        }
    }

    /// Type of whatever a declaration node declares
    fn declared_type(&self, declaration: SyntaxNode<'_>, depth: usize) -> Option<String> {
        match declaration.kind() {
            SyntaxKind::VariableDeclaration
            | SyntaxKind::PropertyDeclaration
            | SyntaxKind::Parameter
            | SyntaxKind::ParameterProperty => {
                if let Some(annotation) = declaration.type_annotation() {
                    return annotation_symbol(annotation);
                }
                let initializer = declaration
                    .last_child()
                    .filter(|c| c.kind() != SyntaxKind::Decorator)?;
                self.resolve(initializer, depth)
            }
            SyntaxKind::GetAccessor => declaration.type_annotation().and_then(annotation_symbol),
            _ => None,
        }
    }

    /// Declared return type of whatever `callee` calls
    fn return_type(&self, callee: SyntaxNode<'_>, depth: usize) -> Option<String> {
        let target = match callee.kind() {
            SyntaxKind::Identifier => {
                let declaration = find_declaration(callee, callee.name()?)?;
                match declaration.kind() {
                    SyntaxKind::VariableDeclaration => declaration
                        .child(0)
                        .filter(|init| init.kind().is_function_like())?,
                    _ => declaration,
                }
            }
            SyntaxKind::PropertyAccess => {
                let class = self.class_of(callee.receiver()?, depth)?;
                self.find_member(class, callee.name()?, MemberUse::Call, depth)?
            }
            SyntaxKind::Parenthesized => return self.return_type(callee.child(0)?, depth),
            _ => return None,
        };
        if !target.kind().is_callable() {
            return None;
        }
        target.type_annotation().and_then(annotation_symbol)
    }

    /// The class declaration describing the value of `expr`
    fn class_of<'t>(&self, expr: SyntaxNode<'t>, depth: usize) -> Option<SyntaxNode<'t>> {
        if expr.kind() == SyntaxKind::ThisExpression {
            return nearest_class(expr);
        }
        let symbol = self.resolve(expr, depth)?;
        find_class(expr, &symbol)
    }

    /// Member `name` of `class`, following `extends` through classes in the
    /// same file
    fn find_member<'t>(
        &self,
        class: SyntaxNode<'t>,
        name: &str,
        usage: MemberUse,
        depth: usize,
    ) -> Option<SyntaxNode<'t>> {
        if depth > self.max_depth {
            return None;
        }
        let mut fallback = None;
        for member in class.children() {
            match member.kind() {
                SyntaxKind::Constructor => {
                    let property = member
                        .parameters()
                        .find(|p| p.kind() == SyntaxKind::ParameterProperty && p.name() == Some(name));
                    if property.is_some() && usage == MemberUse::Value {
                        return property;
                    }
                }
                SyntaxKind::PropertyDeclaration | SyntaxKind::GetAccessor
                    if member.name() == Some(name) =>
                {
                    if usage == MemberUse::Value {
                        return Some(member);
                    }
                    fallback.get_or_insert(member);
                }
                SyntaxKind::MethodDeclaration if member.name() == Some(name) => {
                    if usage == MemberUse::Call {
                        return Some(member);
                    }
                    fallback.get_or_insert(member);
                }
                _ => {}
            }
        }
        if fallback.is_some() {
            return fallback;
        }
        let base = base_class_name(class)?;
        let base_class = find_class(class, &base)?;
        if base_class == class {
            return None;
        }
        self.find_member(base_class, name, usage, depth + 1)
    }
}

impl TypeResolver for DeclaredTypeResolver {
    fn resolve_type(&self, node: SyntaxNode<'_>) -> Option<ResolvedType> {
        self.resolve(node, 0).map(ResolvedType::named)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberUse {
    Value,
    Call,
}

fn nearest_class(node: SyntaxNode<'_>) -> Option<SyntaxNode<'_>> {
    nearest_ancestor(node, |n| n.kind() == SyntaxKind::ClassDeclaration)
}

/// A class declared anywhere in the file
fn find_class<'t>(anywhere: SyntaxNode<'t>, name: &str) -> Option<SyntaxNode<'t>> {
    anywhere
        .tree()
        .preorder()
        .find(|n| n.kind() == SyntaxKind::ClassDeclaration && n.name() == Some(name))
}

fn base_class_name(class: SyntaxNode<'_>) -> Option<String> {
    let base = class.children().find(|c| {
        matches!(
            c.kind(),
            SyntaxKind::Identifier | SyntaxKind::PropertyAccess | SyntaxKind::Call
        )
    })?;
    let dotted = base.dotted_name()?;
    last_segment(&dotted).map(String::from)
}

/// Look `name` up through the lexical scopes enclosing `node`
fn find_declaration<'t>(node: SyntaxNode<'t>, name: &str) -> Option<SyntaxNode<'t>> {
    for scope in node.ancestors() {
        let kind = scope.kind();
        if kind.is_callable() {
            if let Some(param) = scope.parameters().find(|p| p.name() == Some(name)) {
                return Some(param);
            }
            if kind == SyntaxKind::FunctionExpression && scope.name() == Some(name) {
                return Some(scope);
            }
            continue;
        }
        match kind {
            SyntaxKind::CatchClause => {
                if let Some(param) = scope.parameters().find(|p| p.name() == Some(name)) {
                    return Some(param);
                }
            }
            SyntaxKind::SourceFile
            | SyntaxKind::Block
            | SyntaxKind::CaseClause
            | SyntaxKind::LoopStatement => {
                if let Some(found) = scope.children().find_map(|s| declared_in(s, name)) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

/// Declaration of `name` made directly by `statement`
fn declared_in<'t>(statement: SyntaxNode<'t>, name: &str) -> Option<SyntaxNode<'t>> {
    match statement.kind() {
        SyntaxKind::VariableStatement => statement.children().find(|d| d.name() == Some(name)),
        SyntaxKind::FunctionDeclaration | SyntaxKind::ClassDeclaration
            if statement.name() == Some(name) =>
        {
            Some(statement)
        }
        _ => None,
    }
}

fn last_segment(dotted: &str) -> Option<&str> {
    let segment = dotted.rsplit('.').next()?.trim();
    if !segment.is_empty() && segment.chars().all(|c| c == '_' || c == '$' || c.is_alphanumeric()) {
        Some(segment)
    } else {
        None
    }
}

/// Symbol name named by a type annotation.
///
/// `Rx.Subject<number>` is `Subject`, `Foo[]` is `Array`, and
/// `T | null | undefined` is `T`. Other unions, intersections, function
/// types and literal types have no single symbol.
pub fn annotation_symbol(annotation: &str) -> Option<String> {
    let text = annotation.trim();
    let text = text.strip_prefix("readonly ").unwrap_or(text).trim();
    if text.is_empty() {
        return None;
    }

    let unions = split_top_level(text, '|')?;
    if unions.len() > 1 {
        let mut remaining = unions
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty() && !matches!(*part, "null" | "undefined"));
        let single = remaining.next()?;
        if remaining.next().is_some() {
            return None;
        }
        return annotation_symbol(single);
    }
    if split_top_level(text, '&')?.len() > 1 {
        return None;
    }

    if text.ends_with("[]") {
        return Some("Array".to_string());
    }
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        return annotation_symbol(inner);
    }

    let head = match text.find('<') {
        Some(open) => &text[..open],
        None => text,
    };
    let head = head.trim();
    if head.contains(char::is_whitespace) {
        // `typeof x`, `keyof T`, ...
        return None;
    }
    last_segment(head)
        .filter(|s| !s.starts_with(|c: char| c.is_ascii_digit()))
        .map(String::from)
}

/// Split on `sep` outside any brackets. `None` if the text holds a
/// top-level arrow (a function type).
fn split_top_level(text: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '=' if chars.peek().map(|&(_, n)| n) == Some('>') => {
                if depth == 0 {
                    return None;
                }
                chars.next();
            }
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    /// Resolved type of the receiver of the first `.subscribe`
    fn receiver_type(source: &str) -> Option<String> {
        receiver_type_with(DeclaredTypeResolver::new(), source)
    }

    fn receiver_type_with(resolver: DeclaredTypeResolver, source: &str) -> Option<String> {
        let parsed = parse(source);
        let access = parsed
            .tree
            .preorder()
            .find(|n| n.kind() == SyntaxKind::PropertyAccess && n.name() == Some("subscribe"))
            .expect("no subscribe access");
        resolver
            .resolve_type(access.receiver().unwrap())
            .and_then(|t| t.symbol_name().map(String::from))
    }

    #[test]
    fn test_annotation_symbol() {
        assert_eq!(annotation_symbol("Subject<number>").as_deref(), Some("Subject"));
        assert_eq!(annotation_symbol("Rx.Observable<Map<K, V>>").as_deref(), Some("Observable"));
        assert_eq!(annotation_symbol("Subject<number>[]").as_deref(), Some("Array"));
        assert_eq!(annotation_symbol("readonly string[]").as_deref(), Some("Array"));
        assert_eq!(annotation_symbol("Subject<X> | undefined").as_deref(), Some("Subject"));
        assert_eq!(annotation_symbol("(EventEmitter<void>)").as_deref(), Some("EventEmitter"));
        assert_eq!(annotation_symbol("Observable<A | B>").as_deref(), Some("Observable"));
        assert_eq!(annotation_symbol("A | B"), None);
        assert_eq!(annotation_symbol("A & B"), None);
        assert_eq!(annotation_symbol("(x: number) => Observable<number>"), None);
        assert_eq!(annotation_symbol("typeof source"), None);
        assert_eq!(annotation_symbol("'literal'"), None);
        assert_eq!(annotation_symbol(""), None);
    }

    #[test]
    fn test_variable_annotation() {
        assert_eq!(
            receiver_type("const a: Subject<number> = make();\na.subscribe(x);").as_deref(),
            Some("Subject")
        );
    }

    #[test]
    fn test_variable_initializer() {
        assert_eq!(
            receiver_type("const a = new Rx.BehaviorSubject(1);\na.subscribe(x);").as_deref(),
            Some("BehaviorSubject")
        );
        assert_eq!(
            receiver_type("const a = source as Observable<string>;\na.subscribe(x);").as_deref(),
            Some("Observable")
        );
    }

    #[test]
    fn test_parameters_and_shadowing() {
        let source = r#"
const s: Subject<number> = new Subject();
function f(s: EventEmitter<string>) {
  s.subscribe();
}
"#;
        assert_eq!(receiver_type(source).as_deref(), Some("EventEmitter"));
        assert_eq!(
            receiver_type("items.forEach((s: Observable<number>) => s.subscribe());").as_deref(),
            Some("Observable")
        );
    }

    #[test]
    fn test_hoisted_declaration() {
        assert_eq!(
            receiver_type("function f() { s.subscribe(); }\nvar s: Subject<void>;").as_deref(),
            Some("Subject")
        );
    }

    #[test]
    fn test_this_members() {
        let source = r#"
class Widget {
  private events$: Subject<Event>;
  constructor(private readonly store: Store<State>) {}
  get value$(): Observable<number> { return this.store.select(); }
  init() {
    this.events$.subscribe();
  }
}
"#;
        assert_eq!(receiver_type(source).as_deref(), Some("Subject"));
        assert_eq!(
            receiver_type(&source.replace("this.events$.subscribe", "this.store.subscribe"))
                .as_deref(),
            Some("Store")
        );
        assert_eq!(
            receiver_type(&source.replace("this.events$.subscribe", "this.value$.subscribe"))
                .as_deref(),
            Some("Observable")
        );
    }

    #[test]
    fn test_inherited_member_and_other_instance() {
        let source = r#"
class Base {
  protected changes = new Subject<void>();
}
class Child extends Base {
  run(other: Child) {
    other.changes.subscribe();
  }
}
"#;
        assert_eq!(receiver_type(source).as_deref(), Some("Subject"));
    }

    #[test]
    fn test_call_return_types() {
        let source = r#"
function make(): Observable<number> { return of(1); }
make().subscribe();
"#;
        assert_eq!(receiver_type(source).as_deref(), Some("Observable"));

        let source = r#"
class Api {
  load(): EventEmitter<string> { return this.emitter; }
  start() { this.load().subscribe(); }
}
"#;
        assert_eq!(receiver_type(source).as_deref(), Some("EventEmitter"));

        let source = "const build = (): Subject<number> => new Subject();\nbuild().subscribe();";
        assert_eq!(receiver_type(source).as_deref(), Some("Subject"));
    }

    #[test]
    fn test_parentheses_and_as() {
        assert_eq!(
            receiver_type("(x as Subject<number>).subscribe();").as_deref(),
            Some("Subject")
        );
        assert_eq!(
            receiver_type("((new Observable(fn))).subscribe();").as_deref(),
            Some("Observable")
        );
    }

    #[test]
    fn test_unresolved() {
        assert_eq!(receiver_type("unknown.subscribe();"), None);
        assert_eq!(receiver_type("let a;\na.subscribe();"), None);
        assert_eq!(receiver_type("getThing().subscribe();"), None);
    }

    #[test]
    fn test_max_depth_bounds_initializer_chains() {
        let source = "declare const a: Subject<number>;\nconst b = a;\nconst c = b;\nc.subscribe();";
        assert_eq!(receiver_type(source).as_deref(), Some("Subject"));
        assert_eq!(
            receiver_type_with(DeclaredTypeResolver::new().with_max_depth(1), source),
            None
        );
        assert_eq!(
            receiver_type_with(DeclaredTypeResolver::new().with_max_depth(2), source).as_deref(),
            Some("Subject")
        );
    }

    #[test]
    fn test_cyclic_initializers_terminate() {
        assert_eq!(receiver_type("var a = b;\nvar b = a;\na.subscribe();"), None);
    }

    #[test]
    fn test_closure_resolver() {
        let parsed = parse("x.subscribe();");
        let access = parsed
            .tree
            .preorder()
            .find(|n| n.name() == Some("subscribe"))
            .unwrap();
        let resolver = |node: SyntaxNode<'_>| match node.name() {
            Some("x") => Some(ResolvedType::named("Subject")),
            _ => None,
        };
        let resolved = resolver.resolve_type(access.receiver().unwrap());
        assert_eq!(resolved, Some(ResolvedType::named("Subject")));
        assert_eq!(resolver.resolve_type(access), None);
    }
}
