//! The `no-subscribe` rule
//!
//! Flags `<subscribable>.subscribe` member accesses so that every
//! subscription goes through a registry-backed tracked acquisition instead.
//! A subscribable's own construction is special: the function handed to
//! `new Observable(...)` may return an inner subscription as its teardown
//! logic, and that is exempt.
//!
//! ```text
//! events$.subscribe(handle);                        // flagged
//! new Observable(o => inner.subscribe(o));          // exempt: returned teardown
//! new Observable(o => { inner.subscribe(o); });     // flagged: teardown not returned
//! ```

use crate::diagnostic::Severity;
use crate::resolve::TypeResolver;
use crate::rule::{LintRule, RuleCategory, RuleInfo, RuleMatch};
use crate::syntax::{
    is_function_like, is_return_statement, nearest_ancestor, Span, SyntaxKind, SyntaxNode,
    SyntaxTree,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const RULE_ID: &str = "no-subscribe";

pub const DEFAULT_VERB: &str = "subscribe";
pub const DEFAULT_TRACKED_VERB: &str = "subscribeAndTrack";
pub const DEFAULT_TYPE_PATTERNS: &[&str] = &["^Observable$", "Subject$", "^EventEmitter$"];
pub const DEFAULT_CONSTRUCTORS: &[&str] = &["Observable"];

pub const CONSTRUCTION_SITE_MESSAGE: &str =
    "Remember to return an observable's inner subscription as its teardown logic";

static DEFAULT_PATTERN_SET: Lazy<PatternSet> = Lazy::new(|| {
    PatternSet::new(DEFAULT_TYPE_PATTERNS.iter().copied())
        .expect("default type patterns are valid regexes")
});

/// Ordered set of type-name regexes; a name matches if any pattern does
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn as_strs(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        DEFAULT_PATTERN_SET.clone()
    }
}

/// Immutable configuration of the rule, fixed at construction
#[derive(Debug, Clone)]
pub struct RuleConfig {
    verb: String,
    tracked_verb: String,
    patterns: PatternSet,
    constructors: Vec<String>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            verb: DEFAULT_VERB.to_string(),
            tracked_verb: DEFAULT_TRACKED_VERB.to_string(),
            patterns: PatternSet::default(),
            constructors: DEFAULT_CONSTRUCTORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RuleConfig {
    pub fn new(patterns: PatternSet) -> Self {
        Self {
            patterns,
            ..Self::default()
        }
    }

    pub fn with_verb(mut self, verb: &str) -> Self {
        self.verb = verb.to_string();
        self
    }

    pub fn with_tracked_verb(mut self, tracked_verb: &str) -> Self {
        self.tracked_verb = tracked_verb.to_string();
        self
    }

    pub fn with_constructors<I, S>(mut self, constructors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constructors = constructors.into_iter().map(Into::into).collect();
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn tracked_verb(&self) -> &str {
        &self.tracked_verb
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn constructors(&self) -> &[String] {
        &self.constructors
    }
}

/// What a matched call site amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Returned as teardown logic from a subscribable's construction
    NotAViolation,
    PlainViolation,
    /// Inside a subscribable's construction without being returned
    ConstructionSiteViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    PlainViolation,
    ConstructionSiteViolation,
}

/// A flagged call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation<'t> {
    /// The property access naming the verb
    pub node: SyntaxNode<'t>,
    /// Span of the member name
    pub span: Span,
    pub kind: ViolationKind,
}

pub struct NoSubscribeRule {
    config: RuleConfig,
    info: RuleInfo,
}

impl NoSubscribeRule {
    pub fn new(config: RuleConfig) -> Self {
        let description = format!(
            "'{}' on receivers typed {} must go through '{}'",
            config.verb(),
            config.patterns().as_strs().join(" | "),
            config.tracked_verb()
        );
        let info = RuleInfo::new(RULE_ID)
            .with_description(&description)
            .with_severity(Severity::Warning)
            .with_category(RuleCategory::Correctness)
            .with_rationale(
                "An untracked subscription outlives the scope that created it and keeps its \
                 listener alive until the source completes",
            )
            .with_example_bad("this.events$.subscribe(e => this.handle(e));")
            .with_example_good("this.events$.subscribeAndTrack(this.registry, e => this.handle(e));")
            .with_tag("rxjs")
            .with_tag("lifecycle");
        Self { config, info }
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// `node` is `<receiver>.<verb>` and the receiver's type matches a pattern
    pub fn is_subscription_call(&self, node: SyntaxNode<'_>, resolver: &dyn TypeResolver) -> bool {
        if node.kind() != SyntaxKind::PropertyAccess || node.name() != Some(self.config.verb()) {
            return false;
        }
        let Some(receiver) = node.receiver() else {
            return false;
        };
        resolver.resolve_type(receiver).is_some_and(|resolved| {
            resolved
                .symbol_name()
                .is_some_and(|symbol| self.config.patterns().is_match(symbol))
        })
    }

    /// Decide what a matched call site is. First match wins:
    /// returned teardown, then inside a construction, then plain.
    pub fn classify(&self, node: SyntaxNode<'_>) -> Disposition {
        if self.returns_own_teardown(node) {
            return Disposition::NotAViolation;
        }
        let in_construction = nearest_ancestor(node, |n| n.kind() == SyntaxKind::New)
            .is_some_and(|new_expr| self.is_construction(new_expr));
        if in_construction {
            Disposition::ConstructionSiteViolation
        } else {
            Disposition::PlainViolation
        }
    }

    /// Every flagged call site in document order
    pub fn analyze<'t>(
        &self,
        tree: &'t SyntaxTree,
        resolver: &dyn TypeResolver,
    ) -> Vec<Violation<'t>> {
        let mut violations = Vec::new();
        for node in tree.preorder() {
            if !self.is_subscription_call(node, resolver) {
                continue;
            }
            let kind = match self.classify(node) {
                Disposition::NotAViolation => {
                    log::trace!("exempt teardown subscription at {:?}", node);
                    continue;
                }
                Disposition::PlainViolation => ViolationKind::PlainViolation,
                Disposition::ConstructionSiteViolation => ViolationKind::ConstructionSiteViolation,
            };
            log::trace!("{:?} at {:?}", kind, node);
            violations.push(Violation {
                node,
                span: node.name_span().unwrap_or_else(|| node.span()),
                kind,
            });
        }
        violations
    }

    pub fn message(&self, kind: ViolationKind) -> String {
        match kind {
            ViolationKind::PlainViolation => format!(
                "Do not use '{}(...)'. Use the tracked-acquisition call instead.",
                self.config.verb()
            ),
            ViolationKind::ConstructionSiteViolation => CONSTRUCTION_SITE_MESSAGE.to_string(),
        }
    }

    pub fn help(&self, kind: ViolationKind) -> String {
        match kind {
            ViolationKind::PlainViolation => format!(
                "use '{}(registry, ...)' so the subscription is released with its owning scope",
                self.config.tracked_verb()
            ),
            ViolationKind::ConstructionSiteViolation => {
                "return the inner subscription from the function passed to the constructor"
                    .to_string()
            }
        }
    }

    /// A `new` expression constructing one of the configured subscribables
    fn is_construction(&self, node: SyntaxNode<'_>) -> bool {
        if node.kind() != SyntaxKind::New {
            return false;
        }
        node.receiver()
            .and_then(|callee| callee.dotted_name())
            .is_some_and(|name| self.config.constructors().iter().any(|c| *c == name))
    }

    /// `func` is passed directly as an argument to a subscribable's construction
    fn is_teardown_function(&self, func: SyntaxNode<'_>) -> bool {
        let Some(parent) = func.parent() else {
            return false;
        };
        self.is_construction(parent) && func.index_in_parent().is_some_and(|i| i > 0)
    }

    fn returns_own_teardown(&self, node: SyntaxNode<'_>) -> bool {
        self.under_teardown_return(node)
            || self.assigned_then_returned(node)
            || self.in_teardown_expression_body(node)
    }

    /// `return ...subscribe(...)` in the teardown function
    fn under_teardown_return(&self, node: SyntaxNode<'_>) -> bool {
        nearest_ancestor(node, is_return_statement)
            .and_then(|ret| nearest_ancestor(ret, is_function_like))
            .is_some_and(|func| self.is_teardown_function(func))
    }

    /// `const s = ...subscribe(...); return s;` in the teardown function
    fn assigned_then_returned(&self, node: SyntaxNode<'_>) -> bool {
        let Some(call) = node.parent().filter(|p| p.kind() == SyntaxKind::Call) else {
            return false;
        };
        if call.receiver() != Some(node) {
            return false;
        }
        let Some(declaration) = call
            .parent()
            .filter(|p| p.kind() == SyntaxKind::VariableDeclaration)
        else {
            return false;
        };
        let Some(name) = declaration.name() else {
            return false;
        };
        let Some(func) = nearest_ancestor(declaration, is_function_like) else {
            return false;
        };
        if !self.is_teardown_function(func) {
            return false;
        }
        func.preorder().any(|ret| {
            is_return_statement(ret)
                && ret
                    .child(0)
                    .is_some_and(|value| value.kind() == SyntaxKind::Identifier && value.name() == Some(name))
                && nearest_ancestor(ret, is_function_like) == Some(func)
        })
    }

    /// `new Observable(o => ...subscribe(...))`: an expression-bodied arrow
    /// returns its body
    fn in_teardown_expression_body(&self, node: SyntaxNode<'_>) -> bool {
        let Some(func) = nearest_ancestor(node, is_function_like) else {
            return false;
        };
        if func.kind() != SyntaxKind::ArrowFunction || !self.is_teardown_function(func) {
            return false;
        }
        let Some(body) = func.body().filter(|b| b.kind() != SyntaxKind::Block) else {
            return false;
        };
        body == node || node.ancestors().any(|a| a == body)
    }
}

impl Default for NoSubscribeRule {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

impl LintRule for NoSubscribeRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    fn check(&self, tree: &SyntaxTree, resolver: &dyn TypeResolver) -> Vec<RuleMatch> {
        self.analyze(tree, resolver)
            .into_iter()
            .map(|violation| RuleMatch {
                span: violation.span,
                message: self.message(violation.kind),
                help: Some(self.help(violation.kind)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{DeclaredTypeResolver, ResolvedType};
    use crate::syntax::parse;

    fn kinds(source: &str) -> Vec<ViolationKind> {
        kinds_with(&NoSubscribeRule::default(), source)
    }

    fn kinds_with(rule: &NoSubscribeRule, source: &str) -> Vec<ViolationKind> {
        let parsed = parse(source);
        rule.analyze(&parsed.tree, &DeclaredTypeResolver::new())
            .into_iter()
            .map(|v| v.kind)
            .collect()
    }

    const PRELUDE: &str = "declare const inner: Observable<number>;\n";

    fn with_prelude(body: &str) -> String {
        format!("{}{}", PRELUDE, body)
    }

    #[test]
    fn test_pattern_set() {
        let set = PatternSet::default();
        assert_eq!(set.len(), 3);
        assert!(set.is_match("Observable"));
        assert!(set.is_match("Subject"));
        assert!(set.is_match("BehaviorSubject"));
        assert!(set.is_match("EventEmitter"));
        assert!(!set.is_match("ObservableLike"));
        assert!(!set.is_match("SubjectFactory"));
        assert!(!set.is_match("MyEventEmitter"));

        assert!(PatternSet::new(["("]).is_err());
        assert!(PatternSet::new(Vec::<String>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_plain_violation_at_member_name() {
        let source = "declare const a: Subject<number>;\na.subscribe(x);";
        let parsed = parse(source);
        let rule = NoSubscribeRule::default();
        let violations = rule.analyze(&parsed.tree, &DeclaredTypeResolver::new());
        assert_eq!(violations.len(), 1);
        let violation = violations[0];
        assert_eq!(violation.kind, ViolationKind::PlainViolation);
        assert_eq!(&source[violation.span.start..violation.span.end], "subscribe");
        assert_eq!(violation.node.kind(), SyntaxKind::PropertyAccess);
    }

    #[test]
    fn test_receiver_type_not_in_patterns() {
        assert!(kinds("declare const a: Promise<number>;\na.subscribe(x);").is_empty());
        assert!(kinds("unknownThing.subscribe(x);").is_empty());
    }

    #[test]
    fn test_description_names_configured_patterns() {
        let rule = NoSubscribeRule::new(
            RuleConfig::new(PatternSet::new(["^Store$", "Subject$"]).unwrap()).with_verb("listen"),
        );
        assert_eq!(
            rule.info().description.as_deref(),
            Some("'listen' on receivers typed ^Store$ | Subject$ must go through 'subscribeAndTrack'")
        );
    }

    #[test]
    fn test_calls_inside_template_substitutions() {
        assert_eq!(
            kinds(&with_prelude("const t = `${inner.subscribe(fn)}`;")),
            vec![ViolationKind::PlainViolation]
        );
        assert_eq!(
            kinds(&with_prelude(
                "new Observable(o => { log(`id ${o.id}: ${inner.subscribe(fn)}`); });"
            )),
            vec![ViolationKind::ConstructionSiteViolation]
        );
    }

    #[test]
    fn test_verb_must_match_exactly() {
        let source = "declare const a: Subject<number>;\na.Subscribe(x);\na.subscribeAndTrack(r, x);\na.pipe(x);";
        assert!(kinds(source).is_empty());
    }

    #[test]
    fn test_returned_teardown_is_exempt() {
        assert!(kinds(&with_prelude("new Observable(() => { return inner.subscribe(fn); });")).is_empty());
        assert!(kinds(&with_prelude(
            "new Observable(function (o) { return inner.subscribe(o); });"
        ))
        .is_empty());
    }

    #[test]
    fn test_assigned_then_returned_teardown_is_exempt() {
        assert!(kinds(&with_prelude(
            "new Observable(() => { const s = inner.subscribe(fn); return s; });"
        ))
        .is_empty());
    }

    #[test]
    fn test_assigned_but_other_name_returned() {
        let source = with_prelude(
            "new Observable(() => { const s = inner.subscribe(fn); const t = 1; return t; });",
        );
        assert_eq!(kinds(&source), vec![ViolationKind::ConstructionSiteViolation]);
    }

    #[test]
    fn test_expression_bodied_teardown_is_exempt() {
        assert!(kinds(&with_prelude("new Observable(o => inner.subscribe(o));")).is_empty());
    }

    #[test]
    fn test_construction_site_violation() {
        assert_eq!(
            kinds(&with_prelude("new Observable(() => { inner.subscribe(fn); });")),
            vec![ViolationKind::ConstructionSiteViolation]
        );
    }

    #[test]
    fn test_return_outside_construction_is_plain() {
        let source = with_prelude("function f() { return inner.subscribe(fn); }");
        assert_eq!(kinds(&source), vec![ViolationKind::PlainViolation]);
    }

    #[test]
    fn test_return_from_nested_function_is_not_teardown() {
        let source = with_prelude(
            "new Observable(() => { const g = () => { return inner.subscribe(fn); }; });",
        );
        assert_eq!(kinds(&source), vec![ViolationKind::ConstructionSiteViolation]);
    }

    #[test]
    fn test_method_is_not_a_function_literal() {
        let source = with_prelude(
            "new Observable({ setup() { return inner.subscribe(fn); } } as any);",
        );
        assert_eq!(kinds(&source), vec![ViolationKind::ConstructionSiteViolation]);
    }

    #[test]
    fn test_other_constructors_are_not_constructions() {
        let source = with_prelude("new Promise(() => { return inner.subscribe(fn); });");
        assert_eq!(kinds(&source), vec![ViolationKind::PlainViolation]);
    }

    #[test]
    fn test_configured_constructors() {
        let rule = NoSubscribeRule::new(RuleConfig::default().with_constructors(["Rx.Observable"]));
        let source = with_prelude("new Rx.Observable(() => { inner.subscribe(fn); });");
        assert_eq!(
            kinds_with(&rule, &source),
            vec![ViolationKind::ConstructionSiteViolation]
        );
        let source = with_prelude("new Observable(() => { inner.subscribe(fn); });");
        assert_eq!(kinds_with(&rule, &source), vec![ViolationKind::PlainViolation]);
    }

    #[test]
    fn test_uncalled_access_is_flagged() {
        let source = "declare const subject: Subject<void>;\nconst f = subject.subscribe;";
        assert_eq!(kinds(source), vec![ViolationKind::PlainViolation]);
    }

    #[test]
    fn test_document_order_regardless_of_nesting() {
        let source = r#"
declare const a: Subject<number>;
declare const inner: Observable<number>;
a.subscribe(v => {
  new Observable(() => { inner.subscribe(v); });
});
a.subscribe();
"#;
        let parsed = parse(source);
        let rule = NoSubscribeRule::default();
        let violations = rule.analyze(&parsed.tree, &DeclaredTypeResolver::new());
        let starts: Vec<usize> = violations.iter().map(|v| v.span.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
        assert_eq!(
            violations.iter().map(|v| v.kind).collect::<Vec<_>>(),
            vec![
                ViolationKind::PlainViolation,
                ViolationKind::ConstructionSiteViolation,
                ViolationKind::PlainViolation,
            ]
        );
    }

    #[test]
    fn test_custom_verb_and_patterns() {
        let patterns = PatternSet::new(["^Store$"]).unwrap();
        let rule = NoSubscribeRule::new(RuleConfig::new(patterns).with_verb("listen"));
        let source = "declare const s: Store<State>;\ndeclare const o: Observable<number>;\ns.listen(f);\no.subscribe(f);";
        assert_eq!(kinds_with(&rule, source), vec![ViolationKind::PlainViolation]);
        assert_eq!(
            rule.message(ViolationKind::PlainViolation),
            "Do not use 'listen(...)'. Use the tracked-acquisition call instead."
        );
    }

    #[test]
    fn test_messages() {
        let rule = NoSubscribeRule::default();
        assert_eq!(
            rule.message(ViolationKind::PlainViolation),
            "Do not use 'subscribe(...)'. Use the tracked-acquisition call instead."
        );
        assert_eq!(
            rule.message(ViolationKind::ConstructionSiteViolation),
            "Remember to return an observable's inner subscription as its teardown logic"
        );
        assert!(rule.help(ViolationKind::PlainViolation).contains("subscribeAndTrack"));
    }

    #[test]
    fn test_external_resolver() {
        let parsed = parse("anything.subscribe(x);");
        let rule = NoSubscribeRule::default();
        let resolver = |node: SyntaxNode<'_>| match node.name() {
            Some("anything") => Some(ResolvedType::named("ReplaySubject")),
            _ => None,
        };
        let violations = rule.analyze(&parsed.tree, &resolver);
        assert_eq!(violations.len(), 1);

        let unresolved = |_: SyntaxNode<'_>| -> Option<ResolvedType> { None };
        assert!(rule.analyze(&parsed.tree, &unresolved).is_empty());
    }

    #[test]
    fn test_check_produces_messages() {
        let parsed = parse("declare const a: Subject<number>;\na.subscribe(x);");
        let rule = NoSubscribeRule::default();
        let matches = rule.check(&parsed.tree, &DeclaredTypeResolver::new());
        assert_eq!(matches.len(), 1);
        assert!(matches[0].message.starts_with("Do not use 'subscribe(...)'"));
        assert!(matches[0].help.is_some());
        assert_eq!(rule.id(), RULE_ID);
    }
}
