//! Subtrack - subscription tracking for TypeScript/JavaScript code bases
//!
//! Two halves that enforce one discipline: every subscription acquired by
//! application code is registered with a scope-owned registry and released
//! when that scope ends.
//!
//! - [`tracker`]: the runtime registry, the `subscribe_and_track` extension
//!   and a minimal multicast [`tracker::Subject`].
//! - [`no_subscribe`]: a lint rule that flags `subscribe` calls on
//!   subscribable receivers made outside the registry.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> parse -> NoSubscribeRule (TypeResolver) -> Diagnostic -> OutputFormatter
//! ```
//!
//! # Linting source text
//!
//! ```
//! use subtrack::{Config, Engine};
//! use std::path::Path;
//!
//! let engine = Engine::new(Config::default()).unwrap();
//! let source = "
//! const events$: Subject<string> = new Subject<string>();
//! events$.subscribe(e => console.log(e));
//! ";
//! let result = engine.lint_source(Path::new("app.ts"), source);
//! assert_eq!(result.warning_count, 1);
//! assert_eq!(result.diagnostics[0].rule_id, "no-subscribe");
//! ```

pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod no_subscribe;
pub mod output;
pub mod resolve;
pub mod rule;
pub mod suppress;
pub mod syntax;
pub mod tracker;

// Re-export main types
pub use config::{Config, ConfigError};
pub use diagnostic::{Diagnostic, Location, Severity};
pub use engine::{Engine, LintResult, RuleTiming};
pub use no_subscribe::{Disposition, NoSubscribeRule, PatternSet, RuleConfig, ViolationKind};
pub use output::{CompactFormatter, JsonFormatter, OutputFormatter, TextFormatter};
pub use resolve::{DeclaredTypeResolver, ResolvedType, TypeResolver};
pub use rule::{LintRule, RuleCategory, RuleInfo, RuleMatch};
pub use syntax::{parse, ParseError, SyntaxKind, SyntaxNode, SyntaxTree};
pub use tracker::{
    acquire_tracked, global_registry, shutdown_global_registry, Observer, ReleaseError,
    Subject, Subscribable, SubscribeAndTrack, Subscription, SubscriptionRegistry, TrackedScope,
};
