//! Rule metadata and the trait every lint rule implements

use crate::diagnostic::Severity;
use crate::resolve::TypeResolver;
use crate::syntax::{Span, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule category for grouping related rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Code that is definitely wrong or useless
    Correctness,
    /// Code that is likely wrong or suspicious
    Suspicious,
    /// Idiomatic and consistent style rules
    #[default]
    Style,
    /// Rules that ban specific patterns or APIs
    Restriction,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Correctness => write!(f, "correctness"),
            RuleCategory::Suspicious => write!(f, "suspicious"),
            RuleCategory::Style => write!(f, "style"),
            RuleCategory::Restriction => write!(f, "restriction"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correctness" => Ok(RuleCategory::Correctness),
            "suspicious" => Ok(RuleCategory::Suspicious),
            "style" => Ok(RuleCategory::Style),
            "restriction" => Ok(RuleCategory::Restriction),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Descriptive metadata for a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInfo {
    /// Unique rule identifier (e.g., "no-subscribe")
    pub id: String,

    /// Detailed description
    #[serde(default)]
    pub description: Option<String>,

    /// Default severity level
    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub category: RuleCategory,

    /// Rationale explaining why this rule exists
    #[serde(default)]
    pub rationale: Option<String>,

    /// Example of code that violates this rule
    #[serde(default)]
    pub example_bad: Option<String>,

    /// Example of correct code
    #[serde(default)]
    pub example_good: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl RuleInfo {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            description: None,
            severity: Severity::Warning,
            category: RuleCategory::default(),
            rationale: None,
            example_bad: None,
            example_good: None,
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, category: RuleCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_rationale(mut self, rationale: &str) -> Self {
        self.rationale = Some(rationale.to_string());
        self
    }

    pub fn with_example_bad(mut self, example: &str) -> Self {
        self.example_bad = Some(example.to_string());
        self
    }

    pub fn with_example_good(mut self, example: &str) -> Self {
        self.example_good = Some(example.to_string());
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A rule finding, before it is placed in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

/// A lint rule run over one parsed file.
///
/// Implementations are read-only over the tree and shared between worker
/// threads, so they must be `Send + Sync`.
pub trait LintRule: Send + Sync {
    fn info(&self) -> &RuleInfo;

    fn id(&self) -> &str {
        &self.info().id
    }

    /// All findings in document order
    fn check(&self, tree: &SyntaxTree, resolver: &dyn TypeResolver) -> Vec<RuleMatch>;
}
