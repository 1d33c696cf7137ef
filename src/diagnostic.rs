//! Diagnostic types for lint results

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity level for diagnostics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Source code location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path
    pub file: PathBuf,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in characters)
    pub column: usize,
    /// Length of the highlighted region
    pub length: usize,
}

impl Location {
    pub fn new(file: PathBuf, line: usize, column: usize) -> Self {
        Self {
            file,
            line,
            column,
            length: 0,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

/// A reported problem in a source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Rule ID that triggered this diagnostic
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    /// The source line (for display)
    pub source_line: Option<String>,
    /// Context lines before the flagged line
    #[serde(default)]
    pub context_before: Vec<(usize, String)>,
    /// Context lines after the flagged line
    #[serde(default)]
    pub context_after: Vec<(usize, String)>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(rule_id: &str, severity: Severity, message: &str, location: Location) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity,
            message: message.to_string(),
            location,
            source_line: None,
            context_before: Vec::new(),
            context_after: Vec::new(),
            help: None,
        }
    }

    /// Add source line for display
    pub fn with_source_line(mut self, line: &str) -> Self {
        self.source_line = Some(line.to_string());
        self
    }

    /// Add `context_count` lines on each side of the flagged line
    pub fn with_context(mut self, source_lines: &[&str], context_count: usize) -> Self {
        if context_count == 0 || self.location.line == 0 {
            return self;
        }

        let line_num = self.location.line;

        let start = line_num.saturating_sub(context_count + 1);
        let end = line_num.saturating_sub(1);
        for (i, line) in source_lines
            .iter()
            .enumerate()
            .skip(start)
            .take(end.saturating_sub(start))
        {
            self.context_before.push((i + 1, line.to_string()));
        }

        let end = (line_num + context_count).min(source_lines.len());
        for (i, line) in source_lines
            .iter()
            .enumerate()
            .skip(line_num)
            .take(end.saturating_sub(line_num))
        {
            self.context_after.push((i + 1, line.to_string()));
        }

        self
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("hint".parse::<Severity>(), Ok(Severity::Info));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_diagnostic_creation() {
        let loc = Location::new(PathBuf::from("app.component.ts"), 10, 5).with_length(9);
        let diag = Diagnostic::new("no-subscribe", Severity::Error, "Test message", loc)
            .with_source_line("    this.events$.subscribe();")
            .with_help("Use subscribeAndTrack");

        assert_eq!(diag.rule_id, "no-subscribe");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.location.length, 9);
        assert!(diag.source_line.is_some());
        assert_eq!(diag.help.as_deref(), Some("Use subscribeAndTrack"));
    }

    #[test]
    fn test_context_lines() {
        let lines = vec!["a", "b", "c", "d", "e"];
        let loc = Location::new(PathBuf::from("x.ts"), 3, 1);
        let diag = Diagnostic::new("r", Severity::Warning, "m", loc).with_context(&lines, 1);
        assert_eq!(diag.context_before, vec![(2, "b".to_string())]);
        assert_eq!(diag.context_after, vec![(4, "d".to_string())]);

        let loc = Location::new(PathBuf::from("x.ts"), 1, 1);
        let diag = Diagnostic::new("r", Severity::Warning, "m", loc).with_context(&lines, 2);
        assert!(diag.context_before.is_empty());
        assert_eq!(diag.context_after.len(), 2);
    }
}
