//! Compact output formatter
//!
//! One line per diagnostic, for editors and scripts.

use super::OutputFormatter;
use crate::diagnostic::Diagnostic;
use crate::engine::LintResult;

/// Compact one-line-per-diagnostic formatter
pub struct CompactFormatter {
    pub show_severity: bool,
    pub show_rule: bool,
}

impl CompactFormatter {
    pub fn new() -> Self {
        Self {
            show_severity: true,
            show_rule: true,
        }
    }

    /// Hide severity prefix
    pub fn without_severity(mut self) -> Self {
        self.show_severity = false;
        self
    }

    /// Hide rule ID
    pub fn without_rule(mut self) -> Self {
        self.show_rule = false;
        self
    }
}

impl Default for CompactFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for CompactFormatter {
    fn format(&self, result: &LintResult) -> String {
        result
            .diagnostics
            .iter()
            .map(|d| self.format_diagnostic(d) + "\n")
            .collect()
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let loc = &diagnostic.location;
        let mut parts = vec![format!("{}:{}:{}", loc.file.display(), loc.line, loc.column)];
        if self.show_severity {
            parts.push(diagnostic.severity.to_string());
        }
        if self.show_rule {
            parts.push(diagnostic.rule_id.clone());
        }
        parts.push(diagnostic.message.clone());
        parts.join(": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Location, Severity};
    use std::path::PathBuf;

    fn diag(rule: &str, severity: Severity, line: usize) -> Diagnostic {
        Diagnostic::new(
            rule,
            severity,
            "Do not use 'subscribe(...)'.",
            Location::new(PathBuf::from("app.ts"), line, 5),
        )
    }

    #[test]
    fn test_compact_format() {
        let output = CompactFormatter::new().format_diagnostic(&diag("no-subscribe", Severity::Error, 10));
        assert_eq!(
            output,
            "app.ts:10:5: error: no-subscribe: Do not use 'subscribe(...)'."
        );
    }

    #[test]
    fn test_compact_minimal() {
        let formatter = CompactFormatter::new().without_severity().without_rule();
        let output = formatter.format_diagnostic(&diag("no-subscribe", Severity::Warning, 1));
        assert_eq!(output, "app.ts:1:5: Do not use 'subscribe(...)'.");
    }

    #[test]
    fn test_compact_result() {
        let result = LintResult {
            diagnostics: vec![
                diag("no-subscribe", Severity::Warning, 1),
                diag("parse-error", Severity::Warning, 2),
            ],
            files_processed: 1,
            warning_count: 2,
            ..Default::default()
        };

        let output = CompactFormatter::new().format(&result);
        assert_eq!(output.lines().count(), 2);
    }
}
