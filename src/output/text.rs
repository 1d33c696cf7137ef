//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Diagnostic, Severity};
use crate::engine::LintResult;
use colored::*;
use std::collections::BTreeMap;

/// Text formatter with optional color support
pub struct TextFormatter {
    pub colored: bool,

    /// Show the flagged source line with a caret underline
    pub show_source: bool,

    pub show_help: bool,

    /// Show the summary footer
    pub show_stats: bool,

    /// Show context lines before/after
    pub show_context: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_source: true,
            show_help: true,
            show_stats: true,
            show_context: true,
        }
    }
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.colored {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn severity_str(&self, severity: Severity) -> String {
        let s = severity.to_string();
        match severity {
            Severity::Error => self.paint(&s, |t| t.red().bold()),
            Severity::Warning => self.paint(&s, |t| t.yellow().bold()),
            Severity::Info => self.paint(&s, |t| t.blue()),
        }
    }

    fn gutter(&self) -> String {
        self.paint("|", |t| t.blue())
    }

    fn context_line(&self, line_num: usize, line: &str) -> String {
        format!(
            "{} {} {}\n",
            self.paint(&format!("{:>4}", line_num), |t| t.dimmed()),
            self.gutter(),
            self.paint(line, |t| t.dimmed())
        )
    }

    fn plural(count: usize, one: &str, many: &str) -> String {
        format!("{} {}", count, if count == 1 { one } else { many })
    }

    fn summary(&self, result: &LintResult) -> String {
        let mut output = format!(
            "\n{} processed",
            Self::plural(result.files_processed, "file", "files")
        );

        let mut counts = Vec::new();
        if result.error_count > 0 {
            counts.push(self.paint(&Self::plural(result.error_count, "error", "errors"), |t| t.red()));
        }
        if result.warning_count > 0 {
            counts.push(self.paint(
                &Self::plural(result.warning_count, "warning", "warnings"),
                |t| t.yellow(),
            ));
        }
        if result.info_count > 0 {
            counts.push(self.paint(&Self::plural(result.info_count, "info", "infos"), |t| t.blue()));
        }
        if counts.is_empty() {
            output.push_str(&format!(": {}", self.paint("no problems", |t| t.green())));
        } else {
            output.push_str(&format!(": {}", counts.join(", ")));
        }
        if result.suppressed_count > 0 {
            output.push_str(&format!(" ({} suppressed)", result.suppressed_count));
        }
        output.push('\n');

        output.push_str(&format!(
            "Finished in {:.2}s\n",
            result.duration.as_secs_f64()
        ));
        output
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &LintResult) -> String {
        let mut output = String::new();

        let mut by_file: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for diag in &result.diagnostics {
            by_file.entry(&diag.location.file).or_default().push(diag);
        }

        for (file, diagnostics) in &by_file {
            output.push_str(&self.paint(&file.display().to_string(), |t| t.underline()));
            output.push('\n');
            for diag in diagnostics {
                output.push_str(&self.format_diagnostic(diag));
                output.push('\n');
            }
        }

        if self.show_stats {
            output.push_str(&self.summary(result));
        }

        output
    }

    fn format_diagnostic(&self, diag: &Diagnostic) -> String {
        let loc = &diag.location;
        let mut output = format!(
            "{}:{}:{}: {}[{}]: {}\n",
            loc.file.display(),
            loc.line,
            loc.column,
            self.severity_str(diag.severity),
            self.paint(&diag.rule_id, |t| t.cyan()),
            diag.message
        );

        if self.show_source {
            if let Some(source) = &diag.source_line {
                output.push_str(&format!("     {}\n", self.gutter()));

                if self.show_context {
                    for (line_num, line) in &diag.context_before {
                        output.push_str(&self.context_line(*line_num, line));
                    }
                }

                output.push_str(&format!(
                    "{} {} {}\n",
                    self.paint(&format!("{:>4}", loc.line), |t| t.blue()),
                    self.gutter(),
                    source
                ));

                if loc.column > 0 {
                    let padding = " ".repeat(loc.column - 1);
                    let underline = "^".repeat(loc.length.max(1));
                    output.push_str(&format!(
                        "     {} {}{}\n",
                        self.gutter(),
                        padding,
                        self.paint(&underline, |t| t.red())
                    ));
                }

                if self.show_context {
                    for (line_num, line) in &diag.context_after {
                        output.push_str(&self.context_line(*line_num, line));
                    }
                }
            }
        }

        if self.show_help {
            if let Some(help) = &diag.help {
                output.push_str(&format!("     {} help: {}\n", self.paint("=", |t| t.blue()), help));
            }
        }

        output
    }
}
