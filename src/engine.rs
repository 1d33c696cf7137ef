//! Core linter engine

use crate::config::{Config, ConfigError, FilesConfig};
use crate::diagnostic::{Diagnostic, Location, Severity};
use crate::no_subscribe::NoSubscribeRule;
use crate::resolve::{DeclaredTypeResolver, TypeResolver};
use crate::rule::LintRule;
use crate::suppress::{SuppressionParser, Suppressions};
use crate::syntax::{parse, Span, SyntaxTree};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Rule id reported for recovered syntax errors
pub const PARSE_ERROR: &str = "parse-error";

/// Rule id reported for unreadable files
pub const FILE_READ_ERROR: &str = "file-read-error";

/// Per-rule timing statistics
#[derive(Debug, Clone, Default)]
pub struct RuleTiming {
    pub rule_id: String,
    /// Total time spent on this rule
    pub total_time: Duration,
    /// Number of files the rule ran on
    pub evaluation_count: usize,
    /// Number of findings, before inline disables
    pub match_count: usize,
}

impl RuleTiming {
    pub fn new(rule_id: &str) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            ..Default::default()
        }
    }

    /// Average time per evaluation
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Result of linting operation
#[derive(Debug, Default)]
pub struct LintResult {
    pub diagnostics: Vec<Diagnostic>,

    pub files_processed: usize,

    pub files_with_errors: usize,

    pub files_with_warnings: usize,

    pub error_count: usize,

    pub warning_count: usize,

    pub info_count: usize,

    /// Diagnostics dropped by inline disable comments
    pub suppressed_count: usize,

    /// Processing duration
    pub duration: Duration,

    /// Per-rule timing statistics (rule_id -> timing)
    pub rule_timings: HashMap<String, RuleTiming>,
}

impl LintResult {
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    /// Check if result is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.error_count > 0 {
            2
        } else if self.warning_count > 0 {
            1
        } else {
            0
        }
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: LintResult) {
        self.diagnostics.extend(other.diagnostics);
        self.files_processed += other.files_processed;
        self.files_with_errors += other.files_with_errors;
        self.files_with_warnings += other.files_with_warnings;
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.info_count += other.info_count;
        self.suppressed_count += other.suppressed_count;

        for (rule_id, timing) in other.rule_timings {
            let entry = self
                .rule_timings
                .entry(rule_id)
                .or_insert_with(|| RuleTiming::new(&timing.rule_id));
            entry.total_time += timing.total_time;
            entry.evaluation_count += timing.evaluation_count;
            entry.match_count += timing.match_count;
        }
    }

    /// Get rule timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rule_timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        timings
    }

    /// Format timing statistics as a table
    pub fn format_timings(&self) -> String {
        let timings = self.sorted_timings();
        if timings.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::from("Rule Timing Statistics:\n");
        output.push_str(&format!(
            "{:<24} {:>12} {:>12} {:>8} {:>10}\n",
            "Rule ID", "Total", "Avg", "Files", "Matches"
        ));
        output.push_str(&"-".repeat(70));
        output.push('\n');

        for timing in timings {
            let total_ms = timing.total_time.as_secs_f64() * 1000.0;
            let avg_us = timing.avg_time().as_secs_f64() * 1_000_000.0;
            output.push_str(&format!(
                "{:<24} {:>10.2}ms {:>10.2}µs {:>8} {:>10}\n",
                timing.rule_id, total_ms, avg_us, timing.evaluation_count, timing.match_count
            ));
        }

        output
    }

    fn count(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => self.info_count += 1,
        }
    }
}

/// Include/exclude globs from the `files` section
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new(files: &FilesConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            include: build_globset(&files.include)?,
            exclude: build_globset(&files.exclude)?,
        })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.is_match(path)
    }

    /// Included and not excluded
    pub fn matches(&self, path: &Path) -> bool {
        self.include.is_match(path) && !self.is_excluded(path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// The main linter engine
pub struct Engine {
    config: Config,

    rules: Vec<Box<dyn LintRule>>,

    resolver: Box<dyn TypeResolver + Send + Sync>,

    suppression_parser: SuppressionParser,

    file_filter: FileFilter,

    /// Number of context lines to include
    context_lines: usize,
}

impl Engine {
    /// Build the rule set from configuration
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let rule_config = config.rules.no_subscribe.to_rule_config()?;
        let prefix = &config.inline_disable.prefix;
        let suppression_parser =
            SuppressionParser::new(prefix).map_err(|source| ConfigError::Pattern {
                pattern: prefix.clone(),
                source,
            })?;
        let file_filter = FileFilter::new(&config.files)?;
        let context_lines = config.output.context;

        Ok(Self {
            config,
            rules: vec![Box::new(NoSubscribeRule::new(rule_config))],
            resolver: Box::new(DeclaredTypeResolver::new()),
            suppression_parser,
            file_filter,
            context_lines,
        })
    }

    /// Replace the declaration-based resolver, e.g. with one backed by a type checker
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: TypeResolver + Send + Sync + 'static,
    {
        self.resolver = Box::new(resolver);
        self
    }

    /// Set the number of context lines to include
    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &[Box<dyn LintRule>] {
        &self.rules
    }

    /// Expand directories into the source files they contain.
    ///
    /// Files found by walking a directory must match `files.include`; files
    /// named explicitly only have to escape `files.exclude`.
    pub fn collect_files(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                self.walk_dir(path, &mut files);
            } else if !self.file_filter.is_excluded(path) {
                files.push(path.clone());
            }
        }
        files.sort();
        files.dedup();
        files
    }

    fn walk_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("skipping directory {}: {}", dir.display(), e);
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if !self.file_filter.is_excluded(&path) {
                    self.walk_dir(&path, files);
                }
            } else if file_type.is_file() && self.file_filter.matches(&path) {
                files.push(path);
            }
        }
    }

    /// Lint multiple files
    pub fn lint(&self, files: &[PathBuf]) -> LintResult {
        let start = Instant::now();

        let results: Vec<LintResult> = if self.config.engine.parallel && files.len() > 1 {
            let jobs = if self.config.engine.jobs > 0 {
                self.config.engine.jobs
            } else {
                num_cpus::get()
            };
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(|| files.par_iter().map(|f| self.lint_file(f)).collect()),
                Err(e) => {
                    log::warn!("thread pool unavailable ({}), linting sequentially", e);
                    files.iter().map(|f| self.lint_file(f)).collect()
                }
            }
        } else {
            files.iter().map(|f| self.lint_file(f)).collect()
        };

        let mut combined = LintResult::default();
        for result in results {
            combined.merge(result);
        }

        combined.duration = start.elapsed();
        combined
    }

    /// Lint a single file
    pub fn lint_file(&self, path: &Path) -> LintResult {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("cannot read {}: {}", path.display(), e);
                let mut result = LintResult {
                    files_processed: 1,
                    files_with_errors: 1,
                    ..LintResult::default()
                };
                result.diagnostics.push(Diagnostic::new(
                    FILE_READ_ERROR,
                    Severity::Error,
                    &format!("Failed to read file: {}", e),
                    Location::new(path.to_path_buf(), 0, 0),
                ));
                result.count(Severity::Error);
                return result;
            }
        };

        self.lint_source(path, &content)
    }

    /// Lint in-memory source text as if it were the file at `path`
    pub fn lint_source(&self, path: &Path, content: &str) -> LintResult {
        let start = Instant::now();
        let mut result = LintResult {
            files_processed: 1,
            ..LintResult::default()
        };

        let parsed = parse(content);
        let suppressions = self.suppression_parser.parse(content);
        let source_lines: Vec<&str> = content.lines().collect();
        let tree = &parsed.tree;

        let mut candidates: Vec<Diagnostic> = Vec::new();

        if self.is_active(PARSE_ERROR, path) {
            for error in &parsed.errors {
                candidates.push(self.build_diagnostic(
                    tree,
                    path,
                    &source_lines,
                    PARSE_ERROR,
                    Severity::Warning,
                    &format!("Parse error: {}", error),
                    error.span(),
                    None,
                ));
            }
        }

        for rule in &self.rules {
            let info = rule.info();
            if !self.is_active(&info.id, path) {
                continue;
            }

            let rule_start = Instant::now();
            let matches = rule.check(tree, self.resolver.as_ref());
            let timing = result
                .rule_timings
                .entry(info.id.clone())
                .or_insert_with(|| RuleTiming::new(&info.id));
            timing.total_time += rule_start.elapsed();
            timing.evaluation_count += 1;
            timing.match_count += matches.len();

            let severity = self
                .config
                .get_severity_override(&info.id)
                .unwrap_or(info.severity);
            for m in matches {
                candidates.push(self.build_diagnostic(
                    tree,
                    path,
                    &source_lines,
                    &info.id,
                    severity,
                    &m.message,
                    m.span,
                    m.help.as_deref(),
                ));
            }
        }

        for diag in candidates {
            if is_suppressed(&suppressions, &diag) {
                result.suppressed_count += 1;
                continue;
            }
            result.count(diag.severity);
            result.diagnostics.push(diag);
        }
        result
            .diagnostics
            .sort_by_key(|d| (d.location.line, d.location.column));

        if result.error_count > 0 {
            result.files_with_errors = 1;
        }
        if result.warning_count > 0 {
            result.files_with_warnings = 1;
        }

        log::debug!(
            "{}: {} nodes, {} diagnostics, {} suppressed",
            path.display(),
            tree.len(),
            result.diagnostics.len(),
            result.suppressed_count
        );
        result.duration = start.elapsed();
        result
    }

    /// Enabled in configuration and not ignored for this file
    fn is_active(&self, rule_id: &str, path: &Path) -> bool {
        self.config.is_rule_enabled(rule_id)
            && !self.config.should_ignore_rule_for_file(rule_id, path)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_diagnostic(
        &self,
        tree: &SyntaxTree,
        path: &Path,
        source_lines: &[&str],
        rule_id: &str,
        severity: Severity,
        message: &str,
        span: Span,
        help: Option<&str>,
    ) -> Diagnostic {
        let (line, column) = tree.line_col(span.start);
        let length = tree
            .source()
            .get(span.start..span.end)
            .map_or(span.len(), |s| s.chars().count());
        let location = Location::new(path.to_path_buf(), line, column).with_length(length);
        let mut diag = Diagnostic::new(rule_id, severity, message, location);

        if line > 0 && line <= source_lines.len() {
            diag = diag.with_source_line(source_lines[line - 1]);
            if self.context_lines > 0 {
                diag = diag.with_context(source_lines, self.context_lines);
            }
        }

        if let Some(help) = help {
            diag = diag.with_help(help);
        }
        diag
    }
}

fn is_suppressed(suppressions: &Suppressions, diag: &Diagnostic) -> bool {
    suppressions.is_disabled(&diag.rule_id, diag.location.line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolvedType;
    use crate::syntax::SyntaxNode;
    use tempfile::TempDir;

    const COMPONENT: &str = r#"
import { Subject } from 'rxjs';

class Widget {
  private events$: Subject<string> = new Subject<string>();

  start() {
    this.events$.subscribe(e => console.log(e));
  }
}
"#;

    fn engine() -> Engine {
        Engine::new(Config::default()).unwrap()
    }

    #[test]
    fn test_lint_source_reports_plain_violation() {
        let result = engine().lint_source(Path::new("widget.ts"), COMPONENT);
        assert_eq!(result.warning_count, 1, "{:?}", result.diagnostics);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.rule_id, "no-subscribe");
        assert_eq!(diag.location.line, 8);
        assert_eq!(diag.location.column, 18);
        assert_eq!(diag.location.length, "subscribe".len());
        assert_eq!(
            diag.source_line.as_deref(),
            Some("    this.events$.subscribe(e => console.log(e));")
        );
        assert!(diag.help.as_deref().is_some_and(|h| h.contains("subscribeAndTrack")));
        assert_eq!(result.files_with_warnings, 1);
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_severity_override() {
        let mut config = Config::default();
        config
            .rules
            .severity
            .insert("no-subscribe".to_string(), Severity::Error);
        let result = Engine::new(config)
            .unwrap()
            .lint_source(Path::new("widget.ts"), COMPONENT);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.exit_code(), 2);
    }

    #[test]
    fn test_inline_disable_next_line() {
        let source = COMPONENT.replace(
            "    this.events$.subscribe",
            "    // subtrack-disable-next-line no-subscribe -- lives as long as the app\n    this.events$.subscribe",
        );
        let result = engine().lint_source(Path::new("widget.ts"), &source);
        assert!(result.is_clean());
        assert_eq!(result.suppressed_count, 1);
    }

    #[test]
    fn test_inline_disable_file_all() {
        let source = format!("// subtrack-disable-file all\n{}", COMPONENT);
        let result = engine().lint_source(Path::new("widget.ts"), &source);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_per_file_ignore() {
        let mut config = Config::default();
        config
            .rules
            .per_file
            .insert("**/*.spec.ts".to_string(), vec!["no-subscribe".to_string()]);
        let engine = Engine::new(config).unwrap();
        assert!(engine
            .lint_source(Path::new("src/widget.spec.ts"), COMPONENT)
            .is_clean());
        assert!(!engine.lint_source(Path::new("src/widget.ts"), COMPONENT).is_clean());
    }

    #[test]
    fn test_disabled_rule() {
        let mut config = Config::default();
        config.rules.no_subscribe.enabled = false;
        let result = Engine::new(config)
            .unwrap()
            .lint_source(Path::new("widget.ts"), COMPONENT);
        assert!(result.is_clean());
        assert!(result.rule_timings.is_empty());
    }

    #[test]
    fn test_parse_errors_are_warnings_and_analysis_continues() {
        let source = "const s: Subject<number> = make();\ns.subscribe(x => x);\nconst broken = (;\n";
        let result = engine().lint_source(Path::new("broken.ts"), source);
        assert!(result.diagnostics.iter().any(|d| d.rule_id == PARSE_ERROR));
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.rule_id == "no-subscribe" && d.location.line == 2));
        assert_eq!(result.error_count, 0);
    }

    #[test]
    fn test_custom_resolver() {
        let resolver = |node: SyntaxNode<'_>| -> Option<ResolvedType> {
            (node.text() == "store").then(|| ResolvedType::named("Observable"))
        };
        let engine = engine().with_resolver(resolver);
        let result = engine.lint_source(Path::new("a.ts"), "store.subscribe(render);\n");
        assert_eq!(result.warning_count, 1);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let mut config = Config::default();
        config.rules.no_subscribe.type_patterns = vec!["[".to_string()];
        assert!(matches!(Engine::new(config), Err(ConfigError::Pattern { .. })));
    }

    #[test]
    fn test_context_lines() {
        let result = engine()
            .with_context_lines(1)
            .lint_source(Path::new("widget.ts"), COMPONENT);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.context_before, vec![(7, "  start() {".to_string())]);
        assert_eq!(diag.context_after, vec![(9, "  }".to_string())]);
    }

    #[test]
    fn test_lint_files_in_parallel() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.ts");
        let b = dir.path().join("b.ts");
        std::fs::write(&a, COMPONENT).unwrap();
        std::fs::write(&b, "const x = 1;\n").unwrap();
        let missing = dir.path().join("missing.ts");

        let result = engine().lint(&[a, b, missing]);
        assert_eq!(result.files_processed, 3);
        assert_eq!(result.warning_count, 1);
        assert_eq!(result.error_count, 1);
        assert!(result.diagnostics.iter().any(|d| d.rule_id == FILE_READ_ERROR));
        assert_eq!(result.rule_timings["no-subscribe"].evaluation_count, 2);
    }

    #[test]
    fn test_collect_files_applies_filters() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/rxjs")).unwrap();
        std::fs::write(root.join("src/app.ts"), "").unwrap();
        std::fs::write(root.join("src/nested/util.js"), "").unwrap();
        std::fs::write(root.join("src/types.d.ts"), "").unwrap();
        std::fs::write(root.join("src/readme.md"), "").unwrap();
        std::fs::write(root.join("node_modules/rxjs/index.js"), "").unwrap();

        let files = engine().collect_files(&[root.to_path_buf()]);
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["app.ts", "util.js"]);
    }
}
