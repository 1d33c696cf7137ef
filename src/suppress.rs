//! Inline disable comments
//!
//! Supported forms, with `subtrack-disable` as the default prefix:
//!
//! ```text
//! // subtrack-disable-next-line no-subscribe
//! this.events$.subscribe(handler);
//!
//! this.events$.subscribe(handler); // subtrack-disable-line no-subscribe -- owned by the router
//!
//! /* subtrack-disable-file all: generated code */
//! ```
//!
//! Several rule ids may be listed, separated by commas. `all` matches every rule.

use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Rule id that disables every rule
pub const ALL_RULES: &str = "all";

/// Line number used for file-level entries
const FILE_LEVEL: usize = 0;

/// A single disable comment, as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableInfo {
    /// Line the comment applies to (0 for file-level)
    pub line: usize,
    pub rule_id: String,
    pub reason: Option<String>,
}

/// Compiles the disable-comment pattern for one prefix
#[derive(Debug, Clone)]
pub struct SuppressionParser {
    comment_re: Regex,
}

impl SuppressionParser {
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        // <prefix>-<scope> id[, id...] [: reason | -- reason]
        let pattern = format!(
            r"(?://|/\*)\s*{}-(next-line|line|file)\s+([\w-]+(?:\s*,\s*[\w-]+)*)(?:\s*:\s*(.+?)|\s+--\s+(.+?))?\s*(?:\*/|$)",
            regex::escape(prefix)
        );
        Ok(Self {
            comment_re: Regex::new(&pattern)?,
        })
    }

    /// Scan `source` line by line
    pub fn parse(&self, source: &str) -> Suppressions {
        let mut suppressions = Suppressions::default();

        for (i, line) in source.lines().enumerate() {
            let line_num = i + 1;
            for cap in self.comment_re.captures_iter(line) {
                let target = match &cap[1] {
                    "next-line" => line_num + 1,
                    "line" => line_num,
                    _ => FILE_LEVEL,
                };
                // Reason from either capture group 3 (colon style) or 4 (double-dash style)
                let reason = cap
                    .get(3)
                    .or_else(|| cap.get(4))
                    .map(|m| m.as_str().trim().to_string());

                for rule_id in cap[2].split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    suppressions.insert(rule_id, target, reason.clone());
                }
            }
        }

        suppressions
    }
}

/// Disable comments found in one file
#[derive(Debug, Clone, Default)]
pub struct Suppressions {
    disabled_lines: HashMap<String, HashSet<usize>>,
    disabled_file_rules: HashSet<String>,
    /// rule_id -> line -> reason
    disable_reasons: HashMap<String, HashMap<usize, String>>,
}

impl Suppressions {
    fn insert(&mut self, rule_id: &str, line: usize, reason: Option<String>) {
        if line == FILE_LEVEL {
            self.disabled_file_rules.insert(rule_id.to_string());
        } else {
            self.disabled_lines
                .entry(rule_id.to_string())
                .or_default()
                .insert(line);
        }
        if let Some(r) = reason {
            self.disable_reasons
                .entry(rule_id.to_string())
                .or_default()
                .insert(line, r);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.disabled_lines.is_empty() && self.disabled_file_rules.is_empty()
    }

    /// Whether `rule_id` is disabled on `line`, by a line or file comment
    pub fn is_disabled(&self, rule_id: &str, line: usize) -> bool {
        self.is_disabled_for_file(rule_id)
            || [rule_id, ALL_RULES].iter().any(|id| {
                self.disabled_lines
                    .get(*id)
                    .is_some_and(|lines| lines.contains(&line))
            })
    }

    pub fn is_disabled_for_file(&self, rule_id: &str) -> bool {
        self.disabled_file_rules.contains(rule_id) || self.disabled_file_rules.contains(ALL_RULES)
    }

    /// Get the reason why a rule was disabled at a specific line
    pub fn reason(&self, rule_id: &str, line: usize) -> Option<&str> {
        [rule_id, ALL_RULES].iter().find_map(|id| {
            let lines = self.disable_reasons.get(*id)?;
            lines.get(&line).or_else(|| lines.get(&FILE_LEVEL)).map(String::as_str)
        })
    }

    /// All disable comments, ordered by line then rule id
    pub fn all(&self) -> Vec<DisableInfo> {
        let reason_for = |rule_id: &str, line: usize| {
            self.disable_reasons
                .get(rule_id)
                .and_then(|m| m.get(&line))
                .cloned()
        };

        let mut disables: Vec<DisableInfo> = self
            .disabled_file_rules
            .iter()
            .map(|rule_id| DisableInfo {
                line: FILE_LEVEL,
                rule_id: rule_id.clone(),
                reason: reason_for(rule_id, FILE_LEVEL),
            })
            .collect();

        for (rule_id, lines) in &self.disabled_lines {
            for &line in lines {
                disables.push(DisableInfo {
                    line,
                    rule_id: rule_id.clone(),
                    reason: reason_for(rule_id, line),
                });
            }
        }

        disables.sort_by(|a, b| (a.line, &a.rule_id).cmp(&(b.line, &b.rule_id)));
        disables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Suppressions {
        SuppressionParser::new("subtrack-disable").unwrap().parse(source)
    }

    #[test]
    fn test_next_line() {
        let s = parse("// subtrack-disable-next-line no-subscribe\nx.subscribe();\n");
        assert!(s.is_disabled("no-subscribe", 2));
        assert!(!s.is_disabled("no-subscribe", 1));
        assert!(!s.is_disabled("parse-error", 2));
    }

    #[test]
    fn test_same_line_with_reason() {
        let s = parse("x.subscribe(); // subtrack-disable-line no-subscribe -- owned by router\n");
        assert!(s.is_disabled("no-subscribe", 1));
        assert_eq!(s.reason("no-subscribe", 1), Some("owned by router"));
    }

    #[test]
    fn test_file_level_block_comment() {
        let s = parse("/* subtrack-disable-file all: generated */\nx.subscribe();\n");
        assert!(s.is_disabled_for_file("no-subscribe"));
        assert!(s.is_disabled("anything", 40));
        assert_eq!(s.reason("no-subscribe", 2), Some("generated"));
    }

    #[test]
    fn test_rule_list() {
        let s = parse("// subtrack-disable-next-line no-subscribe, parse-error\n");
        assert!(s.is_disabled("no-subscribe", 2));
        assert!(s.is_disabled("parse-error", 2));
        assert_eq!(s.all().len(), 2);
    }

    #[test]
    fn test_custom_prefix_and_plain_comments() {
        let parser = SuppressionParser::new("lint.off").unwrap();
        let s = parser.parse("// lint.off-line no-subscribe\n// subtrack-disable-line no-subscribe\n");
        assert!(s.is_disabled("no-subscribe", 1));
        assert!(!s.is_disabled("no-subscribe", 2));

        assert!(parse("// just a comment\nconst a = 1;\n").is_empty());
    }

    #[test]
    fn test_all_ordering() {
        let s = parse(
            "// subtrack-disable-next-line b\n// subtrack-disable-file a\n// subtrack-disable-line a\n",
        );
        let lines: Vec<(usize, String)> =
            s.all().into_iter().map(|d| (d.line, d.rule_id)).collect();
        assert_eq!(
            lines,
            vec![(0, "a".to_string()), (2, "b".to_string()), (3, "a".to_string())]
        );
    }
}
