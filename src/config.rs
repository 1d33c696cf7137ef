//! Configuration for the linter engine
//!
//! Reads configuration from:
//! - `.subtrackrc.yaml` / `.subtrackrc.json` / `subtrack.yaml` (project-level)
//! - the same names in the home directory (user-level)

use crate::diagnostic::Severity;
use crate::no_subscribe::{
    PatternSet, RuleConfig, DEFAULT_CONSTRUCTORS, DEFAULT_TRACKED_VERB, DEFAULT_TYPE_PATTERNS,
    DEFAULT_VERB, RULE_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names searched by [`Config::load_default`], in order
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".subtrackrc.yaml",
    ".subtrackrc.yml",
    ".subtrackrc.json",
    "subtrack.yaml",
    "subtrack.json",
];

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lint files in parallel
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    pub color: ColorMode,

    /// Verbose output
    pub verbose: bool,

    /// Source lines shown around each diagnostic
    pub context: usize,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Compact,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "compact" => Ok(OutputFormat::Compact),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// File handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Include patterns
    pub include: Vec<String>,

    /// Exclude patterns
    pub exclude: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include: vec![
                "**/*.ts".to_string(),
                "**/*.js".to_string(),
                "**/*.mjs".to_string(),
            ],
            exclude: vec![
                "**/node_modules/**".to_string(),
                "**/*.d.ts".to_string(),
                "**/dist/**".to_string(),
            ],
        }
    }
}

/// Settings of the `no-subscribe` rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoSubscribeConfig {
    pub enabled: bool,

    /// Overrides the rule's default severity
    pub severity: Option<Severity>,

    /// Member name that acquires a subscription
    pub verb: String,

    /// Member name of the tracked acquisition, used in help text
    pub tracked_verb: String,

    /// Regexes matched against the receiver's type name
    pub type_patterns: Vec<String>,

    /// Callee names of subscribable constructions (`new Observable(...)`)
    pub constructors: Vec<String>,
}

impl Default for NoSubscribeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
            verb: DEFAULT_VERB.to_string(),
            tracked_verb: DEFAULT_TRACKED_VERB.to_string(),
            type_patterns: DEFAULT_TYPE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            constructors: DEFAULT_CONSTRUCTORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl NoSubscribeConfig {
    /// Compile into the rule's immutable configuration
    pub fn to_rule_config(&self) -> Result<RuleConfig, ConfigError> {
        if self.verb.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "rules.no-subscribe.verb must not be empty".to_string(),
            ));
        }
        for pattern in &self.type_patterns {
            if let Err(source) = regex::Regex::new(pattern) {
                return Err(ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                });
            }
        }
        let patterns = PatternSet::new(&self.type_patterns).map_err(|source| {
            ConfigError::Pattern {
                pattern: self.type_patterns.join(", "),
                source,
            }
        })?;
        Ok(RuleConfig::new(patterns)
            .with_verb(&self.verb)
            .with_tracked_verb(&self.tracked_verb)
            .with_constructors(self.constructors.iter().cloned()))
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Severity overrides (rule_id -> severity)
    pub severity: HashMap<String, Severity>,

    /// Per-file rule ignores (glob pattern -> rule IDs)
    pub per_file: HashMap<String, Vec<String>>,

    #[serde(rename = "no-subscribe")]
    pub no_subscribe: NoSubscribeConfig,
}

/// Inline disable comment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineDisableConfig {
    /// Comment prefix (`// <prefix>-next-line <rule>`)
    pub prefix: String,
}

impl Default for InlineDisableConfig {
    fn default() -> Self {
        Self {
            prefix: "subtrack-disable".to_string(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extend from other configuration files or presets
    pub extends: Vec<String>,

    pub engine: EngineConfig,

    pub output: OutputConfig,

    pub files: FilesConfig,

    pub rules: RulesConfig,

    pub inline_disable: InlineDisableConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a preset configuration by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "recommended" => Some(Self::default()),
            "strict" => Some(Self::preset_strict()),
            _ => None,
        }
    }

    /// Strict preset - untracked subscriptions are errors
    fn preset_strict() -> Self {
        let mut config = Self::default();
        config.rules.no_subscribe.severity = Some(Severity::Error);
        config
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_depth(path, 0)
    }

    /// Load with recursion depth limit (to prevent infinite loops)
    fn load_with_depth(path: &Path, depth: usize) -> Result<Self, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        log::debug!("loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        if !config.extends.is_empty() {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let mut base_config = Self::default();

            for extend in &config.extends.clone() {
                let extended = if let Some(preset) = Self::preset(extend) {
                    preset
                } else {
                    let extend_path = if Path::new(extend).is_absolute() {
                        PathBuf::from(extend)
                    } else {
                        base_dir.join(extend)
                    };
                    Self::load_with_depth(&extend_path, depth + 1)?
                };
                base_config.merge(extended);
            }

            base_config.merge(config);
            config = base_config;
        }

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        // Extends are not inherited

        if other.engine.jobs != 0 {
            self.engine.jobs = other.engine.jobs;
        }
        self.engine.parallel = other.engine.parallel;

        if other.output.format != OutputFormat::Text {
            self.output.format = other.output.format;
        }
        if other.output.verbose {
            self.output.verbose = true;
        }
        if other.output.color != ColorMode::Auto {
            self.output.color = other.output.color;
        }
        if other.output.context != 0 {
            self.output.context = other.output.context;
        }

        // Files - extend lists, skipping duplicates of the defaults
        for pattern in other.files.include {
            if !self.files.include.contains(&pattern) {
                self.files.include.push(pattern);
            }
        }
        for pattern in other.files.exclude {
            if !self.files.exclude.contains(&pattern) {
                self.files.exclude.push(pattern);
            }
        }

        self.rules.disabled.extend(other.rules.disabled);
        if !other.rules.enabled.is_empty() {
            self.rules.enabled = other.rules.enabled;
        }
        self.rules.severity.extend(other.rules.severity);
        for (pattern, rules) in other.rules.per_file {
            self.rules.per_file.entry(pattern).or_default().extend(rules);
        }

        // Rule settings - other takes precedence where it differs from the default
        let defaults = NoSubscribeConfig::default();
        let theirs = other.rules.no_subscribe;
        let ours = &mut self.rules.no_subscribe;
        if !theirs.enabled {
            ours.enabled = false;
        }
        if theirs.severity.is_some() {
            ours.severity = theirs.severity;
        }
        if theirs.verb != defaults.verb {
            ours.verb = theirs.verb;
        }
        if theirs.tracked_verb != defaults.tracked_verb {
            ours.tracked_verb = theirs.tracked_verb;
        }
        if theirs.type_patterns != defaults.type_patterns {
            ours.type_patterns = theirs.type_patterns;
        }
        if theirs.constructors != defaults.constructors {
            ours.constructors = theirs.constructors;
        }

        if other.inline_disable.prefix != InlineDisableConfig::default().prefix {
            self.inline_disable.prefix = other.inline_disable.prefix;
        }
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_default_from(Path::new("."))
    }

    /// Load configuration by probing `dir`, then the home directory
    pub fn load_default_from(dir: &Path) -> Result<Self, ConfigError> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in CONFIG_FILE_NAMES {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        log::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(&mut self, cli: CliOverrides) {
        if let Some(f) = cli.format {
            self.output.format = f;
        }
        if let Some(v) = cli.verbose {
            self.output.verbose = v;
        }
        if let Some(j) = cli.jobs {
            self.engine.jobs = j;
        }
        if let Some(c) = cli.context {
            self.output.context = c;
        }
        if cli.no_color {
            self.output.color = ColorMode::Never;
        }
        if let Some(verb) = cli.verb {
            self.rules.no_subscribe.verb = verb;
        }
        if !cli.patterns.is_empty() {
            self.rules.no_subscribe.type_patterns = cli.patterns;
        }
        if !cli.constructors.is_empty() {
            self.rules.no_subscribe.constructors = cli.constructors;
        }
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        if rule_id == RULE_ID && !self.rules.no_subscribe.enabled {
            return false;
        }

        if self.rules.disabled.iter().any(|r| r == rule_id) {
            return false;
        }

        if !self.rules.enabled.is_empty() {
            return self.rules.enabled.iter().any(|r| r == rule_id);
        }

        true
    }

    /// Get severity override for a rule
    pub fn get_severity_override(&self, rule_id: &str) -> Option<Severity> {
        if let Some(severity) = self.rules.severity.get(rule_id) {
            return Some(*severity);
        }
        if rule_id == RULE_ID {
            return self.rules.no_subscribe.severity;
        }
        None
    }

    /// Check if a rule should be ignored for a file
    pub fn should_ignore_rule_for_file(&self, rule_id: &str, file_path: &Path) -> bool {
        let file_str = file_path.to_string_lossy();

        for (pattern, rules) in &self.rules.per_file {
            match globset::Glob::new(pattern) {
                Ok(glob) => {
                    let matcher = glob.compile_matcher();
                    if matcher.is_match(file_str.as_ref())
                        && rules.iter().any(|r| r == "all" || r == rule_id)
                    {
                        return true;
                    }
                }
                Err(e) => log::warn!("ignoring invalid per_file pattern '{}': {}", pattern, e),
            }
        }

        false
    }
}

/// Command-line values that override the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub format: Option<OutputFormat>,
    pub verbose: Option<bool>,
    pub jobs: Option<usize>,
    pub context: Option<usize>,
    pub no_color: bool,
    pub verb: Option<String>,
    pub patterns: Vec<String>,
    pub constructors: Vec<String>,
}
