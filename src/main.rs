//! Subtrack CLI - flags subscriptions acquired outside a tracking registry

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use glob::glob;
use std::path::PathBuf;
use subtrack::config::{CliOverrides, ColorMode, Config, OutputFormat};
use subtrack::engine::Engine;
use subtrack::output::formatter_for;
use subtrack::rule::RuleInfo;
use subtrack::Severity;

#[derive(Parser)]
#[command(
    name = "subtrack",
    version,
    about = "Flags untracked subscribe calls",
    long_about = "Lints TypeScript/JavaScript sources for subscriptions acquired without \
                  a tracking registry. Directories are searched for files matching the \
                  configured include globs."
)]
struct Cli {
    /// Files, directories or glob patterns to lint (default: current directory)
    files: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Member name that acquires a subscription
    #[arg(long)]
    verb: Option<String>,

    /// Subscribable type pattern (regex, repeatable; replaces the configured list)
    #[arg(long = "pattern")]
    patterns: Vec<String>,

    /// Callee name of a subscribable construction (repeatable)
    #[arg(long = "constructor")]
    constructors: Vec<String>,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Show source context lines around findings
    #[arg(long)]
    context: Option<usize>,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Show detailed information about a rule and exit
    #[arg(long)]
    explain: Option<String>,

    /// Show per-rule timing statistics
    #[arg(long)]
    timing: bool,

    /// Exit with 0 even if problems are found
    #[arg(long)]
    exit_zero: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Compact,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Compact => OutputFormat::Compact,
        }
    }
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Error => "error".red(),
        Severity::Warning => "warning".yellow(),
        Severity::Info => "info".blue(),
    }
}

fn print_rule(info: &RuleInfo) {
    println!(
        "    {} [{}] ({})",
        info.id.cyan(),
        severity_label(info.severity),
        info.category
    );
    if let Some(desc) = &info.description {
        println!("      {}", desc);
    }
    if !info.tags.is_empty() {
        println!("      Tags: {}", info.tags.join(", "));
    }
}

fn explain_rule(info: &RuleInfo) {
    println!("{}", "Rule Details".bold());
    println!();
    println!("  {}: {}", "ID".bold(), info.id.cyan());
    println!("  {}: {}", "Severity".bold(), severity_label(info.severity));
    println!("  {}: {}", "Category".bold(), info.category);

    if let Some(desc) = &info.description {
        println!();
        println!("  {}", "Description".bold());
        println!("  {}", desc);
    }
    if let Some(rationale) = &info.rationale {
        println!();
        println!("  {}", "Rationale".bold());
        println!("  {}", rationale);
    }
    if let Some(bad) = &info.example_bad {
        println!();
        println!("  {} {}", "Example".bold(), "(incorrect)".red());
        for line in bad.lines() {
            println!("    {}", line);
        }
    }
    if let Some(good) = &info.example_good {
        println!();
        println!("  {} {}", "Example".bold(), "(correct)".green());
        for line in good.lines() {
            println!("    {}", line);
        }
    }
}

/// Expand CLI arguments into paths; anything that is not an existing path is a glob
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    if inputs.is_empty() {
        return Ok(vec![PathBuf::from(".")]);
    }

    let mut paths = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if path.exists() {
            paths.push(path);
            continue;
        }
        let matches = glob(input).with_context(|| format!("Invalid pattern '{}'", input))?;
        let before = paths.len();
        paths.extend(matches.flatten());
        if paths.len() == before {
            log::warn!("'{}' matched no files", input);
        }
    }
    Ok(paths)
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };

    config.merge_cli(CliOverrides {
        format: cli.format.map(OutputFormat::from),
        verbose: cli.verbose.then_some(true),
        jobs: cli.jobs,
        context: cli.context,
        no_color: cli.no_color,
        verb: cli.verb.clone(),
        patterns: cli.patterns.clone(),
        constructors: cli.constructors.clone(),
    });

    match config.output.color {
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Auto => {}
    }

    let engine = Engine::new(config).context("Invalid configuration")?;

    if cli.list_rules {
        println!("{}", "Available rules:".bold());
        for rule in engine.rules() {
            print_rule(rule.info());
        }
        return Ok(0);
    }

    if let Some(rule_id) = &cli.explain {
        let Some(rule) = engine.rules().iter().find(|r| r.id() == rule_id) else {
            bail!("Unknown rule '{}'", rule_id);
        };
        explain_rule(rule.info());
        return Ok(0);
    }

    let inputs = expand_inputs(&cli.files)?;
    let files = engine.collect_files(&inputs);
    if files.is_empty() {
        bail!("No files found to lint");
    }

    if engine.config().output.verbose {
        eprintln!("Linting {} files...", files.len());
    }

    let result = engine.lint(&files);

    let colored = engine.config().output.color != ColorMode::Never;
    let formatter = formatter_for(engine.config().output.format, colored);
    print!("{}", formatter.format(&result));

    if cli.timing {
        eprintln!();
        eprintln!("{}", result.format_timings());
    }

    Ok(if cli.exit_zero { 0 } else { result.exit_code() })
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(2);
        }
    }
}
