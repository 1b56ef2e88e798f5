mod debug_report;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sssomt::engine::{GeneratorFn, Signature};
use sssomt::{FunctionRegistry, Mapping, Options, RulesetError, TagSelection, TransformContext, apply_with, compile};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, used without `--log-level`.
const LOG_ENV: &str = "SSSOMT_LOG";

#[derive(Parser)]
#[command(name = "sssomt", version, about = "Filter and transform SSSOM mappings with SSSOM/Transform rulesets")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (overrides SSSOMT_LOG).
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevel>,

    /// Force ANSI color output.
    #[arg(long, global = true, conflicts_with = "no_color")]
    color: bool,

    /// Disable ANSI color output.
    #[arg(long = "no-color", global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a ruleset and print its rules, or its errors.
    Check(CheckArgs),
    /// Run a ruleset over a JSON array of mappings.
    Apply(ApplyArgs),
}

#[derive(Args)]
struct CheckArgs {
    #[arg(value_name = "RULESET")]
    ruleset: PathBuf,

    /// Extra prefix declaration, NAME=IRI (repeatable).
    #[arg(long = "prefix", value_name = "NAME=IRI", value_parser = parse_prefix)]
    prefixes: Vec<(String, String)>,
}

#[derive(Args)]
struct ApplyArgs {
    #[arg(value_name = "RULESET")]
    ruleset: PathBuf,

    #[arg(value_name = "MAPPINGS")]
    mappings: PathBuf,

    /// Only run rules carrying this tag (repeatable).
    #[arg(long = "include-tag", value_name = "TAG", conflicts_with = "exclude_tags")]
    include_tags: Vec<String>,

    /// Skip rules carrying this tag (repeatable).
    #[arg(long = "exclude-tag", value_name = "TAG")]
    exclude_tags: Vec<String>,

    /// Extra prefix declaration, NAME=IRI (repeatable).
    #[arg(long = "prefix", value_name = "NAME=IRI", value_parser = parse_prefix)]
    prefixes: Vec<(String, String)>,

    /// Write the resulting mappings here instead of stdout.
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print per-rule metrics to stderr.
    #[arg(long)]
    report: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Error)]
enum Failure {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid mappings in {}: {source}", path.display())]
    Mappings { path: PathBuf, source: serde_json::Error },

    #[error("cannot serialise mappings: {0}")]
    Serialise(#[from] serde_json::Error),

    #[error(transparent)]
    Ruleset(#[from] RulesetError),

    #[error("{0}")]
    Setup(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level, !cli.no_color && io::stderr().is_terminal());
    let color = cli.color || (!cli.no_color && io::stdout().is_terminal());
    let report_color = cli.color || (!cli.no_color && io::stderr().is_terminal());

    let result = match &cli.command {
        Command::Check(args) => run_check(args, color, report_color),
        Command::Apply(args) => run_apply(args, report_color),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        // Diagnostics were already printed.
        Err(Failure::Ruleset(_)) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: Option<LogLevel>, ansi: bool) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.directive()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_ansi(ansi).without_time().init();
}

fn run_check(args: &CheckArgs, color: bool, report_color: bool) -> Result<(), Failure> {
    let source = read(&args.ruleset)?;
    let options = Options { prefixes: args.prefixes.iter().cloned().collect(), ..Default::default() };
    let mut ctx = options.context();
    let rules = compile(&source, registry()?, &mut ctx).inspect_err(|e| {
        debug_report::print_errors(&args.ruleset, e.errors(), report_color);
    })?;
    let rules: Vec<String> = rules.iter().map(ToString::to_string).collect();
    debug_report::print_ruleset(&args.ruleset, &rules, color);
    Ok(())
}

fn run_apply(args: &ApplyArgs, report_color: bool) -> Result<(), Failure> {
    let source = read(&args.ruleset)?;
    let mut mappings: Vec<Mapping> = serde_json::from_str(&read(&args.mappings)?)
        .map_err(|source| Failure::Mappings { path: args.mappings.clone(), source })?;

    let options = Options {
        selection: selection(&args.include_tags, &args.exclude_tags),
        prefixes: args.prefixes.iter().cloned().collect::<BTreeMap<_, _>>(),
        ..Default::default()
    };
    let outcome = apply_with(&source, &mut mappings, registry()?, &options).inspect_err(|e| {
        debug_report::print_errors(&args.ruleset, e.errors(), report_color);
    })?;

    for product in &outcome.products {
        println!("{product}");
    }
    let json = serde_json::to_string_pretty(&mappings)?;
    match &args.output {
        Some(path) => fs::write(path, json + "\n").map_err(|source| Failure::Write { path: path.clone(), source })?,
        None => println!("{json}"),
    }
    if args.report {
        debug_report::print_run(&outcome.metrics, report_color);
    }
    Ok(())
}

/// Built-in functions plus `render(template)`, which produces the rendered
/// template as a string product.
fn registry() -> Result<FunctionRegistry<String>, Failure> {
    let mut registry = FunctionRegistry::new();
    let one = Signature::new("S").map_err(|e| Failure::Setup(e.to_string()))?;
    registry.register_generator("render", one, |args, ctx: &mut TransformContext| {
        let template = ctx.compile_template(&args[0])?;
        let render: GeneratorFn<String> =
            Rc::new(move |m: &Mapping, ctx: &TransformContext| Some(template.render(m, ctx)));
        Ok(render)
    });
    Ok(registry)
}

fn selection(include: &[String], exclude: &[String]) -> TagSelection {
    if !include.is_empty() {
        TagSelection::Include(include.iter().cloned().collect::<BTreeSet<_>>())
    } else if !exclude.is_empty() {
        TagSelection::Exclude(exclude.iter().cloned().collect())
    } else {
        TagSelection::All
    }
}

fn read(path: &Path) -> Result<String, Failure> {
    fs::read_to_string(path).map_err(|source| Failure::Read { path: path.to_path_buf(), source })
}

fn parse_prefix(value: &str) -> Result<(String, String), String> {
    let (name, iri) = value.split_once('=').ok_or_else(|| format!("expected NAME=IRI, found '{value}'"))?;
    let iri = iri.trim().trim_start_matches('<').trim_end_matches('>');
    if name.trim().is_empty() || iri.is_empty() {
        return Err(format!("expected NAME=IRI, found '{value}'"));
    }
    Ok((name.trim().to_string(), iri.to_string()))
}
