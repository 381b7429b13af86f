//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use telemetry_query_helper::collector::loop_main::{CollectorOptions, spawn_collector};
use telemetry_query_helper::collector::sampler::{SystemSampler, default_hostname};
use telemetry_query_helper::collector::signals::SignalHandler;
use telemetry_query_helper::core::config::Config;
use telemetry_query_helper::core::errors::TqhError;
use telemetry_query_helper::llm::client::OllamaClient;
use telemetry_query_helper::logger::jsonl::{JsonlConfig, JsonlWriter};
use telemetry_query_helper::query::pipeline::AskPipeline;
use telemetry_query_helper::query::translator::QueryTranslator;
use telemetry_query_helper::query::validator::SqlPolicy;
use telemetry_query_helper::store::sqlite::{CellValue, MetricsStore, ResultSet};

/// Telemetry Query Helper — natural-language questions over host telemetry.
#[derive(Debug, Parser)]
#[command(
    name = "tqh",
    author,
    version,
    about = "Telemetry Query Helper - ask your host how it has been doing",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the metric collector loop in the foreground.
    Collector(CollectorArgs),
    /// Ask a natural-language question about recent telemetry.
    Ask(AskArgs),
    /// Show store health: row count and newest sample.
    Status(StatusArgs),
    /// Show the effective configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct CollectorArgs {
    /// Override the sampling interval in seconds.
    #[arg(long, value_name = "SECONDS")]
    interval_secs: Option<u64>,
    /// Override the hostname recorded on samples.
    #[arg(long, value_name = "NAME")]
    hostname: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct AskArgs {
    /// The question, e.g. "Which hosts had >65% CPU usage in the last hour?"
    #[arg(value_name = "QUESTION")]
    question: String,
    /// Print the generated SQL alongside the answer.
    #[arg(long)]
    show_sql: bool,
    /// Translate and validate only; print the SQL without executing it.
    #[arg(long, conflicts_with = "show_sql")]
    sql_only: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct StatusArgs {
    /// Also print the N most recent samples.
    #[arg(long, value_name = "N")]
    recent: Option<u32>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Print built-in defaults instead of the effective configuration.
    #[arg(long)]
    show_default: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<TqhError> for CliError {
    fn from(error: TqhError) -> Self {
        match &error {
            TqhError::TranslationFailed { .. } | TqhError::UnsafeQuery { .. } => {
                Self::User(user_message(&error))
            }
            _ => Self::Runtime(user_message(&error)),
        }
    }
}

/// Every failure kind gets a distinct, non-generic message so "bad question",
/// "unsafe request blocked", and "query engine error" stay tellable apart.
fn user_message(error: &TqhError) -> String {
    match error {
        TqhError::TranslationFailed { details } => {
            format!("could not understand the question as a data query ({details})")
        }
        TqhError::UnsafeQuery { details } => {
            format!("the generated query was blocked as unsafe and was not executed ({details})")
        }
        TqhError::QueryFailed { details } => {
            format!("the query engine rejected the generated SQL: {details}")
        }
        TqhError::StoreBusy { .. } => {
            "the telemetry store is busy right now; try again shortly".to_string()
        }
        TqhError::SummaryUnavailable { details } => {
            format!("couldn't generate a summary ({details})")
        }
        other => other.to_string(),
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Collector(args) => run_collector(cli, args),
        Command::Ask(args) => run_ask(cli, args),
        Command::Status(args) => run_status(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn output_mode(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|error| CliError::User(error.to_string()))
}

// ──────────────────── collector ────────────────────

fn run_collector(cli: &Cli, args: &CollectorArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;

    let interval = Duration::from_secs(
        args.interval_secs
            .unwrap_or(config.collector.interval_seconds)
            .max(1),
    );
    let hostname = args
        .hostname
        .clone()
        .or_else(|| config.collector.hostname_override.clone())
        .unwrap_or_else(default_hostname);

    let store = MetricsStore::new(&config.paths.db_file);
    let events = JsonlWriter::open(JsonlConfig::at(&config.paths.jsonl_log));
    let options = CollectorOptions {
        interval,
        hostname: hostname.clone(),
        busy_retry: Duration::from_millis(config.collector.busy_retry_ms),
    };

    if !cli.quiet {
        println!(
            "{} collecting into {} every {}s as host '{}' (Ctrl-C to stop)",
            "tqh:".bold(),
            config.paths.db_file.display(),
            interval.as_secs(),
            hostname
        );
    }

    let signals = SignalHandler::new();
    let handle = spawn_collector(store, Box::new(SystemSampler::new()), options, events)?;

    while !signals.should_shutdown() {
        std::thread::sleep(Duration::from_millis(200));
    }
    handle.stop();

    if !cli.quiet {
        println!("{} collector stopped", "tqh:".bold());
    }
    Ok(())
}

// ──────────────────── ask ────────────────────

fn run_ask(cli: &Cli, args: &AskArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let llm = Arc::new(OllamaClient::new(&config.llm));

    if args.sql_only {
        let translator = QueryTranslator::new(llm);
        let sql = translator.translate(&args.question)?;
        SqlPolicy::new().validate(&sql)?;
        match output_mode(cli) {
            OutputMode::Human => println!("{sql}"),
            OutputMode::Json => emit_json(&json!({ "sql": sql }))?,
        }
        return Ok(());
    }

    let pipeline = AskPipeline::new(&config, llm)?;
    let answer = pipeline.ask(&args.question)?;

    match output_mode(cli) {
        OutputMode::Human => {
            if args.show_sql || cli.verbose {
                eprintln!("{} {}", "sql:".dimmed(), answer.sql.dimmed());
            }
            if answer.is_degraded() {
                eprintln!("{}", "warning: summarizer unavailable".yellow());
            }
            println!("{}", answer.display_text());
        }
        OutputMode::Json => {
            emit_json(&json!({
                "request_id": answer.request_id,
                "question": answer.question,
                "sql": answer.sql,
                "columns": answer.rows.columns,
                "rows": rows_to_json(&answer.rows),
                "truncated": answer.rows.truncated,
                "summary": answer.summary,
                "degraded": answer.is_degraded(),
            }))?;
        }
    }
    Ok(())
}

fn rows_to_json(rows: &ResultSet) -> Vec<Vec<Value>> {
    rows.rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    CellValue::Null => Value::Null,
                    CellValue::Integer(v) => json!(v),
                    CellValue::Real(v) => json!(v),
                    CellValue::Text(v) => json!(v),
                })
                .collect()
        })
        .collect()
}

// ──────────────────── status ────────────────────

fn run_status(cli: &Cli, args: &StatusArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let store = MetricsStore::new(&config.paths.db_file);

    if !store.exists() {
        match output_mode(cli) {
            OutputMode::Human => {
                println!(
                    "{} no telemetry store at {} — run `tqh collector` first",
                    "tqh:".bold(),
                    config.paths.db_file.display()
                );
            }
            OutputMode::Json => {
                emit_json(&json!({
                    "exists": false,
                    "path": config.paths.db_file,
                }))?;
            }
        }
        return Ok(());
    }

    let rows = store.count_rows()?;
    let newest = store.newest_timestamp()?;

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{} {}", "store:".bold(), config.paths.db_file.display());
            println!("{} {rows}", "rows:".bold());
            match &newest {
                Some(ts) => println!("{} {ts} UTC", "newest:".bold()),
                None => println!("{} (none yet)", "newest:".bold()),
            }
        }
        OutputMode::Json => {
            emit_json(&json!({
                "exists": true,
                "path": config.paths.db_file,
                "rows": rows,
                "newest_timestamp": newest,
            }))?;
        }
    }

    if let Some(n) = args.recent {
        let sql = format!(
            "SELECT * FROM system_metrics ORDER BY timestamp DESC LIMIT {}",
            n.min(1000)
        );
        let recent = store.query_with_limit(&sql, 1000)?;
        match output_mode(cli) {
            OutputMode::Human => print!("\n{}", recent.render_table()),
            OutputMode::Json => emit_json(&json!({
                "columns": recent.columns,
                "rows": rows_to_json(&recent),
            }))?,
        }
    }

    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let config = if args.show_default {
        Config::default()
    } else {
        load_config(cli)?
    };
    let rendered = config
        .to_toml()
        .map_err(|error| CliError::Runtime(error.to_string()))?;
    match output_mode(cli) {
        OutputMode::Human => print!("{rendered}"),
        OutputMode::Json => {
            let value = serde_json::to_value(&config)?;
            emit_json(&value)?;
        }
    }
    Ok(())
}

// ──────────────────── output helpers ────────────────────

fn emit_json(value: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
