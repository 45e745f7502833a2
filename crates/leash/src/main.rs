//! Run a budget-guarded task over a text file and print the result.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Analyze a document with the default budget
//! leash report.txt
//!
//! # Triage a log file under a tighter budget
//! leash server.log --task find_errors_in_log --cost 0.10 --timeout 30
//!
//! # Start from a policy file, override the model
//! leash notes.txt --config guard.json --model anthropic/claude-3-haiku
//! ```
//!
//! Exit status is 0 when the task completed, 2 when a cost or runtime
//! budget cut it short, and 1 on any error.

use clap::{Parser, ValueEnum};
use leash::guard::{GuardConfig, GuardConfigBuilder};
use leash::runner::{TaskOutput, TaskRunner, TaskScope};
use leash::subcall::OpenRouterBackend;
use leash::{OpenRouterClient, tasks};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Execute a task with guarded language-model subcalls.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "leash", version)]
struct Cli {
    /// Path to the context file to process
    context_file: PathBuf,

    /// Task to execute
    #[arg(long, value_enum, default_value_t = TaskKind::AnalyzeDocument)]
    task: TaskKind,

    // ── Budget ─────────────────────────────────────────────────
    /// JSON file with guard settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum cost budget in USD [default: 0.50]
    #[arg(long)]
    cost: Option<f64>,

    /// Maximum runtime in seconds [default: 60]
    #[arg(long)]
    timeout: Option<f64>,

    /// Maximum estimated tokens per subcall [default: 4000]
    #[arg(long)]
    tokens: Option<u64>,

    /// Model to use; pricing follows the model [default: openai/gpt-4o-mini]
    #[arg(long)]
    model: Option<String>,

    // ── Output ─────────────────────────────────────────────────
    /// Verbose logging on stderr
    #[arg(long)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(long, conflicts_with = "debug")]
    quiet: bool,

    /// Print JSON on a single line
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
#[value(rename_all = "snake_case")]
enum TaskKind {
    /// Extract title, abstract, key points, conclusion
    AnalyzeDocument,
    /// Find and classify errors in log files
    FindErrorsInLog,
    /// Extract named entities from text
    ExtractEntities,
}

impl TaskKind {
    fn task(self) -> fn(&TaskScope<'_>) -> leash::Result<Value> {
        match self {
            TaskKind::AnalyzeDocument => tasks::analyze_document,
            TaskKind::FindErrorsInLog => tasks::find_errors_in_log,
            TaskKind::ExtractEntities => tasks::extract_entities,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(output) => process::exit(output.exit_code()),
        Err(e) => {
            eprintln!("ERROR: {e}");
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<TaskOutput, String> {
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable not set.".to_string())?;
    let config = build_config(&cli)?;
    let context = read_context(&cli.context_file)?;

    debug!(
        "Task: {:?}, context: {} ({} chars)",
        cli.task,
        cli.context_file.display(),
        context.chars().count()
    );

    let client = OpenRouterClient::new(api_key)?;
    let handle = tokio::runtime::Handle::current();
    let task = cli.task.task();

    // The guarded core is synchronous; keep it off the runtime workers.
    let output = tokio::task::spawn_blocking(move || {
        let backend = OpenRouterBackend::new(client, config.model(), handle);
        TaskRunner::new(&backend)
            .with_config(config)
            .run(&context, task)
    })
    .await
    .map_err(|e| format!("task thread failed: {e}"))?;

    print_output(&output, cli.compact)?;
    Ok(output)
}

/// Defaults, then the optional config file, then explicit flags.
fn build_config(cli: &Cli) -> Result<GuardConfig, String> {
    let mut builder: GuardConfigBuilder = match &cli.config {
        Some(path) => GuardConfig::load(path)
            .map_err(|e| e.to_string())?
            .to_builder(),
        None => GuardConfig::builder(),
    };
    if let Some(cost) = cli.cost {
        builder = builder.max_cost(cost);
    }
    if let Some(seconds) = cli.timeout {
        builder = builder.max_runtime_seconds(seconds);
    }
    if let Some(tokens) = cli.tokens {
        builder = builder.max_tokens_per_subcall(tokens);
    }
    if let Some(model) = &cli.model {
        builder = builder.model_with_rates(model.as_str());
    }
    builder.build().map_err(|e| e.to_string())
}

fn read_context(path: &Path) -> Result<String, String> {
    if !path.exists() {
        return Err(format!("Context file not found: {}", path.display()));
    }
    let context = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read context file: {e}"))?;
    if context.trim().is_empty() {
        return Err("Context file is empty.".to_string());
    }
    Ok(context)
}

fn print_output(output: &TaskOutput, compact: bool) -> Result<(), String> {
    let json = if compact {
        serde_json::to_string(output)
    } else {
        serde_json::to_string_pretty(output)
    }
    .map_err(|e| format!("failed to serialize output: {e}"))?;

    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("FINAL_ANSWER");
    println!("{rule}");
    println!("{json}");
    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        LevelFilter::DEBUG
    } else if cli.quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with(level)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
