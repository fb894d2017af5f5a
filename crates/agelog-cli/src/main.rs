#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "agelog: point-in-time issue age reports from tracker changelogs",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format. Defaults to pretty on a terminal and csv when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Path to the project config (defaults to ./agelog.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn format_flag(&self) -> Option<&'static str> {
        self.format.map(OutputMode::as_str)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Reports",
        about = "Daily open-issue age rollup",
        long_about = "Reconstruct every issue's state on each day of a date range and \
                      report the average age of open issues overall, per project and \
                      per project/team.",
        after_help = "EXAMPLES:\n    # Age report for January from a snapshot\n    agelog age --input issues.jsonl --start 2015-01-01 --end 2015-01-31\n\n    # Read the snapshot from stdin, write CSV to a file\n    agelog age --start 2015-01-01 --output ages.csv < issues.json\n\n    # Emit machine-readable output\n    agelog age --input issues.jsonl --start 2015-01-01 --format json"
    )]
    Age(cmd::age::AgeArgs),

    #[command(
        next_help_heading = "Reports",
        about = "Flat per-issue listing",
        long_about = "Project each issue in a snapshot onto a list of named fields.",
        after_help = "EXAMPLES:\n    # Default columns\n    agelog issues --input issues.jsonl\n\n    # Pick columns\n    agelog issues --input issues.jsonl --fields key,status,created"
    )]
    Issues(cmd::issues::IssuesArgs),

    #[command(
        next_help_heading = "Tracker",
        about = "Download a snapshot from Jira",
        long_about = "Page through a Jira JQL search with changelogs expanded and write \
                      one issue per JSONL line.",
        after_help = "EXAMPLES:\n    # Fetch open bugs\n    agelog fetch --site https://jira.example.com --jql 'project = CNVS' --output issues.jsonl\n\n    # Token from the environment\n    JIRA_TOKEN=... agelog fetch --jql 'project = CNVS' > issues.jsonl"
    )]
    Fetch(cmd::fetch::FetchArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    agelog completions bash\n\n    # Generate zsh completions\n    agelog completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("AGELOG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "agelog=debug,info"
        } else {
            "agelog=info,warn"
        })
    });

    let format = env::var("AGELOG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let project_root = env::current_dir()?;
    let config = agelog_core::config::resolve_config(
        &project_root,
        cli.config.as_deref(),
        cli.format_flag(),
    )?;
    let ctx = cmd::Context {
        output: OutputMode::from_resolved(&config.resolved_output),
        quiet: cli.quiet,
        config,
    };
    debug!(output = ctx.output.as_str(), "resolved output mode");

    match &cli.command {
        Commands::Age(args) => cmd::age::run_age(args, &ctx),
        Commands::Issues(args) => cmd::issues::run_issues(args, &ctx),
        Commands::Fetch(args) => cmd::fetch::run_fetch(args, &ctx),
        Commands::Completions(_) => Ok(()),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    // Errors may happen before config loads, so only the flag and env count here.
    let error_mode = OutputMode::from_resolved(&agelog_core::config::resolve_output(
        cli.format_flag(),
        None,
        env::var("FORMAT").ok(),
        true,
    ));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cli_error = CliError::from_anyhow(&err);
            let stderr = std::io::stderr();
            let mut out = stderr.lock();
            if output::render_error(&mut out, error_mode, &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
