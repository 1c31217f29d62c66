use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tooleval::cli;
use tooleval::cli::run::RunOptions;
use tooleval::error::EvalError;

#[derive(Parser)]
#[command(name = "tooleval", version)]
#[command(about = "Evaluate tool-calling behavior of locally served models", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evaluation suite and write a report
    Run {
        /// Suite JSON file ("builtin" or omitted for the built-in suite)
        #[arg(long)]
        suite: Option<String>,

        /// Only evaluate prompts in this category
        #[arg(long)]
        category: Option<String>,

        /// Path to config file (defaults to ./tooleval.toml or ~/.config/tooleval/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Override the served model
        #[arg(long)]
        model: Option<String>,

        /// Adapter weights to load on top of the model
        #[arg(long)]
        adapter: Option<String>,

        /// Use an already running endpoint instead of booting a server
        #[arg(long)]
        endpoint: Option<String>,

        /// Do not start or stop the server
        #[arg(long)]
        no_manage_server: bool,

        /// Report output path
        #[arg(short = 'o', long, default_value = "tooleval-report.json")]
        output: String,

        /// Use a mock client and skip the server
        #[arg(long)]
        dry_run: bool,
    },
    /// Compare two or more reports; the first is the baseline
    Compare {
        #[arg(required = true, num_args = 2..)]
        reports: Vec<String>,

        /// Write the comparison as JSON
        #[arg(short = 'o', long)]
        output: Option<String>,
    },
    /// Print the tool calls recovered from a model output file ("-" for stdin)
    Extract { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            suite,
            category,
            config,
            model,
            adapter,
            endpoint,
            no_manage_server,
            output,
            dry_run,
        } => {
            let options = RunOptions {
                suite,
                category,
                config,
                model,
                adapter,
                endpoint,
                no_manage_server,
                output,
                dry_run,
            };
            if let Err(err) = cli::run::run(options).await {
                if let Some(eval_err) = err.downcast_ref::<EvalError>() {
                    if eval_err.is_infrastructure() {
                        eprintln!("Error: {}", eval_err);
                        std::process::exit(2);
                    }
                }
                return Err(err);
            }
        }
        Commands::Compare { reports, output } => {
            cli::compare::run(&reports, output)?;
        }
        Commands::Extract { path } => {
            cli::extract::run(&path)?;
        }
    }

    Ok(())
}
