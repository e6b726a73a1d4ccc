mod conformance;
mod replay;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Vigil check-state engine.
#[derive(Parser)]
#[command(name = "vigil", version, about = "Vigil check-state engine")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded result stream through the engine
    Replay {
        /// Path to the check definitions JSON file (an array of checks)
        #[arg(long)]
        checks: PathBuf,
        /// Path to the results JSON file (an array, replayed in order)
        results: PathBuf,
    },

    /// Run the storage conformance suite against the in-memory backend
    Conformance,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { checks, results } => {
            if let Err(e) = replay::cmd_replay(&checks, &results, cli.output, cli.quiet).await {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
        Commands::Conformance => {
            if !conformance::cmd_conformance(cli.output, cli.quiet).await {
                process::exit(1);
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
