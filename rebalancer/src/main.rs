//! CLI entry point for the driftbook rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use driftbook_rebalancer::config::Config;
use driftbook_rebalancer::error::Error;
use driftbook_rebalancer::execution::{self, RunOptions};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Multi-account portfolio rebalancer")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults apply if the file is absent)
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute a rebalance plan and optionally export it
    Plan {
        /// Path to portfolio.json
        portfolio: PathBuf,

        /// JSON quote file for public securities
        #[arg(long)]
        quotes: Option<PathBuf>,

        /// Write the plan as JSON Lines
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite the output file without asking
        #[arg(long)]
        force: bool,
    },

    /// Show the current allocation and deviations
    Allocation {
        /// Path to portfolio.json
        portfolio: PathBuf,

        /// JSON quote file for public securities
        #[arg(long)]
        quotes: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {e}");
                process::exit(1);
            }
        }
    } else {
        log::info!("{} not found, using defaults", cli.config.display());
        Config::default()
    };

    let result = match cli.command {
        Command::Plan {
            portfolio,
            quotes,
            output,
            force,
        } => {
            let opts = RunOptions {
                portfolio_file: portfolio,
                quotes_file: quotes,
                output,
                force,
            };
            execution::run_plan(&config, &opts).map(|_| ())
        }
        Command::Allocation { portfolio, quotes } => {
            execution::show_allocation(&config, &portfolio, quotes.as_deref())
        }
    };

    if let Err(e) = result {
        match &e {
            Error::CheckFailed(msg) => eprintln!("\nAborted: {msg}"),
            Error::Aborted(msg) => eprintln!("{msg}"),
            _ => eprintln!("Error: {e}"),
        }
        process::exit(exit_code(&e));
    }
}

/// 0 for a declined overwrite, 2 for failed plan checks, 1 otherwise.
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Aborted(_) => 0,
        Error::CheckFailed(_) => 2,
        _ => 1,
    }
}
