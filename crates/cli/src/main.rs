//! KernelTune CLI, the main entry point.
//!
//! Commands:
//! - `run`     Tune kernel parameters against the training workload
//! - `params`  Show the tunable parameters under the current feature flags
//! - `prompt`  Print the system prompt and first request
//! - `config`  Print the effective configuration
//! - `doctor`  Diagnose configuration and model server

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "kerneltune",
    about = "KernelTune: LLM-driven sysctl tuning for training workloads",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ./kerneltune.toml, then ~/.kerneltune/config.toml)
    #[arg(short, long, global = true, env = "KERNELTUNE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tuning session
    Run {
        /// Override agent.max_steps
        #[arg(long)]
        max_steps: Option<u32>,

        /// Override tuning.target_ratio (e.g. 0.08 for 8% faster)
        #[arg(long)]
        target: Option<f64>,

        /// Feature-flag file (overrides flags_path)
        #[arg(long)]
        flags: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Write the full conversation to this file as JSON
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Show the tunable parameters
    Params {
        /// Feature-flag file (overrides flags_path)
        #[arg(long)]
        flags: Option<PathBuf>,
    },

    /// Print the system prompt and the first request
    Prompt {
        /// Feature-flag file (overrides flags_path)
        #[arg(long)]
        flags: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },

    /// Diagnose configuration, flags and the model server
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            max_steps,
            target,
            flags,
            json,
            transcript,
        } => {
            let options = commands::run::RunOptions {
                max_steps,
                target,
                flags,
                json,
                transcript,
            };
            commands::run::run(config_path, options).await?
        }
        Commands::Params { flags } => commands::params::run(config_path, flags.as_deref())?,
        Commands::Prompt { flags } => commands::prompt::run(config_path, flags.as_deref())?,
        Commands::Config { default } => commands::config_cmd::run(config_path, default)?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
