//! Coherence CLI
//!
//! Inspect the coherence math and run a simulated session against the
//! in-memory backends.
//!
//! # Commands
//!
//! - `label <score>`: state label for a score
//! - `decay`: score after time away
//! - `day`: day counter for an origin and optional stored day
//! - `identity show`: local visitor identity in a file-backed store
//! - `simulate`: run a full session until a duration elapses or Ctrl+C
//!
//! # Exit Codes
//! - 0: Success
//! - 1: Recoverable error
//! - 2: Blocking failure (corrupt local state, internal error)

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use coherence_core::{Config, CoreResult};

mod commands;
mod error;

pub use error::{exit_code_for_error, CliExitCode};

/// Coherence CLI - score inspection and session simulation
#[derive(Parser)]
#[command(name = "coherence-cli")]
#[command(version)]
#[command(about = "Inspect coherence scores and simulate synchronized sessions")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML configuration file. Defaults to config/ layering plus COHERENCE__* env vars.
    #[arg(long, global = true, env = "COHERENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the state label for a score
    Label(commands::inspect::LabelArgs),
    /// Apply time-away decay to a score
    Decay(commands::inspect::DecayArgs),
    /// Compute the day counter
    Day(commands::inspect::DayArgs),
    /// Local identity commands
    Identity {
        #[command(subcommand)]
        action: commands::identity::IdentityCommands,
    },
    /// Run a session against in-memory backends
    Simulate(commands::simulate::SimulateArgs),
}

fn load_config(path: Option<&PathBuf>) -> CoreResult<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let (level, include_target) = match &config {
        Ok(c) => (c.logging.level.clone(), c.logging.include_target),
        Err(_) => ("warn".to_string(), true),
    };
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(include_target)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            eprintln!("Error: {}", e);
            std::process::exit(CliExitCode::from(&e).into());
        }
    };

    let exit_code = match cli.command {
        Commands::Label(args) => commands::inspect::label_command(args),
        Commands::Decay(args) => commands::inspect::decay_command(args, &config),
        Commands::Day(args) => commands::inspect::day_command(args, &config),
        Commands::Identity { action } => {
            commands::identity::handle_identity_command(action, &config)
        }
        Commands::Simulate(args) => commands::simulate::simulate_command(args, config).await,
    };

    std::process::exit(exit_code);
}
