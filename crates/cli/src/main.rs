use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{cmd_apply, cmd_plan, cmd_status};

/// enclave - plan and apply multi-component environments
#[derive(Parser)]
#[command(name = "enclave")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Interpret and validate a script, then print and save the plan
  Plan {
    /// Path to the script file
    script: PathBuf,

    /// Print the plan as JSON instead of the summary
    #[arg(long)]
    json: bool,
  },

  /// Apply a script, or resume a saved plan
  Apply {
    /// Path to the script file
    #[arg(required_unless_present = "plan")]
    script: Option<PathBuf>,

    /// Apply a plan file written by `enclave plan` or a previous apply
    #[arg(long, conflicts_with = "script")]
    plan: Option<PathBuf>,

    /// Stop starting new instructions after this long (e.g. "30s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
  },

  /// Show the bundles and components the backend knows about
  Status {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Plan { script, json } => cmd_plan(&script, json),
    Commands::Apply { script, plan, timeout } => cmd_apply(script.as_deref(), plan.as_deref(), timeout),
    Commands::Status { json } => cmd_status(cli.verbose, json),
  }
}
