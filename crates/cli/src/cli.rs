use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "costsync")]
#[command(about = "Resolve cost configurations and reconcile them into the budgeting system")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (overrides COSTSYNC_CONFIG and the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Run,
    /// Run one reconcile pass and print its report
    Sync,
    /// Resolve and validate the catalog without syncing
    Resolve(ResolveArgs),
    /// Print the persisted sync state
    State,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Only show entries for this service
    #[arg(short, long)]
    pub service: Option<String>,

    /// Exit non-zero when any entry is invalid or unresolvable
    #[arg(long)]
    pub strict: bool,
}
