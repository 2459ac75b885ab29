//! CostSync command-line entry point

#![allow(clippy::print_stdout)]

mod cli;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use costsync_core::{CatalogSource, SyncStateRepository};
use costsync_infra::{config, init_logging, CostSyncContext, FileCatalogSource};
use tracing::info;

use cli::{Cli, Commands, ResolveArgs};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_with(cli.config.clone()).context("loading configuration")?;
    init_logging(&config.logging)?;

    match &cli.command {
        Commands::Run => serve(CostSyncContext::new(config)?).await,
        Commands::Sync => {
            let context = CostSyncContext::new(config)?;
            let report = context.scheduler().run_now().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.has_failures() {
                bail!("reconcile pass finished with failures");
            }
            Ok(())
        }
        Commands::Resolve(args) => resolve(CostSyncContext::new(config)?, args).await,
        Commands::State => {
            let context = CostSyncContext::new(config)?;
            let Some(db) = context.db.clone() else {
                bail!("sync state is kept in memory; nothing persisted");
            };
            let states = costsync_infra::SqliteSyncStateRepository::new(db).list().await?;
            println!("{}", serde_json::to_string_pretty(&states)?);
            Ok(())
        }
    }
}

async fn serve(mut context: CostSyncContext) -> Result<()> {
    context.start().await?;
    info!("CostSync running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;

    info!("Shutting down");
    context.shutdown().await?;
    Ok(())
}

async fn resolve(context: CostSyncContext, args: &ResolveArgs) -> Result<()> {
    let catalog = FileCatalogSource::from_config(&context.config.catalog).load_snapshot().await?;
    let mut snapshot = context.service.evaluate(Arc::new(catalog)).await;

    if let Some(service) = &args.service {
        snapshot.entries.retain(|key, _| &key.service == service);
    }
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let blocked = snapshot.invalid_count() + snapshot.unresolvable_count();
    if args.strict && blocked > 0 {
        bail!("{blocked} configuration(s) failed resolution or validation");
    }
    Ok(())
}
