//! Marshal CLI Application
//!
//! Command-line interface for inspecting and maintaining the plan records
//! written by the Marshal plan engine.

mod args;
mod cli;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands, ListPlansArgs};
use clap::Parser;
use cli::{Cli, RECENT_PLANS};
use log::info;
use marshal_core::{store::DEFAULT_PLAN_LIMIT, PlanStore, PlannerBuilder};
use renderer::TerminalRenderer;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        no_color,
        command,
    } = Args::parse();

    let db_path = match database_file {
        Some(path) => path,
        None => PlannerBuilder::default_database_path()
            .context("Failed to resolve the default database path")?,
    };
    let store = PlanStore::open(db_path, DEFAULT_PLAN_LIMIT)
        .await
        .context("Failed to open plan store")?;
    info!("Marshal opened {}", store.db_path().display());

    let cli = Cli::new(store, TerminalRenderer::new(!no_color));
    match command {
        Some(Commands::Plan { command }) => cli.handle_plan_command(command).await,
        None => {
            cli.list_plans(ListPlansArgs {
                start: None,
                count: RECENT_PLANS,
            })
            .await
        }
    }
}
