//! Command handlers for the `plan` subcommands.
//!
//! The CLI reads the plan store directly instead of starting a planner, so
//! inspecting records never recovers or resubmits plans.

use anyhow::{Context, Result};
use log::debug;
use marshal_core::{
    check_success, PlanError, PlanId, PlanRecords, PlanStore, PlanVerdict, PruneReport,
};

use crate::{
    args::{ListPlansArgs, PlanCommands, PruneArgs},
    renderer::TerminalRenderer,
};

/// Number of plans listed when `marshal` runs without a subcommand.
pub const RECENT_PLANS: usize = 20;

pub struct Cli {
    store: PlanStore,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(store: PlanStore, renderer: TerminalRenderer) -> Self {
        Self { store, renderer }
    }

    pub async fn handle_plan_command(&self, command: PlanCommands) -> Result<()> {
        match command {
            PlanCommands::List(args) => self.list_plans(args).await,
            PlanCommands::Show(args) => self.show_plan(args.id).await,
            PlanCommands::Assert(args) => self.assert_plan(args.id).await,
            PlanCommands::Prune(args) => self.prune(args).await,
        }
    }

    pub async fn list_plans(&self, args: ListPlansArgs) -> Result<()> {
        let records = match args.start {
            Some(start) => self.store.get_plan_range(start, args.count).await,
            None => self.store.recent_plans(args.count).await,
        }
        .context("Failed to list plans")?;
        debug!("Listing {} plan(s)", records.len());

        let title = match args.start {
            Some(start) => format!("# Plans from {start}\n\n"),
            None => "# Recent plans\n\n".to_string(),
        };
        self.renderer
            .render(&format!("{title}{}", PlanRecords(records)))
    }

    async fn show_plan(&self, id: PlanId) -> Result<()> {
        let record = self
            .store
            .get_plan(id)
            .await?
            .ok_or(PlanError::PlanNotFound { id })?;
        self.renderer.render(&record.to_string())
    }

    async fn assert_plan(&self, id: PlanId) -> Result<()> {
        let record = self
            .store
            .get_plan(id)
            .await?
            .ok_or(PlanError::PlanNotFound { id })?;
        self.renderer.render(&PlanVerdict(&record).to_string())?;
        check_success(&record).with_context(|| format!("Plan {id} did not succeed"))
    }

    async fn prune(&self, args: PruneArgs) -> Result<()> {
        let limit = args.limit.unwrap_or_else(|| self.store.limit());
        let removed = self
            .store
            .prune(limit)
            .await
            .context("Failed to prune plans")?;

        self.renderer
            .render(&PruneReport { removed, limit }.to_string())
    }
}
