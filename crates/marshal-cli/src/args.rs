use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use marshal_core::PlanId;

/// Operator command-line interface for Marshal plan records
///
/// Marshal records cluster administration plans (trees of tasks executed by
/// the plan engine) in a local SQLite store. This tool lists and inspects
/// those records, checks whether a plan succeeded, and prunes old history.
#[derive(Parser)]
#[command(version, about, name = "marshal")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/marshal/plans.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and maintain plan records
    #[command(alias = "p")]
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// List plans, newest first unless --start is given
    #[command(aliases = ["l", "ls"])]
    List(ListPlansArgs),
    /// Show a plan's task tree and latest attempt
    #[command(alias = "s")]
    Show(PlanIdArgs),
    /// Exit with an error unless the plan succeeded
    #[command(alias = "a")]
    Assert(PlanIdArgs),
    /// Delete old terminal plans beyond a retention limit
    Prune(PruneArgs),
}

#[derive(ClapArgs)]
pub struct ListPlansArgs {
    /// List plans in id order starting at this id
    #[arg(long)]
    pub start: Option<PlanId>,

    /// Maximum number of plans to list
    #[arg(long, default_value_t = 20)]
    pub count: usize,
}

#[derive(ClapArgs)]
pub struct PlanIdArgs {
    /// Plan id
    pub id: PlanId,
}

#[derive(ClapArgs)]
pub struct PruneArgs {
    /// Number of records to keep. Defaults to the store's retention limit
    #[arg(long)]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_list_defaults() {
        let args = Args::parse_from(["marshal", "plan", "ls"]);
        match args.command {
            Some(Commands::Plan {
                command: PlanCommands::List(list),
            }) => {
                assert_eq!(list.start, None);
                assert_eq!(list.count, 20);
            }
            _ => panic!("expected plan list"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "marshal",
            "plan",
            "show",
            "7",
            "--no-color",
            "--database-file",
            "/tmp/plans.db",
        ]);
        assert!(args.no_color);
        assert_eq!(args.database_file, Some(PathBuf::from("/tmp/plans.db")));
    }
}
