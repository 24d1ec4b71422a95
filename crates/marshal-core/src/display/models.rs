//! Display implementations for domain models.
//!
//! Detail views render as markdown: a heading per record, a metadata list,
//! then the task tree and the latest attempt.

use std::fmt;

use super::datetime::{Elapsed, LocalDateTime};
use crate::models::{
    CleanupDirective, CommandResult, ExceptionTransfer, PlanRecord, PlanRun, PlanState, Privilege,
    TaskNode, TaskRun, TaskState, TaskTree,
};

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CleanupDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_code, self.description)?;
        if self.cleanup != CleanupDirective::None {
            write!(f, "; {}", self.cleanup)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExceptionTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- Class: {}", self.class)?;
        writeln!(f, "- Message: {}", self.message)?;
        writeln!(f, "- Where: {}", self.description)?;
        writeln!(f, "- Error code: {}", self.error_code)?;
        writeln!(f, "- Cleanup: {}", self.cleanup)
    }
}

impl fmt::Display for TaskRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.path, self.name, self.state.with_icon())?;
        if let Some(ended) = &self.ended_at {
            write!(f, " in {}", Elapsed(&self.started_at, ended))?;
        }
        if let Some(failure) = &self.failure {
            write!(f, ": {failure}")?;
        }
        if self.cleaned_up {
            f.write_str(" [cleaned up]")?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### Attempt {} ({})", self.attempt, self.state)?;
        writeln!(f)?;
        writeln!(f, "- Started: {}", LocalDateTime(&self.started_at))?;
        if let Some(ended) = &self.ended_at {
            writeln!(f, "- Ended: {}", LocalDateTime(ended))?;
            writeln!(f, "- Duration: {}", Elapsed(&self.started_at, ended))?;
        }
        writeln!(
            f,
            "- Tasks: {} started, {} ended",
            self.tasks_started, self.tasks_ended
        )?;

        if let Some(exception) = &self.exception {
            writeln!(f)?;
            writeln!(f, "#### Failure")?;
            writeln!(f)?;
            write!(f, "{exception}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}. {} ({})", self.id, self.name, self.state)?;
        writeln!(f)?;

        writeln!(f, "- State: {}", self.state)?;
        if self.is_system {
            writeln!(f, "- System plan: yes")?;
        }
        if !self.required_privileges.is_empty() {
            let privileges: Vec<&str> =
                self.required_privileges.iter().map(Privilege::as_str).collect();
            writeln!(f, "- Privileges: {}", privileges.join(", "))?;
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))?;
        writeln!(f, "- Attempts: {}", self.runs.len())?;

        if self.tree.is_empty() {
            writeln!(f, "\nNo tasks in this plan.")?;
        } else {
            writeln!(f, "\n## Tasks")?;
            writeln!(f)?;
            let latest = self.latest_run();
            for root in self.tree.roots() {
                fmt_node(f, &self.tree, root, latest)?;
            }
        }

        if let Some(run) = self.latest_run() {
            writeln!(f, "\n## Latest attempt")?;
            writeln!(f)?;
            write!(f, "{run}")?;
        }
        Ok(())
    }
}

/// Writes one tree node as a nested list item, annotated with the state it
/// reached in `run`.
fn fmt_node(
    f: &mut fmt::Formatter<'_>,
    tree: &TaskTree,
    node: &TaskNode,
    run: Option<&PlanRun>,
) -> fmt::Result {
    let indent = "  ".repeat(node.path.depth().saturating_sub(1));
    write!(f, "{indent}- {} {}", node.path, node.descriptor)?;
    if node.kind.is_bundle() {
        write!(f, " ({} tasks)", node.children.len())?;
    } else if let Some(task_run) = run.and_then(|r| r.task_runs.iter().find(|t| t.path == node.path))
    {
        write!(f, " ({})", task_run.state.with_icon())?;
    }
    writeln!(f)?;

    for child in tree.children(node) {
        fmt_node(f, tree, child, run)?;
    }
    Ok(())
}
