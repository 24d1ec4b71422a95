//! One-line confirmations printed after operator commands.

use std::fmt;

use crate::models::{PlanRecord, PlanState};

/// Whether a plan succeeded, with the failure it reported if not.
pub struct PlanVerdict<'a>(pub &'a PlanRecord);

impl fmt::Display for PlanVerdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;
        if record.state == PlanState::Succeeded {
            return writeln!(f, "✓ Plan {} ({}) succeeded", record.id, record.name);
        }

        write!(
            f,
            "✗ Plan {} ({}) is {}",
            record.id, record.name, record.state
        )?;
        match record.latest_exception() {
            Some(exception) => writeln!(f, ": {}", exception.command_result()),
            None => writeln!(f),
        }
    }
}

/// Result of a retention prune.
pub struct PruneReport {
    pub removed: usize,
    pub limit: usize,
}

impl fmt::Display for PruneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removed == 0 {
            writeln!(f, "Nothing to prune; retention limit {}", self.limit)
        } else {
            writeln!(
                f,
                "Pruned {} plan record(s); retention limit {}",
                self.removed, self.limit
            )
        }
    }
}
