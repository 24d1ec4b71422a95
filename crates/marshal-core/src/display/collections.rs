//! Collection wrapper types for displaying groups of plan records.

use std::{fmt, ops::Index};

use super::datetime::LocalDateTime;
use crate::models::PlanRecord;

/// Newtype wrapper for listing plan records as compact summaries.
///
/// Handles empty collections with a single "No plans found." line.
pub struct PlanRecords(pub Vec<PlanRecord>);

impl PlanRecords {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&PlanRecord> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanRecord> {
        self.0.iter()
    }
}

impl Index<usize> for PlanRecords {
    type Output = PlanRecord;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IntoIterator for PlanRecords {
    type Item = PlanRecord;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PlanRecords {
    type Item = &'a PlanRecord;
    type IntoIter = std::slice::Iter<'a, PlanRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for PlanRecords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No plans found.");
        }

        for (i, record) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "## {}. {} ({})", record.id, record.name, record.state)?;
            writeln!(f)?;
            writeln!(f, "- **Tasks**: {}", record.tree.leaf_count())?;
            writeln!(f, "- **Attempts**: {}", record.runs.len())?;
            if let Some(exception) = record.latest_exception() {
                writeln!(f, "- **Failure**: {}", exception.command_result())?;
            }
            writeln!(f, "- **Updated**: {}", LocalDateTime(&record.updated_at))?;
        }
        Ok(())
    }
}
