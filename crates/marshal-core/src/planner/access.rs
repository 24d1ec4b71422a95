//! Authorization hook consulted before a plan runs.

use crate::models::{PlanId, Privilege};

/// Decides whether the current caller may execute a plan.
///
/// Returning `Err(message)` rejects the execute call with
/// [`PlanError::Unauthorized`](crate::error::PlanError::Unauthorized).
pub trait AccessChecker: Send + Sync + 'static {
    fn check(
        &self,
        plan_id: PlanId,
        plan_name: &str,
        required: &[Privilege],
    ) -> std::result::Result<(), String>;
}

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessChecker for AllowAll {
    fn check(&self, _: PlanId, _: &str, _: &[Privilege]) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Grants requests whose required privileges are all in a fixed set.
#[derive(Debug, Clone, Default)]
pub struct PrivilegeSet {
    granted: Vec<Privilege>,
}

impl PrivilegeSet {
    pub fn new(granted: impl IntoIterator<Item = Privilege>) -> Self {
        Self {
            granted: granted.into_iter().collect(),
        }
    }
}

impl AccessChecker for PrivilegeSet {
    fn check(
        &self,
        plan_id: PlanId,
        plan_name: &str,
        required: &[Privilege],
    ) -> std::result::Result<(), String> {
        let missing: Vec<&str> = required
            .iter()
            .filter(|p| !self.granted.contains(p))
            .map(Privilege::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "plan {plan_id} ({plan_name}) requires {}",
                missing.join(", ")
            ))
        }
    }
}
