//! Lock identities held by plans.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a plan lock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LockCategory {
    /// A table, keyed by its name
    Table,
    /// Singleton lock taken by plans that change cluster shape
    Elasticity,
    /// The topology, keyed by topology name
    Topology,
    /// A single service component, keyed by its resource id
    Component,
}

impl LockCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockCategory::Table => "table",
            LockCategory::Elasticity => "elasticity",
            LockCategory::Topology => "topology",
            LockCategory::Component => "component",
        }
    }
}

impl fmt::Display for LockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(category, key)` pair owned by at most one plan at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PlanLock {
    pub category: LockCategory,
    pub key: String,
}

impl PlanLock {
    /// Key used for the singleton elasticity lock.
    pub const ELASTICITY_KEY: &'static str = "elasticity";

    pub fn new(category: LockCategory, key: impl Into<String>) -> Self {
        Self {
            category,
            key: key.into(),
        }
    }

    pub fn elasticity() -> Self {
        Self::new(LockCategory::Elasticity, Self::ELASTICITY_KEY)
    }
}

impl fmt::Display for PlanLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.key)
    }
}
