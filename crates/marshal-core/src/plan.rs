//! Executable plan definitions.
//!
//! A [`Plan`] is what callers hand to the planner: a name, an ordered list of
//! top-level tasks, and optionally a [`PlanPolicy`] describing privileges,
//! pre-execution checks and plan-level locks. Once registered, the planner
//! keeps the plan alongside its persisted [`PlanRecord`](crate::models::PlanRecord).

use std::{fmt, sync::Arc};

use crate::{
    error::{Result, TaskFault},
    models::{PlanId, Privilege, TaskTree},
    planner::LockTable,
    task::{self, Task},
};

/// Plan-level hooks supplied by concrete plan types.
pub trait PlanPolicy: Send + Sync + 'static {
    /// Name used when the caller does not supply one.
    fn default_name(&self) -> String;

    /// Privileges the caller must hold to execute the plan.
    fn required_privileges(&self) -> Vec<Privilege> {
        vec![Privilege::SysOper]
    }

    /// Validates the plan just before a run starts. `force` asks the plan to
    /// skip checks that can be safely overridden.
    fn pre_execute_check(&self, _force: bool) -> std::result::Result<(), TaskFault> {
        Ok(())
    }

    /// Takes plan-level locks before the run starts.
    fn acquire_locks(&self, _plan_id: PlanId, _name: &str, _locks: &LockTable) -> Result<()> {
        Ok(())
    }
}

/// A plan ready to be registered.
#[derive(Clone)]
pub struct Plan {
    name: String,
    is_system: bool,
    tasks: Vec<Task>,
    privileges: Vec<Privilege>,
    policy: Option<Arc<dyn PlanPolicy>>,
}

impl Plan {
    /// Starts building a plan with the given name.
    pub fn builder(name: impl Into<String>) -> PlanBuilder {
        PlanBuilder {
            name: Some(name.into()),
            is_system: false,
            tasks: Vec::new(),
            policy: None,
        }
    }

    /// Starts building a plan named by its policy's default name.
    pub fn with_policy(policy: impl PlanPolicy) -> PlanBuilder {
        PlanBuilder {
            name: None,
            is_system: false,
            tasks: Vec::new(),
            policy: Some(Arc::new(policy)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn policy(&self) -> Option<&Arc<dyn PlanPolicy>> {
        self.policy.as_ref()
    }

    pub fn required_privileges(&self) -> &[Privilege] {
        &self.privileges
    }

    pub fn pre_execute_check(&self, force: bool) -> std::result::Result<(), TaskFault> {
        match &self.policy {
            Some(policy) => policy.pre_execute_check(force),
            None => Ok(()),
        }
    }

    /// Takes the policy's plan-level locks. Task locks are taken as each
    /// task starts.
    pub fn acquire_locks(&self, plan_id: PlanId, locks: &LockTable) -> Result<()> {
        if let Some(policy) = &self.policy {
            policy.acquire_locks(plan_id, &self.name, locks)?;
        }
        Ok(())
    }

    /// Total number of leaf tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.iter().map(Task::leaf_count).sum()
    }

    /// Task-tree equality used for duplicate-plan detection.
    pub fn logical_compare(&self, other: &Plan) -> bool {
        task::logical_compare_all(&self.tasks, &other.tasks)
    }

    pub fn to_tree(&self) -> TaskTree {
        task::to_tree(&self.tasks)
    }

    /// Reassembles a plan from persisted parts.
    pub(crate) fn from_parts(
        name: String,
        is_system: bool,
        tasks: Vec<Task>,
        privileges: Vec<Privilege>,
    ) -> Self {
        Self {
            name,
            is_system,
            tasks,
            privileges,
            policy: None,
        }
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("name", &self.name)
            .field("is_system", &self.is_system)
            .field("tasks", &self.tasks)
            .field("privileges", &self.privileges)
            .field("has_policy", &self.policy.is_some())
            .finish()
    }
}

/// Builder for [`Plan`].
pub struct PlanBuilder {
    name: Option<String>,
    is_system: bool,
    tasks: Vec<Task>,
    policy: Option<Arc<dyn PlanPolicy>>,
}

impl PlanBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the plan as a system plan.
    pub fn system(mut self, is_system: bool) -> Self {
        self.is_system = is_system;
        self
    }

    /// Appends a top-level task.
    pub fn task(mut self, task: impl Into<Task>) -> Self {
        self.tasks.push(task.into());
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn policy(mut self, policy: impl PlanPolicy) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn build(self) -> Plan {
        let name = self
            .name
            .or_else(|| self.policy.as_ref().map(|p| p.default_name()))
            .unwrap_or_else(|| "plan".to_string());
        let privileges = self
            .policy
            .as_ref()
            .map(|p| p.required_privileges())
            .unwrap_or_else(|| vec![Privilege::SysOper]);
        Plan {
            name,
            is_system: self.is_system,
            tasks: self.tasks,
            privileges,
            policy: self.policy,
        }
    }
}
