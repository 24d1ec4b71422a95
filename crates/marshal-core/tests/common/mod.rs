#![allow(dead_code)]

use std::time::Duration;

use marshal_core::{
    models::{TaskDescriptor, TaskState},
    task::{LeafTask, SingleJobTask, TaskContext},
    ErrorCode, CleanupDirective, Planner, PlannerBuilder, Task, TaskFactory, TaskFault,
};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const WAIT: Duration = Duration::from_secs(10);

/// Deploys a storage node; fails when `fail` is set, sleeps `millis` first.
pub struct DeployNode {
    pub node: String,
    pub millis: u64,
    pub fail: bool,
}

impl LeafTask for DeployNode {
    fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor::new(
            "deploy-sn",
            json!({ "node": self.node, "millis": self.millis, "fail": self.fail }),
        )
    }

    fn name(&self) -> String {
        format!("deploy {}", self.node)
    }
}

impl SingleJobTask for DeployNode {
    fn do_work(&self, _ctx: &TaskContext) -> Result<TaskState, TaskFault> {
        if self.millis > 0 {
            std::thread::sleep(Duration::from_millis(self.millis));
        }
        if self.fail {
            return Err(TaskFault::command(
                ErrorCode::COMMAND_FAILURE,
                CleanupDirective::Retry,
                format!("{} did not start", self.node),
            ));
        }
        Ok(TaskState::Succeeded)
    }
}

pub fn deploy(node: &str) -> Task {
    Task::single(DeployNode {
        node: node.to_string(),
        millis: 0,
        fail: false,
    })
}

pub fn slow_deploy(node: &str, millis: u64) -> Task {
    Task::single(DeployNode {
        node: node.to_string(),
        millis,
        fail: false,
    })
}

pub fn failing_deploy(node: &str) -> Task {
    Task::single(DeployNode {
        node: node.to_string(),
        millis: 0,
        fail: true,
    })
}

/// Factory that rebuilds [`DeployNode`] tasks from their descriptors.
pub fn factory() -> TaskFactory {
    let mut factory = TaskFactory::new();
    factory.register_single("deploy-sn", |params: &Value| {
        Ok(DeployNode {
            node: params["node"].as_str().unwrap_or_default().to_string(),
            millis: params["millis"].as_u64().unwrap_or_default(),
            fail: params["fail"].as_bool().unwrap_or_default(),
        })
    });
    factory
}

/// Builder pointed at a database inside `dir`.
pub fn test_builder(dir: &TempDir) -> PlannerBuilder {
    PlannerBuilder::new()
        .with_database_path(Some(dir.path().join("test.db")))
        .with_pool_size(4)
        .with_task_factory(factory())
}

/// Helper function to create a test planner
pub async fn create_test_planner() -> (TempDir, Planner) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let planner = test_builder(&temp_dir)
        .build()
        .await
        .expect("Failed to create planner");
    (temp_dir, planner)
}
