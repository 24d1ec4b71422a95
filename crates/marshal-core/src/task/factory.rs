//! Rebuilding live task trees from persisted records.
//!
//! Plans reloaded after a restart only carry their [`TaskTree`]; the factory
//! maps each leaf's descriptor kind back to a constructor.

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

use super::{MultiJobTask, ParallelBundle, SerialBundle, SingleJobTask, Task};
use crate::{
    error::{PlanError, Result},
    models::{TaskKindTag, TaskNode, TaskTree},
};

type Constructor = Arc<dyn Fn(&Value) -> Result<Task> + Send + Sync>;

/// Registry of leaf task constructors keyed by descriptor kind.
#[derive(Clone, Default)]
pub struct TaskFactory {
    constructors: HashMap<String, Constructor>,
}

impl TaskFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for single-job tasks of `kind`.
    pub fn register_single<T, F>(&mut self, kind: impl Into<String>, build: F) -> &mut Self
    where
        T: SingleJobTask,
        F: Fn(&Value) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors.insert(
            kind.into(),
            Arc::new(move |params| build(params).map(Task::single)),
        );
        self
    }

    /// Registers a constructor for multi-job tasks of `kind`.
    pub fn register_multi<T, F>(&mut self, kind: impl Into<String>, build: F) -> &mut Self
    where
        T: MultiJobTask,
        F: Fn(&Value) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors.insert(
            kind.into(),
            Arc::new(move |params| build(params).map(Task::multi)),
        );
        self
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Rebuilds the ordered top-level task list of a persisted tree.
    pub fn build(&self, tree: &TaskTree) -> Result<Vec<Task>> {
        tree.roots().map(|node| self.build_node(tree, node)).collect()
    }

    fn build_node(&self, tree: &TaskTree, node: &TaskNode) -> Result<Task> {
        match node.kind {
            TaskKindTag::Serial => {
                let children = self.build_children(tree, node)?;
                let mut bundle =
                    SerialBundle::new(children).continue_past_error(node.continue_past_error);
                bundle.label = bundle_label(&node.descriptor.params);
                Ok(Task::Serial(bundle))
            }
            TaskKindTag::Parallel => {
                let children = self.build_children(tree, node)?;
                let mut bundle =
                    ParallelBundle::new(children).continue_past_error(node.continue_past_error);
                bundle.label = bundle_label(&node.descriptor.params);
                Ok(Task::Parallel(bundle))
            }
            TaskKindTag::SingleJob | TaskKindTag::MultiJob => {
                let build = self.constructors.get(&node.descriptor.kind).ok_or_else(|| {
                    PlanError::invalid_input("task kind").with_reason(format!(
                        "no task constructor registered for '{}' at {}",
                        node.descriptor.kind, node.path
                    ))
                })?;
                let task = build(&node.descriptor.params)?;
                if task.kind() != node.kind {
                    return Err(PlanError::invalid_input("task kind").with_reason(format!(
                        "'{}' at {} was persisted as {:?} but rebuilt as {:?}",
                        node.descriptor.kind,
                        node.path,
                        node.kind,
                        task.kind()
                    )));
                }
                Ok(task)
            }
        }
    }

    fn build_children(&self, tree: &TaskTree, node: &TaskNode) -> Result<Vec<Task>> {
        tree.children(node)
            .map(|child| self.build_node(tree, child))
            .collect()
    }
}

fn bundle_label(params: &Value) -> Option<String> {
    params.get("label").and_then(Value::as_str).map(String::from)
}

impl fmt::Debug for TaskFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.constructors.keys().collect();
        kinds.sort();
        f.debug_struct("TaskFactory").field("kinds", &kinds).finish()
    }
}
