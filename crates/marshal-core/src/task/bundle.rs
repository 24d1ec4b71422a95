//! Composite tasks.

use super::Task;
use crate::models::TaskDescriptor;

/// Children run strictly in order; each resolves, cleanup included, before
/// the next begins.
#[derive(Clone, Debug, Default)]
pub struct SerialBundle {
    pub tasks: Vec<Task>,
    pub continue_past_error: bool,
    pub label: Option<String>,
}

impl SerialBundle {
    pub const KIND: &'static str = "serial";

    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            continue_past_error: false,
            label: None,
        }
    }

    /// Tolerate a fatal failure inside this bundle at the parent level.
    pub fn continue_past_error(mut self, value: bool) -> Self {
        self.continue_past_error = value;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn descriptor(&self) -> TaskDescriptor {
        bundle_descriptor(Self::KIND, self.label.as_deref())
    }

    pub fn name(&self) -> String {
        bundle_name(Self::KIND, self.label.as_deref(), self.tasks.len())
    }
}

impl From<SerialBundle> for Task {
    fn from(bundle: SerialBundle) -> Self {
        Task::Serial(bundle)
    }
}

/// Children are dispatched together; the bundle resolves once every child
/// has reached a terminal state.
#[derive(Clone, Debug, Default)]
pub struct ParallelBundle {
    pub tasks: Vec<Task>,
    pub continue_past_error: bool,
    pub label: Option<String>,
}

impl ParallelBundle {
    pub const KIND: &'static str = "parallel";

    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            continue_past_error: false,
            label: None,
        }
    }

    pub fn continue_past_error(mut self, value: bool) -> Self {
        self.continue_past_error = value;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn descriptor(&self) -> TaskDescriptor {
        bundle_descriptor(Self::KIND, self.label.as_deref())
    }

    pub fn name(&self) -> String {
        bundle_name(Self::KIND, self.label.as_deref(), self.tasks.len())
    }
}

impl From<ParallelBundle> for Task {
    fn from(bundle: ParallelBundle) -> Self {
        Task::Parallel(bundle)
    }
}

fn bundle_descriptor(kind: &str, label: Option<&str>) -> TaskDescriptor {
    match label {
        Some(label) => TaskDescriptor::new(kind, serde_json::json!({ "label": label })),
        None => TaskDescriptor::named(kind),
    }
}

fn bundle_name(kind: &str, label: Option<&str>, len: usize) -> String {
    match label {
        Some(label) => format!("{label} ({kind}, {len} tasks)"),
        None => format!("{kind} bundle ({len} tasks)"),
    }
}
