//! Persisted shape of a plan's task tree.
//!
//! The tree is stored as an arena: nodes live in one vector and refer to their
//! children by index. Nothing points back up, so serialization and structural
//! comparison are acyclic by construction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a task in its plan, one index per nesting level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct TaskPath(pub Vec<u32>);

impl TaskPath {
    /// Path of the `index`-th top-level task.
    pub fn root(index: u32) -> Self {
        Self(vec![index])
    }

    /// Path of the `index`-th child of this task.
    pub fn child(&self, index: u32) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", segment + 1)?;
            first = false;
        }
        Ok(())
    }
}

/// Serializable identity of a task: what it does and with which parameters.
///
/// Two tasks with equal descriptors are logically the same work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    /// Factory key, e.g. `deploy-sn` or `wait-for-partition`
    pub kind: String,

    /// Parameters the factory needs to rebuild the task
    #[serde(default)]
    pub params: serde_json::Value,
}

impl TaskDescriptor {
    pub fn new(kind: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Descriptor for a task without parameters.
    pub fn named(kind: impl Into<String>) -> Self {
        Self::new(kind, serde_json::Value::Null)
    }
}

impl fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_null() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} {}", self.kind, self.params)
        }
    }
}

/// Which of the closed set of task kinds a node is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKindTag {
    SingleJob,
    MultiJob,
    Serial,
    Parallel,
}

impl TaskKindTag {
    pub fn is_bundle(&self) -> bool {
        matches!(self, TaskKindTag::Serial | TaskKindTag::Parallel)
    }
}

/// One node of the arena.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskNode {
    pub path: TaskPath,
    pub kind: TaskKindTag,
    pub descriptor: TaskDescriptor,
    #[serde(default)]
    pub continue_past_error: bool,
    /// Arena indices of the children, in execution order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
}

/// Arena of task nodes plus the ordered list of top-level entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskTree {
    pub nodes: Vec<TaskNode>,
    pub roots: Vec<usize>,
}

impl TaskTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its arena index.
    pub fn push(&mut self, node: TaskNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&TaskNode> {
        self.nodes.get(index)
    }

    /// Top-level nodes in execution order.
    pub fn roots(&self) -> impl Iterator<Item = &TaskNode> {
        self.roots.iter().filter_map(|&i| self.nodes.get(i))
    }

    /// Children of `node` in execution order.
    pub fn children<'a>(&'a self, node: &'a TaskNode) -> impl Iterator<Item = &'a TaskNode> {
        node.children.iter().filter_map(|&i| self.nodes.get(i))
    }

    /// Looks a node up by its path.
    pub fn find(&self, path: &TaskPath) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| &n.path == path)
    }

    /// Number of single-job and multi-job tasks in the tree.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.kind.is_bundle()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
