//! Task model: the closed set of task kinds a plan is built from.
//!
//! A plan's work is a tree of [`Task`] values. Leaves are supplied by task
//! implementations through the [`SingleJobTask`] and [`MultiJobTask`]
//! contracts; interior nodes are [`SerialBundle`] and [`ParallelBundle`].
//! The executor dispatches over the enum exhaustively, so there is exactly
//! one scheduling path per kind.
//!
//! ```text
//! Task
//! ├── Single   one do_work() call
//! ├── Multi    first_job() → Job → NextJob::After(delay, Job) → ... → Done
//! ├── Serial   children in order
//! └── Parallel children concurrently, fan-in barrier
//! ```

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    error::{Result, TaskFault},
    models::{PlanId, TaskDescriptor, TaskKindTag, TaskNode, TaskPath, TaskState, TaskTree},
    planner::LockTable,
};

pub mod bundle;
pub mod context;
pub mod factory;


pub use bundle::{ParallelBundle, SerialBundle};
pub use context::{InterruptFlag, TaskContext};
pub use factory::TaskFactory;

/// Behavior shared by every leaf task.
pub trait LeafTask: Send + Sync + 'static {
    /// Serializable identity of the task; used for persistence and, by
    /// default, for duplicate-plan detection.
    fn descriptor(&self) -> TaskDescriptor;

    /// Display name. Defaults to the descriptor.
    fn name(&self) -> String {
        self.descriptor().to_string()
    }

    /// When true, a failure of this task is recorded but does not abort the
    /// enclosing bundle.
    fn continue_past_error(&self) -> bool {
        false
    }

    /// Best-effort action run once if an attempt of this task is aborted,
    /// or if a later sibling fails fatally after this task succeeded.
    fn cleanup_job(&self) -> Option<CleanupJob> {
        None
    }

    /// Takes any locks the task needs before doing externally visible work.
    fn acquire_locks(&self, _plan_id: PlanId, _locks: &LockTable) -> Result<()> {
        Ok(())
    }

    /// Whether `other` describes the same logical work as this task.
    fn logical_compare(&self, other: &TaskDescriptor) -> bool {
        self.descriptor() == *other
    }
}

/// A task that does one atomic action.
pub trait SingleJobTask: LeafTask {
    fn do_work(&self, ctx: &TaskContext) -> std::result::Result<TaskState, TaskFault>;
}

/// A task made of a chain of re-schedulable jobs, used for polling and
/// long-running work without pinning a worker thread.
pub trait MultiJobTask: LeafTask {
    fn first_job(&self, ctx: &TaskContext) -> std::result::Result<Job, TaskFault>;
}

type JobFn = Box<dyn FnOnce(&TaskContext) -> std::result::Result<NextJob, TaskFault> + Send>;

/// One schedulable unit of work of a multi-job task.
pub struct Job {
    name: String,
    run: JobFn,
}

impl Job {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(&TaskContext) -> std::result::Result<NextJob, TaskFault> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(self, ctx: &TaskContext) -> std::result::Result<NextJob, TaskFault> {
        (self.run)(ctx)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("name", &self.name).finish()
    }
}

/// What a job asks the executor to do next.
#[derive(Debug)]
pub enum NextJob {
    /// The task has reached a terminal state.
    Done(TaskState),
    /// Run `job` after `delay`; no worker is held while waiting.
    After { delay: Duration, job: Job },
}

impl NextJob {
    pub fn done(state: TaskState) -> Self {
        NextJob::Done(state)
    }

    pub fn after(delay: Duration, job: Job) -> Self {
        NextJob::After { delay, job }
    }
}

/// Deferred best-effort cleanup action.
pub struct CleanupJob(Box<dyn FnOnce() -> std::result::Result<(), TaskFault> + Send>);

impl CleanupJob {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() -> std::result::Result<(), TaskFault> + Send + 'static,
    {
        Self(Box::new(run))
    }

    pub fn run(self) -> std::result::Result<(), TaskFault> {
        (self.0)()
    }
}

impl fmt::Debug for CleanupJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CleanupJob")
    }
}

/// A node of a plan's task tree.
#[derive(Clone)]
pub enum Task {
    Single(Arc<dyn SingleJobTask>),
    Multi(Arc<dyn MultiJobTask>),
    Serial(SerialBundle),
    Parallel(ParallelBundle),
}

impl Task {
    pub fn single(task: impl SingleJobTask) -> Self {
        Task::Single(Arc::new(task))
    }

    pub fn multi(task: impl MultiJobTask) -> Self {
        Task::Multi(Arc::new(task))
    }

    pub fn serial(tasks: Vec<Task>) -> Self {
        Task::Serial(SerialBundle::new(tasks))
    }

    pub fn parallel(tasks: Vec<Task>) -> Self {
        Task::Parallel(ParallelBundle::new(tasks))
    }

    pub fn kind(&self) -> TaskKindTag {
        match self {
            Task::Single(_) => TaskKindTag::SingleJob,
            Task::Multi(_) => TaskKindTag::MultiJob,
            Task::Serial(_) => TaskKindTag::Serial,
            Task::Parallel(_) => TaskKindTag::Parallel,
        }
    }

    pub fn descriptor(&self) -> TaskDescriptor {
        match self {
            Task::Single(t) => t.descriptor(),
            Task::Multi(t) => t.descriptor(),
            Task::Serial(b) => b.descriptor(),
            Task::Parallel(b) => b.descriptor(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Task::Single(t) => t.name(),
            Task::Multi(t) => t.name(),
            Task::Serial(b) => b.name(),
            Task::Parallel(b) => b.name(),
        }
    }

    pub fn continue_past_error(&self) -> bool {
        match self {
            Task::Single(t) => t.continue_past_error(),
            Task::Multi(t) => t.continue_past_error(),
            Task::Serial(b) => b.continue_past_error,
            Task::Parallel(b) => b.continue_past_error,
        }
    }

    /// Bundles have no cleanup of their own; their children's cleanups run
    /// inside the bundle.
    pub fn cleanup_job(&self) -> Option<CleanupJob> {
        match self {
            Task::Single(t) => t.cleanup_job(),
            Task::Multi(t) => t.cleanup_job(),
            Task::Serial(_) | Task::Parallel(_) => None,
        }
    }

    pub fn acquire_locks(&self, plan_id: PlanId, locks: &LockTable) -> Result<()> {
        match self {
            Task::Single(t) => t.acquire_locks(plan_id, locks),
            Task::Multi(t) => t.acquire_locks(plan_id, locks),
            Task::Serial(_) | Task::Parallel(_) => Ok(()),
        }
    }

    pub fn children(&self) -> &[Task] {
        match self {
            Task::Serial(b) => &b.tasks,
            Task::Parallel(b) => &b.tasks,
            Task::Single(_) | Task::Multi(_) => &[],
        }
    }

    /// Structural and parameter equality, independent of object identity.
    pub fn logical_compare(&self, other: &Task) -> bool {
        match (self, other) {
            (Task::Single(a), Task::Single(_)) => a.logical_compare(&other.descriptor()),
            (Task::Multi(a), Task::Multi(_)) => a.logical_compare(&other.descriptor()),
            (Task::Serial(a), Task::Serial(b)) => logical_compare_all(&a.tasks, &b.tasks),
            (Task::Parallel(a), Task::Parallel(b)) => logical_compare_all(&a.tasks, &b.tasks),
            _ => false,
        }
    }

    /// Number of leaf tasks below and including this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            Task::Single(_) | Task::Multi(_) => 1,
            Task::Serial(_) | Task::Parallel(_) => {
                self.children().iter().map(Task::leaf_count).sum()
            }
        }
    }

    /// Appends this subtree to `tree` and returns the arena index of its root.
    pub(crate) fn append_to(&self, tree: &mut TaskTree, path: TaskPath) -> usize {
        let children = self
            .children()
            .iter()
            .zip(0u32..)
            .map(|(child, i)| child.append_to(tree, path.child(i)))
            .collect();
        tree.push(TaskNode {
            path,
            kind: self.kind(),
            descriptor: self.descriptor(),
            continue_past_error: self.continue_past_error(),
            children,
        })
    }
}

/// Pairwise logical comparison of two ordered task lists.
pub fn logical_compare_all(a: &[Task], b: &[Task]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.logical_compare(y))
}

/// Builds the persisted arena for an ordered list of top-level tasks.
pub fn to_tree(tasks: &[Task]) -> TaskTree {
    let mut tree = TaskTree::new();
    for (task, i) in tasks.iter().zip(0u32..) {
        let index = task.append_to(&mut tree, TaskPath::root(i));
        tree.roots.push(index);
    }
    tree
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Single(_) | Task::Multi(_) => f
                .debug_struct("Task")
                .field("kind", &self.kind())
                .field("descriptor", &self.descriptor())
                .finish(),
            Task::Serial(_) | Task::Parallel(_) => f
                .debug_struct("Task")
                .field("kind", &self.kind())
                .field("children", &self.children())
                .finish(),
        }
    }
}
