//! Bounded worker pool for task jobs.
//!
//! Jobs are synchronous closures executed on tokio's blocking threads. At
//! most `pool_size` run at once; up to `queue_capacity` more may wait for a
//! worker. Anything beyond that is rejected rather than queued without bound.
//!
//! Submission has three steps: [`WorkerPool::admit`] takes a queue slot,
//! [`Admission::acquire`] waits for a worker and [`Worker::run`] runs the
//! job. The executor checks for aborts and interrupts between the last two.

use std::{
    any::Any,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::TaskFault;

/// Default number of queued jobs admitted beyond the running ones.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Why a job did not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool refused the submission.
    #[error("worker pool rejected the job ({running} running, {queued} queued, capacity {capacity})")]
    Rejected {
        running: usize,
        queued: usize,
        capacity: usize,
    },
    /// The job panicked on its worker thread.
    #[error("job panicked: {0}")]
    Panicked(String),
    /// The worker was torn down before the job finished.
    #[error("worker was cancelled before the job finished")]
    Cancelled,
}

impl PoolError {
    /// Classifies the error for the plan's failure record.
    pub fn into_fault(self) -> TaskFault {
        match self {
            PoolError::Rejected { .. } => TaskFault::rejected(self.to_string()),
            PoolError::Panicked(message) => TaskFault::internal(message).with_class("Panic"),
            PoolError::Cancelled => TaskFault::internal(self.to_string()).with_class("SchedulerFault"),
        }
    }
}

#[derive(Debug)]
struct PoolInner {
    workers: Arc<Semaphore>,
    pool_size: usize,
    queue_capacity: usize,
    admitted: AtomicUsize,
    closed: AtomicBool,
}

impl PoolInner {
    fn capacity(&self) -> usize {
        self.pool_size + self.queue_capacity
    }
}

/// An admitted job waiting for a worker. Dropping it gives the admission
/// slot back.
#[derive(Debug)]
pub struct Admission {
    inner: Arc<PoolInner>,
}

impl Admission {
    /// Waits for a free worker.
    pub async fn acquire(self) -> Result<Worker, PoolError> {
        let permit = Arc::clone(&self.inner.workers)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Rejected {
                running: 0,
                queued: 0,
                capacity: self.inner.capacity(),
            })?;
        Ok(Worker {
            _permit: permit,
            _admission: self,
        })
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.inner.admitted.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A reserved worker. Nothing runs until [`Worker::run`] is called, so the
/// caller may still decide not to start its job.
#[derive(Debug)]
pub struct Worker {
    _permit: OwnedSemaphorePermit,
    _admission: Admission,
}

impl Worker {
    /// Runs `job` on a blocking thread, releasing the worker afterwards.
    pub async fn run<F, T>(self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(job).await.map_err(|e| {
            if e.is_panic() {
                PoolError::Panicked(panic_message(e.into_panic()))
            } else {
                PoolError::Cancelled
            }
        })
    }
}

/// Cheaply cloneable handle to the shared pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    pub fn new(pool_size: usize, queue_capacity: usize) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            inner: Arc::new(PoolInner {
                workers: Arc::new(Semaphore::new(pool_size)),
                pool_size,
                queue_capacity,
                admitted: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Pool sized to the machine's available parallelism.
    pub fn with_default_size() -> Self {
        Self::new(default_pool_size(), DEFAULT_QUEUE_CAPACITY)
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    pub fn queue_capacity(&self) -> usize {
        self.inner.queue_capacity
    }

    /// Jobs currently admitted, running or waiting.
    pub fn admitted(&self) -> usize {
        self.inner.admitted.load(Ordering::SeqCst)
    }

    /// Stops admitting new jobs. Jobs already running are unaffected.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.workers.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Takes an admission slot, or rejects when running plus queued jobs
    /// would exceed the pool's capacity.
    pub fn admit(&self) -> Result<Admission, PoolError> {
        let capacity = self.inner.capacity();
        let previously = self.inner.admitted.fetch_add(1, Ordering::SeqCst);
        let admission = Admission {
            inner: Arc::clone(&self.inner),
        };
        if self.is_closed() || previously >= capacity {
            let running = self.inner.pool_size - self.inner.workers.available_permits();
            return Err(PoolError::Rejected {
                running,
                queued: previously.saturating_sub(running),
                capacity,
            });
        }
        Ok(admission)
    }

    /// Runs `job` on a worker once one is free.
    pub async fn execute<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.admit()?.acquire().await?.run(job).await
    }
}

/// Worker count matching the machine's available parallelism.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
