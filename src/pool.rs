use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use crate::config::{PoolConfig, QueueBackend};
use crate::error::{PoolError, QueueFull};
use crate::padded_type::PaddedAtomicUsize;
use crate::sync::Semaphore;
use crate::task::Task;
use crate::work_queue::WorkQueue;
use crate::worker::spawn_worker;

// state shared between the pool handle and every worker thread
pub(crate) struct Shared<T: ?Sized> {
    pub queue: WorkQueue<Weak<T>>,
    // one permit per queued entry, plus one per worker at shutdown
    pub ready: Semaphore,
    pub stats: Counters,
    stop: AtomicBool,
}

impl<T: ?Sized> Shared<T> {
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    pub submitted: PaddedAtomicUsize,
    pub rejected: PaddedAtomicUsize,
    pub executed: PaddedAtomicUsize,
    pub skipped: PaddedAtomicUsize,
    pub panicked: PaddedAtomicUsize,
}

/// Point-in-time view of a pool's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Appends that made it into the queue.
    pub submitted: usize,
    /// Appends refused because the queue was full.
    pub rejected: usize,
    /// Tasks that ran to completion.
    pub executed: usize,
    /// Queued tasks whose owner dropped them before a worker got there.
    pub skipped: usize,
    /// Tasks that panicked while running.
    pub panicked: usize,
}

/// Fixed set of worker threads draining a bounded FIFO of tasks.
///
/// `append` never blocks: it either queues the task and posts the pool's
/// semaphore once, or reports [`QueueFull`]. Each worker parks on that
/// semaphore, pops one task under the queue lock and runs it with the lock
/// released.
///
/// Dropping the pool (or calling [`ThreadPool::shutdown`]) raises the stop
/// flag, posts one permit per worker so parked workers wake up and see it,
/// and joins every thread. Tasks still queued at that point are not run.
pub struct ThreadPool<T: ?Sized> {
    shared: Arc<Shared<T>>,
    workers: Vec<JoinHandle<()>>,
    thread_count: usize,
    backend: QueueBackend,
}

impl<T> ThreadPool<T>
where
    T: Task + ?Sized + 'static,
{
    /// Starts `config.thread_count` workers.
    ///
    /// # Errors
    ///
    /// Invalid configuration, or a worker thread that could not be spawned.
    /// In the latter case the workers that did start are stopped and joined
    /// before returning.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            queue: WorkQueue::new(config.backend, config.max_queue_depth),
            ready: Semaphore::new(0),
            stats: Counters::default(),
            stop: AtomicBool::new(false),
        });

        let mut pool = ThreadPool {
            shared,
            workers: Vec::with_capacity(config.thread_count),
            thread_count: config.thread_count,
            backend: config.backend,
        };

        for id in 0..config.thread_count {
            let name = format!("{}-{}", config.thread_name, id);
            match spawn_worker(id, name, pool.shared.clone()) {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    tracing::error!(worker = id, error = %source, "failed to spawn worker");
                    pool.stop_workers();
                    return Err(PoolError::Spawn { index: id, source });
                }
            }
        }

        tracing::info!(
            threads = config.thread_count,
            max_queue_depth = config.max_queue_depth,
            backend = ?config.backend,
            "thread pool started"
        );

        Ok(pool)
    }

    /// Queues `task` for execution on some worker.
    ///
    /// Only a weak reference is queued; the caller stays the owner.
    ///
    /// # Errors
    ///
    /// [`QueueFull`] if `max_queue_depth` tasks are already waiting. Nothing
    /// is queued in that case.
    pub fn append(&self, task: &Arc<T>) -> Result<(), QueueFull> {
        if self.shared.queue.push(Arc::downgrade(task)).is_err() {
            self.shared.stats.rejected.bump();
            let max_depth = self.shared.queue.max_depth();
            tracing::debug!(max_depth, "work queue full, task rejected");
            return Err(QueueFull { max_depth });
        }

        self.shared.stats.submitted.bump();
        self.shared.ready.post();
        Ok(())
    }

    /// Stops and joins every worker.
    ///
    /// # Errors
    ///
    /// [`PoolError::WorkerPanicked`] if a worker thread died abnormally.
    pub fn shutdown(mut self) -> Result<(), PoolError> {
        match self.stop_workers() {
            0 => Ok(()),
            count => Err(PoolError::WorkerPanicked { count }),
        }
    }
}

impl<T: ?Sized> ThreadPool<T> {
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn max_queue_depth(&self) -> usize {
        self.shared.queue.max_depth()
    }

    pub fn backend(&self) -> QueueBackend {
        self.backend
    }

    /// Tasks queued but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn stats(&self) -> PoolStats {
        let stats = &self.shared.stats;
        PoolStats {
            submitted: stats.submitted.get(),
            rejected: stats.rejected.get(),
            executed: stats.executed.get(),
            skipped: stats.skipped.get(),
            panicked: stats.panicked.get(),
        }
    }

    // raise the stop flag, wake every worker once and join them.
    // returns how many threads panicked
    fn stop_workers(&mut self) -> usize {
        if self.workers.is_empty() {
            return 0;
        }

        self.shared.stop.store(true, Ordering::Release);
        self.shared.ready.post_many(self.workers.len());

        let panicked = self
            .workers
            .drain(..)
            .map(|handle| handle.join())
            .filter(Result::is_err)
            .count();

        if panicked > 0 {
            tracing::error!(panicked, "worker thread(s) panicked");
        }
        tracing::info!(dropped = self.shared.queue.len(), "thread pool stopped");
        panicked
    }
}

impl<T: ?Sized> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

impl<T: ?Sized> fmt::Debug for ThreadPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("thread_count", &self.thread_count)
            .field("backend", &self.backend)
            .field("pending", &self.pending())
            .field("stats", &self.stats())
            .finish()
    }
}
