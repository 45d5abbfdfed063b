// Server Core: the concurrency pieces of a small event-driven server
//
// - `ThreadPool`: fixed workers draining a bounded FIFO of tasks the caller
//   keeps owning, woken through a counting semaphore
// - `LockFreeQueue`: unbounded MPMC FIFO with epoch-based node reclamation
// - `TimerList`: ascending deadline list for closing idle connections,
//   driven by a single owner
// - `sync`: lock, condition variable, semaphore and spinlock wrappers
//
// Nothing here does I/O. The reactor that accepts connections, parses
// requests and arms the periodic tick lives with the caller.
mod config;
mod epoch;
mod error;
mod garbage_node;
mod padded_type;
mod pool;
mod queue;
mod slab;
pub mod sync;
mod task;
mod timer;
mod work_queue;
mod worker;

pub use config::{
    DEFAULT_MAX_QUEUE_DEPTH, DEFAULT_THREAD_COUNT, DEFAULT_THREAD_NAME, PoolConfig, QueueBackend,
};
pub use error::{PoolError, QueueFull, TimerError};
pub use pool::{PoolStats, ThreadPool};
pub use queue::LockFreeQueue;
pub use task::Task;
pub use timer::{Iter as TimerIter, TimerHandle, TimerList};

// pool with the default configuration
pub fn new<T: Task + ?Sized + 'static>() -> Result<ThreadPool<T>, PoolError> {
    ThreadPool::new(PoolConfig::default())
}

// pool with a specific worker count, everything else default
pub fn with_workers<T: Task + ?Sized + 'static>(
    thread_count: usize,
) -> Result<ThreadPool<T>, PoolError> {
    ThreadPool::new(PoolConfig::new().thread_count(thread_count))
}
