use std::io;

use crate::timer::TimerHandle;

/// Fatal errors raised while starting or stopping a [`ThreadPool`](crate::ThreadPool).
///
/// A pool that fails to start is never handed to the caller: any worker that
/// was already running is stopped and joined before the error is returned.
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("thread count must be greater than zero")]
    InvalidThreadCount,

    #[error("max queue depth must be greater than zero")]
    InvalidQueueDepth,

    #[error("worker thread name {0:?} contains a NUL byte")]
    InvalidThreadName(String),

    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },

    #[error("{count} worker thread(s) panicked")]
    WorkerPanicked { count: usize },
}

/// Returned by [`ThreadPool::append`](crate::ThreadPool::append) when the work
/// queue already holds `max_depth` tasks. Nothing was enqueued.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("work queue is full (max depth {max_depth})")]
pub struct QueueFull {
    pub max_depth: usize,
}

/// Misuse of a [`TimerList`](crate::TimerList) handle.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// The record behind this handle already fired or was deleted.
    #[error("timer {0:?} is not linked into this list")]
    StaleHandle(TimerHandle),

    /// `adjust_timer` only moves deadlines later.
    #[error("adjusted deadline is earlier than the current one")]
    DeadlineMovedBack,
}
