use crate::error::PoolError;

pub const DEFAULT_THREAD_COUNT: usize = 8;
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 10_000;
pub const DEFAULT_THREAD_NAME: &str = "server-core-worker";

/// Which structure sits between `append` and the workers.
///
/// All three are FIFO and enforce the same depth bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QueueBackend {
    /// `VecDeque` behind a blocking mutex.
    #[default]
    Mutex,
    /// `VecDeque` behind a spinlock. Only worth it when producers and
    /// workers rarely collide.
    Spin,
    /// [`LockFreeQueue`](crate::LockFreeQueue) with an atomic depth counter.
    LockFree,
}

/// Settings for a [`ThreadPool`](crate::ThreadPool).
///
/// ```
/// use server_core::{PoolConfig, QueueBackend};
///
/// let config = PoolConfig::new()
///     .thread_count(4)
///     .max_queue_depth(256)
///     .backend(QueueBackend::LockFree);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub thread_count: usize,
    pub max_queue_depth: usize,
    pub backend: QueueBackend,
    /// Worker `i` is named `"{thread_name}-{i}"`.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            thread_count: DEFAULT_THREAD_COUNT,
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
            backend: QueueBackend::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    pub fn max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    pub fn backend(mut self, backend: QueueBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Rejects zero threads, a zero depth bound, or a thread name the OS
    /// can not take.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidThreadCount`], [`PoolError::InvalidQueueDepth`] or
    /// [`PoolError::InvalidThreadName`].
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.thread_count == 0 {
            return Err(PoolError::InvalidThreadCount);
        }
        if self.max_queue_depth == 0 {
            return Err(PoolError::InvalidQueueDepth);
        }
        // thread names become C strings
        if self.thread_name.contains('\0') {
            return Err(PoolError::InvalidThreadName(self.thread_name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.thread_count, 8);
        assert_eq!(config.max_queue_depth, 10_000);
        assert_eq!(config.backend, QueueBackend::Mutex);
        assert_eq!(config.thread_name, "server-core-worker");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_threads_rejected() {
        let config = PoolConfig::new().thread_count(0);
        assert!(matches!(config.validate(), Err(PoolError::InvalidThreadCount)));
    }

    #[test]
    fn zero_depth_rejected() {
        let config = PoolConfig::new().max_queue_depth(0);
        assert!(matches!(config.validate(), Err(PoolError::InvalidQueueDepth)));
    }

    #[test]
    fn nul_in_thread_name_rejected() {
        let config = PoolConfig::new().thread_count(2).thread_name("conn\0x");
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidThreadName(name)) if name == "conn\0x"
        ));
    }

    #[test]
    fn setters_chain() {
        let config = PoolConfig::new()
            .thread_count(2)
            .max_queue_depth(1)
            .backend(QueueBackend::Spin)
            .thread_name("conn");
        assert_eq!(config.thread_count, 2);
        assert_eq!(config.max_queue_depth, 1);
        assert_eq!(config.backend, QueueBackend::Spin);
        assert_eq!(config.thread_name, "conn");
    }
}
