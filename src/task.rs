/// A unit of work the pool can run.
///
/// The pool never owns a task. Callers keep the `Arc` (usually the connection
/// object itself) and the pool only holds a weak reference between `append`
/// and execution, so a connection dropped while queued is simply skipped.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use server_core::Task;
///
/// struct Conn {
///     served: AtomicUsize,
/// }
///
/// impl Task for Conn {
///     fn process(&self) {
///         self.served.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let conn = Arc::new(Conn { served: AtomicUsize::new(0) });
/// conn.process();
/// assert_eq!(conn.served.load(Ordering::Relaxed), 1);
/// ```
pub trait Task: Send + Sync {
    fn process(&self);
}

impl<F> Task for F
where
    F: Fn() + Send + Sync,
{
    fn process(&self) {
        self()
    }
}
