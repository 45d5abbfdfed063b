use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::QueueBackend;
use crate::queue::LockFreeQueue;
use crate::sync::{Locker, SpinLock};

// bounded FIFO shared by the producers and every worker of one pool
pub(crate) struct WorkQueue<E> {
    max_depth: usize,
    inner: Backend<E>,
}

enum Backend<E> {
    Mutex(Locker<VecDeque<E>>),
    Spin(SpinLock<VecDeque<E>>),
    LockFree {
        queue: LockFreeQueue<E>,
        // slots reserved by producers, reserved before the link and released after the unlink
        depth: AtomicUsize,
    },
}

impl<E> WorkQueue<E> {
    pub fn new(backend: QueueBackend, max_depth: usize) -> Self {
        let inner = match backend {
            QueueBackend::Mutex => Backend::Mutex(Locker::new(VecDeque::new())),
            QueueBackend::Spin => Backend::Spin(SpinLock::new(VecDeque::new())),
            QueueBackend::LockFree => Backend::LockFree {
                queue: LockFreeQueue::new(),
                depth: AtomicUsize::new(0),
            },
        };
        WorkQueue { max_depth, inner }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    // hands the entry back when the queue already holds max_depth entries
    pub fn push(&self, entry: E) -> Result<(), E> {
        match &self.inner {
            Backend::Mutex(lock) => Self::push_locked(&mut lock.lock(), entry, self.max_depth),
            Backend::Spin(lock) => Self::push_locked(&mut lock.lock(), entry, self.max_depth),
            Backend::LockFree { queue, depth } => {
                let reserved = depth.fetch_add(1, Ordering::AcqRel);
                if reserved >= self.max_depth {
                    depth.fetch_sub(1, Ordering::AcqRel);
                    return Err(entry);
                }
                queue.enqueue(entry);
                Ok(())
            }
        }
    }

    pub fn pop(&self) -> Option<E> {
        match &self.inner {
            Backend::Mutex(lock) => lock.lock().pop_front(),
            Backend::Spin(lock) => lock.lock().pop_front(),
            Backend::LockFree { queue, depth } => {
                let entry = queue.try_dequeue()?;
                depth.fetch_sub(1, Ordering::AcqRel);
                Some(entry)
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            Backend::Mutex(lock) => lock.lock().len(),
            Backend::Spin(lock) => lock.lock().len(),
            Backend::LockFree { depth, .. } => depth.load(Ordering::Acquire),
        }
    }

    fn push_locked(queue: &mut VecDeque<E>, entry: E, max_depth: usize) -> Result<(), E> {
        if queue.len() >= max_depth {
            return Err(entry);
        }
        queue.push_back(entry);
        Ok(())
    }
}
