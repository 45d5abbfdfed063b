use std::time::{Duration, Instant};

use crate::sync::{Cond, Locker};

/// Counting semaphore.
///
/// `wait` parks the calling thread until a permit is available and takes it.
/// `post` returns a permit and wakes one parked thread.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Locker<usize>,
    cond: Cond,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Semaphore {
            permits: Locker::new(initial),
            cond: Cond::new(),
        }
    }

    pub fn wait(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.cond.wait(&mut permits);
        }
        *permits -= 1;
    }

    pub fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Returns `false` if no permit showed up within `timeout`. A timeout too
    /// large to express as a deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.cond.wait_until(&mut permits, deadline) && *permits == 0 {
                return false;
            }
        }
        *permits -= 1;
        true
    }

    pub fn post(&self) {
        *self.permits.lock() += 1;
        self.cond.signal();
    }

    pub fn post_many(&self, n: usize) {
        if n == 0 {
            return;
        }
        *self.permits.lock() += n;
        if n == 1 {
            self.cond.signal();
        } else {
            self.cond.broadcast();
        }
    }

    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}
