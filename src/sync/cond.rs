use parking_lot::Condvar;
use std::time::{Duration, Instant};

use crate::sync::LockerGuard;

/// Condition variable paired with a [`Locker`](crate::sync::Locker).
///
/// Every waiter on one `Cond` must use guards from the same `Locker`;
/// mixing lockers panics.
#[derive(Debug, Default)]
pub struct Cond {
    inner: Condvar,
}

impl Cond {
    pub fn new() -> Self {
        Cond {
            inner: Condvar::new(),
        }
    }

    /// Releases the guard's lock, blocks until signaled, then reacquires it.
    /// Spurious wakeups are possible; callers re-check their predicate.
    pub fn wait<T: ?Sized>(&self, guard: &mut LockerGuard<'_, T>) {
        self.inner.wait(guard);
    }

    /// Like [`Cond::wait`] but gives up at the absolute `deadline`.
    /// Returns `true` if the deadline passed before a signal arrived.
    pub fn wait_until<T: ?Sized>(&self, guard: &mut LockerGuard<'_, T>, deadline: Instant) -> bool {
        self.inner.wait_until(guard, deadline).timed_out()
    }

    /// Like [`Cond::wait_until`] with a relative timeout.
    pub fn wait_for<T: ?Sized>(&self, guard: &mut LockerGuard<'_, T>, timeout: Duration) -> bool {
        self.inner.wait_for(guard, timeout).timed_out()
    }

    /// Wakes one waiter, returns whether anyone was waiting.
    pub fn signal(&self) -> bool {
        self.inner.notify_one()
    }

    /// Wakes every waiter, returns how many were woken.
    pub fn broadcast(&self) -> usize {
        self.inner.notify_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Locker;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_until_times_out_without_signal() {
        let lock = Locker::new(false);
        let cond = Cond::new();

        let mut guard = lock.lock();
        let timed_out = cond.wait_until(&mut guard, Instant::now() + Duration::from_millis(20));
        assert!(timed_out);
        assert!(!*guard);
    }

    #[test]
    fn wait_for_sees_signal_before_timeout() {
        let state = Arc::new((Locker::new(false), Cond::new()));

        let waiter = {
            let state = state.clone();
            thread::spawn(move || {
                let (lock, cond) = &*state;
                let mut ready = lock.lock();
                while !*ready {
                    assert!(!cond.wait_for(&mut ready, Duration::from_secs(10)), "no signal");
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        {
            let (lock, cond) = &*state;
            *lock.lock() = true;
            cond.signal();
        }
        waiter.join().unwrap();

        let (lock, cond) = &*state;
        let mut guard = lock.lock();
        assert!(cond.wait_for(&mut guard, Duration::from_millis(10)));
    }

    #[test]
    fn broadcast_releases_all_waiters() {
        let state = Arc::new((Locker::new(false), Cond::new()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                thread::spawn(move || {
                    let (lock, cond) = &*state;
                    let mut ready = lock.lock();
                    while !*ready {
                        cond.wait(&mut ready);
                    }
                })
            })
            .collect();

        {
            let (lock, cond) = &*state;
            *lock.lock() = true;
            cond.broadcast();
        }

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn signal_reports_no_waiters() {
        let cond = Cond::new();
        assert!(!cond.signal());
        assert_eq!(cond.broadcast(), 0);
    }
}
