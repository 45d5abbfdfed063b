use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

pub type LockerGuard<'a, T> = MutexGuard<'a, T>;

/// Exclusive lock around a value of type `T`.
///
/// Unlocking happens when the guard is dropped; [`Locker::unlock`] exists for
/// call sites that want the release to be explicit.
#[derive(Debug, Default)]
pub struct Locker<T: ?Sized> {
    inner: Mutex<T>,
}

impl<T> Locker<T> {
    pub fn new(value: T) -> Self {
        Locker {
            inner: Mutex::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> Locker<T> {
    /// Blocks until the lock is acquired.
    pub fn lock(&self) -> LockerGuard<'_, T> {
        self.inner.lock()
    }

    /// Acquires the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<LockerGuard<'_, T>> {
        self.inner.try_lock()
    }

    /// Gives up after `timeout` without acquiring.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<LockerGuard<'_, T>> {
        self.inner.try_lock_for(timeout)
    }

    pub fn unlock(guard: LockerGuard<'_, T>) {
        drop(guard);
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_is_exclusive_across_threads() {
        let counter = Arc::new(Locker::new(0usize));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *counter.lock() += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*counter.lock(), 8000);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let locker = Locker::new(());
        let guard = locker.lock();
        assert!(locker.is_locked());
        assert!(locker.try_lock().is_none());

        Locker::unlock(guard);
        assert!(!locker.is_locked());
        assert!(locker.try_lock().is_some());
    }

    #[test]
    fn try_lock_for_waits_for_release() {
        let locker = Arc::new(Locker::new(0));
        let guard = locker.lock();
        assert!(locker.try_lock_for(Duration::from_millis(10)).is_none());

        let holder = {
            let locker = locker.clone();
            thread::spawn(move || *locker.try_lock_for(Duration::from_secs(10)).unwrap() += 1)
        };
        thread::sleep(Duration::from_millis(20));
        Locker::unlock(guard);
        holder.join().unwrap();
        assert_eq!(*locker.lock(), 1);
    }
}
