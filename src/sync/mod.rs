//! Blocking and spinning primitives the pool and queues are built on.
//!
//! `Locker` and `Cond` are thin wrappers over `parking_lot`, which never
//! poisons, so acquiring them cannot fail once constructed. `Semaphore` is
//! composed from the two. `SpinLock` busy-waits and is only meant for
//! critical sections that are a handful of instructions long.

mod cond;
mod locker;
mod semaphore;
mod spinlock;

pub use cond::Cond;
pub use locker::{Locker, LockerGuard};
pub use semaphore::Semaphore;
pub use spinlock::{SpinGuard, SpinLock};
