use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::pool::Shared;
use crate::task::Task;

// test builds refuse to start a worker with this name, so the spawn error path can be driven
#[cfg(test)]
pub(crate) const REFUSED_NAME: &str = "refused-worker-2";

// names of worker threads that have returned from their run loop
#[cfg(test)]
pub(crate) static EXITED: parking_lot::Mutex<Vec<String>> = parking_lot::const_mutex(Vec::new());

pub(crate) fn spawn_worker<T>(id: usize, name: String, shared: Arc<Shared<T>>) -> io::Result<JoinHandle<()>>
where
    T: Task + ?Sized + 'static,
{
    #[cfg(test)]
    if name == REFUSED_NAME {
        return Err(io::Error::other("worker spawn refused"));
    }

    thread::Builder::new().name(name).spawn(move || {
        tracing::debug!(worker = id, "worker started");
        run(id, &shared);
        tracing::debug!(worker = id, "worker exiting");

        #[cfg(test)]
        if let Some(name) = thread::current().name() {
            EXITED.lock().push(name.to_string());
        }
    })
}

fn run<T: Task + ?Sized>(id: usize, shared: &Shared<T>) {
    loop {
        // parks until append or shutdown posts a permit
        shared.ready.wait();

        if shared.is_stopped() {
            break;
        }

        // spurious permit or another worker got there first
        let Some(entry) = shared.queue.pop() else {
            continue;
        };

        // the owner dropped the task while it sat in the queue
        let Some(task) = entry.upgrade() else {
            shared.stats.skipped.bump();
            continue;
        };

        if panic::catch_unwind(AssertUnwindSafe(|| task.process())).is_err() {
            shared.stats.panicked.bump();
            tracing::error!(worker = id, "task panicked, worker keeps running");
        } else {
            shared.stats.executed.bump();
        }
    }
}
