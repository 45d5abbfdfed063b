// Epoch based reclamation for the lock-free queue.
//
// Every queue operation pins a participant slot to the global epoch it
// observed. Unlinked nodes are retired onto a garbage stack tagged with the
// global epoch at retire time. The global epoch only advances when every
// pinned participant has caught up with it, so while any thread is pinned at
// epoch e the global epoch stays <= e + 1. A node retired at epoch r is
// therefore unreachable by everyone once the global epoch reaches r + 2.

use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering, fence};

use crate::garbage_node::{FreeFn, GarbageNode};
use crate::padded_type::PaddedType;

const NOT_IN_CRITICAL: usize = usize::MAX;
const EPOCH_MASK: usize = usize::MAX >> 1; // use only lower bits for epoch
const RECLAIM_DISTANCE: usize = 2;
// retire this many nodes between collection passes
const COLLECT_EVERY: usize = 64;

struct Participant {
    epoch: AtomicUsize,
    in_use: AtomicBool,
    // written once before the slot is published, immutable afterwards
    next: *mut Participant,
}

pub(crate) struct Collector {
    global_epoch: PaddedType<AtomicUsize>,
    participants: AtomicPtr<Participant>,
    garbage: AtomicPtr<GarbageNode>,
    retired: AtomicUsize,
    pending: AtomicUsize,
}

unsafe impl Send for Collector {}
unsafe impl Sync for Collector {}

pub(crate) struct Guard<'a> {
    collector: &'a Collector,
    participant: &'a Participant,
    collect_due: Cell<bool>,
}

impl Collector {
    pub fn new() -> Self {
        Collector {
            global_epoch: PaddedType::new(AtomicUsize::new(0)),
            participants: AtomicPtr::new(ptr::null_mut()),
            garbage: AtomicPtr::new(ptr::null_mut()),
            retired: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    // enter a critical section: nothing retired from now on is freed until the guard drops
    pub fn pin(&self) -> Guard<'_> {
        let participant = self.acquire_participant();
        let epoch = self.global_epoch.load(Ordering::SeqCst);
        participant.epoch.store(epoch, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        Guard {
            collector: self,
            participant,
            collect_due: Cell::new(false),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    fn acquire_participant(&self) -> &Participant {
        let mut current = self.participants.load(Ordering::Acquire);
        while !current.is_null() {
            let participant = unsafe { &*current };
            if !participant.in_use.load(Ordering::Relaxed)
                && participant
                    .in_use
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return participant;
            }
            current = participant.next;
        }

        // every slot is busy, publish a fresh one at the front
        let node = Box::into_raw(Box::new(Participant {
            epoch: AtomicUsize::new(NOT_IN_CRITICAL),
            in_use: AtomicBool::new(true),
            next: ptr::null_mut(),
        }));

        let mut head = self.participants.load(Ordering::Relaxed);
        loop {
            unsafe { (*node).next = head };
            match self.participants.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return unsafe { &*node },
                Err(new_head) => head = new_head,
            }
        }
    }

    fn push_garbage(&self, node: *mut GarbageNode) {
        let mut head = self.garbage.load(Ordering::Relaxed);
        loop {
            unsafe { (*node).next = head };
            match self.garbage.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(new_head) => head = new_head,
            }
        }
    }

    // bump the global epoch if every pinned participant has observed the current one
    fn try_advance(&self) -> usize {
        let global = self.global_epoch.load(Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let mut current = self.participants.load(Ordering::Acquire);
        while !current.is_null() {
            let participant = unsafe { &*current };
            let local = participant.epoch.load(Ordering::SeqCst);
            if local != NOT_IN_CRITICAL && local != global {
                return global;
            }
            current = participant.next;
        }

        let next = global.wrapping_add(1) & EPOCH_MASK;
        match self.global_epoch.compare_exchange(
            global,
            next,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => next,
            Err(actual) => actual,
        }
    }

    pub fn collect(&self) {
        let global = self.try_advance();

        // take the whole stack, free what is old enough and hand the rest back
        let mut node = self.garbage.swap(ptr::null_mut(), Ordering::Acquire);
        let mut freed = 0;
        while !node.is_null() {
            let (epoch, next) = unsafe { ((*node).epoch, (*node).next) };

            // handle wraparound: distance is computed modulo the mask
            if global.wrapping_sub(epoch) & EPOCH_MASK >= RECLAIM_DISTANCE {
                unsafe { GarbageNode::drop_node(node) };
                freed += 1;
            } else {
                self.push_garbage(node);
            }
            node = next;
        }

        if freed > 0 {
            self.pending.fetch_sub(freed, Ordering::Relaxed);
            tracing::trace!(freed, global, "reclaimed retired queue nodes");
        }
    }
}

impl Guard<'_> {
    // schedule `ptr` for destruction once no pinned thread can observe it.
    // `ptr` must already be unreachable for threads that pin after this call
    pub unsafe fn retire(&self, ptr: *mut (), free: FreeFn) {
        let epoch = self.collector.global_epoch.load(Ordering::SeqCst);
        self.collector.pending.fetch_add(1, Ordering::Relaxed);
        self.collector.push_garbage(GarbageNode::new(ptr, free, epoch));

        let retired = self.collector.retired.fetch_add(1, Ordering::Relaxed);
        if retired % COLLECT_EVERY == COLLECT_EVERY - 1 {
            self.collect_due.set(true);
        }
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.participant
            .epoch
            .store(NOT_IN_CRITICAL, Ordering::SeqCst);
        self.participant.in_use.store(false, Ordering::Release);

        if self.collect_due.get() {
            self.collector.collect();
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        // exclusive access: nobody is pinned any more
        let mut node = *self.garbage.get_mut();
        while !node.is_null() {
            node = unsafe { GarbageNode::drop_node(node) };
        }

        let mut participant = *self.participants.get_mut();
        while !participant.is_null() {
            let boxed = unsafe { Box::from_raw(participant) };
            participant = boxed.next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    static FREED: AtomicUsize = AtomicUsize::new(0);

    unsafe fn free_counted(ptr: *mut ()) {
        drop(unsafe { Box::from_raw(ptr as *mut u64) });
        FREED.fetch_add(1, Ordering::SeqCst);
    }

    fn retire_one(collector: &Collector) {
        let guard = collector.pin();
        let ptr = Box::into_raw(Box::new(7u64)) as *mut ();
        unsafe { guard.retire(ptr, free_counted) };
    }

    #[test]
    fn pinned_thread_blocks_reclamation() {
        let collector = Arc::new(Collector::new());
        let before = FREED.load(Ordering::SeqCst);

        let reader = collector.pin();
        for _ in 0..COLLECT_EVERY * 4 {
            retire_one(&collector);
        }
        collector.collect();
        collector.collect();
        assert_eq!(collector.pending(), COLLECT_EVERY * 4);

        drop(reader);
        collector.collect();
        collector.collect();
        collector.collect();
        assert_eq!(collector.pending(), 0);
        assert!(FREED.load(Ordering::SeqCst) >= before + COLLECT_EVERY * 4);
    }

    #[test]
    fn slots_are_recycled() {
        let collector = Collector::new();
        for _ in 0..100 {
            let _g = collector.pin();
        }

        let mut slots = 0;
        let mut current = collector.participants.load(Ordering::Acquire);
        while !current.is_null() {
            slots += 1;
            current = unsafe { (*current).next };
        }
        assert_eq!(slots, 1);
    }
}
