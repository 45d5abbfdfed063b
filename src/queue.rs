use std::fmt;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::epoch::Collector;
use crate::padded_type::PaddedType;

struct Node<T> {
    // uninit for the initial sentinel, moved out once a node becomes the sentinel
    data: MaybeUninit<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            data: MaybeUninit::uninit(),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }

    fn with_value(value: T) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            data: MaybeUninit::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

// frees a retired sentinel. its payload was already moved out (or never existed)
unsafe fn free_node<T>(node: *mut ()) {
    drop(unsafe { Box::from_raw(node as *mut Node<T>) });
}

/// Unbounded multi-producer multi-consumer FIFO queue.
///
/// A Michael-Scott linked queue: `head` always points at an already consumed
/// sentinel whose `next` is the first live element, `tail` points at the last
/// node or lags one step behind it. Both are only ever moved with CAS and any
/// thread that sees `tail` lagging pushes it forward before doing its own
/// work, so a stalled producer never blocks the others.
///
/// Unlinked sentinels are not freed on the spot; they are handed to an epoch
/// based collector and released once no concurrent operation can still be
/// reading them.
///
/// Values pushed by a single producer come out in that producer's order.
/// Across producers the order is whatever order their links landed in.
pub struct LockFreeQueue<T> {
    head: PaddedType<AtomicPtr<Node<T>>>,
    tail: PaddedType<AtomicPtr<Node<T>>>,
    collector: Collector,
}

unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    pub fn new() -> Self {
        let sentinel = Node::sentinel();
        LockFreeQueue {
            head: PaddedType::new(AtomicPtr::new(sentinel)),
            tail: PaddedType::new(AtomicPtr::new(sentinel)),
            collector: Collector::new(),
        }
    }

    pub fn enqueue(&self, value: T) {
        let node = Node::with_value(value);
        let _guard = self.collector.pin();

        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let tail_next = unsafe { (*tail).next.load(Ordering::Acquire) };

            // another producer moved tail while we were reading, start over
            if tail != self.tail.load(Ordering::Acquire) {
                continue;
            }

            if !tail_next.is_null() {
                // someone linked a node but has not advanced tail yet, do it for them
                let _ = self.tail.compare_exchange(
                    tail,
                    tail_next,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                continue;
            }

            let linked = unsafe {
                (*tail).next.compare_exchange(
                    ptr::null_mut(),
                    node,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
            };

            if linked.is_ok() {
                // best effort, the next operation to notice the lag will finish it
                let _ =
                    self.tail
                        .compare_exchange(tail, node, Ordering::AcqRel, Ordering::Acquire);
                return;
            }
        }
    }

    pub fn try_dequeue(&self) -> Option<T> {
        let guard = self.collector.pin();

        loop {
            // head must be sampled no later than tail
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let first = unsafe { (*head).next.load(Ordering::Acquire) };

            if head != self.head.load(Ordering::Acquire) {
                continue;
            }

            if head == tail {
                if first.is_null() {
                    return None;
                }
                // tail lags behind a freshly linked node
                let _ = self
                    .tail
                    .compare_exchange(tail, first, Ordering::AcqRel, Ordering::Acquire);
                continue;
            }

            debug_assert!(!first.is_null());

            // copy the payload out before publishing the new head. if the CAS loses,
            // the winner owns the value and our bitwise copy is forgotten
            let value = unsafe { ManuallyDrop::new(ptr::read((*first).data.as_ptr())) };

            if self
                .head
                .compare_exchange(head, first, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                unsafe { guard.retire(head as *mut (), free_node::<T>) };
                return Some(ManuallyDrop::into_inner(value));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let _guard = self.collector.pin();
        let head = self.head.load(Ordering::Acquire);
        unsafe { (*head).next.load(Ordering::Acquire).is_null() }
    }

    /// Number of unlinked nodes still waiting for reclamation.
    pub fn pending_garbage(&self) -> usize {
        self.collector.pending()
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("is_empty", &self.is_empty())
            .field("pending_garbage", &self.pending_garbage())
            .finish()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // the sentinel's payload is already gone, every node after it still owns one
        let sentinel = *self.head.get_mut();
        let mut current = unsafe { (*sentinel).next.load(Ordering::Relaxed) };
        unsafe { drop(Box::from_raw(sentinel)) };

        while !current.is_null() {
            let mut node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
            unsafe { node.data.assume_init_drop() };
        }
        // retired sentinels are released when `collector` drops
    }
}
