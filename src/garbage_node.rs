use std::ptr;

// type-erased destructor for a retired allocation
pub(crate) type FreeFn = unsafe fn(*mut ());

// one retired allocation waiting for the epoch to move past it.
// nodes form an intrusive treiber stack owned by the collector
pub(crate) struct GarbageNode {
    pub ptr: *mut (),
    pub free: FreeFn,
    pub epoch: usize,
    pub next: *mut GarbageNode,
}

impl GarbageNode {
    pub fn new(ptr: *mut (), free: FreeFn, epoch: usize) -> *mut GarbageNode {
        Box::into_raw(Box::new(GarbageNode {
            ptr,
            free,
            epoch,
            next: ptr::null_mut(),
        }))
    }

    // frees the retired allocation and the node itself, returns next.
    // caller must own `node` exclusively and know that no reader can still hold `ptr`
    pub unsafe fn drop_node(node: *mut GarbageNode) -> *mut GarbageNode {
        unsafe {
            let boxed = Box::from_raw(node);
            (boxed.free)(boxed.ptr);
            boxed.next
        }
    }
}
