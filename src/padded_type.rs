use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

// keeps a hot shared value on its own 64 byte cache line so
// producers and consumers touching neighbouring fields don't false share
#[repr(align(64))]
#[derive(Debug, Default)]
pub(crate) struct PaddedType<T> {
    value: T,
}

impl<T> PaddedType<T> {
    pub(crate) const fn new(value: T) -> Self {
        PaddedType { value }
    }
}

impl<T> Deref for PaddedType<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> DerefMut for PaddedType<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

pub(crate) type PaddedAtomicUsize = PaddedType<AtomicUsize>;

impl PaddedAtomicUsize {
    // statistics counter bump, no ordering with anything else required
    #[inline]
    pub(crate) fn bump(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.value.load(Ordering::Relaxed)
    }
}
