//! Lock-free, pre-reserved list of indices.

use std::fmt;

use crossbeam_utils::CachePadded;

use crate::loom_exports::sync::atomic::{AtomicUsize, Ordering};

/// Error returned when a push exceeds the reserved capacity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct CapacityOverflow {
    pub(crate) capacity: usize,
}

/// An append-only list of indices with a fixed, pre-reserved capacity.
///
/// Pushes are lock-free and may be performed concurrently from several
/// threads: each push claims a distinct slot by incrementing a shared counter.
/// The order of concurrently pushed indices is unspecified.
///
/// Reads and [`clear`](IndexList::clear) must not race with pushes; they are
/// meant to be performed once all writers of a logical step have completed,
/// which requires an external synchronization barrier.
pub(crate) struct IndexList {
    /// Number of claimed slots. May exceed the capacity after an overflowing
    /// push.
    len: CachePadded<AtomicUsize>,
    slots: Box<[AtomicUsize]>,
}

impl IndexList {
    /// Creates an empty list able to hold `capacity` indices.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let slots: Vec<_> = (0..capacity).map(|_| AtomicUsize::new(0)).collect();

        Self {
            len: CachePadded::new(AtomicUsize::new(0)),
            slots: slots.into(),
        }
    }

    /// Returns the reserved capacity.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Appends an index and returns the slot it was stored at.
    pub(crate) fn push(&self, index: usize) -> Result<usize, CapacityOverflow> {
        let slot = self.len.fetch_add(1, Ordering::Relaxed);

        match self.slots.get(slot) {
            Some(s) => {
                s.store(index, Ordering::Release);

                Ok(slot)
            }
            None => Err(CapacityOverflow {
                capacity: self.capacity(),
            }),
        }
    }

    /// Returns the number of stored indices.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire).min(self.capacity())
    }

    /// Returns `true` if no index was pushed since the last clear.
    pub(crate) fn is_empty(&self) -> bool {
        self.len.load(Ordering::Acquire) == 0
    }

    /// Returns an iterator over the stored indices, in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots[..self.len()]
            .iter()
            .map(|s| s.load(Ordering::Acquire))
    }

    /// Empties the list.
    ///
    /// This is idempotent.
    pub(crate) fn clear(&self) {
        self.len.store(0, Ordering::Release);
    }

    /// Replaces the storage with an empty list of the specified capacity.
    pub(crate) fn reserve(&mut self, capacity: usize) {
        *self = Self::with_capacity(capacity);
    }
}

impl fmt::Debug for IndexList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexList")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
