//! FIFO-stable priority queue.

use std::mem;

/// A binary min-heap that pulls same-key values in insertion order.
///
/// Each item is stored with a unique epoch that complements the user key, so
/// that the heap order is total and deterministic even when keys collide.
pub(crate) struct PriorityQueue<K, V>
where
    K: Copy + Ord,
{
    heap: Vec<Item<K, V>>,
    next_epoch: u64,
}

impl<K: Copy + Ord, V> PriorityQueue<K, V> {
    /// Creates an empty `PriorityQueue`.
    pub(crate) fn new() -> Self {
        Self {
            heap: Vec::new(),
            next_epoch: 0,
        }
    }

    /// Returns the number of key-value pairs in the priority queue.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if the queue is empty.
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a new key-value pair.
    ///
    /// This operation has *O*(log(*N*)) worst-case complexity.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        let epoch = self.next_epoch;
        assert_ne!(epoch, u64::MAX);
        self.next_epoch += 1;

        self.heap.push(Item {
            key: UniqueKey { key, epoch },
            value,
        });
        self.sift_up(self.heap.len() - 1);
    }

    /// Pulls the value with the lowest key.
    ///
    /// If there are several equal lowest keys, the value which was inserted
    /// first is returned.
    pub(crate) fn pull(&mut self) -> Option<(K, V)> {
        let last = self.heap.pop()?;
        let top = match self.heap.first_mut() {
            Some(first) => {
                let top = mem::replace(first, last);
                self.sift_down(0);

                top
            }
            None => last,
        };

        Some((top.key.key, top.value))
    }

    /// Peeks the lowest key, leaving it in the queue.
    pub(crate) fn peek_key(&self) -> Option<&K> {
        self.heap.first().map(|item| &item.key.key)
    }

    /// Moves the item at `idx` up while its parent has a larger key.
    fn sift_up(&mut self, mut idx: usize) {
        while idx != 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].key >= self.heap[parent].key {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
    }

    /// Moves the item at `idx` down while a child has a smaller key.
    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let mut child = 2 * idx + 1;
            if child >= self.heap.len() {
                break;
            }
            // Pick the sibling with the smaller key.
            if child + 1 < self.heap.len() && self.heap[child + 1].key < self.heap[child].key {
                child += 1;
            }
            if self.heap[idx].key <= self.heap[child].key {
                break;
            }
            self.heap.swap(idx, child);
            idx = child;
        }
    }
}

struct Item<K, V> {
    key: UniqueKey<K>,
    value: V,
}

/// The user-provided key complemented by the insertion epoch.
///
/// The derived order is lexicographic, so `key` has priority over `epoch`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct UniqueKey<K> {
    key: K,
    epoch: u64,
}
