//! Id-indexed priority queue.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use super::heap::{Comparator, PriorityQueue};

/// Derives the index id from an item.
pub type KeyFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// A [`PriorityQueue`] whose items carry a caller-derived string id.
///
/// Guarantees at most one live entry per id: enqueueing an id that is
/// already present first removes the stale entry. `remove` and `update`
/// rebuild the heap in full.
pub struct IndexedPriorityQueue<T> {
    heap: PriorityQueue<T>,
    ids: HashSet<String>,
    key_of: KeyFn<T>,
}

impl<T> IndexedPriorityQueue<T> {
    pub fn new(cmp: Comparator<T>, key_of: KeyFn<T>) -> Self {
        Self {
            heap: PriorityQueue::new(cmp),
            ids: HashSet::new(),
            key_of,
        }
    }

    /// Insert an item, replacing any live entry with the same id.
    pub fn enqueue(&mut self, item: T) {
        let id = (self.key_of)(&item);
        if self.ids.contains(&id) {
            self.remove(&id);
        }
        self.ids.insert(id);
        self.heap.enqueue(item);
    }

    /// Remove and return the top item.
    pub fn dequeue(&mut self) -> Option<T> {
        let item = self.heap.dequeue()?;
        self.ids.remove(&(self.key_of)(&item));
        Some(item)
    }

    pub fn peek(&self) -> Option<&T> {
        self.heap.peek()
    }

    /// Remove the entry with the given id, if live. Rebuilds the heap.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        if !self.ids.remove(id) {
            return None;
        }
        let key_of = Arc::clone(&self.key_of);
        let pos = self
            .heap
            .items()
            .iter()
            .position(|item| (key_of)(item) == id)?;
        let item = self.heap.items_mut().swap_remove(pos);
        self.heap.rebuild();
        Some(item)
    }

    /// Replace the live entry sharing the item's id (or insert it fresh).
    pub fn update(&mut self, item: T) {
        self.enqueue(item);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.ids.clear();
    }
}
