//! Comparator-driven binary min-heap.

use std::cmp::Ordering;
use std::sync::Arc;

/// Comparator shared by a queue and its clones.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// A binary min-heap ordered by a caller-supplied comparator.
///
/// The item the comparator ranks `Less` is dequeued first. Ties are broken
/// by heap position, which is not stable across removals, so dequeue order
/// for equal items is non-deterministic.
pub struct PriorityQueue<T> {
    items: Vec<T>,
    cmp: Comparator<T>,
}

impl<T> PriorityQueue<T> {
    /// Create an empty queue with the given comparator.
    pub fn new(cmp: Comparator<T>) -> Self {
        Self {
            items: Vec::new(),
            cmp,
        }
    }

    /// Insert an item. O(log n).
    pub fn enqueue(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    /// Remove and return the top item, or `None` when empty. O(log n).
    pub fn dequeue(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let top = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        top
    }

    /// The top item without removing it. O(1).
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Rebuild heap order from scratch. O(n).
    pub(crate) fn rebuild(&mut self) {
        if self.items.len() < 2 {
            return;
        }
        for i in (0..self.items.len() / 2).rev() {
            self.sift_down(i);
        }
    }

    pub(crate) fn items(&self) -> &[T] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if (self.cmp)(&self.items[idx], &self.items[parent]) == Ordering::Less {
                self.items.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;
            if left < len && (self.cmp)(&self.items[left], &self.items[smallest]) == Ordering::Less
            {
                smallest = left;
            }
            if right < len
                && (self.cmp)(&self.items[right], &self.items[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.items.swap(idx, smallest);
            idx = smallest;
        }
    }
}
