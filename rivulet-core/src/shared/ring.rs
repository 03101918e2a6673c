//! Fixed-capacity ring that keeps the most recent items it has seen.

/// Ring keeps at most `capacity` items; once full, every [`Ring::add`] overwrites the oldest
/// item. It is owned by a single stage, so there is no internal synchronization.
#[derive(Debug)]
pub struct Ring<T> {
    items: Vec<T>,
    capacity: usize,
    /// total number of items ever added, the write cursor is `written % capacity`.
    written: usize,
}

impl<T> Ring<T> {
    /// Creates a ring holding up to `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity should be greater than 0");
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            written: 0,
        }
    }

    pub fn add(&mut self, item: T) {
        let cursor = self.written % self.capacity;
        if let Some(slot) = self.items.get_mut(cursor) {
            *slot = item;
        } else {
            self.items.push(item);
        }
        self.written += 1;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Consumes the ring and returns the retained items, oldest first.
    pub fn take(mut self) -> Vec<T> {
        if self.written > self.capacity {
            self.items.rotate_left(self.written % self.capacity);
        }
        self.items
    }
}
