//! Specialized collection types

pub use slotmap::{new_key_type, Key, SecondaryMap, SlotMap};

/// Grow-only pool of reusable records.
///
/// `reset` rewinds the cursor without dropping anything, so a pool that has
/// reached its steady-state size hands out records without allocating.
#[derive(Debug)]
pub struct FramePool<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T: Default> FramePool<T> {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }

    /// Create a pool with pre-allocated records
    pub fn with_capacity(capacity: usize) -> Self {
        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, T::default);
        Self { items, cursor: 0 }
    }

    /// Rewind the cursor; records stay allocated
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Hand out the next record and its index, growing only when exhausted
    pub fn next_slot(&mut self) -> (usize, &mut T) {
        if self.cursor == self.items.len() {
            self.items.push(T::default());
        }
        let index = self.cursor;
        self.cursor += 1;
        (index, &mut self.items[index])
    }

    /// Record handed out this frame
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items[..self.cursor].get(index)
    }

    /// Records handed out since the last reset
    pub fn active(&self) -> &[T] {
        &self.items[..self.cursor]
    }

    /// Records allocated but not handed out since the last reset
    pub fn stale_mut(&mut self) -> &mut [T] {
        &mut self.items[self.cursor..]
    }

    /// Number of records handed out since the last reset
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// True when nothing was handed out since the last reset
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Total records ever allocated
    pub fn capacity(&self) -> usize {
        self.items.len()
    }
}

impl<T: Default> Default for FramePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuses_records_after_reset() {
        let mut pool: FramePool<u32> = FramePool::new();
        for value in 0..4 {
            *pool.next_slot().1 = value;
        }
        assert_eq!(pool.capacity(), 4);

        pool.reset();
        assert!(pool.is_empty());
        let (index, slot) = pool.next_slot();
        assert_eq!(index, 0);
        assert_eq!(*slot, 0);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.stale_mut().len(), 3);
    }

    #[test]
    fn test_get_ignores_stale_records() {
        let mut pool: FramePool<u32> = FramePool::with_capacity(2);
        assert!(pool.get(0).is_none());
        pool.next_slot();
        assert!(pool.get(0).is_some());
        assert!(pool.get(1).is_none());
    }
}
