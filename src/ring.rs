//! Fixed-capacity ring buffer backing the statistics windows.

/// Ring buffer with storage allocated once at construction.
///
/// Pushing into a full ring overwrites the oldest entry, so `len()` never
/// exceeds `capacity()`.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    slots: Box<[T]>,
    /// Next write position.
    cursor: usize,
    len: usize,
}

impl<T: Copy + Default> Ring<T> {
    /// Capacity is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![T::default(); capacity.max(1)].into_boxed_slice(),
            cursor: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        self.slots[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn newest(&self) -> Option<T> {
        self.iter_newest_first().next()
    }

    pub fn iter_newest_first(&self) -> impl Iterator<Item = T> + '_ {
        let capacity = self.slots.len();
        (0..self.len).map(move |i| self.slots[(self.cursor + capacity - 1 - i) % capacity])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_has_no_entries() {
        let ring: Ring<u32> = Ring::new(3);
        assert!(ring.is_empty());
        assert_eq!(ring.newest(), None);
        assert_eq!(ring.iter_newest_first().count(), 0);
    }

    #[test]
    fn iterates_newest_first() {
        let mut ring = Ring::new(4);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.iter_newest_first().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(ring.newest(), Some(3));
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut ring = Ring::new(3);
        for value in 1..=7 {
            ring.push(value);
            assert!(ring.len() <= ring.capacity());
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter_newest_first().collect::<Vec<_>>(), vec![7, 6, 5]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut ring = Ring::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.push(Some(1.0));
        ring.push(None);
        assert_eq!(ring.iter_newest_first().collect::<Vec<_>>(), vec![None]);
    }
}
