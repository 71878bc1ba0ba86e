/// Fixed-capacity ring of events; once full, each add overwrites the oldest slot.
///
/// Slots are allocated once per capacity, so `add` never reallocates. Retained
/// events are always yielded oldest first.
#[derive(Debug, Clone)]
pub struct CyclicBuffer<T> {
    slots: Vec<Option<T>>,
    first: usize,
    len: usize,
}

impl<T> CyclicBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Self::empty_slots(capacity),
            first: 0,
            len: 0,
        }
    }

    fn empty_slots(capacity: usize) -> Vec<Option<T>> {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        slots
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append `item` as the newest entry, returning whatever was evicted.
    ///
    /// With zero capacity the item itself is returned immediately.
    pub fn add(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        if capacity == 0 {
            return Some(item);
        }
        let last = (self.first + self.len) % capacity;
        let evicted = self.slots[last].replace(item);
        if self.len < capacity {
            self.len += 1;
        } else {
            self.first = (self.first + 1) % capacity;
        }
        evicted
    }

    /// The `i`-th oldest retained entry.
    pub fn get(&self, i: usize) -> Option<&T> {
        if i >= self.len {
            return None;
        }
        self.slots[(self.first + i) % self.capacity()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Remove the oldest entry.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.first].take();
        self.first = (self.first + 1) % self.capacity();
        self.len -= 1;
        item
    }

    /// Remove and return every entry, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(item) = self.pop() {
            out.push(item);
        }
        self.first = 0;
        out
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.first = 0;
        self.len = 0;
    }

    /// Change capacity, keeping only the most recent `new_capacity` entries.
    ///
    /// Not atomic: callers must not add concurrently.
    pub fn resize(&mut self, new_capacity: usize) {
        if new_capacity == self.capacity() {
            return;
        }
        let mut retained = self.drain();
        let skip = retained.len().saturating_sub(new_capacity);
        let kept = retained.split_off(skip);
        self.slots = Self::empty_slots(new_capacity);
        self.first = 0;
        self.len = 0;
        for item in kept {
            self.add(item);
        }
    }
}

impl<T: Clone> CyclicBuffer<T> {
    /// Copy of every retained entry, oldest first, leaving the buffer untouched.
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_capacity_entries_in_order() {
        for capacity in 0..5 {
            for n in 0..12usize {
                let mut buf = CyclicBuffer::new(capacity);
                for i in 0..n {
                    buf.add(i);
                }
                let expected: Vec<_> = (n.saturating_sub(capacity)..n).collect();
                assert_eq!(buf.snapshot(), expected, "capacity={capacity} n={n}");
                assert_eq!(buf.len(), n.min(capacity));
            }
        }
    }

    #[test]
    fn add_returns_evicted_oldest() {
        let mut buf = CyclicBuffer::new(2);
        assert_eq!(buf.add('a'), None);
        assert_eq!(buf.add('b'), None);
        assert!(buf.is_full());
        assert_eq!(buf.add('c'), Some('a'));
        assert_eq!(buf.snapshot(), vec!['b', 'c']);
    }

    #[test]
    fn zero_capacity_evicts_itself() {
        let mut buf = CyclicBuffer::new(0);
        assert_eq!(buf.add(7), Some(7));
        assert!(buf.is_empty());
        assert!(buf.snapshot().is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut buf = CyclicBuffer::new(3);
        buf.clear();
        assert!(buf.snapshot().is_empty());
        buf.add(1);
        buf.add(2);
        buf.clear();
        buf.clear();
        assert!(buf.snapshot().is_empty());
        buf.add(3);
        assert_eq!(buf.snapshot(), vec![3]);
    }

    #[test]
    fn drain_empties_after_wraparound() {
        let mut buf = CyclicBuffer::new(3);
        for i in 0..5 {
            buf.add(i);
        }
        assert_eq!(buf.drain(), vec![2, 3, 4]);
        assert!(buf.is_empty());
        buf.add(9);
        assert_eq!(buf.get(0), Some(&9));
    }

    #[test]
    fn resize_keeps_most_recent() {
        let mut buf = CyclicBuffer::new(4);
        for i in 0..6 {
            buf.add(i);
        }
        buf.resize(2);
        assert_eq!(buf.capacity(), 2);
        assert_eq!(buf.snapshot(), vec![4, 5]);

        buf.resize(5);
        buf.add(6);
        assert_eq!(buf.snapshot(), vec![4, 5, 6]);
    }
}
