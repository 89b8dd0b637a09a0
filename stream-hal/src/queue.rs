//! FIFO of buffers awaiting or undergoing hardware transfer.
//!
//! The queue stores [`BufferId`] handles in a fixed ring rather than links
//! embedded in the buffers, so a buffer can sit in the registry and in the
//! queue at once without back-pointers. It is not synchronized itself; the
//! owning device only touches it while holding its exclusive region.

use crate::buffer::BufferId;
use crate::constants::MAX_BUFFERS;

/// Fixed-capacity ordered queue of buffer handles.
pub struct TransferQueue<const N: usize> {
    entries: [BufferId; N],
    /// Index of the oldest entry.
    head: usize,
    len: usize,
}

impl<const N: usize> TransferQueue<N> {
    /// Create an empty queue.
    ///
    /// # Panics
    ///
    /// `N` must be between 1 and 256.
    pub const fn new() -> Self {
        assert!(N >= 1 && N <= MAX_BUFFERS, "queue capacity must be 1..=256");
        TransferQueue {
            entries: [BufferId::new(0); N],
            head: 0,
            len: 0,
        }
    }

    /// Append `id`. Returns whether the queue was empty beforehand, or
    /// `Err(id)` if it is full.
    pub fn push(&mut self, id: BufferId) -> Result<bool, BufferId> {
        if self.len == N {
            return Err(id);
        }
        debug_assert!(!self.contains(id), "buffer queued twice");
        let was_empty = self.len == 0;
        self.entries[(self.head + self.len) % N] = id;
        self.len += 1;
        Ok(was_empty)
    }

    /// Oldest entry.
    pub fn front(&self) -> Option<BufferId> {
        if self.len == 0 {
            None
        } else {
            Some(self.entries[self.head])
        }
    }

    pub fn pop_front(&mut self) -> Option<BufferId> {
        self.pop_front_if(|_| true)
    }

    /// Remove the oldest entry only if `ready` accepts it.
    pub fn pop_front_if(&mut self, ready: impl FnOnce(BufferId) -> bool) -> Option<BufferId> {
        let front = self.front()?;
        if !ready(front) {
            return None;
        }
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(front)
    }

    /// Remove `id` wherever it is, keeping the order of the others.
    /// Returns `false` if it was not queued.
    pub fn remove(&mut self, id: BufferId) -> bool {
        let Some(pos) = self.iter().position(|queued| queued == id) else {
            return false;
        };
        for i in pos..self.len - 1 {
            self.entries[(self.head + i) % N] = self.entries[(self.head + i + 1) % N];
        }
        self.len -= 1;
        true
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.iter().any(|queued| queued == id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = BufferId> + '_ {
        (0..self.len).map(move |i| self.entries[(self.head + i) % N])
    }
}

impl<const N: usize> Default for TransferQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> BufferId {
        BufferId::new(i)
    }

    #[test]
    fn push_reports_empty_transition() {
        let mut q: TransferQueue<4> = TransferQueue::new();
        assert_eq!(q.push(id(0)), Ok(true));
        assert_eq!(q.push(id(1)), Ok(false));
        assert_eq!(q.len(), 2);

        q.pop_front();
        q.pop_front();
        assert_eq!(q.push(id(2)), Ok(true));
    }

    #[test]
    fn fifo_order() {
        let mut q: TransferQueue<3> = TransferQueue::new();
        q.push(id(2)).unwrap();
        q.push(id(0)).unwrap();
        q.push(id(1)).unwrap();
        assert_eq!(q.push(id(3)), Err(id(3)));

        assert_eq!(q.pop_front(), Some(id(2)));
        assert_eq!(q.pop_front(), Some(id(0)));
        assert_eq!(q.pop_front(), Some(id(1)));
        assert_eq!(q.pop_front(), None);
    }

    #[test]
    fn pop_front_if_leaves_rejected_entry() {
        let mut q: TransferQueue<2> = TransferQueue::new();
        q.push(id(0)).unwrap();
        assert_eq!(q.pop_front_if(|_| false), None);
        assert_eq!(q.front(), Some(id(0)));
        assert_eq!(q.pop_front_if(|b| b == id(0)), Some(id(0)));
        assert!(q.is_empty());
        assert_eq!(q.pop_front_if(|_| true), None);
    }

    #[test]
    fn remove_keeps_order() {
        let mut q: TransferQueue<4> = TransferQueue::new();
        for i in 0..4 {
            q.push(id(i)).unwrap();
        }
        assert!(q.remove(id(1)));
        assert!(!q.remove(id(1)));
        assert!(!q.contains(id(1)));

        let mut order = [id(9); 3];
        for (slot, queued) in order.iter_mut().zip(q.iter()) {
            *slot = queued;
        }
        assert_eq!(order, [id(0), id(2), id(3)]);
    }

    #[test]
    fn remove_front_and_back() {
        let mut q: TransferQueue<3> = TransferQueue::new();
        q.push(id(0)).unwrap();
        q.push(id(1)).unwrap();
        q.push(id(2)).unwrap();
        assert!(q.remove(id(0)));
        assert_eq!(q.front(), Some(id(1)));
        assert!(q.remove(id(2)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_front(), Some(id(1)));
    }

    #[test]
    fn wraparound_with_removal() {
        let mut q: TransferQueue<3> = TransferQueue::new();
        for round in 0..10 {
            let base = (round * 3) % 200;
            q.push(id(base)).unwrap();
            q.push(id(base + 1)).unwrap();
            assert_eq!(q.pop_front(), Some(id(base)));
            q.push(id(base + 2)).unwrap();
            assert!(q.remove(id(base + 2)));
            assert_eq!(q.pop_front(), Some(id(base + 1)));
            assert!(q.is_empty());
        }
    }

    #[test]
    fn clear_empties() {
        let mut q: TransferQueue<2> = TransferQueue::new();
        q.push(id(0)).unwrap();
        q.push(id(1)).unwrap();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.front(), None);
        assert_eq!(q.push(id(1)), Ok(true));
    }
}
