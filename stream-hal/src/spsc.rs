//! Lock-free single-producer single-consumer (SPSC) ring buffer.
//!
//! Carries completion notifications from the context that detects a finished
//! transfer (usually an interrupt handler) to the task context that wakes the
//! waiting application code. Neither side ever blocks.
//!
//! # Safety Contract
//!
//! - Only ONE context at a time may call [`push()`](SpscQueue::push) (the "producer").
//! - Only ONE context may call [`pop()`](SpscQueue::pop) (the "consumer").
//! - These may be different threads/ISR contexts running concurrently.
//!
//! A device satisfies the producer rule by only pushing while it holds its
//! exclusive region.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free single-producer single-consumer (SPSC) queue holding up to
/// `N` values.
///
/// `head` and `tail` are free-running counters; the slot index is the
/// counter modulo `N` and the fill level is `head - tail`, so every slot is
/// usable (no sentinel slot).
///
/// # Type Parameters
///
/// - `T`: The element type. Must be `Send` for cross-context safety.
/// - `N`: Capacity. Must be ≥ 1.
pub struct SpscQueue<T, const N: usize> {
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    /// Values pushed so far (only modified by the producer).
    head: AtomicUsize,
    /// Values popped so far (only modified by the consumer).
    tail: AtomicUsize,
}

// SAFETY: T: Send is required because values cross thread/ISR boundaries.
// The SPSC contract (single producer, single consumer) ensures that
// head and tail are only modified by their respective sides, and
// atomic ordering guarantees visibility of buffer writes.
unsafe impl<T: Send, const N: usize> Sync for SpscQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Send for SpscQueue<T, N> {}

impl<T, const N: usize> SpscQueue<T, N> {
    /// Create a new empty queue.
    ///
    /// # Panics
    ///
    /// `N` must be at least 1.
    pub const fn new() -> Self {
        assert!(N >= 1, "SPSC queue must have at least 1 slot");

        SpscQueue {
            // SAFETY: An array of uninitialized MaybeUninit<T> is always valid.
            // UnsafeCell is a transparent wrapper that doesn't affect validity.
            buffer: unsafe {
                MaybeUninit::<[UnsafeCell<MaybeUninit<T>>; N]>::uninit().assume_init()
            },
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Push a value into the queue (producer side).
    ///
    /// Returns `Err(val)` if the queue is full, returning ownership to the caller.
    pub fn push(&self, val: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);

        if head.wrapping_sub(self.tail.load(Ordering::Acquire)) == N {
            return Err(val);
        }

        // SAFETY: We are the sole producer and `head` is only advanced by us.
        // Fewer than N values are in flight, so this slot is not occupied.
        unsafe {
            (*self.buffer[head % N].get()).write(val);
        }

        // Release ordering ensures the buffer write is visible before head advances.
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pop a value from the queue (consumer side).
    ///
    /// Returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);

        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: We are the sole consumer and `tail` is only advanced by us.
        // `tail != head` guarantees this slot contains a valid value.
        let val = unsafe { (*self.buffer[tail % N].get()).assume_init_read() };

        // Release ordering ensures the read completes before tail advances,
        // freeing the slot for the producer.
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(val)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Number of values currently queued.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for SpscQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SpscQueue<T, N> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop() {
        let q: SpscQueue<i32, 3> = SpscQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.capacity(), 3);

        q.push(10).unwrap();
        q.push(20).unwrap();
        q.push(30).unwrap();
        assert_eq!(q.len(), 3);
        assert!(q.is_full());

        // Every slot is usable; the fourth push fails
        assert_eq!(q.push(40), Err(40));

        assert_eq!(q.pop(), Some(10));
        assert_eq!(q.pop(), Some(20));
        assert_eq!(q.pop(), Some(30));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn single_slot_queue() {
        let q: SpscQueue<u8, 1> = SpscQueue::new();
        q.push(42).unwrap();
        assert!(q.is_full());
        assert_eq!(q.push(99), Err(99));
        assert_eq!(q.pop(), Some(42));
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn wraparound() {
        let q: SpscQueue<i32, 2> = SpscQueue::new();

        for round in 0..10 {
            let base = round * 100;
            q.push(base + 1).unwrap();
            q.push(base + 2).unwrap();
            assert!(q.is_full());

            assert_eq!(q.pop(), Some(base + 1));
            assert_eq!(q.pop(), Some(base + 2));
            assert!(q.is_empty());
        }
    }

    #[test]
    fn interleaved_push_pop() {
        let q: SpscQueue<i32, 3> = SpscQueue::new();

        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.pop(), Some(1));

        q.push(3).unwrap();
        q.push(4).unwrap();
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(4));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn cross_thread_order() {
        use std::sync::Arc;

        let q: Arc<SpscQueue<u32, 4>> = Arc::new(SpscQueue::new());
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                for i in 0..1000u32 {
                    let mut v = i;
                    while let Err(back) = q.push(v) {
                        v = back;
                        std::thread::yield_now();
                    }
                }
            })
        };

        let mut expected = 0;
        while expected < 1000 {
            if let Some(v) = q.pop() {
                assert_eq!(v, expected);
                expected += 1;
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert!(q.is_empty());
    }

    #[test]
    fn drop_cleans_up_remaining() {
        use core::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug)]
        struct Trackable;
        impl Drop for Trackable {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::Relaxed);
            }
        }

        DROP_COUNT.store(0, Ordering::Relaxed);
        {
            let q: SpscQueue<Trackable, 4> = SpscQueue::new();
            q.push(Trackable).unwrap();
            q.push(Trackable).unwrap();
        }
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 2);
    }
}
