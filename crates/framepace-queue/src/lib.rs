//! Non-blocking synchronized FIFO.
//!
//! This crate provides the handoff structure used between a real-time
//! producer and a background consumer. Every operation takes a short,
//! exclusive lock and returns immediately: there is no wait/notify, so a
//! consumer polls with [`SynchronizedQueue::pop`].

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Point-in-time counters for a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items pushed since the queue was created.
    pub pushed: u64,

    /// Items popped since the queue was created.
    pub popped: u64,

    /// Items currently queued.
    pub len: usize,
}

struct Inner<T> {
    items: VecDeque<T>,
    pushed: u64,
    popped: u64,
}

/// Thread-safe, unbounded FIFO with non-blocking pop.
///
/// Not `Clone`: moving the queue moves the queued items with it.
pub struct SynchronizedQueue<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> SynchronizedQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                pushed: 0,
                popped: 0,
            }),
        }
    }

    /// Append an item to the tail.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock();
        inner.items.push_back(item);
        inner.pushed += 1;
    }

    /// Remove and return the head, or `None` if nothing is queued.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        if item.is_some() {
            inner.popped += 1;
        }
        item
    }

    /// Number of queued items.
    ///
    /// This is a snapshot: another thread may push or pop before the caller
    /// acts on it, so drain loops must still tolerate `pop` returning `None`.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue was empty at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Pop every queued item, handing each to `discard`. Returns the count.
    ///
    /// Items are popped one at a time, so a concurrent consumer may still
    /// win some of them.
    pub fn drain_with<F>(&self, mut discard: F) -> usize
    where
        F: FnMut(T),
    {
        let mut count = 0;
        while let Some(item) = self.pop() {
            discard(item);
            count += 1;
        }
        count
    }

    /// Snapshot of the push/pop counters and current length.
    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            pushed: inner.pushed,
            popped: inner.popped,
            len: inner.items.len(),
        }
    }
}

impl<T> Default for SynchronizedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SynchronizedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("SynchronizedQueue")
            .field("len", &stats.len)
            .field("pushed", &stats.pushed)
            .field("popped", &stats.popped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_pop_empty_returns_none() {
        let queue: SynchronizedQueue<u32> = SynchronizedQueue::new();
        assert!(queue.pop().is_none());
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = SynchronizedQueue::new();
        for i in 0..10 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 10);

        let popped: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(popped, (0..10).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_stats_balance() {
        let queue = SynchronizedQueue::new();
        queue.push("a");
        queue.push("b");
        queue.push("c");
        queue.pop();

        let stats = queue.stats();
        assert_eq!(stats.pushed, 3);
        assert_eq!(stats.popped, 1);
        assert_eq!(stats.len, 2);
        assert_eq!(stats.pushed - stats.popped, stats.len as u64);

        // Popping an empty queue does not count.
        queue.pop();
        queue.pop();
        queue.pop();
        let stats = queue.stats();
        assert_eq!(stats.popped, 3);
        assert_eq!(stats.len, 0);
    }

    #[test]
    fn test_drain_with_counts_items() {
        let queue = SynchronizedQueue::new();
        for i in 0..5 {
            queue.push(vec![i as u8; 4]);
        }

        let mut released = 0;
        let drained = queue.drain_with(|buf| {
            assert_eq!(buf.len(), 4);
            released += 1;
        });

        assert_eq!(drained, 5);
        assert_eq!(released, 5);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_move_transfers_items() {
        let queue = SynchronizedQueue::new();
        queue.push(1);
        queue.push(2);

        let moved = queue;
        assert_eq!(moved.pop(), Some(1));
        assert_eq!(moved.pop(), Some(2));
    }

    #[test]
    fn test_concurrent_producer_consumer_preserves_order() {
        const COUNT: u64 = 10_000;

        let queue = Arc::new(SynchronizedQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..COUNT {
                    queue.push(i);
                }
            })
        };

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut received = Vec::with_capacity(COUNT as usize);
                while received.len() < COUNT as usize {
                    match queue.pop() {
                        Some(value) => received.push(value),
                        None => thread::yield_now(),
                    }
                }
                received
            })
        };

        producer.join().unwrap();
        let received = consumer.join().unwrap();

        assert_eq!(received, (0..COUNT).collect::<Vec<_>>());
        let stats = queue.stats();
        assert_eq!(stats.pushed, COUNT);
        assert_eq!(stats.popped, COUNT);
        assert_eq!(stats.len, 0);
    }

    #[test]
    fn test_concurrent_poppers_never_duplicate() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 2_000;

        let queue = Arc::new(SynchronizedQueue::new());

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push((p, i));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let poppers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || std::iter::from_fn(|| queue.pop()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = Vec::new();
        for handle in poppers {
            let popped = handle.join().unwrap();
            // Each popper sees every producer's items in push order.
            for p in 0..PRODUCERS {
                let seq: Vec<_> = popped.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
                assert!(seq.windows(2).all(|w| w[0] < w[1]));
            }
            all.extend(popped);
        }

        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len() as u64, PRODUCERS * PER_PRODUCER);
        assert!(queue.is_empty());
    }
}
