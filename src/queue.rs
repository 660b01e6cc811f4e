//! Bounded hand-off queue that drops the oldest item when full.
//!
//! The producer never blocks: when the consumer falls behind, stale frames
//! are discarded so memory stays bounded and the consumer always sees the
//! most recent ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flume::{Receiver, Sender, TrySendError};

/// Producer half of a drop-oldest queue.
pub struct DropOldestSender<T> {
    tx: Sender<T>,
    /// Kept to evict from the front of the queue.
    evict: Receiver<T>,
    dropped: Arc<AtomicU64>,
}

/// The consumer has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Create a queue holding at most `capacity` items.
pub fn drop_oldest<T>(capacity: usize) -> (DropOldestSender<T>, Receiver<T>) {
    let (tx, rx) = flume::bounded(capacity.max(1));
    let sender = DropOldestSender {
        tx,
        evict: rx.clone(),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

impl<T> DropOldestSender<T> {
    /// Enqueue `item`, evicting the oldest queued item if the queue is full.
    ///
    /// Returns how many items were evicted.
    pub fn send(&self, mut item: T) -> Result<u64, Disconnected> {
        // Our own eviction handle does not count as a consumer.
        if self.tx.receiver_count() <= 1 {
            return Err(Disconnected);
        }
        let mut evicted = 0;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => {
                    if evicted > 0 {
                        self.dropped.fetch_add(evicted, Ordering::Relaxed);
                    }
                    return Ok(evicted);
                },
                Err(TrySendError::Full(back)) => {
                    item = back;
                    if self.evict.try_recv().is_ok() {
                        evicted += 1;
                    }
                },
                Err(TrySendError::Disconnected(_)) => return Err(Disconnected),
            }
        }
    }

    /// Total items evicted over the queue's lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared eviction counter, for reporting from another thread.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}
