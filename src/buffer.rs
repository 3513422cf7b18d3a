use crate::cost::CostAssigner;
use crate::error::ConfigError;
use crate::log::{self, SharedLog};
use crate::queue::CostBoundedQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Level;

/// An always-accepting buffer that makes room for new items by discarding
/// old ones instead of rejecting producers.
///
/// The flushing task only depends on this trait, so alternative eviction
/// policies can be plugged in without touching the flush path.
pub trait EvictingBuffer<T>: Send + Sync {
    /// Add `item`, evicting older items if needed.
    ///
    /// **Returns**
    /// - `true` if the item is now buffered.
    /// - `false` if the item can never fit (its own cost exceeds capacity).
    fn add(&self, item: T) -> bool;

    /// Move every buffered item into `sink`, oldest first.
    fn drain_to(&self, sink: &mut Vec<T>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> u64;

    /// Resize the buffer. Only future admission decisions are affected.
    fn set_capacity(&self, capacity: u64) -> Result<(), ConfigError>;
}

/// [`EvictingBuffer`] that evicts the oldest items first.
pub struct FifoEvictionBuffer<T> {
    queue: CostBoundedQueue<T>,
    add_lock: Mutex<()>,
    log: SharedLog,
    /// Items discarded to make room for newer ones.
    evicted: AtomicU64,
    /// Items refused because they could never fit.
    rejected: AtomicU64,
}

impl<T> FifoEvictionBuffer<T> {
    pub fn new(
        capacity: u64,
        cost_assigner: Arc<dyn CostAssigner<T>>,
    ) -> Result<Self, ConfigError> {
        Self::with_log(capacity, cost_assigner, log::noop())
    }

    pub fn with_log(
        capacity: u64,
        cost_assigner: Arc<dyn CostAssigner<T>>,
        log: SharedLog,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            queue: CostBoundedQueue::new(capacity, cost_assigner)?,
            add_lock: Mutex::new(()),
            log,
            evicted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// Summed cost of the buffered items.
    pub fn cost(&self) -> u64 {
        self.queue.cost()
    }

    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Evict oldest items until an item of `cost` fits.
    ///
    /// Returns the number of evicted items, or `None` when `cost` exceeds
    /// the whole capacity.
    fn make_room(&self, cost: u64) -> Option<usize> {
        let capacity = self.queue.capacity();
        if cost > capacity {
            return None;
        }
        let target = capacity - cost;
        let mut evicted = 0;
        while self.queue.cost() > target {
            if self.queue.dequeue().is_none() {
                break;
            }
            evicted += 1;
        }
        Some(evicted)
    }
}

impl<T: Send> EvictingBuffer<T> for FifoEvictionBuffer<T> {
    fn add(&self, item: T) -> bool {
        // Serializes evict-then-enqueue so that concurrent producers cannot
        // claim each other's freed space.
        let _guard = self.add_lock.lock();

        let item = match self.queue.enqueue(item) {
            Ok(()) => return true,
            Err(item) => item,
        };

        let cost = self.queue.cost_of(&item);
        let Some(evicted) = self.make_room(cost) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            if self.log.is_enabled(Level::WARN) {
                self.log.warn(&format!(
                    "Dropping message of cost {} larger than buffer capacity {}",
                    cost,
                    self.queue.capacity()
                ));
            }
            return false;
        };

        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            if self.log.is_enabled(Level::WARN) {
                self.log.warn(&format!("Evicted {} messages from buffer", evicted));
            }
        }

        match self.queue.enqueue(item) {
            Ok(()) => true,
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    fn drain_to(&self, sink: &mut Vec<T>) -> usize {
        self.queue.drain_to(sink)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn capacity(&self) -> u64 {
        self.queue.capacity()
    }

    fn set_capacity(&self, capacity: u64) -> Result<(), ConfigError> {
        self.queue.set_capacity(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::StringLengthCostAssigner;
    use crate::log::testing::CapturingLog;
    use std::thread;

    fn string_buffer(capacity: u64) -> FifoEvictionBuffer<String> {
        FifoEvictionBuffer::new(capacity, Arc::new(StringLengthCostAssigner)).unwrap()
    }

    fn drain(buffer: &FifoEvictionBuffer<String>) -> Vec<String> {
        let mut out = Vec::new();
        buffer.drain_to(&mut out);
        out
    }

    #[test]
    fn keeps_fifo_order_without_eviction() {
        let buffer = string_buffer(1_000);
        for msg in ["msg1", "msg2", "msg3"] {
            assert!(buffer.add(msg.to_string()));
        }
        assert_eq!(drain(&buffer), vec!["msg1", "msg2", "msg3"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn evicts_oldest_when_full() {
        let log = Arc::new(CapturingLog::default());
        let buffer =
            FifoEvictionBuffer::with_log(12, Arc::new(StringLengthCostAssigner), log.clone())
                .unwrap();

        for msg in ["msg1", "msg2", "msg3", "msg4"] {
            assert!(buffer.add(msg.to_string()));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.cost(), 12);
        assert_eq!(buffer.evicted_count(), 1);
        assert_eq!(
            log.messages_at(Level::WARN),
            vec!["Evicted 1 messages from buffer"]
        );
        assert_eq!(drain(&buffer), vec!["msg2", "msg3", "msg4"]);
    }

    #[test]
    fn unit_cost_items_keep_the_most_recent() {
        let buffer: FifoEvictionBuffer<u32> =
            FifoEvictionBuffer::new(5, Arc::new(|_: &u32| 1u64)).unwrap();
        for i in 0..12 {
            assert!(buffer.add(i));
        }
        assert_eq!(buffer.len(), 5);
        let mut out = Vec::new();
        buffer.drain_to(&mut out);
        assert_eq!(out, vec![7, 8, 9, 10, 11]);
        assert_eq!(buffer.evicted_count(), 7);
    }

    #[test]
    fn evicts_several_small_items_for_one_large() {
        let buffer = string_buffer(10);
        for msg in ["a", "b", "c", "d", "e", "f"] {
            buffer.add(msg.to_string());
        }
        assert!(buffer.add("123456789".to_string()));
        assert_eq!(drain(&buffer), vec!["f", "123456789"]);
        assert_eq!(buffer.evicted_count(), 5);
    }

    #[test]
    fn oversized_item_is_never_admitted() {
        let log = Arc::new(CapturingLog::default());
        let buffer =
            FifoEvictionBuffer::with_log(4, Arc::new(StringLengthCostAssigner), log.clone())
                .unwrap();
        assert!(buffer.add("ab".to_string()));

        assert!(!buffer.add("too long".to_string()));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.cost(), 2);
        assert_eq!(buffer.rejected_count(), 1);
        assert_eq!(buffer.evicted_count(), 0);
        assert_eq!(log.messages_at(Level::WARN).len(), 1);

        // even an empty buffer refuses it
        drain(&buffer);
        assert!(!buffer.add("too long".to_string()));
        assert!(buffer.is_empty());
    }

    #[test]
    fn resize_applies_to_later_adds() {
        let buffer = string_buffer(100);
        for msg in ["msg1", "msg2", "msg3"] {
            buffer.add(msg.to_string());
        }
        buffer.set_capacity(8).unwrap();
        assert_eq!(buffer.len(), 3);

        assert!(buffer.add("msg4".to_string()));
        assert_eq!(drain(&buffer), vec!["msg3", "msg4"]);
        assert!(buffer.set_capacity(0).is_err());
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn concurrent_producers_stay_within_capacity() {
        let buffer = Arc::new(string_buffer(1_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..2_000 {
                        assert!(buffer.add(format!("t{t}-{i:04}|")));
                        assert!(buffer.cost() <= 1_000);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let cost = buffer.cost();
        let items = drain(&buffer);
        assert!(cost <= 1_000);
        assert_eq!(cost, items.iter().map(|s| s.len() as u64).sum::<u64>());
        assert_eq!(buffer.cost(), 0);
    }
}
