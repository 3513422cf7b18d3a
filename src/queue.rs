use crate::cost::CostAssigner;
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe FIFO queue whose admission is bounded by the summed cost of
/// its items rather than by their number.
///
/// Every item is stored together with the cost computed at enqueue time and
/// the same value is subtracted when it leaves, so `cost()` always equals the
/// sum of the stored costs once in-flight operations complete.
///
/// `len()` and `cost()` read mirrored atomics and never take the lock.
pub struct CostBoundedQueue<T> {
    items: Mutex<VecDeque<(T, u64)>>,
    cost_assigner: Arc<dyn CostAssigner<T>>,
    capacity: AtomicU64,
    cost: AtomicU64,
    len: AtomicUsize,
}

impl<T> CostBoundedQueue<T> {
    /// Create an empty queue.
    ///
    /// **Parameters**
    /// - `capacity`: maximum summed cost; must be at least 1.
    /// - `cost_assigner`: computes the cost of each item on enqueue.
    pub fn new(
        capacity: u64,
        cost_assigner: Arc<dyn CostAssigner<T>>,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            items: Mutex::new(VecDeque::new()),
            cost_assigner,
            capacity: AtomicU64::new(capacity),
            cost: AtomicU64::new(0),
            len: AtomicUsize::new(0),
        })
    }

    /// Insert `item` if that can be done without exceeding capacity.
    ///
    /// The capacity check and the reservation happen under one lock, so two
    /// producers can never both observe the same slack. On rejection the item
    /// is handed back untouched and the queue is not modified.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let item_cost = self.cost_assigner.cost(&item);
        let mut items = self.items.lock();
        let current = self.cost.load(Ordering::Acquire);
        let fits = current
            .checked_add(item_cost)
            .map_or(false, |total| total <= self.capacity());
        if !fits {
            return Err(item);
        }
        items.push_back((item, item_cost));
        self.cost.store(current + item_cost, Ordering::Release);
        self.len.store(items.len(), Ordering::Release);
        Ok(())
    }

    /// Remove and return the oldest item, or `None` when empty. Never blocks
    /// beyond the short critical section.
    pub fn dequeue(&self) -> Option<T> {
        let mut items = self.items.lock();
        let (item, item_cost) = items.pop_front()?;
        self.cost.fetch_sub(item_cost, Ordering::AcqRel);
        self.len.store(items.len(), Ordering::Release);
        Some(item)
    }

    /// Move every item currently queued into `sink`, oldest first, and
    /// return how many were moved.
    ///
    /// Items enqueued concurrently either land in this drain or stay queued
    /// for the next one; none are lost or counted twice.
    pub fn drain_to<E: Extend<T>>(&self, sink: &mut E) -> usize {
        let drained = {
            let mut items = self.items.lock();
            let drained = std::mem::take(&mut *items);
            let drained_cost: u64 = drained.iter().map(|(_, c)| c).sum();
            self.cost.fetch_sub(drained_cost, Ordering::AcqRel);
            self.len.store(0, Ordering::Release);
            drained
        };
        let count = drained.len();
        sink.extend(drained.into_iter().map(|(item, _)| item));
        count
    }

    /// Cost that `item` would be charged if enqueued now.
    pub fn cost_of(&self, item: &T) -> u64 {
        self.cost_assigner.cost(item)
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summed cost of all queued items.
    pub fn cost(&self) -> u64 {
        self.cost.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Acquire)
    }

    /// Change the capacity used by future admission decisions. Items already
    /// queued are never evicted by a resize.
    pub fn set_capacity(&self, capacity: u64) -> Result<(), ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.capacity.store(capacity, Ordering::Release);
        Ok(())
    }
}
