//! Priority-ordered holding area for incoming events.
//!
//! Buckets are kept per priority value with a FIFO sub-queue each, so enqueue
//! is O(1) amortized and drains never re-sort. Lower priority values are more
//! urgent. Record storage comes from the [`ObjectPool`], so an enqueue can
//! fail with [`SchedulerError::PoolExhausted`] and the caller decides whether
//! that means drop-and-count.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::object_pool::{EventRecord, ObjectPool, PoolStatus};
use crate::core::SchedulerError;
use crate::util::clock::now_ms;

/// Ordered holding area for incoming events, backed by pooled records.
pub struct PriorityEventQueue<P> {
    pool: Arc<ObjectPool<P>>,
    buckets: Mutex<BTreeMap<u8, VecDeque<EventRecord<P>>>>,
    next_id: AtomicU64,
}

impl<P> PriorityEventQueue<P> {
    /// Create a queue drawing records from `pool`.
    #[must_use]
    pub fn new(pool: Arc<ObjectPool<P>>) -> Self {
        Self {
            pool,
            buckets: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Enqueue a payload at the given priority and return the event id.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PoolExhausted`] when the pool cannot supply
    /// a record; the caller is responsible for honoring the drop policy.
    pub fn enqueue(&self, payload: P, priority: u8) -> Result<u64, SchedulerError> {
        let mut record = self.pool.acquire()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        record.id = id;
        record.payload = Some(payload);
        record.priority = priority;
        record.enqueued_at_ms = now_ms();

        let mut buckets = self.buckets.lock();
        buckets.entry(priority).or_default().push_back(record);
        Ok(id)
    }

    /// Remove up to `max_count` events in ascending priority order, FIFO
    /// within equal priority.
    ///
    /// Stops early once the accumulated drain time exceeds `time_budget`, so
    /// the scheduler stays inside its tick deadline. At least one event is
    /// always taken when the queue is non-empty, even with a zero budget.
    /// Never blocks; returns an empty batch when nothing is queued.
    pub fn drain_batch(&self, max_count: usize, time_budget: Duration) -> Vec<EventRecord<P>> {
        let started = Instant::now();
        let mut batch = Vec::new();
        let mut buckets = self.buckets.lock();

        while batch.len() < max_count {
            if !batch.is_empty() && started.elapsed() >= time_budget {
                break;
            }
            let Some(priority) = buckets.keys().next().copied() else {
                break;
            };
            let emptied = {
                let Some(bucket) = buckets.get_mut(&priority) else {
                    break;
                };
                if let Some(record) = bucket.pop_front() {
                    batch.push(record);
                }
                bucket.is_empty()
            };
            if emptied {
                buckets.remove(&priority);
            }
        }
        batch
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.lock().values().map(VecDeque::len).sum()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }

    /// Release a drained record back to the backing pool.
    pub fn release(&self, record: EventRecord<P>) {
        self.pool.release(record);
    }

    /// Occupancy of the backing pool.
    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }
}
