//! Reusable slot allocator for transient event records.
//!
//! Enqueuing an event at high frequency must not allocate a fresh record per
//! event. The pool hands out recycled [`EventRecord`]s and takes them back
//! when the batch that owns them resolves. The free list is protected by a
//! `parking_lot::Mutex` so producers can run concurrently with the scheduler.

use parking_lot::Mutex;
use tracing::debug;

use crate::config::ExhaustionPolicy;
use crate::core::SchedulerError;

/// A reusable event record ("percept").
///
/// Owned exclusively by the queue until dispatched; ownership transfers to
/// the in-flight batch during processing; returned to the pool afterwards.
/// A record's slot is never referenced by more than one owner at a time.
#[derive(Debug)]
pub struct EventRecord<P> {
    slot: usize,
    /// Monotonically increasing event id, assigned at enqueue.
    pub id: u64,
    /// Caller payload. `None` while the record is parked in the free list.
    pub payload: Option<P>,
    /// Priority; lower values are more urgent.
    pub priority: u8,
    /// Enqueue timestamp in milliseconds since the Unix epoch.
    pub enqueued_at_ms: u128,
}

impl<P> EventRecord<P> {
    fn parked(slot: usize) -> Self {
        Self {
            slot,
            id: 0,
            payload: None,
            priority: 0,
            enqueued_at_ms: 0,
        }
    }

    /// Index of the pool slot backing this record.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Clear all payload fields before the record re-enters the free list.
    fn reset(&mut self) {
        self.id = 0;
        self.payload = None;
        self.priority = 0;
        self.enqueued_at_ms = 0;
    }
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Slots allocated so far (never exceeds the configured maximum).
    pub total: usize,
    /// Slots currently parked in the free list.
    pub free: usize,
    /// Slots currently handed out.
    pub in_use: usize,
}

struct PoolState<P> {
    /// Recycled records ready to be handed out (LIFO for cache warmth).
    free: Vec<EventRecord<P>>,
    /// Per-slot ownership flag, indexed by slot. Makes `release` idempotent.
    handed_out: Vec<bool>,
}

/// Bounded pool of reusable [`EventRecord`]s.
///
/// Exhaustion behavior is a configurable [`ExhaustionPolicy`]: grow by a
/// fixed increment up to `max_size` (the default), or reject so the caller
/// can drop the incoming event and count it.
pub struct ObjectPool<P> {
    max_size: usize,
    policy: ExhaustionPolicy,
    state: Mutex<PoolState<P>>,
}

impl<P> ObjectPool<P> {
    /// Create a pool with `initial_size` pre-allocated slots.
    ///
    /// Sizing is validated by [`crate::config::SchedulerConfig::validate`];
    /// an `initial_size` above `max_size` is clamped here as a last resort.
    #[must_use]
    pub fn new(initial_size: usize, max_size: usize, policy: ExhaustionPolicy) -> Self {
        let initial = initial_size.min(max_size);
        let free = (0..initial).map(EventRecord::parked).collect();
        Self {
            max_size,
            policy,
            state: Mutex::new(PoolState {
                free,
                handed_out: vec![false; initial],
            }),
        }
    }

    /// Hand out a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PoolExhausted`] when no slot is free and the
    /// policy forbids growth (or the pool is already at `max_size`).
    pub fn acquire(&self) -> Result<EventRecord<P>, SchedulerError> {
        let mut state = self.state.lock();

        if state.free.is_empty() {
            match self.policy {
                ExhaustionPolicy::Grow { increment } => {
                    let total = state.handed_out.len();
                    if total >= self.max_size {
                        return Err(SchedulerError::PoolExhausted);
                    }
                    let grow_by = increment.min(self.max_size - total).max(1);
                    for slot in total..total + grow_by {
                        state.free.push(EventRecord::parked(slot));
                        state.handed_out.push(false);
                    }
                    debug!(grow_by, total = total + grow_by, "object pool grown");
                }
                ExhaustionPolicy::Reject => return Err(SchedulerError::PoolExhausted),
            }
        }

        match state.free.pop() {
            Some(record) => {
                state.handed_out[record.slot] = true;
                Ok(record)
            }
            None => Err(SchedulerError::PoolExhausted),
        }
    }

    /// Return a record to the free list, resetting its payload fields.
    ///
    /// Releasing a record whose slot is not currently handed out is a no-op;
    /// error paths may release the same batch twice without harm.
    pub fn release(&self, mut record: EventRecord<P>) {
        let mut state = self.state.lock();
        if !state.handed_out.get(record.slot).copied().unwrap_or(false) {
            debug!(slot = record.slot, "ignoring release of idle slot");
            return;
        }
        record.reset();
        state.handed_out[record.slot] = false;
        state.free.push(record);
    }

    /// Current occupancy.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        let total = state.handed_out.len();
        let free = state.free.len();
        PoolStatus {
            total,
            free,
            in_use: total - free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject_pool(size: usize) -> ObjectPool<String> {
        ObjectPool::new(size, size, ExhaustionPolicy::Reject)
    }

    #[test]
    fn test_acquire_release_cycle() {
        let pool = reject_pool(2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a.slot(), b.slot());
        assert_eq!(pool.status().in_use, 2);

        pool.release(a);
        let status = pool.status();
        assert_eq!(status.total, 2);
        assert_eq!(status.free, 1);
        assert_eq!(status.in_use, 1);
    }

    #[test]
    fn test_reuse_prefers_released_slot() {
        let pool = reject_pool(2);
        let first = pool.acquire().unwrap();
        let first_slot = first.slot();
        let _second = pool.acquire().unwrap();

        pool.release(first);
        let again = pool.acquire().unwrap();
        assert_eq!(again.slot(), first_slot);
        assert_eq!(pool.status().total, 2);
    }

    #[test]
    fn test_reject_policy_exhaustion() {
        let pool = reject_pool(2);
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert_eq!(pool.acquire().unwrap_err(), SchedulerError::PoolExhausted);
    }

    #[test]
    fn test_grow_policy_bounded_by_max() {
        let pool: ObjectPool<u32> =
            ObjectPool::new(1, 3, ExhaustionPolicy::Grow { increment: 4 });
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        let _c = pool.acquire().unwrap();
        assert_eq!(pool.status().total, 3);
        assert_eq!(pool.acquire().unwrap_err(), SchedulerError::PoolExhausted);
    }

    #[test]
    fn test_release_resets_fields() {
        let pool = reject_pool(1);
        let mut record = pool.acquire().unwrap();
        record.id = 42;
        record.payload = Some("data".to_string());
        record.priority = 7;
        record.enqueued_at_ms = 123;
        pool.release(record);

        let recycled = pool.acquire().unwrap();
        assert_eq!(recycled.id, 0);
        assert!(recycled.payload.is_none());
        assert_eq!(recycled.priority, 0);
        assert_eq!(recycled.enqueued_at_ms, 0);
    }

    #[test]
    fn test_double_release_is_noop() {
        let pool = reject_pool(2);
        let record = pool.acquire().unwrap();
        pool.release(record);
        // Build a stale record pointing at the already-freed slot.
        let stale = EventRecord::<String>::parked(0);
        pool.release(stale);
        let status = pool.status();
        assert_eq!(status.total, 2);
        assert_eq!(status.free, 2);
    }

    #[test]
    fn test_concurrent_acquire_exclusivity() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let pool = Arc::new(reject_pool(64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                let mut slots = Vec::new();
                for _ in 0..8 {
                    slots.push(pool.acquire().unwrap().slot());
                }
                slots
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for slot in handle.join().unwrap() {
                assert!(seen.insert(slot), "slot {slot} handed out twice");
            }
        }
        assert_eq!(seen.len(), 64);
    }
}
