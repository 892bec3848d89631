//! Core scheduling components: pooled event records, the priority queue, the
//! background worker pool, the memoization cache, performance monitoring, and
//! the scheduler that ties them together.

pub mod compute;
pub mod error;
pub mod event_queue;
pub mod memo_cache;
pub mod monitor;
pub mod object_pool;
pub mod scheduler;
pub mod worker_pool;

pub use compute::{BatchCompute, EventPayload};
pub use error::{AppResult, SchedulerError};
pub use event_queue::PriorityEventQueue;
pub use memo_cache::{memoize, MemoizationCache};
pub use monitor::{duration_ms, MetricsSnapshot, PerformanceMonitor, TimerStats};
pub use object_pool::{EventRecord, ObjectPool, PoolStatus};
pub use scheduler::{BatchFailure, BatchOutcome, Scheduler, SchedulerState};
pub use worker_pool::{BackgroundWorkerPool, TaskTicket, WorkerPoolStats};
