//! Cooperative scheduler: drains the queue within a time budget, dispatches
//! batches to the worker pool, releases pooled records on completion, and
//! drives the performance monitor.
//!
//! The scheduler is a cooperative time-sliced loop, not a thread per event.
//! At most one batch is in flight at a time: a tick that lands while a batch
//! is processing is skipped and counted, so overload shows up as queue growth
//! instead of unbounded concurrent dispatch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::compute::{BatchCompute, EventPayload};
use crate::core::event_queue::PriorityEventQueue;
use crate::core::memo_cache::MemoizationCache;
use crate::core::monitor::{duration_ms, MetricsSnapshot, PerformanceMonitor};
use crate::core::object_pool::{EventRecord, ObjectPool, PoolStatus};
use crate::core::worker_pool::{BackgroundWorkerPool, WorkerPoolStats};
use crate::core::SchedulerError;
use crate::runtime::Spawn;

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Ready to drain a batch on the next tick.
    Idle,
    /// One batch is being processed; ticks are skipped until it resolves.
    BatchInFlight,
    /// Terminal; reached only via [`Scheduler::shutdown`].
    Shutdown,
}

/// A successfully resolved batch, delivered to `on_result` subscribers.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    /// Scheduler-assigned batch id.
    pub batch_id: u64,
    /// Ids of the events that made up the batch, in drain order.
    pub event_ids: Vec<u64>,
    /// The computation's result.
    pub result: R,
    /// Whether the result was served from the memoization cache.
    pub cached: bool,
}

/// A failed batch, delivered to `on_error` subscribers.
#[derive(Debug)]
pub struct BatchFailure {
    /// Scheduler-assigned batch id.
    pub batch_id: u64,
    /// Ids of the events that made up the batch, in drain order.
    pub event_ids: Vec<u64>,
    /// Why the batch failed.
    pub error: SchedulerError,
}

/// Callback invoked with each successful batch outcome.
pub type ResultCallback<R> = Box<dyn Fn(&BatchOutcome<R>) + Send + Sync>;
/// Callback invoked with each failed batch.
pub type ErrorCallback = Box<dyn Fn(&BatchFailure) + Send + Sync>;

/// State shared between the scheduler and spawned completion tasks.
struct Shared<P, R> {
    queue: Arc<PriorityEventQueue<P>>,
    cache: Arc<MemoizationCache<R>>,
    monitor: Arc<PerformanceMonitor>,
    state: Mutex<SchedulerState>,
    on_result: Mutex<Vec<ResultCallback<R>>>,
    on_error: Mutex<Vec<ErrorCallback>>,
}

/// Cooperative control loop over the queue, pool, workers, cache, and
/// monitor.
///
/// Explicitly constructed and owned; collaborators are injected at build
/// time and torn down by [`Scheduler::shutdown`]. There is no module-level
/// singleton.
pub struct Scheduler<P, R, E, S>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
    S: Spawn + Send + Sync + 'static,
{
    config: SchedulerConfig,
    shared: Arc<Shared<P, R>>,
    workers: Arc<BackgroundWorkerPool<P, R, E>>,
    spawner: S,
    shutdown: Arc<AtomicBool>,
    batch_counter: AtomicU64,
}

impl<P, R, E, S> Scheduler<P, R, E, S>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
    S: Spawn + Send + Sync + 'static,
{
    /// Construct a scheduler from a validated configuration, the registered
    /// computation, and a spawner for the cadence loop and completions.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Configuration`] for invalid settings; this
    /// is the only error allowed to halt startup.
    pub fn new(config: SchedulerConfig, compute: E, spawner: S) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::Configuration)?;

        let pool = Arc::new(ObjectPool::new(
            config.pool_initial_size,
            config.pool_max_size,
            config.exhaustion_policy,
        ));
        let queue = Arc::new(PriorityEventQueue::new(pool));
        let workers = Arc::new(BackgroundWorkerPool::new(
            config.worker_count,
            config.worker_queue_depth,
            config.task_timeout_ms.map(Duration::from_millis),
            config.recovery,
            compute,
        )?);
        let cache = Arc::new(MemoizationCache::new(config.cache_capacity));

        info!(
            max_batch_size = config.max_batch_size,
            tick_interval_ms = config.tick_interval_ms,
            worker_count = config.worker_count,
            cache_capacity = config.cache_capacity,
            "scheduler initialized"
        );

        Ok(Self {
            config,
            shared: Arc::new(Shared {
                queue,
                cache,
                monitor: Arc::new(PerformanceMonitor::new()),
                state: Mutex::new(SchedulerState::Idle),
                on_result: Mutex::new(Vec::new()),
                on_error: Mutex::new(Vec::new()),
            }),
            workers,
            spawner,
            shutdown: Arc::new(AtomicBool::new(false)),
            batch_counter: AtomicU64::new(0),
        })
    }

    /// Submit one event (fire-and-forget).
    ///
    /// Under the reject exhaustion policy a full pool drops the event: the
    /// `events_dropped` counter is incremented and `Ok` is returned, since
    /// dropping is the configured behavior rather than a caller error.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ShutdownInProgress`] once shutdown has
    /// begun.
    pub fn submit_event(&self, payload: P, priority: u8) -> Result<(), SchedulerError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutdownInProgress);
        }
        match self.shared.queue.enqueue(payload, priority) {
            Ok(id) => {
                // A producer can race shutdown(): its drain may already be
                // done, so sweep again or the record's slot leaks.
                if self.shutdown.load(Ordering::Acquire) {
                    self.discard_queue();
                    return Err(SchedulerError::ShutdownInProgress);
                }
                self.shared.monitor.increment("events_submitted");
                debug!(event_id = id, priority, "event enqueued");
                Ok(())
            }
            Err(SchedulerError::PoolExhausted) => {
                self.shared.monitor.increment("events_dropped");
                warn!(priority, "event dropped, object pool exhausted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Subscribe to successful batch outcomes.
    pub fn on_result<F>(&self, callback: F)
    where
        F: Fn(&BatchOutcome<R>) + Send + Sync + 'static,
    {
        self.shared.on_result.lock().push(Box::new(callback));
    }

    /// Subscribe to failed batches.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&BatchFailure) + Send + Sync + 'static,
    {
        self.shared.on_error.lock().push(Box::new(callback));
    }

    /// Run one cooperative scheduling step.
    ///
    /// Drains and dispatches a batch when idle; skips (and counts the skip)
    /// while a batch is in flight; does nothing after shutdown.
    pub fn tick(&self) {
        let batch = {
            let mut state = self.shared.state.lock();
            match *state {
                SchedulerState::Shutdown => return,
                SchedulerState::BatchInFlight => {
                    self.shared.monitor.increment("ticks_skipped");
                    return;
                }
                SchedulerState::Idle => {}
            }
            let batch = self.shared.queue.drain_batch(
                self.config.max_batch_size,
                Duration::from_millis(self.config.tick_budget_ms),
            );
            if batch.is_empty() {
                self.shared.monitor.increment("ticks_idle");
                return;
            }
            *state = SchedulerState::BatchInFlight;
            batch
        };

        self.shared.monitor.increment("ticks_dispatched");
        self.dispatch(batch);
    }

    /// Start the cadence loop: one [`Scheduler::tick`] every
    /// `tick_interval_ms` until shutdown.
    pub fn start(self: &Arc<Self>) {
        let me = Arc::clone(self);
        let period = Duration::from_millis(self.config.tick_interval_ms);
        self.spawner.spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if me.shutdown.load(Ordering::Acquire) {
                    break;
                }
                me.tick();
            }
            debug!("cadence loop stopped");
        });
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }

    /// Number of events waiting in the queue.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.shared.queue.len()
    }

    /// Worker pool statistics.
    #[must_use]
    pub fn worker_stats(&self) -> WorkerPoolStats {
        self.workers.stats()
    }

    /// Occupancy of the event record pool.
    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.shared.queue.pool_status()
    }

    /// Point-in-time copy of all metrics, with queue, pool, worker, and
    /// cache figures folded in.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snap = self.shared.monitor.snapshot();
        let pool = self.shared.queue.pool_status();
        let workers = self.workers.stats();

        snap.gauges
            .insert("queue_depth".into(), self.shared.queue.len() as f64);
        snap.gauges.insert("pool_total".into(), pool.total as f64);
        snap.gauges.insert("pool_free".into(), pool.free as f64);
        snap.gauges.insert("pool_in_use".into(), pool.in_use as f64);
        snap.gauges
            .insert("workers_alive".into(), workers.alive_workers as f64);
        snap.gauges
            .insert("worker_queue_depth".into(), workers.queued_tasks as f64);
        snap.counters
            .insert("tasks_submitted".into(), workers.submitted_tasks);
        snap.counters
            .insert("tasks_completed".into(), workers.completed_tasks);
        snap.counters
            .insert("tasks_failed".into(), workers.failed_tasks);
        snap.counters
            .insert("tasks_timed_out".into(), workers.timed_out_tasks);
        snap.counters
            .insert("cache_hits".into(), self.shared.cache.hits());
        snap.counters
            .insert("cache_misses".into(), self.shared.cache.misses());
        snap
    }

    /// Shut down from any state. Idempotent.
    ///
    /// Stops the cadence, shuts the worker pool down, then drains the queue
    /// releasing every pooled record without dispatching further work.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("scheduler shutting down");

        self.workers.shutdown();
        self.discard_queue();

        *self.shared.state.lock() = SchedulerState::Shutdown;
        info!("scheduler shut down");
    }

    /// Drain the queue without dispatching, releasing every record and
    /// counting the discards. Only called once the shutdown flag is set.
    fn discard_queue(&self) {
        let budget = Duration::from_millis(self.config.tick_budget_ms);
        loop {
            let leftover = self
                .shared
                .queue
                .drain_batch(self.config.max_batch_size, budget);
            if leftover.is_empty() {
                break;
            }
            self.shared
                .monitor
                .add("events_discarded_at_shutdown", leftover.len() as u64);
            for record in leftover {
                self.shared.queue.release(record);
            }
        }
    }

    /// Hand a drained batch to the cache or the worker pool.
    fn dispatch(&self, mut records: Vec<EventRecord<P>>) {
        let batch_id = self.batch_counter.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let payloads: Vec<P> = records.iter_mut().filter_map(|r| r.payload.take()).collect();
        let key = MemoizationCache::<R>::key_for(&payloads);

        if let Some(cached) = key.as_deref().and_then(|k| self.shared.cache.lookup(k)) {
            debug!(batch_id, "serving batch from memoization cache");
            Self::complete(&self.shared, batch_id, started, records, Ok(cached), true);
            return;
        }

        match self.workers.submit(payloads) {
            Ok(ticket) => {
                debug!(batch_id, task_id = ticket.id, events = records.len(), "batch dispatched");
                let shared = Arc::clone(&self.shared);
                self.spawner.spawn(async move {
                    let outcome = ticket.wait().await;
                    if let (Ok(result), Some(key)) = (&outcome, key) {
                        shared.cache.insert(key, result.clone());
                    }
                    Self::complete(&shared, batch_id, started, records, outcome, false);
                });
            }
            Err(e) => {
                warn!(batch_id, error = %e, "batch dispatch failed");
                Self::complete(&self.shared, batch_id, started, records, Err(e), false);
            }
        }
    }

    /// Resolve one batch: release every pooled record exactly once, update
    /// metrics, notify subscribers, and return to idle.
    fn complete(
        shared: &Arc<Shared<P, R>>,
        batch_id: u64,
        started: Instant,
        records: Vec<EventRecord<P>>,
        outcome: Result<R, SchedulerError>,
        cached: bool,
    ) {
        let event_ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        let event_count = event_ids.len() as u64;
        for record in records {
            shared.queue.release(record);
        }
        shared
            .monitor
            .record_duration("batch_latency_ms", duration_ms(started));

        match outcome {
            Ok(result) => {
                shared.monitor.increment("batches_completed");
                shared.monitor.add("events_processed", event_count);
                let outcome = BatchOutcome {
                    batch_id,
                    event_ids,
                    result,
                    cached,
                };
                for callback in shared.on_result.lock().iter() {
                    callback(&outcome);
                }
            }
            Err(error) => {
                if matches!(error, SchedulerError::TaskTimeout(_)) {
                    shared.monitor.increment("batches_timed_out");
                } else {
                    shared.monitor.increment("batches_failed");
                }
                let failure = BatchFailure {
                    batch_id,
                    event_ids,
                    error,
                };
                for callback in shared.on_error.lock().iter() {
                    callback(&failure);
                }
            }
        }

        let mut state = shared.state.lock();
        if *state != SchedulerState::Shutdown {
            *state = SchedulerState::Idle;
        }
    }
}
