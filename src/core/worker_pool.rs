//! Background worker pool with dedicated OS threads.
//!
//! Each worker thread owns a single-threaded tokio runtime so the registered
//! computation never blocks the scheduling loop. A bounded crossbeam channel
//! is the shared intake: whichever worker frees up first receives the next
//! task, giving FIFO fairness across tasks without preemption.
//!
//! # Design
//!
//! - **No polling**: workers block on channel recv; results arrive over
//!   oneshot channels
//! - **Clean shutdown**: dropping the sender unblocks idle workers naturally
//! - **Failure isolation**: a failing computation resolves only its own
//!   ticket; a panicking worker loses only its own slot, and a drop guard
//!   respawns or degrades per the configured recovery policy

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::RecoveryPolicy;
use crate::core::compute::{BatchCompute, EventPayload};
use crate::core::SchedulerError;

/// Handle to one submitted task; resolves exactly once.
#[derive(Debug)]
pub struct TaskTicket<R> {
    /// Unique, monotonically increasing task id.
    pub id: u64,
    rx: oneshot::Receiver<Result<R, SchedulerError>>,
}

impl<R> TaskTicket<R> {
    /// Wait for the task's single resolution.
    ///
    /// # Errors
    ///
    /// Returns the task's failure, or [`SchedulerError::WorkerUnavailable`]
    /// when the executing worker died before resolving it.
    pub async fn wait(self) -> Result<R, SchedulerError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(SchedulerError::WorkerUnavailable(
                "worker dropped the task".into(),
            )),
        }
    }
}

/// Statistics about pool utilization and throughput.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPoolStats {
    /// Configured number of worker threads.
    pub worker_count: usize,
    /// Worker threads currently alive (may drop below `worker_count` under
    /// the degrade recovery policy).
    pub alive_workers: usize,
    /// Tasks waiting in the intake queue.
    pub queued_tasks: u64,
    /// Tasks currently executing.
    pub active_tasks: u64,
    /// Total tasks accepted.
    pub submitted_tasks: u64,
    /// Total tasks that resolved successfully.
    pub completed_tasks: u64,
    /// Total tasks that resolved as failures.
    pub failed_tasks: u64,
    /// Total tasks that resolved as timeouts (counted separately from
    /// failures).
    pub timed_out_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct WorkerCounters {
    queued_tasks: AtomicU64,
    active_tasks: AtomicU64,
    submitted_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
    timed_out_tasks: AtomicU64,
}

/// A unit of work crossing into a worker thread.
struct WorkerTask<P, R> {
    id: u64,
    batch: Vec<P>,
    reply: oneshot::Sender<Result<R, SchedulerError>>,
}

/// Everything a worker thread needs; cloneable so a drop guard can respawn a
/// replacement after a panic.
struct WorkerContext<P, R, E> {
    worker_id: usize,
    task_rx: Receiver<WorkerTask<P, R>>,
    counters: Arc<WorkerCounters>,
    alive_workers: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    compute: E,
    task_timeout: Option<Duration>,
    recovery: RecoveryPolicy,
}

impl<P, R, E: Clone> Clone for WorkerContext<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            worker_id: self.worker_id,
            task_rx: self.task_rx.clone(),
            counters: Arc::clone(&self.counters),
            alive_workers: Arc::clone(&self.alive_workers),
            shutdown: Arc::clone(&self.shutdown),
            compute: self.compute.clone(),
            task_timeout: self.task_timeout,
            recovery: self.recovery,
        }
    }
}

/// Fixed-size set of independent execution contexts running the registered
/// computation off the scheduling path.
pub struct BackgroundWorkerPool<P, R, E>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
{
    worker_count: usize,
    /// Task sender (to workers). `None` after shutdown so idle workers wake.
    task_tx: Mutex<Option<Sender<WorkerTask<P, R>>>>,
    counters: Arc<WorkerCounters>,
    alive_workers: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    task_id_counter: AtomicU64,
    _compute: PhantomData<E>,
}

impl<P, R, E> BackgroundWorkerPool<P, R, E>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
{
    /// Spawn `worker_count` dedicated worker threads sharing a bounded intake
    /// queue of `queue_depth` tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Configuration`] for a zero worker count or
    /// queue depth.
    pub fn new(
        worker_count: usize,
        queue_depth: usize,
        task_timeout: Option<Duration>,
        recovery: RecoveryPolicy,
        compute: E,
    ) -> Result<Self, SchedulerError> {
        if worker_count == 0 {
            return Err(SchedulerError::Configuration(
                "worker_count must be >= 1".into(),
            ));
        }
        if queue_depth == 0 {
            return Err(SchedulerError::Configuration(
                "worker_queue_depth must be >= 1".into(),
            ));
        }

        let (task_tx, task_rx) = bounded::<WorkerTask<P, R>>(queue_depth);
        let counters = Arc::new(WorkerCounters::default());
        let alive_workers = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(spawn_worker(WorkerContext {
                worker_id,
                task_rx: task_rx.clone(),
                counters: Arc::clone(&counters),
                alive_workers: Arc::clone(&alive_workers),
                shutdown: Arc::clone(&shutdown),
                compute: compute.clone(),
                task_timeout,
                recovery,
            }));
        }

        info!(
            worker_count,
            queue_depth,
            ?task_timeout,
            ?recovery,
            "background worker pool initialized"
        );

        Ok(Self {
            worker_count,
            task_tx: Mutex::new(Some(task_tx)),
            counters,
            alive_workers,
            shutdown,
            workers: Mutex::new(workers),
            task_id_counter: AtomicU64::new(0),
            _compute: PhantomData,
        })
    }

    /// Submit one batch for execution and receive a [`TaskTicket`].
    ///
    /// Dispatch order is submission order; if every worker is busy the task
    /// waits in the bounded intake queue.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::QueueFull`] when the intake queue is saturated
    /// - [`SchedulerError::ShutdownInProgress`] after shutdown has begun
    pub fn submit(&self, batch: Vec<P>) -> Result<TaskTicket<R>, SchedulerError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutdownInProgress);
        }

        let id = self.task_id_counter.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        let task = WorkerTask { id, batch, reply };

        let guard = self.task_tx.lock();
        let Some(task_tx) = guard.as_ref() else {
            return Err(SchedulerError::ShutdownInProgress);
        };

        match task_tx.try_send(task) {
            Ok(()) => {
                self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(task_id = id, "task submitted to worker pool");
                Ok(TaskTicket { id, rx })
            }
            Err(crossbeam_channel::TrySendError::Full(_)) => {
                warn!(task_id = id, "worker intake queue is full");
                Err(SchedulerError::QueueFull(
                    "worker intake queue saturated".into(),
                ))
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                Err(SchedulerError::ShutdownInProgress)
            }
        }
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            worker_count: self.worker_count,
            alive_workers: self.alive_workers.load(Ordering::Relaxed),
            queued_tasks: self.counters.queued_tasks.load(Ordering::Relaxed),
            active_tasks: self.counters.active_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.counters.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.counters.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.counters.failed_tasks.load(Ordering::Relaxed),
            timed_out_tasks: self.counters.timed_out_tasks.load(Ordering::Relaxed),
        }
    }

    /// Shut down the pool gracefully. Idempotent.
    ///
    /// Stops intake, drops the sender to unblock idle workers, then joins
    /// each worker with a bounded wait (2 seconds per worker); stragglers are
    /// detached rather than hanging the caller.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("shutting down worker pool");

        {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
        }

        let mut workers = self.workers.lock();
        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(true) => debug!(worker_id = idx, "worker joined"),
                Ok(false) => warn!(worker_id = idx, "worker panicked before join"),
                Err(_) => {
                    warn!(worker_id = idx, "worker did not exit within timeout, detaching");
                }
            }
            let _ = join_thread.join();
        }

        info!("worker pool shut down");
    }
}

impl<P, R, E> Drop for BackgroundWorkerPool<P, R, E>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
{
    fn drop(&mut self) {
        // Signal shutdown without joining; explicit shutdown() is the
        // graceful path and Drop must not hang tests.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
            debug!("worker pool dropped without explicit shutdown, workers detached");
        }
    }
}

/// Decrements the alive-worker gauge on thread exit and, after a panic,
/// spawns a replacement when the recovery policy asks for one.
struct RespawnGuard<P, R, E>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
{
    ctx: WorkerContext<P, R, E>,
}

impl<P, R, E> Drop for RespawnGuard<P, R, E>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
{
    fn drop(&mut self) {
        self.ctx.alive_workers.fetch_sub(1, Ordering::Relaxed);
        if !thread::panicking() {
            return;
        }
        let shutting_down = self.ctx.shutdown.load(Ordering::Acquire);
        match self.ctx.recovery {
            RecoveryPolicy::Respawn if !shutting_down => {
                warn!(
                    worker_id = self.ctx.worker_id,
                    "worker panicked, spawning replacement"
                );
                // The replacement handle is detached; shutdown unblocks it by
                // dropping the task sender like any other worker.
                let _ = spawn_worker(self.ctx.clone());
            }
            _ => {
                error!(
                    worker_id = self.ctx.worker_id,
                    "worker panicked, pool degraded"
                );
            }
        }
    }
}

/// Spawn one worker thread around its context.
fn spawn_worker<P, R, E>(ctx: WorkerContext<P, R, E>) -> JoinHandle<()>
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
{
    ctx.alive_workers.fetch_add(1, Ordering::Relaxed);
    let worker_id = ctx.worker_id;
    thread::Builder::new()
        .name(format!("percept-worker-{worker_id}"))
        .spawn(move || {
            let _guard = RespawnGuard { ctx: ctx.clone() };
            run_worker(&ctx);
        })
        .expect("failed to spawn worker thread")
}

/// Worker loop: blocking recv, execute on a thread-local runtime, resolve the
/// ticket. Exits when the sender is dropped.
fn run_worker<P, R, E>(ctx: &WorkerContext<P, R, E>)
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
    E: BatchCompute<P, R>,
{
    debug!(worker_id = ctx.worker_id, "worker thread started");

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(worker_id = ctx.worker_id, error = %e, "failed to create worker runtime");
            return;
        }
    };

    loop {
        let task = match ctx.task_rx.recv() {
            Ok(task) => task,
            Err(_) => {
                debug!(worker_id = ctx.worker_id, "worker channel closed, exiting");
                break;
            }
        };

        if ctx.shutdown.load(Ordering::Acquire) {
            // Abandoned tasks were counted as queued when accepted; dropping
            // the reply resolves their tickets as WorkerUnavailable.
            ctx.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            debug!(
                worker_id = ctx.worker_id,
                task_id = task.id,
                "abandoning queued task at shutdown"
            );
            continue;
        }

        ctx.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
        ctx.counters.active_tasks.fetch_add(1, Ordering::Relaxed);

        let task_id = task.id;
        debug!(worker_id = ctx.worker_id, task_id, "worker executing task");

        let outcome = rt.block_on(async {
            match ctx.task_timeout {
                Some(limit) => match tokio::time::timeout(limit, ctx.compute.compute(task.batch)).await {
                    Ok(result) => result.map_err(SchedulerError::Task),
                    Err(_) => Err(SchedulerError::TaskTimeout(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))),
                },
                None => ctx.compute.compute(task.batch).await.map_err(SchedulerError::Task),
            }
        });

        ctx.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
        match &outcome {
            Ok(_) => {
                ctx.counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
            }
            Err(SchedulerError::TaskTimeout(_)) => {
                ctx.counters.timed_out_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id = ctx.worker_id, task_id, "task timed out");
            }
            Err(e) => {
                ctx.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id = ctx.worker_id, task_id, error = %e, "task failed");
            }
        }

        if task.reply.send(outcome).is_err() {
            debug!(worker_id = ctx.worker_id, task_id, "ticket receiver dropped");
        }
    }

    debug!(worker_id = ctx.worker_id, "worker thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct SumCompute;

    #[async_trait]
    impl BatchCompute<u64, u64> for SumCompute {
        async fn compute(&self, batch: Vec<u64>) -> Result<u64, String> {
            Ok(batch.iter().sum())
        }
    }

    fn pool(workers: usize) -> BackgroundWorkerPool<u64, u64, SumCompute> {
        BackgroundWorkerPool::new(workers, 16, None, RecoveryPolicy::Respawn, SumCompute).unwrap()
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let pool = pool(2);
        let ticket = pool.submit(vec![1, 2, 3]).unwrap();
        assert_eq!(ticket.wait().await.unwrap(), 6);
        let stats = pool.stats();
        assert_eq!(stats.submitted_tasks, 1);
        assert_eq!(stats.completed_tasks, 1);
        pool.shutdown();
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result =
            BackgroundWorkerPool::<u64, u64, _>::new(0, 16, None, RecoveryPolicy::Degrade, SumCompute);
        assert!(matches!(result, Err(SchedulerError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_task_ids_monotonic() {
        let pool = pool(1);
        let a = pool.submit(vec![1]).unwrap();
        let b = pool.submit(vec![2]).unwrap();
        assert!(b.id > a.id);
        let _ = a.wait().await;
        let _ = b.wait().await;
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let pool = pool(1);
        pool.shutdown();
        assert_eq!(
            pool.submit(vec![1]).unwrap_err(),
            SchedulerError::ShutdownInProgress
        );
    }
}
