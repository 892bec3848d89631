//! # Percept Scheduler
//!
//! A cooperative event-processing and resource-optimization core.
//!
//! This library ingests a high-frequency stream of discrete events
//! ("percepts"), prioritizes and batches them, reuses pooled event records to
//! avoid allocation churn, offloads the caller's pure computation to a pool of
//! background worker threads, memoizes repeatable batch results, and reports
//! aggregated performance telemetry.
//!
//! ## Core Problem Solved
//!
//! Event-driven workloads that run a non-trivial computation per event share
//! recurring systems concerns that are independent of the domain logic:
//!
//! - **Backpressure**: incoming event rate can exceed processing capacity
//! - **Allocation churn**: per-event allocation dominates at high frequency
//! - **Bounded concurrency**: unbounded dispatch trades memory for throughput
//! - **Failure isolation**: one bad batch must not take the loop down
//!
//! ## Key Features
//!
//! - **Pooled event records**: a bounded object pool with a configurable
//!   grow-or-reject exhaustion policy
//! - **Priority batching**: bucket-per-priority FIFO queue drained within a
//!   per-tick time budget
//! - **Background workers**: dedicated OS threads so the caller's computation
//!   never blocks the scheduling loop
//! - **Memoization**: bounded LRU cache over batch digests
//! - **Telemetry**: counters, gauges, and running-aggregate timers with
//!   copy-out snapshots
//!
//! ## Example
//!
//! ```rust,ignore
//! use percept_scheduler::builders::SchedulerBuilder;
//! use percept_scheduler::config::SchedulerConfig;
//! use percept_scheduler::core::BatchCompute;
//! use percept_scheduler::runtime::TokioSpawner;
//!
//! #[derive(Clone)]
//! struct SumCompute;
//!
//! #[async_trait::async_trait]
//! impl BatchCompute<u64, u64> for SumCompute {
//!     async fn compute(&self, batch: Vec<u64>) -> Result<u64, String> {
//!         Ok(batch.iter().sum())
//!     }
//! }
//!
//! let scheduler = SchedulerBuilder::new(SumCompute, TokioSpawner::current())
//!     .with_config(SchedulerConfig::new().with_worker_count(4))
//!     .build()?;
//!
//! scheduler.submit_event(7, 0)?;
//! scheduler.start();
//! ```
//!
//! The scheduler is an explicitly constructed, owned instance with a clear
//! init/shutdown lifecycle; there is no global singleton. The computation is a
//! statically registered handler implementing [`core::BatchCompute`], never
//! serialized source text.
//!
//! For complete examples, see the integration tests under `tests/`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling components: pooled records, queue, workers, cache, monitor.
pub mod core;
/// Configuration models with validation and JSON parsing.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Runtime adapters for spawning the cadence loop and completions.
pub mod runtime;
/// Shared utilities.
pub mod util;
