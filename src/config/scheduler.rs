//! Scheduler configuration: pool sizing, batch and tick limits, worker pool
//! settings, cache capacity, and the exhaustion and recovery policies.

use serde::{Deserialize, Serialize};

/// What the object pool does when every record is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Grow the pool by `increment` records, never past the maximum size.
    Grow {
        /// Records added per growth step.
        increment: usize,
    },
    /// Reject the acquisition; the submitting event is dropped and counted.
    Reject,
}

/// What the worker pool does when a worker thread dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Spawn a replacement worker so capacity is restored.
    Respawn,
    /// Continue with fewer workers; capacity degrades permanently.
    Degrade,
}

/// Root scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum events drained into one batch.
    pub max_batch_size: usize,
    /// Milliseconds between cadence ticks.
    pub tick_interval_ms: u64,
    /// Time budget for draining within one tick, in milliseconds.
    pub tick_budget_ms: u64,
    /// Event records preallocated at startup.
    pub pool_initial_size: usize,
    /// Hard ceiling on pool growth.
    pub pool_max_size: usize,
    /// Behavior when the pool is exhausted.
    pub exhaustion_policy: ExhaustionPolicy,
    /// Background worker threads.
    pub worker_count: usize,
    /// Bounded depth of the worker intake queue.
    pub worker_queue_depth: usize,
    /// Maximum entries held by the memoization cache.
    pub cache_capacity: usize,
    /// Per-task timeout in milliseconds; `None` disables the timeout.
    pub task_timeout_ms: Option<u64>,
    /// Behavior when a worker thread dies.
    pub recovery: RecoveryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            tick_interval_ms: 10,
            tick_budget_ms: 5,
            pool_initial_size: 64,
            pool_max_size: 1024,
            exhaustion_policy: ExhaustionPolicy::Grow { increment: 16 },
            worker_count: num_cpus::get(),
            worker_queue_depth: 256,
            cache_capacity: 128,
            task_timeout_ms: None,
            recovery: RecoveryPolicy::Respawn,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration; override fields with the `with_*` methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum events drained into one batch.
    #[must_use]
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Set the cadence tick interval in milliseconds.
    #[must_use]
    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    /// Set the per-tick drain budget in milliseconds.
    #[must_use]
    pub fn with_tick_budget_ms(mut self, tick_budget_ms: u64) -> Self {
        self.tick_budget_ms = tick_budget_ms;
        self
    }

    /// Set the initial and maximum object pool sizes.
    #[must_use]
    pub fn with_pool_sizes(mut self, initial: usize, max: usize) -> Self {
        self.pool_initial_size = initial;
        self.pool_max_size = max;
        self
    }

    /// Set the pool exhaustion policy.
    #[must_use]
    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion_policy = policy;
        self
    }

    /// Set the number of background worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the bounded depth of the worker intake queue.
    #[must_use]
    pub fn with_worker_queue_depth(mut self, worker_queue_depth: usize) -> Self {
        self.worker_queue_depth = worker_queue_depth;
        self
    }

    /// Set the memoization cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Set the per-task timeout in milliseconds.
    #[must_use]
    pub fn with_task_timeout_ms(mut self, task_timeout_ms: u64) -> Self {
        self.task_timeout_ms = Some(task_timeout_ms);
        self
    }

    /// Set the worker recovery policy.
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_batch_size == 0 {
            return Err("max_batch_size must be greater than 0".into());
        }
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be greater than 0".into());
        }
        if self.pool_initial_size == 0 {
            return Err("pool_initial_size must be greater than 0".into());
        }
        if self.pool_max_size < self.pool_initial_size {
            return Err("pool_max_size must be at least pool_initial_size".into());
        }
        if let ExhaustionPolicy::Grow { increment } = self.exhaustion_policy {
            if increment == 0 {
                return Err("grow increment must be greater than 0".into());
            }
        }
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.worker_queue_depth == 0 {
            return Err("worker_queue_depth must be greater than 0".into());
        }
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".into());
        }
        if self.task_timeout_ms == Some(0) {
            return Err("task_timeout_ms must be greater than 0 when set".into());
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error description.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: SchedulerConfig =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
