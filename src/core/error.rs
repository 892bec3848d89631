//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
///
/// Only [`SchedulerError::Configuration`] is allowed to halt startup. All
/// runtime errors are isolated to the smallest unit possible (one event
/// dropped, one batch failed) and surfaced through metrics and callbacks
/// rather than propagating to crash the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Invalid setup parameters; raised at build time, never at runtime.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Object pool has no free slot and growth is disabled or capped.
    #[error("object pool exhausted")]
    PoolExhausted,
    /// The registered computation failed for a batch.
    #[error("task failed: {0}")]
    Task(String),
    /// The registered computation exceeded the configured timeout.
    #[error("task timed out after {0} ms")]
    TaskTimeout(u64),
    /// A worker execution context became unusable.
    #[error("worker unavailable: {0}")]
    WorkerUnavailable(String),
    /// Worker intake queue is full for this dispatch.
    #[error("worker queue full: {0}")]
    QueueFull(String),
    /// A mutating call arrived after shutdown began.
    #[error("shutdown in progress")]
    ShutdownInProgress,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SchedulerError::PoolExhausted.to_string(),
            "object pool exhausted"
        );
        assert_eq!(
            SchedulerError::TaskTimeout(250).to_string(),
            "task timed out after 250 ms"
        );
        assert_eq!(
            SchedulerError::Configuration("worker_count must be >= 1".into()).to_string(),
            "invalid configuration: worker_count must be >= 1"
        );
        assert_eq!(
            SchedulerError::ShutdownInProgress.to_string(),
            "shutdown in progress"
        );
    }
}
