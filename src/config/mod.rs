//! Scheduler configuration structures.

pub mod scheduler;

pub use scheduler::{ExhaustionPolicy, RecoveryPolicy, SchedulerConfig};
