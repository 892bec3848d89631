//! Performance counters, gauges, and running-aggregate timers.
//!
//! Timers keep count/total/max aggregates rather than per-sample history, so
//! memory stays constant regardless of how long the scheduler runs.
//! Snapshots are deep copies; callers can never mutate internal state through
//! a returned snapshot.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Running aggregate for one named timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerStats {
    /// Samples recorded.
    pub count: u64,
    /// Sum of all recorded durations in milliseconds.
    pub total_ms: f64,
    /// Largest recorded duration in milliseconds.
    pub max_ms: f64,
}

impl TimerStats {
    /// Mean duration in milliseconds, zero when no samples were recorded.
    #[must_use]
    pub fn average_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            // Precision loss is acceptable for telemetry averages.
            #[allow(clippy::cast_precision_loss)]
            {
                self.total_ms / self.count as f64
            }
        }
    }
}

/// Immutable point-in-time copy of all metrics (copy-out semantics).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Monotonic counters by name.
    pub counters: HashMap<String, u64>,
    /// Last-written gauges by name.
    pub gauges: HashMap<String, f64>,
    /// Timer aggregates by name.
    pub timers: HashMap<String, TimerStats>,
}

#[derive(Default)]
struct MonitorState {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    timers: HashMap<String, TimerStats>,
}

/// Thread-safe metrics registry for the scheduler and its components.
#[derive(Default)]
pub struct PerformanceMonitor {
    state: RwLock<MonitorState>,
}

impl PerformanceMonitor {
    /// Create an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a named counter by one.
    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    /// Increment a named counter by `n`.
    pub fn add(&self, name: &str, n: u64) {
        let mut state = self.state.write();
        *state.counters.entry(name.to_owned()).or_insert(0) += n;
    }

    /// Set a named gauge to `value`.
    pub fn set_gauge(&self, name: &str, value: f64) {
        let mut state = self.state.write();
        state.gauges.insert(name.to_owned(), value);
    }

    /// Record one duration sample for a named timer.
    pub fn record_duration(&self, name: &str, ms: f64) {
        let mut state = self.state.write();
        let timer = state.timers.entry(name.to_owned()).or_default();
        timer.count += 1;
        timer.total_ms += ms;
        if ms > timer.max_ms {
            timer.max_ms = ms;
        }
    }

    /// Current value of a named counter, zero when never incremented.
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.state.read().counters.get(name).copied().unwrap_or(0)
    }

    /// Run `func`, recording its wall-clock duration under `name`.
    ///
    /// Explicit decoration at the call site; nothing is rewritten at runtime.
    pub fn time<T, F: FnOnce() -> T>(&self, name: &str, func: F) -> T {
        let started = Instant::now();
        let value = func();
        self.record_duration(name, duration_ms(started));
        value
    }

    /// Deep, independent copy of every counter, gauge, and timer.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read();
        MetricsSnapshot {
            counters: state.counters.clone(),
            gauges: state.gauges.clone(),
            timers: state.timers.clone(),
        }
    }
}

/// Elapsed milliseconds since `started` as a float.
#[must_use]
pub fn duration_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
