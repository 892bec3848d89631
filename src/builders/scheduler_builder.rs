//! Builder wiring a computation, a spawner, and a configuration into a
//! ready-to-start scheduler.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{BatchCompute, EventPayload, Scheduler, SchedulerError};
use crate::runtime::Spawn;

/// Assembles a [`Scheduler`] from its injected collaborators.
///
/// The computation is registered statically here, once, before any event is
/// accepted; there is no way to swap it at runtime.
pub struct SchedulerBuilder<E, S> {
    compute: E,
    spawner: S,
    config: SchedulerConfig,
}

impl<E, S> SchedulerBuilder<E, S>
where
    S: Spawn + Send + Sync + 'static,
{
    /// Start a builder with the given computation and spawner and a default
    /// configuration.
    pub fn new(compute: E, spawner: S) -> Self {
        Self {
            compute,
            spawner,
            config: SchedulerConfig::default(),
        }
    }

    /// Replace the default configuration.
    #[must_use]
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and construct the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Configuration`] for invalid settings.
    pub fn build<P, R>(self) -> Result<Arc<Scheduler<P, R, E, S>>, SchedulerError>
    where
        P: EventPayload,
        R: Send + Sync + Clone + 'static,
        E: BatchCompute<P, R>,
    {
        Ok(Arc::new(Scheduler::new(
            self.config,
            self.compute,
            self.spawner,
        )?))
    }
}
