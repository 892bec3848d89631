//! Runtime adapters: the [`Spawn`] abstraction and the Tokio implementation.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;

use std::future::Future;

/// Abstraction for spawning the cadence loop and batch completions on a
/// runtime. Injected at build time so the core never owns a runtime.
pub trait Spawn {
    /// Spawn an async task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
