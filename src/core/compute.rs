//! Computation traits and payload abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Marker trait for event payloads.
///
/// Payloads must be Send + Sync to cross the worker isolation boundary, and
/// Serialize + Deserialize so batch digests are deterministic for the
/// memoization cache.
pub trait EventPayload: Send + Sync + Serialize + for<'de> Deserialize<'de> + 'static {}

/// Blanket implementation: any type meeting the requirements is an `EventPayload`.
impl<T> EventPayload for T where T: Send + Sync + Serialize + for<'de> Deserialize<'de> + 'static {}

/// The caller-supplied pure computation, registered once at build time.
///
/// This is the only business logic the core depends on. The handler runs on a
/// dedicated worker thread against the batch payload alone; it must be a pure
/// transformation with no access to the caller's enclosing mutable state. A
/// statically registered handler replaces any scheme that ships source text
/// across the isolation boundary.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use percept_scheduler::core::BatchCompute;
///
/// #[derive(Clone)]
/// struct SumCompute;
///
/// #[async_trait]
/// impl BatchCompute<u64, u64> for SumCompute {
///     async fn compute(&self, batch: Vec<u64>) -> Result<u64, String> {
///         Ok(batch.iter().sum())
///     }
/// }
/// ```
#[async_trait]
pub trait BatchCompute<P, R>: Send + Sync + Clone + 'static
where
    P: EventPayload,
    R: Send + Sync + Clone + 'static,
{
    /// Run the computation over one drained batch.
    ///
    /// An `Err` resolves that batch as a failure without affecting the worker
    /// or any other in-flight or queued batch. The handler must be
    /// deterministic for a given batch; the memoization cache makes no
    /// correctness guarantee otherwise.
    async fn compute(&self, batch: Vec<P>) -> Result<R, String>;
}
