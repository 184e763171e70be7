//! Error types for buffers, producers and the coordinator.
//!
//! ## Error Cases
//! - `InvalidWatermarks`: the low watermark is not strictly below the high one.
//! - `InvalidMultiple`: a [`LabelEvery`] generator was built with a zero
//!   multiple.
//! - `NoProducers`: a coordinator was started with nothing registered.
//! - `InvalidState`: a lifecycle method was called in the wrong phase.
//! - `StepMismatch`: a lane delivered an item stamped for a different step.
//! - `Sink`: the caller's sink rejected a combined record.
//! - `Spawn`: the OS refused to spawn a producer thread.
//! - `AlreadyStarted`: a producer task was started a second time.
//! - `LockPoisoned`: a std lock was poisoned (never with `parking-lot`).
//!
//! [`LabelEvery`]: crate::LabelEvery

use crate::coordinator::Phase;

/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Boxed error returned by caller-supplied sinks.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// All errors that `tidemark` can produce.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The watermark pair violates `low < high`.
    #[error("invalid watermarks: low ({low}) must be less than high ({high})")]
    InvalidWatermarks { low: usize, high: usize },

    /// A labelling generator was configured to fire every zero steps.
    #[error("invalid multiple for label {label:?}: must be greater than 0")]
    InvalidMultiple { label: String },

    /// The coordinator has no producers to run.
    #[error("no producers registered")]
    NoProducers,

    /// A lifecycle method was called from the wrong phase.
    #[error("coordinator is {actual}, expected {expected}")]
    InvalidState { expected: Phase, actual: Phase },

    /// A lane produced an item for a step other than the one being combined.
    #[error("step mismatch on producer {producer}: expected step {expected}, found {found}")]
    StepMismatch {
        producer: usize,
        expected: u64,
        found: u64,
    },

    /// The sink failed to accept the record for `step`.
    #[error("sink failed at step {step}")]
    Sink {
        step: u64,
        #[source]
        source: BoxError,
    },

    /// A producer thread could not be spawned.
    #[error("failed to spawn producer {producer}")]
    Spawn {
        producer: usize,
        #[source]
        source: std::io::Error,
    },

    /// A producer task's thread was already spawned.
    #[error("producer {producer} already started")]
    AlreadyStarted { producer: usize },

    /// The operation failed due to a poisoned lock.
    ///
    /// This happens when another thread panicked while holding a buffer lock.
    /// When the `parking-lot` feature is enabled, mutexes do **not** poison,
    /// so this variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("lock poisoned")]
    LockPoisoned,
}

#[cfg(not(feature = "parking-lot"))]
use crate::mutex::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}

/// A failure reported by a [`Generator`].
///
/// The producer that observes it stops pushing and closes its buffer; the
/// consumer sees the "no item" sentinel for that lane from then on.
///
/// [`Generator`]: crate::Generator
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("generator failed: {reason}")]
pub struct GeneratorError {
    reason: String,
}

impl GeneratorError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}
