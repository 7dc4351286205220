//! Error types for the reactive runtime.

use thiserror::Error;

use crate::reactive::{ComputationId, DependencyId, SlotKey};

/// Boxed error produced by a user-supplied producer, mutator or callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Everything that can go wrong while reading, writing or propagating.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A reactive object was accessed through a key it never declared.
    #[error("unknown slot `{slot}` on dependency {dependency:?}")]
    UnknownSlot {
        dependency: DependencyId,
        slot: SlotKey,
    },

    /// The computation was disposed or never belonged to this runtime.
    #[error("unknown computation {0:?}")]
    UnknownComputation(ComputationId),

    /// A handle created by one runtime was handed to another.
    #[error("handle belongs to a different runtime")]
    ForeignRuntime,

    /// A computation was triggered while it was already evaluating.
    #[error("computation {0:?} re-entered itself during evaluation")]
    Reentrant(ComputationId),

    /// A producer, mutator or callback failed.
    #[error("producer failed: {0}")]
    Producer(#[source] BoxError),

    /// Several subscribers failed during one fan-out under the continue policy.
    #[error("{} subscribers failed during propagation", .0.len())]
    Multiple(Vec<ReactiveError>),

    /// A value handed to a reactive object was not a JSON object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// JSON parsing or conversion failed (configuration, object wrapping).
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A graph snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

impl ReactiveError {
    /// Wrap an arbitrary user error.
    pub fn producer<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Producer(err.into())
    }
}
