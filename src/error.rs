//! Error kinds raised while building or evaluating a pipeline.
//!
//! Public entry points return [`anyhow::Result`]; the concrete failure is
//! always one of the [`PipeError`] variants below and can be recovered with
//! `err.downcast_ref::<PipeError>()`.
//!
//! Every kind aborts the whole operation. There is no per-element recovery:
//! a failing worker in a parallel run poisons the run and the first error is
//! returned to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipeError {
    /// A bound function does not have the shape a stage requires.
    #[error("contract violation in {stage}: {reason}")]
    Contract {
        /// The stage or terminal being constructed (`map`, `filter`, ...).
        stage: String,
        /// What was wrong with the supplied function.
        reason: String,
    },

    /// The chain has no readable source at its root.
    #[error("missing source: {0}")]
    MissingSource(String),

    /// An element did not have the type a stage declared for its input.
    #[error("type mismatch in {stage}: expected {expected}")]
    TypeMismatch {
        /// The stage that rejected the element.
        stage: String,
        /// Name of the type the stage expected.
        expected: String,
    },

    /// A worker panicked while evaluating or committing an element.
    #[error("worker for element {index} panicked: {message}")]
    WorkerPanicked {
        /// Source index the worker was responsible for.
        index: usize,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// A sort comparator or other whole-sequence stage panicked in a parallel run.
    #[error("{reshape} stage {stage} panicked: {message}")]
    ReshapePanicked {
        /// Display form of the stage id.
        stage: String,
        /// `Sort`, `Reverse` or `Deduplicate`.
        reshape: &'static str,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// A waiter was released because another worker failed.
    #[error("ordering barrier poisoned by a failed worker")]
    BarrierPoisoned,

    /// A range source was configured with a zero step.
    #[error("invalid range {start}..{stop} step {step}: step must be non-zero")]
    InvalidRange {
        /// First value of the range.
        start: i64,
        /// Exclusive upper (or lower, for negative steps) bound.
        stop: i64,
        /// Increment between values.
        step: i64,
    },

    /// A dedicated thread pool could not be built.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// An accumulator lock was poisoned by a panicking combine step.
    #[error("accumulator lock poisoned")]
    LockPoisoned,
}

impl PipeError {
    pub(crate) fn contract(stage: &str, reason: impl Into<String>) -> Self {
        Self::Contract {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn type_mismatch(stage: &str, expected: &str) -> Self {
        Self::TypeMismatch {
            stage: stage.to_string(),
            expected: expected.to_string(),
        }
    }
}
