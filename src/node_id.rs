//! Lightweight identifier for stages created through a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! Each [`Node`](crate::node::Node) gets a sequential `StageId` from the pipeline
//! that created it. Ids only show up in explanations, log lines and error context;
//! evaluation never looks them up.

/// Unique numeric identifier for a stage within a pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct StageId(u64);

impl StageId {
    /// Create a new `StageId` (used internally by the pipeline).
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    /// Return the underlying numeric value.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
