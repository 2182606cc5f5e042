//! Collect-to-sequence terminals.
//!
//! Sequence order is part of the contract, so the parallel form always uses the
//! ordered evaluator: `collect_par` returns exactly what `collect_seq` returns.

use crate::runner::ExecMode;
use crate::{Pipe, PipeBound};
use anyhow::Result;
use std::ops::ControlFlow;

impl<T: PipeBound> Pipe<T> {
    fn collect_with(&self, mode: ExecMode) -> Result<Vec<T>> {
        self.runner(mode).run(
            self,
            Vec::new(),
            |_, value| Ok(value),
            |out: &mut Vec<T>, value| {
                out.push(value);
                Ok(ControlFlow::Continue(()))
            },
        )
    }

    /// Evaluate every index in order on the calling thread.
    ///
    /// # Errors
    /// Any stage failure aborts the whole collect.
    pub fn collect_seq(&self) -> Result<Vec<T>> {
        self.collect_with(ExecMode::Sequential)
    }

    /// Evaluate indexes concurrently and append results in source order.
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn collect_par(&self) -> Result<Vec<T>> {
        self.collect_with(ExecMode::ParallelOrdered)
    }
}
