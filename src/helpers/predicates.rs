//! Predicate terminals.
//!
//! Both evaluate sequentially and stop at the first index that decides the answer:
//! `some` once `min_count` matches have been seen, `every` at the first mismatch.

use crate::runner::ExecMode;
use crate::{Pipe, PipeBound};
use anyhow::Result;
use std::ops::ControlFlow;

impl<T: PipeBound> Pipe<T> {
    /// Whether at least `min_count` kept elements satisfy `pred`.
    ///
    /// `min_count == 0` is trivially true and evaluates nothing.
    ///
    /// ```
    /// use ironpipe::*;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let p = Pipeline::default();
    /// let nums = from_vec(&p, vec![1, 2, 3, 4]);
    /// assert!(nums.some(|v: &i32| v % 2 == 0, 2)?);
    /// assert!(!nums.some(|v: &i32| *v > 3, 2)?);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Any stage failure reached before the answer is decided.
    pub fn some<F>(&self, pred: F, min_count: usize) -> Result<bool>
    where
        F: Fn(&T) -> bool + Sync,
    {
        if min_count == 0 {
            return Ok(true);
        }
        let matched = self.runner(ExecMode::Sequential).run(
            self,
            0usize,
            |_, value| Ok(pred(&value)),
            |count: &mut usize, hit| {
                if hit {
                    *count += 1;
                }
                Ok(if *count >= min_count {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            },
        )?;
        Ok(matched >= min_count)
    }

    /// Whether every kept element satisfies `pred`. An empty chain is vacuously true.
    ///
    /// # Errors
    /// Any stage failure reached before the first mismatch.
    pub fn every<F>(&self, pred: F) -> Result<bool>
    where
        F: Fn(&T) -> bool + Sync,
    {
        self.runner(ExecMode::Sequential).run(
            self,
            true,
            |_, value| Ok(pred(&value)),
            |all: &mut bool, hit: bool| {
                if hit {
                    Ok(ControlFlow::Continue(()))
                } else {
                    *all = false;
                    Ok(ControlFlow::Break(()))
                }
            },
        )
    }
}
