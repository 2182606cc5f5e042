//! Fold and for-each terminals.
//!
//! `reduce_seq` and `reduce_par` thread the accumulator through kept elements in
//! source order and always agree. `reduce_par_unordered` folds in completion order
//! and is only deterministic for commutative, associative combiners.
//!
//! The for-each callbacks are `FnMut`: every invocation happens under the runner's
//! combine step, so at most one call is in flight at a time.

use crate::contract::{check_reduce, BoundFn};
use crate::error::PipeError;
use crate::runner::ExecMode;
use crate::type_token::{take_elem, Element, TypeTag};
use crate::{Pipe, PipeBound};
use anyhow::Result;
use std::ops::ControlFlow;
use std::sync::Arc;

fn fold_step<A, T, F: Fn(A, T) -> A>(
    slot: &mut Option<A>,
    value: T,
    combine: &F,
) -> Result<ControlFlow<()>> {
    let acc = slot
        .take()
        .ok_or_else(|| PipeError::contract("reduce", "accumulator lost by a failed combine"))?;
    *slot = Some(combine(acc, value));
    Ok(ControlFlow::Continue(()))
}

impl<T: PipeBound> Pipe<T> {
    fn reduce_with<A, F>(&self, mode: ExecMode, init: A, combine: F) -> Result<A>
    where
        A: Send,
        F: Fn(A, T) -> A + Sync,
    {
        self.runner(mode)
            .run(
                self,
                Some(init),
                |_, value| Ok(value),
                |slot: &mut Option<A>, value| fold_step(slot, value, &combine),
            )?
            .ok_or_else(|| PipeError::contract("reduce", "accumulator lost by a failed combine").into())
    }

    /// Fold kept elements in source order.
    ///
    /// ```
    /// use ironpipe::*;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let p = Pipeline::default();
    /// let digits = from_range(&p, 1, 4, 1)?.reduce_seq(String::new(), |acc, v| format!("{acc}{v}"))?;
    /// assert_eq!(digits, "123");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Any stage failure.
    pub fn reduce_seq<A, F>(&self, init: A, combine: F) -> Result<A>
    where
        A: Send,
        F: Fn(A, T) -> A + Sync,
    {
        self.reduce_with(ExecMode::Sequential, init, combine)
    }

    /// Evaluate concurrently, fold in source order. Same result as [`reduce_seq`](Self::reduce_seq).
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn reduce_par<A, F>(&self, init: A, combine: F) -> Result<A>
    where
        A: Send,
        F: Fn(A, T) -> A + Sync,
    {
        self.reduce_with(ExecMode::ParallelOrdered, init, combine)
    }

    /// Evaluate concurrently, fold in completion order.
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn reduce_par_unordered<A, F>(&self, init: A, combine: F) -> Result<A>
    where
        A: Send,
        F: Fn(A, T) -> A + Sync,
    {
        self.reduce_with(ExecMode::ParallelUnordered, init, combine)
    }

    /// Fold sequentially with a runtime-bound `(A, T) -> A` combiner.
    ///
    /// # Errors
    /// [`PipeError::Contract`] at binding time if the combiner's shape is wrong;
    /// otherwise any stage failure.
    pub fn reduce_fn<A: PipeBound>(&self, init: A, func: BoundFn) -> Result<A> {
        let (acc_tag, in_tag) = (TypeTag::of::<A>(), TypeTag::of::<T>());
        check_reduce(acc_tag, in_tag, func.signature())?;
        self.reduce_with(ExecMode::Sequential, Ok(init), |acc: Result<A>, value: T| {
            let acc = acc?;
            let args = func.adapt_args(
                "reduce",
                &[acc_tag, in_tag],
                vec![Arc::new(acc) as Element, Arc::new(value) as Element],
            )?;
            let out = func.invoke("reduce", &args)?.into_iter().next().ok_or_else(|| {
                PipeError::contract("reduce", "combiner returned no value")
            })?;
            Ok(take_elem::<A>(out, "reduce")?)
        })?
    }

    /// Call `f(value, position)` for every kept element in order, where `position`
    /// counts kept elements.
    ///
    /// # Errors
    /// Any stage failure.
    pub fn for_each_seq<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(T, usize) + Send,
    {
        self.for_each_ordered(ExecMode::Sequential, f)
    }

    /// Evaluate concurrently; callbacks run one at a time in source order with the
    /// same positions as [`for_each_seq`](Self::for_each_seq).
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn for_each_par<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(T, usize) + Send,
    {
        self.for_each_ordered(ExecMode::ParallelOrdered, f)
    }

    /// Evaluate concurrently; callbacks run one at a time in completion order and
    /// receive the element's source index.
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn for_each_par_unordered<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(T, usize) + Send,
    {
        self.runner(ExecMode::ParallelUnordered).run(
            self,
            f,
            |index, value| Ok((value, index)),
            |f: &mut F, (value, index)| {
                f(value, index);
                Ok(ControlFlow::Continue(()))
            },
        )?;
        Ok(())
    }

    fn for_each_ordered<F>(&self, mode: ExecMode, f: F) -> Result<()>
    where
        F: FnMut(T, usize) + Send,
    {
        self.runner(mode).run(
            self,
            (f, 0usize),
            |_, value| Ok(value),
            |(f, position): &mut (F, usize), value| {
                f(value, *position);
                *position += 1;
                Ok(ControlFlow::Continue(()))
            },
        )?;
        Ok(())
    }
}
