//! Key/value extraction terminals.
//!
//! Each kept element is turned into a `(key, value)` pair, either by separate key and
//! value extractors or by one pair extractor, and inserted into a `HashMap`.
//! Extractors run on the workers; only the insert is serialized.
//!
//! - `to_map_*`: duplicate keys overwrite. The parallel form is unordered, so with
//!   duplicate keys the surviving value is unspecified.
//! - `to_grouped_map_*`: values are appended to a per-key list. The parallel form is
//!   ordered, so lists match the sequential result exactly.
//!
//! Pass `Clone::clone` as an extractor to use the element itself.

use crate::contract::{check_signature, BoundFn};
use crate::error::PipeError;
use crate::runner::ExecMode;
use crate::type_token::{take_elem, Element, TypeTag};
use crate::{Pipe, PipeBound};
use anyhow::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::sync::Arc;

fn insert<K: Eq + Hash, V>(map: &mut HashMap<K, V>, (k, v): (K, V)) -> Result<ControlFlow<()>> {
    map.insert(k, v);
    Ok(ControlFlow::Continue(()))
}

fn append<K: Eq + Hash, V>(
    map: &mut HashMap<K, Vec<V>>,
    (k, v): (K, V),
) -> Result<ControlFlow<()>> {
    map.entry(k).or_default().push(v);
    Ok(ControlFlow::Continue(()))
}

impl<T: PipeBound> Pipe<T> {
    fn pairs_into<K, V, A, F>(
        &self,
        mode: ExecMode,
        pair_fn: F,
        combine: fn(&mut HashMap<K, A>, (K, V)) -> Result<ControlFlow<()>>,
    ) -> Result<HashMap<K, A>>
    where
        K: Eq + Hash + Send,
        A: Send,
        F: Fn(&T) -> (K, V) + Sync,
    {
        self.runner(mode)
            .run(self, HashMap::new(), |_, value| Ok(pair_fn(&value)), combine)
    }

    /// Build a map sequentially. Later elements overwrite earlier ones with the same key.
    ///
    /// # Errors
    /// Any stage failure.
    pub fn to_map_seq<K, V, FK, FV>(&self, key_fn: FK, val_fn: FV) -> Result<HashMap<K, V>>
    where
        K: Eq + Hash + Send,
        V: Send,
        FK: Fn(&T) -> K + Sync,
        FV: Fn(&T) -> V + Sync,
    {
        self.pairs_into(ExecMode::Sequential, |t| (key_fn(t), val_fn(t)), insert)
    }

    /// Build a map concurrently. Inserts happen in completion order.
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn to_map_par<K, V, FK, FV>(&self, key_fn: FK, val_fn: FV) -> Result<HashMap<K, V>>
    where
        K: Eq + Hash + Send,
        V: Send,
        FK: Fn(&T) -> K + Sync,
        FV: Fn(&T) -> V + Sync,
    {
        self.pairs_into(ExecMode::ParallelUnordered, |t| (key_fn(t), val_fn(t)), insert)
    }

    /// Build a map sequentially from a single pair extractor.
    ///
    /// # Errors
    /// Any stage failure.
    pub fn to_map_from_pair_seq<K, V, F>(&self, pair_fn: F) -> Result<HashMap<K, V>>
    where
        K: Eq + Hash + Send,
        V: Send,
        F: Fn(&T) -> (K, V) + Sync,
    {
        self.pairs_into(ExecMode::Sequential, pair_fn, insert)
    }

    /// Build a map concurrently from a single pair extractor.
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn to_map_from_pair_par<K, V, F>(&self, pair_fn: F) -> Result<HashMap<K, V>>
    where
        K: Eq + Hash + Send,
        V: Send,
        F: Fn(&T) -> (K, V) + Sync,
    {
        self.pairs_into(ExecMode::ParallelUnordered, pair_fn, insert)
    }

    /// Group values under their keys, in evaluation order.
    ///
    /// ```
    /// use ironpipe::*;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let p = Pipeline::default();
    /// let parity = |v: &i32| if v % 2 == 0 { "even" } else { "odd" };
    /// let groups = from_vec(&p, vec![5, 4, 3, 2, 1]).to_grouped_map_par(parity, Clone::clone)?;
    /// assert_eq!(groups["odd"], vec![5, 3, 1]);
    /// assert_eq!(groups["even"], vec![4, 2]);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Any stage failure.
    pub fn to_grouped_map_seq<K, V, FK, FV>(
        &self,
        key_fn: FK,
        val_fn: FV,
    ) -> Result<HashMap<K, Vec<V>>>
    where
        K: Eq + Hash + Send,
        V: Send,
        FK: Fn(&T) -> K + Sync,
        FV: Fn(&T) -> V + Sync,
    {
        self.pairs_into(ExecMode::Sequential, |t| (key_fn(t), val_fn(t)), append)
    }

    /// Concurrent grouping with per-key lists in source order.
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn to_grouped_map_par<K, V, FK, FV>(
        &self,
        key_fn: FK,
        val_fn: FV,
    ) -> Result<HashMap<K, Vec<V>>>
    where
        K: Eq + Hash + Send,
        V: Send,
        FK: Fn(&T) -> K + Sync,
        FV: Fn(&T) -> V + Sync,
    {
        self.pairs_into(ExecMode::ParallelOrdered, |t| (key_fn(t), val_fn(t)), append)
    }

    /// Sequential grouping from a single pair extractor.
    ///
    /// # Errors
    /// Any stage failure.
    pub fn to_grouped_map_from_pair_seq<K, V, F>(&self, pair_fn: F) -> Result<HashMap<K, Vec<V>>>
    where
        K: Eq + Hash + Send,
        V: Send,
        F: Fn(&T) -> (K, V) + Sync,
    {
        self.pairs_into(ExecMode::Sequential, pair_fn, append)
    }

    /// Concurrent grouping from a single pair extractor, per-key lists in source order.
    ///
    /// # Errors
    /// The first stage failure or worker panic.
    pub fn to_grouped_map_from_pair_par<K, V, F>(&self, pair_fn: F) -> Result<HashMap<K, Vec<V>>>
    where
        K: Eq + Hash + Send,
        V: Send,
        F: Fn(&T) -> (K, V) + Sync,
    {
        self.pairs_into(ExecMode::ParallelOrdered, pair_fn, append)
    }

    /// Build a map sequentially from a runtime-bound pair extractor.
    ///
    /// # Errors
    /// [`PipeError::Contract`] at binding time unless the function takes one
    /// parameter accepting `T` and returns `(K, V)`; otherwise any stage failure.
    pub fn to_map_fn<K, V>(&self, func: BoundFn) -> Result<HashMap<K, V>>
    where
        K: PipeBound + Eq + Hash,
        V: PipeBound,
    {
        self.bound_pairs_into("to_map", func, insert)
    }

    /// Group sequentially with a runtime-bound pair extractor.
    ///
    /// # Errors
    /// See [`to_map_fn`](Self::to_map_fn).
    pub fn to_grouped_map_fn<K, V>(&self, func: BoundFn) -> Result<HashMap<K, Vec<V>>>
    where
        K: PipeBound + Eq + Hash,
        V: PipeBound,
    {
        self.bound_pairs_into("to_grouped_map", func, append)
    }

    fn bound_pairs_into<K, V, A>(
        &self,
        stage: &'static str,
        func: BoundFn,
        combine: fn(&mut HashMap<K, A>, (K, V)) -> Result<ControlFlow<()>>,
    ) -> Result<HashMap<K, A>>
    where
        K: PipeBound + Eq + Hash,
        V: PipeBound,
        A: Send,
    {
        let tag = TypeTag::of::<T>();
        check_signature(
            stage,
            func.signature(),
            &[tag],
            &[Some(TypeTag::of::<K>()), Some(TypeTag::of::<V>())],
        )?;
        self.runner(ExecMode::Sequential).run(
            self,
            HashMap::new(),
            |_, value: T| {
                let args = func.adapt_args(stage, &[tag], vec![Arc::new(value) as Element])?;
                let mut out = func.invoke(stage, &args)?.into_iter();
                match (out.next(), out.next()) {
                    (Some(k), Some(v)) => {
                        Ok((take_elem::<K>(k, stage)?, take_elem::<V>(v, stage)?))
                    }
                    _ => Err(PipeError::contract(stage, "pair extractor returned too few values")
                        .into()),
                }
            },
            combine,
        )
    }
}
