//! Whole-sequence stages: sort, reverse, deduplicate.
//!
//! These are barrier nodes. Construction stays lazy; when a terminal runs, the
//! upstream chain is materialized in source order, rewritten, and the result becomes
//! the input of whatever stages follow.

use crate::contract::{check_less, BoundFn};
use crate::error::PipeError;
use crate::node::{Node, ReshapeOp};
use crate::type_token::{downcast_elem, Element, TypeTag};
use crate::{Pipe, PipeBound};
use anyhow::Result;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

type LessFn = dyn Fn(&Element, &Element) -> Result<bool, PipeError> + Send + Sync;

struct SortOp {
    less: Box<LessFn>,
}

impl SortOp {
    fn compare(&self, a: &Element, b: &Element) -> Result<Ordering, PipeError> {
        if (self.less)(a, b)? {
            Ok(Ordering::Less)
        } else if (self.less)(b, a)? {
            Ok(Ordering::Greater)
        } else {
            Ok(Ordering::Equal)
        }
    }
}

impl ReshapeOp for SortOp {
    fn apply(&self, mut input: Vec<Element>) -> Result<Vec<Element>, PipeError> {
        let mut failure = None;
        // Stable: ties keep their input order.
        input.sort_by(|a, b| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            self.compare(a, b).unwrap_or_else(|err| {
                failure = Some(err);
                Ordering::Equal
            })
        });
        failure.map_or(Ok(input), Err)
    }

    fn name(&self) -> &'static str {
        "Sort"
    }
}

struct ReverseOp;

impl ReshapeOp for ReverseOp {
    fn apply(&self, mut input: Vec<Element>) -> Result<Vec<Element>, PipeError> {
        input.reverse();
        Ok(input)
    }

    fn name(&self) -> &'static str {
        "Reverse"
    }
}

struct DedupOp<T>(PhantomData<fn(T)>);

impl<T: PipeBound + Eq + Hash> ReshapeOp for DedupOp<T> {
    fn apply(&self, input: Vec<Element>) -> Result<Vec<Element>, PipeError> {
        let mut seen: HashSet<&T> = HashSet::with_capacity(input.len());
        let mut keep = Vec::with_capacity(input.len());
        for element in &input {
            keep.push(seen.insert(downcast_elem::<T>(element, "deduplicate")?));
        }
        drop(seen);
        Ok(input
            .into_iter()
            .zip(keep)
            .filter_map(|(element, first)| first.then_some(element))
            .collect())
    }

    fn name(&self) -> &'static str {
        "Deduplicate"
    }
}

type EqFn<T> = dyn Fn(&T, &T) -> bool + Send + Sync;

/// Quadratic fallback for element types without `Eq + Hash`.
struct DedupByOp<T> {
    eq: Box<EqFn<T>>,
}

impl<T: PipeBound> ReshapeOp for DedupByOp<T> {
    fn apply(&self, input: Vec<Element>) -> Result<Vec<Element>, PipeError> {
        let mut kept: Vec<Element> = Vec::with_capacity(input.len());
        for element in input {
            let value = downcast_elem::<T>(&element, "deduplicate")?;
            let mut duplicate = false;
            for prior in &kept {
                if (self.eq)(downcast_elem::<T>(prior, "deduplicate")?, value) {
                    duplicate = true;
                    break;
                }
            }
            if !duplicate {
                kept.push(element);
            }
        }
        Ok(kept)
    }

    fn name(&self) -> &'static str {
        "Deduplicate"
    }
}

impl<T: PipeBound> Pipe<T> {
    fn reshape(self, op: Arc<dyn ReshapeOp>) -> Pipe<T> {
        let pipeline = self.pipeline.clone();
        let node = Node::Reshape {
            id: pipeline.next_stage_id(),
            parent: Some(self.head),
            op,
            elem_tag: TypeTag::of::<T>(),
        };
        Pipe::from_node(pipeline, node)
    }

    /// Stable sort by a strict less-than comparator.
    ///
    /// ```
    /// use ironpipe::*;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let p = Pipeline::default();
    /// let pairs = from_vec(&p, vec![(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')]);
    /// let sorted = pairs.sort(|x: &(i32, char), y: &(i32, char)| x.0 < y.0).collect_seq()?;
    /// assert_eq!(sorted, vec![(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn sort<F>(self, less: F) -> Pipe<T>
    where
        F: 'static + Send + Sync + Fn(&T, &T) -> bool,
    {
        let less = move |a: &Element, b: &Element| -> Result<bool, PipeError> {
            Ok(less(downcast_elem::<T>(a, "sort")?, downcast_elem::<T>(b, "sort")?))
        };
        self.reshape(Arc::new(SortOp {
            less: Box::new(less),
        }))
    }

    /// Stable sort by a runtime-bound comparator.
    ///
    /// # Errors
    /// [`PipeError::Contract`] unless the function takes two parameters accepting `T`
    /// and returns one `bool`.
    pub fn sort_fn(self, func: BoundFn) -> Result<Pipe<T>> {
        let tag = TypeTag::of::<T>();
        check_less(tag, func.signature())?;
        let less = move |a: &Element, b: &Element| -> Result<bool, PipeError> {
            let args = func.adapt_args("sort", &[tag, tag], vec![Arc::clone(a), Arc::clone(b)])?;
            let out = func.invoke("sort", &args)?;
            let first = out
                .first()
                .ok_or_else(|| PipeError::contract("sort", "comparator returned no value"))?;
            Ok(*downcast_elem::<bool>(first, "sort")?)
        };
        Ok(self.reshape(Arc::new(SortOp {
            less: Box::new(less),
        })))
    }

    /// Reverse the order of the elements.
    pub fn reverse(self) -> Pipe<T> {
        self.reshape(Arc::new(ReverseOp))
    }

    /// Keep the first occurrence of each value under `eq`, preserving
    /// first-occurrence order.
    ///
    /// Works for types [`deduplicate`](Self::deduplicate) cannot hash, such as
    /// floats or structs holding them. Runs in quadratic time.
    ///
    /// ```
    /// use ironpipe::*;
    ///
    /// let p = Pipeline::default();
    /// let unique = from_vec(&p, vec![0.5, 1.0, 0.5, 2.0])
    ///     .deduplicate_by(|a: &f64, b: &f64| a == b)
    ///     .collect_seq()
    ///     .unwrap();
    /// assert_eq!(unique, vec![0.5, 1.0, 2.0]);
    /// ```
    pub fn deduplicate_by<F>(self, eq: F) -> Pipe<T>
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.reshape(Arc::new(DedupByOp { eq: Box::new(eq) }))
    }
}

impl<T: PipeBound + Eq + Hash> Pipe<T> {
    /// Keep the first occurrence of each distinct value, preserving first-occurrence order.
    ///
    /// Requires `Eq + Hash`; use [`deduplicate_by`](Self::deduplicate_by) otherwise.
    pub fn deduplicate(self) -> Pipe<T> {
        self.reshape(Arc::new(DedupOp::<T>(PhantomData)))
    }
}
