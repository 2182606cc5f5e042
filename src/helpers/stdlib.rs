//! Standard library helpers for constructing [`Pipe`]s.
//!
//! These helpers create in-memory sources directly from native Rust data:
//!
//! - [`from_vec`] wraps a `Vec<T>` as the root of a new stage chain.
//! - [`from_iter`] collects any `IntoIterator<Item = T>` first.
//! - [`from_custom_source`] accepts any payload together with a [`SourceOps`]
//!   that knows how to measure it and read element `i`.
//!
//! ### Example
//! ```
//! use ironpipe::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::default();
//! let squared = from_iter(&p, 1..=5).map(|n: &i32| n * n);
//! assert_eq!(squared.collect_seq()?, vec![1, 4, 9, 16, 25]);
//! # Ok(())
//! # }
//! ```

use crate::node::Node;
use crate::type_token::{source_ops_for, SourceOps, TypeTag};
use crate::{Pipe, PipeBound, Pipeline};
use std::sync::Arc;

/// Create a [`Pipe<T>`] reading from `data`.
///
/// The vector is moved behind an `Arc` once; evaluation clones single elements
/// on demand.
pub fn from_vec<T>(p: &Pipeline, data: Vec<T>) -> Pipe<T>
where
    T: PipeBound,
{
    from_custom_source(p, data, source_ops_for::<T>())
}

/// Create a [`Pipe<T>`] from any iterator or collection.
pub fn from_iter<T, I>(p: &Pipeline, iter: I) -> Pipe<T>
where
    T: PipeBound,
    I: IntoIterator<Item = T>,
{
    from_vec(p, iter.into_iter().collect::<Vec<T>>())
}

/// Create a [`Pipe<T>`] from a custom indexable payload.
///
/// `ops` must downcast `payload` and produce `T` elements. If it cannot read the
/// payload, terminals fail with [`PipeError::MissingSource`](crate::PipeError::MissingSource).
///
/// ```
/// use ironpipe::*;
/// use ironpipe::type_token::{Element, SourceOps};
/// use std::any::Any;
/// use std::sync::Arc;
///
/// /// Squares of `0..n`, computed on demand.
/// struct Squares(usize);
/// struct SquaresOps;
///
/// impl SourceOps for SquaresOps {
///     fn len(&self, data: &dyn Any) -> Option<usize> {
///         data.downcast_ref::<Squares>().map(|s| s.0)
///     }
///     fn get(&self, data: &dyn Any, index: usize) -> Option<Element> {
///         let s = data.downcast_ref::<Squares>()?;
///         (index < s.0).then(|| Arc::new((index * index) as u64) as Element)
///     }
/// }
///
/// # fn main() -> anyhow::Result<()> {
/// let p = Pipeline::default();
/// let squares: Pipe<u64> = from_custom_source(&p, Squares(4), Arc::new(SquaresOps));
/// assert_eq!(squares.collect_par()?, vec![0, 1, 4, 9]);
/// # Ok(())
/// # }
/// ```
pub fn from_custom_source<T, P>(p: &Pipeline, payload: P, ops: Arc<dyn SourceOps>) -> Pipe<T>
where
    T: PipeBound,
    P: 'static + Send + Sync,
{
    Pipe::from_node(
        p.clone(),
        Node::Source {
            id: p.next_stage_id(),
            payload: Arc::new(payload),
            source_ops: ops,
            elem_tag: TypeTag::of::<T>(),
        },
    )
}
