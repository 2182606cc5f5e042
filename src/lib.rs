//! # Ironpipe
//!
//! **Lazy, composable data pipelines** over in-memory sequences and key/value
//! containers, with a deterministic sequential evaluator and two parallel
//! evaluators: one fast and unordered, one that preserves source order exactly.
//!
//! ## Key Features
//!
//! - **Lazy stage chains** - `map`, `filter`, `sort`, `reverse`, `deduplicate` build an
//!   immutable chain; nothing runs until a terminal is called
//! - **Order-preserving parallelism** - ordered terminals compute concurrently but
//!   commit results in source order through an [`OrderingBarrier`](barrier::OrderingBarrier)
//! - **Runtime binding with contracts** - functions bound as a
//!   [`BoundFn`](contract::BoundFn) are checked against the chain when the stage is built
//! - **Failure safe** - a failing or panicking worker aborts the run with the first error;
//!   no waiter is ever left blocked
//!
//! ## Quick Start
//!
//! ```
//! use ironpipe::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::default();
//!
//! let middle = from_vec(&p, vec![5, 4, 3, 2, 1])
//!     .filter(|v: &i32| *v > 1)
//!     .filter(|v: &i32| *v < 5)
//!     .reverse();
//!
//! assert_eq!(middle.collect_seq()?, vec![2, 3, 4]);
//! assert_eq!(middle.collect_par()?, vec![2, 3, 4]);
//!
//! let total = from_range(&p, 1, 11, 1)?.reduce_par_unordered(0i64, |acc, v| acc + v)?;
//! assert_eq!(total, 55);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! A [`Pipeline`] is the execution context: it numbers stages, owns the optional
//! dedicated thread pool configured through [`PipelineOptions`], and carries
//! optional metrics. It is cheap to clone.
//!
//! ### Pipe
//!
//! A [`Pipe<T>`] is a typed handle on a stage chain. Chains are:
//! - **Immutable** - every stage returns a new handle; existing chains never change
//! - **Lazy** - evaluation happens in terminal operations
//! - **Shareable** - one chain can be evaluated many times, in any mode
//!
//! ### Terminals
//!
//! | Terminal | Sequential | Parallel | Parallel order |
//! |---|---|---|---|
//! | collect | [`collect_seq`](Pipe::collect_seq) | [`collect_par`](Pipe::collect_par) | ordered |
//! | map | [`to_map_seq`](Pipe::to_map_seq) | [`to_map_par`](Pipe::to_map_par) | unordered |
//! | grouped map | [`to_grouped_map_seq`](Pipe::to_grouped_map_seq) | [`to_grouped_map_par`](Pipe::to_grouped_map_par) | ordered |
//! | reduce | [`reduce_seq`](Pipe::reduce_seq) | [`reduce_par`](Pipe::reduce_par) / [`reduce_par_unordered`](Pipe::reduce_par_unordered) | both |
//! | for-each | [`for_each_seq`](Pipe::for_each_seq) | [`for_each_par`](Pipe::for_each_par) / [`for_each_par_unordered`](Pipe::for_each_par_unordered) | both |
//! | predicates | [`some`](Pipe::some), [`every`](Pipe::every) | - | - |
//!
//! Ordered parallel terminals always return exactly what their sequential
//! counterpart returns. Unordered ones are only deterministic for commutative,
//! associative combines.
//!
//! ## Architecture
//!
//! 1. Building stages creates a backward-linked chain of [`node::Node`]s
//! 2. The [`planner`] linearizes the chain into segments separated by reshape barriers
//! 3. The [`runner`] evaluates each index through the segment's stages and folds
//!    the results with the terminal's combine step
//!
//! ## Module Overview
//!
//! - [`collection`] - the `Pipe` type and element-wise stages
//! - [`contract`] - runtime-bound functions and their type contracts
//! - [`barrier`] - the index-ordering barrier
//! - [`pipeline`] - execution context and options
//! - [`runner`] - sequential and parallel evaluators
//! - [`planner`] - plan construction and explanations
//! - [`helpers`] - sources, reshape stages and terminals
//! - [`testing`] - assertions and data builders for tests

pub mod barrier;
pub mod collection;
pub mod contract;
pub mod error;
pub mod helpers;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod node;
pub mod node_id;
pub mod pipeline;
pub mod planner;
pub mod runner;
pub mod testing;
pub mod type_token;

// General re-exports
pub use collection::{Pipe, PipeBound};
pub use error::PipeError;
pub use helpers::*;
pub use node_id::StageId;
pub use pipeline::{Pipeline, PipelineOptions};
pub use runner::{ExecMode, Runner};
