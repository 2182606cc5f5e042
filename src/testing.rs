//! Testing utilities for ironpipe chains.
//!
//! - **Assertions**: compare terminal outputs with expected results, and check that
//!   sequential and ordered-parallel evaluation agree.
//! - **Test data builders**: generate inputs fluently and reproducibly.
//!
//! # Quick Start
//!
//! ```no_run
//! use ironpipe::*;
//! use ironpipe::testing::*;
//!
//! #[test]
//! fn doubles() -> anyhow::Result<()> {
//!     let p = TestPipeline::new();
//!
//!     let result = from_vec(&p, vec![1, 2, 3])
//!         .map(|x: &i32| x * 2)
//!         .collect_seq()?;
//!
//!     assert_collections_equal(&result, &[2, 4, 6]);
//!     Ok(())
//! }
//! ```
//!
//! Use [`TestDataBuilder`] to create inputs:
//!
//! ```
//! use ironpipe::testing::*;
//!
//! let data = TestDataBuilder::<i32>::new()
//!     .add_range(1..=10)
//!     .add_repeated(7, 3)
//!     .build();
//! assert_eq!(data.len(), 13);
//! ```

pub mod assertions;
pub mod builders;

// Re-export commonly used items
pub use assertions::*;
pub use builders::*;

use crate::{Pipeline, PipelineOptions};

/// A test-focused wrapper around [`Pipeline`].
///
/// Dereferences to [`Pipeline`], so it can be passed anywhere a `&Pipeline` is expected.
///
/// ```
/// use ironpipe::testing::TestPipeline;
/// use ironpipe::from_vec;
///
/// let p = TestPipeline::new();
/// let _bumped = from_vec(&p, vec![1, 2, 3]).map(|x: &i32| x + 1);
/// assert_eq!(p.stage_count(), 2);
/// ```
#[derive(Clone)]
pub struct TestPipeline {
    pipeline: Pipeline,
}

impl TestPipeline {
    /// A pipeline on the global rayon pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: Pipeline::default(),
        }
    }

    /// A pipeline with a dedicated pool of `threads` workers, named `test`.
    ///
    /// Small pools are useful to exercise the ordered evaluator under contention.
    ///
    /// # Panics
    /// If the thread pool cannot be built.
    #[must_use]
    pub fn with_threads(threads: usize) -> Self {
        let options = PipelineOptions {
            threads: Some(threads),
            name: Some("test".to_string()),
        };
        match Pipeline::with_options(options) {
            Ok(pipeline) => Self { pipeline },
            Err(err) => panic!("failed to build test pipeline with {threads} threads: {err}"),
        }
    }
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

// Allow TestPipeline to be used wherever Pipeline is expected
impl std::ops::Deref for TestPipeline {
    type Target = Pipeline;

    fn deref(&self) -> &Self::Target {
        &self.pipeline
    }
}

impl AsRef<Pipeline> for TestPipeline {
    fn as_ref(&self) -> &Pipeline {
        &self.pipeline
    }
}
