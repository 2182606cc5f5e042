//! Numeric range source.
//!
//! [`from_range`] feeds a chain with `start, start + step, ...` up to but not
//! including `stop`, computing each value from its index. Nothing is allocated
//! up front, so large ranges cost no memory until a terminal collects them.

use crate::error::PipeError;
use crate::helpers::stdlib::from_custom_source;
use crate::type_token::{Element, SourceOps};
use crate::{Pipe, Pipeline};
use anyhow::Result;
use std::any::Any;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
struct StepRange {
    start: i64,
    step: i64,
    len: usize,
}

impl StepRange {
    fn new(start: i64, stop: i64, step: i64) -> Self {
        let (start_w, stop_w, step_w) = (i128::from(start), i128::from(stop), i128::from(step));
        let span = if step > 0 {
            stop_w - start_w
        } else {
            start_w - stop_w
        };
        let len = if span <= 0 {
            0
        } else {
            let stride = step_w.abs();
            (span + stride - 1) / stride
        };
        Self {
            start,
            step,
            len: usize::try_from(len).unwrap_or(usize::MAX),
        }
    }

    fn value(&self, index: usize) -> Option<i64> {
        if index >= self.len {
            return None;
        }
        let offset = i128::try_from(index).ok()? * i128::from(self.step);
        i64::try_from(i128::from(self.start) + offset).ok()
    }
}

struct RangeOps;

impl SourceOps for RangeOps {
    fn len(&self, data: &dyn Any) -> Option<usize> {
        data.downcast_ref::<StepRange>().map(|r| r.len)
    }

    fn get(&self, data: &dyn Any, index: usize) -> Option<Element> {
        let range = data.downcast_ref::<StepRange>()?;
        range.value(index).map(|v| Arc::new(v) as Element)
    }
}

/// Create a [`Pipe<i64>`] over `start..stop` advancing by `step`.
///
/// A negative `step` counts down towards `stop`. A range whose `step` points away
/// from `stop` is empty.
///
/// # Errors
/// [`PipeError::InvalidRange`] if `step` is zero.
///
/// ```
/// use ironpipe::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let p = Pipeline::default();
/// assert_eq!(from_range(&p, 0, 10, 3)?.collect_seq()?, vec![0, 3, 6, 9]);
/// assert_eq!(from_range(&p, 5, 0, -2)?.collect_seq()?, vec![5, 3, 1]);
/// assert!(from_range(&p, 0, 1, 0).is_err());
/// # Ok(())
/// # }
/// ```
pub fn from_range(p: &Pipeline, start: i64, stop: i64, step: i64) -> Result<Pipe<i64>> {
    if step == 0 {
        return Err(PipeError::InvalidRange { start, stop, step }.into());
    }
    let bounds = StepRange::new(start, stop, step);
    Ok(from_custom_source(p, bounds, Arc::new(RangeOps)))
}

#[cfg(test)]
mod tests {
    use super::StepRange;

    #[test]
    fn lengths() {
        assert_eq!(StepRange::new(0, 10, 1).len, 10);
        assert_eq!(StepRange::new(0, 10, 3).len, 4);
        assert_eq!(StepRange::new(10, 0, 1).len, 0);
        assert_eq!(StepRange::new(10, 0, -5).len, 2);
        assert_eq!(StepRange::new(i64::MIN, i64::MAX, i64::MAX).len, 3);
    }

    #[test]
    fn values_stop_at_len() {
        let r = StepRange::new(1, 4, 1);
        assert_eq!(r.value(2), Some(3));
        assert_eq!(r.value(3), None);
    }
}
