//! Test data builders.

use std::ops::RangeInclusive;

/// A fluent builder for test inputs.
///
/// ```
/// use ironpipe::testing::TestDataBuilder;
///
/// let data = TestDataBuilder::new()
///     .add_range(1..=10)
///     .add_value(100)
///     .add_repeated(42, 5)
///     .build();
///
/// assert_eq!(data.len(), 16);
/// ```
#[derive(Default)]
pub struct TestDataBuilder<T> {
    data: Vec<T>,
}

impl<T> TestDataBuilder<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    #[must_use]
    pub fn add_value(mut self, value: T) -> Self {
        self.data.push(value);
        self
    }

    #[must_use]
    pub fn add_values(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.data.extend(values);
        self
    }

    /// Append `count` copies of `value`.
    #[must_use]
    pub fn add_repeated(mut self, value: T, count: usize) -> Self
    where
        T: Clone,
    {
        self.data.extend(std::iter::repeat_n(value, count));
        self
    }

    /// Append `f(i)` for every `i` in `0..count`.
    #[must_use]
    pub fn add_generated(mut self, count: usize, f: impl Fn(usize) -> T) -> Self {
        self.data.extend((0..count).map(f));
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<T> {
        self.data
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: From<i32>> TestDataBuilder<T> {
    /// Append every value of an inclusive `i32` range.
    ///
    /// ```
    /// use ironpipe::testing::TestDataBuilder;
    ///
    /// let data = TestDataBuilder::<i64>::new().add_range(1..=5).build();
    /// assert_eq!(data, vec![1, 2, 3, 4, 5]);
    /// ```
    #[must_use]
    pub fn add_range(mut self, range: RangeInclusive<i32>) -> Self {
        self.data.extend(range.map(T::from));
        self
    }
}

/// Reproducible pseudo-random values in `[min, max)`.
///
/// A fixed-seed linear congruential generator, so the same call always yields the
/// same data.
///
/// ```
/// use ironpipe::testing::pseudo_random_data;
///
/// let data = pseudo_random_data(10, 0, 100);
/// assert_eq!(data, pseudo_random_data(10, 0, 100));
/// assert!(data.iter().all(|v| (0..100).contains(v)));
/// ```
#[must_use]
pub fn pseudo_random_data(count: usize, min: i32, max: i32) -> Vec<i32> {
    let span = i64::from(max) - i64::from(min);
    if span <= 0 {
        return vec![min; count];
    }
    let mut seed: u32 = 12345;
    (0..count)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let offset = i64::from(seed >> 16) % span;
            i32::try_from(i64::from(min) + offset).unwrap_or(min)
        })
        .collect()
}
