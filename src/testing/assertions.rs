//! Assertion functions for testing terminal outputs.

use crate::{Pipe, PipeBound};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::{BuildHasher, Hash};

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// ```
/// use ironpipe::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two collections hold the same elements, ignoring order.
///
/// Duplicates count: `[1, 1, 2]` and `[1, 2, 2]` are not equal.
///
/// # Panics
///
/// Panics if the element multisets differ.
///
/// ```
/// use ironpipe::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 2], &[1, 2, 3]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    fn count<T: Eq + Hash>(items: &[T]) -> HashMap<&T, usize> {
        let mut counts: HashMap<&T, usize> = HashMap::new();
        for item in items {
            *counts.entry(item).or_insert(0) += 1;
        }
        counts
    }

    let (actual_counts, expected_counts) = (count(actual), count(expected));
    if actual_counts != expected_counts {
        let keys: HashSet<&T> = actual_counts.keys().chain(expected_counts.keys()).copied().collect();
        let diff: Vec<_> = keys
            .into_iter()
            .filter_map(|k| {
                let (a, e) = (
                    actual_counts.get(k).copied().unwrap_or(0),
                    expected_counts.get(k).copied().unwrap_or(0),
                );
                (a != e).then_some((k, e, a))
            })
            .collect();
        panic!(
            "Collection content mismatch (element, expected count, actual count): {diff:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert that two maps are equal.
///
/// # Panics
///
/// Panics if the maps differ in keys or values.
pub fn assert_maps_equal<K, V, S: BuildHasher>(
    actual: &HashMap<K, V, S>,
    expected: &HashMap<K, V, S>,
) where
    K: Debug + Eq + Hash,
    V: Debug + PartialEq,
{
    assert_eq!(
        actual.len(),
        expected.len(),
        "HashMap size mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (key, expected_value) in expected {
        match actual.get(key) {
            Some(actual_value) => assert_eq!(
                actual_value, expected_value,
                "HashMap value mismatch for key {key:?}"
            ),
            None => panic!("HashMap missing key: {key:?}"),
        }
    }
}

/// Assert that a grouped map matches `expected`, including the order of every
/// per-key list.
///
/// # Panics
///
/// Panics on a missing or extra key, or on a list that differs in content or order.
///
/// ```
/// use ironpipe::testing::assert_grouped_map_equal;
/// use std::collections::HashMap;
///
/// let actual = HashMap::from([("odd", vec![5, 3, 1]), ("even", vec![4, 2])]);
/// assert_grouped_map_equal(&actual, &[("even", vec![4, 2]), ("odd", vec![5, 3, 1])]);
/// ```
pub fn assert_grouped_map_equal<K, V, S: BuildHasher>(
    actual: &HashMap<K, Vec<V>, S>,
    expected: &[(K, Vec<V>)],
) where
    K: Debug + Eq + Hash,
    V: Debug + PartialEq,
{
    assert_eq!(
        actual.len(),
        expected.len(),
        "Grouped map key count mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (key, values) in expected {
        let Some(found) = actual.get(key) else {
            panic!("Grouped map missing key {key:?}\n  Actual: {actual:?}");
        };
        assert_eq!(
            found, values,
            "Grouped map list mismatch for key {key:?} (order matters)"
        );
    }
}

/// Assert that sequential and ordered-parallel collection of `pipe` are identical.
///
/// # Panics
///
/// Panics if either evaluation fails or the outputs differ.
///
/// ```
/// use ironpipe::*;
/// use ironpipe::testing::assert_modes_agree;
///
/// let p = Pipeline::default();
/// assert_modes_agree(&from_vec(&p, vec![3, 1, 2]).map(|x: &i32| x * 10).reverse());
/// ```
pub fn assert_modes_agree<T: PipeBound + Debug + PartialEq>(pipe: &Pipe<T>) {
    let seq = match pipe.collect_seq() {
        Ok(v) => v,
        Err(err) => panic!("sequential evaluation failed: {err:#}"),
    };
    let par = match pipe.collect_par() {
        Ok(v) => v,
        Err(err) => panic!("ordered parallel evaluation failed: {err:#}"),
    };
    assert_collections_equal(&par, &seq);
}

/// Assert that all elements satisfy a predicate.
///
/// # Panics
///
/// Panics with the first failing element.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    if let Some((i, item)) = collection.iter().enumerate().find(|(_, x)| !predicate(x)) {
        panic!("Element at index {i} does not satisfy predicate: {item:?}");
    }
}
