use anyhow::Result;
use ironpipe::testing::*;
use ironpipe::*;
use std::collections::HashMap;

#[test]
fn builder_composes_inputs() -> Result<()> {
    let data = TestDataBuilder::<i32>::new()
        .add_range(1..=3)
        .add_value(10)
        .add_values([20, 30])
        .add_repeated(7, 2)
        .add_generated(3, |i| i32::try_from(i * 100).unwrap_or(0))
        .build();
    assert_collections_equal(&data, &[1, 2, 3, 10, 20, 30, 7, 7, 0, 100, 200]);

    let p = TestPipeline::new();
    let total = from_vec(&p, data).reduce_par(0, |a, v| a + v)?;
    assert_eq!(total, 380);
    Ok(())
}

#[test]
fn builder_len() {
    let builder = TestDataBuilder::<String>::new();
    assert!(builder.is_empty());
    let builder = builder.add_value("x".to_string());
    assert_eq!(builder.len(), 1);
}

#[test]
fn pseudo_random_is_reproducible_and_bounded() {
    let a = pseudo_random_data(200, -5, 5);
    assert_eq!(a, pseudo_random_data(200, -5, 5));
    assert_all(&a, |v| (-5..5).contains(v));
    assert_eq!(pseudo_random_data(3, 4, 4), vec![4, 4, 4]);
}

#[test]
fn unordered_equality_counts_duplicates() {
    assert_collections_unordered_equal(&[1, 2, 2, 3], &[2, 3, 2, 1]);
    let mismatch = std::panic::catch_unwind(|| {
        assert_collections_unordered_equal(&[1, 1, 2], &[1, 2, 2]);
    });
    assert!(mismatch.is_err());
}

#[test]
#[should_panic(expected = "Collection mismatch at index 1")]
fn ordered_equality_reports_index() {
    assert_collections_equal(&[1, 2, 3], &[1, 3, 2]);
}

#[test]
#[should_panic(expected = "order matters")]
fn grouped_map_checks_list_order() {
    let actual = HashMap::from([("k", vec![1, 2])]);
    assert_grouped_map_equal(&actual, &[("k", vec![2, 1])]);
}

#[test]
#[should_panic(expected = "HashMap missing key")]
fn maps_equal_detects_missing_key() {
    let actual = HashMap::from([("a", 1), ("c", 3)]);
    let expected = HashMap::from([("a", 1), ("b", 2)]);
    assert_maps_equal(&actual, &expected);
}

#[test]
fn small_test_pipelines() -> Result<()> {
    let p = TestPipeline::with_threads(2);
    assert_eq!(p.options().threads, Some(2));
    assert_eq!(p.options().name.as_deref(), Some("test"));
    let pipeline: &Pipeline = p.as_ref();
    assert_eq!(pipeline.stage_count(), 0);
    assert_modes_agree(&from_iter(&p, 0..50).map(|v: &i32| v * 3));
    Ok(())
}
