//! Stage chain construction and sequential evaluation.

use anyhow::Result;
use ironpipe::testing::*;
use ironpipe::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn map_to_strings() -> Result<()> {
    let p = TestPipeline::new();
    let out = from_vec(&p, vec![1, 2, 3])
        .map(|i: &i32| format!("#{i}"))
        .collect_seq()?;
    assert_collections_equal(&out, &["#1".to_string(), "#2".to_string(), "#3".to_string()]);
    Ok(())
}

#[test]
fn pass_through_is_identity() -> Result<()> {
    let p = TestPipeline::new();
    let out = from_vec(&p, vec![1, 2, 3]).pass_through().collect_seq()?;
    assert_collections_equal(&out, &[1, 2, 3]);
    Ok(())
}

#[test]
fn filter_then_map() -> Result<()> {
    let p = TestPipeline::new();
    let out = from_iter(&p, 1..=10)
        .filter(|v: &i32| v % 3 == 0)
        .map(|v: &i32| v * v)
        .collect_seq()?;
    assert_collections_equal(&out, &[9, 36, 81]);
    Ok(())
}

#[test]
fn stage_order_matters() -> Result<()> {
    let p = TestPipeline::new();
    let src = from_vec(&p, vec![1, 2, 3, 4]);

    // Filter sees the original values.
    let filter_first = src
        .clone()
        .filter(|v: &i32| *v > 2)
        .map(|v: &i32| v * 10)
        .collect_seq()?;
    assert_collections_equal(&filter_first, &[30, 40]);

    // Filter sees the mapped values.
    let map_first = src
        .map(|v: &i32| v * 10)
        .filter(|v: &i32| *v > 25)
        .collect_seq()?;
    assert_collections_equal(&map_first, &[30, 40]);

    let p = TestPipeline::new();
    let src = from_vec(&p, vec![1, 2, 3, 4]);
    let a = src.clone().map(|v: &i32| v + 10).filter(|v: &i32| *v < 13).collect_seq()?;
    let b = src.filter(|v: &i32| *v < 13).map(|v: &i32| v + 10).collect_seq()?;
    assert_collections_equal(&a, &[11, 12]);
    assert_collections_equal(&b, &[11, 12, 13, 14]);
    Ok(())
}

#[test]
fn construction_is_lazy() -> Result<()> {
    let p = TestPipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let chain = from_vec(&p, vec![1, 2, 3]).map(move |v: &i32| {
        seen.fetch_add(1, Ordering::SeqCst);
        v + 1
    });
    let chain = chain.filter(|v: &i32| *v > 0).reverse();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_collections_equal(&chain.collect_seq()?, &[4, 3, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn rejected_elements_skip_later_stages() -> Result<()> {
    let p = TestPipeline::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let out = from_iter(&p, 0..10)
        .filter(|v: &i32| v % 2 == 0)
        .map(move |v: &i32| {
            seen.fetch_add(1, Ordering::SeqCst);
            *v
        })
        .collect_seq()?;
    assert_eq!(out.len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    Ok(())
}

#[test]
fn chains_are_immutable_and_shareable() -> Result<()> {
    let p = TestPipeline::new();
    let base = from_vec(&p, vec![1, 2, 3, 4]);
    let evens = base.clone().filter(|v: &i32| v % 2 == 0);
    let odds = base.clone().filter(|v: &i32| v % 2 == 1);

    assert_collections_equal(&base.collect_seq()?, &[1, 2, 3, 4]);
    assert_collections_equal(&evens.collect_seq()?, &[2, 4]);
    assert_collections_equal(&odds.collect_seq()?, &[1, 3]);
    // A chain can be evaluated again, in any mode.
    assert_collections_equal(&evens.collect_par()?, &[2, 4]);
    Ok(())
}

#[test]
fn empty_source() -> Result<()> {
    let p = TestPipeline::new();
    let empty = from_vec(&p, Vec::<u8>::new()).map(|v: &u8| v + 1);
    assert!(empty.collect_seq()?.is_empty());
    assert!(empty.collect_par()?.is_empty());
    assert_eq!(empty.reduce_par(7u8, |a, v| a + v)?, 7);
    Ok(())
}

#[test]
fn long_chains_do_not_recurse() -> Result<()> {
    let p = TestPipeline::new();
    let mut chain = from_vec(&p, vec![0u64, 1, 2]);
    for _ in 0..20_000 {
        chain = chain.map(|v: &u64| v + 1);
    }
    assert_collections_equal(&chain.collect_seq()?, &[20_000, 20_001, 20_002]);
    drop(chain);
    Ok(())
}

#[test]
fn dropping_long_shared_chains() -> Result<()> {
    let p = TestPipeline::new();
    let mut base = from_vec(&p, vec![3u64, 1, 2]);
    for i in 0..20_000 {
        base = if i % 1000 == 0 {
            base.reverse()
        } else {
            base.map(|v: &u64| v + 1)
        };
    }
    let mut branch = base.clone();
    for _ in 0..20_000 {
        branch = branch.filter(|_: &u64| true);
    }
    // The branch unlinks down to the shared part and stops there.
    drop(branch);
    assert_eq!(base.collect_seq()?.len(), 3);
    drop(base);
    Ok(())
}

#[test]
fn out_tag_tracks_last_stage() {
    let p = TestPipeline::new();
    let strings = from_vec(&p, vec![1u32]).map(|v: &u32| v.to_string());
    assert!(strings.out_tag().is::<String>());
}
