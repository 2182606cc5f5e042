//! Failing and panicking workers abort the whole run with the first error.

use anyhow::Result;
use ironpipe::testing::*;
use ironpipe::*;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn panics_at_three(p: &Pipeline) -> Pipe<i32> {
    from_iter(p, 0..10).map(|v: &i32| {
        assert!(*v != 3, "boom at {v}");
        *v
    })
}

fn panicked_index(err: &anyhow::Error) -> Option<usize> {
    match err.downcast_ref::<PipeError>() {
        Some(PipeError::WorkerPanicked { index, .. }) => Some(*index),
        _ => None,
    }
}

#[test]
fn ordered_run_reports_panicking_index() {
    let p = TestPipeline::with_threads(4);
    let err = panics_at_three(&p).collect_par().expect_err("worker 3 panics");
    assert_eq!(panicked_index(&err), Some(3));
    assert!(err.to_string().contains("boom at 3"), "{err}");
}

#[test]
fn unordered_run_reports_panicking_index() {
    let p = TestPipeline::with_threads(4);
    let err = panics_at_three(&p)
        .reduce_par_unordered(0, |acc, v| acc + v)
        .expect_err("worker 3 panics");
    assert_eq!(panicked_index(&err), Some(3));
}

#[test]
fn single_thread_pool_survives_a_panic() -> Result<()> {
    let p = TestPipeline::with_threads(1);
    let err = panics_at_three(&p).collect_par().expect_err("worker 3 panics");
    assert_eq!(panicked_index(&err), Some(3));

    // The pool is still usable afterwards.
    let ok = from_iter(&p, 0..5).collect_par()?;
    assert_collections_equal(&ok, &[0, 1, 2, 3, 4]);
    Ok(())
}

#[test]
fn panicking_callback_in_ordered_for_each() {
    let p = TestPipeline::with_threads(2);
    let mut committed = Vec::new();
    let err = from_iter(&p, 0..8)
        .for_each_par(|v, _| {
            assert!(v != 5, "callback refused {v}");
            committed.push(v);
        })
        .expect_err("callback panics");
    assert_eq!(panicked_index(&err), Some(5));
    // Everything before the failing index was committed, in order.
    assert_collections_equal(&committed, &[0, 1, 2, 3, 4]);
}

#[test]
fn sequential_panics_propagate() {
    let p = TestPipeline::new();
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| panics_at_three(&p).collect_seq()));
    assert!(result.is_err(), "sequential mode does not catch panics");
}

#[test]
fn type_errors_abort_parallel_runs() {
    let p = TestPipeline::with_threads(3);
    let values = from_vec(&p, vec![serde_json::json!({ "id": 1 }), serde_json::json!(7)]);
    let ids = values
        .map_fn::<u64>(ironpipe::contract::BoundFn::capability(
            ironpipe::contract::Capability::new("HasId", &["id"]),
            |v| v["id"].as_u64().unwrap_or(0),
        ))
        .expect("untyped elements bind");
    let err = ids.collect_par().expect_err("second element has no id");
    assert!(matches!(
        err.downcast_ref::<PipeError>(),
        Some(PipeError::TypeMismatch { .. })
    ));
}

#[test]
fn stopped_ordered_run_skips_remaining_work() -> Result<()> {
    let p = TestPipeline::with_threads(2);
    let evaluated = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evaluated);
    let failing = from_iter(&p, 0..10_000).map(move |v: &i32| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert!(*v != 0, "first element fails");
        *v
    });
    assert!(failing.collect_par().is_err());
    // Workers that start after the failure see the poisoned barrier.
    assert!(evaluated.load(Ordering::SeqCst) < 10_000);
    Ok(())
}

#[test]
fn early_failure_aborts_in_linear_time() -> Result<()> {
    const N: i32 = 10_000;
    let p = TestPipeline::with_threads(2);

    let started = Instant::now();
    let ok = from_iter(&p, 0..N).map(|v: &i32| *v).collect_par()?;
    let ok_elapsed = started.elapsed();
    assert_eq!(ok.len(), 10_000);

    let failing = from_iter(&p, 0..N).map(|v: &i32| {
        assert!(*v != 0, "first element fails");
        *v
    });
    let started = Instant::now();
    let err = failing.collect_par().expect_err("index 0 panics");
    let failed_elapsed = started.elapsed();
    assert_eq!(panicked_index(&err), Some(0));

    // Released workers must not each wake every slot again.
    assert!(
        failed_elapsed < ok_elapsed * 20 + Duration::from_secs(2),
        "failed run took {failed_elapsed:?}, successful run {ok_elapsed:?}"
    );
    Ok(())
}

#[test]
fn panicking_comparator_is_reported_in_parallel_runs() {
    let p = TestPipeline::with_threads(2);
    let sorted = from_iter(&p, 0..50).sort(|a: &i32, b: &i32| {
        assert!(*a != 7 && *b != 7, "cannot compare 7");
        a < b
    });
    let err = sorted.collect_par().expect_err("comparator panics");
    match err.downcast_ref::<PipeError>() {
        Some(PipeError::ReshapePanicked { reshape, message, .. }) => {
            assert_eq!(*reshape, "Sort");
            assert!(message.contains("cannot compare 7"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(sorted.reduce_par_unordered(0, |a, v| a + v).is_err());

    let seq = std::panic::catch_unwind(AssertUnwindSafe(|| sorted.collect_seq()));
    assert!(seq.is_err(), "sequential mode does not catch panics");
}

#[test]
fn errors_render_with_context() {
    let err: anyhow::Error = PipeError::WorkerPanicked {
        index: 2,
        message: "oops".into(),
    }
    .into();
    assert_eq!(err.to_string(), "worker for element 2 panicked: oops");

    let err: anyhow::Error = PipeError::InvalidRange { start: 0, stop: 3, step: 0 }.into();
    assert!(err.to_string().contains("step must be non-zero"));
}
