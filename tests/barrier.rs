//! The ordering barrier in isolation.

use anyhow::Result;
use ironpipe::barrier::OrderingBarrier;
use ironpipe::PipeError;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

#[test]
fn commits_in_index_order() -> Result<()> {
    let barrier = OrderingBarrier::new(16);
    let order = Mutex::new(Vec::new());
    thread::scope(|s| {
        for i in (0..16).rev() {
            let (barrier, order) = (&barrier, &order);
            s.spawn(move || {
                // Later indices finish their "work" first.
                thread::sleep(Duration::from_millis(16 - i as u64));
                if barrier.wait_turn(i).is_ok() {
                    if let Ok(mut order) = order.lock() {
                        order.push(i);
                    }
                    barrier.done(i);
                }
            });
        }
    });
    barrier.wait_for_completion()?;
    let order = order.into_inner().map_err(|_| PipeError::LockPoisoned)?;
    assert_eq!(order, (0..16).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn first_index_never_waits() -> Result<()> {
    let barrier = OrderingBarrier::new(2);
    barrier.wait_turn(0)?;
    assert!(barrier.done(0));
    barrier.wait_turn(1)?;
    assert!(barrier.done(1));
    barrier.wait_for_completion()?;
    Ok(())
}

#[test]
fn slots_are_single_use() {
    let barrier = OrderingBarrier::new(3);
    assert!(barrier.done(1));
    assert!(!barrier.done(1));
    assert!(!barrier.done(3), "out-of-range slot");
}

#[test]
fn out_of_range_wait_returns_immediately() -> Result<()> {
    let barrier = OrderingBarrier::new(1);
    barrier.wait(5)?;
    Ok(())
}

#[test]
fn zero_length_is_already_complete() -> Result<()> {
    let barrier = OrderingBarrier::new(0);
    assert!(barrier.is_empty());
    barrier.wait_for_completion()?;
    Ok(())
}

#[test]
fn completion_fires_on_last_slot() -> Result<()> {
    let barrier = OrderingBarrier::new(3);
    assert_eq!(barrier.len(), 3);
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            for i in 0..3 {
                barrier.done(i);
            }
        });
        barrier.wait_for_completion()
    })?;
    // Closed: further signals are ignored.
    assert!(!barrier.done(0));
    Ok(())
}

#[test]
fn poison_releases_every_waiter() {
    let barrier = OrderingBarrier::new(8);
    let released = thread::scope(|s| {
        let waiters: Vec<_> = (1..8)
            .map(|i| {
                let barrier = &barrier;
                s.spawn(move || barrier.wait_turn(i))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        barrier.poison(anyhow::anyhow!("worker 0 failed"));
        waiters
            .into_iter()
            .map(|h| h.join().unwrap_or(Ok(())))
            .collect::<Vec<_>>()
    });
    assert_eq!(released.len(), 7);
    for result in released {
        assert!(matches!(result, Err(PipeError::BarrierPoisoned)));
    }
    assert!(barrier.is_poisoned());
}

#[test]
fn first_failure_is_reported() {
    let barrier = OrderingBarrier::new(2);
    barrier.poison(anyhow::anyhow!("first"));
    barrier.poison(anyhow::anyhow!("second"));
    let err = barrier.wait_for_completion().expect_err("poisoned");
    assert_eq!(err.to_string(), "first");
}

#[test]
fn signaled_slots_survive_poisoning() -> Result<()> {
    let barrier = OrderingBarrier::new(3);
    assert!(barrier.done(0));
    barrier.poison(anyhow::anyhow!("late failure"));
    // Index 1 was allowed to commit before the failure.
    barrier.wait_turn(1)?;
    assert!(matches!(barrier.wait_turn(2), Err(PipeError::BarrierPoisoned)));
    Ok(())
}
