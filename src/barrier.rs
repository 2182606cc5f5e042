//! Index-ordering barrier for concurrent workers.
//!
//! An [`OrderingBarrier`] has `N` single-use slots and one completion signal. Worker
//! `i` computes whatever it likes concurrently, then brackets its side effect with
//! [`wait_turn(i)`](OrderingBarrier::wait_turn) and [`done(i)`](OrderingBarrier::done).
//! Because slot `i` can only be signaled after slot `i - 1`, the side effects run in
//! strictly increasing index order no matter in which order the workers finish.
//!
//! Signaling the last slot fires the completion signal. A failing worker calls
//! [`poison`](OrderingBarrier::poison) instead of `done`; every current and future
//! waiter is released with [`PipeError::BarrierPoisoned`] and
//! [`wait_for_completion`](OrderingBarrier::wait_for_completion) returns the first
//! error that was recorded.
//!
//! ```
//! use ironpipe::barrier::OrderingBarrier;
//! use std::sync::Mutex;
//!
//! let barrier = OrderingBarrier::new(4);
//! let order = Mutex::new(Vec::new());
//! std::thread::scope(|s| {
//!     for i in (0..4).rev() {
//!         let (barrier, order) = (&barrier, &order);
//!         s.spawn(move || {
//!             barrier.wait_turn(i).unwrap();
//!             order.lock().unwrap().push(i);
//!             barrier.done(i);
//!         });
//!     }
//! });
//! barrier.wait_for_completion().unwrap();
//! assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
//! ```

use crate::error::PipeError;
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

pub struct OrderingBarrier {
    state: Mutex<BarrierState>,
    slots: Vec<Condvar>,
    completion: Condvar,
}

struct BarrierState {
    signaled: Vec<bool>,
    completed: bool,
    closed: bool,
    poisoned: bool,
    failure: Option<anyhow::Error>,
}

impl OrderingBarrier {
    /// Create a barrier with `len` slots. A zero-length barrier is complete immediately.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                signaled: vec![false; len],
                completed: len == 0,
                closed: false,
                poisoned: false,
                failure: None,
            }),
            slots: (0..len).map(|_| Condvar::new()).collect(),
            completion: Condvar::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BarrierState>, PipeError> {
        self.state.lock().map_err(|_| PipeError::LockPoisoned)
    }

    /// Block until `slot` has been signaled. Slots past the end are treated as
    /// already signaled.
    ///
    /// # Errors
    /// [`PipeError::BarrierPoisoned`] if a worker failed before the slot was signaled.
    pub fn wait(&self, slot: usize) -> Result<(), PipeError> {
        let Some(cond) = self.slots.get(slot) else {
            return Ok(());
        };
        let guard = self.lock()?;
        let guard = cond
            .wait_while(guard, |s| !s.signaled[slot] && !s.poisoned)
            .map_err(|_| PipeError::LockPoisoned)?;
        if guard.signaled[slot] {
            Ok(())
        } else {
            Err(PipeError::BarrierPoisoned)
        }
    }

    /// Block until every index before `index` has committed. Index `0` never waits.
    ///
    /// # Errors
    /// See [`wait`](Self::wait).
    pub fn wait_turn(&self, index: usize) -> Result<(), PipeError> {
        match index.checked_sub(1) {
            Some(prev) => self.wait(prev),
            None => Ok(()),
        }
    }

    /// Signal `slot`. Returns `false` if the slot was already signaled, is out of
    /// range, or the barrier has been closed.
    pub fn done(&self, slot: usize) -> bool {
        let Ok(mut state) = self.lock() else {
            return false;
        };
        if state.closed || slot >= state.signaled.len() || state.signaled[slot] {
            return false;
        }
        state.signaled[slot] = true;
        trace!(slot, "barrier slot signaled");
        self.slots[slot].notify_all();
        if slot + 1 == self.slots.len() {
            state.completed = true;
            self.completion.notify_all();
        }
        true
    }

    /// Record a failure and release every waiter. Only the first failure is kept.
    pub fn poison(&self, err: anyhow::Error) {
        let Ok(mut state) = self.lock() else {
            return;
        };
        if state.poisoned {
            return;
        }
        debug!(error = %err, "ordering barrier poisoned");
        state.failure = Some(err);
        state.poisoned = true;
        drop(state);
        for cond in &self.slots {
            cond.notify_all();
        }
        self.completion.notify_all();
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.lock().map(|s| s.poisoned).unwrap_or(true)
    }

    /// Block until the last slot is signaled (or the barrier is poisoned), then
    /// close the barrier. Closed slots ignore further signals.
    ///
    /// # Errors
    /// Returns the first failure passed to [`poison`](Self::poison).
    pub fn wait_for_completion(&self) -> anyhow::Result<()> {
        let guard = self.lock()?;
        let mut state = self
            .completion
            .wait_while(guard, |s| !s.completed && !s.poisoned)
            .map_err(|_| PipeError::LockPoisoned)?;
        state.closed = true;
        if state.poisoned {
            return Err(state
                .failure
                .take()
                .unwrap_or_else(|| PipeError::BarrierPoisoned.into()));
        }
        Ok(())
    }
}
