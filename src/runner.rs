use crate::barrier::OrderingBarrier;
use crate::collection::{Pipe, PipeBound};
use crate::error::PipeError;
use crate::node::{DynOp, Node};
use crate::planner::{Plan, SegmentHead};
use crate::type_token::{take_elem, Element, SourceOps};
use anyhow::Result;
use rayon::ThreadPool;
use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

#[cfg(feature = "metrics")]
use crate::metrics::MetricsCollector;

/// Evaluation discipline for a terminal operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// One index after another on the calling thread.
    #[default]
    Sequential,
    /// One task per index; combine steps run in index order through an
    /// [`OrderingBarrier`]. Same result as `Sequential`.
    ParallelOrdered,
    /// One task per index; combine steps run under a lock in completion order.
    /// Only correct for commutative, associative combines.
    ParallelUnordered,
}

/// Executes a planned chain in one [`ExecMode`].
///
/// Every terminal is a pair of closures: `prepare` runs on the worker for each kept
/// element (the parallel part), `combine` folds the prepared value into the
/// accumulator (the serialized part). `combine` may return
/// [`ControlFlow::Break`] to stop early.
pub struct Runner {
    pub mode: ExecMode,
    pub(crate) pool: Option<Arc<ThreadPool>>,
    pub(crate) name: Option<String>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<MetricsCollector>,
}

/// The readable input of one segment.
pub(crate) enum Input {
    Source {
        payload: Arc<dyn Any + Send + Sync>,
        ops: Arc<dyn SourceOps>,
        len: usize,
    },
    Materialized(Vec<Element>),
}

impl Input {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Source { len, .. } => *len,
            Self::Materialized(rows) => rows.len(),
        }
    }

    fn get(&self, index: usize) -> Option<Element> {
        match self {
            Self::Source { payload, ops, .. } => ops.get(&**payload, index),
            Self::Materialized(rows) => rows.get(index).cloned(),
        }
    }
}

/// Sequential evaluator: read element `index` and push it through `stages`.
///
/// Returns `Ok(None)` as soon as a filter drops the element; later stages are
/// never invoked for it.
pub(crate) fn evaluate(
    input: &Input,
    stages: &[Arc<dyn DynOp>],
    index: usize,
) -> Result<Option<Element>, PipeError> {
    let mut current = input.get(index).ok_or_else(|| {
        PipeError::MissingSource(format!("source has no element at index {index}"))
    })?;
    for op in stages {
        match op.apply(current)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `work` for one index, turning a panic into [`PipeError::WorkerPanicked`].
fn guarded<F: FnOnce() -> Result<()>>(index: usize, work: F) -> Result<()> {
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(PipeError::WorkerPanicked {
            index,
            message: panic_message(payload.as_ref()),
        }
        .into()),
    }
}

impl Runner {
    /// Evaluate `pipe` with this runner's mode.
    ///
    /// `prepare` receives the source index of the element within the final
    /// segment and the typed element.
    ///
    /// # Errors
    /// The first failure from a stage, `prepare`, `combine`, or a panicking worker.
    pub fn run<T, P, A, Prep, Comb>(
        &self,
        pipe: &Pipe<T>,
        init: A,
        prepare: Prep,
        combine: Comb,
    ) -> Result<A>
    where
        T: PipeBound,
        A: Send,
        Prep: Fn(usize, T) -> Result<P> + Sync,
        Comb: Fn(&mut A, P) -> Result<ControlFlow<()>> + Sync,
    {
        let typed = |index: usize, element: Element| -> Result<P> {
            prepare(index, take_elem::<T>(element, "terminal")?)
        };
        self.run_erased(&pipe.head, init, typed, combine)
    }

    pub(crate) fn run_erased<P, A, Prep, Comb>(
        &self,
        head: &Arc<Node>,
        init: A,
        prepare: Prep,
        combine: Comb,
    ) -> Result<A>
    where
        A: Send,
        Prep: Fn(usize, Element) -> Result<P> + Sync,
        Comb: Fn(&mut A, P) -> Result<ControlFlow<()>> + Sync,
    {
        let plan = Plan::build(head);
        debug!(
            pipeline = self.name.as_deref().unwrap_or("pipeline"),
            mode = ?self.mode,
            segments = plan.segments.len(),
            stages = plan.stage_count(),
            "running terminal"
        );

        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_start();
            m.increment_counter("runs", 1);
        }

        let emitted = AtomicU64::new(0);
        let counted = |index: usize, element: Element| {
            emitted.fetch_add(1, Ordering::Relaxed);
            prepare(index, element)
        };

        let mut upstream: Option<Vec<Element>> = None;
        let mut result = None;
        let last = plan.segments.len().saturating_sub(1);
        let mut init = Some(init);
        for (n, segment) in plan.segments.iter().enumerate() {
            let input = self.resolve(&segment.head, upstream.take())?;
            self.record_read(input.len());
            let stages = segment.ops();
            if n == last {
                if let Some(init) = init.take() {
                    result = Some(self.run_segment(
                        self.mode, &input, &stages, init, &counted, &combine,
                    )?);
                }
            } else {
                upstream = Some(self.materialize(&input, &stages)?);
            }
        }

        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.increment_counter("elements_emitted", emitted.load(Ordering::Relaxed));
            m.record_end();
        }

        result.ok_or_else(|| PipeError::MissingSource("chain has no source segment".into()).into())
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables, clippy::unused_self))]
    fn record_read(&self, count: usize) {
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.increment_counter("elements_read", count as u64);
        }
    }

    fn resolve(&self, head: &SegmentHead, upstream: Option<Vec<Element>>) -> Result<Input> {
        match head {
            SegmentHead::Source {
                id,
                payload,
                source_ops,
                elem_tag,
            } => {
                let len = source_ops.len(&**payload).ok_or_else(|| {
                    PipeError::MissingSource(format!(
                        "stage {id}: payload is not a readable {elem_tag} source"
                    ))
                })?;
                Ok(Input::Source {
                    payload: Arc::clone(payload),
                    ops: Arc::clone(source_ops),
                    len,
                })
            }
            SegmentHead::Reshape { id, op, .. } => {
                let rows = upstream.ok_or_else(|| {
                    PipeError::MissingSource(format!("reshape {id} has no upstream input"))
                })?;
                trace!(stage = %id, reshape = op.name(), rows = rows.len(), "applying reshape");
                if self.mode == ExecMode::Sequential {
                    return Ok(Input::Materialized(op.apply(rows)?));
                }
                match catch_unwind(AssertUnwindSafe(|| op.apply(rows))) {
                    Ok(rows) => Ok(Input::Materialized(rows?)),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        warn!(stage = %id, reshape = op.name(), %message, "reshape panicked");
                        Err(PipeError::ReshapePanicked {
                            stage: id.to_string(),
                            reshape: op.name(),
                            message,
                        }
                        .into())
                    }
                }
            }
        }
    }

    /// Collect a segment in source order, in parallel unless this runner is sequential.
    fn materialize(&self, input: &Input, stages: &[Arc<dyn DynOp>]) -> Result<Vec<Element>> {
        let mode = match self.mode {
            ExecMode::Sequential => ExecMode::Sequential,
            ExecMode::ParallelOrdered | ExecMode::ParallelUnordered => ExecMode::ParallelOrdered,
        };
        self.run_segment(
            mode,
            input,
            stages,
            Vec::with_capacity(input.len()),
            &|_: usize, element: Element| -> Result<Element> { Ok(element) },
            &|rows: &mut Vec<Element>, element: Element| -> Result<ControlFlow<()>> {
                rows.push(element);
                Ok(ControlFlow::Continue(()))
            },
        )
    }

    fn run_segment<P, A, Prep, Comb>(
        &self,
        mode: ExecMode,
        input: &Input,
        stages: &[Arc<dyn DynOp>],
        init: A,
        prepare: &Prep,
        combine: &Comb,
    ) -> Result<A>
    where
        A: Send,
        Prep: Fn(usize, Element) -> Result<P> + Sync,
        Comb: Fn(&mut A, P) -> Result<ControlFlow<()>> + Sync,
    {
        match mode {
            ExecMode::Sequential => run_sequential(input, stages, init, prepare, combine),
            ExecMode::ParallelOrdered => {
                self.install(|| run_ordered(input, stages, init, prepare, combine))
            }
            ExecMode::ParallelUnordered => {
                self.install(|| run_unordered(input, stages, init, prepare, combine))
            }
        }
    }

    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

fn run_sequential<P, A, Prep, Comb>(
    input: &Input,
    stages: &[Arc<dyn DynOp>],
    mut acc: A,
    prepare: &Prep,
    combine: &Comb,
) -> Result<A>
where
    Prep: Fn(usize, Element) -> Result<P>,
    Comb: Fn(&mut A, P) -> Result<ControlFlow<()>>,
{
    for index in 0..input.len() {
        if let Some(element) = evaluate(input, stages, index)? {
            let prepared = prepare(index, element)?;
            if combine(&mut acc, prepared)?.is_break() {
                trace!(index, "sequential run stopped early");
                break;
            }
        }
    }
    Ok(acc)
}

/// Ordered parallel evaluator.
///
/// Tasks are spawned FIFO, so they start in index order; a task blocked in
/// `wait_turn` only ever waits on tasks that have already started.
fn run_ordered<P, A, Prep, Comb>(
    input: &Input,
    stages: &[Arc<dyn DynOp>],
    init: A,
    prepare: &Prep,
    combine: &Comb,
) -> Result<A>
where
    A: Send,
    Prep: Fn(usize, Element) -> Result<P> + Sync,
    Comb: Fn(&mut A, P) -> Result<ControlFlow<()>> + Sync,
{
    let len = input.len();
    let barrier = OrderingBarrier::new(len);
    let acc = Mutex::new(init);
    let stopped = AtomicBool::new(false);

    rayon::scope_fifo(|scope| {
        for index in 0..len {
            let (barrier, acc, stopped) = (&barrier, &acc, &stopped);
            scope.spawn_fifo(move |_| {
                let outcome = guarded(index, || {
                    let prepared = if stopped.load(Ordering::Acquire) || barrier.is_poisoned() {
                        None
                    } else {
                        evaluate(input, stages, index)?
                            .map(|element| prepare(index, element))
                            .transpose()?
                    };
                    barrier.wait_turn(index)?;
                    if let Some(prepared) = prepared {
                        if !stopped.load(Ordering::Acquire) {
                            let mut guard = acc.lock().map_err(|_| PipeError::LockPoisoned)?;
                            if combine(&mut guard, prepared)?.is_break() {
                                stopped.store(true, Ordering::Release);
                            }
                        }
                    }
                    barrier.done(index);
                    Ok(())
                });
                if let Err(err) = outcome {
                    let released = matches!(
                        err.downcast_ref::<PipeError>(),
                        Some(PipeError::BarrierPoisoned)
                    ) && barrier.is_poisoned();
                    // A released worker carries no new failure.
                    if !released {
                        warn!(index, error = %err, "ordered worker failed");
                        barrier.poison(err);
                    }
                }
            });
        }
    });

    barrier.wait_for_completion()?;
    Ok(acc.into_inner().map_err(|_| PipeError::LockPoisoned)?)
}

/// Unordered parallel evaluator: combine steps run under one lock in
/// completion order.
fn run_unordered<P, A, Prep, Comb>(
    input: &Input,
    stages: &[Arc<dyn DynOp>],
    init: A,
    prepare: &Prep,
    combine: &Comb,
) -> Result<A>
where
    A: Send,
    Prep: Fn(usize, Element) -> Result<P> + Sync,
    Comb: Fn(&mut A, P) -> Result<ControlFlow<()>> + Sync,
{
    let acc = Mutex::new(init);
    let stopped = AtomicBool::new(false);
    let failure: Mutex<Option<anyhow::Error>> = Mutex::new(None);

    rayon::scope(|scope| {
        for index in 0..input.len() {
            let (acc, stopped, failure) = (&acc, &stopped, &failure);
            scope.spawn(move |_| {
                if stopped.load(Ordering::Acquire) {
                    return;
                }
                let outcome = guarded(index, || {
                    let Some(element) = evaluate(input, stages, index)? else {
                        return Ok(());
                    };
                    let prepared = prepare(index, element)?;
                    let mut guard = acc.lock().map_err(|_| PipeError::LockPoisoned)?;
                    if !stopped.load(Ordering::Acquire) && combine(&mut guard, prepared)?.is_break()
                    {
                        stopped.store(true, Ordering::Release);
                    }
                    Ok(())
                });
                if let Err(err) = outcome {
                    stopped.store(true, Ordering::Release);
                    if let Ok(mut first) = failure.lock() {
                        if first.is_none() {
                            warn!(index, error = %err, "unordered worker failed");
                            *first = Some(err);
                        }
                    }
                }
            });
        }
    });

    if let Some(err) = failure.into_inner().map_err(|_| PipeError::LockPoisoned)? {
        return Err(err);
    }
    Ok(acc.into_inner().map_err(|_| PipeError::LockPoisoned)?)
}
