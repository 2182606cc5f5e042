use crate::error::PipeError;
use crate::node_id::StageId;
use crate::runner::{ExecMode, Runner};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsCollector;
#[cfg(feature = "metrics")]
use std::sync::Mutex;

/// Execution settings shared by every chain built from a [`Pipeline`].
///
/// Options can be built in code, deserialized from JSON, or read from the
/// environment:
///
/// ```
/// use ironpipe::PipelineOptions;
///
/// let opts: PipelineOptions = serde_json::from_str(r#"{ "threads": 4 }"#).unwrap();
/// assert_eq!(opts.threads, Some(4));
/// assert_eq!(PipelineOptions::default().threads, None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Size of a dedicated worker pool. `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Label attached to log lines.
    pub name: Option<String>,
}

impl PipelineOptions {
    pub const THREADS_ENV: &'static str = "IRONPIPE_THREADS";
    pub const NAME_ENV: &'static str = "IRONPIPE_NAME";

    /// Read `IRONPIPE_THREADS` and `IRONPIPE_NAME`. Unset or unparsable values
    /// fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            threads: std::env::var(Self::THREADS_ENV)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &usize| *n > 0),
            name: std::env::var(Self::NAME_ENV).ok().filter(|s| !s.is_empty()),
        }
    }
}

/// -------- Pipeline context --------
/// Hands out stage ids and owns the scheduler every parallel terminal runs on.
/// Cloning is cheap; clones share ids, pool and metrics.
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) inner: Arc<PipelineInner>,
}

pub(crate) struct PipelineInner {
    next_id: AtomicU64,
    options: PipelineOptions,
    pool: Option<Arc<ThreadPool>>,
    #[cfg(feature = "metrics")]
    metrics: Mutex<Option<MetricsCollector>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::from_parts(PipelineOptions::default(), None)
    }
}

impl Pipeline {
    /// Build a pipeline with the given options, creating a dedicated thread
    /// pool when `threads` is set.
    ///
    /// # Errors
    /// [`PipeError::ThreadPool`] if the pool cannot be built.
    pub fn with_options(options: PipelineOptions) -> anyhow::Result<Self> {
        let pool = match options.threads {
            Some(n) => {
                let mut builder = ThreadPoolBuilder::new().num_threads(n);
                if let Some(name) = options.name.clone() {
                    builder = builder.thread_name(move |i| format!("{name}-{i}"));
                }
                Some(Arc::new(builder.build().map_err(PipeError::from)?))
            }
            None => None,
        };
        debug!(threads = ?options.threads, name = ?options.name, "pipeline created");
        Ok(Self::from_parts(options, pool))
    }

    /// Shorthand for a pipeline with a dedicated pool of `n` threads.
    ///
    /// # Errors
    /// See [`with_options`](Self::with_options).
    pub fn with_threads(n: usize) -> anyhow::Result<Self> {
        Self::with_options(PipelineOptions {
            threads: Some(n),
            ..PipelineOptions::default()
        })
    }

    fn from_parts(options: PipelineOptions, pool: Option<Arc<ThreadPool>>) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                next_id: AtomicU64::new(0),
                options,
                pool,
                #[cfg(feature = "metrics")]
                metrics: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.inner.options
    }

    pub(crate) fn next_stage_id(&self) -> StageId {
        StageId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of stages created so far.
    #[must_use]
    pub fn stage_count(&self) -> u64 {
        self.inner.next_id.load(Ordering::Relaxed)
    }

    /// A runner sharing this pipeline's pool, name and metrics.
    #[must_use]
    pub fn runner(&self, mode: ExecMode) -> Runner {
        Runner {
            mode,
            pool: self.inner.pool.clone(),
            name: self.inner.options.name.clone(),
            #[cfg(feature = "metrics")]
            metrics: self.metrics(),
        }
    }

    /// Attach a metrics collector; later terminal runs record into it.
    #[cfg(feature = "metrics")]
    pub fn set_metrics(&self, metrics: MetricsCollector) {
        if let Ok(mut slot) = self.inner.metrics.lock() {
            *slot = Some(metrics);
        }
    }

    /// Detach and return the metrics collector, if one was attached.
    #[cfg(feature = "metrics")]
    pub fn take_metrics(&self) -> Option<MetricsCollector> {
        self.inner.metrics.lock().ok().and_then(|mut slot| slot.take())
    }

    #[cfg(feature = "metrics")]
    fn metrics(&self) -> Option<MetricsCollector> {
        self.inner.metrics.lock().ok().and_then(|slot| slot.clone())
    }
}
