//! Metrics collection and reporting for terminal runs.
//!
//! Attach a [`MetricsCollector`] to a [`Pipeline`](crate::Pipeline) and every terminal
//! operation evaluated afterwards records into it:
//!
//! - `runs` - number of terminal evaluations
//! - `elements_read` - source elements fed into the stage chain
//! - `elements_emitted` - elements that survived every filter and reached the terminal
//! - execution time, from the first run's start to the last run's end
//!
//! Custom metrics can be registered alongside through the [`Metric`] trait.
//!
//! # Example
//!
//! ```no_run
//! use ironpipe::*;
//! use ironpipe::metrics::MetricsCollector;
//!
//! # fn main() -> anyhow::Result<()> {
//! let p = Pipeline::default();
//! p.set_metrics(MetricsCollector::new());
//!
//! let evens = from_vec(&p, vec![1, 2, 3, 4, 5])
//!     .filter(|x: &i32| x % 2 == 0)
//!     .collect_par()?;
//!
//! if let Some(metrics) = p.take_metrics() {
//!     assert_eq!(metrics.counter("elements_emitted"), Some(2));
//!     metrics.print();
//!     metrics.save_to_file("metrics.json")?;
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Trait for custom metrics.
pub trait Metric: Send + Sync + Any {
    /// The name of this metric (e.g., `cache_hits`).
    fn name(&self) -> &str;

    /// The current value of this metric as a JSON value.
    fn value(&self) -> Value;

    /// Optional description of what this metric measures.
    fn description(&self) -> Option<&str> {
        None
    }
}

/// Thread-safe container for run statistics. Clones share the same storage.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

#[derive(Default)]
struct MetricsCollectorInner {
    counters: BTreeMap<String, u64>,
    custom: HashMap<String, Box<dyn Metric>>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsCollectorInner::default())),
        }
    }

    // Metrics never hold user code under the lock, so a poisoned lock still has
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, MetricsCollectorInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a custom metric, replacing any metric with the same name.
    pub fn register(&self, metric: Box<dyn Metric>) {
        self.lock().custom.insert(metric.name().to_string(), metric);
    }

    /// Record the start of a run. Only the first call sets the start time.
    pub fn record_start(&self) {
        let mut inner = self.lock();
        if inner.start_time.is_none() {
            inner.start_time = Some(Instant::now());
        }
    }

    /// Record the end of a run.
    pub fn record_end(&self) {
        self.lock().end_time = Some(Instant::now());
    }

    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to the counter `name`, creating it at zero if needed.
    pub fn increment_counter(&self, name: &str, value: u64) {
        *self.lock().counters.entry(name.to_string()).or_insert(0) += value;
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.lock().counters.get(name).copied()
    }

    /// All counters and custom metrics as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let inner = self.lock();
        let mut out = serde_json::Map::new();
        for (name, count) in &inner.counters {
            out.insert(name.clone(), json!({ "value": count }));
        }
        for (name, metric) in &inner.custom {
            let mut obj = serde_json::Map::new();
            obj.insert("value".to_string(), metric.value());
            if let Some(desc) = metric.description() {
                obj.insert("description".to_string(), json!(desc));
            }
            out.insert(name.clone(), Value::Object(obj));
        }
        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            out.insert(
                "execution_time_ms".to_string(),
                json!({
                    "value": end.duration_since(start).as_millis(),
                    "description": "Wall time across all recorded runs in milliseconds",
                }),
            );
        }
        Value::Object(out)
    }

    /// Print all metrics to stdout in a human-readable format.
    pub fn print(&self) {
        println!("\n========== Pipeline Metrics ==========");
        if let Some(elapsed) = self.elapsed() {
            println!(
                "Execution Time: {:.3}s ({} ms)",
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            );
            println!("--------------------------------------");
        }
        let inner = self.lock();
        for (name, count) in &inner.counters {
            println!("{name}: {count}");
        }
        let mut custom: Vec<_> = inner.custom.iter().collect();
        custom.sort_by_key(|(name, _)| *name);
        for (name, metric) in custom {
            match metric.description() {
                Some(desc) => println!("{name}: {} ({desc})", metric.value()),
                None => println!("{name}: {}", metric.value()),
            }
        }
        drop(inner);
        println!("======================================\n");
    }

    /// Save all metrics to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path)?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
