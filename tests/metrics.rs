#![cfg(feature = "metrics")]

use anyhow::Result;
use ironpipe::metrics::{Metric, MetricsCollector};
use ironpipe::testing::*;
use ironpipe::*;
use serde_json::{json, Value};
use std::fs;

#[test]
fn counters_after_runs() -> Result<()> {
    let p = TestPipeline::new();
    let metrics = MetricsCollector::new();
    p.set_metrics(metrics.clone());

    let evens = from_iter(&p, 1..=10).filter(|v: &i32| v % 2 == 0);
    evens.collect_seq()?;
    evens.collect_par()?;

    assert_eq!(metrics.counter("runs"), Some(2));
    assert_eq!(metrics.counter("elements_read"), Some(20));
    assert_eq!(metrics.counter("elements_emitted"), Some(10));
    assert!(metrics.elapsed().is_some());
    assert!(metrics.counter("missing").is_none());
    Ok(())
}

#[test]
fn reshape_segments_count_as_reads() -> Result<()> {
    let p = TestPipeline::new();
    p.set_metrics(MetricsCollector::new());

    from_vec(&p, vec![3, 1, 2])
        .filter(|v: &i32| *v > 1)
        .sort(|a: &i32, b: &i32| a < b)
        .collect_seq()?;

    let metrics = p.take_metrics().expect("metrics attached");
    // Three source elements, then two materialized ones.
    assert_eq!(metrics.counter("elements_read"), Some(5));
    assert_eq!(metrics.counter("elements_emitted"), Some(2));
    assert!(p.take_metrics().is_none());
    Ok(())
}

#[test]
fn detached_metrics_stop_recording() -> Result<()> {
    let p = TestPipeline::new();
    let metrics = MetricsCollector::new();
    p.set_metrics(metrics.clone());
    from_vec(&p, vec![1]).collect_seq()?;
    let _ = p.take_metrics();
    from_vec(&p, vec![1]).collect_seq()?;
    assert_eq!(metrics.counter("runs"), Some(1));
    Ok(())
}

struct CacheHits(u64);

impl Metric for CacheHits {
    fn name(&self) -> &str {
        "cache_hits"
    }

    fn value(&self) -> Value {
        json!(self.0)
    }

    fn description(&self) -> Option<&str> {
        Some("Lookups served from cache")
    }
}

#[test]
fn custom_metrics_in_json() {
    let metrics = MetricsCollector::new();
    metrics.register(Box::new(CacheHits(12)));
    metrics.increment_counter("runs", 3);

    let report = metrics.to_json();
    assert_eq!(report["cache_hits"]["value"], json!(12));
    assert_eq!(report["cache_hits"]["description"], json!("Lookups served from cache"));
    assert_eq!(report["runs"]["value"], json!(3));
    assert!(report.get("execution_time_ms").is_none());
}

#[test]
fn save_to_file_writes_json() -> Result<()> {
    let p = TestPipeline::new();
    let metrics = MetricsCollector::new();
    p.set_metrics(metrics.clone());
    from_range(&p, 0, 100, 1)?.reduce_par(0i64, |a, v| a + v)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("metrics.json");
    metrics.save_to_file(&path)?;

    let saved: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(saved["elements_read"]["value"], json!(100));
    assert_eq!(saved["elements_emitted"]["value"], json!(100));
    assert!(saved["execution_time_ms"]["value"].is_u64());
    Ok(())
}
