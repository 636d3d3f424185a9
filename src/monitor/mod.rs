//! Performance monitor
//!
//! Owns the two measurement streams of one experiment run: per-operation
//! elapsed times (recorded by the runner, safe under concurrent writers) and
//! periodic process resource samples (captured by a background tokio task on
//! a fixed cadence). `start` clears prior state, `stop` is best-effort with a
//! bounded wait, and `results` folds both streams into summary statistics
//! with fixed rounding so runs compare stably.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tokio::task::JoinHandle;
use tracing::warn;

/// Cadence of the background resource sampling loop.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Ring-buffer capacity for resource samples; oldest dropped first.
pub const MAX_RESOURCE_SAMPLES: usize = 1000;

/// Bounded wait for the sampling loop to exit on `stop`.
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// One CPU/memory observation taken on a sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Process CPU usage in percent.
    pub cpu_percent: f64,
    /// Process resident memory in megabytes.
    pub memory_mb: f64,
}

/// Average/percentile latency summary in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Mean latency.
    pub avg: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// Average/maximum pair over a resource-sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    /// Mean over all samples.
    pub avg: f64,
    /// Maximum observed sample.
    pub max: f64,
}

/// Summary statistics for one experiment run.
///
/// Serializes to the results document's `performance_metrics` shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Wall-clock run duration in seconds (0 if start or end is missing).
    pub duration_seconds: f64,
    /// Number of recorded operation timings.
    pub total_queries: u64,
    /// Operations per second over the run duration (0 when duration is 0).
    pub ops_per_second: f64,
    /// Operation latency summary in milliseconds.
    pub latency_ms: LatencyStats,
    /// Process CPU usage over the run.
    pub cpu_percent: ResourceStats,
    /// Process resident memory over the run, in megabytes.
    pub memory_mb: ResourceStats,
}

#[derive(Debug, Default)]
struct RunSpan {
    start: Option<Instant>,
    end: Option<Instant>,
}

/// Records operation timings and periodic resource samples for one run.
///
/// State machine per run: `idle → sampling → idle`. A fresh monitor is
/// instantiated per experiment execution; `start` clears all prior samples.
#[derive(Debug)]
pub struct PerformanceMonitor {
    span: Mutex<RunSpan>,
    op_times: Mutex<Vec<f64>>,
    resources: Arc<Mutex<VecDeque<ResourceSample>>>,
    sampling: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    /// Create an idle monitor with empty sample buffers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            span: Mutex::new(RunSpan::default()),
            op_times: Mutex::new(Vec::new()),
            resources: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_RESOURCE_SAMPLES))),
            sampling: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Begin a run: record the start instant, clear prior samples, and spawn
    /// the background sampling loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned by a panicking writer.
    pub fn start(&self) {
        {
            let mut span = self.span.lock().expect("span lock poisoned");
            span.start = Some(Instant::now());
            span.end = None;
        }
        self.op_times.lock().expect("op_times lock poisoned").clear();
        self.resources.lock().expect("resources lock poisoned").clear();

        self.sampling.store(true, Ordering::SeqCst);
        let sampling = Arc::clone(&self.sampling);
        let resources = Arc::clone(&self.resources);
        let handle = tokio::spawn(async move {
            sample_loop(&sampling, &resources).await;
        });
        *self.task.lock().expect("task lock poisoned") = Some(handle);
    }

    /// Append one operation's elapsed duration in seconds.
    ///
    /// Safe to call concurrently from multiple workers.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a panicking writer.
    pub fn record_operation(&self, duration_seconds: f64) {
        self.op_times
            .lock()
            .expect("op_times lock poisoned")
            .push(duration_seconds);
    }

    /// End the run: record the end instant and stop the sampling loop.
    ///
    /// Waits up to one second for the loop to exit; past that the task is
    /// abandoned and any samples it would still take are discarded.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned by a panicking writer.
    pub async fn stop(&self) {
        {
            let mut span = self.span.lock().expect("span lock poisoned");
            span.end = Some(Instant::now());
        }
        self.sampling.store(false, Ordering::SeqCst);

        let handle = self.task.lock().expect("task lock poisoned").take();
        if let Some(handle) = handle {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!("resource sampling loop did not stop within 1s, abandoning it");
            }
        }
    }

    /// Number of operation timings recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned by a panicking writer.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.op_times.lock().expect("op_times lock poisoned").len()
    }

    /// Compute summary statistics over everything recorded in this run.
    ///
    /// Empty inputs yield all-zero statistics; `ops_per_second` is 0 whenever
    /// the duration is 0.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned by a panicking writer.
    #[must_use]
    pub fn results(&self) -> PerformanceMetrics {
        let duration = {
            let span = self.span.lock().expect("span lock poisoned");
            match (span.start, span.end) {
                (Some(start), Some(end)) => end.saturating_duration_since(start).as_secs_f64(),
                _ => 0.0,
            }
        };

        let op_times = self.op_times.lock().expect("op_times lock poisoned").clone();
        let resources = self.resources.lock().expect("resources lock poisoned");

        let total_queries = op_times.len() as u64;
        let ops_per_second = if duration > 0.0 {
            op_times.len() as f64 / duration
        } else {
            0.0
        };
        let avg_latency = if op_times.is_empty() {
            0.0
        } else {
            op_times.iter().sum::<f64>() / op_times.len() as f64
        };

        let cpu: Vec<f64> = resources.iter().map(|s| s.cpu_percent).collect();
        let mem: Vec<f64> = resources.iter().map(|s| s.memory_mb).collect();

        PerformanceMetrics {
            duration_seconds: round_to(duration, 3),
            total_queries,
            ops_per_second: round_to(ops_per_second, 2),
            latency_ms: LatencyStats {
                avg: round_to(avg_latency * 1000.0, 2),
                p50: round_to(percentile(&op_times, 50.0) * 1000.0, 2),
                p95: round_to(percentile(&op_times, 95.0) * 1000.0, 2),
                p99: round_to(percentile(&op_times, 99.0) * 1000.0, 2),
            },
            cpu_percent: ResourceStats {
                avg: round_to(mean(&cpu), 2),
                max: round_to(max(&cpu), 2),
            },
            memory_mb: ResourceStats {
                avg: round_to(mean(&mem), 2),
                max: round_to(max(&mem), 2),
            },
        }
    }

    fn push_sample(resources: &Mutex<VecDeque<ResourceSample>>, sample: ResourceSample) {
        let mut buf = resources.lock().expect("resources lock poisoned");
        if buf.len() == MAX_RESOURCE_SAMPLES {
            buf.pop_front();
        }
        buf.push_back(sample);
    }
}

async fn sample_loop(sampling: &AtomicBool, resources: &Mutex<VecDeque<ResourceSample>>) {
    let Ok(pid) = sysinfo::get_current_pid() else {
        warn!("cannot resolve current pid, resource sampling disabled");
        return;
    };
    let mut system = System::new();

    while sampling.load(Ordering::SeqCst) {
        if system.refresh_process(pid) {
            if let Some(process) = system.process(pid) {
                let sample = ResourceSample {
                    cpu_percent: f64::from(process.cpu_usage()),
                    memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
                };
                PerformanceMonitor::push_sample(resources, sample);
            }
        }
        tokio::time::sleep(SAMPLE_INTERVAL).await;
    }
}

/// Percentile over `values` with the engine's fixed semantics: sort
/// ascending, take `floor(count × pct / 100)` clamped to `count − 1`.
///
/// Empty input yields 0.
#[must_use]
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let index = (sorted.len() as f64 * pct / 100.0) as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Round to a fixed number of decimal places for stable cross-run comparison.
#[must_use]
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

impl Drop for PerformanceMonitor {
    // Signal the sampling loop even if stop() was never awaited.
    fn drop(&mut self) {
        self.sampling.store(false, Ordering::SeqCst);
    }
}
