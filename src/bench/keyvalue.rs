//! Key-value benchmark adapter (reference implementation)
//!
//! Phases: `set` (write), `get` (point-read), `update`, `delete`. All keys
//! live under a scratch prefix that prepare/cleanup purge, so reruns against
//! a shared store start clean.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::{read_sample_count, Benchmark, BenchmarkReport, PhaseSummary};
use crate::config::WorkloadConfig;
use crate::kv::{KvProvider, KvStore};
use crate::monitor::PerformanceMonitor;
use crate::runner::run_operations;
use crate::{Error, Result};

const KEY_PREFIX: &str = "bench:";

const DEFAULT_PHASES: &[&str] = &["set", "get"];
const DEFAULT_WRITE_PHASE: &str = "set";

/// Benchmark adapter for key-value backends.
///
/// Holds an explicitly injected connection provider; a session is acquired
/// in `prepare` and reused for the rest of the run.
pub struct KeyValueBenchmark {
    provider: Arc<dyn KvProvider>,
    store: Option<Arc<dyn KvStore>>,
}

impl KeyValueBenchmark {
    /// Create an adapter over the given connection provider.
    #[must_use]
    pub fn new(provider: Arc<dyn KvProvider>) -> Self {
        Self {
            provider,
            store: None,
        }
    }

    async fn session(&mut self) -> Result<Arc<dyn KvStore>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        let store = self.provider.acquire().await?;
        self.store = Some(Arc::clone(&store));
        Ok(store)
    }

    async fn run_set(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<PhaseSummary> {
        let store = self.session().await?;
        let rows = config.rows();
        let padding = config.data_size().padding_bytes();

        let started = Instant::now();
        run_operations(monitor, rows, config.concurrency(), move |i| {
            let store = Arc::clone(&store);
            async move { store.set(&data_key(i), payload(i, padding)).await }
        })
        .await?;

        Ok(PhaseSummary::write(
            rows as u64,
            started.elapsed().as_secs_f64(),
        ))
    }

    async fn run_get(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<PhaseSummary> {
        let store = self.session().await?;
        let samples = read_sample_count(config.rows());

        let started = Instant::now();
        let durations = run_operations(monitor, samples, config.concurrency(), move |i| {
            let store = Arc::clone(&store);
            async move { store.get(&data_key(i)).await.map(|_| ()) }
        })
        .await?;

        Ok(PhaseSummary::read(
            &durations,
            started.elapsed().as_secs_f64(),
        ))
    }

    async fn run_update(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<PhaseSummary> {
        let store = self.session().await?;
        let samples = read_sample_count(config.rows());
        let padding = config.data_size().padding_bytes();

        let started = Instant::now();
        let durations = run_operations(monitor, samples, config.concurrency(), move |i| {
            let store = Arc::clone(&store);
            // Overwrite with a shifted payload so updates are not no-ops.
            async move { store.set(&data_key(i), payload(i + 1, padding)).await }
        })
        .await?;

        Ok(PhaseSummary::read(
            &durations,
            started.elapsed().as_secs_f64(),
        ))
    }

    async fn run_delete(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<PhaseSummary> {
        let store = self.session().await?;
        let samples = read_sample_count(config.rows());

        let started = Instant::now();
        run_operations(monitor, samples, config.concurrency(), move |i| {
            let store = Arc::clone(&store);
            async move { store.delete(&data_key(i)).await }
        })
        .await?;

        Ok(PhaseSummary::write(
            samples as u64,
            started.elapsed().as_secs_f64(),
        ))
    }
}

#[async_trait]
impl Benchmark for KeyValueBenchmark {
    async fn prepare(&mut self, _config: &WorkloadConfig) -> Result<()> {
        let store = self.session().await?;
        store.purge_prefix(KEY_PREFIX).await
    }

    async fn execute(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<BenchmarkReport> {
        let store = self.session().await?;

        // Warm-up operations are not timed and not recorded.
        let padding = config.data_size().padding_bytes();
        for i in 0..config.warmup() {
            store
                .set(&format!("{KEY_PREFIX}warmup:{i}"), payload(i, padding))
                .await?;
        }

        let mut report = BenchmarkReport::new();
        for phase in config.phases(DEFAULT_PHASES, DEFAULT_WRITE_PHASE) {
            let summary = match phase.as_str() {
                "set" => self.run_set(config, monitor).await?,
                "get" => self.run_get(config, monitor).await?,
                "update" => self.run_update(config, monitor).await?,
                "delete" => self.run_delete(config, monitor).await?,
                other => {
                    return Err(Error::Config(format!(
                        "unknown key-value phase: {other}"
                    )))
                }
            };
            report.insert(phase, summary);
        }
        Ok(report)
    }

    async fn cleanup(&mut self) -> Result<()> {
        let store = self.session().await?;
        store.purge_prefix(KEY_PREFIX).await
    }
}

fn data_key(index: usize) -> String {
    format!("{KEY_PREFIX}string:{index}")
}

fn payload(index: usize, padding: usize) -> Vec<u8> {
    serde_json::json!({
        "id": index,
        "name": format!("user{index}"),
        "email": format!("user{index}@example.com"),
        "score": index % 100,
        "pad": "x".repeat(padding),
    })
    .to_string()
    .into_bytes()
}
