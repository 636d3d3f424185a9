//! Experiment orchestrator
//!
//! [`ExperimentService`] owns the experiment state machine: it creates
//! records, resolves the benchmark adapter for a backend type, sequences
//! prepare → execute → cleanup around a fresh performance monitor, and
//! merges adapter output with monitor statistics into the final results
//! document.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bench::{
    AdapterFactory, BackendType, Benchmark, BenchmarkReport, DocProvider, DocumentBenchmark,
    KeyValueBenchmark, MemoryDocProvider,
};
use crate::config::WorkloadConfig;
use crate::experiment::{Experiment, ExperimentStatus, ExperimentStore, MemoryExperimentStore};
use crate::kv::{KvProvider, MemoryKvProvider};
use crate::monitor::PerformanceMonitor;
use crate::{Error, Result};

/// Orchestrates experiment lifecycle and benchmark execution.
///
/// The adapter registry is fixed at construction time; each run gets a
/// fresh adapter instance and a fresh monitor. The service is the sole
/// writer of experiment status and results.
pub struct ExperimentService {
    store: Arc<dyn ExperimentStore>,
    adapters: HashMap<BackendType, AdapterFactory>,
    running: DashMap<String, ()>,
}

impl ExperimentService {
    /// Start building a service over the given experiment store.
    #[must_use]
    pub fn builder(store: Arc<dyn ExperimentStore>) -> ExperimentServiceBuilder {
        ExperimentServiceBuilder {
            store,
            adapters: HashMap::new(),
        }
    }

    /// Fully in-memory wiring: in-memory experiment store plus the shipped
    /// key-value and document adapters over in-memory backends.
    #[must_use]
    pub fn in_memory() -> Self {
        let kv = Arc::new(MemoryKvProvider::new());
        let doc = Arc::new(MemoryDocProvider::new());
        Self::builder(Arc::new(MemoryExperimentStore::new()))
            .adapter(BackendType::KeyValue, move || {
                Box::new(KeyValueBenchmark::new(
                    Arc::clone(&kv) as Arc<dyn KvProvider>
                ))
            })
            .adapter(BackendType::Document, move || {
                Box::new(DocumentBenchmark::new(
                    Arc::clone(&doc) as Arc<dyn DocProvider>
                ))
            })
            .build()
    }

    /// Comma-separated, sorted list of registered backend types.
    fn supported(&self) -> String {
        let mut names: Vec<&str> = self.adapters.keys().map(|b| b.as_str()).collect();
        names.sort_unstable();
        names.join(", ")
    }

    /// Create a new Pending experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBackendType`] when `backend_type` does not
    /// name a registered adapter; nothing is persisted in that case.
    pub async fn create(
        &self,
        name: impl Into<String>,
        backend_type: &str,
        config: Value,
    ) -> Result<Experiment> {
        let backend = match backend_type.parse::<BackendType>() {
            Ok(backend) if self.adapters.contains_key(&backend) => backend,
            _ => {
                return Err(Error::InvalidBackendType {
                    requested: backend_type.to_string(),
                    supported: self.supported(),
                })
            }
        };

        let experiment = Experiment::new(Uuid::new_v4().to_string(), name, backend, config);
        self.store.save(experiment.clone()).await?;
        info!(
            experiment_id = %experiment.id(),
            backend = %backend,
            "created experiment"
        );
        Ok(experiment)
    }

    /// Fetch an experiment by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub async fn get(&self, id: &str) -> Result<Experiment> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// List all experiments in creation order.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(&self) -> Result<Vec<Experiment>> {
        self.store.find_all().await
    }

    /// Execute an experiment end to end and return the finished record.
    ///
    /// The Running status is persisted before any backend work begins, so a
    /// concurrent observer never sees a stale Pending. At most one execution
    /// per experiment id can be in flight; the check-and-claim is atomic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or [`Error::AlreadyRunning`] without
    /// mutating state, or [`Error::BenchmarkExecutionFailed`] wrapping the
    /// original cause after recording it on the experiment.
    pub async fn run(&self, id: &str) -> Result<Experiment> {
        let mut experiment = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if experiment.status() == ExperimentStatus::Running {
            return Err(Error::AlreadyRunning(id.to_string()));
        }
        // Atomic claim: two callers observing Pending race here, one wins.
        if self.running.insert(id.to_string(), ()).is_some() {
            return Err(Error::AlreadyRunning(id.to_string()));
        }
        let _guard = RunGuard {
            running: &self.running,
            id,
        };

        let factory = self
            .adapters
            .get(&experiment.backend_type())
            .ok_or_else(|| Error::InvalidBackendType {
                requested: experiment.backend_type().to_string(),
                supported: self.supported(),
            })?;

        experiment.mark_running();
        self.store.save(experiment.clone()).await?;
        info!(
            experiment_id = %id,
            backend = %experiment.backend_type(),
            "starting experiment"
        );

        let monitor = Arc::new(PerformanceMonitor::new());
        let mut adapter = factory();
        monitor.start();
        let outcome = execute_benchmark(adapter.as_mut(), experiment.config(), &monitor).await;
        monitor.stop().await;

        match outcome {
            Ok(report) => {
                let metrics = monitor.results();
                experiment.complete(serde_json::json!({
                    "benchmark_results": report,
                    "performance_metrics": metrics,
                }));
                self.store.save(experiment.clone()).await?;
                info!(experiment_id = %id, "experiment completed");
                Ok(experiment)
            }
            Err(e) => {
                experiment.fail(serde_json::json!({
                    "error": e.to_string(),
                    "error_type": e.kind(),
                }));
                self.store.save(experiment.clone()).await?;
                error!(experiment_id = %id, error = %e, "experiment failed");
                Err(Error::BenchmarkExecutionFailed {
                    source: Box::new(e),
                })
            }
        }
    }
}

/// Run the three-phase contract around one adapter instance.
///
/// Cleanup is always attempted and never fatal; its failures are logged.
async fn execute_benchmark(
    adapter: &mut dyn Benchmark,
    config_value: &Value,
    monitor: &Arc<PerformanceMonitor>,
) -> Result<BenchmarkReport> {
    let config = WorkloadConfig::from_value(config_value)?;

    let result = match adapter.prepare(&config).await {
        Ok(()) => adapter.execute(&config, monitor).await,
        Err(e) => Err(e),
    };

    if let Err(e) = adapter.cleanup().await {
        warn!(error = %e, "benchmark cleanup failed");
    }
    result
}

/// Builder for [`ExperimentService`].
pub struct ExperimentServiceBuilder {
    store: Arc<dyn ExperimentStore>,
    adapters: HashMap<BackendType, AdapterFactory>,
}

impl ExperimentServiceBuilder {
    /// Register an adapter factory for a backend type.
    #[must_use]
    pub fn adapter<F>(mut self, backend: BackendType, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Benchmark> + Send + Sync + 'static,
    {
        self.adapters.insert(backend, Box::new(factory));
        self
    }

    /// Build the service.
    #[must_use]
    pub fn build(self) -> ExperimentService {
        ExperimentService {
            store: self.store,
            adapters: self.adapters,
            running: DashMap::new(),
        }
    }
}

/// Releases the run claim when execution finishes on any path.
struct RunGuard<'a> {
    running: &'a DashMap<String, ()>,
    id: &'a str,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.remove(self.id);
    }
}
