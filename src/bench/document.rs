//! Document-store benchmark adapter
//!
//! Phases: `insert` (write), `find` (point-read), `update`, `aggregate`
//! (group documents by a field, counting and averaging scores backend-side).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{read_sample_count, Benchmark, BenchmarkReport, PhaseSummary};
use crate::config::WorkloadConfig;
use crate::monitor::{round_to, PerformanceMonitor};
use crate::runner::run_operations;
use crate::{Error, Result};

const DEFAULT_PHASES: &[&str] = &["insert", "find"];
const DEFAULT_WRITE_PHASE: &str = "insert";

const CATEGORIES: &[&str] = &["alpha", "beta", "gamma", "delta"];

/// One group produced by [`DocStore::aggregate_by`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Grouping key value.
    pub key: String,
    /// Documents in the group.
    pub count: u64,
    /// Mean `score` over the group.
    pub avg_score: f64,
}

/// Document operation surface benchmarked by the document adapter.
#[async_trait]
pub trait DocStore: Send + Sync {
    /// Insert or replace a document by id.
    async fn insert(&self, id: u64, doc: Value) -> Result<()>;

    /// Find a document by id.
    async fn find(&self, id: u64) -> Result<Option<Value>>;

    /// Set one field on a document. Returns false if the id is unknown.
    async fn update_field(&self, id: u64, field: &str, value: Value) -> Result<bool>;

    /// Group documents by a string field, counting and averaging `score`.
    async fn aggregate_by(&self, field: &str) -> Result<Vec<GroupSummary>>;

    /// Drop the scratch collection. Must tolerate it not existing.
    async fn drop_collection(&self) -> Result<()>;
}

/// Connection seam for document backends.
#[async_trait]
pub trait DocProvider: Send + Sync {
    /// Acquire a usable store handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BackendUnavailable`] when no session can be
    /// supplied.
    async fn acquire(&self) -> Result<Arc<dyn DocStore>>;

    /// Cheap liveness probe for the backend.
    async fn health_check(&self) -> bool;
}

/// In-memory document store over a concurrent hashmap.
#[derive(Debug, Default)]
pub struct MemoryDocStore {
    docs: DashMap<u64, Value>,
}

impl MemoryDocStore {
    /// Create a new empty document store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl DocStore for MemoryDocStore {
    async fn insert(&self, id: u64, doc: Value) -> Result<()> {
        self.docs.insert(id, doc);
        Ok(())
    }

    async fn find(&self, id: u64) -> Result<Option<Value>> {
        Ok(self.docs.get(&id).map(|d| d.value().clone()))
    }

    async fn update_field(&self, id: u64, field: &str, value: Value) -> Result<bool> {
        match self.docs.get_mut(&id) {
            Some(mut doc) => {
                if let Some(map) = doc.value_mut().as_object_mut() {
                    map.insert(field.to_string(), value);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn aggregate_by(&self, field: &str) -> Result<Vec<GroupSummary>> {
        let mut groups: std::collections::BTreeMap<String, (u64, f64)> =
            std::collections::BTreeMap::new();
        for entry in &self.docs {
            let doc = entry.value();
            let key = doc
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let score = doc.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            let slot = groups.entry(key).or_insert((0, 0.0));
            slot.0 += 1;
            slot.1 += score;
        }
        Ok(groups
            .into_iter()
            .map(|(key, (count, sum))| GroupSummary {
                key,
                count,
                avg_score: round_to(sum / count as f64, 2),
            })
            .collect())
    }

    async fn drop_collection(&self) -> Result<()> {
        self.docs.clear();
        Ok(())
    }
}

/// Provider handing out a shared in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryDocProvider {
    store: Arc<MemoryDocStore>,
}

impl MemoryDocProvider {
    /// Create a provider over a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider over an existing store.
    #[must_use]
    pub fn with_store(store: Arc<MemoryDocStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DocProvider for MemoryDocProvider {
    async fn acquire(&self) -> Result<Arc<dyn DocStore>> {
        Ok(Arc::clone(&self.store) as Arc<dyn DocStore>)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Benchmark adapter for document backends.
pub struct DocumentBenchmark {
    provider: Arc<dyn DocProvider>,
    store: Option<Arc<dyn DocStore>>,
}

impl DocumentBenchmark {
    /// Create an adapter over the given connection provider.
    #[must_use]
    pub fn new(provider: Arc<dyn DocProvider>) -> Self {
        Self {
            provider,
            store: None,
        }
    }

    async fn session(&mut self) -> Result<Arc<dyn DocStore>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        let store = self.provider.acquire().await?;
        self.store = Some(Arc::clone(&store));
        Ok(store)
    }

    async fn run_insert(
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
            async move { store.insert(i as u64, document(i, padding)).await }
        })
        .await?;

        Ok(PhaseSummary::write(
            rows as u64,
            started.elapsed().as_secs_f64(),
        ))
    }

    async fn run_find(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<PhaseSummary> {
        let store = self.session().await?;
        let samples = read_sample_count(config.rows());

        let started = Instant::now();
        let durations = run_operations(monitor, samples, config.concurrency(), move |i| {
            let store = Arc::clone(&store);
            async move { store.find(i as u64).await.map(|_| ()) }
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

        let started = Instant::now();
        let durations = run_operations(monitor, samples, config.concurrency(), move |i| {
            let store = Arc::clone(&store);
            async move {
                store
                    .update_field(i as u64, "score", Value::from(((i + 1) % 100) as u64))
                    .await
                    .map(|_| ())
            }
        })
        .await?;

        Ok(PhaseSummary::read(
            &durations,
            started.elapsed().as_secs_f64(),
        ))
    }

    async fn run_aggregate(
        &mut self,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<PhaseSummary> {
        let store = self.session().await?;

        let started = Instant::now();
        let groups = store.aggregate_by("category").await?;
        let elapsed = started.elapsed().as_secs_f64();
        monitor.record_operation(elapsed);

        Ok(PhaseSummary::write(groups.len() as u64, elapsed))
    }
}

#[async_trait]
impl Benchmark for DocumentBenchmark {
    async fn prepare(&mut self, _config: &WorkloadConfig) -> Result<()> {
        let store = self.session().await?;
        store.drop_collection().await
    }

    async fn execute(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<BenchmarkReport> {
        let mut report = BenchmarkReport::new();
        for phase in config.phases(DEFAULT_PHASES, DEFAULT_WRITE_PHASE) {
            let summary = match phase.as_str() {
                "insert" => self.run_insert(config, monitor).await?,
                "find" => self.run_find(config, monitor).await?,
                "update" => self.run_update(config, monitor).await?,
                "aggregate" => self.run_aggregate(monitor).await?,
                other => {
                    return Err(Error::Config(format!("unknown document phase: {other}")))
                }
            };
            report.insert(phase, summary);
        }
        Ok(report)
    }

    async fn cleanup(&mut self) -> Result<()> {
        let store = self.session().await?;
        store.drop_collection().await
    }
}

fn document(index: usize, padding: usize) -> Value {
    serde_json::json!({
        "id": index,
        "name": format!("user{index}"),
        "category": CATEGORIES[index % CATEGORIES.len()],
        "score": index % 100,
        "pad": "x".repeat(padding),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter_with_store() -> (DocumentBenchmark, Arc<MemoryDocStore>) {
        let store = Arc::new(MemoryDocStore::new());
        let provider = Arc::new(MemoryDocProvider::with_store(Arc::clone(&store)));
        (DocumentBenchmark::new(provider), store)
    }

    fn config(value: serde_json::Value) -> WorkloadConfig {
        WorkloadConfig::from_value(&value).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find_phases() {
        let (mut adapter, store) = adapter_with_store();
        let cfg = config(json!({"rows": 40}));
        let monitor = Arc::new(PerformanceMonitor::new());

        adapter.prepare(&cfg).await.unwrap();
        let report = adapter.execute(&cfg, &monitor).await.unwrap();

        assert_eq!(report["insert"].operations, 40);
        assert_eq!(report["find"].operations, 4);
        assert_eq!(store.len(), 40);
    }

    #[tokio::test]
    async fn test_aggregate_groups_by_category() {
        let (mut adapter, _store) = adapter_with_store();
        let cfg = config(json!({"rows": 40, "operations": ["insert", "aggregate"]}));
        let monitor = Arc::new(PerformanceMonitor::new());

        adapter.prepare(&cfg).await.unwrap();
        let report = adapter.execute(&cfg, &monitor).await.unwrap();

        // 40 documents under 4 categories
        assert_eq!(report["aggregate"].operations, 4);
    }

    #[tokio::test]
    async fn test_aggregate_store_math() {
        let store = MemoryDocStore::new();
        store.insert(0, json!({"category": "alpha", "score": 10})).await.unwrap();
        store.insert(1, json!({"category": "alpha", "score": 20})).await.unwrap();
        store.insert(2, json!({"category": "beta", "score": 30})).await.unwrap();

        let groups = store.aggregate_by("category").await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "alpha");
        assert_eq!(groups[0].count, 2);
        assert!((groups[0].avg_score - 15.0).abs() < f64::EPSILON);
        assert_eq!(groups[1].key, "beta");
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_an_error() {
        let store = MemoryDocStore::new();
        assert!(!store.update_field(7, "score", json!(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_drops_collection() {
        let (mut adapter, store) = adapter_with_store();
        let cfg = config(json!({"operations": 10}));
        let monitor = Arc::new(PerformanceMonitor::new());

        adapter.prepare(&cfg).await.unwrap();
        adapter.execute(&cfg, &monitor).await.unwrap();
        assert!(!store.is_empty());

        adapter.cleanup().await.unwrap();
        assert!(store.is_empty());
    }
}
