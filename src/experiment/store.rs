//! Experiment store - persistence seam for experiment records
//!
//! The core never deletes experiments; the store exposes save/find/list
//! only. The in-memory implementation backs tests and the reference wiring;
//! durable implementations live outside this crate.

use async_trait::async_trait;
use dashmap::DashMap;

use super::Experiment;
use crate::Result;

/// Persistence seam for experiment records.
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Insert or replace an experiment record.
    async fn save(&self, experiment: Experiment) -> Result<()>;

    /// Find an experiment by id.
    async fn find(&self, id: &str) -> Result<Option<Experiment>>;

    /// List all experiments in creation order.
    ///
    /// Ordering is by creation timestamp (ties broken by id) and is not
    /// guaranteed stable under concurrent creation.
    async fn find_all(&self) -> Result<Vec<Experiment>>;
}

/// In-memory experiment store using a lock-free concurrent hashmap.
#[derive(Debug, Default)]
pub struct MemoryExperimentStore {
    experiments: DashMap<String, Experiment>,
}

impl MemoryExperimentStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    /// Check whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

#[async_trait]
impl ExperimentStore for MemoryExperimentStore {
    async fn save(&self, experiment: Experiment) -> Result<()> {
        self.experiments.insert(experiment.id().to_string(), experiment);
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<Experiment>> {
        Ok(self.experiments.get(id).map(|e| e.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<Experiment>> {
        let mut all: Vec<Experiment> = self
            .experiments
            .iter()
            .map(|e| e.value().clone())
            .collect();
        all.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::BackendType;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_find() {
        let store = MemoryExperimentStore::new();
        let exp = Experiment::new("exp-1", "bench1", BackendType::KeyValue, json!({}));
        store.save(exp.clone()).await.unwrap();

        let found = store.find("exp-1").await.unwrap().unwrap();
        assert_eq!(found, exp);
        assert!(store.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let store = MemoryExperimentStore::new();
        let mut exp = Experiment::new("exp-1", "bench1", BackendType::KeyValue, json!({}));
        store.save(exp.clone()).await.unwrap();

        exp.mark_running();
        store.save(exp).await.unwrap();

        let found = store.find("exp-1").await.unwrap().unwrap();
        assert_eq!(found.status(), crate::experiment::ExperimentStatus::Running);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_find_all_creation_order() {
        let store = MemoryExperimentStore::new();
        for i in 0..3 {
            let exp = Experiment::new(
                format!("exp-{i}"),
                format!("bench{i}"),
                BackendType::KeyValue,
                json!({}),
            );
            store.save(exp).await.unwrap();
            // Distinct creation timestamps
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let all = store.find_all().await.unwrap();
        let ids: Vec<&str> = all.iter().map(Experiment::id).collect();
        assert_eq!(ids, vec!["exp-0", "exp-1", "exp-2"]);
    }
}
