//! Experiment records and lifecycle
//!
//! An [`Experiment`] is one configured, trackable benchmark run request and
//! its outcome. Status moves forward only:
//!
//! ```text
//! Pending ──> Running ──> Completed
//!                    └──> Failed
//! ```
//!
//! Records are mutated exclusively by the orchestrator
//! ([`crate::service::ExperimentService`]); the invariant that `results` is
//! present iff the experiment has finished (Completed or Failed) is enforced
//! by the transition methods here.

mod store;

pub use store::{ExperimentStore, MemoryExperimentStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bench::BackendType;

/// Status of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Created but not yet executed.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully; results hold benchmark and monitor output.
    Completed,
    /// Finished with an error; results hold the failure kind and message.
    Failed,
}

/// One configured benchmark run request and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    id: String,
    name: String,
    backend_type: BackendType,
    status: ExperimentStatus,
    created_at: DateTime<Utc>,
    config: Value,
    results: Option<Value>,
}

impl Experiment {
    /// Create a new experiment in Pending status with no results.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        backend_type: BackendType,
        config: Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            backend_type,
            status: ExperimentStatus::Pending,
            created_at: Utc::now(),
            config,
            results: None,
        }
    }

    /// Get the experiment id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the backend type tag.
    #[must_use]
    pub const fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the raw workload configuration map.
    #[must_use]
    pub const fn config(&self) -> &Value {
        &self.config
    }

    /// Get the results document, present only once the experiment finished.
    #[must_use]
    pub const fn results(&self) -> Option<&Value> {
        self.results.as_ref()
    }

    /// Transition Pending → Running.
    pub fn mark_running(&mut self) {
        self.status = ExperimentStatus::Running;
    }

    /// Transition Running → Completed with the merged results document.
    pub fn complete(&mut self, results: Value) {
        self.status = ExperimentStatus::Completed;
        self.results = Some(results);
    }

    /// Transition Running → Failed with the captured failure document.
    pub fn fail(&mut self, results: Value) {
        self.status = ExperimentStatus::Failed;
        self.results = Some(results);
    }
}
