//! Benchmark adapter contract
//!
//! A [`Benchmark`] issues the actual backend operations for one experiment
//! run through a three-phase contract: `prepare` (idempotent scratch reset),
//! `execute` (the measured phases), `cleanup` (best-effort scratch removal).
//! Adapters are selected through a closed registry keyed by [`BackendType`];
//! there is no runtime plugin loading.

mod document;
mod keyvalue;

pub use document::{DocProvider, DocumentBenchmark, MemoryDocProvider, MemoryDocStore};
pub use keyvalue::KeyValueBenchmark;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::WorkloadConfig;
use crate::monitor::{round_to, PerformanceMonitor};
use crate::{Error, Result};

/// Backend variant behind the adapter contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Relational-SQL family engines.
    Relational,
    /// Document stores.
    Document,
    /// Key-value stores.
    KeyValue,
    /// Wide-column stores.
    WideColumn,
    /// Time-series stores.
    TimeSeries,
    /// Search indexes.
    Search,
}

impl BackendType {
    /// Canonical lowercase tag for this variant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Document => "document",
            Self::KeyValue => "keyvalue",
            Self::WideColumn => "widecolumn",
            Self::TimeSeries => "timeseries",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();
        match normalized.as_str() {
            "relational" => Ok(Self::Relational),
            "document" => Ok(Self::Document),
            "keyvalue" => Ok(Self::KeyValue),
            "widecolumn" => Ok(Self::WideColumn),
            "timeseries" => Ok(Self::TimeSeries),
            "search" => Ok(Self::Search),
            _ => Err(Error::InvalidBackendType {
                requested: s.to_string(),
                supported: "relational, document, keyvalue, widecolumn, timeseries, search"
                    .to_string(),
            }),
        }
    }
}

/// Per-phase summary returned by `execute`.
///
/// Write-style phases report count, elapsed time, and derived throughput;
/// read-style phases additionally report average/min/max per-operation
/// latency in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Logical operations executed in this phase.
    pub operations: u64,
    /// Wall-clock phase duration in seconds.
    pub time_seconds: f64,
    /// Operations per second over the phase duration (0 when duration is 0).
    pub ops_per_second: f64,
    /// Mean per-operation latency in seconds (read-style phases).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_time_seconds: Option<f64>,
    /// Minimum per-operation latency in seconds (read-style phases).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_time_seconds: Option<f64>,
    /// Maximum per-operation latency in seconds (read-style phases).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_time_seconds: Option<f64>,
}

impl PhaseSummary {
    /// Summary for a write-style phase.
    #[must_use]
    pub fn write(operations: u64, elapsed_seconds: f64) -> Self {
        let throughput = if elapsed_seconds > 0.0 {
            operations as f64 / elapsed_seconds
        } else {
            0.0
        };
        Self {
            operations,
            time_seconds: round_to(elapsed_seconds, 3),
            ops_per_second: round_to(throughput, 2),
            avg_time_seconds: None,
            min_time_seconds: None,
            max_time_seconds: None,
        }
    }

    /// Summary for a read-style phase from its per-operation durations.
    #[must_use]
    pub fn read(durations: &[f64], elapsed_seconds: f64) -> Self {
        let mut summary = Self::write(durations.len() as u64, elapsed_seconds);
        if durations.is_empty() {
            summary.avg_time_seconds = Some(0.0);
            summary.min_time_seconds = Some(0.0);
            summary.max_time_seconds = Some(0.0);
        } else {
            let sum: f64 = durations.iter().sum();
            summary.avg_time_seconds = Some(round_to(sum / durations.len() as f64, 4));
            summary.min_time_seconds =
                Some(round_to(durations.iter().copied().fold(f64::MAX, f64::min), 4));
            summary.max_time_seconds =
                Some(round_to(durations.iter().copied().fold(0.0, f64::max), 4));
        }
        summary
    }
}

/// Per-phase summaries keyed by phase name.
pub type BenchmarkReport = BTreeMap<String, PhaseSummary>;

/// Creates a fresh adapter instance for each experiment run.
pub type AdapterFactory = Box<dyn Fn() -> Box<dyn Benchmark> + Send + Sync>;

/// Three-phase benchmark contract implemented per backend variant.
#[async_trait]
pub trait Benchmark: Send {
    /// Idempotently establish a clean workload target.
    ///
    /// Must tolerate "target does not exist yet" without failing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] when no connection/session can
    /// be acquired, or a backend error when the reset itself fails.
    async fn prepare(&mut self, config: &WorkloadConfig) -> Result<()>;

    /// Run the selected phases, recording every operation timing into the
    /// shared monitor, and return one summary per phase.
    ///
    /// # Errors
    ///
    /// Returns the first unrecovered operation failure.
    async fn execute(
        &mut self,
        config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> Result<BenchmarkReport>;

    /// Best-effort removal of scratch state.
    ///
    /// # Errors
    ///
    /// Failures here are downgraded to diagnostics by the orchestrator and
    /// never fail the experiment.
    async fn cleanup(&mut self) -> Result<()>;
}

/// Number of read-style sample operations for a workload of `rows` writes.
///
/// Read phases probe a tenth of the data set, capped at 100 operations.
#[must_use]
pub const fn read_sample_count(rows: usize) -> usize {
    let samples = rows / 10;
    if samples > 100 {
        100
    } else {
        samples
    }
}
