//! Workload configuration
//!
//! Experiments carry an arbitrary JSON config map. [`WorkloadConfig`] gives
//! adapters a typed view of the keys the engine understands; unknown keys are
//! preserved on the experiment record but ignored here.

use serde_json::Value;

use crate::{Error, Result};

/// Default operation count per write phase.
pub const DEFAULT_ROWS: usize = 1000;

/// How the `operations` config key selects work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationSpec {
    /// Key absent: run the adapter's default phase list.
    Default,
    /// Numeric value: run exactly this many operations of the adapter's
    /// default write phase.
    Count(usize),
    /// List value: run the named phases in adapter-defined order.
    Phases(Vec<String>),
}

/// Payload size tier for generated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSize {
    /// 64-byte padding
    #[default]
    Small,
    /// 256-byte padding
    Medium,
    /// 1024-byte padding
    Large,
}

impl DataSize {
    /// Padding bytes appended to generated payloads.
    #[must_use]
    pub const fn padding_bytes(self) -> usize {
        match self {
            Self::Small => 64,
            Self::Medium => 256,
            Self::Large => 1024,
        }
    }
}

/// Typed view of an experiment's workload parameters.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    rows: usize,
    operations: OperationSpec,
    concurrency: usize,
    warmup: usize,
    data_size: DataSize,
}

impl WorkloadConfig {
    /// Parse a workload configuration from an experiment's JSON config map.
    ///
    /// Accepted keys: `rows`, `operations` (array of phase names or a plain
    /// operation count), `concurrent_queries` (alias `concurrency`),
    /// `warmup`, `data_size` (`"small" | "medium" | "large"`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a recognized key has the wrong shape,
    /// e.g. a negative count or a non-string phase name.
    pub fn from_value(config: &Value) -> Result<Self> {
        let rows = parse_count(config, "rows")?.unwrap_or(DEFAULT_ROWS);

        let operations = match config.get("operations") {
            None | Some(Value::Null) => OperationSpec::Default,
            Some(Value::Number(n)) => {
                let count = n
                    .as_u64()
                    .ok_or_else(|| Error::Config("operations count must be a non-negative integer".to_string()))?;
                OperationSpec::Count(usize::try_from(count).unwrap_or(usize::MAX))
            }
            Some(Value::Array(items)) => {
                let mut phases = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or_else(|| {
                        Error::Config(format!("operations entries must be strings, got {item}"))
                    })?;
                    phases.push(name.to_string());
                }
                OperationSpec::Phases(phases)
            }
            Some(other) => {
                return Err(Error::Config(format!(
                    "operations must be a phase list or an operation count, got {other}"
                )))
            }
        };

        let concurrency = parse_count(config, "concurrent_queries")?
            .or(parse_count(config, "concurrency")?)
            .unwrap_or(1);

        let warmup = parse_count(config, "warmup")?.unwrap_or(0);

        let data_size = match config.get("data_size") {
            None | Some(Value::Null) => DataSize::default(),
            Some(Value::String(s)) => match s.as_str() {
                "small" => DataSize::Small,
                "medium" => DataSize::Medium,
                "large" => DataSize::Large,
                other => {
                    return Err(Error::Config(format!(
                        "data_size must be small, medium or large, got {other}"
                    )))
                }
            },
            Some(other) => {
                return Err(Error::Config(format!("data_size must be a string, got {other}")))
            }
        };

        Ok(Self {
            rows,
            operations,
            concurrency,
            warmup,
            data_size,
        })
    }

    /// Operation count for write-style phases.
    ///
    /// A numeric `operations` value overrides `rows`.
    #[must_use]
    pub const fn rows(&self) -> usize {
        match self.operations {
            OperationSpec::Count(n) => n,
            _ => self.rows,
        }
    }

    /// Phase selection for this workload.
    #[must_use]
    pub const fn operations(&self) -> &OperationSpec {
        &self.operations
    }

    /// Simulated concurrent users (W). Always at least 1 for execution.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Untimed operations executed before the first measured phase.
    #[must_use]
    pub const fn warmup(&self) -> usize {
        self.warmup
    }

    /// Payload size tier for generated values.
    #[must_use]
    pub const fn data_size(&self) -> DataSize {
        self.data_size
    }

    /// Resolve the phase list to execute, given the adapter's defaults.
    ///
    /// A numeric `operations` count restricts the workload to the adapter's
    /// single default write phase so the recorded operation total equals the
    /// requested count exactly.
    #[must_use]
    pub fn phases(&self, default_phases: &[&str], default_write_phase: &str) -> Vec<String> {
        match &self.operations {
            OperationSpec::Default => default_phases.iter().map(ToString::to_string).collect(),
            OperationSpec::Count(_) => vec![default_write_phase.to_string()],
            OperationSpec::Phases(phases) => phases.clone(),
        }
    }
}

fn parse_count(config: &Value, key: &str) -> Result<Option<usize>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let v = n
                .as_u64()
                .ok_or_else(|| Error::Config(format!("{key} must be a non-negative integer")))?;
            Ok(Some(usize::try_from(v).unwrap_or(usize::MAX)))
        }
        Some(other) => Err(Error::Config(format!("{key} must be a number, got {other}"))),
    }
}
