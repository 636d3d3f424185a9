//! Error types for optibench
//!
//! Every variant carries a stable kind tag (see [`Error::kind`]) that is
//! written into an experiment's failure results as `error_type`.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Optibench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Requested backend type is not in the adapter registry
    #[error("unsupported backend type: {requested}. Supported types: {supported}")]
    InvalidBackendType {
        /// Backend type string as requested by the caller
        requested: String,
        /// Comma-separated list of registered backend types
        supported: String,
    },

    /// Experiment id is unknown
    #[error("experiment with id {0} not found")]
    NotFound(String),

    /// Re-entrant run attempt while the experiment is already executing
    #[error("experiment {0} is already running")]
    AlreadyRunning(String),

    /// Failure inside prepare/execute of a benchmark adapter
    #[error("benchmark execution failed: {source}")]
    BenchmarkExecutionFailed {
        /// Original failure, preserved for diagnostics
        #[source]
        source: Box<Error>,
    },

    /// Connection provider could not supply a usable connection/session
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Malformed workload configuration
    #[error("invalid workload configuration: {0}")]
    Config(String),

    /// Backend operation error surfaced by an adapter
    #[error("backend operation failed: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable kind tag for this error, used as `error_type` in results.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBackendType { .. } => "invalid_backend_type",
            Self::NotFound(_) => "not_found",
            Self::AlreadyRunning(_) => "already_running",
            Self::BenchmarkExecutionFailed { .. } => "benchmark_execution_failed",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Config(_) => "config",
            Self::Backend(_) => "backend",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
