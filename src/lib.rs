//! # Optibench: Database Experiment Execution Engine
//!
//! Optibench runs configurable performance experiments against database
//! backends. Each experiment pairs a benchmark adapter (the workload) with a
//! process-level performance monitor (CPU, memory, latency percentiles) and
//! records the combined results on a persistent experiment record.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use optibench::service::ExperimentService;
//! use serde_json::json;
//!
//! # async fn demo() -> optibench::Result<()> {
//! let service = ExperimentService::in_memory();
//!
//! let experiment = service
//!     .create("kv-smoke", "keyvalue", json!({"operations": 100}))
//!     .await?;
//!
//! let finished = service.run(experiment.id()).await?;
//! println!("{}", serde_json::to_string_pretty(&finished.results())?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod bench;
pub mod config;
pub mod error;
pub mod experiment;
pub mod kv;
pub mod monitor;
pub mod runner;
pub mod service;

pub use error::{Error, Result};

/// Install a `tracing` subscriber honoring `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
