//! End-to-end experiment lifecycle tests
//!
//! Exercises the full create → run → results path over the in-memory
//! service wiring: status transitions, results document shape, the
//! operation-count guarantee, and the error taxonomy.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use optibench::bench::{BackendType, Benchmark, BenchmarkReport, PhaseSummary};
use optibench::config::WorkloadConfig;
use optibench::experiment::{ExperimentStatus, MemoryExperimentStore};
use optibench::monitor::PerformanceMonitor;
use optibench::service::ExperimentService;
use optibench::Error;

/// Scripted adapter for exercising orchestrator error handling.
struct ScriptedBenchmark {
    prepare_error: Option<&'static str>,
    cleanup_fails: bool,
}

#[async_trait]
impl Benchmark for ScriptedBenchmark {
    async fn prepare(&mut self, _config: &WorkloadConfig) -> optibench::Result<()> {
        match self.prepare_error {
            Some(msg) => Err(Error::BackendUnavailable(msg.to_string())),
            None => Ok(()),
        }
    }

    async fn execute(
        &mut self,
        _config: &WorkloadConfig,
        monitor: &Arc<PerformanceMonitor>,
    ) -> optibench::Result<BenchmarkReport> {
        monitor.record_operation(0.001);
        let mut report = BenchmarkReport::new();
        report.insert("noop".to_string(), PhaseSummary::write(1, 0.001));
        Ok(report)
    }

    async fn cleanup(&mut self) -> optibench::Result<()> {
        if self.cleanup_fails {
            Err(Error::Backend("scratch removal rejected".to_string()))
        } else {
            Ok(())
        }
    }
}

fn scripted_service(prepare_error: Option<&'static str>, cleanup_fails: bool) -> ExperimentService {
    ExperimentService::builder(Arc::new(MemoryExperimentStore::new()))
        .adapter(BackendType::Search, move || {
            Box::new(ScriptedBenchmark {
                prepare_error,
                cleanup_fails,
            })
        })
        .build()
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_create_yields_pending_record_with_null_results() -> Result<()> {
    let service = ExperimentService::in_memory();

    let exp = service
        .create("kv-smoke", "keyvalue", json!({"rows": 50}))
        .await?;

    assert!(!exp.id().is_empty());
    assert_eq!(exp.name(), "kv-smoke");
    assert_eq!(exp.backend_type(), BackendType::KeyValue);
    assert_eq!(exp.status(), ExperimentStatus::Pending);
    assert!(exp.results().is_none());

    // The record is persisted and retrievable.
    let fetched = service.get(exp.id()).await?;
    assert_eq!(fetched, exp);
    Ok(())
}

#[tokio::test]
async fn test_create_normalizes_backend_type_spelling() -> Result<()> {
    let service = ExperimentService::in_memory();

    let exp = service.create("kv", "Key-Value", json!({})).await?;
    assert_eq!(exp.backend_type(), BackendType::KeyValue);
    Ok(())
}

#[tokio::test]
async fn test_create_unknown_backend_persists_nothing() {
    let service = ExperimentService::in_memory();

    let err = service
        .create("bad", "graph", json!({}))
        .await
        .expect_err("unknown backend must be rejected");

    assert_eq!(err.kind(), "invalid_backend_type");
    // The message enumerates the registered set.
    let msg = err.to_string();
    assert!(msg.contains("keyvalue"), "missing keyvalue in: {msg}");
    assert!(msg.contains("document"), "missing document in: {msg}");
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_returns_creation_order() -> Result<()> {
    let service = ExperimentService::in_memory();

    let a = service.create("first", "keyvalue", json!({})).await?;
    let b = service.create("second", "document", json!({})).await?;
    let c = service.create("third", "keyvalue", json!({})).await?;

    let ids: Vec<String> = service
        .list()
        .await?
        .iter()
        .map(|e| e.id().to_string())
        .collect();
    assert_eq!(ids, vec![a.id(), b.id(), c.id()]);
    Ok(())
}

// =============================================================================
// Execution: success path
// =============================================================================

#[tokio::test]
async fn test_run_keyvalue_operation_count_matches_request() -> Result<()> {
    let service = ExperimentService::in_memory();

    let exp = service
        .create("kv-100", "keyvalue", json!({"operations": 100}))
        .await?;
    let finished = service.run(exp.id()).await?;

    assert_eq!(finished.status(), ExperimentStatus::Completed);
    let results = finished.results().expect("completed run has results");

    // A numeric `operations` value pins the measured count exactly.
    assert_eq!(results["performance_metrics"]["total_queries"], 100);
    assert_eq!(results["benchmark_results"]["set"]["operations"], 100);
    Ok(())
}

#[tokio::test]
async fn test_run_results_document_shape() -> Result<()> {
    let service = ExperimentService::in_memory();

    let exp = service
        .create(
            "kv-shape",
            "keyvalue",
            json!({"rows": 40, "concurrent_queries": 4}),
        )
        .await?;
    let finished = service.run(exp.id()).await?;
    let results = finished.results().expect("completed run has results");

    let bench = results["benchmark_results"]
        .as_object()
        .expect("benchmark_results is an object");
    assert!(bench.contains_key("set"));
    assert!(bench.contains_key("get"));

    let metrics = &results["performance_metrics"];
    for field in [
        "duration_seconds",
        "total_queries",
        "ops_per_second",
        "latency_ms",
        "cpu_percent",
        "memory_mb",
    ] {
        assert!(!metrics[field].is_null(), "missing metrics field {field}");
    }
    assert!(metrics["latency_ms"]["p95"].is_number());
    assert!(metrics["duration_seconds"].as_f64().unwrap() >= 0.0);
    Ok(())
}

#[tokio::test]
async fn test_run_document_backend_end_to_end() -> Result<()> {
    let service = ExperimentService::in_memory();

    let exp = service
        .create(
            "doc-full",
            "document",
            json!({
                "rows": 30,
                "operations": ["insert", "find", "update", "aggregate"],
            }),
        )
        .await?;
    let finished = service.run(exp.id()).await?;

    assert_eq!(finished.status(), ExperimentStatus::Completed);
    let bench = &finished.results().expect("results")["benchmark_results"];
    assert_eq!(bench["insert"]["operations"], 30);
    assert!(bench["find"]["avg_time_seconds"].is_number());
    assert!(bench["aggregate"]["operations"].as_u64().unwrap() > 0);
    Ok(())
}

#[tokio::test]
async fn test_rerun_completed_experiment_overwrites_results() -> Result<()> {
    let service = ExperimentService::in_memory();

    let exp = service
        .create("kv-rerun", "keyvalue", json!({"operations": 5}))
        .await?;
    let first = service.run(exp.id()).await?;
    let second = service.run(exp.id()).await?;

    assert_eq!(second.status(), ExperimentStatus::Completed);
    assert_eq!(
        second.results().expect("results")["performance_metrics"]["total_queries"],
        first.results().expect("results")["performance_metrics"]["total_queries"],
    );
    Ok(())
}

// =============================================================================
// Execution: error paths
// =============================================================================

#[tokio::test]
async fn test_run_unknown_id_is_not_found() {
    let service = ExperimentService::in_memory();
    let err = service.run("missing").await.expect_err("must fail");
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn test_concurrent_runs_one_wins() -> Result<()> {
    let service = Arc::new(ExperimentService::in_memory());

    let exp = service
        .create(
            "kv-race",
            "keyvalue",
            json!({"rows": 2000, "concurrent_queries": 4}),
        )
        .await?;
    let id = exp.id().to_string();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        let id = id.clone();
        handles.push(tokio::spawn(async move { service.run(&id).await }));
    }

    let mut completed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(exp) => {
                assert_eq!(exp.status(), ExperimentStatus::Completed);
                completed += 1;
            }
            Err(e) => {
                assert_eq!(e.kind(), "already_running");
                rejected += 1;
            }
        }
    }
    assert_eq!(completed, 1, "exactly one run must win the claim");
    assert_eq!(rejected, 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_run_records_error_document() -> Result<()> {
    let service = ExperimentService::in_memory();

    // An unknown phase name fails inside execute.
    let exp = service
        .create("kv-bad-phase", "keyvalue", json!({"operations": ["explode"]}))
        .await?;

    let err = service.run(exp.id()).await.expect_err("must fail");
    assert_eq!(err.kind(), "benchmark_execution_failed");

    let stored = service.get(exp.id()).await?;
    assert_eq!(stored.status(), ExperimentStatus::Failed);
    let results = stored.results().expect("failed run has results");
    assert!(results["error"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(results["error_type"], "config");
    Ok(())
}

#[tokio::test]
async fn test_unavailable_backend_recorded_in_failure_results() -> Result<()> {
    let service = scripted_service(Some("connection refused"), false);

    let exp = service.create("down", "search", json!({})).await?;
    let err = service.run(exp.id()).await.expect_err("must fail");
    assert_eq!(err.kind(), "benchmark_execution_failed");

    let stored = service.get(exp.id()).await?;
    assert_eq!(stored.status(), ExperimentStatus::Failed);
    let results = stored.results().expect("failed run has results");
    assert_eq!(results["error_type"], "backend_unavailable");
    assert!(results["error"]
        .as_str()
        .is_some_and(|s| s.contains("connection refused")));
    Ok(())
}

#[tokio::test]
async fn test_cleanup_failure_still_completes() -> Result<()> {
    let service = scripted_service(None, true);

    let exp = service.create("messy", "search", json!({})).await?;
    let finished = service.run(exp.id()).await?;

    assert_eq!(finished.status(), ExperimentStatus::Completed);
    let results = finished.results().expect("results");
    assert_eq!(results["benchmark_results"]["noop"]["operations"], 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_run_releases_claim_for_retry() -> Result<()> {
    let service = ExperimentService::in_memory();

    let exp = service
        .create("kv-retry", "keyvalue", json!({"operations": ["explode"]}))
        .await?;
    let _ = service.run(exp.id()).await.expect_err("first run fails");

    // Failed status is not Running, and the claim is released.
    let err = service.run(exp.id()).await.expect_err("same bad config");
    assert_eq!(err.kind(), "benchmark_execution_failed");
    Ok(())
}
