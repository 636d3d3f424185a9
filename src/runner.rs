//! Concurrent operation runner
//!
//! Fans a fixed operation count across W simulated concurrent users. Each
//! worker owns a contiguous index range and executes it sequentially; worker
//! results are concatenated in launch order and truncated to exactly N, so
//! the returned sequence reflects launch order, not global wall-clock order.
//! Aggregate statistics over it are therefore order-insensitive by design.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::monitor::PerformanceMonitor;
use crate::Result;

/// Execute `total` logical operations, optionally fanned out across
/// `concurrency` workers, recording each elapsed duration into `monitor`.
///
/// The operation closure receives the global operation index. With
/// `concurrency <= 1` all operations run strictly sequentially in index
/// order. Otherwise the index space is split into `concurrency` contiguous
/// ranges of `ceil(total / concurrency)`; trailing empty ranges spawn no
/// worker.
///
/// The returned sequence always has exactly `total` entries.
///
/// # Errors
///
/// Propagates the first operation failure after all workers have finished.
/// A failure aborts only the failing worker's remaining operations; sibling
/// workers run to completion.
pub async fn run_operations<F, Fut>(
    monitor: &Arc<PerformanceMonitor>,
    total: usize,
    concurrency: usize,
    op: F,
) -> Result<Vec<f64>>
where
    F: Fn(usize) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    if total == 0 {
        return Ok(Vec::new());
    }

    if concurrency <= 1 {
        return run_range(monitor, 0..total, op).await;
    }

    let chunk = total.div_ceil(concurrency);
    let mut handles = Vec::with_capacity(concurrency);
    for worker in 0..concurrency {
        let start = worker * chunk;
        if start >= total {
            break;
        }
        let end = (start + chunk).min(total);
        let monitor = Arc::clone(monitor);
        let op = op.clone();
        handles.push(tokio::spawn(async move {
            run_range(&monitor, start..end, op).await
        }));
    }

    // Join in launch order; a failed worker surfaces after siblings finish.
    let mut durations = Vec::with_capacity(total);
    let mut first_error = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(worker_durations)) => durations.extend(worker_durations),
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(join_error) => {
                if first_error.is_none() {
                    first_error = Some(crate::Error::Backend(format!(
                        "benchmark worker panicked: {join_error}"
                    )));
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    durations.truncate(total);
    Ok(durations)
}

async fn run_range<F, Fut>(
    monitor: &Arc<PerformanceMonitor>,
    range: std::ops::Range<usize>,
    op: F,
) -> Result<Vec<f64>>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut durations = Vec::with_capacity(range.len());
    for index in range {
        let started = Instant::now();
        op(index).await?;
        let elapsed = started.elapsed().as_secs_f64();
        monitor.record_operation(elapsed);
        durations.push(elapsed);
    }
    Ok(durations)
}
