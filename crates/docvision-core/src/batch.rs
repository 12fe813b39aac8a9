//! Bounded-concurrency fan-out over a batch of documents.
//!
//! Spawns one tokio task per item, bounded by a semaphore, and hands the
//! results back in input order so responses line up with requests.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Run `f` over every item with at most `parallel` in flight.
///
/// Results are returned in the same order as `items`. A task that panics
/// yields `Err` with the panic message instead of failing the whole batch.
pub async fn run_ordered<T, R, F, Fut>(items: Vec<T>, parallel: usize, f: F) -> Vec<Result<R, String>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(parallel.max(1)));
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("Batch semaphore closed unexpectedly, stopping batch");
                break;
            }
        };

        let fut = f(item);
        handles.push(tokio::spawn(async move {
            let result = fut.await;
            drop(permit); // Release concurrency permit as soon as the work is done
            result
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(Ok(result)),
            Err(e) => {
                tracing::error!("Batch task panicked: {e}");
                results.push(Err(format!("task failed: {e}")));
            }
        }
    }
    results
}
