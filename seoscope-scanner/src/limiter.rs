//! Bounded-concurrency batch execution.

use crate::error::{Result, ScanError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Runs a batch of async task factories with at most `limit` of them in
/// flight, returning their outputs in input order.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ScanError::InvalidConcurrency(limit));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Execute every factory and wait for all of them to settle.
    ///
    /// A factory is only invoked once a slot is free, so nothing it does
    /// (including building its future) happens ahead of the bound. The
    /// permit travels with the spawned task and is released when the task
    /// finishes, whether it returns or panics. A panicking task yields
    /// `Err(ScanError::JoinError)` in its own slot and leaves its siblings
    /// running.
    pub async fn run_all<I, F, Fut, T>(&self, factories: I) -> Vec<Result<T>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::new();

        for factory in factories {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => unreachable!("limiter semaphore is never closed"),
            };

            let task = factory();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                task.await
            }));
        }

        debug!("Dispatched {} tasks with limit {}", handles.len(), self.limit);

        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.map_err(ScanError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            ConcurrencyLimiter::new(0),
            Err(ScanError::InvalidConcurrency(0))
        ));
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        for limit in [1usize, 2, 3, 7] {
            let limiter = ConcurrencyLimiter::new(limit).unwrap();
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let factories = (0..20).map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2 + (i % 3) as u64)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            });

            let results = limiter.run_all(factories).await;
            assert_eq!(results.len(), 20);
            assert!(peak.load(Ordering::SeqCst) <= limit);
        }
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let limiter = ConcurrencyLimiter::new(4).unwrap();
        // Earlier tasks sleep longer so they finish last.
        let factories = (0..8u64).map(|i| {
            move || async move {
                tokio::time::sleep(Duration::from_millis((8 - i) * 5)).await;
                i
            }
        });

        let results: Vec<u64> = limiter
            .run_all(factories)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(results, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_single_slot_serializes() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        let factories = (0..4).map(|i| {
            let log = log.clone();
            move || async move {
                log.lock().unwrap().push(format!("start {}", i));
                tokio::time::sleep(Duration::from_millis(3)).await;
                log.lock().unwrap().push(format!("end {}", i));
            }
        });

        limiter.run_all(factories).await;

        let log = log.lock().unwrap();
        let expected: Vec<String> = (0..4)
            .flat_map(|i| [format!("start {}", i), format!("end {}", i)])
            .collect();
        assert_eq!(*log, expected);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));

        let factories = (0..5).map(|i| {
            let finished = finished.clone();
            move || async move {
                if i == 1 {
                    panic!("task {} blew up", i);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                i
            }
        });

        let results = limiter.run_all(factories).await;

        assert_eq!(results.len(), 5);
        assert!(matches!(results[1], Err(ScanError::JoinError(_))));
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert_eq!(results[4].as_ref().unwrap(), &4);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let limiter = ConcurrencyLimiter::new(3).unwrap();
        let factories: Vec<fn() -> std::future::Ready<u8>> = Vec::new();
        assert!(limiter.run_all(factories).await.is_empty());
    }
}
