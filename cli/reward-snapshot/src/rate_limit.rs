//! Shared upstream rate limiting.
//!
//! One `RateLimiter` is created per run and handed to every component that
//! talks to the network. Tests build their own isolated instances.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::error::ChainError;

/// Bounds in-flight network calls and paces fan-out batches.
#[derive(Debug)]
pub struct RateLimiter {
    permits: Semaphore,
    batch_size: usize,
    batch_delay: Duration,
}

impl RateLimiter {
    pub fn new(max_concurrency: usize, batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_concurrency.max(1)),
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// A limiter that never waits between batches. Handy in tests.
    pub fn unthrottled(max_concurrency: usize) -> Self {
        Self::new(max_concurrency, max_concurrency, Duration::ZERO)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Runs one network call while holding a permit.
    pub async fn limited<T, F>(&self, call: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ChainError::LimiterClosed)?;
        call.await
    }

    /// Maps `items` through `task` in batches of `batch_size`, running each
    /// batch concurrently and sleeping `batch_delay` between batches.
    ///
    /// Output order matches input order.
    pub async fn run_batched<I, T, R, F, Fut>(&self, items: I, task: F) -> Vec<R>
    where
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let items: Vec<T> = items.into_iter().collect();
        let mut results = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter().peekable();

        while remaining.peek().is_some() {
            let batch: Vec<Fut> = remaining.by_ref().take(self.batch_size).map(&task).collect();
            results.extend(futures::future::join_all(batch).await);

            if remaining.peek().is_some() && !self.batch_delay.is_zero() {
                sleep(self.batch_delay).await;
            }
        }

        results
    }
}
