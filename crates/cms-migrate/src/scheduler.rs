//! Bounded, order-preserving batch fan-out.
//!
//! Inputs are split into consecutive chunks of `concurrency` items. Each
//! chunk runs concurrently and must finish before the inter-batch delay and
//! the next chunk, so at most `concurrency` operations are ever in flight.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Chunked fan-out/fan-in executor.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    concurrency: usize,
    batch_delay: Duration,
    cancel: CancellationToken,
}

impl BatchScheduler {
    /// Creates a scheduler; a concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize, batch_delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            batch_delay,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops starting new chunks once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Configured concurrency.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `op(index, input)` for every input.
    ///
    /// The output has one slot per input, in input order. A slot is `None`
    /// only when cancellation prevented its chunk from starting; chunks that
    /// already started always complete.
    pub async fn run<T, R, F, Fut>(&self, inputs: Vec<T>, op: F) -> Vec<Option<R>>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = R>,
    {
        let total = inputs.len();
        let mut results: Vec<Option<R>> = Vec::with_capacity(total);
        let mut pending = inputs.into_iter().enumerate().peekable();
        let mut batch = 0usize;

        while pending.peek().is_some() {
            if self.cancel.is_cancelled() {
                info!(
                    "Cancelled before batch {}: {} of {} operations not started",
                    batch + 1,
                    total - results.len(),
                    total
                );
                break;
            }

            if batch > 0 && !self.batch_delay.is_zero() {
                tokio::select! {
                    () = self.cancel.cancelled() => continue,
                    () = tokio::time::sleep(self.batch_delay) => {}
                }
            }

            let chunk: Vec<_> = pending
                .by_ref()
                .take(self.concurrency)
                .map(|(index, input)| op(index, input))
                .collect();
            batch += 1;
            debug!("Batch {}: {} operations", batch, chunk.len());

            results.extend(join_all(chunk).await.into_iter().map(Some));
        }

        results.resize_with(total, || None);
        results
    }
}
