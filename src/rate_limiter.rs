//! Bounded-concurrency limiter shared by every external call of a research run.
//!
//! At most `max_concurrency` calls are in flight at once and two dispatches are at least
//! `min_spacing` apart. The limiter can be shared process-wide (wrap it in an `Arc`) to
//! bound the aggregate load of concurrent runs.

use governor::{Quota, RateLimiter};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineSettings;
use crate::errors::AppError;

type DispatchPacer = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct CallLimiter {
    permits: Semaphore,
    pacer: Option<DispatchPacer>,
    max_concurrency: usize,
}

impl CallLimiter {
    /// A zero spacing disables pacing. Concurrency is floored at 1.
    pub fn new(max_concurrency: usize, min_spacing: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Semaphore::new(max_concurrency),
            pacer: Quota::with_period(min_spacing).map(RateLimiter::direct),
            max_concurrency,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(
            settings.max_concurrency,
            Duration::from_millis(settings.min_dispatch_spacing_ms),
        )
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Calls currently allowed to start without waiting.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one external call under the limiter.
    ///
    /// Cancellation is observed while waiting for a permit, while waiting for the pacer
    /// and while the call is in flight. A cancelled call is dropped and reported as
    /// `PipelineCancelled`.
    pub async fn run<F, T>(&self, cancel: &CancellationToken, call: F) -> Result<T, AppError>
    where
        F: Future<Output = T>,
    {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::PipelineCancelled),
            permit = self.permits.acquire() => permit
                .map_err(|_| AppError::InternalError("call limiter closed".to_string()))?,
        };

        if let Some(pacer) = &self.pacer {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::PipelineCancelled),
                _ = pacer.until_ready() => {}
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::PipelineCancelled),
            output = call => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn never_exceeds_max_concurrency() {
        let limiter = Arc::new(CallLimiter::new(2, Duration::ZERO));
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let calls = (0..8).map(|_| {
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                limiter
                    .run(&cancel, async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.available_permits(), 2);
    }

    #[tokio::test]
    async fn spaces_dispatches() {
        let limiter = CallLimiter::new(4, Duration::from_millis(30));
        let cancel = CancellationToken::new();
        let started = Instant::now();
        for _ in 0..3 {
            limiter.run(&cancel, async {}).await.unwrap();
        }
        // first dispatch is immediate, the next two wait one period each
        assert!(started.elapsed() >= Duration::from_millis(55));
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_call() {
        let limiter = CallLimiter::new(1, Duration::ZERO);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = limiter
            .run(&cancel, tokio::time::sleep(Duration::from_secs(30)))
            .await;
        assert!(matches!(result, Err(AppError::PipelineCancelled)));
        assert_eq!(limiter.available_permits(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_token_rejects_immediately() {
        let limiter = CallLimiter::new(1, Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = limiter.run(&cancel, async { 42 }).await;
        assert!(matches!(result, Err(AppError::PipelineCancelled)));
    }
}
