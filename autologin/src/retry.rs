//! The one bounded retry-with-interval primitive.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Runs `op` up to `max_attempts` times, sleeping `interval` between
/// attempts. Returns the first value the operation yields; `None` when every
/// attempt missed. No sleep follows the final attempt or a successful one.
///
/// The attempt number passed to `op` is 1-indexed.
pub async fn retry_with_interval<T, F, Fut>(
    max_attempts: u32,
    interval: Duration,
    mut op: F,
) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=max_attempts {
        if let Some(value) = op(attempt).await {
            return Some(value);
        }
        if attempt < max_attempts {
            debug!(attempt, ?interval, "attempt missed, sleeping before the next");
            tokio::time::sleep(interval).await;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success_without_sleeping_after_it() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = retry_with_interval(5, Duration::from_secs(30), |attempt| {
            calls.fetch_add(1, Ordering::Relaxed);
            async move { (attempt == 2).then_some(attempt) }
        })
        .await;

        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        // One sleep happened, between attempts 1 and 2.
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_sleeps_between_attempts_only() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Option<()> = retry_with_interval(3, Duration::from_secs(30), |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { None }
        })
        .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let started = Instant::now();
        let result: Option<()> =
            retry_with_interval(1, Duration::from_secs(30), |_| async { None }).await;
        assert_eq!(result, None);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
