//! Bounded exponential-backoff retry for external calls.
//!
//! This module provides:
//! - [`compute_backoff`]: delay calculator with jitter.
//! - [`RetryPolicy`]: the retry loop shared by the log source and the chain
//!   client. It retries only failures classified as transient by
//!   [`IndexerError::is_transient`] and aborts a pending backoff as soon as
//!   the shutdown token is cancelled.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::IndexerError;

/// Computes the delay before the `attempt`-th retry (1-based).
///
/// `delay = base_delay * 2^(attempt - 1)`, capped at `max_delay`, then
/// stretched by a factor in `[1, 1 + jitter]`.
#[must_use]
pub fn compute_backoff(cfg: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let base = cfg.base_delay.as_secs_f64() * f64::from(1_u32 << exponent);
    let capped = base.min(cfg.max_delay.as_secs_f64());

    let factor = if cfg.jitter > 0.0 {
        // Pseudo-random fraction from the clock's sub-second nanos.
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        1.0 + f64::from(nanos % 1_000_000) / 1_000_000.0 * cfg.jitter
    } else {
        1.0
    };

    Duration::from_secs_f64(capped * factor)
}

/// Retry loop bound to a configuration and a shutdown token.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl RetryPolicy {
    /// Creates a policy that stops waiting when `cancel` fires.
    #[must_use]
    pub const fn new(config: RetryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempt budget
    /// is spent.
    ///
    /// An attempt already in flight is never interrupted; cancellation is
    /// observed only while sleeping between attempts.
    ///
    /// # Errors
    ///
    /// - the first permanent error, unchanged;
    /// - [`IndexerError::RetryExhausted`] once `max_attempts` transient
    ///   failures have been seen;
    /// - [`IndexerError::Cancelled`] if shutdown is requested during a backoff.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                tracing::warn!(operation, attempt, error = %err, "retries exhausted");
                return Err(IndexerError::RetryExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = compute_backoff(&self.config, attempt);
            tracing::warn!(
                operation,
                attempt,
                max = max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient failure, retrying"
            );

            tokio::select! {
                () = self.cancel.cancelled() => return Err(IndexerError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter: 0.0,
            ..RetryConfig::default()
        }
    }

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<u32, IndexerError>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                std::future::ready(Err(IndexerError::Transport("connection reset".into())))
            } else {
                std::future::ready(Ok(n))
            }
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = RetryConfig {
            max_delay: Duration::from_millis(1000),
            ..no_jitter()
        };
        assert_eq!(compute_backoff(&cfg, 1), Duration::from_millis(200));
        assert_eq!(compute_backoff(&cfg, 2), Duration::from_millis(400));
        assert_eq!(compute_backoff(&cfg, 3), Duration::from_millis(800));
        assert_eq!(compute_backoff(&cfg, 4), Duration::from_millis(1000));
        assert_eq!(compute_backoff(&cfg, 40), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_in_band() {
        let cfg = RetryConfig::default();
        for attempt in 1..=4 {
            let delay = compute_backoff(&cfg, attempt);
            let base = compute_backoff(&no_jitter(), attempt);
            assert!(delay >= base, "attempt {attempt}: {delay:?} < {base:?}");
            assert!(delay <= base.mul_f64(1.25), "attempt {attempt}: {delay:?} too long");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fifth_attempt_after_full_schedule() {
        let policy = RetryPolicy::new(RetryConfig::default(), CancellationToken::new());
        let calls = Arc::new(AtomicU32::new(0));

        let start = Instant::now();
        let result = policy.run("get_trade", flaky(4, Arc::clone(&calls))).await;
        let elapsed = start.elapsed();

        let Ok(value) = result else {
            panic!("fifth attempt should succeed");
        };
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // 200 + 400 + 800 + 1600 ms, each stretched by at most 25% plus timer rounding.
        assert!(elapsed >= Duration::from_millis(3000), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(3760), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_exhausts_budget() {
        let policy = RetryPolicy::new(no_jitter(), CancellationToken::new());
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy.run("get_trade", flaky(6, Arc::clone(&calls))).await;

        let Err(IndexerError::RetryExhausted { attempts, last_error }) = result else {
            panic!("expected RetryExhausted");
        };
        assert_eq!(attempts, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(last_error.contains("connection reset"));
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let policy = RetryPolicy::new(no_jitter(), CancellationToken::new());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), IndexerError> = policy
            .run("get_trade", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(IndexerError::Rpc {
                    code: 3,
                    message: "execution reverted".into(),
                }))
            })
            .await;

        assert!(matches!(result, Err(IndexerError::Rpc { code: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::new(no_jitter(), cancel.clone());
        let calls = Arc::new(AtomicU32::new(0));
        cancel.cancel();

        let result = policy.run("height", flaky(10, Arc::clone(&calls))).await;

        assert!(matches!(result, Err(IndexerError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_budget_does_not_sleep() {
        let cfg = RetryConfig {
            max_attempts: 1,
            ..no_jitter()
        };
        let policy = RetryPolicy::new(cfg, CancellationToken::new());
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy.run("height", flaky(1, Arc::clone(&calls))).await;
        tokio_test::assert_err!(&result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
