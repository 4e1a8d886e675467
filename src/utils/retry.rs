// src/utils/retry.rs

use std::{future::Future, time::Duration};

/// Bounded exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Default backoff with a different attempt budget.
    pub fn with_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// No sleeping between attempts, for tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_max: None,
        }
    }
}

/// Retries `f` while `should_retry` accepts the error and attempts remain.
/// The last error is returned unchanged.
pub async fn retry_when<F, Fut, T, E, P>(config: &RetryConfig, should_retry: P, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 || !should_retry(&e) {
                    return Err(e);
                }

                let extra = match config.jitter_max {
                    Some(jitter_max) if !jitter_max.is_zero() => {
                        let jitter_ms = jitter_max.as_millis() as u64;
                        Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
                    }
                    _ => Duration::ZERO,
                };
                let wait = backoff + extra;
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }

                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicUsize::new(0);
        let cfg = RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            jitter_max: None,
        };

        let res: Result<usize, &'static str> = retry_when(&cfg, |_| true, || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err("lost") } else { Ok(n) }
        })
        .await;

        assert_eq!(res, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), &'static str> = retry_when(&RetryConfig::immediate(2), |_| true, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("always")
        })
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_errors_return_immediately() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), &'static str> =
            retry_when(&RetryConfig::immediate(5), |e| *e == "transient", || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("fatal")
            })
            .await;

        assert_eq!(res, Err("fatal"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
