//! Shared exponential-backoff retry helper.
//!
//! Used by both the CAS remote backend and the scheduler: only transient
//! failure kinds (timeout, network error) are retried, capped at a small
//! constant number of attempts (spec.md §4.6, "Retry").

use std::thread::sleep;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let scaled = self.base_delay.saturating_mul(factor);
        std::cmp::min(scaled, self.max_delay)
    }
}

/// Runs `f` until it succeeds or `policy.max_attempts` is exhausted,
/// sleeping with exponential backoff between attempts. `f` returns
/// `Err(Some(err))` for a retryable failure or `Err(None)` to abort
/// immediately without further retries (e.g. a non-transient error).
pub fn retry_with_backoff<T, E>(
    policy: BackoffPolicy,
    mut f: impl FnMut(u32) -> Result<T, RetryOutcome<E>>,
) -> Result<T, E> {
    let mut attempt = 0;
    loop {
        match f(attempt) {
            Ok(value) => return Ok(value),
            Err(RetryOutcome::Fatal(e)) => return Err(e),
            Err(RetryOutcome::Retryable(e)) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(e);
                }
                sleep(policy.delay_for_attempt(attempt));
            }
        }
    }
}

pub enum RetryOutcome<E> {
    Retryable(E),
    Fatal(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<i32, &str> = retry_with_backoff(
            BackoffPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            |attempt| {
                calls.set(calls.get() + 1);
                if attempt < 2 {
                    Err(RetryOutcome::Retryable("not yet"))
                } else {
                    Ok(42)
                }
            },
        );
        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<i32, &str> = retry_with_backoff(BackoffPolicy::default(), |_| {
            calls.set(calls.get() + 1);
            Err(RetryOutcome::Fatal("compiler error"))
        });
        assert_eq!(result, Err("compiler error"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<i32, &str> = retry_with_backoff(
            BackoffPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            |_| {
                calls.set(calls.get() + 1);
                Err(RetryOutcome::Retryable("timeout"))
            },
        );
        assert_eq!(result, Err("timeout"));
        assert_eq!(calls.get(), 3);
    }
}
