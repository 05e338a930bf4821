//! Opt-in retry loop for remote calls.
//!
//! `max_retries = 0` runs the call exactly once. Delays grow as
//! 1s, 2s, 4s, ... capped at 32s.

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

/// Outcome of a single attempt.
pub enum Attempt<T> {
    Done(T),
    /// Transient failure (rate limit, 5xx, transport error).
    Retry(Error),
    /// Permanent failure; returned immediately.
    Fail(Error),
}

pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

pub fn with_backoff<T>(max_retries: u32, mut call: impl FnMut() -> Attempt<T>) -> Result<T> {
    let mut last_err = None;
    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            warn!(attempt, delay_secs = delay.as_secs(), "retrying remote call");
            std::thread::sleep(delay);
        }
        match call() {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fail(err) => return Err(err),
            Attempt::Retry(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Operation("remote call failed".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_retries_calls_once() {
        let mut calls = 0;
        let result: Result<()> = with_backoff(0, || {
            calls += 1;
            Attempt::Retry(Error::GenerationFailed("503".into()))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(Error::GenerationFailed(_))));
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let mut calls = 0;
        let result: Result<()> = with_backoff(3, || {
            calls += 1;
            Attempt::Fail(Error::GenerationFailed("400".into()))
        });
        assert_eq!(calls, 1);
        assert!(result.is_err());
    }

    #[test]
    fn delays_double_and_cap() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(20), Duration::from_secs(32));
    }
}
