//! Integration tests for sync retry module
//!
//! Drives a step-wise operation with `RetryStrategy` the way reconciliation
//! workers do: the caller owns the loop and sleeps between attempts.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use costsync_common::error::{CommonError, ErrorClassification};
use costsync_common::sync::retry::RetryStrategy;

async fn drive<F>(strategy: &RetryStrategy, mut op: F) -> (Result<(), CommonError>, u32)
where
    F: FnMut(u32) -> Result<(), CommonError>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match op(attempts) {
            Ok(()) => return (Ok(()), attempts),
            Err(err) if err.is_retryable() && strategy.should_retry(attempts) => {
                tokio::time::sleep(strategy.get_delay(attempts - 1)).await;
            }
            Err(err) => return (Err(err), attempts),
        }
    }
}

/// Transient failures are retried until the operation succeeds.
#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover() {
    let strategy = RetryStrategy::custom(5, Duration::from_millis(10), Duration::from_millis(40))
        .unwrap()
        .without_jitter();

    let (result, attempts) = drive(&strategy, |attempt| {
        if attempt < 3 {
            Err(CommonError::rate_limit(None))
        } else {
            Ok(())
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(attempts, 3);
}

/// Non-retryable errors stop the loop after one attempt.
#[tokio::test(start_paused = true)]
async fn test_terminal_failure_is_not_retried() {
    let strategy = RetryStrategy::new().without_jitter();
    let calls = AtomicU32::new(0);

    let (result, attempts) = drive(&strategy, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(CommonError::config_field("cost_center", "unknown cost center"))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Retries stop at `max_attempts` and the total wait is bounded by the cap.
#[tokio::test(start_paused = true)]
async fn test_retries_are_capped() {
    let strategy = RetryStrategy::custom(4, Duration::from_millis(100), Duration::from_millis(250))
        .unwrap()
        .without_jitter();
    let started = tokio::time::Instant::now();

    let (result, attempts) =
        drive(&strategy, |_| Err(CommonError::timeout("upsert", Duration::from_secs(1)))).await;

    assert!(result.is_err());
    assert_eq!(attempts, 4);
    // 100 + 200 + 250
    assert_eq!(started.elapsed(), Duration::from_millis(550));
}
