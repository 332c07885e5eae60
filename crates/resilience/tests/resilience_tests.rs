// crates/resilience/tests/resilience_tests.rs
//! Integration tests for resilience patterns

use laboursync_resilience::{with_timeout, ResilienceError, RetryPolicy};
use std::time::Duration;

#[test]
fn test_outbox_backoff_schedule() {
    let policy = RetryPolicy::new()
        .with_initial_delay(Duration::from_millis(1000))
        .with_max_delay(Duration::from_millis(30_000));

    let schedule: Vec<u64> = (0..6)
        .map(|retry_count| policy.delay_after_failures(retry_count).as_millis() as u64)
        .collect();

    assert_eq!(schedule, vec![2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
}

#[test]
fn test_backoff_is_monotonic() {
    let policy = RetryPolicy::default();
    let mut previous = Duration::ZERO;

    for attempt in 0..64 {
        let delay = policy.delay_for_attempt(attempt);
        assert!(delay >= previous, "attempt {} went backwards", attempt);
        previous = delay;
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_sleep_respects_timeout() {
    let policy = RetryPolicy::default();
    let deadline = Duration::from_secs(3);

    let short = with_timeout(deadline, tokio::time::sleep(policy.delay_after_failures(0))).await;
    assert!(short.is_ok());

    let long = with_timeout(deadline, tokio::time::sleep(policy.delay_after_failures(1))).await;
    assert!(matches!(long, Err(ResilienceError::Timeout(_))));
}

#[tokio::test]
async fn test_timeout_passes_through_results() {
    let result: Result<Result<u8, String>, _> =
        with_timeout(Duration::from_secs(1), async { Err("boom".to_string()) }).await;

    assert_eq!(result.ok(), Some(Err("boom".to_string())));
}
