use crate::config::{RetryConfig, RetryStrategy};
use crate::retry::AttemptLimit;

use std::time::Duration;

use backoff::backoff::{Backoff, Constant};

#[test]
fn given_fixed_strategy_when_polled_then_same_delay_every_time() {
    // GIVEN: A fixed 100ms policy
    let config = RetryConfig {
        strategy: RetryStrategy::Fixed,
        initial_interval_ms: 100,
        ..RetryConfig::default()
    };
    let mut policy = config.build_policy();

    // WHEN/THEN: Every delay is 100ms, forever
    for _ in 0..10 {
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(100)));
    }
}

/// **VALUE**: Verifies exponential delays grow and then stay at the cap.
///
/// **WHY THIS MATTERS**: A target that never loads should not be polled at the
/// initial rate forever, and the cap keeps the worst-case wait bounded once it
/// does load.
#[test]
fn given_exponential_strategy_without_jitter_when_polled_then_grows_to_cap() {
    // GIVEN: 50ms doubling, capped at 400ms, no jitter
    let config = RetryConfig {
        strategy: RetryStrategy::Exponential,
        initial_interval_ms: 50,
        max_interval_ms: 400,
        multiplier: 2.0,
        randomization_factor: 0.0,
        max_attempts: None,
    };
    let mut policy = config.build_policy();

    // WHEN: Polling
    let delays: Vec<u64> = (0..6)
        .map(|_| policy.next_backoff().unwrap().as_millis() as u64)
        .collect();

    // THEN: Doubling until the cap
    assert_eq!(delays, vec![50, 100, 200, 400, 400, 400]);
}

#[test]
fn given_attempt_limit_when_exhausted_then_none_until_reset() {
    // GIVEN: Three attempts
    let mut policy = AttemptLimit::new(Constant::new(Duration::from_millis(10)), 3);

    // WHEN: Polling past the limit
    let delays: Vec<Option<Duration>> = (0..4).map(|_| policy.next_backoff()).collect();

    // THEN: Three delays, then exhausted
    assert_eq!(delays.iter().filter(|delay| delay.is_some()).count(), 3);
    assert_eq!(delays[3], None);

    // AND: Reset restores the budget
    policy.reset();
    assert_eq!(policy.next_backoff(), Some(Duration::from_millis(10)));
}

#[test]
fn given_max_attempts_in_config_when_built_then_policy_is_limited() {
    let config = RetryConfig {
        strategy: RetryStrategy::Fixed,
        max_attempts: Some(2),
        ..RetryConfig::default()
    };
    let mut policy = config.build_policy();

    assert!(policy.next_backoff().is_some());
    assert!(policy.next_backoff().is_some());
    assert_eq!(policy.next_backoff(), None);
}
