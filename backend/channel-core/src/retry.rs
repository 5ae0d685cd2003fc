//! Retry schedule for connect attempts against a target that is not loaded yet.
//!
//! Policies are plain [`Backoff`] implementations so tests can hand a parent a
//! fixed schedule and drive it with a paused Tokio clock.

use crate::config::{RetryConfig, RetryStrategy};

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::{Backoff, Constant};

/// The policy a parent endpoint consults between connect attempts.
pub type RetryPolicy = Box<dyn Backoff + Send>;

/// Caps another policy at a number of attempts.
///
/// `reset` restores the full budget, which a parent does whenever it manages
/// to open a session.
#[derive(Debug)]
pub struct AttemptLimit<B> {
    inner: B,
    max_attempts: u32,
    remaining: u32,
}

impl<B: Backoff> AttemptLimit<B> {
    pub fn new(inner: B, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts,
            remaining: max_attempts,
        }
    }
}

impl<B: Backoff> Backoff for AttemptLimit<B> {
    fn reset(&mut self) {
        self.remaining = self.max_attempts;
        self.inner.reset();
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.inner.next_backoff()
    }
}

impl RetryConfig {
    /// Build the policy described by this config.
    pub fn build_policy(&self) -> RetryPolicy {
        match (self.strategy, self.max_attempts) {
            (RetryStrategy::Fixed, None) => Box::new(self.fixed()),
            (RetryStrategy::Fixed, Some(max)) => Box::new(AttemptLimit::new(self.fixed(), max)),
            (RetryStrategy::Exponential, None) => Box::new(self.exponential()),
            (RetryStrategy::Exponential, Some(max)) => {
                Box::new(AttemptLimit::new(self.exponential(), max))
            }
        }
    }

    fn fixed(&self) -> Constant {
        Constant::new(self.initial_interval())
    }

    fn exponential(&self) -> ExponentialBackoff {
        // Attempt limits are counted by `AttemptLimit`; wall-clock limits would
        // not follow a paused test clock.
        ExponentialBackoff {
            current_interval: self.initial_interval(),
            initial_interval: self.initial_interval(),
            max_interval: self.max_interval(),
            multiplier: self.multiplier,
            randomization_factor: self.randomization_factor,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
