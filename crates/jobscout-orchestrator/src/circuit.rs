//! Per-board circuit breaker.
//!
//! A breaker counts consecutive session-level failures for one board. Once
//! the count reaches the board's threshold it opens, and attempts fail fast
//! until the cooldown has elapsed. The first attempt after the cooldown is
//! a trial: success closes the breaker, failure opens it again.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Attempts pass through
    Closed,
    /// Attempts are rejected until the cooldown ends
    Open,
    /// One trial attempt is allowed
    HalfOpen,
}

/// Failure counter and trip state for one board.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitBreaker {
    /// Breaker that opens after `threshold` consecutive failures.
    #[must_use]
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    /// State as of `now`.
    #[must_use]
    pub fn state(&self, now: Instant) -> CircuitState {
        match self.opened_at {
            None => CircuitState::Closed,
            Some(opened) if now.duration_since(opened) < self.cooldown => CircuitState::Open,
            Some(_) => CircuitState::HalfOpen,
        }
    }

    /// Consecutive failures since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Ask to start an attempt. Returns the remaining wait when rejected.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        match (self.state(now), self.opened_at) {
            (CircuitState::Closed, _) => Ok(()),
            (CircuitState::Open, Some(opened)) => {
                Err(self.cooldown.saturating_sub(now.duration_since(opened)))
            }
            (CircuitState::HalfOpen, _) if !self.trial_in_flight => {
                self.trial_in_flight = true;
                Ok(())
            }
            _ => Err(self.cooldown),
        }
    }

    /// Attempt finished without a session-level fault.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
    }

    /// Attempt failed with a session-level fault.
    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.trial_in_flight || self.consecutive_failures >= self.threshold {
            self.opened_at = Some(now);
        }
        self.trial_in_flight = false;
    }

    /// Attempt ended without telling us anything about the board.
    pub fn release_trial(&mut self) {
        self.trial_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[test]
    fn test_opens_after_threshold() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, COOLDOWN);

        breaker.record_failure(now);
        breaker.record_failure(now);
        assert_eq!(breaker.state(now), CircuitState::Closed);
        assert!(breaker.try_acquire(now).is_ok());

        breaker.record_failure(now);
        assert_eq!(breaker.state(now), CircuitState::Open);

        let wait = breaker.try_acquire(now + Duration::from_secs(20)).unwrap_err();
        assert_eq!(wait, Duration::from_secs(40));
    }

    #[test]
    fn test_success_resets_count() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(2, COOLDOWN);
        breaker.record_failure(now);
        breaker.record_success();
        breaker.record_failure(now);
        assert_eq!(breaker.state(now), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[test]
    fn test_half_open_allows_single_trial() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(1, COOLDOWN);
        breaker.record_failure(now);

        let later = now + COOLDOWN;
        assert_eq!(breaker.state(later), CircuitState::HalfOpen);
        assert!(breaker.try_acquire(later).is_ok());
        assert!(breaker.try_acquire(later).is_err());

        breaker.record_success();
        assert_eq!(breaker.state(later), CircuitState::Closed);
    }

    #[test]
    fn test_failed_trial_reopens() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(5, COOLDOWN);
        for _ in 0..5 {
            breaker.record_failure(now);
        }

        let later = now + COOLDOWN;
        assert!(breaker.try_acquire(later).is_ok());
        breaker.record_failure(later);
        assert_eq!(breaker.state(later), CircuitState::Open);
        assert_eq!(breaker.state(later + COOLDOWN), CircuitState::HalfOpen);
    }

    #[test]
    fn test_released_trial_can_be_retaken() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::ZERO);
        breaker.record_failure(now);
        assert!(breaker.try_acquire(now).is_ok());
        breaker.release_trial();
        assert!(breaker.try_acquire(now).is_ok());
    }
}
