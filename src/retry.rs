//! Delays between connection attempts.

use std::time::Duration;

pub trait RetryPolicy: Send {
    /// How long to wait after failed connection attempt number `attempt`
    /// (0 based) before trying again.
    fn delay(&mut self, attempt: u32) -> Duration;

    /// Called once a connection has been established.
    fn reset(&mut self) {}
}

/// The same wait after every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval(pub Duration);

impl Default for FixedInterval {
    fn default() -> Self {
        FixedInterval(Duration::from_secs(10))
    }
}

impl RetryPolicy for FixedInterval {
    fn delay(&mut self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Doubling (or `multiplier`) backoff capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        ExponentialBackoff { initial, max, multiplier: 2.0 }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn delay(&mut self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(63) as i32);
        let secs = self.initial.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn delay(&mut self, attempt: u32) -> Duration {
        (**self).delay(attempt)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
