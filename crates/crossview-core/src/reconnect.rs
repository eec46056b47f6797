//! Retry strategies for re-opening a session after it ends.
//!
//! The sync loop owns the timer; a policy only answers how long to wait
//! before attempt `n` (zero-based, reset whenever a session opens), or
//! `None` to stay closed until a manual reconnect.

use std::time::Duration;

use rand::Rng;

use crate::config::{ReconnectConfig, ReconnectStrategy};

/// Decides the delay before each reconnect attempt.
pub trait ReconnectPolicy {
    /// Delay before attempt `attempt`, or `None` to give up.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Never reconnect automatically.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Reconnect after the same delay every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// A policy waiting `delay` before every attempt.
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

/// Reconnect after `base * multiplier^attempt`, capped at `max`, with an
/// optional random reduction of up to `jitter` of the delay.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
}

impl ExponentialBackoff {
    /// A backoff policy. A multiplier below 1 is treated as 1 and the
    /// jitter is clamped to `0.0..=1.0`.
    pub fn new(base: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            base,
            max: max.max(base),
            multiplier,
            jitter,
        }
    }

    fn capped(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max.as_secs_f64();
        Duration::from_secs_f64(if secs.is_finite() { secs.min(max) } else { max })
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let delay = self.capped(attempt);
        if self.jitter <= 0.0 {
            return Some(delay);
        }
        let shave: f64 = rand::rng().random_range(0.0..=self.jitter);
        Some(delay.mul_f64(1.0 - shave))
    }
}

/// Build the policy described by `config`.
pub fn from_config(config: &ReconnectConfig) -> Box<dyn ReconnectPolicy> {
    let delay = Duration::from_millis(config.delay_ms);
    match config.strategy {
        ReconnectStrategy::None => Box::new(NoReconnect),
        ReconnectStrategy::Fixed => Box::new(FixedDelay::new(delay)),
        ReconnectStrategy::Exponential => Box::new(ExponentialBackoff::new(
            delay,
            Duration::from_millis(config.max_delay_ms),
            config.multiplier,
            config.jitter,
        )),
    }
}
