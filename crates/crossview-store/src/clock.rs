//! Simulation clock mirror.
//!
//! The authority owns simulation time; the store only records the last
//! value it was told. The value never goes backwards, never becomes negative
//! and never becomes non-finite. [`SimClock::reset`] is the one way back to
//! zero and is reserved for a fresh simulation.

/// Errors that can occur when setting the clock.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    /// NaN or infinite time.
    #[error("simulation time must be finite, got {0}")]
    NonFinite(f64),

    /// Time below zero.
    #[error("simulation time must not be negative, got {0}")]
    Negative(f64),

    /// Time earlier than the current value.
    #[error("simulation time must not go backwards ({requested} < {current})")]
    Backwards {
        /// Time that was requested.
        requested: f64,
        /// Time currently held.
        current: f64,
    },
}

/// Last simulation time reported by the authority, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimClock {
    time: f64,
}

impl SimClock {
    /// A clock at time zero.
    pub const fn new() -> Self {
        Self { time: 0.0 }
    }

    /// Current simulation time.
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Move the clock to `time`.
    ///
    /// # Errors
    ///
    /// Rejects non-finite, negative and backwards values, leaving the clock
    /// unchanged.
    pub fn set(&mut self, time: f64) -> Result<(), ClockError> {
        if !time.is_finite() {
            return Err(ClockError::NonFinite(time));
        }
        if time < 0.0 {
            return Err(ClockError::Negative(time));
        }
        if time < self.time {
            return Err(ClockError::Backwards {
                requested: time,
                current: self.time,
            });
        }
        self.time = time;
        Ok(())
    }

    /// Return to time zero for a fresh simulation.
    pub const fn reset(&mut self) {
        self.time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_forward_and_holds() {
        let mut clock = SimClock::new();
        assert!(clock.set(1.5).is_ok());
        assert!(clock.set(1.5).is_ok());
        assert!(clock.set(4.0).is_ok());
        assert_eq!(clock.time(), 4.0);
    }

    #[test]
    fn rejects_invalid_values_without_change() {
        let mut clock = SimClock::new();
        assert!(clock.set(3.0).is_ok());
        assert!(matches!(clock.set(f64::NAN), Err(ClockError::NonFinite(_))));
        assert!(matches!(clock.set(-1.0), Err(ClockError::Negative(_))));
        assert!(matches!(clock.set(f64::INFINITY), Err(ClockError::NonFinite(_))));
        assert!(matches!(clock.set(2.0), Err(ClockError::Backwards { .. })));
        assert_eq!(clock.time(), 3.0);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut clock = SimClock::new();
        assert!(clock.set(10.0).is_ok());
        clock.reset();
        assert_eq!(clock.time(), 0.0);
        assert!(clock.set(0.5).is_ok());
    }
}
