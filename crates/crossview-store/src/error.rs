//! Reasons a store mutation is rejected.
//!
//! Mutators report rejection as `false` to their callers; these values are
//! what gets logged.

use crate::clock::ClockError;

/// Errors that can occur during store mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No vehicle with this id.
    #[error("vehicle not found: {0}")]
    VehicleNotFound(String),

    /// No signal fixture with this id.
    #[error("signal fixture not found: {0}")]
    SignalNotFound(String),

    /// A color outside the three-value enumeration.
    #[error(transparent)]
    InvalidColor(#[from] crossview_types::UnknownColor),

    /// A rejected clock value.
    #[error(transparent)]
    Clock(#[from] ClockError),
}
