//! Outbound messages from the viewer to the simulation authority.
//!
//! Control intents are passed through as-is: the viewer does not validate
//! command names or values, the authority does.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user-driven control request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlIntent {
    /// Command name understood by the authority.
    pub cmd: String,
    /// Command argument; `null` when the command takes none.
    #[serde(default)]
    pub value: Value,
}

impl ControlIntent {
    /// An arbitrary intent.
    pub fn new(cmd: impl Into<String>, value: Value) -> Self {
        Self {
            cmd: cmd.into(),
            value,
        }
    }

    /// Pause the simulation.
    pub fn pause() -> Self {
        Self::new("pause", Value::Null)
    }

    /// Resume a paused simulation.
    pub fn resume() -> Self {
        Self::new("resume", Value::Null)
    }

    /// Set the simulation speed multiplier.
    pub fn speed(factor: f64) -> Self {
        Self::new("speed", Value::from(factor))
    }

    /// Set the vehicle spawn density.
    pub fn density(density: f64) -> Self {
        Self::new("density", Value::from(density))
    }

    /// Switch the signal control mode (e.g. fixed-time or adaptive).
    pub fn traffic_mode(mode: &str) -> Self {
        Self::new("trafficMode", Value::from(mode))
    }

    /// Restart the simulation.
    pub fn reset() -> Self {
        Self::new("reset", Value::Null)
    }
}

/// A message sent to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Register this viewer and start streaming; sent on every session open.
    Create,
    /// Forward a user intent.
    Control(ControlIntent),
}
