//! Mirrored entities.

use crossview_types::{DiscIndicator, SignalColor, SignalId, Vec3, VehicleId};
use serde::Serialize;

/// A vehicle as last reported by the authority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vehicle {
    /// Local key.
    pub id: VehicleId,
    /// Position in the intersection frame.
    pub position: Vec3,
    /// Yaw in radians.
    pub heading: f64,
    /// Simulation time at which the vehicle was first seen.
    pub created_at: f64,
}

/// A signal fixture (traffic light).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalFixture {
    /// Local key.
    pub id: SignalId,
    /// Mounting position.
    pub position: Vec3,
    /// Facing in radians.
    pub heading: f64,
    /// Color set by the authority.
    pub color: SignalColor,
    /// Local indicator cycle; cleared whenever the authority sets a color.
    #[serde(skip)]
    pub auto_cycle: Option<DiscCycle>,
}

impl SignalFixture {
    /// The disc indicator: the running local cycle if any, else the color.
    pub fn disc(&self) -> DiscIndicator {
        let color = self
            .auto_cycle
            .as_ref()
            .map_or(self.color, DiscCycle::current);
        DiscIndicator::from(color)
    }
}

/// A local indicator cycle for a fixture with no authority color feed.
///
/// Steps through `sequence`, holding each color for its duration in
/// seconds of wall time, and wraps around.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscCycle {
    steps: Vec<(SignalColor, f64)>,
    index: usize,
    elapsed: f64,
}

impl Default for DiscCycle {
    fn default() -> Self {
        Self::new(vec![
            (SignalColor::Red, 1.0),
            (SignalColor::Yellow, 0.6),
            (SignalColor::Green, 1.2),
        ])
    }
}

impl DiscCycle {
    /// A cycle over `(color, seconds)` steps.
    ///
    /// Steps with a non-positive or non-finite duration are dropped; an
    /// empty cycle shows red.
    pub fn new(steps: Vec<(SignalColor, f64)>) -> Self {
        let steps = steps
            .into_iter()
            .filter(|(_, secs)| secs.is_finite() && *secs > 0.0)
            .collect();
        Self {
            steps,
            index: 0,
            elapsed: 0.0,
        }
    }

    /// Color currently shown.
    pub fn current(&self) -> SignalColor {
        self.steps
            .get(self.index)
            .map_or(SignalColor::Red, |(color, _)| *color)
    }

    /// Advance by `dt` seconds. At most one step change per call.
    pub fn advance(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let Some((_, hold)) = self.steps.get(self.index) else {
            return;
        };
        self.elapsed += dt;
        if self.elapsed >= *hold {
            self.elapsed = 0.0;
            self.index = self.index.saturating_add(1) % self.steps.len().max(1);
        }
    }
}
