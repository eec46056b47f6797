//! Headless renderer that reports the scene through `tracing`.
//!
//! Vehicle visuals are logged at `debug` (spawn and dispose) and `trace`
//! (per-frame pose). Signal indicators are logged at `info`, only when the
//! disc color a fixture shows actually changes.

use std::collections::BTreeMap;

use crossview_core::SceneRenderer;
use crossview_store::{SignalFixture, Vehicle};
use crossview_types::{SignalColor, SignalId, VehicleId};
use tracing::{debug, info, trace};

/// A [`SceneRenderer`] that logs instead of drawing.
#[derive(Debug, Default)]
pub struct TracingRenderer {
    discs: BTreeMap<SignalId, SignalColor>,
    vehicles: usize,
    indicator_changes: u64,
}

impl TracingRenderer {
    /// A renderer with no visuals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Vehicle visuals currently held.
    pub const fn vehicles(&self) -> usize {
        self.vehicles
    }

    /// Indicator color changes reported so far.
    pub const fn indicator_changes(&self) -> u64 {
        self.indicator_changes
    }
}

impl SceneRenderer for TracingRenderer {
    fn spawn_vehicle(&mut self, vehicle: &Vehicle) {
        self.vehicles = self.vehicles.saturating_add(1);
        debug!(
            vehicle = %vehicle.id,
            x = vehicle.position.x,
            y = vehicle.position.y,
            heading = vehicle.heading,
            "vehicle visual created"
        );
    }

    fn update_vehicle(&mut self, vehicle: &Vehicle) {
        trace!(
            vehicle = %vehicle.id,
            x = vehicle.position.x,
            y = vehicle.position.y,
            heading = vehicle.heading,
            "vehicle pose"
        );
    }

    fn dispose_vehicle(&mut self, id: &VehicleId) {
        self.vehicles = self.vehicles.saturating_sub(1);
        debug!(vehicle = %id, "vehicle visual disposed");
    }

    fn spawn_signal(&mut self, fixture: &SignalFixture) {
        info!(
            signal = %fixture.id,
            x = fixture.position.x,
            y = fixture.position.y,
            heading = fixture.heading,
            "signal fixture placed"
        );
    }

    fn update_signal(&mut self, fixture: &SignalFixture) {
        let disc = fixture.disc();
        let previous = self.discs.insert(fixture.id.clone(), disc.color);
        if previous == Some(disc.color) {
            return;
        }
        self.indicator_changes = self.indicator_changes.saturating_add(1);
        info!(
            signal = %fixture.id,
            color = %disc.color,
            section = disc.section,
            rgb = format_args!("#{:06x}", disc.rgb),
            "signal indicator"
        );
    }

    fn dispose_signal(&mut self, id: &SignalId) {
        self.discs.remove(id);
        debug!(signal = %id, "signal fixture removed");
    }
}
