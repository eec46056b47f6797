//! Scene-graph renderer interface and the per-frame reconciler.
//!
//! The renderer owns visuals keyed by store ids. Each frame,
//! [`SceneMirror::sync`] diffs the store against the ids it has handed to
//! the renderer: new ids are spawned, every live id is updated, and ids no
//! longer in the store are disposed.

use std::collections::BTreeSet;

use crossview_store::{EntityStore, SignalFixture, Vehicle};
use crossview_types::{SignalId, VehicleId};

/// Draws the mirrored scene. Read-only with respect to the store.
pub trait SceneRenderer {
    /// A vehicle was seen for the first time.
    fn spawn_vehicle(&mut self, vehicle: &Vehicle);
    /// Per-frame pose of a live vehicle.
    fn update_vehicle(&mut self, vehicle: &Vehicle);
    /// A vehicle left the store.
    fn dispose_vehicle(&mut self, id: &VehicleId);
    /// A fixture was seen for the first time.
    fn spawn_signal(&mut self, fixture: &SignalFixture);
    /// Per-frame state of a live fixture; use [`SignalFixture::disc`] for
    /// the indicator.
    fn update_signal(&mut self, fixture: &SignalFixture);
    /// A fixture left the store.
    fn dispose_signal(&mut self, id: &SignalId);
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Visuals created.
    pub spawned: usize,
    /// Visuals updated (including the newly spawned).
    pub updated: usize,
    /// Visuals disposed.
    pub disposed: usize,
}

/// The set of ids the renderer currently holds visuals for.
#[derive(Debug, Clone, Default)]
pub struct SceneMirror {
    vehicles: BTreeSet<VehicleId>,
    signals: BTreeSet<SignalId>,
}

impl SceneMirror {
    /// A mirror with nothing rendered.
    pub const fn new() -> Self {
        Self {
            vehicles: BTreeSet::new(),
            signals: BTreeSet::new(),
        }
    }

    /// Number of vehicle visuals held.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Number of fixture visuals held.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Bring the renderer in line with the store.
    pub fn sync<R: SceneRenderer + ?Sized>(
        &mut self,
        store: &EntityStore,
        renderer: &mut R,
    ) -> FrameReport {
        let mut report = FrameReport::default();

        let stale: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|id| store.vehicle(id.as_str()).is_none())
            .cloned()
            .collect();
        for id in stale {
            renderer.dispose_vehicle(&id);
            self.vehicles.remove(&id);
            report.disposed = report.disposed.saturating_add(1);
        }

        let stale: Vec<SignalId> = self
            .signals
            .iter()
            .filter(|id| store.signal(id.as_str()).is_none())
            .cloned()
            .collect();
        for id in stale {
            renderer.dispose_signal(&id);
            self.signals.remove(&id);
            report.disposed = report.disposed.saturating_add(1);
        }

        for vehicle in store.vehicles() {
            if self.vehicles.insert(vehicle.id.clone()) {
                renderer.spawn_vehicle(vehicle);
                report.spawned = report.spawned.saturating_add(1);
            }
            renderer.update_vehicle(vehicle);
            report.updated = report.updated.saturating_add(1);
        }

        for fixture in store.signals() {
            if self.signals.insert(fixture.id.clone()) {
                renderer.spawn_signal(fixture);
                report.spawned = report.spawned.saturating_add(1);
            }
            renderer.update_signal(fixture);
            report.updated = report.updated.saturating_add(1);
        }

        report
    }

    /// Dispose every visual, e.g. on shutdown.
    pub fn clear<R: SceneRenderer + ?Sized>(&mut self, renderer: &mut R) {
        for id in std::mem::take(&mut self.vehicles) {
            renderer.dispose_vehicle(&id);
        }
        for id in std::mem::take(&mut self.signals) {
            renderer.dispose_signal(&id);
        }
    }
}
