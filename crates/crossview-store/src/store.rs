//! The entity store: authoritative local mirror of the remote scene.
//!
//! [`EntityStore`] is the only mutation path for vehicles, signal fixtures
//! and the simulation clock. Every mutator is synchronous and reports
//! rejection as `false` (or a zero count), leaving state untouched; nothing
//! here panics or returns an error to the caller. Lifecycle and clock
//! changes are published on the injected [`EventBus`] at the point of
//! mutation.
//!
//! # Invariants
//!
//! - Vehicle and fixture ids are unique within their own collection.
//! - Creating an existing id updates it and publishes nothing.
//! - Headings are stored in radians, normalized exactly once on entry.
//! - Fixture colors are always one of the three [`SignalColor`] values.
//! - The clock never goes backwards, below zero, or non-finite.

use std::collections::BTreeMap;

use crossview_types::{
    EntityKind, InitPayload, Placement, PoseUpdate, SignalColor, SignalId, SyncEvent,
    UpdatePayload, Vec3, VehicleId,
};
use tracing::{debug, warn};

use crate::angle::normalize_angle;
use crate::clock::SimClock;
use crate::entity::{DiscCycle, SignalFixture, Vehicle};
use crate::error::StoreError;
use crate::events::EventBus;

/// Outcome of a bulk `init` or `update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Items that produced a successful store call.
    pub applied: usize,
    /// Items skipped for a missing id or field, or rejected by the store.
    pub skipped: usize,
}

impl BulkReport {
    const fn record(&mut self, ok: bool) {
        if ok {
            self.applied = self.applied.saturating_add(1);
        } else {
            self.skipped = self.skipped.saturating_add(1);
        }
    }
}

/// Local mirror of vehicles, signal fixtures and simulation time.
#[derive(Debug)]
pub struct EntityStore {
    vehicles: BTreeMap<VehicleId, Vehicle>,
    signals: BTreeMap<SignalId, SignalFixture>,
    clock: SimClock,
    events: EventBus,
}

impl EntityStore {
    /// An empty store publishing on `events`.
    pub const fn new(events: EventBus) -> Self {
        Self {
            vehicles: BTreeMap::new(),
            signals: BTreeMap::new(),
            clock: SimClock::new(),
            events,
        }
    }

    /// The bus this store publishes on.
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Bulk
    // -----------------------------------------------------------------------

    /// Create or update fixtures, then vehicles. Items without an id are
    /// skipped; each item goes through the same path as a single create.
    pub fn init(&mut self, payload: &InitPayload) -> BulkReport {
        let mut report = BulkReport::default();

        for light in &payload.lights {
            let Some(id) = light.id.as_deref() else {
                report.record(false);
                continue;
            };
            let color = match light.color.as_deref().map(str::parse::<SignalColor>) {
                None => None,
                Some(Ok(color)) => Some(color),
                Some(Err(e)) => {
                    warn!(signal = id, error = %e, "init color rejected, using red");
                    None
                }
            };
            self.create_signal(id, &light.placement(), color);
            report.record(true);
        }

        for car in &payload.cars {
            let Some(id) = car.id.as_deref() else {
                report.record(false);
                continue;
            };
            self.create_vehicle(id, &car.placement());
            report.record(true);
        }

        debug!(
            applied = report.applied,
            skipped = report.skipped,
            "bulk init applied"
        );
        report
    }

    /// Apply color sets, then moves, with the single-item semantics.
    pub fn update(&mut self, changes: &UpdatePayload) -> BulkReport {
        let mut report = BulkReport::default();

        for change in &changes.set_light {
            let ok = match (change.id.as_deref(), change.color.as_deref()) {
                (Some(id), Some(color)) => self.set_color(id, color),
                _ => false,
            };
            report.record(ok);
        }

        for change in &changes.move_car {
            let ok = change
                .id
                .as_deref()
                .is_some_and(|id| self.move_vehicle(id, &change.pose()));
            report.record(ok);
        }

        debug!(
            applied = report.applied,
            skipped = report.skipped,
            "bulk update applied"
        );
        report
    }

    // -----------------------------------------------------------------------
    // Signal fixtures
    // -----------------------------------------------------------------------

    /// Create a fixture, or update an existing one's pose and color.
    ///
    /// The color defaults to red. Any local auto-cycle is cancelled.
    /// Returns `true` if the fixture is new.
    pub fn create_signal(
        &mut self,
        id: &str,
        placement: &Placement,
        color: Option<SignalColor>,
    ) -> bool {
        let position = finite_position(placement);
        let heading = normalize_angle(placement.rot).unwrap_or(0.0);
        let color = color.unwrap_or_default();

        if let Some(fixture) = self.signals.get_mut(id) {
            fixture.position = position;
            fixture.heading = heading;
            fixture.color = color;
            fixture.auto_cycle = None;
            return false;
        }

        let key = SignalId::from(id);
        self.signals.insert(
            key,
            SignalFixture {
                id: SignalId::from(id),
                position,
                heading,
                color,
                auto_cycle: None,
            },
        );
        debug!(signal = id, %color, "signal fixture created");
        self.events.publish(&SyncEvent::EntityCreated {
            kind: EntityKind::Signal,
            id: id.to_owned(),
        });
        true
    }

    /// Set a fixture's color from its wire name.
    ///
    /// Rejects unknown ids and names outside `red`/`yellow`/`green`.
    pub fn set_color(&mut self, id: &str, color: &str) -> bool {
        let result = color
            .parse::<SignalColor>()
            .map_err(StoreError::from)
            .and_then(|color| self.try_set_color(id, color));
        settle("set_color", result)
    }

    /// Set a fixture's color. Rejects unknown ids.
    pub fn set_signal_color(&mut self, id: &str, color: SignalColor) -> bool {
        let result = self.try_set_color(id, color);
        settle("set_signal_color", result)
    }

    fn try_set_color(&mut self, id: &str, color: SignalColor) -> Result<(), StoreError> {
        let fixture = self
            .signals
            .get_mut(id)
            .ok_or_else(|| StoreError::SignalNotFound(id.to_owned()))?;
        fixture.color = color;
        fixture.auto_cycle = None;
        Ok(())
    }

    /// Run a local indicator cycle on a fixture until the authority next
    /// sets its color. Rejects unknown ids.
    pub fn start_auto_cycle(&mut self, id: &str, cycle: DiscCycle) -> bool {
        let Some(fixture) = self.signals.get_mut(id) else {
            return settle("start_auto_cycle", Err(StoreError::SignalNotFound(id.to_owned())));
        };
        fixture.auto_cycle = Some(cycle);
        true
    }

    /// Advance local indicator cycles by `dt` seconds of wall time.
    pub fn advance_local(&mut self, dt: f64) {
        for cycle in self.signals.values_mut().filter_map(|f| f.auto_cycle.as_mut()) {
            cycle.advance(dt);
        }
    }

    // -----------------------------------------------------------------------
    // Vehicles
    // -----------------------------------------------------------------------

    /// Create a vehicle, or update an existing one's pose.
    ///
    /// A new vehicle records the current simulation time as its creation
    /// time and is announced; an existing one keeps its creation time and
    /// nothing is published. Returns `true` if the vehicle is new.
    pub fn create_vehicle(&mut self, id: &str, placement: &Placement) -> bool {
        let position = finite_position(placement);
        let heading = normalize_angle(placement.rot).unwrap_or(0.0);

        if let Some(vehicle) = self.vehicles.get_mut(id) {
            vehicle.position = position;
            vehicle.heading = heading;
            return false;
        }

        let created_at = self.clock.time();
        self.vehicles.insert(
            VehicleId::from(id),
            Vehicle {
                id: VehicleId::from(id),
                position,
                heading,
                created_at,
            },
        );
        debug!(vehicle = id, created_at, "vehicle created");
        self.events.publish(&SyncEvent::EntityCreated {
            kind: EntityKind::Vehicle,
            id: id.to_owned(),
        });
        true
    }

    /// Move or turn a vehicle.
    ///
    /// The position changes only when `x` and `y` are both finite; the
    /// heading only when the rotation is finite. Either may change alone.
    /// Rejects unknown ids.
    pub fn move_vehicle(&mut self, id: &str, pose: &PoseUpdate) -> bool {
        let Some(vehicle) = self.vehicles.get_mut(id) else {
            return settle("move_vehicle", Err(StoreError::VehicleNotFound(id.to_owned())));
        };
        if let Some(position) = pose.finite_position() {
            vehicle.position = position;
        }
        if let Some(heading) = pose.rot.and_then(normalize_angle) {
            vehicle.heading = heading;
        }
        true
    }

    /// Remove a vehicle and announce its lifetime. Rejects unknown ids.
    pub fn delete_vehicle(&mut self, id: &str) -> bool {
        let Some(vehicle) = self.vehicles.remove(id) else {
            return settle("delete_vehicle", Err(StoreError::VehicleNotFound(id.to_owned())));
        };
        let lifetime = (self.clock.time() - vehicle.created_at).max(0.0);
        let remaining = self.vehicles.len();
        debug!(vehicle = id, lifetime, remaining, "vehicle deleted");
        self.events.publish(&SyncEvent::EntityDeleted {
            kind: EntityKind::Vehicle,
            id: id.to_owned(),
            remaining,
            lifetime,
        });
        true
    }

    /// Drop every vehicle at once. Fixtures are untouched.
    ///
    /// Publishes a single reset event rather than one deletion per vehicle:
    /// the simulation restarted, the vehicles did not individually leave.
    /// Returns how many vehicles were dropped.
    pub fn reset_vehicles(&mut self) -> usize {
        let cleared = self.vehicles.len();
        self.vehicles.clear();
        debug!(cleared, "vehicles reset");
        self.events.publish(&SyncEvent::EntitiesReset {
            remaining: self.vehicles.len(),
        });
        cleared
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Record a simulation time from the authority.
    ///
    /// Rejects non-finite, negative and backwards values.
    pub fn set_clock(&mut self, time: f64) -> bool {
        if let Err(e) = self.clock.set(time) {
            return settle("set_clock", Err(e.into()));
        }
        self.events.publish(&SyncEvent::ClockUpdated { time });
        true
    }

    /// Return the clock to zero for a fresh simulation.
    pub fn reset_clock(&mut self) {
        self.clock.reset();
        self.events
            .publish(&SyncEvent::ClockUpdated { time: self.clock.time() });
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Current simulation time.
    pub const fn sim_time(&self) -> f64 {
        self.clock.time()
    }

    /// Vehicles in id order.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Signal fixtures in id order.
    pub fn signals(&self) -> impl Iterator<Item = &SignalFixture> {
        self.signals.values()
    }

    /// Look up a vehicle.
    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Look up a signal fixture.
    pub fn signal(&self, id: &str) -> Option<&SignalFixture> {
        self.signals.get(id)
    }

    /// Number of vehicles.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Number of signal fixtures.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }
}

/// Log a rejected mutation and turn the result into the boolean contract.
fn settle(op: &'static str, result: Result<(), StoreError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(op, error = %e, "store mutation rejected");
            false
        }
    }
}

/// Placement position with non-finite components replaced by zero.
fn finite_position(placement: &Placement) -> Vec3 {
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    Vec3::new(finite(placement.x), finite(placement.y), finite(placement.z))
}
