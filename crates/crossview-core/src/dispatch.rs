//! Command dispatcher.
//!
//! Routes decoded commands to the entity store by domain and action. Each
//! command is applied on its own: a rejected command is logged and the rest
//! of the batch continues.
//!
//! Signal commands are phase changeovers of a two-phase intersection,
//! expanded through a [`PhaseTable`]:
//!
//! | phase | group A | group B |
//! |-------|---------|---------|
//! | 0     | red     | green (yellow in transition) |
//! | other | green (yellow in transition) | red |
//!
//! `control/reset` means the simulation restarted: vehicles are dropped and
//! the clock goes back to zero.

use crossview_store::EntityStore;
use crossview_types::{
    Command, CommandError, ControlCommand, PhaseChange, Placement, SignalColor, SignalId,
    VehicleCommand,
};
use tracing::{debug, warn};

use crate::config::PhaseConfig;

/// The two antiphase signal groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTable {
    group_a: Vec<SignalId>,
    group_b: Vec<SignalId>,
}

impl PhaseTable {
    /// A table with the given groups. A fixture listed in both groups is
    /// kept only in group A.
    pub fn new(group_a: Vec<SignalId>, group_b: Vec<SignalId>) -> Self {
        let group_b = group_b
            .into_iter()
            .filter(|id| !group_a.contains(id))
            .collect();
        Self { group_a, group_b }
    }

    /// The color assignments for a phase change, group A first.
    pub fn assignments(&self, change: PhaseChange) -> Vec<(&SignalId, SignalColor)> {
        let go = if change.transition {
            SignalColor::Yellow
        } else {
            SignalColor::Green
        };
        let (a, b) = if change.index == 0 {
            (SignalColor::Red, go)
        } else {
            (go, SignalColor::Red)
        };
        self.group_a
            .iter()
            .map(|id| (id, a))
            .chain(self.group_b.iter().map(|id| (id, b)))
            .collect()
    }
}

impl From<&PhaseConfig> for PhaseTable {
    fn from(config: &PhaseConfig) -> Self {
        Self::new(config.group_a.clone(), config.group_b.clone())
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::from(&PhaseConfig::default())
    }
}

/// Per-batch dispatch counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Commands the store accepted.
    pub applied: usize,
    /// Commands the store rejected (unknown id, invalid value).
    pub rejected: usize,
    /// Commands that could not be decoded.
    pub skipped: usize,
}

impl DispatchReport {
    /// Total commands seen.
    pub const fn total(&self) -> usize {
        self.applied
            .saturating_add(self.rejected)
            .saturating_add(self.skipped)
    }
}

/// Routes commands to store mutators.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    phases: PhaseTable,
}

impl Dispatcher {
    /// A dispatcher using `phases` for signal commands.
    pub const fn new(phases: PhaseTable) -> Self {
        Self { phases }
    }

    /// The phase table in use.
    pub const fn phases(&self) -> &PhaseTable {
        &self.phases
    }

    /// Apply decoded commands in order. Decode failures are counted and
    /// logged; they never stop the batch.
    pub fn apply_batch<I>(&self, commands: I, store: &mut EntityStore) -> DispatchReport
    where
        I: IntoIterator<Item = Result<Command, CommandError>>,
    {
        let mut report = DispatchReport::default();
        for (index, decoded) in commands.into_iter().enumerate() {
            match decoded {
                Ok(command) => {
                    if self.apply(&command, store) {
                        report.applied = report.applied.saturating_add(1);
                    } else {
                        report.rejected = report.rejected.saturating_add(1);
                    }
                }
                Err(e) => {
                    warn!(index, error = %e, "command skipped");
                    report.skipped = report.skipped.saturating_add(1);
                }
            }
        }
        report
    }

    /// Apply one command. Returns whether the store accepted it.
    pub fn apply(&self, command: &Command, store: &mut EntityStore) -> bool {
        let ok = match command {
            Command::Vehicle(VehicleCommand::Spawned { id }) => {
                store.create_vehicle(id.as_str(), &Placement::default());
                true
            }
            Command::Vehicle(VehicleCommand::Moved { id, pose }) => {
                store.move_vehicle(id.as_str(), pose)
            }
            Command::Vehicle(VehicleCommand::Deleted { id }) => store.delete_vehicle(id.as_str()),
            Command::Signal(change) => self.apply_phase(*change, store),
            Command::Clock { time } => store.set_clock(*time),
            Command::Control(ControlCommand::Reset) => {
                store.reset_vehicles();
                store.reset_clock();
                true
            }
            Command::Control(ControlCommand::Init(payload)) => {
                store.init(payload);
                true
            }
            Command::Control(ControlCommand::Update(changes)) => {
                store.update(changes);
                true
            }
        };
        if ok {
            debug!(domain = %command.domain(), "command applied");
        } else {
            debug!(domain = %command.domain(), "command rejected by store");
        }
        ok
    }

    /// Set both groups for a phase. Accepted if at least one fixture took
    /// its color; fixtures not yet in the store are skipped.
    fn apply_phase(&self, change: PhaseChange, store: &mut EntityStore) -> bool {
        let mut any = false;
        for (id, color) in self.phases.assignments(change) {
            if store.set_signal_color(id.as_str(), color) {
                any = true;
            } else {
                debug!(signal = %id, phase = change.index, "phase target not in store");
            }
        }
        any
    }
}
