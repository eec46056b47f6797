//! Vehicle lifecycle statistics.
//!
//! [`LifecycleStats`] is a pure aggregate fed from lifecycle events;
//! [`LifecycleStats::attach`] subscribes one to an [`EventBus`] and returns
//! a shared handle for reading it.
//!
//! Counting rules:
//!
//! - every vehicle creation increments `vehicles_in`;
//! - every vehicle deletion increments `vehicles_out` and adds its lifetime
//!   to the running average;
//! - a bulk reset clears the average but leaves both counters alone;
//! - signal fixture events are ignored.

use std::cell::RefCell;
use std::rc::Rc;

use crossview_types::{EntityKind, SyncEvent};
use serde::Serialize;

use crate::events::{EventBus, SubscriptionId};

/// Running lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LifecycleStats {
    vehicles_in: u64,
    vehicles_out: u64,
    total_lifetime: f64,
    samples: u64,
}

/// Point-in-time copy of the statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Vehicles created since startup.
    pub vehicles_in: u64,
    /// Vehicles deleted since startup.
    pub vehicles_out: u64,
    /// Mean lifetime of deleted vehicles since the last reset, in seconds.
    pub average_lifetime: f64,
    /// Deletions contributing to the average.
    pub samples: u64,
}

impl LifecycleStats {
    /// Zeroed statistics.
    pub const fn new() -> Self {
        Self {
            vehicles_in: 0,
            vehicles_out: 0,
            total_lifetime: 0.0,
            samples: 0,
        }
    }

    /// Fold one event into the aggregate.
    pub fn observe(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::EntityCreated {
                kind: EntityKind::Vehicle,
                ..
            } => {
                self.vehicles_in = self.vehicles_in.saturating_add(1);
            }
            SyncEvent::EntityDeleted {
                kind: EntityKind::Vehicle,
                lifetime,
                ..
            } => {
                self.vehicles_out = self.vehicles_out.saturating_add(1);
                if lifetime.is_finite() && *lifetime >= 0.0 {
                    self.total_lifetime += lifetime;
                    self.samples = self.samples.saturating_add(1);
                }
            }
            SyncEvent::EntitiesReset { .. } => {
                self.total_lifetime = 0.0;
                self.samples = 0;
            }
            _ => {}
        }
    }

    /// Mean lifetime of deleted vehicles, zero when nothing was sampled.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_lifetime(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_lifetime / self.samples as f64
        }
    }

    /// Copy out the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            vehicles_in: self.vehicles_in,
            vehicles_out: self.vehicles_out,
            average_lifetime: self.average_lifetime(),
            samples: self.samples,
        }
    }

    /// Subscribe a fresh aggregate to `bus`.
    ///
    /// Returns `None` if called while the bus is delivering an event.
    pub fn attach(bus: &EventBus) -> Option<StatsHandle> {
        let inner = Rc::new(RefCell::new(Self::new()));
        let sink = Rc::clone(&inner);
        let subscription = bus.subscribe(move |event| sink.borrow_mut().observe(event))?;
        Some(StatsHandle {
            inner,
            subscription,
        })
    }
}

/// Shared read handle to statistics attached to a bus.
#[derive(Debug, Clone)]
pub struct StatsHandle {
    inner: Rc<RefCell<LifecycleStats>>,
    subscription: SubscriptionId,
}

impl StatsHandle {
    /// Current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.borrow().snapshot()
    }

    /// The bus subscription feeding this handle.
    pub const fn subscription(&self) -> SubscriptionId {
        self.subscription
    }
}
