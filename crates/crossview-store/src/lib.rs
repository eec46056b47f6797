//! Crossview Store: the local mirror of a remote intersection simulation.
//!
//! Holds vehicles, signal fixtures and simulation time, publishes lifecycle
//! events on an in-process [`EventBus`], and aggregates vehicle lifetimes.
//! Everything here is synchronous and single-threaded; the connection layer
//! in `crossview-core` drives it from one cooperative loop.

pub mod angle;
pub mod clock;
pub mod entity;
pub mod error;
pub mod events;
pub mod stats;
pub mod store;

pub use angle::normalize_angle;
pub use clock::{ClockError, SimClock};
pub use entity::{DiscCycle, SignalFixture, Vehicle};
pub use error::StoreError;
pub use events::{EventBus, SubscriptionId};
pub use stats::{LifecycleStats, StatsHandle, StatsSnapshot};
pub use store::{BulkReport, EntityStore};
