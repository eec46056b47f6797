//! Shared type definitions for the Crossview intersection viewer.
//!
//! Everything that crosses a crate boundary lives here: entity keys, poses,
//! signal colors, the inbound command union, outbound messages, bulk
//! payloads and the event set.
//!
//! # Modules
//!
//! - [`ids`] -- Typed string keys for vehicles and signal fixtures
//! - [`geometry`] -- Positions, placements and partial pose updates
//! - [`signal`] -- The three-value color enum and the disc indicator view
//! - [`command`] -- Wire commands and their decoded form
//! - [`payload`] -- Lenient bulk `init` / `update` payloads
//! - [`outbound`] -- Messages sent to the authority
//! - [`event`] -- Events published to in-process subscribers

pub mod command;
pub mod event;
pub mod geometry;
pub mod ids;
pub mod outbound;
pub mod payload;
pub mod signal;

// Re-export all public types at crate root for convenience.
pub use command::{
    Command, CommandError, ControlCommand, Domain, PhaseChange, RawCommand, VehicleCommand,
    WireMapping,
};
pub use event::{EntityKind, SyncEvent};
pub use geometry::{Placement, PoseUpdate, Vec3};
pub use ids::{SignalId, VehicleId};
pub use outbound::{ControlIntent, OutboundMessage};
pub use payload::{ColorChange, InitPayload, MoveChange, SignalInit, UpdatePayload, VehicleInit};
pub use signal::{DiscIndicator, SignalColor, UnknownColor};
