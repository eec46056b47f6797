//! Events announced to in-process subscribers.
//!
//! The set is closed: store lifecycle and clock events, plus session
//! events from the connection layer. Events serialize with an `event` tag
//! so they can be forwarded to UIs unchanged.

use serde::Serialize;

/// Which entity collection an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A vehicle.
    Vehicle,
    /// A signal fixture.
    Signal,
}

/// Everything a subscriber can observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// An entity id was seen for the first time.
    EntityCreated {
        /// Collection of the new entity.
        kind: EntityKind,
        /// Its id.
        id: String,
    },
    /// An entity was removed individually.
    EntityDeleted {
        /// Collection of the removed entity.
        kind: EntityKind,
        /// Its id.
        id: String,
        /// Entities left in that collection.
        remaining: usize,
        /// Simulation seconds between creation and removal, never negative.
        lifetime: f64,
    },
    /// All vehicles were dropped at once because the simulation restarted.
    EntitiesReset {
        /// Vehicles left after the reset.
        remaining: usize,
    },
    /// The simulation clock moved.
    ClockUpdated {
        /// New simulation time in seconds.
        time: f64,
    },
    /// A session to the authority opened.
    SessionOpened {
        /// Endpoint of the session.
        url: String,
    },
    /// The session ended.
    SessionClosed {
        /// WebSocket close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// The transport reported an error; the session may still be open.
    SessionError {
        /// Human-readable detail.
        detail: String,
    },
}

impl SyncEvent {
    /// Short name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EntityCreated { .. } => "entity_created",
            Self::EntityDeleted { .. } => "entity_deleted",
            Self::EntitiesReset { .. } => "entities_reset",
            Self::ClockUpdated { .. } => "clock_updated",
            Self::SessionOpened { .. } => "session_opened",
            Self::SessionClosed { .. } => "session_closed",
            Self::SessionError { .. } => "session_error",
        }
    }
}
