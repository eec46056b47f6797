//! Inbound commands: the loose wire shape and the closed decoded union.
//!
//! The authority sends commands as `{ type, action, id, meta }` objects whose
//! `meta` shape depends on the `(type, action)` pair. [`Command::decode`]
//! turns one such object into a [`Command`] exactly once, at the connection
//! boundary, so everything downstream matches exhaustively on variants.
//!
//! # Accepted forms
//!
//! | `type` | `action` | payload |
//! |---|---|---|
//! | `vh` / `vehicle` | `spawned`, `deleted` | none |
//! | `vh` / `vehicle` | `move` | `meta` object `{x, y, z?, theta\|rot}` or token list `[x, y, theta]` / `[x, y, z, theta]` |
//! | `signal` | phase index (`"0"`, `"1"`, ...) | optional `meta`: `"yellow"` token or `{transition: true}` |
//! | `signal` | `phase` / `set` | phase index in `id` |
//! | `time` / `clock` | `time` / `set` | time in `meta` (number, token list, `{time\|t}`), else in `id` |
//! | `control` | `reset`, `init`, `update` | bulk payload in `meta` for `init` / `update`; vehicles mapped like `vh` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::PoseUpdate;
use crate::ids::VehicleId;
use crate::payload::{InitPayload, UpdatePayload, id_text};

/// One command as it appears on the wire, before interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    /// Domain discriminant (`vh`, `signal`, `time`, `control`).
    #[serde(rename = "type")]
    pub domain: String,
    /// Action within the domain; string or number.
    #[serde(default)]
    pub action: Value,
    /// Target id; string or number.
    #[serde(default)]
    pub id: Value,
    /// Domain-specific payload.
    #[serde(default)]
    pub meta: Value,
}

/// How wire coordinates and ids map onto the local scene.
///
/// The simulation reports vehicles with bare numeric ids in a frame whose
/// origin is the south-west corner of the map; the scene keys vehicles as
/// `car-<id>` around the intersection center.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WireMapping {
    /// Prefix prepended to every vehicle id.
    pub vehicle_id_prefix: String,
    /// Offset added to vehicle `(x, y)` coordinates.
    pub origin_offset: [f64; 2],
}

impl Default for WireMapping {
    fn default() -> Self {
        Self {
            vehicle_id_prefix: "car-".to_owned(),
            origin_offset: [-50.0, -50.0],
        }
    }
}

impl WireMapping {
    /// A mapping that leaves ids and coordinates untouched.
    pub const fn identity() -> Self {
        Self {
            vehicle_id_prefix: String::new(),
            origin_offset: [0.0, 0.0],
        }
    }

    /// Local key for a wire vehicle id.
    pub fn vehicle_id(&self, wire_id: &str) -> VehicleId {
        VehicleId::new(format!("{}{wire_id}", self.vehicle_id_prefix))
    }

    fn shift(&self, mut pose: PoseUpdate) -> PoseUpdate {
        let [dx, dy] = self.origin_offset;
        pose.x = pose.x.map(|x| x + dx);
        pose.y = pose.y.map(|y| y + dy);
        pose
    }

    fn local_key(&self, wire_id: Option<String>) -> Option<String> {
        wire_id.map(|id| self.vehicle_id(&id).0)
    }

    /// Map the vehicles of a bulk `init` onto local keys and coordinates.
    /// Signal fixtures already use scene ids and coordinates.
    pub fn map_init(&self, mut payload: InitPayload) -> InitPayload {
        let [dx, dy] = self.origin_offset;
        for car in &mut payload.cars {
            car.id = self.local_key(car.id.take());
            car.x += dx;
            car.y += dy;
        }
        payload
    }

    /// Map the vehicle moves of a bulk `update` the way `vh move` is mapped.
    pub fn map_update(&self, mut changes: UpdatePayload) -> UpdatePayload {
        for change in &mut changes.move_car {
            change.id = self.local_key(change.id.take());
            let pose = self.shift(change.pose());
            change.x = pose.x;
            change.y = pose.y;
        }
        changes
    }
}

/// Command domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Vehicle lifecycle and motion.
    Vehicle,
    /// Signal phase changes.
    Signal,
    /// Simulation clock.
    Clock,
    /// Bulk scene control.
    Control,
}

impl Domain {
    /// Parse a wire discriminant.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "vh" | "vehicle" => Some(Self::Vehicle),
            "signal" => Some(Self::Signal),
            "time" | "clock" => Some(Self::Clock),
            "control" => Some(Self::Control),
            _ => None,
        }
    }

    /// Canonical name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Signal => "signal",
            Self::Clock => "clock",
            Self::Control => "control",
        }
    }
}

impl core::fmt::Display for Domain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a single command cannot be decoded.
///
/// Each of these skips one command; the rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The command is not an object of the expected shape.
    #[error("malformed command: {0}")]
    Malformed(String),

    /// The `type` discriminant is not a known domain.
    #[error("unknown command domain: {0:?}")]
    UnknownDomain(String),

    /// The action is not routable within its domain.
    #[error("unknown {domain} action: {action:?}")]
    UnknownAction {
        /// Domain of the command.
        domain: Domain,
        /// The unroutable action text.
        action: String,
    },

    /// The command needs a target id and has none.
    #[error("{domain} command without an id")]
    MissingId {
        /// Domain of the command.
        domain: Domain,
    },

    /// The command needs a payload and has none usable.
    #[error("{domain}/{action} command without a usable payload")]
    MissingPayload {
        /// Domain of the command.
        domain: Domain,
        /// Action of the command.
        action: String,
    },
}

/// Vehicle commands.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    /// The vehicle entered the simulation.
    Spawned {
        /// Local vehicle key.
        id: VehicleId,
    },
    /// The vehicle moved or turned.
    Moved {
        /// Local vehicle key.
        id: VehicleId,
        /// Pose change in scene coordinates; yaw still raw.
        pose: PoseUpdate,
    },
    /// The vehicle left the simulation.
    Deleted {
        /// Local vehicle key.
        id: VehicleId,
    },
}

/// A signal phase changeover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    /// Phase index; zero and non-zero select the two antiphase layouts.
    pub index: u32,
    /// Whether the group going green shows yellow instead.
    pub transition: bool,
}

/// Bulk scene control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// The simulation restarted: drop every vehicle.
    Reset,
    /// Bulk create-or-update.
    Init(InitPayload),
    /// Bulk incremental changes.
    Update(UpdatePayload),
}

/// A decoded inbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Vehicle lifecycle or motion.
    Vehicle(VehicleCommand),
    /// Signal phase changeover.
    Signal(PhaseChange),
    /// Simulation clock update; not yet validated.
    Clock {
        /// Reported simulation time in seconds.
        time: f64,
    },
    /// Bulk scene control.
    Control(ControlCommand),
}

impl Command {
    /// Domain of the command.
    pub const fn domain(&self) -> Domain {
        match self {
            Self::Vehicle(_) => Domain::Vehicle,
            Self::Signal(_) => Domain::Signal,
            Self::Clock { .. } => Domain::Clock,
            Self::Control(_) => Domain::Control,
        }
    }

    /// Decode a JSON command object.
    pub fn from_value(value: Value, mapping: &WireMapping) -> Result<Self, CommandError> {
        let raw: RawCommand =
            serde_json::from_value(value).map_err(|e| CommandError::Malformed(e.to_string()))?;
        Self::decode(&raw, mapping)
    }

    /// Interpret a raw wire command.
    pub fn decode(raw: &RawCommand, mapping: &WireMapping) -> Result<Self, CommandError> {
        let domain = Domain::from_wire(&raw.domain)
            .ok_or_else(|| CommandError::UnknownDomain(raw.domain.clone()))?;
        let action = id_text(&raw.action).unwrap_or_default();

        match domain {
            Domain::Vehicle => decode_vehicle(raw, &action, mapping),
            Domain::Signal => decode_signal(raw, &action),
            Domain::Clock => decode_clock(raw, &action),
            Domain::Control => decode_control(raw, &action, mapping),
        }
    }
}

fn decode_vehicle(
    raw: &RawCommand,
    action: &str,
    mapping: &WireMapping,
) -> Result<Command, CommandError> {
    let wire_id = id_text(&raw.id).ok_or(CommandError::MissingId {
        domain: Domain::Vehicle,
    })?;
    let id = mapping.vehicle_id(&wire_id);

    let command = match action {
        "spawned" => VehicleCommand::Spawned { id },
        "deleted" => VehicleCommand::Deleted { id },
        "move" => {
            let pose = pose_from_meta(&raw.meta).ok_or_else(|| CommandError::MissingPayload {
                domain: Domain::Vehicle,
                action: action.to_owned(),
            })?;
            VehicleCommand::Moved {
                id,
                pose: mapping.shift(pose),
            }
        }
        other => {
            return Err(CommandError::UnknownAction {
                domain: Domain::Vehicle,
                action: other.to_owned(),
            });
        }
    };
    Ok(Command::Vehicle(command))
}

fn decode_signal(raw: &RawCommand, action: &str) -> Result<Command, CommandError> {
    let index_text = match action {
        "phase" | "set" => id_text(&raw.id).ok_or(CommandError::MissingId {
            domain: Domain::Signal,
        })?,
        other => other.to_owned(),
    };
    let index = index_text
        .trim()
        .parse::<u32>()
        .map_err(|_| CommandError::UnknownAction {
            domain: Domain::Signal,
            action: action.to_owned(),
        })?;

    Ok(Command::Signal(PhaseChange {
        index,
        transition: is_transition(&raw.meta),
    }))
}

fn decode_clock(raw: &RawCommand, action: &str) -> Result<Command, CommandError> {
    if !matches!(action, "time" | "set") {
        return Err(CommandError::UnknownAction {
            domain: Domain::Clock,
            action: action.to_owned(),
        });
    }

    let time = time_from_meta(&raw.meta)
        .or_else(|| number(&raw.id))
        .ok_or_else(|| CommandError::MissingPayload {
            domain: Domain::Clock,
            action: action.to_owned(),
        })?;
    Ok(Command::Clock { time })
}

fn decode_control(
    raw: &RawCommand,
    action: &str,
    mapping: &WireMapping,
) -> Result<Command, CommandError> {
    let missing = || CommandError::MissingPayload {
        domain: Domain::Control,
        action: action.to_owned(),
    };

    let command = match action {
        "reset" => ControlCommand::Reset,
        "init" => ControlCommand::Init(
            mapping.map_init(serde_json::from_value(raw.meta.clone()).map_err(|_| missing())?),
        ),
        "update" => ControlCommand::Update(
            mapping.map_update(serde_json::from_value(raw.meta.clone()).map_err(|_| missing())?),
        ),
        other => {
            return Err(CommandError::UnknownAction {
                domain: Domain::Control,
                action: other.to_owned(),
            });
        }
    };
    Ok(Command::Control(command))
}

/// A JSON number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn pose_from_meta(meta: &Value) -> Option<PoseUpdate> {
    match meta {
        Value::Object(fields) => {
            let field = |name: &str| fields.get(name).and_then(number);
            Some(PoseUpdate {
                x: field("x"),
                y: field("y"),
                z: field("z"),
                rot: field("theta").or_else(|| field("rot")),
            })
        }
        Value::Array(tokens) => {
            let at = |i: usize| tokens.get(i).and_then(number);
            match tokens.len() {
                0 => None,
                1..=3 => Some(PoseUpdate {
                    x: at(0),
                    y: at(1),
                    z: None,
                    rot: at(2),
                }),
                _ => Some(PoseUpdate {
                    x: at(0),
                    y: at(1),
                    z: at(2),
                    rot: at(3),
                }),
            }
        }
        Value::String(line) => {
            let tokens: Vec<Value> = line
                .split_whitespace()
                .map(|t| Value::String(t.to_owned()))
                .collect();
            pose_from_meta(&Value::Array(tokens))
        }
        _ => None,
    }
}

fn time_from_meta(meta: &Value) -> Option<f64> {
    match meta {
        Value::Object(fields) => fields
            .get("time")
            .or_else(|| fields.get("t"))
            .and_then(number),
        Value::Array(tokens) => tokens.first().and_then(number),
        other => number(other),
    }
}

fn is_transition(meta: &Value) -> bool {
    match meta {
        Value::String(s) => s.split_whitespace().any(|t| t == "yellow"),
        Value::Array(tokens) => tokens.iter().any(|t| t.as_str() == Some("yellow")),
        Value::Object(fields) => fields
            .get("transition")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        _ => false,
    }
}
