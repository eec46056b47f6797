//! Bulk `init` and `update` payloads.
//!
//! Bulk payloads come from scene bootstrap code and from `control` commands,
//! so they are parsed leniently: an item that does not parse is dropped on
//! its own, an item without an id survives parsing and is skipped by the
//! store, and a list of the wrong shape is treated as empty.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::geometry::{Placement, PoseUpdate};

/// Render a JSON id (string or number) as its text form.
///
/// Empty strings and every other JSON type yield `None`.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_text))
}

fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// One signal fixture in an `init` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalInit {
    /// Fixture id; items without one are skipped.
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
    /// Mounting height.
    pub z: f64,
    /// Raw yaw, in degrees or radians.
    pub rot: f64,
    /// Initial color name; red when absent.
    pub color: Option<String>,
}

impl SignalInit {
    /// The placement part of this item.
    pub const fn placement(&self) -> Placement {
        Placement::at(self.x, self.y, self.z, self.rot)
    }
}

/// One vehicle in an `init` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleInit {
    /// Vehicle id; items without one are skipped.
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
    /// Height above the road.
    pub z: f64,
    /// Raw yaw, in degrees or radians.
    #[serde(alias = "theta")]
    pub rot: f64,
}

impl VehicleInit {
    /// The placement part of this item.
    pub const fn placement(&self) -> Placement {
        Placement::at(self.x, self.y, self.z, self.rot)
    }
}

/// Bulk scene bootstrap: fixtures first, then vehicles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitPayload {
    /// Signal fixtures to create or update.
    #[serde(alias = "signals", deserialize_with = "lenient_items")]
    pub lights: Vec<SignalInit>,
    /// Vehicles to create or update.
    #[serde(alias = "vehicles", deserialize_with = "lenient_items")]
    pub cars: Vec<VehicleInit>,
}

/// A color assignment inside an `update` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorChange {
    /// Target fixture.
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    /// Color name to apply.
    pub color: Option<String>,
}

/// A vehicle move inside an `update` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveChange {
    /// Target vehicle.
    #[serde(deserialize_with = "lenient_id")]
    pub id: Option<String>,
    /// New east-west coordinate.
    pub x: Option<f64>,
    /// New north-south coordinate.
    pub y: Option<f64>,
    /// New height.
    pub z: Option<f64>,
    /// New raw yaw.
    #[serde(alias = "theta")]
    pub rot: Option<f64>,
}

impl MoveChange {
    /// The pose part of this item.
    pub const fn pose(&self) -> PoseUpdate {
        PoseUpdate {
            x: self.x,
            y: self.y,
            z: self.z,
            rot: self.rot,
        }
    }
}

/// Bulk incremental changes: color sets first, then moves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePayload {
    /// Fixture color assignments.
    #[serde(rename = "setLight", alias = "set_light", deserialize_with = "lenient_items")]
    pub set_light: Vec<ColorChange>,
    /// Vehicle moves.
    #[serde(rename = "moveCar", alias = "move_car", deserialize_with = "lenient_items")]
    pub move_car: Vec<MoveChange>,
}
