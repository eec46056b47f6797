//! Poses and pose updates.
//!
//! All coordinates are meters in the intersection frame with Z up. Headings
//! are yaw angles around Z. Whether an angle is stored in radians is the
//! store's concern: values here are carried exactly as received.

use serde::{Deserialize, Serialize};

/// A point in the intersection frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
    /// Height above the road surface.
    pub z: f64,
}

impl Vec3 {
    /// The origin of the intersection frame.
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a point from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Initial placement of an entity on create.
///
/// Every component defaults to zero, so an empty placement puts the entity
/// at the origin facing along +X.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placement {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
    /// Height above the road surface.
    pub z: f64,
    /// Raw yaw, in degrees or radians.
    #[serde(alias = "theta")]
    pub rot: f64,
}

impl Placement {
    /// Placement at the given position with the given raw yaw.
    pub const fn at(x: f64, y: f64, z: f64, rot: f64) -> Self {
        Self { x, y, z, rot }
    }
}

/// A partial pose change for an existing vehicle.
///
/// Absent or non-finite fields leave the corresponding stored value as it
/// is. Position only changes when both `x` and `y` are usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseUpdate {
    /// New east-west coordinate.
    pub x: Option<f64>,
    /// New north-south coordinate.
    pub y: Option<f64>,
    /// New height; treated as zero when a position is applied without it.
    pub z: Option<f64>,
    /// New raw yaw, in degrees or radians.
    #[serde(alias = "theta")]
    pub rot: Option<f64>,
}

impl PoseUpdate {
    /// Update that moves to `(x, y)` on the road surface.
    pub const fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: None,
            rot: None,
        }
    }

    /// Update that only turns to the given raw yaw.
    pub const fn heading(rot: f64) -> Self {
        Self {
            x: None,
            y: None,
            z: None,
            rot: Some(rot),
        }
    }

    /// Attach a raw yaw to this update.
    #[must_use]
    pub const fn with_rot(mut self, rot: f64) -> Self {
        self.rot = Some(rot);
        self
    }

    /// The finite `(x, y, z)` target if both `x` and `y` are finite.
    ///
    /// A missing or non-finite `z` resolves to the road surface.
    pub fn finite_position(&self) -> Option<Vec3> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                let z = self.z.filter(|z| z.is_finite()).unwrap_or(0.0);
                Some(Vec3::new(x, y, z))
            }
            _ => None,
        }
    }
}
