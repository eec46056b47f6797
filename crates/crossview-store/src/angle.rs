//! Heading normalization.
//!
//! Upstream encoders disagree on units: some send yaw in radians, some in
//! degrees. A magnitude larger than a full turn (plus a small tolerance) is
//! taken to be degrees. This misreads an unwrapped radian heading beyond
//! `2π`; the ambiguity is kept for compatibility with existing encoders.

use std::f64::consts::{PI, TAU};

/// Tolerance above a full turn before a value counts as degrees.
pub const DEGREES_EPSILON: f64 = 1e-3;

/// Convert a raw yaw to radians.
///
/// Returns `None` for non-finite input so callers leave the stored heading
/// unchanged. Apply exactly once per value: a converted heading above `2π`
/// would be converted again.
pub fn normalize_angle(raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    if raw.abs() > TAU + DEGREES_EPSILON {
        Some(raw * PI / 180.0)
    } else {
        Some(raw)
    }
}
