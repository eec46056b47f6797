//! Signal colors and the disc indicator view.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three lamp states a signal fixture can show.
///
/// Parsing accepts exactly the lowercase names `red`, `yellow` and `green`;
/// anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalColor {
    /// Stop.
    #[default]
    Red,
    /// Clearing.
    Yellow,
    /// Go.
    Green,
}

impl SignalColor {
    /// Wire name of the color.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }

    /// Lamp section the color lives in, top to bottom.
    pub const fn section(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Yellow => 1,
            Self::Green => 2,
        }
    }

    /// Indicator tint as `0xRRGGBB`.
    pub const fn rgb(self) -> u32 {
        match self {
            Self::Red => 0x00ff_5050,
            Self::Yellow => 0x00ff_d24d,
            Self::Green => 0x004d_df64,
        }
    }
}

impl core::fmt::Display for SignalColor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A color name outside the three-value enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal color: {0:?}")]
pub struct UnknownColor(pub String);

impl FromStr for SignalColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Self::Red),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            other => Err(UnknownColor(other.to_owned())),
        }
    }
}

/// The round indicator drawn in front of the lit lamp section.
///
/// Never stored: it is computed from a fixture's color (or from its local
/// auto-cycle while one runs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscIndicator {
    /// Color the disc shows.
    pub color: SignalColor,
    /// Lamp section the disc sits in.
    pub section: usize,
    /// Disc tint as `0xRRGGBB`.
    pub rgb: u32,
}

impl From<SignalColor> for DiscIndicator {
    fn from(color: SignalColor) -> Self {
        Self {
            color,
            section: color.section(),
            rgb: color.rgb(),
        }
    }
}
