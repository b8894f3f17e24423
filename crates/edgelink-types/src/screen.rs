//! Screen geometry, handoff edges, and normalised pointer coordinates.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Pixel dimensions of a machine's display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ScreenGeometry {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn width_i32(&self) -> i32 {
        i32::try_from(self.width).unwrap_or(i32::MAX)
    }

    fn height_i32(&self) -> i32 {
        i32::try_from(self.height).unwrap_or(i32::MAX)
    }

    /// Check whether a pixel coordinate is within `margin` pixels of `edge`.
    #[must_use]
    pub fn is_at_edge(&self, px: i32, py: i32, edge: Edge, margin: i32) -> bool {
        match edge {
            Edge::Left => px <= margin,
            Edge::Right => px >= self.width_i32().saturating_sub(margin),
            Edge::Top => py <= margin,
            Edge::Bottom => py >= self.height_i32().saturating_sub(margin),
        }
    }

    /// Check whether a pixel coordinate is strictly away from every edge.
    #[must_use]
    pub fn is_interior(&self, px: i32, py: i32, margin: i32) -> bool {
        margin < px
            && px < self.width_i32().saturating_sub(margin)
            && margin < py
            && py < self.height_i32().saturating_sub(margin)
    }

    /// The point `margin` pixels inside `edge`, keeping the coordinate that
    /// runs along the edge.
    #[must_use]
    pub fn inside(&self, edge: Edge, margin: i32, px: i32, py: i32) -> (i32, i32) {
        match edge {
            Edge::Left => (margin, py),
            Edge::Right => (self.width_i32().saturating_sub(margin), py),
            Edge::Top => (px, margin),
            Edge::Bottom => (px, self.height_i32().saturating_sub(margin)),
        }
    }

    /// Whether a margin leaves any interior at all on this screen.
    #[must_use]
    pub fn fits_margin(&self, margin: i32) -> bool {
        margin >= 0
            && margin.saturating_mul(2) < self.width_i32()
            && margin.saturating_mul(2) < self.height_i32()
    }
}

/// Where the peer's screen sits relative to this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Left,
    Right,
    Bottom,
}

impl Edge {
    /// Return the opposite edge.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Top => "Top",
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Bottom => "Bottom",
        };
        f.write_str(name)
    }
}

impl FromStr for Edge {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "bottom" => Ok(Self::Bottom),
            _ => Err(ParseError::Edge(s.to_string())),
        }
    }
}

/// Pointer position as a fraction of the screen, in `[0, 1] x [0, 1]`.
///
/// Senders normalise with their own dimensions and receivers denormalise with
/// theirs, so machines with different resolutions line up proportionally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPointer {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPointer {
    /// Create a pointer, clamping both axes into `[0, 1]`. NaN becomes 0.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    /// Normalise a pixel position on `screen`.
    #[must_use]
    pub fn from_pixels(px: i32, py: i32, screen: &ScreenGeometry) -> Self {
        let fraction = |p: i32, extent: u32| {
            if extent == 0 {
                0.0
            } else {
                f64::from(p) / f64::from(extent)
            }
        };
        Self::new(fraction(px, screen.width), fraction(py, screen.height))
    }

    /// Convert to a pixel position on `screen`, rounding to the nearest pixel
    /// and clamping to the last addressable one.
    #[must_use]
    pub fn to_pixels(&self, screen: &ScreenGeometry) -> (i32, i32) {
        (
            scale(self.x, screen.width),
            scale(self.y, screen.height),
        )
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn scale(fraction: f64, extent: u32) -> i32 {
    let last = i32::try_from(extent.saturating_sub(1)).unwrap_or(i32::MAX);
    let px = (fraction * f64::from(extent)).round();
    // `fraction` is clamped to [0, 1], so this fits in i32 before clamping.
    (px as i64).clamp(0, i64::from(last)) as i32
}
