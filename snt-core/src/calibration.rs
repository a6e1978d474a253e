//! Voxel coordinates and physical calibration.

use serde::{Deserialize, Serialize};

/// Integer voxel coordinate. 2D volumes always report `z == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Voxel {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Voxel {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Voxel { x, y, z }
    }
}

/// Per-axis physical spacing and a unit label. All distances the search
/// engine computes are physical (spacing-weighted), never raw voxel counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub sx: f64,
    pub sy: f64,
    pub sz: f64,
    pub unit: String,
}

impl Calibration {
    pub fn new(sx: f64, sy: f64, sz: f64, unit: impl Into<String>) -> Self {
        Calibration {
            sx,
            sy,
            sz,
            unit: unit.into(),
        }
    }

    /// Calibration for an unscaled 2D raster: unit spacing on x/y, z spacing
    /// pinned to 1 so no division by zero is ever possible even though a 2D
    /// volume never advances along z.
    pub fn isotropic(spacing: f64, unit: impl Into<String>) -> Self {
        Calibration::new(spacing, spacing, spacing, unit)
    }

    pub fn is_valid(&self) -> bool {
        self.sx.is_finite() && self.sy.is_finite() && self.sz.is_finite()
            && self.sx > 0.0 && self.sy > 0.0 && self.sz > 0.0
    }

    /// Physical Euclidean distance between two voxels.
    pub fn distance(&self, a: Voxel, b: Voxel) -> f64 {
        let dx = (a.x - b.x) as f64 * self.sx;
        let dy = (a.y - b.y) as f64 * self.sy;
        let dz = (a.z - b.z) as f64 * self.sz;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}
