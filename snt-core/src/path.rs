//! The `Path` output model: an ordered polyline of 3D points in physical
//! coordinates.
//!
//! Paths never need cyclic structure, so this is a flat arena
//! (`Vec<PathPoint>`) addressed by position, not a linked list of owning
//! `Rc`/`RefCell` nodes. There is nothing here that needs back-references,
//! so the arena is just a `Vec`: integer indices, never owning pointers.

use serde::{Deserialize, Serialize};

use crate::calibration::Voxel;

/// SWC node type tag (a small subset of the de-facto SWC standard:
/// 0=undefined, 1=soma, 2=axon, 3=basal dendrite, 4=apical dendrite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwcType {
    Undefined,
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
}

impl SwcType {
    pub fn code(self) -> i32 {
        match self {
            SwcType::Undefined => 0,
            SwcType::Soma => 1,
            SwcType::Axon => 2,
            SwcType::BasalDendrite => 3,
            SwcType::ApicalDendrite => 4,
        }
    }
}

/// A single point along a `Path`, in physical coordinates (spacing already
/// applied), with an optional radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: Option<f64>,
}

/// An immutable (at the core boundary) ordered polyline produced by a
/// successful search, or by converting a fill's `NodeStore` into a tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    points: Vec<PathPoint>,
    swc_type: SwcType,
}

impl Path {
    pub fn new(points: Vec<PathPoint>, swc_type: SwcType) -> Self {
        Path { points, swc_type }
    }

    /// Builds a path from a chain of voxels (as produced by walking a
    /// `SearchNode` predecessor chain), applying `Calibration` to get
    /// physical coordinates.
    pub fn from_voxels(voxels: &[Voxel], calibration: &crate::calibration::Calibration, swc_type: SwcType) -> Self {
        let points = voxels
            .iter()
            .map(|v| PathPoint {
                x: v.x as f64 * calibration.sx,
                y: v.y as f64 * calibration.sy,
                z: v.z as f64 * calibration.sz,
                radius: None,
            })
            .collect();
        Path::new(points, swc_type)
    }

    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    pub fn swc_type(&self) -> SwcType {
        self.swc_type
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rasterises the path back to voxel coordinates at 1:1 scaling (the
    /// inverse of `from_voxels`), used by the fill round-trip property (R2).
    pub fn to_voxels(&self, calibration: &crate::calibration::Calibration) -> Vec<Voxel> {
        self.points
            .iter()
            .map(|p| {
                Voxel::new(
                    (p.x / calibration.sx).round() as i64,
                    (p.y / calibration.sy).round() as i64,
                    (p.z / calibration.sz).round() as i64,
                )
            })
            .collect()
    }
}
