//! Planar world geometry.
//!
//! The host world is three-dimensional but every dispatch decision is made on
//! the ground plane, so positions carry only `x` and `z`.  Distances are
//! compared squared throughout to avoid the root operation.

use std::f64::consts::{PI, TAU};

/// A point (or velocity vector) on the ground plane, in world units.
#[derive(Copy, Clone, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub z: f32,
}

impl WorldPos {
    pub const ORIGIN: WorldPos = WorldPos { x: 0.0, z: 0.0 };

    #[inline]
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Squared Euclidean distance to `other`.
    #[inline]
    pub fn dist_sq(self, other: WorldPos) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    /// Bearing from `self` towards `other` in radians, `atan2(dz, dx)`.
    #[inline]
    pub fn bearing_to(self, other: WorldPos) -> f64 {
        ((other.z - self.z) as f64).atan2((other.x - self.x) as f64)
    }

    /// Heading of `self` interpreted as a velocity vector.
    ///
    /// A zero vector yields `0.0` (pointing along +x).
    #[inline]
    pub fn heading(self) -> f64 {
        (self.z as f64).atan2(self.x as f64)
    }

    /// Point halfway between `self` and `other`.
    #[inline]
    pub fn midpoint(self, other: WorldPos) -> WorldPos {
        WorldPos::new((self.x + other.x) * 0.5, (self.z + other.z) * 0.5)
    }

    #[inline]
    pub fn offset(self, dx: f32, dz: f32) -> WorldPos {
        WorldPos::new(self.x + dx, self.z + dz)
    }
}

/// Signed difference `a − b` between two angles, wrapped into `[-π, π]`.
///
/// Inputs in `(-π, π]` (as produced by `atan2`) are first lifted into
/// `[0, 2π)` so the subtraction never wraps twice.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let a = if a < 0.0 { a + TAU } else { a };
    let b = if b < 0.0 { b + TAU } else { b };
    let diff = a - b;
    if diff > PI {
        diff - TAU
    } else if diff < -PI {
        diff + TAU
    } else {
        diff
    }
}
