//! Math type re-exports and scene-specific math utilities.
//!
//! This module re-exports types from `glam` and provides the bounding box
//! types stored in scene caches.

// Re-export glam types
pub use glam::{
    // Single precision vectors
    Vec2, Vec3, Vec4,
    // Double precision vectors
    DVec2, DVec3, DVec4,
    // Matrices
    Mat4, DMat3, DMat4,
    // Quaternions
    Quat, DQuat,
};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// 3D bounding box with single precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Box3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl Box3f {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }
}

impl Default for Box3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Box3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Box3f({:?} - {:?})", self.min, self.max)
    }
}

/// 3D bounding box with double precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Box3d {
    pub min: DVec3,
    pub max: DVec3,
}

impl Box3d {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Create a bounding box from a single point.
    #[inline]
    pub fn from_point(p: DVec3) -> Self {
        Self { min: p, max: p }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand this box to include another box.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Union of two boxes.
    #[inline]
    pub fn union(mut self, other: &Self) -> Self {
        self.expand_by_box(other);
        self
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size (extents) of the box.
    #[inline]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Axis aligned box enclosing the eight transformed corners.
    ///
    /// Empty boxes stay empty.
    pub fn transformed(&self, m: &DMat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::EMPTY;
        for i in 0..8 {
            let corner = DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_by_point(m.transform_point3(corner));
        }
        out
    }

    /// Component-wise comparison with tolerance.
    pub fn abs_diff_eq(&self, other: &Self, eps: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() == other.is_empty();
        }
        self.min.abs_diff_eq(other.min, eps) && self.max.abs_diff_eq(other.max, eps)
    }
}

impl Default for Box3d {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Box3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Box3d({:?} - {:?})", self.min, self.max)
    }
}

impl From<Box3f> for Box3d {
    fn from(b: Box3f) -> Self {
        Self {
            min: b.min.as_dvec3(),
            max: b.max.as_dvec3(),
        }
    }
}

/// Chrono type - time value (seconds).
pub type Chrono = f64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box3d() {
        let mut b = Box3d::EMPTY;
        assert!(b.is_empty());

        b.expand_by_point(DVec3::new(-1.0, -1.0, -1.0));
        b.expand_by_point(DVec3::new(1.0, 1.0, 1.0));

        assert_eq!(b.center(), DVec3::ZERO);
        assert_eq!(b.size(), DVec3::splat(2.0));
    }

    #[test]
    fn test_transformed() {
        let b = Box3d::new(DVec3::ZERO, DVec3::ONE);
        let moved = b.transformed(&DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0)));
        assert!(moved.abs_diff_eq(&Box3d::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0)), 1e-12));

        let rotated = b.transformed(&DMat4::from_rotation_z(std::f64::consts::FRAC_PI_2));
        assert!((rotated.min.x + 1.0).abs() < 1e-9);
        assert!(rotated.max.x.abs() < 1e-9);

        assert!(Box3d::EMPTY.transformed(&DMat4::IDENTITY).is_empty());
    }

    #[test]
    fn test_box_pod() {
        assert_eq!(std::mem::size_of::<Box3f>(), 24);
        assert_eq!(std::mem::size_of::<Box3d>(), 48);
    }
}
