//! Math utilities
//!
//! Re-exports from glam and bounding volumes for generated geometry.

pub use glam::{Mat3, Quat, Vec2, Vec3, Vec4};

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// An empty AABB, the identity for [`Aabb::expand_to_include`]
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from center and half-extents
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest AABB enclosing every point, or [`Aabb::EMPTY`] for no points
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut result = Self::EMPTY;
        for point in points {
            result.expand_to_include(*point);
        }
        result
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the half-extents of the AABB
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Get the full size of the AABB
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if the AABB is empty
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Check if a point is inside the AABB
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Expand the AABB to include a point
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Merge with another AABB
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// Center of the sphere
    pub center: Vec3,
    /// Radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new bounding sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if a point is inside the sphere
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point - self.center).length_squared() <= self.radius * self.radius
    }

    /// Create a bounding sphere from an AABB
    pub fn from_aabb(aabb: &Aabb) -> Self {
        if aabb.is_empty() {
            return Self::new(Vec3::ZERO, 0.0);
        }
        Self {
            center: aabb.center(),
            radius: aabb.half_extents().length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_creation() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
    }

    #[test]
    fn test_aabb_from_points() {
        let points = [Vec3::new(-1.0, 2.0, 0.5), Vec3::new(3.0, -4.0, 0.0)];
        let aabb = Aabb::from_points(&points);
        assert_eq!(aabb.min, Vec3::new(-1.0, -4.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(3.0, 2.0, 0.5));
        assert!(aabb.contains_point(Vec3::ZERO));
        assert!(!aabb.contains_point(Vec3::splat(5.0)));
    }

    #[test]
    fn test_aabb_empty() {
        let aabb = Aabb::from_points(&[] as &[Vec3]);
        assert!(aabb.is_empty());
        assert_eq!(aabb, Aabb::default());
    }

    #[test]
    fn test_aabb_merge() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_center_half_extents(Vec3::splat(2.0), Vec3::splat(0.5));
        let merged = a.merge(&b);
        assert_eq!(merged.min, Vec3::ZERO);
        assert_eq!(merged.max, Vec3::splat(2.5));
    }

    #[test]
    fn test_sphere_from_aabb() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let sphere = BoundingSphere::from_aabb(&aabb);
        assert_eq!(sphere.center, Vec3::ZERO);
        assert!((sphere.radius - 3.0_f32.sqrt()).abs() < 1.0e-6);
        assert!(sphere.contains_point(Vec3::splat(0.99)));

        let empty = BoundingSphere::from_aabb(&Aabb::EMPTY);
        assert_eq!(empty.radius, 0.0);
    }
}
