//! Axis-aligned bounding boxes in 2D.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle given by its two corners.
///
/// `min` is component-wise less than or equal to `max`; the constructors
/// normalize their input to keep it that way.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Aabb {
    /// Lower-left corner.
    pub min: Vec2,
    /// Upper-right corner.
    pub max: Vec2,
}

impl Aabb {
    /// A box of zero size at the origin.
    pub const ZERO: Self = Self {
        min: Vec2::ZERO,
        max: Vec2::ZERO,
    };

    /// Create a box from two opposite corners, in any order.
    #[must_use]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create a box centred on `center` with the given half extents.
    /// Negative extents are treated as their absolute value.
    #[must_use]
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// The centre point.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Width and height.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// The box moved by `offset`.
    #[must_use]
    pub fn translated(self, offset: Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Returns `true` if the two boxes overlap with positive area.
    /// Boxes that merely touch along an edge do not intersect.
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Returns `true` if `point` lies inside the box or on its boundary.
    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_corners() {
        let b = Aabb::new(Vec2::new(3.0, -1.0), Vec2::new(1.0, 2.0));
        assert_eq!(b.min, Vec2::new(1.0, -1.0));
        assert_eq!(b.max, Vec2::new(3.0, 2.0));
    }

    #[test]
    fn test_from_center() {
        let b = Aabb::from_center(Vec2::new(1.0, 1.0), Vec2::new(-0.5, 1.0));
        assert_eq!(b.center(), Vec2::new(1.0, 1.0));
        assert_eq!(b.size(), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_intersects() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let b = Aabb::new(Vec2::splat(0.5), Vec2::splat(1.5));
        let c = Aabb::new(Vec2::new(2.0, 0.0), Vec2::new(3.0, 1.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_touching_edges_do_not_intersect() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let b = Aabb::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_translated_and_contains() {
        let b = Aabb::new(Vec2::ZERO, Vec2::ONE).translated(Vec2::new(10.0, 0.0));
        assert!(b.contains_point(Vec2::new(10.5, 0.5)));
        assert!(b.contains_point(Vec2::new(11.0, 1.0)));
        assert!(!b.contains_point(Vec2::new(0.5, 0.5)));
    }

    #[test]
    fn test_json_roundtrip() {
        let b = Aabb::from_center(Vec2::new(2.0, 3.0), Vec2::splat(1.0));
        let json = serde_json::to_string(&b).unwrap();
        let restored: Aabb = serde_json::from_str(&json).unwrap();
        assert_eq!(b, restored);
    }
}
