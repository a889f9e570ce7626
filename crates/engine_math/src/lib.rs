//! # engine_math
//!
//! Math types for the ECS engine. Re-exports [`glam`] for linear algebra and
//! defines the 2D bounding box used by the built-in collision system.

pub mod aabb;

// Re-export glam types for convenience.
pub use glam::{Mat3, Vec2, Vec3, Vec4};

pub use aabb::Aabb;
