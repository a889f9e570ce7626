//! Component types read and written by the built-in systems.

use engine_component::Component;
use engine_math::{Aabb, Vec2};
use serde::{Deserialize, Serialize};

/// World-space position of an entity's centre.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position(pub Vec2);

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

/// Units per second.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity(pub Vec2);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// A box collider centred on the entity's [`Position`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Collider {
    /// Half width and half height.
    pub half_extents: Vec2,
}

impl Collider {
    /// A square collider of side `size`.
    #[must_use]
    pub fn square(size: f32) -> Self {
        Self {
            half_extents: Vec2::splat(size * 0.5),
        }
    }

    /// The world-space bounds at `position`.
    #[must_use]
    pub fn bounds(&self, position: Position) -> Aabb {
        Aabb::from_center(position.0, self.half_extents)
    }
}

impl Component for Collider {
    fn type_name() -> &'static str {
        "Collider"
    }
}

/// Marker present while an entity's collider overlaps another.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Colliding;

impl Component for Colliding {
    fn type_name() -> &'static str {
        "Colliding"
    }
}

/// A flat-coloured rectangle drawn at the entity's [`Position`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sprite {
    pub size: Vec2,
    /// Linear RGBA.
    pub color: [f32; 4],
}

impl Component for Sprite {
    fn type_name() -> &'static str {
        "Sprite"
    }
}

/// Requested output size. The render system resizes its target to match
/// the first viewport it finds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Component for Viewport {
    fn type_name() -> &'static str {
        "Viewport"
    }
}
