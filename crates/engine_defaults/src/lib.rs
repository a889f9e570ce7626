//! # engine_defaults
//!
//! Built-in components and systems that plug into [`engine_ecs`]:
//!
//! - [`components`]: 2D position, velocity, collider, sprite and viewport data.
//! - [`MotionSystem`]: integrates positions by velocity.
//! - [`CollisionSystem`]: AABB overlap tests that tag overlapping entities
//!   with [`Colliding`].
//! - [`RenderSystem`]: draws sprites through an opaque [`RenderTarget`].
//!
//! [`install`] registers all three with their default phases and priorities.

pub mod collision;
pub mod components;
pub mod motion;
pub mod render;

use engine_ecs::{Phase, SystemId, World};

pub use collision::CollisionSystem;
pub use components::{Collider, Colliding, Position, Sprite, Velocity, Viewport};
pub use motion::MotionSystem;
pub use render::{DrawCommand, Quad, RecordingTarget, RenderError, RenderSystem, RenderTarget};

/// Ids of the systems registered by [`install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSystems {
    pub motion: SystemId,
    pub collision: SystemId,
    pub render: SystemId,
}

/// Register the built-in systems, rendering into `target`.
pub fn install<T: RenderTarget + 'static>(world: &mut World, target: T) -> DefaultSystems {
    DefaultSystems {
        motion: world.register_system(MotionSystem::new(), Phase::Update, MotionSystem::PRIORITY),
        collision: world.register_system(
            CollisionSystem::new(),
            Phase::Update,
            CollisionSystem::PRIORITY,
        ),
        render: world.register_system(RenderSystem::new(target), Phase::Draw, RenderSystem::<T>::PRIORITY),
    }
}
