//! Demo scene population.

use engine_defaults::{Collider, Position, Sprite, Velocity, Viewport};
use engine_ecs::{Entity, Result, World};
use engine_math::Vec2;

/// Side length of a demo body.
const BODY_SIZE: f32 = 1.0;

/// Spawn `count` moving bodies on a grid plus one viewport entity.
///
/// Bodies in neighbouring columns move towards each other, so collisions
/// start and end as the scene runs.
pub fn populate(world: &mut World, count: usize) -> Result<Vec<Entity>> {
    let screen = world.create_entity()?;
    world.add_component(
        screen,
        Viewport {
            width: 1280,
            height: 720,
        },
    )?;

    let columns = (count as f32).sqrt().ceil().max(1.0) as usize;
    let mut bodies = Vec::with_capacity(count);
    for i in 0..count {
        let column = i % columns;
        let row = i / columns;
        let direction = if column % 2 == 0 { 1.0 } else { -1.0 };

        let e = world.create_entity()?;
        world.add_component(e, Position(Vec2::new(column as f32 * 3.0, row as f32 * 3.0)))?;
        world.add_component(e, Velocity(Vec2::new(direction, 0.0)))?;
        world.add_component(e, Collider::square(BODY_SIZE))?;
        world.add_component(
            e,
            Sprite {
                size: Vec2::splat(BODY_SIZE),
                color: [0.2, 0.6, 1.0, 1.0],
            },
        )?;
        bodies.push(e);
    }
    Ok(bodies)
}

#[cfg(test)]
mod tests {
    use engine_defaults::{Colliding, RecordingTarget};
    use engine_ecs::Signature;

    use super::*;

    #[test]
    fn test_populate_counts() {
        let mut world = World::new();
        let bodies = populate(&mut world, 9).unwrap();
        assert_eq!(bodies.len(), 9);
        assert_eq!(world.entity_count(), 10);
        assert_eq!(world.component_count(), 9 * 4 + 1);
    }

    #[test]
    fn test_scene_produces_collisions() {
        let mut world = World::new();
        populate(&mut world, 4).unwrap();
        engine_defaults::install(&mut world, RecordingTarget::new());
        let colliding = world.query(Signature::new().with::<Colliding>()).unwrap();

        // Columns 0 and 1 start 3 apart and close at 2 units per second.
        let mut touched = false;
        for _ in 0..3 {
            assert!(world.tick(0.0, 0.5).is_clean());
            touched |= !world.matches(colliding).unwrap().is_empty();
        }
        assert!(touched);
    }
}
