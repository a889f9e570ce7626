//! Velocity integration.

use engine_ecs::{Frame, HookResult, QueryHandle, Signature, System, World};

use crate::components::{Position, Velocity};

/// Moves every entity with a [`Position`] and a [`Velocity`] by
/// `velocity * delta` each frame.
#[derive(Debug, Default)]
pub struct MotionSystem {
    query: Option<QueryHandle>,
}

impl MotionSystem {
    /// Default priority in the `Update` phase.
    pub const PRIORITY: f64 = 0.0;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl System for MotionSystem {
    fn name(&self) -> &str {
        "motion"
    }

    fn initialize(&mut self, world: &mut World) -> HookResult {
        self.query = Some(world.query(Signature::new().with::<Position>().with::<Velocity>())?);
        Ok(())
    }

    fn queries(&self) -> Vec<QueryHandle> {
        self.query.into_iter().collect()
    }

    fn update(&mut self, frame: &mut Frame<'_>) -> HookResult {
        let Some(query) = self.query else {
            return Ok(());
        };
        let delta = frame.delta() as f32;
        for &entity in frame.entities(query)?.iter() {
            let velocity = *frame.world.get_component::<Velocity>(entity)?;
            frame.world.get_component_mut::<Position>(entity)?.0 += velocity.0 * delta;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use engine_ecs::Phase;
    use engine_math::Vec2;

    use super::*;

    #[test]
    fn test_integrates_position() {
        let mut world = World::new();
        let moving = world.create_entity().unwrap();
        world.add_component(moving, Position(Vec2::ZERO)).unwrap();
        world.add_component(moving, Velocity(Vec2::new(2.0, -4.0))).unwrap();
        let still = world.create_entity().unwrap();
        world.add_component(still, Position(Vec2::ONE)).unwrap();

        world.register_system(MotionSystem::new(), Phase::Update, MotionSystem::PRIORITY);
        let report = world.tick(500.0, 0.5);
        assert!(report.is_clean());

        assert_eq!(world.get_component::<Position>(moving).unwrap().0, Vec2::new(1.0, -2.0));
        assert_eq!(world.get_component::<Position>(still).unwrap().0, Vec2::ONE);
    }

    #[test]
    fn test_picks_up_velocity_added_later() {
        let mut world = World::new();
        world.register_system(MotionSystem::new(), Phase::Update, MotionSystem::PRIORITY);
        let e = world.create_entity().unwrap();
        world.add_component(e, Position(Vec2::ZERO)).unwrap();
        world.tick(0.0, 1.0);

        world.add_component(e, Velocity(Vec2::X)).unwrap();
        world.tick(1000.0, 1.0);
        assert_eq!(world.get_component::<Position>(e).unwrap().0, Vec2::X);
    }
}
