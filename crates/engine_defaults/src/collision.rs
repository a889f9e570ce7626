//! Broad-phase AABB overlap.
//!
//! Each frame every pair of entities with a [`Position`] and a [`Collider`]
//! is tested. Entities that overlap at least one other gain the
//! [`Colliding`] marker, entities that no longer overlap lose it. The marker
//! changes are ordinary structural changes, so queries over `Colliding` see
//! them immediately.

use engine_ecs::{Entity, Frame, HookResult, QueryHandle, Signature, System, World};
use engine_math::Aabb;
use tracing::trace;

use crate::components::{Collider, Colliding, Position};

/// Tags overlapping colliders with [`Colliding`].
#[derive(Debug, Default)]
pub struct CollisionSystem {
    query: Option<QueryHandle>,
    /// Overlapping pairs found in the last update.
    contacts: usize,
}

impl CollisionSystem {
    /// Default priority in the `Update` phase; runs after motion.
    pub const PRIORITY: f64 = 10.0;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlapping pairs found in the last update.
    #[must_use]
    pub fn contacts(&self) -> usize {
        self.contacts
    }
}

impl System for CollisionSystem {
    fn name(&self) -> &str {
        "collision"
    }

    fn initialize(&mut self, world: &mut World) -> HookResult {
        self.query = Some(world.query(Signature::new().with::<Position>().with::<Collider>())?);
        Ok(())
    }

    fn queries(&self) -> Vec<QueryHandle> {
        self.query.into_iter().collect()
    }

    fn update(&mut self, frame: &mut Frame<'_>) -> HookResult {
        let Some(query) = self.query else {
            return Ok(());
        };

        let mut bodies: Vec<(Entity, Aabb, bool)> = Vec::new();
        for &entity in frame.entities(query)?.iter() {
            let position = *frame.world.get_component::<Position>(entity)?;
            let collider = frame.world.get_component::<Collider>(entity)?;
            bodies.push((entity, collider.bounds(position), false));
        }

        let mut contacts = 0;
        for i in 0..bodies.len() {
            for j in i + 1..bodies.len() {
                if bodies[i].1.intersects(&bodies[j].1) {
                    bodies[i].2 = true;
                    bodies[j].2 = true;
                    contacts += 1;
                }
            }
        }
        self.contacts = contacts;
        trace!(frame = frame.frame(), bodies = bodies.len(), contacts, "collision pass");

        for (entity, _, overlapping) in bodies {
            let tagged = frame.world.has_component::<Colliding>(entity)?;
            if overlapping && !tagged {
                frame.world.add_component(entity, Colliding)?;
            } else if !overlapping && tagged {
                frame.world.remove_component::<Colliding>(entity)?;
            }
        }
        Ok(())
    }
}
