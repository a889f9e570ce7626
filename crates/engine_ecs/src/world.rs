//! The [`World`], composition root of the ECS.
//!
//! The world owns the entity registry, the component store, the query index
//! and the system registry. Systems receive it explicitly in every hook;
//! there is no ambient "current world".
//!
//! Every structural change (entity create/destroy, component add/remove) is
//! applied immediately and reported to the query index in the same call, so
//! for every live query `Q` and entity `E`:
//!
//! ```text
//! E ∈ Q.members  ⇔  E.types ⊇ Q.signature
//! ```

use std::rc::Rc;

use tracing::{debug, warn};

use engine_component::{
    Component, ComponentStore, ComponentTypeId, EcsError, Entity, EntityRegistry, Inserted,
    Result, Signature,
};

use crate::config::WorldConfig;
use crate::query::{Query, QueryHandle, QueryIndex, QueryStats};
use crate::registry::{SystemRegistry, SystemState};
use crate::scheduler::{FailureReport, Scheduler};
use crate::system::{Phase, System, SystemId};

/// Entities, components, queries and systems of one scene.
pub struct World {
    pub(crate) config: WorldConfig,
    entities: EntityRegistry,
    components: ComponentStore,
    queries: QueryIndex,
    pub(crate) systems: SystemRegistry,
    pub(crate) scheduler: Scheduler,
}

impl World {
    /// Create an empty world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create an empty world.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            entities: EntityRegistry::new(),
            components: ComponentStore::new(config.duplicate_policy),
            queries: QueryIndex::new(),
            systems: SystemRegistry::new(),
            scheduler: Scheduler::default(),
        }
    }

    /// Returns the configuration this world was built with.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // -- Entity lifecycle --

    /// Create a new entity with no components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] once every entity slot is in
    /// use or retired.
    pub fn create_entity(&mut self) -> Result<Entity> {
        let entity = self.entities.create()?;
        self.queries.on_entity_created(entity);
        Ok(entity)
    }

    /// Destroy `entity`, detaching every component first.
    ///
    /// Components are detached in ascending [`ComponentTypeId`] order, each
    /// reported to the query index as a removal.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        let types: Vec<ComponentTypeId> = self.entities.types(entity)?.iter().copied().collect();
        for type_id in types {
            self.components.remove_erased(entity, type_id);
            self.entities.remove_type(entity, type_id)?;
            self.queries.on_component_removed(entity, type_id);
        }
        self.queries.on_entity_destroyed(entity);
        self.entities.destroy(entity)?;
        debug!(%entity, "entity destroyed");
        Ok(())
    }

    /// Returns `true` if `entity` is alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -- Component lifecycle --

    /// Attach `component` to `entity`.
    ///
    /// Under [`DuplicatePolicy::Replace`](engine_component::DuplicatePolicy)
    /// an existing instance of the same type is replaced and returned.
    ///
    /// # Errors
    ///
    /// - [`EcsError::StaleEntity`] if `entity` is not alive.
    /// - [`EcsError::ComponentConflict`] if the type is present and the
    ///   policy is `Reject`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<Option<T>> {
        self.entities.types(entity)?;
        let type_id = T::component_type_id();
        let prior = match self.components.insert(entity, component)? {
            Inserted::New => None,
            Inserted::Replaced(prior) => Some(prior),
        };
        self.entities.insert_type(entity, type_id)?;
        let types = self.entities.types(entity)?;
        self.queries.on_component_added(entity, type_id, types);
        Ok(prior)
    }

    /// Detach and return the `T` component of `entity`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::StaleEntity`] if `entity` is not alive.
    /// - [`EcsError::ComponentNotFound`] if it carries no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T> {
        self.entities.types(entity)?;
        let value = self.components.remove::<T>(entity)?;
        let type_id = T::component_type_id();
        self.entities.remove_type(entity, type_id)?;
        self.queries.on_component_removed(entity, type_id);
        Ok(value)
    }

    /// Borrow the `T` component of `entity`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::StaleEntity`] if `entity` is not alive.
    /// - [`EcsError::ComponentNotFound`] if it carries no `T`.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T> {
        self.entities.types(entity)?;
        self.components.get::<T>(entity)
    }

    /// Mutably borrow the `T` component of `entity`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::StaleEntity`] if `entity` is not alive.
    /// - [`EcsError::ComponentNotFound`] if it carries no `T`.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        self.entities.types(entity)?;
        self.components.get_mut::<T>(entity)
    }

    /// Returns whether `entity` carries a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn has_component<T: Component>(&self, entity: Entity) -> Result<bool> {
        self.has_component_id(entity, T::component_type_id())
    }

    /// Returns whether `entity` carries a component of `type_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn has_component_id(&self, entity: Entity, type_id: ComponentTypeId) -> Result<bool> {
        Ok(self.entities.types(entity)?.contains(&type_id))
    }

    /// Returns the total number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    // -- Queries --

    /// Declare a query and get a handle to its live membership.
    ///
    /// Requesting a signature that already has a query returns the same
    /// handle and adds a reference to it.
    ///
    /// A reference taken from inside a system's hook belongs to that system
    /// and is released when the system is unregistered or fails to
    /// initialize.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] if no more handles or
    /// references can be issued.
    pub fn query(&mut self, signature: Signature) -> Result<QueryHandle> {
        let handle = self.queries.get_or_create(signature, self.entities.iter())?;
        if let Some(id) = self.scheduler.current {
            self.systems.hold_query(id, handle);
        }
        Ok(handle)
    }

    /// Drop one reference to a query.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownQuery`] if the handle is not live.
    pub fn release_query(&mut self, handle: QueryHandle) -> Result<()> {
        self.queries.release(handle)?;
        if let Some(id) = self.scheduler.current {
            self.systems.drop_query(id, handle);
        }
        Ok(())
    }

    /// Borrow a live query.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownQuery`] if the handle is not live.
    pub fn get_query(&self, handle: QueryHandle) -> Result<&Query> {
        self.queries.get(handle)
    }

    /// The current members of a query.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownQuery`] if the handle is not live.
    pub fn matches(&self, handle: QueryHandle) -> Result<&[Entity]> {
        self.queries.get(handle).map(Query::entities)
    }

    /// An O(1) copy of a query's current members that later structural
    /// changes do not affect.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownQuery`] if the handle is not live.
    pub fn snapshot(&self, handle: QueryHandle) -> Result<Rc<Vec<Entity>>> {
        self.queries.get(handle).map(Query::snapshot)
    }

    /// Returns the number of live queries.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Returns the query index's work counters.
    #[must_use]
    pub fn query_stats(&self) -> QueryStats {
        self.queries.stats()
    }

    /// Reset the query index's work counters.
    pub fn reset_query_stats(&mut self) {
        self.queries.reset_stats();
    }

    // -- Systems --

    /// Register `system` in `phase`. Lower priorities run earlier; ties run
    /// in registration order.
    ///
    /// The system is initialized at the start of the next frame. A system
    /// registered mid-frame first runs on the following frame.
    pub fn register_system(
        &mut self,
        system: impl System + 'static,
        phase: Phase,
        priority: f64,
    ) -> SystemId {
        let id = self.systems.register(Box::new(system), phase, priority);
        debug!(system = %id, name = self.systems.name(id).unwrap_or_default(), %phase, priority, "system registered");
        id
    }

    /// Remove a system. The query references it acquired and still holds are
    /// released.
    ///
    /// Called during a frame, the system still completes that frame and is
    /// removed once the frame ends.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `id` is not registered.
    pub fn unregister_system(&mut self, id: SystemId) -> Result<()> {
        if self.scheduler.in_frame {
            return self.systems.defer_removal(id);
        }
        self.remove_system_now(id)
    }

    pub(crate) fn remove_system_now(&mut self, id: SystemId) -> Result<()> {
        let removed = self.systems.remove(id)?;
        self.release_held(id, removed.queries);
        debug!(system = %id, name = %removed.name, "system unregistered");
        Ok(())
    }

    pub(crate) fn release_held(&mut self, id: SystemId, handles: Vec<QueryHandle>) {
        for handle in handles {
            if let Err(err) = self.queries.release(handle) {
                warn!(system = %id, query = %handle, %err, "held query was already discarded");
            }
        }
    }

    /// Change a system's priority. Takes effect from the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `id` is not registered.
    pub fn set_system_priority(&mut self, id: SystemId, priority: f64) -> Result<()> {
        self.systems.set_priority(id, priority)
    }

    /// Returns a system's lifecycle state, or `None` if it is not registered.
    #[must_use]
    pub fn system_state(&self, id: SystemId) -> Option<SystemState> {
        self.systems.state(id)
    }

    /// Returns a system's name.
    #[must_use]
    pub fn system_name(&self, id: SystemId) -> Option<&str> {
        self.systems.name(id)
    }

    /// The current ordering of a phase.
    #[must_use]
    pub fn phase_order(&self, phase: Phase) -> &[SystemId] {
        self.systems.order(phase)
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    // -- Frames --

    /// Returns the number of frames ticked so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.scheduler.frame
    }

    /// Take every failure recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<FailureReport> {
        std::mem::take(&mut self.scheduler.failures)
    }

    /// Fail with [`EcsError::StaleEntity`] unless `entity` is alive.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn ensure_alive(&self, entity: Entity) -> Result<()> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity(entity))
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::DuplicatePolicy;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position(f32, f32);

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity(f32, f32);

    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Sprite;

    impl Component for Sprite {
        fn type_name() -> &'static str {
            "Sprite"
        }
    }

    fn pos_vel() -> Signature {
        Signature::new().with::<Position>().with::<Velocity>()
    }

    /// Recompute every query from scratch and compare with the index.
    fn assert_queries_consistent(world: &World, handles: &[QueryHandle]) {
        for &handle in handles {
            let query = world.get_query(handle).unwrap();
            for (entity, types) in world.entities.iter() {
                assert_eq!(
                    query.contains(entity),
                    query.signature().is_satisfied_by(types),
                    "{entity} membership in {handle} is wrong"
                );
            }
            assert!(query.entities().iter().all(|&e| world.is_alive(e)));
        }
    }

    #[test]
    fn test_scenario_add_remove_readd() {
        let mut world = World::new();
        let e1 = world.create_entity().unwrap();
        world.add_component(e1, Position(0.0, 0.0)).unwrap();
        world.add_component(e1, Velocity(1.0, 0.0)).unwrap();

        let q = world.query(pos_vel()).unwrap();
        assert_eq!(world.matches(q).unwrap(), &[e1]);

        world.remove_component::<Velocity>(e1).unwrap();
        assert!(world.matches(q).unwrap().is_empty());

        world.add_component(e1, Velocity(2.0, 0.0)).unwrap();
        assert_eq!(world.matches(q).unwrap(), &[e1]);
    }

    #[test]
    fn test_replace_is_not_duplicated_in_query() {
        let mut world = World::new();
        let q = world.query(pos_vel()).unwrap();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position(0.0, 0.0)).unwrap();
        world.add_component(e, Velocity(1.0, 0.0)).unwrap();
        let prior = world.add_component(e, Velocity(5.0, 0.0)).unwrap();
        assert_eq!(prior, Some(Velocity(1.0, 0.0)));
        assert_eq!(world.matches(q).unwrap(), &[e]);
        assert_eq!(world.get_component::<Velocity>(e).unwrap(), &Velocity(5.0, 0.0));
    }

    #[test]
    fn test_reject_policy() {
        let mut world =
            World::with_config(WorldConfig::default().with_duplicate_policy(DuplicatePolicy::Reject));
        let e = world.create_entity().unwrap();
        world.add_component(e, Position(1.0, 1.0)).unwrap();
        assert!(matches!(
            world.add_component(e, Position(2.0, 2.0)),
            Err(EcsError::ComponentConflict { .. })
        ));
        assert_eq!(world.get_component::<Position>(e).unwrap(), &Position(1.0, 1.0));
    }

    #[test]
    fn test_stale_handle_rejection() {
        let mut world = World::new();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position(0.0, 0.0)).unwrap();
        world.destroy_entity(e).unwrap();

        assert!(matches!(world.get_component::<Position>(e), Err(EcsError::StaleEntity(_))));
        assert!(matches!(world.add_component(e, Position(1.0, 1.0)), Err(EcsError::StaleEntity(_))));
        assert!(matches!(world.remove_component::<Position>(e), Err(EcsError::StaleEntity(_))));
        assert!(matches!(world.has_component::<Position>(e), Err(EcsError::StaleEntity(_))));
        assert!(matches!(world.destroy_entity(e), Err(EcsError::StaleEntity(_))));

        let reused = world.create_entity().unwrap();
        assert_eq!(reused.index(), e.index());
        assert_ne!(reused, e);
        assert!(world.get_component::<Position>(reused).is_err());
        assert!(matches!(world.get_component::<Position>(e), Err(EcsError::StaleEntity(_))));
    }

    #[test]
    fn test_component_not_found() {
        let mut world = World::new();
        let e = world.create_entity().unwrap();
        assert!(matches!(
            world.get_component::<Position>(e),
            Err(EcsError::ComponentNotFound { component: "Position", .. })
        ));
        assert!(matches!(
            world.remove_component::<Position>(e),
            Err(EcsError::ComponentNotFound { .. })
        ));
        assert!(!world.has_component::<Position>(e).unwrap());
    }

    #[test]
    fn test_destroy_removes_from_queries() {
        let mut world = World::new();
        let q = world.query(pos_vel()).unwrap();
        let everything = world.query(Signature::new()).unwrap();
        let e = world.create_entity().unwrap();
        world.add_component(e, Position(0.0, 0.0)).unwrap();
        world.add_component(e, Velocity(0.0, 0.0)).unwrap();
        assert_eq!(world.matches(everything).unwrap(), &[e]);

        world.destroy_entity(e).unwrap();
        assert!(world.matches(q).unwrap().is_empty());
        assert!(world.matches(everything).unwrap().is_empty());
        assert_eq!(world.component_count(), 0);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_shared_query_registration() {
        let mut world = World::new();
        let a = world.query(pos_vel()).unwrap();
        let b = world.query(Signature::new().with::<Velocity>().with::<Position>()).unwrap();
        assert_eq!(a, b);
        assert_eq!(world.query_count(), 1);
        world.release_query(a).unwrap();
        assert_eq!(world.query_count(), 1);
        world.release_query(b).unwrap();
        assert_eq!(world.query_count(), 0);
    }

    #[test]
    fn test_incrementality_independent_of_entity_count() {
        let mut world = World::new();
        let q = world.query(pos_vel()).unwrap();
        let _sprites = world.query(Signature::new().with::<Sprite>()).unwrap();
        for _ in 0..500 {
            let e = world.create_entity().unwrap();
            world.add_component(e, Position(0.0, 0.0)).unwrap();
        }

        let e = world.create_entity().unwrap();
        world.add_component(e, Position(0.0, 0.0)).unwrap();
        world.reset_query_stats();
        world.add_component(e, Velocity(1.0, 1.0)).unwrap();

        // Exactly one affected query, checked once for one entity.
        let stats = world.query_stats();
        assert_eq!(stats.signature_checks, 1);
        assert_eq!(stats.membership_updates, 1);
        assert_eq!(world.matches(q).unwrap(), &[e]);
    }

    #[test]
    fn test_query_invariant_under_churn() {
        let mut world = World::new();
        let handles = [
            world.query(pos_vel()).unwrap(),
            world.query(Signature::new().with::<Position>()).unwrap(),
            world.query(Signature::new().with::<Sprite>().with::<Position>()).unwrap(),
            world.query(Signature::new()).unwrap(),
        ];

        let mut live = Vec::new();
        for i in 0..60u32 {
            let e = world.create_entity().unwrap();
            live.push(e);
            if i % 2 == 0 {
                world.add_component(e, Position(0.0, 0.0)).unwrap();
            }
            if i % 3 == 0 {
                world.add_component(e, Velocity(0.0, 0.0)).unwrap();
            }
            if i % 5 == 0 {
                world.add_component(e, Sprite).unwrap();
            }
            if i % 7 == 0 && i > 0 {
                let victim = live.remove(0);
                world.destroy_entity(victim).unwrap();
            }
            if i % 4 == 0 && live.len() > 2 {
                let _ = world.remove_component::<Position>(live[1]);
            }
        }
        assert_queries_consistent(&world, &handles);

        // A query declared late is seeded correctly.
        let late = world.query(Signature::new().with::<Velocity>()).unwrap();
        assert_queries_consistent(&world, &[late]);
    }
}
