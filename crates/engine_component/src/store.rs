//! Per-type component storage.
//!
//! The [`ComponentStore`] keeps one [`Column`] per component type. A column
//! maps each entity to at most one instance of that type, which is the
//! store's reverse index (entity → type → component). Components never hold
//! a reference back to their entity.
//!
//! The store does not check entity liveness; the owning world does that
//! before touching it.

use std::any::TypeId;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::component::{BoxedComponent, Component, ComponentTypeId};
use crate::entity::Entity;
use crate::error::{EcsError, Result};

/// What `add` does when the entity already carries a component of that type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replace the prior instance and hand it back to the caller.
    #[default]
    Replace,
    /// Leave the prior instance in place and fail with
    /// [`EcsError::ComponentConflict`].
    Reject,
}

/// All instances of a single component type.
#[derive(Debug)]
pub struct Column {
    /// The component type stored in this column.
    pub type_id: ComponentTypeId,
    /// The component's name, for diagnostics.
    pub name: &'static str,
    rust_type: TypeId,
    rust_name: &'static str,
    values: HashMap<Entity, BoxedComponent>,
}

impl Column {
    /// Create an empty column for `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: T::component_type_id(),
            name: T::type_name(),
            rust_type: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            values: HashMap::new(),
        }
    }

    /// Fail if this column was created for a different Rust type that
    /// shares `T`'s component name.
    fn check<T: Component>(&self) -> Result<()> {
        if self.rust_type == TypeId::of::<T>() {
            return Ok(());
        }
        let incoming = std::any::type_name::<T>();
        warn!(
            component = self.name,
            existing = self.rust_name,
            incoming,
            "component name collision"
        );
        Err(EcsError::NameCollision {
            component: self.name,
            existing: self.rust_name,
            incoming,
        })
    }

    /// Returns the number of instances stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the column holds no instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outcome of [`ComponentStore::insert`].
#[derive(Debug)]
pub enum Inserted<T> {
    /// The entity did not carry this type before.
    New,
    /// The prior instance was replaced.
    Replaced(T),
}

/// Storage for every component instance in a world.
#[derive(Debug, Default)]
pub struct ComponentStore {
    columns: HashMap<ComponentTypeId, Column>,
    policy: DuplicatePolicy,
}

impl ComponentStore {
    /// Create an empty store with the given duplicate policy.
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            columns: HashMap::new(),
            policy,
        }
    }

    /// Returns the configured duplicate policy.
    #[must_use]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Attach `value` to `entity`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentConflict`] if the entity already carries a `T`
    ///   and the policy is [`DuplicatePolicy::Reject`].
    /// - [`EcsError::NameCollision`] if another type already uses `T`'s
    ///   component name. Nothing is stored.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<Inserted<T>> {
        let column = self
            .columns
            .entry(T::component_type_id())
            .or_insert_with(Column::of::<T>);
        column.check::<T>()?;

        if column.values.contains_key(&entity) && self.policy == DuplicatePolicy::Reject {
            return Err(EcsError::ComponentConflict {
                entity,
                component: T::type_name(),
            });
        }

        match column.values.insert(entity, Box::new(value)) {
            None => Ok(Inserted::New),
            Some(prior) => prior
                .downcast::<T>()
                .map(|prior| Inserted::Replaced(*prior))
                .map_err(|_| EcsError::ComponentNotFound {
                    entity,
                    component: T::type_name(),
                }),
        }
    }

    /// Detach and return the `T` instance of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if the entity carries no `T`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<T> {
        let not_found = EcsError::ComponentNotFound {
            entity,
            component: T::type_name(),
        };
        let column = self
            .columns
            .get_mut(&T::component_type_id())
            .ok_or_else(|| not_found.clone())?;
        column.check::<T>()?;
        let boxed = column.values.remove(&entity).ok_or_else(|| not_found.clone())?;
        boxed.downcast::<T>().map(|value| *value).map_err(|_| not_found)
    }

    /// Detach the instance of `type_id` from `entity`, whatever its type.
    pub fn remove_erased(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<BoxedComponent> {
        self.columns
            .get_mut(&type_id)
            .and_then(|column| column.values.remove(&entity))
    }

    /// Borrow the `T` instance of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if the entity carries no `T`.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        let not_found = EcsError::ComponentNotFound {
            entity,
            component: T::type_name(),
        };
        let column = self
            .columns
            .get(&T::component_type_id())
            .ok_or_else(|| not_found.clone())?;
        column.check::<T>()?;
        column
            .values
            .get(&entity)
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .ok_or(not_found)
    }

    /// Mutably borrow the `T` instance of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if the entity carries no `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        let not_found = EcsError::ComponentNotFound {
            entity,
            component: T::type_name(),
        };
        let column = self
            .columns
            .get_mut(&T::component_type_id())
            .ok_or_else(|| not_found.clone())?;
        column.check::<T>()?;
        column
            .values
            .get_mut(&entity)
            .and_then(|boxed| boxed.downcast_mut::<T>())
            .ok_or(not_found)
    }

    /// Returns `true` if `entity` carries an instance of `type_id`.
    #[must_use]
    pub fn contains(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.columns
            .get(&type_id)
            .is_some_and(|column| column.values.contains_key(&entity))
    }

    /// Returns the column for `type_id`, if any instance was ever stored.
    #[must_use]
    pub fn column(&self, type_id: ComponentTypeId) -> Option<&Column> {
        self.columns.get(&type_id)
    }

    /// Returns the total number of component instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.values().map(Column::len).sum()
    }

    /// Returns `true` if no component instance is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.values().all(Column::is_empty)
    }
}

#[cfg(test)]
mod tests {
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

    #[test]
    fn test_insert_and_get() {
        let mut store = ComponentStore::default();
        let e = Entity::new(0, 0);
        assert!(matches!(store.insert(e, Position(1.0, 2.0)), Ok(Inserted::New)));
        assert_eq!(store.get::<Position>(e).unwrap(), &Position(1.0, 2.0));
        assert!(store.contains(e, Position::component_type_id()));
        assert!(!store.contains(e, Velocity::component_type_id()));
    }

    #[test]
    fn test_replace_policy_returns_prior() {
        let mut store = ComponentStore::new(DuplicatePolicy::Replace);
        let e = Entity::new(0, 0);
        store.insert(e, Position(1.0, 2.0)).unwrap();
        match store.insert(e, Position(3.0, 4.0)).unwrap() {
            Inserted::Replaced(prior) => assert_eq!(prior, Position(1.0, 2.0)),
            Inserted::New => panic!("expected replacement"),
        }
        assert_eq!(store.get::<Position>(e).unwrap(), &Position(3.0, 4.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reject_policy_keeps_prior() {
        let mut store = ComponentStore::new(DuplicatePolicy::Reject);
        let e = Entity::new(0, 0);
        store.insert(e, Position(1.0, 2.0)).unwrap();
        let err = store.insert(e, Position(3.0, 4.0)).unwrap_err();
        assert_eq!(
            err,
            EcsError::ComponentConflict {
                entity: e,
                component: "Position"
            }
        );
        assert_eq!(store.get::<Position>(e).unwrap(), &Position(1.0, 2.0));
    }

    #[test]
    fn test_remove_returns_instance() {
        let mut store = ComponentStore::default();
        let e = Entity::new(0, 0);
        store.insert(e, Velocity(0.5, 0.0)).unwrap();
        assert_eq!(store.remove::<Velocity>(e).unwrap(), Velocity(0.5, 0.0));
        assert!(matches!(
            store.remove::<Velocity>(e),
            Err(EcsError::ComponentNotFound { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_mut_writes_through() {
        let mut store = ComponentStore::default();
        let e = Entity::new(0, 0);
        store.insert(e, Position(0.0, 0.0)).unwrap();
        store.get_mut::<Position>(e).unwrap().0 = 9.0;
        assert_eq!(store.get::<Position>(e).unwrap().0, 9.0);
    }

    mod other {
        use super::super::*;

        /// Shares its component name with the outer `Position`.
        #[derive(Debug, Clone, PartialEq)]
        pub struct Position(pub u8);

        impl Component for Position {
            fn type_name() -> &'static str {
                "Position"
            }
        }
    }

    #[test]
    fn test_name_collision_leaves_store_untouched() {
        let mut store = ComponentStore::default();
        let e = Entity::new(0, 0);
        store.insert(e, Position(1.0, 2.0)).unwrap();

        assert!(matches!(
            store.insert(e, other::Position(7)),
            Err(EcsError::NameCollision { component: "Position", .. })
        ));
        assert!(matches!(
            store.remove::<other::Position>(e),
            Err(EcsError::NameCollision { .. })
        ));
        assert!(matches!(
            store.get::<other::Position>(e),
            Err(EcsError::NameCollision { .. })
        ));
        // The original value survives both attempts.
        assert_eq!(store.get::<Position>(e).unwrap(), &Position(1.0, 2.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_entities_do_not_alias() {
        let mut store = ComponentStore::default();
        let a = Entity::new(0, 0);
        let recycled = Entity::new(0, 1);
        store.insert(a, Position(1.0, 1.0)).unwrap();
        assert!(store.get::<Position>(recycled).is_err());
    }
}
