//! Entity and component error types.

use crate::entity::Entity;

/// Errors returned synchronously by entity, component and query operations.
///
/// These never abort a frame: the calling system decides what to do with
/// them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity was destroyed, or was never created by this world.
    #[error("stale entity handle {0}")]
    StaleEntity(Entity),

    /// `get`/`remove` on an entity that carries no component of this type.
    #[error("component '{component}' not found on entity {entity}")]
    ComponentNotFound {
        /// The entity that was queried.
        entity: Entity,
        /// The component type name.
        component: &'static str,
    },

    /// `add` of a type the entity already carries, under the reject policy.
    #[error("entity {entity} already has a '{component}' component")]
    ComponentConflict {
        /// The entity that was written.
        entity: Entity,
        /// The component type name.
        component: &'static str,
    },

    /// Two distinct Rust types declare the same component name, so they
    /// would share a [`ComponentTypeId`](crate::ComponentTypeId).
    #[error("component name '{component}' is used by both {existing} and {incoming}")]
    NameCollision {
        /// The shared component name.
        component: &'static str,
        /// The type that registered the name first.
        existing: &'static str,
        /// The type that was rejected.
        incoming: &'static str,
    },

    /// Every entity slot or query handle has been handed out.
    #[error("{0} exhausted")]
    CapacityExceeded(&'static str),

    /// The query handle does not refer to a live query.
    #[error("unknown query {0}")]
    UnknownQuery(u32),

    /// The system id does not refer to a registered system.
    #[error("unknown system {0}")]
    UnknownSystem(u32),
}

/// Result alias for entity and component operations.
pub type Result<T> = std::result::Result<T, EcsError>;
