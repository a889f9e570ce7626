//! Entity handles and the registry that allocates them.
//!
//! An [`Entity`] is a generation-tagged slot index with no inherent data.
//! Slots are recycled after destruction, but the slot's generation is bumped
//! so an old handle that points at a recycled slot is detected as stale.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;
use crate::error::{EcsError, Result};

/// A generation-tagged entity identifier.
///
/// Entities are pure keys: components are attached to them through the
/// [`ComponentStore`](crate::ComponentStore), never owned by them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Create an entity handle from its parts.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of the slot at the time this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Pack the handle into a single `u64` (generation in the high bits).
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpack a handle previously produced by [`Entity::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    alive: bool,
    types: BTreeSet<ComponentTypeId>,
}

/// Upper bound on the number of slots one registry allocates.
pub const MAX_SLOTS: usize = u32::MAX as usize;

/// Allocates and recycles entity identifiers and tracks each live entity's
/// component-type set.
///
/// A slot whose generation reaches `u32::MAX` is retired instead of being
/// recycled, so no `(index, generation)` pair is ever issued twice.
#[derive(Debug)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    /// Freed slot indices, reused LIFO.
    free: Vec<u32>,
    live: usize,
    max_slots: usize,
}

impl EntityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            max_slots: MAX_SLOTS,
        }
    }

    /// Allocate a fresh entity.
    ///
    /// The returned `(index, generation)` pair has never been handed out
    /// before.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] once [`MAX_SLOTS`] slots are in
    /// use or retired and none is free.
    pub fn create(&mut self) -> Result<Entity> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            self.live += 1;
            return Ok(Entity::new(index, slot.generation));
        }

        let exhausted = EcsError::CapacityExceeded("entity slots");
        if self.slots.len() >= self.max_slots {
            return Err(exhausted);
        }
        let index = u32::try_from(self.slots.len()).map_err(|_| exhausted)?;
        self.slots.push(Slot {
            generation: 0,
            alive: true,
            types: BTreeSet::new(),
        });
        self.live += 1;
        Ok(Entity::new(index, 0))
    }

    /// Invalidate `entity` and return the slot to the free list.
    ///
    /// The caller is responsible for detaching the entity's components first;
    /// any type set still recorded is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn destroy(&mut self, entity: Entity) -> Result<()> {
        let slot = self.slot_mut(entity)?;
        slot.alive = false;
        slot.types.clear();
        let retired = slot.generation == u32::MAX;
        if !retired {
            slot.generation += 1;
            self.free.push(entity.index);
        }
        self.live -= 1;
        Ok(())
    }

    /// Returns `true` if `entity` refers to a live slot of the same generation.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Returns the component-type set of a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn types(&self, entity: Entity) -> Result<&BTreeSet<ComponentTypeId>> {
        match self.slots.get(entity.index as usize) {
            Some(slot) if slot.alive && slot.generation == entity.generation => Ok(&slot.types),
            _ => Err(EcsError::StaleEntity(entity)),
        }
    }

    /// Record that `entity` now carries `type_id`.
    ///
    /// Returns `true` if the type was newly added to the set.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn insert_type(&mut self, entity: Entity, type_id: ComponentTypeId) -> Result<bool> {
        Ok(self.slot_mut(entity)?.types.insert(type_id))
    }

    /// Record that `entity` no longer carries `type_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not alive.
    pub fn remove_type(&mut self, entity: Entity, type_id: ComponentTypeId) -> Result<bool> {
        Ok(self.slot_mut(entity)?.types.remove(&type_id))
    }

    /// Iterate over all live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &BTreeSet<ComponentTypeId>)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| (Entity::new(index as u32, slot.generation), &slot.types))
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn slot_mut(&mut self, entity: Entity) -> Result<&mut Slot> {
        match self.slots.get_mut(entity.index as usize) {
            Some(slot) if slot.alive && slot.generation == entity.generation => Ok(slot),
            _ => Err(EcsError::StaleEntity(entity)),
        }
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
