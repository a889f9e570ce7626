//! Query signatures.
//!
//! A [`Signature`] is the set of component types a query or system requires.
//! It is order-independent and deduplicated, so two signatures built from the
//! same types in a different order compare equal and hash the same.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

/// An order-independent, deduplicated set of required component types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Sorted and deduplicated.
    types: Vec<ComponentTypeId>,
}

impl Signature {
    /// Create an empty signature. An empty signature matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// Add a required component type.
    #[must_use]
    pub fn with<T: Component>(self) -> Self {
        self.with_id(T::component_type_id())
    }

    /// Add a required component type by identifier.
    #[must_use]
    pub fn with_id(mut self, type_id: ComponentTypeId) -> Self {
        if let Err(pos) = self.types.binary_search(&type_id) {
            self.types.insert(pos, type_id);
        }
        self
    }

    /// Build a signature from any collection of type identifiers.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        let set: BTreeSet<ComponentTypeId> = ids.into_iter().collect();
        Self {
            types: set.into_iter().collect(),
        }
    }

    /// Returns the required types in ascending identifier order.
    #[must_use]
    pub fn types(&self) -> &[ComponentTypeId] {
        &self.types
    }

    /// Returns `true` if `type_id` is part of this signature.
    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.types.binary_search(&type_id).is_ok()
    }

    /// Returns `true` if an entity carrying `types` satisfies this signature,
    /// i.e. `types` is a superset of the signature.
    #[must_use]
    pub fn is_satisfied_by(&self, types: &BTreeSet<ComponentTypeId>) -> bool {
        self.types.iter().all(|ty| types.contains(ty))
    }

    /// Returns the number of required types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
