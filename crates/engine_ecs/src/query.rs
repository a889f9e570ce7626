//! Incrementally maintained queries.
//!
//! The [`QueryIndex`] owns one [`Query`] per distinct [`Signature`]. Each
//! query keeps the live list of entities whose component-type set is a
//! superset of its signature.
//!
//! Membership is never recomputed by rescanning. A reverse index maps each
//! component type to the queries that require it, so a structural change on
//! one entity only touches the queries keyed by the changed type:
//!
//! ```text
//! add T to E     → for q in by_type[T]: if E ∉ q and E.types ⊇ q.sig → push E
//! remove T from E → for q in by_type[T]: if E ∈ q → remove E
//! ```
//!
//! A full scan happens exactly once per signature, when it is first
//! requested, to seed the membership from the entities that already exist.
//!
//! Membership lists are copy-on-write (`Rc<Vec<Entity>>`). Taking a snapshot
//! is O(1), and the first mutation after a snapshot clones the list, so a
//! system iterating a snapshot never observes entries being added or removed
//! underneath it.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use engine_component::{ComponentTypeId, EcsError, Entity, Result, Signature};

/// Upper bound on the number of handles one index issues. Handles are never
/// reused, so this bounds the queries ever created, not the live ones.
pub const MAX_QUERIES: usize = u32::MAX as usize;

/// A handle to a shared query in a [`QueryIndex`].
///
/// Handles are never reused within one index, so a released handle cannot
/// alias a later query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryHandle(u32);

impl QueryHandle {
    /// Returns the raw index of this handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query({})", self.0)
    }
}

/// Counters exposing how much work the index performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Number of times an entity's type set was checked against a signature.
    pub signature_checks: u64,
    /// Number of membership insertions and removals.
    pub membership_updates: u64,
}

/// A live, deduplicated list of the entities matching one signature.
#[derive(Debug)]
pub struct Query {
    signature: Signature,
    members: Rc<Vec<Entity>>,
    /// Position of each member in `members`.
    positions: HashMap<Entity, usize>,
    refs: u32,
}

impl Query {
    fn new(signature: Signature) -> Self {
        Self {
            signature,
            members: Rc::new(Vec::new()),
            positions: HashMap::new(),
            refs: 1,
        }
    }

    /// The signature this query matches.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The current members, in deterministic iteration order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.members
    }

    /// An O(1) snapshot of the current members.
    #[must_use]
    pub fn snapshot(&self) -> Rc<Vec<Entity>> {
        Rc::clone(&self.members)
    }

    /// Returns `true` if `entity` is a member.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.positions.contains_key(&entity)
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if nothing matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns how many holders share this query.
    #[must_use]
    pub fn ref_count(&self) -> u32 {
        self.refs
    }

    fn insert(&mut self, entity: Entity) -> bool {
        if self.positions.contains_key(&entity) {
            return false;
        }
        let members = Rc::make_mut(&mut self.members);
        self.positions.insert(entity, members.len());
        members.push(entity);
        true
    }

    fn remove(&mut self, entity: Entity) -> bool {
        let Some(pos) = self.positions.remove(&entity) else {
            return false;
        };
        let members = Rc::make_mut(&mut self.members);
        members.swap_remove(pos);
        if let Some(&moved) = members.get(pos) {
            self.positions.insert(moved, pos);
        }
        true
    }
}

/// Owns every live query and keeps their membership in step with structural
/// changes.
#[derive(Debug)]
pub struct QueryIndex {
    queries: Vec<Option<Query>>,
    max_queries: usize,
    by_signature: HashMap<Signature, QueryHandle>,
    /// Component type → queries whose signature requires it.
    by_type: HashMap<ComponentTypeId, Vec<QueryHandle>>,
    /// Queries with an empty signature; they match every live entity.
    universal: Vec<QueryHandle>,
    stats: QueryStats,
}

impl QueryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queries: Vec::new(),
            max_queries: MAX_QUERIES,
            by_signature: HashMap::new(),
            by_type: HashMap::new(),
            universal: Vec::new(),
            stats: QueryStats::default(),
        }
    }

    /// Return the shared query for `signature`, creating it on first request.
    ///
    /// Creation seeds the membership with one scan over `entities`. Every
    /// call, including ones that hit an existing query, adds a reference that
    /// must be balanced by [`QueryIndex::release`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CapacityExceeded`] once [`MAX_QUERIES`] handles
    /// have been issued, or if a query's reference count would overflow.
    pub fn get_or_create<'a>(
        &mut self,
        signature: Signature,
        entities: impl IntoIterator<Item = (Entity, &'a BTreeSet<ComponentTypeId>)>,
    ) -> Result<QueryHandle> {
        if let Some(&handle) = self.by_signature.get(&signature) {
            if let Some(query) = self.slot_mut(handle) {
                query.refs = query
                    .refs
                    .checked_add(1)
                    .ok_or(EcsError::CapacityExceeded("query references"))?;
            }
            return Ok(handle);
        }

        let exhausted = EcsError::CapacityExceeded("query handles");
        if self.queries.len() >= self.max_queries {
            return Err(exhausted);
        }
        let handle = QueryHandle(u32::try_from(self.queries.len()).map_err(|_| exhausted)?);
        let mut query = Query::new(signature.clone());
        for (entity, types) in entities {
            self.stats.signature_checks += 1;
            if signature.is_satisfied_by(types) && query.insert(entity) {
                self.stats.membership_updates += 1;
            }
        }

        if signature.is_empty() {
            self.universal.push(handle);
        }
        for &type_id in signature.types() {
            self.by_type.entry(type_id).or_default().push(handle);
        }
        self.by_signature.insert(signature, handle);
        self.queries.push(Some(query));
        Ok(handle)
    }

    /// Drop one reference to `handle`. The query is discarded once nobody
    /// holds it.
    ///
    /// Returns `true` if the query was discarded.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownQuery`] if the handle is not live.
    pub fn release(&mut self, handle: QueryHandle) -> Result<bool> {
        let query = self
            .slot_mut(handle)
            .ok_or(EcsError::UnknownQuery(handle.0))?;
        query.refs -= 1;
        if query.refs > 0 {
            return Ok(false);
        }

        let Some(query) = self.queries[handle.0 as usize].take() else {
            return Ok(false);
        };
        self.by_signature.remove(query.signature());
        self.universal.retain(|&h| h != handle);
        for type_id in query.signature().types() {
            if let Some(list) = self.by_type.get_mut(type_id) {
                list.retain(|&h| h != handle);
                if list.is_empty() {
                    self.by_type.remove(type_id);
                }
            }
        }
        Ok(true)
    }

    /// Look up a live query.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownQuery`] if the handle is not live.
    pub fn get(&self, handle: QueryHandle) -> Result<&Query> {
        self.queries
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(EcsError::UnknownQuery(handle.0))
    }

    /// Notify the index that `entity` gained `type_id`; `types` is the
    /// entity's full type set after the change.
    pub fn on_component_added(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        types: &BTreeSet<ComponentTypeId>,
    ) {
        let Self {
            queries,
            by_type,
            stats,
            ..
        } = self;
        let Some(interested) = by_type.get(&type_id) else {
            return;
        };
        for handle in interested {
            let Some(query) = queries.get_mut(handle.0 as usize).and_then(Option::as_mut) else {
                continue;
            };
            if query.contains(entity) {
                continue;
            }
            stats.signature_checks += 1;
            if query.signature.is_satisfied_by(types) && query.insert(entity) {
                stats.membership_updates += 1;
            }
        }
    }

    /// Notify the index that `entity` lost `type_id`.
    pub fn on_component_removed(&mut self, entity: Entity, type_id: ComponentTypeId) {
        let Self {
            queries,
            by_type,
            stats,
            ..
        } = self;
        let Some(interested) = by_type.get(&type_id) else {
            return;
        };
        for handle in interested {
            if let Some(query) = queries.get_mut(handle.0 as usize).and_then(Option::as_mut)
                && query.remove(entity)
            {
                stats.membership_updates += 1;
            }
        }
    }

    /// Notify the index that a new, component-less entity exists.
    pub fn on_entity_created(&mut self, entity: Entity) {
        for i in 0..self.universal.len() {
            let handle = self.universal[i];
            if let Some(query) = self.slot_mut(handle)
                && query.insert(entity)
            {
                self.stats.membership_updates += 1;
            }
        }
    }

    /// Notify the index that `entity` is gone. Its components must already
    /// have been reported as removed.
    pub fn on_entity_destroyed(&mut self, entity: Entity) {
        for i in 0..self.universal.len() {
            let handle = self.universal[i];
            if let Some(query) = self.slot_mut(handle)
                && query.remove(entity)
            {
                self.stats.membership_updates += 1;
            }
        }
    }

    /// Returns the number of live queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    /// Returns `true` if no query is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }

    /// Returns the work counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> QueryStats {
        self.stats
    }

    /// Reset the work counters.
    pub fn reset_stats(&mut self) {
        self.stats = QueryStats::default();
    }

    fn slot_mut(&mut self, handle: QueryHandle) -> Option<&mut Query> {
        self.queries.get_mut(handle.0 as usize).and_then(Option::as_mut)
    }
}

impl Default for QueryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITION: ComponentTypeId = ComponentTypeId(1);
    const VELOCITY: ComponentTypeId = ComponentTypeId(2);
    const SPRITE: ComponentTypeId = ComponentTypeId(3);

    fn types(ids: &[ComponentTypeId]) -> BTreeSet<ComponentTypeId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_same_signature_is_shared() {
        let mut index = QueryIndex::new();
        let a = index
            .get_or_create(Signature::from_ids([POSITION, VELOCITY]), [])
            .unwrap();
        let b = index
            .get_or_create(Signature::from_ids([VELOCITY, POSITION]), [])
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(a).unwrap().ref_count(), 2);
    }

    #[test]
    fn test_seed_scan_on_creation() {
        let mut index = QueryIndex::new();
        let e1 = Entity::new(0, 0);
        let e2 = Entity::new(1, 0);
        let t1 = types(&[POSITION, VELOCITY]);
        let t2 = types(&[POSITION]);
        let handle = index
            .get_or_create(
                Signature::from_ids([POSITION, VELOCITY]),
                [(e1, &t1), (e2, &t2)],
            )
            .unwrap();
        assert_eq!(index.get(handle).unwrap().entities(), &[e1]);
        assert_eq!(index.stats().signature_checks, 2);
    }

    #[test]
    fn test_add_and_remove_update_membership() {
        let mut index = QueryIndex::new();
        let handle = index
            .get_or_create(Signature::from_ids([POSITION, VELOCITY]), [])
            .unwrap();
        let e = Entity::new(0, 0);

        index.on_component_added(e, POSITION, &types(&[POSITION]));
        assert!(index.get(handle).unwrap().is_empty());

        index.on_component_added(e, VELOCITY, &types(&[POSITION, VELOCITY]));
        assert_eq!(index.get(handle).unwrap().entities(), &[e]);

        index.on_component_removed(e, VELOCITY);
        assert!(index.get(handle).unwrap().is_empty());

        index.on_component_added(e, VELOCITY, &types(&[POSITION, VELOCITY]));
        assert_eq!(index.get(handle).unwrap().entities(), &[e]);
    }

    #[test]
    fn test_unrelated_type_touches_no_query() {
        let mut index = QueryIndex::new();
        index
            .get_or_create(Signature::from_ids([POSITION, VELOCITY]), [])
            .unwrap();
        index.reset_stats();
        index.on_component_added(Entity::new(0, 0), SPRITE, &types(&[SPRITE]));
        assert_eq!(index.stats(), QueryStats::default());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_changes() {
        let mut index = QueryIndex::new();
        let handle = index.get_or_create(Signature::from_ids([POSITION]), []).unwrap();
        let a = Entity::new(0, 0);
        let b = Entity::new(1, 0);
        index.on_component_added(a, POSITION, &types(&[POSITION]));

        let snapshot = index.get(handle).unwrap().snapshot();
        index.on_component_added(b, POSITION, &types(&[POSITION]));
        index.on_component_removed(a, POSITION);

        assert_eq!(snapshot.as_slice(), &[a]);
        assert_eq!(index.get(handle).unwrap().entities(), &[b]);
    }

    #[test]
    fn test_swap_remove_keeps_positions_consistent() {
        let mut index = QueryIndex::new();
        let handle = index.get_or_create(Signature::from_ids([POSITION]), []).unwrap();
        let es: Vec<Entity> = (0..4).map(|i| Entity::new(i, 0)).collect();
        for &e in &es {
            index.on_component_added(e, POSITION, &types(&[POSITION]));
        }
        index.on_component_removed(es[0], POSITION);
        index.on_component_removed(es[3], POSITION);
        let query = index.get(handle).unwrap();
        assert_eq!(query.len(), 2);
        assert!(query.contains(es[1]) && query.contains(es[2]));
        index.on_component_removed(es[1], POSITION);
        index.on_component_removed(es[2], POSITION);
        assert!(index.get(handle).unwrap().is_empty());
    }

    #[test]
    fn test_release_drops_at_zero_refs() {
        let mut index = QueryIndex::new();
        let sig = Signature::from_ids([POSITION]);
        let a = index.get_or_create(sig.clone(), []).unwrap();
        let _b = index.get_or_create(sig.clone(), []).unwrap();
        assert!(!index.release(a).unwrap());
        assert!(index.release(a).unwrap());
        assert!(index.get(a).is_err());
        assert!(matches!(index.release(a), Err(EcsError::UnknownQuery(_))));

        // A new query for the same signature gets a fresh handle.
        let c = index.get_or_create(sig, []).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_handle_limit_is_an_error() {
        let mut index = QueryIndex::new();
        index.max_queries = 1;
        let a = index.get_or_create(Signature::from_ids([POSITION]), []).unwrap();
        assert_eq!(
            index.get_or_create(Signature::from_ids([VELOCITY]), []),
            Err(EcsError::CapacityExceeded("query handles"))
        );
        // Sharing an existing query needs no new handle.
        assert_eq!(index.get_or_create(Signature::from_ids([POSITION]), []), Ok(a));
        // Released handles are not reissued.
        index.release(a).unwrap();
        index.release(a).unwrap();
        assert!(index.get_or_create(Signature::from_ids([POSITION]), []).is_err());
    }

    #[test]
    fn test_universal_query_tracks_entity_lifecycle() {
        let mut index = QueryIndex::new();
        let handle = index.get_or_create(Signature::new(), []).unwrap();
        let e = Entity::new(0, 0);
        index.on_entity_created(e);
        assert_eq!(index.get(handle).unwrap().entities(), &[e]);
        index.on_entity_destroyed(e);
        assert!(index.get(handle).unwrap().is_empty());
    }
}
