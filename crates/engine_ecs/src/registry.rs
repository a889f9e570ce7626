//! System registry: registered systems and their phase ordering.
//!
//! Each phase keeps its systems in a list sorted by `(priority ascending,
//! registration order)`. Registration inserts at the sorted position; only a
//! priority change re-sorts a phase. The scheduler copies a phase's list at
//! the start of every frame, so registry changes made mid-frame take effect
//! on the next one.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use engine_component::{EcsError, Result};

use crate::query::QueryHandle;
use crate::system::{Phase, System, SystemId};

/// Lifecycle state of a registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Registered; `initialize` has not succeeded yet.
    Constructed,
    /// Initialized; runs every frame.
    Active,
    /// `initialize` failed too many times; never runs.
    Failed,
}

struct Entry {
    name: String,
    phase: Phase,
    priority: f64,
    state: SystemState,
    init_attempts: u32,
    /// Handles whose snapshots are taken at the start of every hook call.
    declared: Vec<QueryHandle>,
    /// Query references acquired from inside this system's hooks, one entry
    /// per reference.
    held: Vec<QueryHandle>,
    /// `None` while the scheduler is running one of its hooks.
    system: Option<Box<dyn System>>,
}

/// What remains of a system after it is removed from the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedSystem {
    /// The system's name.
    pub name: String,
    /// Query references the system still held, to be released.
    pub queries: Vec<QueryHandle>,
}

/// Holds every registered system with its phase and priority.
#[derive(Default)]
pub struct SystemRegistry {
    entries: BTreeMap<SystemId, Entry>,
    next_id: u32,
    update_order: Vec<SystemId>,
    draw_order: Vec<SystemId>,
    /// Systems awaiting `initialize`, in registration order.
    pending_init: BTreeSet<SystemId>,
    /// Systems unregistered while a frame was running.
    pending_removal: Vec<SystemId>,
}

impl SystemRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `system` into `phase` at its sorted position.
    ///
    /// Equal priorities keep registration order.
    pub fn register(&mut self, system: Box<dyn System>, phase: Phase, priority: f64) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;

        let entry = Entry {
            name: system.name().to_string(),
            phase,
            priority,
            state: SystemState::Constructed,
            init_attempts: 0,
            declared: Vec::new(),
            held: Vec::new(),
            system: Some(system),
        };
        self.entries.insert(id, entry);

        let entries = &self.entries;
        let order = match phase {
            Phase::Update => &mut self.update_order,
            Phase::Draw => &mut self.draw_order,
        };
        let pos = order.partition_point(|other| {
            entries
                .get(other)
                .is_some_and(|e| e.priority.total_cmp(&priority) != Ordering::Greater)
        });
        order.insert(pos, id);
        self.pending_init.insert(id);
        id
    }

    /// Remove a system immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `id` is not registered.
    pub fn remove(&mut self, id: SystemId) -> Result<RemovedSystem> {
        let entry = self
            .entries
            .remove(&id)
            .ok_or(EcsError::UnknownSystem(id.0))?;
        self.order_mut(entry.phase).retain(|&other| other != id);
        self.pending_init.remove(&id);
        self.pending_removal.retain(|&other| other != id);
        Ok(RemovedSystem {
            name: entry.name,
            queries: entry.held,
        })
    }

    /// Mark a system for removal at the end of the running frame.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `id` is not registered.
    pub fn defer_removal(&mut self, id: SystemId) -> Result<()> {
        if !self.entries.contains_key(&id) {
            return Err(EcsError::UnknownSystem(id.0));
        }
        if !self.pending_removal.contains(&id) {
            self.pending_removal.push(id);
        }
        Ok(())
    }

    /// Take the systems whose removal was deferred.
    pub fn drain_pending_removals(&mut self) -> Vec<SystemId> {
        std::mem::take(&mut self.pending_removal)
    }

    /// Change a system's priority and re-sort its phase.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `id` is not registered.
    pub fn set_priority(&mut self, id: SystemId, priority: f64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(EcsError::UnknownSystem(id.0))?;
        entry.priority = priority;
        let phase = entry.phase;

        let entries = &self.entries;
        let order = match phase {
            Phase::Update => &mut self.update_order,
            Phase::Draw => &mut self.draw_order,
        };
        // Ids grow with registration order, so they break priority ties.
        order.sort_by(|a, b| {
            let pa = entries.get(a).map_or(0.0, |e| e.priority);
            let pb = entries.get(b).map_or(0.0, |e| e.priority);
            pa.total_cmp(&pb).then(a.cmp(b))
        });
        Ok(())
    }

    /// The current ordering of `phase`, including systems not yet active.
    #[must_use]
    pub fn order(&self, phase: Phase) -> &[SystemId] {
        match phase {
            Phase::Update => &self.update_order,
            Phase::Draw => &self.draw_order,
        }
    }

    /// The active systems of `phase` in execution order, copied so the caller
    /// can keep iterating while the registry changes.
    #[must_use]
    pub fn snapshot(&self, phase: Phase) -> Vec<SystemId> {
        self.order(phase)
            .iter()
            .copied()
            .filter(|id| self.state(*id) == Some(SystemState::Active))
            .collect()
    }

    /// Systems awaiting `initialize`, in registration order.
    #[must_use]
    pub fn pending_init(&self) -> Vec<SystemId> {
        self.pending_init.iter().copied().collect()
    }

    /// Mark a system as initialized and record its declared queries.
    pub fn activate(&mut self, id: SystemId, declared: Vec<QueryHandle>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = SystemState::Active;
            entry.declared = declared;
        }
        self.pending_init.remove(&id);
    }

    /// Record a query reference acquired by `id`.
    pub fn hold_query(&mut self, id: SystemId, handle: QueryHandle) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.held.push(handle);
        }
    }

    /// Forget one reference to `handle` held by `id`. Returns `false` if the
    /// system held none.
    pub fn drop_query(&mut self, id: SystemId, handle: QueryHandle) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        match entry.held.iter().position(|&h| h == handle) {
            Some(pos) => {
                entry.held.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Take every query reference held by `id`, leaving it with none.
    pub fn take_held(&mut self, id: SystemId) -> Vec<QueryHandle> {
        self.entries
            .get_mut(&id)
            .map(|entry| std::mem::take(&mut entry.held))
            .unwrap_or_default()
    }

    /// Query references currently held by `id`.
    #[must_use]
    pub fn held(&self, id: SystemId) -> &[QueryHandle] {
        self.entries
            .get(&id)
            .map(|entry| entry.held.as_slice())
            .unwrap_or_default()
    }

    /// Count a failed `initialize` and return the number of attempts so far.
    pub fn record_init_failure(&mut self, id: SystemId) -> u32 {
        self.entries.get_mut(&id).map_or(0, |entry| {
            entry.init_attempts += 1;
            entry.init_attempts
        })
    }

    /// Permanently deactivate a system that could not initialize.
    pub fn mark_failed(&mut self, id: SystemId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = SystemState::Failed;
        }
        self.pending_init.remove(&id);
    }

    /// Borrow the system out of its entry so a hook can run with the world
    /// mutably borrowed.
    pub fn take(&mut self, id: SystemId) -> Option<Box<dyn System>> {
        self.entries.get_mut(&id).and_then(|entry| entry.system.take())
    }

    /// Return a system taken with [`SystemRegistry::take`]. If the entry is
    /// gone the system is dropped.
    pub fn restore(&mut self, id: SystemId, system: Box<dyn System>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.system = Some(system);
        }
    }

    /// Returns a system's lifecycle state.
    #[must_use]
    pub fn state(&self, id: SystemId) -> Option<SystemState> {
        self.entries.get(&id).map(|entry| entry.state)
    }

    /// Returns a system's name.
    #[must_use]
    pub fn name(&self, id: SystemId) -> Option<&str> {
        self.entries.get(&id).map(|entry| entry.name.as_str())
    }

    /// Returns a system's priority.
    #[must_use]
    pub fn priority(&self, id: SystemId) -> Option<f64> {
        self.entries.get(&id).map(|entry| entry.priority)
    }

    /// Returns a system's phase.
    #[must_use]
    pub fn phase(&self, id: SystemId) -> Option<Phase> {
        self.entries.get(&id).map(|entry| entry.phase)
    }

    /// Returns the queries a system declared on activation.
    #[must_use]
    pub fn declared(&self, id: SystemId) -> &[QueryHandle] {
        self.entries
            .get(&id)
            .map(|entry| entry.declared.as_slice())
            .unwrap_or_default()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: SystemId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn order_mut(&mut self, phase: Phase) -> &mut Vec<SystemId> {
        match phase {
            Phase::Update => &mut self.update_order,
            Phase::Draw => &mut self.draw_order,
        }
    }
}
