//! The [`System`] capability and the per-hook [`Frame`] context.
//!
//! A system is a value with three per-frame hooks and a one-time
//! `initialize`. It is registered into a [`Phase`] with a numeric priority;
//! the scheduler owns the ordering, systems only supply behaviour.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use engine_component::{Entity, Result};

use crate::query::QueryHandle;
use crate::world::World;

/// Result returned by every lifecycle hook.
pub type HookResult = anyhow::Result<()>;

/// The two per-frame execution phases. Every `Update` system completes
/// before any `Draw` system starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Game logic.
    Update,
    /// Rendering.
    Draw,
}

impl Phase {
    /// Both phases in execution order.
    pub const ALL: [Phase; 2] = [Phase::Update, Phase::Draw];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Update => f.write_str("update"),
            Phase::Draw => f.write_str("draw"),
        }
    }
}

/// A per-frame lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Runs first in the cycle.
    PreUpdate,
    /// The main hook.
    Update,
    /// Closes the cycle.
    PostUpdate,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::PreUpdate => f.write_str("preupdate"),
            Hook::Update => f.write_str("update"),
            Hook::PostUpdate => f.write_str("postupdate"),
        }
    }
}

/// Identifies a registered system. Ids increase with registration order and
/// are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub(crate) u32);

impl SystemId {
    /// Returns the raw id.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System({})", self.0)
    }
}

/// A processing unit run once per frame by the scheduler.
///
/// Only [`System::update`] is required. A system that wants the scheduler to
/// snapshot its queries at the start of every hook returns their handles from
/// [`System::queries`]; the list is read once, right after a successful
/// `initialize`.
///
/// # Examples
///
/// ```rust
/// use engine_ecs::{Frame, HookResult, System};
///
/// struct FrameCounter(u64);
///
/// impl System for FrameCounter {
///     fn update(&mut self, _frame: &mut Frame<'_>) -> HookResult {
///         self.0 += 1;
///         Ok(())
///     }
/// }
/// ```
pub trait System {
    /// A name for logs and failure reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called exactly once before the system first runs. A failure is
    /// retried on the following frames up to the configured limit.
    fn initialize(&mut self, _world: &mut World) -> HookResult {
        Ok(())
    }

    /// The queries this system iterates.
    fn queries(&self) -> Vec<QueryHandle> {
        Vec::new()
    }

    /// Opens the per-frame cycle.
    fn preupdate(&mut self, _frame: &mut Frame<'_>) -> HookResult {
        Ok(())
    }

    /// The per-frame work.
    fn update(&mut self, frame: &mut Frame<'_>) -> HookResult;

    /// Closes the per-frame cycle.
    fn postupdate(&mut self, _frame: &mut Frame<'_>) -> HookResult {
        Ok(())
    }
}

/// Timing information for the frame being executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Frame counter, starting at 1.
    pub frame: u64,
    /// Time since the host started, in milliseconds.
    pub elapsed_ms: f64,
    /// Time since the previous frame, as supplied by the host.
    pub delta: f64,
    /// The phase being executed.
    pub phase: Phase,
    /// The system being executed.
    pub system: SystemId,
}

/// The context handed to a per-frame hook.
///
/// `world` is fully mutable. Query membership seen through
/// [`Frame::entities`] is frozen for the duration of the hook call: declared
/// queries are captured when the call begins, any other handle on first
/// access. Structural changes made during the call are applied immediately
/// and become visible to systems that run after it.
pub struct Frame<'w> {
    /// The world being simulated.
    pub world: &'w mut World,
    info: FrameInfo,
    snapshots: HashMap<QueryHandle, Rc<Vec<Entity>>>,
}

impl<'w> Frame<'w> {
    pub(crate) fn begin(world: &'w mut World, info: FrameInfo, declared: &[QueryHandle]) -> Self {
        let snapshots = declared
            .iter()
            .filter_map(|&handle| world.snapshot(handle).ok().map(|s| (handle, s)))
            .collect();
        Self {
            world,
            info,
            snapshots,
        }
    }

    /// The members of `handle` as of the start of this hook call.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownQuery`](engine_component::EcsError::UnknownQuery)
    /// if the handle is not live.
    pub fn entities(&mut self, handle: QueryHandle) -> Result<Rc<Vec<Entity>>> {
        if let Some(snapshot) = self.snapshots.get(&handle) {
            return Ok(Rc::clone(snapshot));
        }
        let snapshot = self.world.snapshot(handle)?;
        self.snapshots.insert(handle, Rc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Timing and identity of this hook call.
    #[must_use]
    pub fn info(&self) -> FrameInfo {
        self.info
    }

    /// The frame counter.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.info.frame
    }

    /// Time since the previous frame.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.info.delta
    }

    /// Time since the host started, in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.info.elapsed_ms
    }

    /// The phase being executed.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.info.phase
    }
}
