//! # engine_ecs
//!
//! The scheduling half of the ECS. A [`World`] ties together the entity
//! registry and component store from `engine_component` with:
//!
//! - [`QueryIndex`]: incrementally maintained query membership.
//! - [`SystemRegistry`]: systems sorted by phase and priority.
//! - The frame scheduler: [`World::tick`] initializes pending systems,
//!   then runs every `Update` system before every `Draw` system.
//!
//! ```rust
//! use engine_ecs::{Frame, HookResult, Phase, System, World};
//!
//! struct Hello;
//!
//! impl System for Hello {
//!     fn update(&mut self, frame: &mut Frame<'_>) -> HookResult {
//!         let _ = frame.delta();
//!         Ok(())
//!     }
//! }
//!
//! let mut world = World::new();
//! world.register_system(Hello, Phase::Update, 0.0);
//! let report = world.tick(16.0, 0.016);
//! assert!(report.is_clean());
//! ```

pub mod config;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod system;
pub mod world;

pub use config::{ClosingHook, WorldConfig};
pub use query::{Query, QueryHandle, QueryIndex, QueryStats};
pub use registry::{RemovedSystem, SystemRegistry, SystemState};
pub use scheduler::{FailureReport, FrameReport, SchedulerError};
pub use system::{Frame, FrameInfo, Hook, HookResult, Phase, System, SystemId};
pub use world::World;

pub use engine_component::{
    Component, ComponentTypeId, DuplicatePolicy, EcsError, Entity, Result, Signature,
};
