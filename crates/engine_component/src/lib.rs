//! # engine_component
//!
//! The leaf primitives of the ECS: what a component is, how entities are
//! identified, and where component data lives.
//!
//! This crate provides:
//!
//! - [`Component`] trait and [`ComponentTypeId`] (FNV-1a of the type name).
//! - [`Entity`]: generation-tagged handles, allocated by [`EntityRegistry`].
//! - [`Signature`]: the set of component types a query requires.
//! - [`ComponentStore`]: per-type storage with a configurable
//!   [`DuplicatePolicy`].
//! - [`EcsError`]: synchronous entity/component errors.

pub mod component;
pub mod entity;
pub mod error;
pub mod signature;
pub mod store;

pub use component::{BoxedComponent, Component, ComponentTypeId};
pub use entity::{Entity, EntityRegistry};
pub use error::{EcsError, Result};
pub use signature::Signature;
pub use store::{Column, ComponentStore, DuplicatePolicy, Inserted};
