//! # Entity Component System
//!
//! Entities are plain IDs, components are plain data, systems hold the
//! logic. The [`Coordinator`] ties them together.
//!
//! ## Design Philosophy
//!
//! - Component storage is sized once at registration and never grows
//! - Each component type lives in its own dense array (swap-and-pop removal)
//! - Per-entity signatures make "which entities have A and B" a bitset test
//! - Every operation returns a typed error instead of asserting

mod component;
mod coordinator;
mod entity;
mod signature;
mod storage;
mod system;

pub use component::{Component, ComponentSet};
pub use coordinator::{ComponentView, Coordinator};
pub use entity::{Entity, MAX_ENTITIES};
pub use signature::{ComponentType, Signature, MAX_COMPONENTS};
pub use storage::{ComponentArray, ErasedComponentArray};
pub use system::{ProfileEvent, Profiler, System, SystemManager};
