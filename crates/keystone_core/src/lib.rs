//! # KEYSTONE Core Engine
//!
//! Entity Component System core for a real-time game engine:
//! - Entities are 32-bit IDs recycled through a FIFO queue
//! - Each component type lives in one dense, pre-sized array
//! - A 256-bit signature per entity answers "which entities have A and B"
//! - Arena, pool and tracking allocators back the engine's memory
//! - A fixed worker pool runs background jobs with pollable results
//!
//! ## Architecture Rules
//!
//! 1. **No growth in the hot path** - Component storage is sized at registration
//! 2. **Errors, not asserts** - Every contract violation is a typed error
//! 3. **No globals** - The coordinator, memory manager and pool are owned values
//!
//! ## Example
//!
//! ```rust,ignore
//! use keystone_core::{Coordinator, EngineConfig};
//!
//! let coordinator = Coordinator::new(&EngineConfig::default());
//! coordinator.register_component::<Position>()?;
//!
//! let e = coordinator.create_entity()?;
//! coordinator.add_component(e, Position { x: 0.0, y: 0.0, z: 0.0 })?;
//! coordinator.with_component::<Position, _>(e, |p| p.x += 1.0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod sync;

pub use config::EngineConfig;
pub use ecs::{
    Component, ComponentArray, ComponentSet, ComponentType, ComponentView, Coordinator, Entity,
    ErasedComponentArray, ProfileEvent, Profiler, Signature, System, SystemManager,
    MAX_COMPONENTS, MAX_ENTITIES,
};
pub use error::{
    ConfigError, EcsError, EcsResult, MemoryError, MemoryResult, ThreadPoolError,
};
pub use memory::{
    Arena, ArenaBlock, LeakRecord, MemoryManager, PoolAllocator, PoolHandle, TrackedBuffer,
    TrackingAllocator, DEFAULT_ARENA_BYTES,
};
pub use sync::{TaskHandle, ThreadPool};
