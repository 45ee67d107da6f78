//! # Core Error Types
//!
//! All errors that can occur in the ECS core, its allocators and the
//! background thread pool.
//!
//! Most of these are recoverable: game and script logic routinely tries to
//! add a component that may already exist, or drains a pool until it runs dry.
//! The few structural ones (see [`EcsError::is_fatal`]) mean the engine's
//! static capacity is misconfigured for the game, and the host should end the
//! session with a diagnostic instead of degrading silently.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors raised by the arena, pool and tracking allocators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The arena does not have enough room left for the request.
    #[error("arena exhausted: requested {requested} bytes, {remaining} remaining")]
    AllocationExhausted {
        /// Bytes requested (including alignment padding).
        requested: usize,
        /// Bytes still free in the arena.
        remaining: usize,
    },

    /// Alignment was zero or not a power of two.
    #[error("invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(usize),

    /// Every slot of the pool is in use.
    #[error("pool exhausted: all {capacity} slots in use")]
    PoolExhausted {
        /// Total slot count of the pool.
        capacity: usize,
    },

    /// A pool handle was out of range or its slot is already free.
    #[error("invalid pool handle: slot {0}")]
    InvalidPoolHandle(usize),
}

/// Result type for allocator operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised by the coordinator and component arrays.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Every entity ID is already alive.
    #[error("entity limit exceeded: {max} entities alive")]
    EntityLimitExceeded {
        /// Configured maximum number of live entities.
        max: usize,
    },

    /// The entity is not alive (never created, already destroyed, or out of range).
    #[error("entity {0} is not alive")]
    EntityNotAlive(Entity),

    /// The component type was registered twice.
    #[error("component type `{0}` is already registered")]
    DuplicateRegistration(&'static str),

    /// All component type indices are taken.
    #[error("cannot register `{name}`: all {max} component types in use")]
    TooManyComponentTypes {
        /// Name of the rejected type.
        name: &'static str,
        /// Maximum number of component types.
        max: usize,
    },

    /// The component type was never registered.
    #[error("component type `{0}` is not registered")]
    UnregisteredType(&'static str),

    /// The entity already holds a component of this type.
    #[error("entity {entity} already has component `{component}`")]
    DuplicateComponent {
        /// The entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// The entity has no component of this type.
    #[error("entity {entity} has no component `{component}`")]
    MissingComponent {
        /// The entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// A component array is full.
    #[error("component array `{component}` is full ({capacity} slots)")]
    CapacityExceeded {
        /// Component type name.
        component: &'static str,
        /// Capacity of the array.
        capacity: usize,
    },

    /// Backing memory could not be reserved.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl EcsError {
    /// Returns `true` for errors that indicate misconfigured static capacity.
    ///
    /// These are not reachable through correct, data-driven game logic; the
    /// host should terminate the session cleanly when it sees one.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EntityLimitExceeded { .. }
                | Self::TooManyComponentTypes { .. }
                | Self::Memory(MemoryError::AllocationExhausted { .. })
        )
    }

    /// Returns the entity the error refers to, if any.
    #[must_use]
    pub const fn entity(&self) -> Option<Entity> {
        match self {
            Self::EntityNotAlive(entity)
            | Self::DuplicateComponent { entity, .. }
            | Self::MissingComponent { entity, .. } => Some(*entity),
            _ => None,
        }
    }
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors raised by the thread pool and its task handles.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPoolError {
    /// The pool is shutting down and accepts no new work.
    #[error("thread pool is shut down")]
    ShutDown,

    /// The task panicked while running.
    #[error("task panicked")]
    TaskPanicked,

    /// The task was dropped before it produced a result.
    #[error("task abandoned before completion")]
    TaskAbandoned,
}

/// Errors raised while loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

