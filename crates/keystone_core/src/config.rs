//! # Engine Configuration
//!
//! Static capacities of the core, loaded once at startup from TOML.
//!
//! ```toml
//! arena_bytes = 67108864
//! max_entities = 5000
//! pool_element_size = 64
//! pool_element_count = 1024
//! worker_threads = 4
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use serde::Deserialize;

use crate::ecs::MAX_ENTITIES;
use crate::error::ConfigError;
use crate::memory::{PoolAllocator, DEFAULT_ARENA_BYTES};

/// Capacities for the memory manager, coordinator and thread pool.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Size of the component arena in bytes.
    pub arena_bytes: usize,
    /// Maximum number of simultaneously alive entities.
    pub max_entities: usize,
    /// Slot size of the pool allocator in bytes.
    pub pool_element_size: usize,
    /// Slot count of the pool allocator.
    pub pool_element_count: usize,
    /// Worker thread count; `None` uses the available hardware parallelism.
    pub worker_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            arena_bytes: DEFAULT_ARENA_BYTES,
            max_entities: MAX_ENTITIES,
            pool_element_size: 64,
            pool_element_count: 1024,
            worker_threads: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML or unknown keys,
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every capacity is usable.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entities == 0 {
            return Err(ConfigError::Invalid("max_entities must be > 0".into()));
        }
        if u32::try_from(self.max_entities).is_err() {
            return Err(ConfigError::Invalid(format!(
                "max_entities {} does not fit a 32-bit entity id",
                self.max_entities
            )));
        }
        if self.pool_element_count == 0 {
            return Err(ConfigError::Invalid(
                "pool_element_count must be > 0".into(),
            ));
        }
        if PoolAllocator::storage_bytes(self.pool_element_size, self.pool_element_count).is_none() {
            return Err(ConfigError::Invalid(format!(
                "pool of {} x {} bytes overflows the address space",
                self.pool_element_count, self.pool_element_size
            )));
        }
        if self.arena_bytes == 0 || isize::try_from(self.arena_bytes).is_err() {
            return Err(ConfigError::Invalid(format!(
                "arena_bytes {} must be in 1..=isize::MAX",
                self.arena_bytes
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::Invalid("worker_threads must be > 0".into()));
        }
        Ok(())
    }

    /// Worker count for the thread pool.
    #[must_use]
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
    }
}
