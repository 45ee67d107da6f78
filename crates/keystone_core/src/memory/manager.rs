//! # Memory Manager
//!
//! Owns the process-wide allocators. Built once at startup from
//! [`EngineConfig`](crate::EngineConfig) and shared by `Arc`.

use parking_lot::{Mutex, MutexGuard};

use super::{Arena, ArenaBlock, PoolAllocator, TrackingAllocator};
use crate::config::EngineConfig;
use crate::error::MemoryResult;

/// Aggregate of the arena, pool and tracking allocators.
///
/// The arena backs component storage; component arrays reserve their budget
/// from it at registration and never give it back. It is only rewound as a
/// whole when the manager is torn down.
#[derive(Debug)]
pub struct MemoryManager {
    arena: Mutex<Arena>,
    pool: Mutex<PoolAllocator>,
    tracker: TrackingAllocator,
}

impl MemoryManager {
    /// Creates all allocators, sized from the configuration.
    ///
    /// # Panics
    ///
    /// Panics if `pool_element_count` is zero or the pool size overflows.
    /// [`EngineConfig::validate`] rejects both.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        tracing::debug!(
            arena_bytes = config.arena_bytes,
            pool_element_size = config.pool_element_size,
            pool_element_count = config.pool_element_count,
            "memory manager initialised"
        );
        Self {
            arena: Mutex::new(Arena::new(config.arena_bytes)),
            pool: Mutex::new(PoolAllocator::new(
                config.pool_element_size,
                config.pool_element_count,
            )),
            tracker: TrackingAllocator::new(),
        }
    }

    /// Reserves a block from the shared arena.
    ///
    /// # Errors
    ///
    /// Propagates [`Arena::allocate`] failures.
    pub fn reserve(&self, size: usize, alignment: usize) -> MemoryResult<ArenaBlock> {
        self.arena.lock().allocate(size, alignment)
    }

    /// Locks the arena.
    pub fn arena(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock()
    }

    /// Locks the pool allocator.
    pub fn pool(&self) -> MutexGuard<'_, PoolAllocator> {
        self.pool.lock()
    }

    /// Returns the tracking allocator.
    #[must_use]
    pub const fn tracker(&self) -> &TrackingAllocator {
        &self.tracker
    }

    /// Reports leaks and rewinds the arena.
    ///
    /// Every arena block handed out before this call becomes invalid.
    pub fn shutdown(&self) {
        let leaks = self.tracker.report_leaks();
        let mut arena = self.arena.lock();
        tracing::info!(
            arena_used = arena.used(),
            leaks = leaks.len(),
            "memory manager shut down"
        );
        arena.reset();
        self.pool.lock().clear();
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> MemoryManager {
        MemoryManager::new(&EngineConfig {
            arena_bytes: 4096,
            pool_element_size: 32,
            pool_element_count: 4,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_reserve_from_arena() {
        let memory = small();
        let block = memory.reserve(1000, 16).unwrap();
        assert_eq!(block.len(), 1000);
        assert!(memory.arena().used() >= 1000);
    }

    #[test]
    fn test_shutdown_rewinds_arena_and_pool() {
        let memory = small();
        let _ = memory.reserve(512, 8).unwrap();
        let _ = memory.pool().allocate().unwrap();

        memory.shutdown();
        assert_eq!(memory.arena().used(), 0);
        assert_eq!(memory.pool().free_count(), 4);
    }
}
