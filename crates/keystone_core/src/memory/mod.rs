//! # Memory Management
//!
//! Pre-allocated arenas and pools, plus a tracking allocator for debugging.
//!
//! ## Design Philosophy
//!
//! All large memory is allocated once at startup. During gameplay:
//! - No heap allocations for component storage
//! - Constant-time pool alloc/free with no fragmentation
//! - Leaks are reported once, at shutdown

mod arena;
mod manager;
mod pool;
mod tracking;

pub use arena::{Arena, ArenaBlock, DEFAULT_ARENA_BYTES};
pub use manager::MemoryManager;
pub use pool::{PoolAllocator, PoolHandle};
pub use tracking::{LeakRecord, TrackedBuffer, TrackingAllocator};
