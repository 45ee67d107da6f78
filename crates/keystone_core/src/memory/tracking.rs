//! # Tracking Allocator
//!
//! Debug allocator that remembers every live allocation and reports the
//! ones never freed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// A heap buffer handed out by a [`TrackingAllocator`].
///
/// Must be returned through [`TrackingAllocator::free`]. Dropping it directly
/// releases the memory but leaves the record behind, and it shows up in the
/// leak report.
#[derive(Debug)]
pub struct TrackedBuffer {
    id: u64,
    data: Box<[u8]>,
}

impl TrackedBuffer {
    /// Returns the allocation id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Deref for TrackedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for TrackedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// One allocation still alive at report time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeakRecord {
    /// Allocation id.
    pub id: u64,
    /// Size in bytes.
    pub size: usize,
    /// Human-readable tag given at allocation time.
    pub tag: String,
}

#[derive(Debug)]
struct AllocationInfo {
    size: usize,
    tag: String,
}

/// Allocator that records `{size, tag}` for every live allocation.
///
/// Not performance-critical. Every method takes `&self`; the record map is
/// guarded by a mutex.
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    allocations: Mutex<HashMap<u64, AllocationInfo>>,
    next_id: AtomicU64,
}

impl TrackingAllocator {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `size` zeroed bytes and records them under `tag`.
    pub fn allocate(&self, size: usize, tag: impl Into<String>) -> TrackedBuffer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tag = tag.into();
        tracing::trace!(id, size, tag = %tag, "tracked allocation");

        self.allocations
            .lock()
            .insert(id, AllocationInfo { size, tag });

        TrackedBuffer {
            id,
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Releases a buffer and forgets its record.
    pub fn free(&self, buffer: TrackedBuffer) {
        if self.allocations.lock().remove(&buffer.id).is_none() {
            tracing::warn!(id = buffer.id, "freeing a buffer this tracker does not own");
        }
        drop(buffer);
    }

    /// Returns the number of live allocations.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.allocations.lock().len()
    }

    /// Returns the total size of live allocations in bytes.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.allocations.lock().values().map(|info| info.size).sum()
    }

    /// Logs and returns every allocation that is still tracked.
    ///
    /// Called once at shutdown. Records are sorted by id.
    pub fn report_leaks(&self) -> Vec<LeakRecord> {
        let allocations = self.allocations.lock();
        if allocations.is_empty() {
            tracing::info!("memory: no leaks detected");
            return Vec::new();
        }

        let mut leaks: Vec<LeakRecord> = allocations
            .iter()
            .map(|(&id, info)| LeakRecord {
                id,
                size: info.size,
                tag: info.tag.clone(),
            })
            .collect();
        leaks.sort_by_key(|leak| leak.id);

        for leak in &leaks {
            tracing::warn!(id = leak.id, size = leak.size, tag = %leak.tag, "memory leak");
        }
        leaks
    }
}
