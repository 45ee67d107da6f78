//! # Pool Allocator
//!
//! Fixed-size block allocator for objects that are frequently allocated and freed.

use crate::error::{MemoryError, MemoryResult};

/// Size of the link word stored in the first bytes of every free slot.
const LINK_BYTES: usize = std::mem::size_of::<u64>();

/// Free-list terminator.
const END_OF_LIST: u64 = u64::MAX;

/// A pool allocator for fixed-size slots.
///
/// All slots have the same size and live in one contiguous buffer. Free slots
/// form an intrusive singly linked list: the first 8 bytes of a free slot hold
/// the index of the next free slot. There is no fragmentation and both
/// [`allocate`](Self::allocate) and [`free`](Self::free) are O(1).
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = PoolAllocator::new(64, 1024);
///
/// // Allocate - O(1), no heap allocation
/// let handle = pool.allocate()?;
/// pool.slot_mut(handle)?[..4].copy_from_slice(&7u32.to_le_bytes());
///
/// // Free - O(1), no heap deallocation
/// pool.free(handle)?;
/// ```
pub struct PoolAllocator {
    /// The slot storage.
    storage: Box<[u8]>,
    /// Per-slot allocation flag, for double-free detection.
    allocated: Box<[bool]>,
    /// Index of the first free slot, or `END_OF_LIST`.
    free_head: u64,
    /// Size of one slot in bytes.
    element_size: usize,
    /// Number of allocated slots.
    allocated_count: usize,
    /// Total slot count.
    capacity: usize,
}

/// Handle to an allocated slot in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Index into the pool.
    index: usize,
}

impl PoolHandle {
    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl PoolAllocator {
    /// Creates a new pool of `capacity` slots of `element_size` bytes.
    ///
    /// Slots smaller than the 8-byte link word are rounded up to it. All
    /// memory is allocated up front and every slot is linked into the free
    /// list in ascending order.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or the total byte size overflows (see
    /// [`PoolAllocator::storage_bytes`]).
    #[must_use]
    pub fn new(element_size: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        let Some(bytes) = Self::storage_bytes(element_size, capacity) else {
            panic!("Pool of {capacity} slots x {element_size} bytes is too large");
        };

        let element_size = element_size.max(LINK_BYTES);
        let mut pool = Self {
            storage: vec![0u8; bytes].into_boxed_slice(),
            allocated: vec![false; capacity].into_boxed_slice(),
            free_head: END_OF_LIST,
            element_size,
            allocated_count: 0,
            capacity,
        };
        pool.relink_all();
        pool
    }

    /// Bytes a pool of this shape allocates, or `None` if that exceeds
    /// `isize::MAX`. Slots are rounded up to the link word first.
    #[must_use]
    pub fn storage_bytes(element_size: usize, capacity: usize) -> Option<usize> {
        element_size
            .max(LINK_BYTES)
            .checked_mul(capacity)
            .filter(|&bytes| isize::try_from(bytes).is_ok())
    }

    /// Returns the total number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the size of one slot in bytes.
    #[inline]
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.element_size
    }

    /// Returns the number of currently allocated slots.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.capacity - self.allocated_count
    }

    /// Pops the head of the free list.
    ///
    /// This is a **O(1)** operation with **zero heap allocations**. The slot
    /// contents are whatever the previous owner left, except for the first
    /// 8 bytes which held the link.
    ///
    /// # Errors
    ///
    /// [`MemoryError::PoolExhausted`] when every slot is in use.
    pub fn allocate(&mut self) -> MemoryResult<PoolHandle> {
        if self.free_head == END_OF_LIST {
            return Err(MemoryError::PoolExhausted {
                capacity: self.capacity,
            });
        }

        // The head is always a valid slot index while it is not END_OF_LIST.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.free_head as usize;
        self.free_head = self.read_link(index);
        self.allocated[index] = true;
        self.allocated_count += 1;

        Ok(PoolHandle { index })
    }

    /// Pushes a slot back onto the free list.
    ///
    /// This is a **O(1)** operation with **zero heap deallocations**.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidPoolHandle`] if the handle is out of range or the
    /// slot is already free.
    pub fn free(&mut self, handle: PoolHandle) -> MemoryResult<()> {
        self.check(handle)?;

        let index = handle.index;
        self.write_link(index, self.free_head);
        self.free_head = index as u64;
        self.allocated[index] = false;
        self.allocated_count -= 1;

        Ok(())
    }

    /// Gets the bytes of an allocated slot.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidPoolHandle`] if the slot is not allocated.
    #[inline]
    pub fn slot(&self, handle: PoolHandle) -> MemoryResult<&[u8]> {
        self.check(handle)?;
        let start = handle.index * self.element_size;
        Ok(&self.storage[start..start + self.element_size])
    }

    /// Gets the bytes of an allocated slot mutably.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidPoolHandle`] if the slot is not allocated.
    #[inline]
    pub fn slot_mut(&mut self, handle: PoolHandle) -> MemoryResult<&mut [u8]> {
        self.check(handle)?;
        let start = handle.index * self.element_size;
        Ok(&mut self.storage[start..start + self.element_size])
    }

    /// Frees every slot, resetting the pool.
    ///
    /// This is a **zero-heap-allocation** operation - memory is not freed.
    pub fn clear(&mut self) {
        self.allocated.fill(false);
        self.allocated_count = 0;
        self.relink_all();
    }

    fn check(&self, handle: PoolHandle) -> MemoryResult<()> {
        if self.allocated.get(handle.index).copied().unwrap_or(false) {
            Ok(())
        } else {
            Err(MemoryError::InvalidPoolHandle(handle.index))
        }
    }

    fn relink_all(&mut self) {
        for index in 0..self.capacity {
            let next = if index + 1 < self.capacity {
                (index + 1) as u64
            } else {
                END_OF_LIST
            };
            self.write_link(index, next);
        }
        self.free_head = 0;
    }

    #[inline]
    fn read_link(&self, index: usize) -> u64 {
        let start = index * self.element_size;
        let word: u64 = bytemuck::pod_read_unaligned(&self.storage[start..start + LINK_BYTES]);
        u64::from_le(word)
    }

    #[inline]
    fn write_link(&mut self, index: usize, next: u64) {
        let start = index * self.element_size;
        self.storage[start..start + LINK_BYTES]
            .copy_from_slice(bytemuck::bytes_of(&next.to_le()));
    }
}

impl std::fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("element_size", &self.element_size)
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated_count)
            .finish()
    }
}
