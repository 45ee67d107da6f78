//! # Arena Allocator
//!
//! A bump allocator over one pre-sized buffer, freed all at once.

use crate::error::{MemoryError, MemoryResult};

/// Default arena size: 64 MiB.
pub const DEFAULT_ARENA_BYTES: usize = 64 * 1024 * 1024;

/// A region handed out by an [`Arena`].
///
/// Blocks are plain handles (offset + length). The bytes stay owned by the
/// arena and are reached through [`Arena::bytes`] / [`Arena::bytes_mut`].
/// A block must not be used after the arena that produced it is reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaBlock {
    offset: usize,
    len: usize,
}

impl ArenaBlock {
    /// Byte offset of the block from the start of the arena buffer.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Length of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length block.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// A bump-pointer arena allocator.
///
/// Allocations are fast (just bump an offset). Individual blocks cannot be
/// freed; the whole arena is rewound by [`Arena::reset`] or dropped.
///
/// # Thread Safety
///
/// Allocation takes `&mut self`. Share an arena between threads by wrapping it
/// in a mutex, as [`MemoryManager`](super::MemoryManager) does.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena = Arena::new(1024);
///
/// let block = arena.allocate(600, 8)?;
/// arena.bytes_mut(block)[0] = 0xAB;
///
/// // Rewind; every previous block is now invalid.
/// arena.reset();
/// ```
pub struct Arena {
    /// The backing storage, allocated once.
    storage: Box<[u8]>,
    /// Current allocation offset.
    offset: usize,
}

impl Arena {
    /// Creates a new arena with the specified capacity in bytes.
    ///
    /// The whole buffer is allocated up front.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
        }
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the current used space in bytes.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.offset
    }

    /// Bump-allocates `size` bytes whose address is a multiple of `alignment`.
    ///
    /// On failure the arena is left untouched.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidAlignment`] if `alignment` is not a power of two.
    /// - [`MemoryError::AllocationExhausted`] if the request does not fit.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> MemoryResult<ArenaBlock> {
        if !alignment.is_power_of_two() {
            return Err(MemoryError::InvalidAlignment(alignment));
        }

        // Align the absolute address, not just the offset, so the block
        // honours the request regardless of where the buffer landed.
        let base = self.storage.as_ptr() as usize;
        let current = base + self.offset;
        let aligned = (current + alignment - 1) & !(alignment - 1);
        let padding = aligned - current;

        let requested = padding.saturating_add(size);
        if requested > self.remaining() {
            return Err(MemoryError::AllocationExhausted {
                requested,
                remaining: self.remaining(),
            });
        }

        let block = ArenaBlock {
            offset: self.offset + padding,
            len: size,
        };
        self.offset += requested;
        Ok(block)
    }

    /// Returns the bytes of a block.
    ///
    /// # Panics
    ///
    /// Panics if the block lies past the current offset (it came from another
    /// arena or survived a reset).
    #[inline]
    #[must_use]
    pub fn bytes(&self, block: ArenaBlock) -> &[u8] {
        assert!(
            block.offset + block.len <= self.offset,
            "arena block outlived a reset"
        );
        &self.storage[block.offset..block.offset + block.len]
    }

    /// Returns the bytes of a block mutably.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Arena::bytes`].
    #[inline]
    pub fn bytes_mut(&mut self, block: ArenaBlock) -> &mut [u8] {
        assert!(
            block.offset + block.len <= self.offset,
            "arena block outlived a reset"
        );
        &mut self.storage[block.offset..block.offset + block.len]
    }

    /// Returns the absolute address of a block (for alignment checks).
    #[inline]
    #[must_use]
    pub fn address_of(&self, block: ArenaBlock) -> usize {
        self.storage.as_ptr() as usize + block.offset
    }

    /// Resets the arena, invalidating all previous allocations.
    ///
    /// No memory is freed or reallocated. Callers must guarantee that no
    /// block obtained before the reset is used afterwards.
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("used", &self.offset)
            .finish()
    }
}
