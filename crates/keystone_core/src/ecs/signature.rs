//! # Signatures
//!
//! A fixed 256-bit set recording which component types an entity holds.

use std::fmt;

/// Maximum number of distinct component types.
pub const MAX_COMPONENTS: usize = 256;

/// Index assigned to a component type at registration (0..=255).
pub type ComponentType = u8;

const WORDS: usize = MAX_COMPONENTS / 64;

/// Bitset with one bit per component type.
///
/// Bit `i` is set iff the entity holds the component registered with
/// index `i`. Copying a signature is cheap (32 bytes).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    bits: [u64; WORDS],
}

impl Signature {
    /// The empty signature.
    pub const EMPTY: Self = Self { bits: [0; WORDS] };

    /// Creates an empty signature.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Sets the bit for `ty`.
    #[inline]
    pub fn set(&mut self, ty: ComponentType) {
        let (word, mask) = Self::locate(ty);
        self.bits[word] |= mask;
    }

    /// Clears the bit for `ty`.
    #[inline]
    pub fn clear(&mut self, ty: ComponentType) {
        let (word, mask) = Self::locate(ty);
        self.bits[word] &= !mask;
    }

    /// Returns whether the bit for `ty` is set.
    #[inline]
    #[must_use]
    pub const fn test(&self, ty: ComponentType) -> bool {
        let (word, mask) = Self::locate(ty);
        self.bits[word] & mask != 0
    }

    /// Returns `true` if every bit of `required` is also set here.
    #[inline]
    #[must_use]
    pub fn contains(&self, required: &Self) -> bool {
        self.bits
            .iter()
            .zip(required.bits.iter())
            .all(|(have, need)| have & need == *need)
    }

    /// Returns the bitwise OR of both signatures.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut bits = self.bits;
        for (word, other) in bits.iter_mut().zip(other.bits.iter()) {
            *word |= other;
        }
        Self { bits }
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&word| word == 0)
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Clears every bit.
    #[inline]
    pub fn reset(&mut self) {
        self.bits = [0; WORDS];
    }

    /// Iterates over the set component types in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentType> + '_ {
        (0..MAX_COMPONENTS).filter_map(move |i| {
            // i < 256 always fits
            #[allow(clippy::cast_possible_truncation)]
            let ty = i as ComponentType;
            self.test(ty).then_some(ty)
        })
    }

    #[inline]
    const fn locate(ty: ComponentType) -> (usize, u64) {
        let index = ty as usize;
        (index / 64, 1u64 << (index % 64))
    }
}

impl FromIterator<ComponentType> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        let mut signature = Self::new();
        for ty in iter {
            signature.set(ty);
        }
        signature
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
