//! # Component Storage
//!
//! Dense, pre-reserved storage for all live instances of one component type.
//!
//! The storage uses a packed array strategy:
//! - Values occupy `[0, len)` with no gaps
//! - `entity -> index` and `index -> entity` maps are exact inverses
//! - Removal is swap-and-pop, O(1), and does not preserve order

use std::any::type_name;

use parking_lot::Mutex;

use super::component::Component;
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::memory::{ArenaBlock, MemoryManager};

/// Marker for "entity has no slot" in the entity -> index map.
const NO_INDEX: u32 = u32::MAX;

/// Dense storage for a single component type.
///
/// This storage guarantees:
/// - Zero heap allocations after creation
/// - O(1) insert, remove and lookup by entity
/// - Cache-friendly iteration over `[0, len)`
///
/// References returned by [`get`](Self::get) point into the dense array and
/// are invalidated by the next insert or remove.
///
/// # Example
///
/// ```rust,ignore
/// let mut positions: ComponentArray<Position> = ComponentArray::new(5000);
/// positions.insert(7, Position { x: 1.0, y: 2.0, z: 3.0 })?;
/// ```
pub struct ComponentArray<T: Component> {
    /// The packed values.
    data: Vec<T>,
    /// Entity owning each packed value.
    index_to_entity: Vec<Entity>,
    /// Slot of each entity, `NO_INDEX` when absent.
    entity_to_index: Box<[u32]>,
    /// Arena budget backing this array, if it was created from one.
    reservation: Option<ArenaBlock>,
}

impl<T: Component> ComponentArray<T> {
    /// Creates storage for up to `capacity` entities (IDs `0..capacity`).
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or does not fit in 32 bits.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            u32::try_from(capacity).is_ok(),
            "Capacity cannot exceed u32::MAX"
        );

        Self {
            data: Vec::with_capacity(capacity),
            index_to_entity: Vec::with_capacity(capacity),
            entity_to_index: vec![NO_INDEX; capacity].into_boxed_slice(),
            reservation: None,
        }
    }

    /// Creates storage whose byte budget is reserved from the shared arena.
    ///
    /// # Errors
    ///
    /// [`EcsError::Memory`] if the arena cannot fit `capacity` values.
    pub fn reserve_in(memory: &MemoryManager, capacity: usize) -> EcsResult<Self> {
        let bytes = std::mem::size_of::<T>().saturating_mul(capacity);
        let block = memory.reserve(bytes, std::mem::align_of::<T>())?;

        let mut array = Self::new(capacity);
        array.reservation = Some(block);
        Ok(array)
    }

    /// Returns the arena block reserved for this array.
    #[inline]
    #[must_use]
    pub const fn reservation(&self) -> Option<ArenaBlock> {
        self.reservation
    }

    /// Returns the maximum number of values.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entity_to_index.len()
    }

    /// Returns the number of live values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no value is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if `entity` has a value here.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.index_of(entity).is_some()
    }

    /// Returns the packed index of `entity`'s value.
    #[inline]
    #[must_use]
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        match self.entity_to_index.get(entity as usize) {
            Some(&index) if index != NO_INDEX => Some(index as usize),
            _ => None,
        }
    }

    /// Appends a value for `entity`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponent`] if the entity already has a value
    ///   (the stored value is left untouched).
    /// - [`EcsError::CapacityExceeded`] if `entity` is outside `0..capacity`.
    pub fn insert(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let capacity = self.capacity();
        let Some(slot) = self.entity_to_index.get_mut(entity as usize) else {
            return Err(EcsError::CapacityExceeded {
                component: type_name::<T>(),
                capacity,
            });
        };
        if *slot != NO_INDEX {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: type_name::<T>(),
            });
        }

        // len < capacity <= u32::MAX, and every entity has at most one slot.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.data.len() as u32;
        *slot = index;
        self.index_to_entity.push(entity);
        self.data.push(value);
        Ok(())
    }

    /// Removes and returns `entity`'s value.
    ///
    /// The last value is moved into the freed slot (swap-and-pop).
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if the entity has no value.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<T> {
        let index = self.index_of(entity).ok_or(EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        })?;

        let value = self.data.swap_remove(index);
        self.index_to_entity.swap_remove(index);
        self.entity_to_index[entity as usize] = NO_INDEX;

        // Re-point the entity that was moved from the tail, if any.
        if let Some(&moved) = self.index_to_entity.get(index) {
            #[allow(clippy::cast_possible_truncation)]
            let new_index = index as u32;
            self.entity_to_index[moved as usize] = new_index;
        }

        Ok(value)
    }

    /// Gets `entity`'s value.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if the entity has no value.
    #[inline]
    pub fn get(&self, entity: Entity) -> EcsResult<&T> {
        match self.index_of(entity) {
            Some(index) => Ok(&self.data[index]),
            None => Err(Self::missing(entity)),
        }
    }

    /// Gets `entity`'s value mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if the entity has no value.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut T> {
        match self.index_of(entity) {
            Some(index) => Ok(&mut self.data[index]),
            None => Err(Self::missing(entity)),
        }
    }

    /// Removes `entity`'s value if present; returns whether one was removed.
    ///
    /// Safe to call for entities that never held this component.
    pub fn entity_destroyed(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_ok()
    }

    /// Entities in packed order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.index_to_entity
    }

    /// Packed values, in the same order as [`entities`](Self::entities).
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterates over `(entity, value)` pairs in packed order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.index_to_entity.iter().copied().zip(self.data.iter())
    }

    /// Iterates mutably over `(entity, value)` pairs in packed order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.index_to_entity.iter().copied().zip(self.data.iter_mut())
    }

    fn missing(entity: Entity) -> EcsError {
        EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        }
    }
}

/// The one operation the coordinator needs on every array, regardless of type.
///
/// Implemented for the mutex-guarded array the coordinator stores, so each
/// call takes that array's lock.
pub trait ErasedComponentArray: Send + Sync {
    /// Drops `entity`'s value if present.
    fn entity_destroyed(&self, entity: Entity) -> bool;

    /// Name of the stored component type.
    fn component_name(&self) -> &'static str;

    /// Number of stored values.
    fn len(&self) -> usize;

    /// Returns `true` if no value is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Component> ErasedComponentArray for Mutex<ComponentArray<T>> {
    fn entity_destroyed(&self, entity: Entity) -> bool {
        self.lock().entity_destroyed(entity)
    }

    fn component_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Mass(f32);

    #[test]
    fn test_insert_get() {
        let mut array = ComponentArray::new(16);
        array.insert(3, Mass(1.5)).unwrap();
        assert_eq!(array.get(3).unwrap(), &Mass(1.5));
        assert_eq!(array.len(), 1);
        assert!(array.contains(3));
        assert!(!array.contains(4));
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let mut array = ComponentArray::new(4);
        array.insert(1, Mass(1.0)).unwrap();

        let err = array.insert(1, Mass(9.0)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { entity: 1, .. }));
        assert_eq!(array.get(1).unwrap(), &Mass(1.0));
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn test_swap_and_pop_preserves_others() {
        let mut array = ComponentArray::new(8);
        for entity in 0..5u16 {
            array.insert(u32::from(entity), Mass(f32::from(entity))).unwrap();
        }

        assert_eq!(array.remove(1).unwrap(), Mass(1.0));
        assert_eq!(array.len(), 4);
        assert!(!array.contains(1));
        for entity in [0u16, 2, 3, 4] {
            assert_eq!(array.get(u32::from(entity)).unwrap(), &Mass(f32::from(entity)));
        }
        // The tail moved into the hole.
        assert_eq!(array.entities(), &[0, 4, 2, 3]);
    }

    #[test]
    fn test_remove_last_and_only() {
        let mut array = ComponentArray::new(4);
        array.insert(2, Mass(2.0)).unwrap();
        array.insert(3, Mass(3.0)).unwrap();

        array.remove(3).unwrap();
        assert_eq!(array.entities(), &[2]);
        array.remove(2).unwrap();
        assert!(array.is_empty());
    }

    #[test]
    fn test_remove_missing() {
        let mut array: ComponentArray<Mass> = ComponentArray::new(4);
        assert!(matches!(
            array.remove(0),
            Err(EcsError::MissingComponent { entity: 0, .. })
        ));
        assert!(array.get_mut(0).is_err());
    }

    #[test]
    fn test_entity_destroyed_is_idempotent() {
        let mut array = ComponentArray::new(4);
        array.insert(0, Mass(1.0)).unwrap();
        assert!(array.entity_destroyed(0));
        assert!(!array.entity_destroyed(0));
        assert!(!array.entity_destroyed(3));
    }

    #[test]
    fn test_out_of_range_entity() {
        let mut array = ComponentArray::new(2);
        assert!(matches!(
            array.insert(2, Mass(0.0)),
            Err(EcsError::CapacityExceeded { capacity: 2, .. })
        ));
    }

    #[test]
    fn test_no_growth_after_creation() {
        let mut array = ComponentArray::new(32);
        let before = array.as_slice().as_ptr();
        for entity in 0..32 {
            array.insert(entity, Mass(0.0)).unwrap();
        }
        assert_eq!(array.as_slice().as_ptr(), before);
    }

    #[test]
    fn test_iter_mut() {
        let mut array = ComponentArray::new(4);
        array.insert(0, Mass(1.0)).unwrap();
        array.insert(1, Mass(2.0)).unwrap();
        for (_, mass) in array.iter_mut() {
            mass.0 *= 2.0;
        }
        let total: f32 = array.iter().map(|(_, m)| m.0).sum();
        assert!((total - 6.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_reserve_in_arena() {
        let memory = MemoryManager::new(&crate::EngineConfig {
            arena_bytes: 1024,
            ..crate::EngineConfig::default()
        });
        let array: ComponentArray<u64> = ComponentArray::reserve_in(&memory, 64).unwrap();
        assert_eq!(array.reservation().unwrap().len(), 512);

        let too_big: EcsResult<ComponentArray<u64>> = ComponentArray::reserve_in(&memory, 128);
        assert!(matches!(too_big, Err(EcsError::Memory(_))));
    }
}
