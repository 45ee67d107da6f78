//! # Entity Management
//!
//! Entities are opaque 32-bit handles. Destroyed IDs go to the back of a FIFO
//! queue, so a freshly destroyed ID is the last one to be handed out again.

use std::collections::VecDeque;

use super::signature::Signature;
use crate::error::{EcsError, EcsResult};

/// Opaque entity handle. Valid values are `0..max_entities`.
pub type Entity = u32;

/// Default maximum number of simultaneously alive entities.
pub const MAX_ENTITIES: usize = 5000;

/// ID allocation plus the signature of every alive entity.
///
/// An entity is alive iff its slot holds a signature. Every ID is either in
/// the free queue or alive, never both.
pub(crate) struct EntityTable {
    /// Free IDs in reuse order.
    available: VecDeque<Entity>,
    /// `Some(signature)` for alive entities.
    signatures: Box<[Option<Signature>]>,
    /// Number of alive entities. Killed-but-unreleased IDs are not counted.
    living: usize,
}

impl EntityTable {
    /// Creates a table with every ID free.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            Entity::try_from(capacity).is_ok(),
            "Capacity cannot exceed u32::MAX"
        );

        #[allow(clippy::cast_possible_truncation)]
        let top = capacity as Entity;

        Self {
            available: (0..top).collect(),
            signatures: vec![None; capacity].into_boxed_slice(),
            living: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.signatures.len()
    }

    #[inline]
    pub(crate) const fn living(&self) -> usize {
        self.living
    }

    /// Pops the next free ID and marks it alive with an empty signature.
    pub(crate) fn create(&mut self) -> EcsResult<Entity> {
        let Some(entity) = self.available.pop_front() else {
            return Err(EcsError::EntityLimitExceeded {
                max: self.capacity(),
            });
        };

        self.signatures[entity as usize] = Some(Signature::EMPTY);
        self.living += 1;
        Ok(entity)
    }

    /// Marks an entity dead, returning its last signature.
    ///
    /// The ID is NOT yet reusable; call [`EntityTable::release`] once every
    /// component array has dropped the entity's data.
    pub(crate) fn kill(&mut self, entity: Entity) -> EcsResult<Signature> {
        let signature = self
            .slot_mut(entity)?
            .take()
            .ok_or(EcsError::EntityNotAlive(entity))?;
        self.living -= 1;
        Ok(signature)
    }

    /// Returns a killed ID to the free queue.
    pub(crate) fn release(&mut self, entity: Entity) {
        debug_assert!(self.signature(entity).is_none());
        self.available.push_back(entity);
    }

    #[inline]
    pub(crate) fn is_alive(&self, entity: Entity) -> bool {
        self.signature(entity).is_some()
    }

    #[inline]
    pub(crate) fn signature(&self, entity: Entity) -> Option<&Signature> {
        self.signatures.get(entity as usize)?.as_ref()
    }

    /// Mutable signature of an alive entity.
    pub(crate) fn signature_mut(&mut self, entity: Entity) -> EcsResult<&mut Signature> {
        self.slot_mut(entity)?
            .as_mut()
            .ok_or(EcsError::EntityNotAlive(entity))
    }

    /// Iterates alive entities in ascending ID order.
    // index < capacity <= u32::MAX
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn iter_alive(&self) -> impl Iterator<Item = (Entity, &Signature)> {
        self.signatures
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|signature| (index as Entity, signature)))
    }

    fn slot_mut(&mut self, entity: Entity) -> EcsResult<&mut Option<Signature>> {
        self.signatures
            .get_mut(entity as usize)
            .ok_or(EcsError::EntityNotAlive(entity))
    }
}
