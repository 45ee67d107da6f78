//! # Coordinator
//!
//! The façade and source of truth of the ECS: entity IDs, per-entity
//! signatures, and the type-erased registry of component arrays.
//!
//! ## Locking
//!
//! Every operation takes `&self` and may be called from any thread.
//!
//! ```text
//!   registry (RwLock, read briefly, released before anything else)
//!        │
//!        ▼
//!   component array (Mutex, one per type)
//!        │
//!        ▼
//!   entity table (Mutex: free queue + signatures)
//! ```
//!
//! Locks are always taken in this order. Add and remove hold both the array
//! lock and the entity-table lock while they touch data and signature, so no
//! reader ever sees a signature bit that disagrees with the array contents.
//!
//! No lock outlives the call that took it. Component values are handed out
//! by copy ([`Coordinator::get_component`]) or to a closure that runs under
//! the array lock ([`Coordinator::with_component`],
//! [`Coordinator::with_components`]). Such a closure must not call back into
//! the coordinator.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::component::{Component, ComponentSet};
use super::entity::{Entity, EntityTable};
use super::signature::{ComponentType, Signature, MAX_COMPONENTS};
use super::storage::{ComponentArray, ErasedComponentArray};
use crate::config::EngineConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::MemoryManager;

type SharedArray<T> = Arc<Mutex<ComponentArray<T>>>;

/// One registered component type.
struct RegisteredComponent {
    ty: ComponentType,
    /// The `Arc<Mutex<ComponentArray<T>>>`, erased for downcasting.
    storage: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, RegisteredComponent>,
    /// Every array in registration order (index == component type).
    arrays: Vec<Arc<dyn ErasedComponentArray>>,
}

/// Access to every stored `T` under one lock.
///
/// Handed to the closure of [`Coordinator::with_components`]. Values can be
/// read and updated in place but not added or removed, so signatures stay in
/// step with the array.
pub struct ComponentView<'a, T: Component> {
    array: &'a mut ComponentArray<T>,
}

impl<T: Component> ComponentView<'_, T> {
    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns `true` if no value is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Returns `true` if `entity` has a `T`.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.array.contains(entity)
    }

    /// `entity`'s value, if it has one.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.array.get(entity).ok()
    }

    /// `entity`'s value mutably, if it has one.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.array.get_mut(entity).ok()
    }

    /// Iterates over `(entity, value)` pairs in packed order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.array.iter()
    }

    /// Iterates mutably over `(entity, value)` pairs in packed order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.array.iter_mut()
    }
}

/// The ECS coordinator.
///
/// Owns entity allocation, signatures and every component array. Construct
/// one at startup and pass it by reference to each system; tests build their
/// own.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = Coordinator::new(&EngineConfig::default());
/// coordinator.register_component::<Position>()?;
/// coordinator.register_component::<Velocity>()?;
///
/// let e = coordinator.create_entity()?;
/// coordinator.add_component(e, Position::default())?;
/// coordinator.add_component(e, Velocity { dx: 1.0, dy: 0.0, dz: 0.0 })?;
///
/// for entity in coordinator.entities_with::<(Position, Velocity)>()? {
///     let velocity = coordinator.get_component::<Velocity>(entity)?;
///     coordinator.with_component::<Position, _>(entity, |p| p.x += velocity.dx)?;
/// }
/// ```
pub struct Coordinator {
    memory: Arc<MemoryManager>,
    registry: RwLock<Registry>,
    entities: Mutex<EntityTable>,
}

impl Coordinator {
    /// Creates a coordinator with its own memory manager.
    ///
    /// # Panics
    ///
    /// Panics if any of these hold:
    /// - `config.max_entities` is zero or exceeds `u32::MAX`
    /// - `config.pool_element_count` is zero
    /// - `config.pool_element_size * config.pool_element_count` overflows
    /// - the arena or pool buffer cannot be allocated
    ///
    /// [`EngineConfig::validate`] rejects all but the last; run it first for
    /// untrusted configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_memory(Arc::new(MemoryManager::new(config)), config.max_entities)
    }

    /// Creates a coordinator that reserves component storage from `memory`.
    ///
    /// # Panics
    ///
    /// Panics if `max_entities` is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn with_memory(memory: Arc<MemoryManager>, max_entities: usize) -> Self {
        tracing::debug!(max_entities, "coordinator created");
        Self {
            memory,
            registry: RwLock::new(Registry::default()),
            entities: Mutex::new(EntityTable::new(max_entities)),
        }
    }

    /// Returns the memory manager backing component storage.
    #[must_use]
    pub const fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    /// Maximum number of simultaneously alive entities.
    #[must_use]
    pub fn max_entities(&self) -> usize {
        self.entities.lock().capacity()
    }

    /// Number of currently alive entities.
    #[must_use]
    pub fn living_entity_count(&self) -> usize {
        self.entities.lock().living()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn registered_component_count(&self) -> usize {
        self.registry.read().arrays.len()
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with an empty signature.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityLimitExceeded`] when every ID is alive.
    pub fn create_entity(&self) -> EcsResult<Entity> {
        let entity = self.entities.lock().create()?;
        tracing::trace!(entity, "entity created");
        Ok(entity)
    }

    /// Destroys an entity, dropping its components and recycling its ID.
    ///
    /// Every registered array is notified, whether or not the entity ever
    /// held that component type. The entity stops counting as alive before
    /// the arrays are visited, so while this runs another thread may still
    /// see its values in [`Coordinator::component_count`] or
    /// [`Coordinator::with_components`]. Its ID is not handed out again until
    /// every array has dropped them.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`] for a dead or out-of-range ID. Nothing is
    /// modified in that case.
    pub fn destroy_entity(&self, entity: Entity) -> EcsResult<()> {
        // Dead from here on: adds fail and lookups miss, but the ID is not
        // reusable until every array has dropped its data.
        let signature = self.entities.lock().kill(entity)?;

        let arrays = self.registry.read().arrays.clone();
        for array in &arrays {
            array.entity_destroyed(entity);
        }

        self.entities.lock().release(entity);
        tracing::trace!(entity, components = signature.count(), "entity destroyed");
        Ok(())
    }

    /// Returns `true` if the entity is alive.
    #[must_use]
    pub fn is_entity_alive(&self, entity: Entity) -> bool {
        self.entities.lock().is_alive(entity)
    }

    /// Returns a copy of the entity's signature.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotAlive`] if the entity is not alive.
    pub fn get_signature(&self, entity: Entity) -> EcsResult<Signature> {
        self.entities
            .lock()
            .signature(entity)
            .copied()
            .ok_or(EcsError::EntityNotAlive(entity))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers `T`, assigning it the next component type index.
    ///
    /// The array's storage budget (`size_of::<T>() * max_entities`) is
    /// reserved from the arena now and held for the coordinator's lifetime.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateRegistration`] if `T` is already registered.
    /// - [`EcsError::TooManyComponentTypes`] past 256 types.
    /// - [`EcsError::Memory`] if the arena is exhausted.
    pub fn register_component<T: Component>(&self) -> EcsResult<ComponentType> {
        let name = type_name::<T>();
        let mut registry = self.registry.write();

        if registry.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(EcsError::DuplicateRegistration(name));
        }
        let Ok(ty) = ComponentType::try_from(registry.arrays.len()) else {
            return Err(EcsError::TooManyComponentTypes {
                name,
                max: MAX_COMPONENTS,
            });
        };

        let capacity = self.max_entities();
        let array: SharedArray<T> =
            Arc::new(Mutex::new(ComponentArray::reserve_in(&self.memory, capacity)?));

        registry.arrays.push(array.clone());
        registry.by_type.insert(
            TypeId::of::<T>(),
            RegisteredComponent { ty, storage: array },
        );

        tracing::debug!(component = name, ty, "component registered");
        Ok(ty)
    }

    /// Returns the index assigned to `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredType`] if `T` was never registered.
    pub fn component_type<T: Component>(&self) -> EcsResult<ComponentType> {
        self.registry
            .read()
            .by_type
            .get(&TypeId::of::<T>())
            .map(|entry| entry.ty)
            .ok_or(EcsError::UnregisteredType(type_name::<T>()))
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attaches `value` to `entity` and sets its signature bit.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredType`] if `T` was never registered.
    /// - [`EcsError::EntityNotAlive`] if the entity is not alive.
    /// - [`EcsError::DuplicateComponent`] if the entity already has a `T`;
    ///   the existing value is left untouched.
    pub fn add_component<T: Component>(&self, entity: Entity, value: T) -> EcsResult<()> {
        let (ty, storage) = self.storage::<T>()?;
        let mut array = storage.lock();
        let mut entities = self.entities.lock();

        let signature = entities.signature_mut(entity)?;
        array.insert(entity, value)?;
        signature.set(ty);
        Ok(())
    }

    /// Detaches and returns `entity`'s `T`, clearing its signature bit.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredType`] if `T` was never registered.
    /// - [`EcsError::EntityNotAlive`] if the entity is not alive.
    /// - [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn remove_component<T: Component>(&self, entity: Entity) -> EcsResult<T> {
        let (ty, storage) = self.storage::<T>()?;
        let mut array = storage.lock();
        let mut entities = self.entities.lock();

        let signature = entities.signature_mut(entity)?;
        let value = array.remove(entity)?;
        signature.clear(ty);
        Ok(value)
    }

    /// Returns a copy of `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredType`] if `T` was never registered.
    /// - [`EcsError::EntityNotAlive`] if the entity is not alive.
    /// - [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn get_component<T: Component + Clone>(&self, entity: Entity) -> EcsResult<T> {
        self.with_component(entity, |value: &mut T| value.clone())
    }

    /// Runs `f` on `entity`'s `T` in place and returns its result.
    ///
    /// `f` runs with `T`'s array lock held and must not call back into the
    /// coordinator; copy what it needs out first.
    ///
    /// # Errors
    ///
    /// Same as [`Coordinator::get_component`].
    pub fn with_component<T: Component, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&mut T) -> R,
    ) -> EcsResult<R> {
        let (_, storage) = self.storage::<T>()?;
        let mut array = storage.lock();

        if !self.entities.lock().is_alive(entity) {
            return Err(EcsError::EntityNotAlive(entity));
        }
        let value = array.get_mut(entity)?;
        Ok(f(value))
    }

    /// Runs `f` over every stored `T` under a single lock.
    ///
    /// Same restriction as [`Coordinator::with_component`]: `f` must not call
    /// back into the coordinator.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredType`] if `T` was never registered.
    pub fn with_components<T: Component, R>(
        &self,
        f: impl FnOnce(&mut ComponentView<'_, T>) -> R,
    ) -> EcsResult<R> {
        let (_, storage) = self.storage::<T>()?;
        let mut array = storage.lock();
        let mut view = ComponentView { array: &mut *array };
        Ok(f(&mut view))
    }

    /// Returns `true` if `entity` is alive and holds a `T`.
    ///
    /// Unregistered types are simply reported as absent.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let Ok(ty) = self.component_type::<T>() else {
            return false;
        };
        self.entities
            .lock()
            .signature(entity)
            .is_some_and(|signature| signature.test(ty))
    }

    /// Number of stored `T` values.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredType`] if `T` was never registered.
    pub fn component_count<T: Component>(&self) -> EcsResult<usize> {
        let (_, storage) = self.storage::<T>()?;
        let count = storage.lock().len();
        Ok(count)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Builds the signature with one bit per member of `Q`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredType`] naming the first unregistered member.
    pub fn signature_of<Q: ComponentSet>(&self) -> EcsResult<Signature> {
        let registry = self.registry.read();
        let mut required = Signature::new();
        let mut missing = None;

        Q::visit_types(&mut |id, name| match registry.by_type.get(&id) {
            Some(entry) => required.set(entry.ty),
            None => {
                missing.get_or_insert(name);
            }
        });

        match missing {
            Some(name) => Err(EcsError::UnregisteredType(name)),
            None => Ok(required),
        }
    }

    /// Returns every alive entity holding all components in `Q`.
    ///
    /// Callers must not depend on the order of the result.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredType`] if a member of `Q` was never registered.
    pub fn entities_with<Q: ComponentSet>(&self) -> EcsResult<Vec<Entity>> {
        let required = self.signature_of::<Q>()?;
        Ok(self.entities_matching(&required))
    }

    /// Returns every alive entity whose signature is a superset of `required`.
    #[must_use]
    pub fn entities_matching(&self, required: &Signature) -> Vec<Entity> {
        self.entities
            .lock()
            .iter_alive()
            .filter(|(_, signature)| signature.contains(required))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Looks up `T`'s array, releasing the registry lock before returning.
    fn storage<T: Component>(&self) -> EcsResult<(ComponentType, SharedArray<T>)> {
        let registry = self.registry.read();
        let entry = registry
            .by_type
            .get(&TypeId::of::<T>())
            .ok_or(EcsError::UnregisteredType(type_name::<T>()))?;

        let storage = Arc::clone(&entry.storage)
            .downcast::<Mutex<ComponentArray<T>>>()
            .map_err(|_| EcsError::UnregisteredType(type_name::<T>()))?;
        Ok((entry.ty, storage))
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let living = self.entities.get_mut().living();
        tracing::debug!(living, "coordinator torn down");

        // Sole owner of the memory: release it along with the arrays.
        if Arc::strong_count(&self.memory) == 1 {
            self.memory.shutdown();
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("living", &self.living_entity_count())
            .field("components", &self.registered_component_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
        dz: f32,
    }

    fn coordinator() -> Coordinator {
        let coordinator = Coordinator::new(&EngineConfig {
            arena_bytes: 1024 * 1024,
            max_entities: 64,
            ..EngineConfig::default()
        });
        coordinator.register_component::<Position>().unwrap();
        coordinator.register_component::<Velocity>().unwrap();
        coordinator
    }

    #[test]
    fn test_register_assigns_sequential_types() {
        let coordinator = coordinator();
        assert_eq!(coordinator.component_type::<Position>().unwrap(), 0);
        assert_eq!(coordinator.component_type::<Velocity>().unwrap(), 1);
        assert_eq!(coordinator.registered_component_count(), 2);
    }

    #[test]
    fn test_duplicate_registration() {
        let coordinator = coordinator();
        assert!(matches!(
            coordinator.register_component::<Position>(),
            Err(EcsError::DuplicateRegistration(_))
        ));
        assert_eq!(coordinator.registered_component_count(), 2);
    }

    #[test]
    fn test_unregistered_type() {
        let coordinator = coordinator();
        let e = coordinator.create_entity().unwrap();
        assert!(matches!(
            coordinator.add_component(e, 5u8),
            Err(EcsError::UnregisteredType(_))
        ));
        assert!(!coordinator.has_component::<u8>(e));
        assert!(coordinator.entities_with::<(Position, u8)>().is_err());
    }

    #[test]
    fn test_add_get_remove() {
        let coordinator = coordinator();
        let e = coordinator.create_entity().unwrap();
        assert!(coordinator.get_signature(e).unwrap().is_empty());

        coordinator
            .add_component(e, Position { x: 1.0, y: 2.0, z: 3.0 })
            .unwrap();
        assert!(coordinator.has_component::<Position>(e));
        assert!(coordinator.get_signature(e).unwrap().test(0));

        coordinator
            .with_component::<Position, _>(e, |p| p.x = 10.0)
            .unwrap();
        assert!((coordinator.get_component::<Position>(e).unwrap().x - 10.0).abs() < f32::EPSILON);

        let removed = coordinator.remove_component::<Position>(e).unwrap();
        assert!((removed.x - 10.0).abs() < f32::EPSILON);
        assert!(!coordinator.has_component::<Position>(e));
        assert!(coordinator.get_signature(e).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_component_keeps_value() {
        let coordinator = coordinator();
        let e = coordinator.create_entity().unwrap();
        coordinator
            .add_component(e, Velocity { dx: 1.0, dy: 0.0, dz: 0.0 })
            .unwrap();

        let err = coordinator
            .add_component(e, Velocity { dx: 9.0, dy: 9.0, dz: 9.0 })
            .unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert!(!err.is_fatal());
        assert_eq!(
            coordinator.get_component::<Velocity>(e).unwrap(),
            Velocity { dx: 1.0, dy: 0.0, dz: 0.0 }
        );
        assert_eq!(coordinator.component_count::<Velocity>().unwrap(), 1);
    }

    #[test]
    fn test_missing_component() {
        let coordinator = coordinator();
        let e = coordinator.create_entity().unwrap();
        assert!(matches!(
            coordinator.remove_component::<Position>(e),
            Err(EcsError::MissingComponent { .. })
        ));
        assert!(matches!(
            coordinator.get_component::<Position>(e),
            Err(EcsError::MissingComponent { .. })
        ));
    }

    #[test]
    fn test_destroy_drops_components() {
        let coordinator = coordinator();
        let e = coordinator.create_entity().unwrap();
        coordinator.add_component(e, Position::default()).unwrap();

        coordinator.destroy_entity(e).unwrap();
        assert!(!coordinator.is_entity_alive(e));
        assert_eq!(coordinator.component_count::<Position>().unwrap(), 0);
        assert_eq!(
            coordinator.destroy_entity(e),
            Err(EcsError::EntityNotAlive(e))
        );
        assert!(matches!(
            coordinator.add_component(e, Position::default()),
            Err(EcsError::EntityNotAlive(_))
        ));
    }

    #[test]
    fn test_entity_limit() {
        let coordinator = Coordinator::new(&EngineConfig {
            arena_bytes: 4096,
            max_entities: 2,
            ..EngineConfig::default()
        });
        let _ = coordinator.create_entity().unwrap();
        let _ = coordinator.create_entity().unwrap();

        let err = coordinator.create_entity().unwrap_err();
        assert_eq!(err, EcsError::EntityLimitExceeded { max: 2 });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_with_component() {
        let coordinator = coordinator();
        let e = coordinator.create_entity().unwrap();
        coordinator.add_component(e, Position::default()).unwrap();

        let y = coordinator
            .with_component::<Position, _>(e, |p| {
                p.y = 4.0;
                p.y * 2.0
            })
            .unwrap();
        assert!((y - 8.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_two_reads_of_same_type() {
        let coordinator = coordinator();
        let a = coordinator.create_entity().unwrap();
        let b = coordinator.create_entity().unwrap();
        coordinator.add_component(a, Position { x: 1.0, y: 0.0, z: 0.0 }).unwrap();
        coordinator.add_component(b, Position { x: 2.0, y: 0.0, z: 0.0 }).unwrap();

        let first = coordinator.get_component::<Position>(a).unwrap();
        let second = coordinator.get_component::<Position>(b).unwrap();
        assert!((first.x + second.x - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_destroy_after_reading_component() {
        let coordinator = coordinator();
        let target = coordinator.create_entity().unwrap();
        let victim = coordinator.create_entity().unwrap();
        coordinator.add_component(target, Velocity::default()).unwrap();
        coordinator.add_component(victim, Velocity::default()).unwrap();

        let velocity = coordinator.get_component::<Velocity>(target).unwrap();
        if velocity.dx <= 0.0 {
            coordinator.destroy_entity(victim).unwrap();
        }
        assert!(!coordinator.is_entity_alive(victim));
        assert_eq!(coordinator.component_count::<Velocity>().unwrap(), 1);
    }

    #[test]
    fn test_with_components_spans_entities() {
        let coordinator = coordinator();
        let entities: Vec<Entity> = (0..4).map(|_| coordinator.create_entity().unwrap()).collect();
        for &e in &entities {
            coordinator.add_component(e, Position::default()).unwrap();
        }

        let total = coordinator
            .with_components::<Position, _>(|view| {
                for (_, p) in view.iter_mut() {
                    p.x = 1.5;
                }
                let (a, b) = (entities[0], entities[3]);
                view.get(a).unwrap().x + view.get(b).unwrap().x
            })
            .unwrap();

        assert!((total - 3.0).abs() < f32::EPSILON);
        assert!((coordinator.get_component::<Position>(entities[2]).unwrap().x - 1.5).abs() < f32::EPSILON);
        assert!(coordinator.with_components::<u64, _>(|view| view.len()).is_err());
    }

    #[test]
    fn test_arena_exhaustion_is_fatal() {
        let coordinator = Coordinator::new(&EngineConfig {
            arena_bytes: 256,
            max_entities: 64,
            ..EngineConfig::default()
        });
        let err = coordinator.register_component::<[u64; 4]>().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(coordinator.registered_component_count(), 0);
    }
}
