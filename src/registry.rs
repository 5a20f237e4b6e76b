//! Component registry: run-time, type-keyed SlotMap columns indexed by entity.
//!
//! Entities are generational keys from the `slotmap` crate and double as the
//! external id of every column entry, so a component handle left behind by a
//! despawned entity never resolves for a later entity that reuses the slot.

use crate::config::StorageConfig;
use crate::error::{ConfigError, RegistryError};
use crate::memory::{default_resource, SharedResource};
use crate::slot_map::SlotMap;
use core::any::{Any, TypeId};
use hashbrown::HashMap;

slotmap::new_key_type! {
    /// A live or retired entity. Retired keys never compare equal to new ones.
    pub struct Entity;
}

/// Operations the registry performs on a column without knowing its type.
pub trait Column: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Erase the entry at `handle` if it belongs to `entity`.
    fn erase_entity(&self, handle: usize, entity: Entity) -> bool;

    fn contains_entity(&self, handle: usize, entity: Entity) -> bool;

    /// Number of live entries in the column.
    fn live_count(&self) -> usize;

    fn is_read_only(&self) -> bool;

    fn type_name(&self) -> &'static str;
}

impl<T: Send + Sync + 'static> Column for SlotMap<T, Entity> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn erase_entity(&self, handle: usize, entity: Entity) -> bool {
        self.erase(handle, &entity).is_some()
    }

    fn contains_entity(&self, handle: usize, entity: Entity) -> bool {
        self.contains(handle, &entity)
    }

    fn live_count(&self) -> usize {
        self.size()
    }

    fn is_read_only(&self) -> bool {
        SlotMap::is_read_only(self)
    }

    fn type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }
}

#[derive(Default)]
struct EntityRecord {
    /// Column handle of each component the entity owns.
    components: HashMap<TypeId, usize>,
}

/// Entities plus one [`SlotMap`] column per registered component type.
///
/// ```
/// use segtable::ComponentRegistry;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Position(f32, f32);
///
/// let mut reg = ComponentRegistry::new();
/// let e = reg.spawn();
/// reg.insert(e, Position(1.0, 2.0)).unwrap();
/// assert_eq!(reg.get::<Position>(e), Some(Position(1.0, 2.0)));
///
/// assert!(reg.despawn(e));
/// assert_eq!(reg.len_of::<Position>(), 0);
/// ```
pub struct ComponentRegistry {
    config: StorageConfig,
    resource: SharedResource,
    entities: slotmap::SlotMap<Entity, EntityRecord>,
    columns: HashMap<TypeId, Box<dyn Column>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            config: StorageConfig::new(),
            resource: default_resource(),
            entities: slotmap::SlotMap::with_key(),
            columns: HashMap::new(),
        }
    }

    /// Every column created later uses `config`.
    pub fn with_config(config: StorageConfig) -> Result<Self, ConfigError> {
        Self::with_config_in(config, default_resource())
    }

    pub fn with_config_in(
        config: StorageConfig,
        resource: SharedResource,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            resource,
            entities: slotmap::SlotMap::with_key(),
            columns: HashMap::new(),
        })
    }

    pub fn spawn(&mut self) -> Entity {
        self.entities.insert(EntityRecord::default())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Retire `entity` and erase each of its components.
    ///
    /// A component whose column is read-only stays in that column, unreachable:
    /// its id is the retired entity.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let Some(record) = self.entities.remove(entity) else {
            return false;
        };
        for (type_id, handle) in record.components {
            if let Some(column) = self.columns.get(&type_id) {
                if !column.erase_entity(handle, entity) {
                    log::warn!(
                        "registry: could not erase `{}` of despawned entity {entity:?}",
                        column.type_name()
                    );
                }
            }
        }
        true
    }

    /// Create the column for `T`. Returns `false` if it already existed.
    pub fn register<T: Send + Sync + 'static>(&mut self) -> Result<bool, RegistryError> {
        let type_id = TypeId::of::<T>();
        if self.columns.contains_key(&type_id) {
            return Ok(false);
        }
        let column: SlotMap<T, Entity> =
            SlotMap::with_config_in(self.config, self.resource.clone())?;
        log::debug!("registry: registered column `{}`", core::any::type_name::<T>());
        self.columns.insert(type_id, Box::new(column));
        Ok(true)
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.columns.contains_key(&TypeId::of::<T>())
    }

    /// Attach `value` to `entity`, registering `T` on first use.
    ///
    /// If the entity already has a `T` it is replaced and the old value
    /// returned.
    pub fn insert<T: Send + Sync + 'static>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<Option<T>, RegistryError> {
        if !self.is_alive(entity) {
            return Err(RegistryError::DeadEntity);
        }
        self.register::<T>()?;
        let type_id = TypeId::of::<T>();
        let column = self
            .columns
            .get(&type_id)
            .and_then(|c| c.as_any().downcast_ref::<SlotMap<T, Entity>>())
            .ok_or(RegistryError::Rejected(core::any::type_name::<T>()))?;
        if column.is_read_only() {
            return Err(RegistryError::Rejected(core::any::type_name::<T>()));
        }
        let record = self
            .entities
            .get_mut(entity)
            .ok_or(RegistryError::DeadEntity)?;
        if let Some(&handle) = record.components.get(&type_id) {
            if column.contains(handle, &entity) {
                return column
                    .update(handle, &entity, |slot| core::mem::replace(slot, value))
                    .map(Some)
                    .ok_or(RegistryError::Rejected(core::any::type_name::<T>()));
            }
            // erased behind the registry's back through the typed column
            log::debug!(
                "registry: dropping stale `{}` handle {handle} of {entity:?}",
                core::any::type_name::<T>()
            );
            record.components.remove(&type_id);
        }
        let handle = column
            .add(entity, value)
            .ok_or(RegistryError::Rejected(core::any::type_name::<T>()))?;
        record.components.insert(type_id, handle);
        Ok(None)
    }

    fn handle_of<T: 'static>(&self, entity: Entity) -> Option<usize> {
        self.entities
            .get(entity)?
            .components
            .get(&TypeId::of::<T>())
            .copied()
    }

    pub fn get<T: Clone + Send + Sync + 'static>(&self, entity: Entity) -> Option<T> {
        let handle = self.handle_of::<T>(entity)?;
        self.column::<T>()?.at(handle, &entity)
    }

    pub fn with<T: Send + Sync + 'static, R>(
        &self,
        entity: Entity,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let handle = self.handle_of::<T>(entity)?;
        self.column::<T>()?.with(handle, &entity, f)
    }

    /// Overwrite an existing component. `false` if the entity has no `T`.
    pub fn set<T: Send + Sync + 'static>(&self, entity: Entity, value: T) -> bool {
        match (self.handle_of::<T>(entity), self.column::<T>()) {
            (Some(handle), Some(column)) => column.set(handle, &entity, value),
            _ => false,
        }
    }

    /// Detach and return the entity's `T`.
    ///
    /// A record whose handle no longer resolves is dropped as well. A read-only
    /// column keeps both the value and the record.
    pub fn remove<T: Send + Sync + 'static>(&mut self, entity: Entity) -> Option<T> {
        let handle = self.handle_of::<T>(entity)?;
        let column = self.column::<T>()?;
        let value = column.erase(handle, &entity);
        if value.is_some() || !column.contains(handle, &entity) {
            if let Some(record) = self.entities.get_mut(entity) {
                record.components.remove(&TypeId::of::<T>());
            }
        }
        value
    }

    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        match (self.handle_of::<T>(entity), self.columns.get(&TypeId::of::<T>())) {
            (Some(handle), Some(column)) => column.contains_entity(handle, entity),
            _ => false,
        }
    }

    /// Number of live `T` components; 0 if `T` was never registered.
    pub fn len_of<T: 'static>(&self) -> usize {
        self.columns
            .get(&TypeId::of::<T>())
            .map_or(0, |c| c.live_count())
    }

    /// Typed access to the column for `T`.
    pub fn column<T: Send + Sync + 'static>(&self) -> Option<&SlotMap<T, Entity>> {
        self.columns
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref()
    }

    pub fn column_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut SlotMap<T, Entity>> {
        self.columns
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut()
    }

    /// Names of the registered component types, in no particular order.
    pub fn component_types(&self) -> Vec<&'static str> {
        self.columns.values().map(|c| c.type_name()).collect()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("entities", &self.entities.len())
            .field("columns", &self.columns.len())
            .finish()
    }
}
