use crate::archetype::{Archetype, ArchetypeId};
use crate::bundle::Bundle;
use crate::component::set::{ComponentMetaSet, ComponentSet};
use crate::component::{Component, ComponentId, ComponentMeta};
use crate::config::RegistryConfig;
use crate::entry::{Entry, EntryMut};
use crate::error::{CapacityError, EntityError};
use crate::query::{Query, ReadOnlyQuery};
use crate::sparse::SparseMap;
use crate::view::{View, ViewMut};
use crate::{Entity, EntityLocation, HashMap};
use index_pool::IndexPool;
use std::any::{type_name, TypeId};
use std::fmt;
use std::mem::{ManuallyDrop, MaybeUninit};

/// A container of entities and their components.
///
/// Entities with the same set of components share an [`Archetype`]. Adding or
/// removing a component moves the entity to the archetype of its new set.
pub struct Registry {
    config: RegistryConfig,
    archetypes: Vec<Archetype>,
    archetype_by_set: HashMap<ComponentSet, ArchetypeId>,
    archetype_by_bundle: HashMap<TypeId, ArchetypeId>,
    indices: IndexPool,
    generations: Vec<u32>,
    locations: SparseMap<EntityLocation>,
}

impl Registry {
    /// Creates an empty `Registry` with the default configuration.
    pub fn new() -> Registry {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Registry {
        let mut registry = Registry {
            generations: Vec::with_capacity(config.initial_entity_capacity),
            locations: SparseMap::with_capacity(config.initial_entity_capacity),
            config,
            archetypes: Vec::new(),
            archetype_by_set: Default::default(),
            archetype_by_bundle: Default::default(),
            indices: IndexPool::new(),
        };
        let empty = registry.find_or_create_archetype(ComponentMetaSet::new());
        debug_assert_eq!(empty, ArchetypeId::EMPTY);
        registry
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn find_or_create_archetype(&mut self, metas: ComponentMetaSet) -> ArchetypeId {
        if let Some(&id) = self.archetype_by_set.get(metas.set()) {
            return id;
        }

        let id = ArchetypeId::new(self.archetypes.len());
        tracing::debug!(archetype = id.index(), components = ?metas, "created archetype");

        self.archetype_by_set.insert(metas.set().clone(), id);
        self.archetypes
            .push(Archetype::new(id, metas, self.config.chunk_size_in_bytes));
        id
    }

    fn bundle_archetype<B: Bundle>(&mut self) -> Result<ArchetypeId, EntityError> {
        let type_id = TypeId::of::<B>();
        if let Some(&id) = self.archetype_by_bundle.get(&type_id) {
            return Ok(id);
        }

        let mut metas = ComponentMetaSet::new();
        let mut duplicate = None;
        B::component_metas(&mut |meta| {
            if !metas.insert(meta) {
                duplicate.get_or_insert(meta.name);
            }
        });
        if let Some(name) = duplicate {
            return Err(EntityError::DuplicateComponent(name));
        }

        let id = self.find_or_create_archetype(metas);
        self.archetype_by_bundle.insert(type_id, id);
        Ok(id)
    }

    /// Target of adding `meta` to the entities of `source`.
    fn add_target(&mut self, source: ArchetypeId, meta: &'static ComponentMeta) -> ArchetypeId {
        if let Some(target) = self.archetypes[source.index()].add_edge(meta.id) {
            return target;
        }

        let mut metas = self.archetypes[source.index()].metas().clone();
        metas.insert(meta);
        let target = self.find_or_create_archetype(metas);

        self.archetypes[source.index()].set_add_edge(meta.id, target);
        self.archetypes[target.index()].set_remove_edge(meta.id, source);
        target
    }

    /// Target of removing `id` from the entities of `source`.
    fn remove_target(&mut self, source: ArchetypeId, id: ComponentId) -> ArchetypeId {
        if let Some(target) = self.archetypes[source.index()].remove_edge(id) {
            return target;
        }

        let mut metas = self.archetypes[source.index()].metas().clone();
        metas.erase(id);
        let target = self.find_or_create_archetype(metas);

        self.archetypes[source.index()].set_remove_edge(id, target);
        self.archetypes[target.index()].set_add_edge(id, source);
        target
    }

    fn allocate_entity(&mut self) -> Result<Entity, CapacityError> {
        let index = self.indices.new_id();
        if index >= Entity::NULL.index() as usize {
            let _ = self.indices.return_id(index);
            return Err(CapacityError::EntityIndices);
        }
        if index >= self.generations.len() {
            self.generations.resize(index + 1, 0);
        }
        Ok(Entity::new(index as u32, self.generations[index]))
    }

    /// Invalidates all handles to `index` and makes it available for reuse.
    fn free_index(&mut self, index: u32) {
        let slot = index as usize;
        match self.generations[slot].checked_add(1) {
            Some(generation) => {
                self.generations[slot] = generation;
                let returned = self.indices.return_id(slot);
                debug_assert!(returned.is_ok(), "index {} returned twice", index);
            }
            // Reusing the index would repeat a generation.
            None => tracing::debug!(index, "retired entity index"),
        }
    }

    /// Points the location of `moved`, if any, at `location`.
    fn relocate(&mut self, moved: Option<Entity>, location: EntityLocation) {
        if let Some(moved) = moved {
            if let Some(moved_location) = self.locations.get_mut(moved.index()) {
                *moved_location = location;
            }
        }
    }

    /// Creates a new entity with the components of `bundle` and returns its handle.
    ///
    /// # Examples
    /// ```
    /// use entity_store::Registry;
    ///
    /// struct Name(&'static str);
    /// struct Health(u32);
    ///
    /// let mut registry = Registry::new();
    /// let hero = registry.create((Name("hero"), Health(10))).unwrap();
    /// assert!(registry.has::<Health>(hero).unwrap());
    /// ```
    pub fn create<B: Bundle>(&mut self, bundle: B) -> Result<Entity, EntityError> {
        let archetype_id = self.bundle_archetype::<B>()?;
        let entity = self.allocate_entity()?;

        match self.archetypes[archetype_id.index()].push(entity, bundle) {
            Ok(slot) => {
                self.locations
                    .insert(entity.index(), EntityLocation::new(archetype_id, slot));
                Ok(entity)
            }
            Err(err) => {
                self.free_index(entity.index());
                Err(err.into())
            }
        }
    }

    /// Creates a new entity without components.
    pub fn create_empty(&mut self) -> Result<Entity, EntityError> {
        self.create(())
    }

    /// Destroys the entity and drops its components. Handles to it become stale.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), EntityError> {
        let location = self.location(entity)?;
        let moved = self.archetypes[location.archetype().index()].remove(location.slot());
        self.relocate(moved, location);
        self.locations.remove(entity.index());
        self.free_index(entity.index());
        Ok(())
    }

    /// Returns `true` if the handle refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.generations
            .get(entity.index() as usize)
            .map_or(false, |&generation| generation == entity.generation())
            && self.locations.contains_key(entity.index())
    }

    /// Returns where the components of the entity are stored.
    pub fn location(&self, entity: Entity) -> Result<EntityLocation, EntityError> {
        let generation = *self
            .generations
            .get(entity.index() as usize)
            .ok_or(EntityError::NotFound(entity))?;

        match self.locations.get(entity.index()) {
            Some(location) if generation == entity.generation() => Ok(*location),
            _ => {
                tracing::debug!(%entity, current = generation, "rejected stale handle");
                Err(EntityError::Stale(entity))
            }
        }
    }

    /// Moves the entity at `location` into `target`, then updates the locations.
    ///
    /// Safety: see [`Archetype::migrate`].
    unsafe fn migrate(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        target: ArchetypeId,
        added: Option<(&'static ComponentMeta, *mut u8)>,
        removed: &mut dyn FnMut(&'static ComponentMeta, *mut u8),
    ) -> Result<(), EntityError> {
        let source = location.archetype();
        let (source_archetype, target_archetype) =
            pair_mut(&mut self.archetypes, source.index(), target.index());

        let (slot, moved) =
            source_archetype.migrate(location.slot(), target_archetype, added, removed)?;
        tracing::trace!(%entity, from = source.index(), to = target.index(), "migrated entity");

        self.relocate(moved, location);
        self.locations
            .insert(entity.index(), EntityLocation::new(target, slot));
        Ok(())
    }

    /// Adds the component to the entity, replacing the current value if it already has one.
    /// On error the value is dropped and the entity is unchanged.
    pub fn add_component<C: Component>(&mut self, entity: Entity, value: C) -> Result<(), EntityError> {
        let location = self.location(entity)?;
        let meta = ComponentMeta::of::<C>();
        let mut value = ManuallyDrop::new(value);
        let src = &mut *value as *mut C as *mut u8;

        let source = location.archetype();
        if let Some(dst) = self.archetypes[source.index()].component_ptr(meta.id, location.slot()) {
            unsafe { (meta.move_assign)(dst, src) };
            return Ok(());
        }

        let target = self.add_target(source, meta);
        let result = unsafe {
            self.migrate(entity, location, target, Some((meta, src)), &mut |meta, ptr| {
                (meta.destruct)(ptr)
            })
        };
        if result.is_err() {
            unsafe { ManuallyDrop::drop(&mut value) };
        }
        result
    }

    /// Removes the component from the entity and returns it.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Result<C, EntityError> {
        let location = self.location(entity)?;
        let missing = || EntityError::MissingComponent {
            entity,
            component: type_name::<C>(),
        };

        let id = ComponentId::lookup::<C>().ok_or_else(missing)?;
        let source = location.archetype();
        if !self.archetypes[source.index()].has_component(id) {
            return Err(missing());
        }

        let target = self.remove_target(source, id);
        let mut out = MaybeUninit::<C>::uninit();
        let out_ptr = out.as_mut_ptr() as *mut u8;

        unsafe {
            self.migrate(entity, location, target, None, &mut |meta, src| {
                if meta.id == id {
                    (meta.move_construct)(out_ptr, src);
                } else {
                    (meta.destruct)(src);
                }
            })?;
            Ok(out.assume_init())
        }
    }

    /// Returns `true` if the entity has the component `C`.
    pub fn has<C: Component>(&self, entity: Entity) -> Result<bool, EntityError> {
        let location = self.location(entity)?;
        Ok(self.archetypes[location.archetype().index()].has::<C>())
    }

    /// Fetches the query items of the entity, e.g. `registry.get::<(&A, &B)>(entity)`.
    pub fn get<Q: ReadOnlyQuery>(&self, entity: Entity) -> Result<Q::Item<'_>, EntityError> {
        self.view::<Q>().get(entity)
    }

    /// Fetches the query items of the entity, allowing mutable access.
    pub fn get_mut<Q: Query>(&mut self, entity: Entity) -> Result<Q::Item<'_>, EntityError> {
        self.view_mut::<Q>().into_get(entity)
    }

    /// Returns an entry of the entity for repeated component access.
    pub fn entry(&self, entity: Entity) -> Result<Entry<'_>, EntityError> {
        let location = self.location(entity)?;
        Ok(Entry {
            archetype: &self.archetypes[location.archetype().index()],
            entity,
            location,
        })
    }

    /// Returns a mutable entry of the entity for repeated component access.
    pub fn entry_mut(&mut self, entity: Entity) -> Result<EntryMut<'_>, EntityError> {
        let location = self.location(entity)?;
        Ok(EntryMut {
            archetype: &mut self.archetypes[location.archetype().index()],
            entity,
            location,
        })
    }

    /// Returns a read-only view over the entities matching `Q`.
    ///
    /// Panics if `Q` names a component more than once with mutable access.
    pub fn view<Q: ReadOnlyQuery>(&self) -> View<'_, Q> {
        View::new(self)
    }

    /// Returns a mutable view over the entities matching `Q`.
    ///
    /// Panics if `Q` names a component more than once with mutable access.
    pub fn view_mut<Q: Query>(&mut self) -> ViewMut<'_, Q> {
        ViewMut::new(self)
    }

    /// Returns the component set of the entity.
    pub fn component_set(&self, entity: Entity) -> Result<&ComponentSet, EntityError> {
        let location = self.location(entity)?;
        Ok(self.archetypes[location.archetype().index()].component_set())
    }

    /// Returns the type names of the components of the entity.
    pub fn components_of(&self, entity: Entity) -> Result<Vec<&'static str>, EntityError> {
        let location = self.location(entity)?;
        Ok(self.archetypes[location.archetype().index()]
            .metas()
            .iter()
            .map(|meta| meta.name)
            .collect())
    }

    /// Iterates all live entities in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.locations
            .keys()
            .iter()
            .map(|&index| Entity::new(index, self.generations[index as usize]))
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Returns the number of archetypes, including the empty one.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// Destroys all entities. Archetypes and their chunks are kept.
    pub fn clear(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.clear();
        }
        let live = self.locations.keys().to_vec();
        self.locations.clear();
        for index in live {
            self.free_index(index);
        }
    }

    /// Releases chunks that hold no entities.
    pub fn shrink_to_fit(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.shrink_to_fit();
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.len())
            .field("archetypes", &self.archetypes)
            .finish()
    }
}

fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
