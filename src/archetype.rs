pub mod chunk;

use crate::bundle::Bundle;
use crate::component::set::{ComponentMetaSet, ComponentSet};
use crate::component::{Component, ComponentId, ComponentMeta};
use crate::error::CapacityError;
use crate::{Entity, HashMap};
use chunk::Chunk;
use std::fmt;
use std::mem;

/// An archetype identifier. Index of the archetype within its registry.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// The archetype of entities without components.
    pub const EMPTY: Self = ArchetypeId(0);

    pub(crate) fn new(index: usize) -> Self {
        ArchetypeId(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeId({})", self.0)
    }
}

/// A (chunk, row) pair inside one archetype.
pub(crate) type Slot = (usize, usize);

/// All entities that have exactly the same set of components.
///
/// Rows are packed: every chunk before the last occupied one is full, and
/// removal moves the archetype's last row into the hole.
pub struct Archetype {
    id: ArchetypeId,
    metas: ComponentMetaSet,
    columns_by_component: HashMap<ComponentId, usize>,
    chunks: Vec<Chunk>,
    chunk_capacity: usize,
    len: usize,
    add_edges: HashMap<ComponentId, ArchetypeId>,
    remove_edges: HashMap<ComponentId, ArchetypeId>,
}

impl Archetype {
    pub(crate) fn new(id: ArchetypeId, metas: ComponentMetaSet, chunk_size_in_bytes: usize) -> Self {
        let row_size = metas.iter().map(|meta| meta.size()).sum::<usize>() + mem::size_of::<Entity>();
        let chunk_capacity = (chunk_size_in_bytes / row_size).max(1);

        let columns_by_component = metas
            .iter()
            .enumerate()
            .map(|(i, meta)| (meta.id, i))
            .collect();

        Archetype {
            id,
            metas,
            columns_by_component,
            chunks: Vec::new(),
            chunk_capacity,
            len: 0,
            add_edges: Default::default(),
            remove_edges: Default::default(),
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    pub fn component_set(&self) -> &ComponentSet {
        self.metas.set()
    }

    pub fn metas(&self) -> &ComponentMetaSet {
        &self.metas
    }

    /// Returns the number of entities in the archetype.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunks in row order. Trailing chunks may be empty.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn has<C: Component>(&self) -> bool {
        ComponentId::lookup::<C>().map_or(false, |id| self.has_component(id))
    }

    pub fn has_component(&self, id: ComponentId) -> bool {
        self.metas.contains(id)
    }

    #[inline]
    pub(crate) fn column_index(&self, id: ComponentId) -> Option<usize> {
        self.columns_by_component.get(&id).copied()
    }

    /// Iterates all entities of the archetype.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.entities().iter().copied())
    }

    pub(crate) fn add_edge(&self, id: ComponentId) -> Option<ArchetypeId> {
        self.add_edges.get(&id).copied()
    }

    pub(crate) fn remove_edge(&self, id: ComponentId) -> Option<ArchetypeId> {
        self.remove_edges.get(&id).copied()
    }

    pub(crate) fn set_add_edge(&mut self, id: ComponentId, target: ArchetypeId) {
        self.add_edges.insert(id, target);
    }

    pub(crate) fn set_remove_edge(&mut self, id: ComponentId, target: ArchetypeId) {
        self.remove_edges.insert(id, target);
    }

    /// Pointer to the value of component `id` at `slot`, if the archetype has it and the slot is live.
    pub(crate) fn component_ptr(&self, id: ComponentId, (chunk, row): Slot) -> Option<*mut u8> {
        let column = self.column_index(id)?;
        let chunk = self.chunks.get(chunk)?;
        (row < chunk.len()).then(|| unsafe { chunk.slot(column, row) })
    }

    /// Returns the entity stored at `slot`.
    pub fn entity_at(&self, (chunk, row): Slot) -> Option<Entity> {
        self.chunks.get(chunk)?.entities().get(row).copied()
    }

    /// Finds the slot for the next row, allocating a chunk if all are full.
    fn reserve_slot(&mut self) -> Result<Slot, CapacityError> {
        let chunk = self.len / self.chunk_capacity;
        if chunk == self.chunks.len() {
            let new_chunk = Chunk::new(&self.metas, self.chunk_capacity)?;
            tracing::debug!(
                archetype = self.id.0,
                chunk,
                capacity = self.chunk_capacity,
                "allocated chunk"
            );
            self.chunks.push(new_chunk);
        }
        Ok((chunk, self.len % self.chunk_capacity))
    }

    /// Makes the row at `slot` live. Every column of the row must be initialized.
    fn commit(&mut self, (chunk, row): Slot, entity: Entity) {
        debug_assert_eq!(self.chunks[chunk].len(), row);
        self.chunks[chunk].push_entity(entity);
        self.len += 1;
    }

    /// Moves the components of `bundle` into a new row owned by `entity`.
    ///
    /// The bundle must contain exactly the components of this archetype.
    /// On failure the bundle is dropped and the archetype is unchanged.
    pub(crate) fn push<B: Bundle>(&mut self, entity: Entity, bundle: B) -> Result<Slot, CapacityError> {
        let slot = self.reserve_slot()?;
        let (chunk_index, row) = slot;
        let columns = &self.columns_by_component;
        let chunk = &self.chunks[chunk_index];

        unsafe {
            bundle.take(&mut |meta: &'static ComponentMeta, src: *mut u8| {
                match columns.get(&meta.id) {
                    Some(&column) => (meta.move_construct)(chunk.slot(column, row), src),
                    None => {
                        debug_assert!(false, "{} is not part of the archetype", meta.name);
                        (meta.destruct)(src);
                    }
                }
            });
        }

        self.commit(slot, entity);
        Ok(slot)
    }

    /// Removes the row at `slot`, dropping its values. Returns the entity that was moved
    /// into `slot` to fill the hole, if any.
    pub(crate) fn remove(&mut self, slot: Slot) -> Option<Entity> {
        unsafe { self.swap_remove(slot, true) }
    }

    /// Safety: if `drop_values` is `false`, every value of the row must already be moved out.
    unsafe fn swap_remove(&mut self, (chunk, row): Slot, drop_values: bool) -> Option<Entity> {
        debug_assert!(row < self.chunks[chunk].len());

        let last = self.len - 1;
        let last_slot = (last / self.chunk_capacity, last % self.chunk_capacity);
        let is_last = last_slot == (chunk, row);

        for (column, meta) in self.metas.iter().enumerate() {
            let dst = self.chunks[chunk].slot(column, row);
            if drop_values && meta.needs_drop {
                (meta.destruct)(dst);
            }
            if !is_last {
                let src = self.chunks[last_slot.0].slot(column, last_slot.1);
                (meta.move_construct)(dst, src);
            }
        }

        self.len -= 1;
        let moved = self.chunks[last_slot.0].pop_entity()?;
        if is_last {
            return None;
        }
        self.chunks[chunk].set_entity(row, moved);
        Some(moved)
    }

    /// Moves the row at `slot` into `target`.
    ///
    /// Components present in both archetypes are moved; `added` supplies the value of a
    /// component only `target` has; `removed` receives each component only this archetype
    /// has and must move it out or destroy it. Returns the new slot in `target` and the
    /// entity that filled the hole in this archetype.
    ///
    /// If `target` cannot grow, nothing is moved and `removed` is never called.
    ///
    /// Safety: `added` must point to a valid value of its component, which is moved out.
    pub(crate) unsafe fn migrate(
        &mut self,
        slot: Slot,
        target: &mut Archetype,
        added: Option<(&'static ComponentMeta, *mut u8)>,
        removed: &mut dyn FnMut(&'static ComponentMeta, *mut u8),
    ) -> Result<(Slot, Option<Entity>), CapacityError> {
        let (chunk, row) = slot;
        let entity = self.chunks[chunk].entities()[row];
        let target_slot = target.reserve_slot()?;
        let target_chunk = &target.chunks[target_slot.0];

        for (column, meta) in self.metas.iter().enumerate() {
            let src = self.chunks[chunk].slot(column, row);
            match target.columns_by_component.get(&meta.id) {
                Some(&target_column) => {
                    (meta.move_construct)(target_chunk.slot(target_column, target_slot.1), src)
                }
                None => removed(meta, src),
            }
        }

        if let Some((meta, src)) = added {
            match target.columns_by_component.get(&meta.id) {
                Some(&target_column) => {
                    (meta.move_construct)(target_chunk.slot(target_column, target_slot.1), src)
                }
                None => (meta.destruct)(src),
            }
        }

        target.commit(target_slot, entity);
        let moved = self.swap_remove(slot, false);
        Ok((target_slot, moved))
    }

    /// Drops all entities' values. Chunks are kept for reuse.
    pub(crate) fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.clear();
        }
        self.len = 0;
    }

    /// Releases chunks that hold no rows.
    pub(crate) fn shrink_to_fit(&mut self) {
        let needed = (self.len + self.chunk_capacity - 1) / self.chunk_capacity;
        self.chunks.truncate(needed);
        self.chunks.shrink_to_fit();
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &self.metas)
            .field("len", &self.len)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}
