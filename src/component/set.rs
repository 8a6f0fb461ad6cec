use crate::component::{Component, ComponentId, ComponentMeta};
use bitvec::order::Lsb0;
use bitvec::vec::BitVec;
use smallvec::SmallVec;
use std::fmt;

pub const MAX_INLINE_COMPONENTS: usize = 16;

/// A set of component ids. The signature of an archetype or a query.
///
/// Trailing zero bits are never stored, so two sets compare (and hash) equal
/// exactly when they contain the same ids.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct ComponentSet {
    bits: BitVec<u64, Lsb0>,
}

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` to the set. Returns `true` if it was not present.
    pub fn insert(&mut self, id: ComponentId) -> bool {
        if !id.is_valid() {
            return false;
        }
        let index = id.index();
        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }
        !self.bits.replace(index, true)
    }

    /// Removes `id` from the set. Returns `true` if it was present.
    pub fn erase(&mut self, id: ComponentId) -> bool {
        let index = id.index();
        if !id.is_valid() || index >= self.bits.len() {
            return false;
        }
        let was_present = self.bits.replace(index, false);
        self.trim();
        was_present
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        id.is_valid() && self.bits.get(id.index()).map_or(false, |bit| *bit)
    }

    pub fn insert_type<C: Component>(&mut self) -> bool {
        self.insert(ComponentId::of::<C>())
    }

    /// Unregistered types are never contained.
    pub fn contains_type<C: Component>(&self) -> bool {
        ComponentId::lookup::<C>().map_or(false, |id| self.contains(id))
    }

    /// Returns a copy of the set with `id` added.
    pub fn with(&self, id: ComponentId) -> Self {
        let mut set = self.clone();
        set.insert(id);
        set
    }

    /// Returns a copy of the set with `id` removed.
    pub fn without(&self, id: ComponentId) -> Self {
        let mut set = self.clone();
        set.erase(id);
        set
    }

    /// Returns `true` if every id of `other` is in `self`.
    pub fn is_superset(&self, other: &ComponentSet) -> bool {
        other.bits.len() <= self.bits.len() && other.bits.iter_ones().all(|i| self.bits[i])
    }

    pub fn is_disjoint(&self, other: &ComponentSet) -> bool {
        !other.bits.iter_ones().any(|i| self.bits.get(i).map_or(false, |bit| *bit))
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn clear(&mut self) {
        self.bits.clear();
    }

    /// Iterates ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.bits.iter_ones().map(ComponentId::from_index)
    }

    fn trim(&mut self) {
        let len = self.bits.last_one().map_or(0, |last| last + 1);
        self.bits.truncate(len);
    }
}

impl FromIterator<ComponentId> for ComponentSet {
    fn from_iter<T: IntoIterator<Item = ComponentId>>(iter: T) -> Self {
        let mut set = ComponentSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl fmt::Debug for ComponentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Component metadata in insertion order, paired with the matching [`ComponentSet`].
///
/// The set and the metadata list are only mutated together.
#[derive(Clone, Default)]
pub struct ComponentMetaSet {
    set: ComponentSet,
    metas: SmallVec<[&'static ComponentMeta; MAX_INLINE_COMPONENTS]>,
}

impl ComponentMetaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the component. Returns `false` if it was already present.
    pub fn insert(&mut self, meta: &'static ComponentMeta) -> bool {
        if !self.set.insert(meta.id) {
            return false;
        }
        self.metas.push(meta);
        true
    }

    pub fn insert_type<C: Component>(&mut self) -> bool {
        self.insert(ComponentMeta::of::<C>())
    }

    /// Removes the component, preserving the order of the rest.
    pub fn erase(&mut self, id: ComponentId) -> Option<&'static ComponentMeta> {
        if !self.set.erase(id) {
            return None;
        }
        let position = self.position(id)?;
        Some(self.metas.remove(position))
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.set.contains(id)
    }

    pub fn get(&self, id: ComponentId) -> Option<&'static ComponentMeta> {
        self.position(id).map(|i| self.metas[i])
    }

    /// Returns the insertion index of `id`.
    pub fn position(&self, id: ComponentId) -> Option<usize> {
        self.metas.iter().position(|meta| meta.id == id)
    }

    pub fn set(&self) -> &ComponentSet {
        &self.set
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'static ComponentMeta> + '_ {
        self.metas.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    pub fn clear(&mut self) {
        self.set.clear();
        self.metas.clear();
    }
}

impl fmt::Debug for ComponentMetaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.metas.iter().map(|meta| meta.name))
            .finish()
    }
}
