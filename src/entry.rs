use crate::archetype::Archetype;
use crate::component::{Component, ComponentId};
use crate::{Entity, EntityLocation};

/// A immutable entry of an entity in its archetype.
/// Provides convenient and faster access to entity components.
pub struct Entry<'a> {
    pub(crate) archetype: &'a Archetype,
    pub(crate) entity: Entity,
    pub(crate) location: EntityLocation,
}

impl<'a> Entry<'a> {
    /// Returns underlying entity.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn location(&self) -> EntityLocation {
        self.location
    }

    pub fn archetype(&self) -> &'a Archetype {
        self.archetype
    }

    pub fn has<C: Component>(&self) -> bool {
        self.archetype.has::<C>()
    }

    /// Returns a reference to the component `C` of the entity.
    pub fn get<C: Component>(&self) -> Option<&'a C> {
        let ptr = self
            .archetype
            .component_ptr(ComponentId::lookup::<C>()?, self.location.slot())?;
        Some(unsafe { &*(ptr as *const C) })
    }
}

/// A mutable entry of an entity in its archetype.
/// Provides convenient and faster access to entity components.
pub struct EntryMut<'a> {
    pub(crate) archetype: &'a mut Archetype,
    pub(crate) entity: Entity,
    pub(crate) location: EntityLocation,
}

impl EntryMut<'_> {
    /// Returns underlying entity.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn location(&self) -> EntityLocation {
        self.location
    }

    pub fn has<C: Component>(&self) -> bool {
        self.archetype.has::<C>()
    }

    /// Returns a reference to the component `C` of the entity.
    pub fn get<C: Component>(&self) -> Option<&C> {
        let ptr = self
            .archetype
            .component_ptr(ComponentId::lookup::<C>()?, self.location.slot())?;
        Some(unsafe { &*(ptr as *const C) })
    }

    /// Returns a mutable reference to the component `C` of the entity.
    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        let ptr = self
            .archetype
            .component_ptr(ComponentId::lookup::<C>()?, self.location.slot())?;
        Some(unsafe { &mut *(ptr as *mut C) })
    }
}
