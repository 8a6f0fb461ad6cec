use crate::archetype::{ArchetypeId, Slot};
use std::fmt;

/// An entity identifier.
///
/// The `index` is a dense slot number that gets reused after the entity is destroyed;
/// the `generation` is bumped on every reuse, so handles to a destroyed entity
/// never resolve to a newer one.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub const NULL: Self = Entity {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub(crate) fn new(index: u32, generation: u32) -> Entity {
        Entity { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Packs the handle into a single integer, generation in the high bits.
    pub fn to_bits(&self) -> u64 {
        (self.generation as u64) << 32 | self.index as u64
    }

    pub fn from_bits(bits: u64) -> Entity {
        Entity {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where the data of a live entity is stored.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntityLocation {
    pub(crate) archetype: ArchetypeId,
    pub(crate) chunk: u32,
    pub(crate) row: u32,
}

impl EntityLocation {
    pub(crate) fn new(archetype: ArchetypeId, (chunk, row): Slot) -> Self {
        EntityLocation {
            archetype,
            chunk: chunk as u32,
            row: row as u32,
        }
    }

    pub(crate) fn slot(&self) -> Slot {
        (self.chunk as usize, self.row as usize)
    }

    pub fn archetype(&self) -> ArchetypeId {
        self.archetype
    }

    pub fn chunk(&self) -> usize {
        self.chunk as usize
    }

    pub fn row(&self) -> usize {
        self.row as usize
    }
}

#[cfg(test)]
mod tests {
    use super::Entity;

    #[test]
    fn bits_roundtrip() {
        let entity = Entity::new(42, 7);
        assert_eq!(Entity::from_bits(entity.to_bits()), entity);
        assert_eq!(format!("{entity}"), "Entity(42v7)");
        assert_eq!(Entity::default(), Entity::NULL);
    }
}
