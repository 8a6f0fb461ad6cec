/// Tunables of a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    /// Approximate size of one chunk. Chunk capacity is this divided by the row size
    /// of the archetype, but never less than one row.
    pub chunk_size_in_bytes: usize,
    /// Number of entities to reserve bookkeeping space for up front.
    pub initial_entity_capacity: usize,
}

impl RegistryConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size_in_bytes = bytes;
        self
    }

    pub fn with_entity_capacity(mut self, entities: usize) -> Self {
        self.initial_entity_capacity = entities;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            chunk_size_in_bytes: Self::DEFAULT_CHUNK_SIZE,
            initial_entity_capacity: 0,
        }
    }
}
