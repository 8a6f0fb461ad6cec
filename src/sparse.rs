use std::iter::Zip;
use std::slice;

const ABSENT: u32 = u32::MAX;

/// A map from small dense integer keys to values.
///
/// Values are kept contiguous in a dense array; a sparse array indexed by key
/// stores the dense position of each present key. Removal swaps the last dense
/// entry into the freed position.
#[derive(Clone, Debug)]
pub struct SparseMap<V> {
    sparse: Vec<u32>,
    keys: Vec<u32>,
    values: Vec<V>,
}

impl<V> Default for SparseMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SparseMap<V> {
    pub fn new() -> Self {
        SparseMap {
            sparse: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SparseMap {
            sparse: Vec::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn dense_index(&self, key: u32) -> Option<usize> {
        match self.sparse.get(key as usize) {
            Some(&dense) if dense != ABSENT => Some(dense as usize),
            _ => None,
        }
    }

    /// Inserts a value, returning the previous one for the same key.
    pub fn insert(&mut self, key: u32, value: V) -> Option<V> {
        assert_ne!(key, ABSENT, "key {} is reserved", ABSENT);

        if let Some(dense) = self.dense_index(key) {
            return Some(std::mem::replace(&mut self.values[dense], value));
        }

        let slot = key as usize;
        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, ABSENT);
        }
        self.sparse[slot] = self.keys.len() as u32;
        self.keys.push(key);
        self.values.push(value);
        None
    }

    pub fn get(&self, key: u32) -> Option<&V> {
        self.dense_index(key).map(|dense| &self.values[dense])
    }

    pub fn get_mut(&mut self, key: u32) -> Option<&mut V> {
        self.dense_index(key).map(|dense| &mut self.values[dense])
    }

    pub fn contains_key(&self, key: u32) -> bool {
        self.dense_index(key).is_some()
    }

    /// Removes the value of `key`. The last dense entry takes its place.
    pub fn remove(&mut self, key: u32) -> Option<V> {
        let dense = self.dense_index(key)?;
        self.sparse[key as usize] = ABSENT;

        self.keys.swap_remove(dense);
        let value = self.values.swap_remove(dense);

        if let Some(&moved_key) = self.keys.get(dense) {
            self.sparse[moved_key as usize] = dense as u32;
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.sparse.clear();
        self.keys.clear();
        self.values.clear();
    }

    /// Keys in dense order.
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    /// Values in dense order.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn iter(&self) -> Zip<slice::Iter<'_, u32>, slice::Iter<'_, V>> {
        self.keys.iter().zip(self.values.iter())
    }
}
