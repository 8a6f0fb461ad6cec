use crate::component::set::ComponentMetaSet;
use crate::component::{Component, ComponentId, ComponentMeta};
use crate::error::CapacityError;
use crate::Entity;
use smallvec::SmallVec;
use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::slice;

/// One contiguous column of component values.
struct Column {
    data: NonNull<u8>,
    layout: Layout,
    meta: &'static ComponentMeta,
}

impl Column {
    fn new(meta: &'static ComponentMeta, rows: usize) -> Result<Self, CapacityError> {
        let overflow = || CapacityError::LayoutOverflow {
            component: meta.name,
            rows,
        };
        let bytes = meta.size().checked_mul(rows).ok_or_else(overflow)?;
        let layout = Layout::from_size_align(bytes, meta.align()).map_err(|_| overflow())?;

        let data = if bytes == 0 {
            // Zero-sized columns only need a well-aligned dangling pointer.
            NonNull::new(ptr::without_provenance_mut(meta.align())).ok_or_else(overflow)?
        } else {
            // Safety: `layout` has a non-zero size.
            let ptr = unsafe { alloc::alloc(layout) };
            NonNull::new(ptr).ok_or(CapacityError::Allocation {
                component: meta.name,
                bytes,
            })?
        };

        Ok(Column { data, layout, meta })
    }

    #[inline]
    unsafe fn at(&self, row: usize) -> *mut u8 {
        self.data.as_ptr().add(row * self.meta.size())
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            unsafe { alloc::dealloc(self.data.as_ptr(), self.layout) };
        }
    }
}

/// A fixed-capacity block of rows of one archetype.
///
/// Holds a column per component, in the order of the archetype's metadata,
/// plus a parallel column of owning entities. Rows `0..len()` are initialized.
pub struct Chunk {
    columns: SmallVec<[Column; 8]>,
    entities: Vec<Entity>,
    capacity: usize,
}

// Safety: columns only hold `Component` values, which are `Send + Sync`.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    pub(crate) fn new(metas: &ComponentMetaSet, capacity: usize) -> Result<Self, CapacityError> {
        let columns = metas
            .iter()
            .map(|meta| Column::new(meta, capacity))
            .collect::<Result<SmallVec<_>, _>>()?;

        let mut entities = Vec::new();
        entities
            .try_reserve_exact(capacity)
            .map_err(|_| CapacityError::EntitySlots { rows: capacity })?;

        Ok(Chunk {
            columns,
            entities,
            capacity,
        })
    }

    /// Returns the number of live rows.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entities.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Owning entities of the live rows, in row order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn column_of(&self, id: ComponentId) -> Option<&Column> {
        self.columns.iter().find(|column| column.meta.id == id)
    }

    /// Returns the live values of component `C` as a slice.
    pub fn components<C: Component>(&self) -> Option<&[C]> {
        let column = self.column_of(ComponentId::lookup::<C>()?)?;
        // Safety: the column stores `C` and rows `0..len` are initialized.
        Some(unsafe { slice::from_raw_parts(column.data.as_ptr() as *const C, self.len()) })
    }

    /// Returns the live values of component `C` as a mutable slice.
    pub fn components_mut<C: Component>(&mut self) -> Option<&mut [C]> {
        let len = self.len();
        let column = self.column_of(ComponentId::lookup::<C>()?)?;
        Some(unsafe { slice::from_raw_parts_mut(column.data.as_ptr() as *mut C, len) })
    }

    /// Base pointer of the column at `column`.
    #[inline]
    pub(crate) fn column_base(&self, column: usize) -> NonNull<u8> {
        self.columns[column].data
    }

    /// Pointer to the value at (`column`, `row`).
    /// Safety: `column` must be in bounds and `row < capacity`.
    #[inline]
    pub(crate) unsafe fn slot(&self, column: usize, row: usize) -> *mut u8 {
        self.columns.get_unchecked(column).at(row)
    }

    /// Records the owner of the next row. All columns of that row must already be written.
    pub(crate) fn push_entity(&mut self, entity: Entity) {
        debug_assert!(!self.is_full());
        self.entities.push(entity);
    }

    pub(crate) fn pop_entity(&mut self) -> Option<Entity> {
        self.entities.pop()
    }

    pub(crate) fn set_entity(&mut self, row: usize, entity: Entity) {
        self.entities[row] = entity;
    }

    /// Drops every live value and forgets all rows. The allocation is kept.
    pub(crate) fn clear(&mut self) {
        let len = self.entities.len();
        self.entities.clear();
        for column in &self.columns {
            if !column.meta.needs_drop {
                continue;
            }
            for row in 0..len {
                unsafe { (column.meta.destruct)(column.at(row)) };
            }
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.clear();
    }
}
