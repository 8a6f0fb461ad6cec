//! Component access requested by a [`View`](crate::View).
//!
//! A query is a type describing what to fetch per entity: `&T`, `&mut T`,
//! `Option<&T>`, `Option<&mut T>`, [`Entity`], or a tuple of those.

use crate::archetype::chunk::Chunk;
use crate::archetype::Archetype;
use crate::component::set::ComponentSet;
use crate::component::{Component, ComponentId};
use crate::error::EntityError;
use crate::Entity;
use std::any::type_name;
use std::ptr::NonNull;

/// Components a query reads, writes and requires.
#[derive(Debug, Default, Clone)]
pub struct Access {
    required: ComponentSet,
    reads: ComponentSet,
    writes: ComponentSet,
}

impl Access {
    /// Panics if `id` is already borrowed mutably by the same query.
    pub fn read(&mut self, id: ComponentId, name: &'static str) {
        assert!(
            !self.writes.contains(id),
            "{} is already borrowed mutably by this query",
            name
        );
        self.reads.insert(id);
    }

    /// Panics if `id` is already borrowed by the same query.
    pub fn write(&mut self, id: ComponentId, name: &'static str) {
        assert!(
            !self.reads.contains(id) && !self.writes.contains(id),
            "{} is already borrowed by this query",
            name
        );
        self.writes.insert(id);
    }

    /// Only archetypes with this component are visited.
    pub fn require(&mut self, id: ComponentId) {
        self.required.insert(id);
    }

    pub fn required(&self) -> &ComponentSet {
        &self.required
    }

    pub(crate) fn into_required(self) -> ComponentSet {
        self.required
    }
}

/// A description of per-entity data to fetch from matching archetypes.
///
/// # Safety
/// `init` must declare every component `item` accesses, with the right mutability.
pub unsafe trait Query {
    type Item<'w>;
    /// Resolved component ids.
    type State: Copy;
    /// Column pointers of one chunk.
    type Fetch: Copy;

    /// Resolves component ids and declares accesses. Fails if a required component
    /// type was never registered, in which case no entity can match.
    fn init(access: &mut Access) -> Result<Self::State, EntityError>;

    /// Locates the columns in `chunk`, which belongs to `archetype`.
    fn fetch(state: &Self::State, archetype: &Archetype, chunk: &Chunk) -> Option<Self::Fetch>;

    /// # Safety
    /// `row` must be a live row of the fetched chunk, and the produced references
    /// must not alias any other live reference.
    unsafe fn item<'w>(fetch: &Self::Fetch, row: usize) -> Self::Item<'w>;
}

/// A query that never hands out mutable references.
///
/// # Safety
/// `Query::init` must not declare writes.
pub unsafe trait ReadOnlyQuery: Query {}

fn resolve<C: Component>() -> Result<ComponentId, EntityError> {
    ComponentId::lookup::<C>().ok_or(EntityError::UnknownComponent(type_name::<C>()))
}

fn column<C>(archetype: &Archetype, chunk: &Chunk, id: ComponentId) -> Option<NonNull<C>> {
    let column = archetype.column_index(id)?;
    Some(chunk.column_base(column).cast())
}

unsafe impl<'q, C: Component> Query for &'q C {
    type Item<'w> = &'w C;
    type State = ComponentId;
    type Fetch = NonNull<C>;

    fn init(access: &mut Access) -> Result<Self::State, EntityError> {
        let id = resolve::<C>()?;
        access.read(id, type_name::<C>());
        access.require(id);
        Ok(id)
    }

    fn fetch(state: &Self::State, archetype: &Archetype, chunk: &Chunk) -> Option<Self::Fetch> {
        column(archetype, chunk, *state)
    }

    #[inline]
    unsafe fn item<'w>(fetch: &Self::Fetch, row: usize) -> Self::Item<'w> {
        &*fetch.as_ptr().add(row)
    }
}

unsafe impl<'q, C: Component> ReadOnlyQuery for &'q C {}

unsafe impl<'q, C: Component> Query for &'q mut C {
    type Item<'w> = &'w mut C;
    type State = ComponentId;
    type Fetch = NonNull<C>;

    fn init(access: &mut Access) -> Result<Self::State, EntityError> {
        let id = resolve::<C>()?;
        access.write(id, type_name::<C>());
        access.require(id);
        Ok(id)
    }

    fn fetch(state: &Self::State, archetype: &Archetype, chunk: &Chunk) -> Option<Self::Fetch> {
        column(archetype, chunk, *state)
    }

    #[inline]
    unsafe fn item<'w>(fetch: &Self::Fetch, row: usize) -> Self::Item<'w> {
        &mut *fetch.as_ptr().add(row)
    }
}

unsafe impl<'q, C: Component> Query for Option<&'q C> {
    type Item<'w> = Option<&'w C>;
    type State = Option<ComponentId>;
    type Fetch = Option<NonNull<C>>;

    fn init(access: &mut Access) -> Result<Self::State, EntityError> {
        let id = ComponentId::lookup::<C>();
        if let Some(id) = id {
            access.read(id, type_name::<C>());
        }
        Ok(id)
    }

    fn fetch(state: &Self::State, archetype: &Archetype, chunk: &Chunk) -> Option<Self::Fetch> {
        Some(state.and_then(|id| column(archetype, chunk, id)))
    }

    #[inline]
    unsafe fn item<'w>(fetch: &Self::Fetch, row: usize) -> Self::Item<'w> {
        fetch.map(|ptr| &*ptr.as_ptr().add(row))
    }
}

unsafe impl<'q, C: Component> ReadOnlyQuery for Option<&'q C> {}

unsafe impl<'q, C: Component> Query for Option<&'q mut C> {
    type Item<'w> = Option<&'w mut C>;
    type State = Option<ComponentId>;
    type Fetch = Option<NonNull<C>>;

    fn init(access: &mut Access) -> Result<Self::State, EntityError> {
        let id = ComponentId::lookup::<C>();
        if let Some(id) = id {
            access.write(id, type_name::<C>());
        }
        Ok(id)
    }

    fn fetch(state: &Self::State, archetype: &Archetype, chunk: &Chunk) -> Option<Self::Fetch> {
        Some(state.and_then(|id| column(archetype, chunk, id)))
    }

    #[inline]
    unsafe fn item<'w>(fetch: &Self::Fetch, row: usize) -> Self::Item<'w> {
        fetch.map(|ptr| &mut *ptr.as_ptr().add(row))
    }
}

unsafe impl Query for Entity {
    type Item<'w> = Entity;
    type State = ();
    type Fetch = NonNull<Entity>;

    fn init(_: &mut Access) -> Result<Self::State, EntityError> {
        Ok(())
    }

    fn fetch(_: &Self::State, _: &Archetype, chunk: &Chunk) -> Option<Self::Fetch> {
        Some(NonNull::from(chunk.entities()).cast())
    }

    #[inline]
    unsafe fn item<'w>(fetch: &Self::Fetch, row: usize) -> Self::Item<'w> {
        *fetch.as_ptr().add(row)
    }
}

unsafe impl ReadOnlyQuery for Entity {}

macro_rules! impl_query_tuple {
    ($($name: ident),*) => {
        #[allow(non_snake_case)]
        unsafe impl<$($name: Query),*> Query for ($($name,)*) {
            type Item<'w> = ($(<$name as Query>::Item<'w>,)*);
            type State = ($(<$name as Query>::State,)*);
            type Fetch = ($(<$name as Query>::Fetch,)*);

            fn init(access: &mut Access) -> Result<Self::State, EntityError> {
                Ok(($(<$name as Query>::init(access)?,)*))
            }

            fn fetch(state: &Self::State, archetype: &Archetype, chunk: &Chunk) -> Option<Self::Fetch> {
                let ($($name,)*) = state;
                Some(($(<$name as Query>::fetch($name, archetype, chunk)?,)*))
            }

            #[inline]
            unsafe fn item<'w>(fetch: &Self::Fetch, row: usize) -> Self::Item<'w> {
                let ($($name,)*) = fetch;
                ($(<$name as Query>::item($name, row),)*)
            }
        }

        unsafe impl<$($name: ReadOnlyQuery),*> ReadOnlyQuery for ($($name,)*) {}
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);
impl_query_tuple!(A, B, C, D, E, F, G);
impl_query_tuple!(A, B, C, D, E, F, G, H);

/// Resolves `Q` against the type registry, returning its state and the set of required components.
pub(crate) fn prepare<Q: Query>() -> Result<(Q::State, ComponentSet), EntityError> {
    let mut access = Access::default();
    let state = Q::init(&mut access)?;
    Ok((state, access.into_required()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pos;
    struct Vel;
    struct Unseen;

    #[test]
    fn tuple_collects_required_components() {
        let pos = ComponentId::of::<Pos>();
        let vel = ComponentId::of::<Vel>();

        let (_, required) = prepare::<(Entity, &Pos, &mut Vel, Option<&u64>)>().unwrap();
        assert_eq!(required, [pos, vel].into_iter().collect());
    }

    #[test]
    fn unregistered_component_is_reported() {
        ComponentId::of::<Pos>();
        assert_eq!(
            prepare::<(&Pos, &Unseen)>().err(),
            Some(EntityError::UnknownComponent(type_name::<Unseen>()))
        );
        // Optional access to an unknown type matches everything.
        assert!(prepare::<Option<&Unseen>>().is_ok());
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn aliasing_mutable_access_panics() {
        ComponentId::of::<Pos>();
        let _ = prepare::<(&mut Pos, &Pos)>();
    }

    #[test]
    fn shared_reads_do_not_conflict() {
        ComponentId::of::<Vel>();
        assert!(prepare::<(&Vel, &Vel)>().is_ok());
    }
}
