//! Lazy queries over the entities of a [`Registry`].
//!
//! A view only resolves its component ids when it is built. Matching archetypes
//! and their chunks are found on every traversal, so one view can be iterated
//! many times.
//!
//! # Examples
//!
//! ```
//! use entity_store::{Entity, Registry};
//!
//! #[derive(Debug, PartialEq)]
//! struct Position(f32);
//! struct Velocity(f32);
//!
//! let mut registry = Registry::new();
//! let moving = registry.create((Position(0.0), Velocity(2.0))).unwrap();
//! let still = registry.create((Position(5.0),)).unwrap();
//!
//! registry
//!     .view_mut::<(&mut Position, &Velocity)>()
//!     .each(|(pos, vel)| pos.0 += vel.0);
//!
//! let view = registry.view::<(Entity, &Position)>();
//! assert_eq!(view.count(), 2);
//! assert_eq!(view.get(moving).unwrap().1, &Position(2.0));
//! assert_eq!(view.get(still).unwrap().1, &Position(5.0));
//! ```

use crate::archetype::chunk::Chunk;
use crate::archetype::Archetype;
use crate::component::set::ComponentSet;
use crate::error::EntityError;
use crate::query::{self, Query, ReadOnlyQuery};
use crate::{Entity, Registry};
use std::slice;

type Prepared<Q> = Result<(<Q as Query>::State, ComponentSet), EntityError>;

fn is_match(archetype: &Archetype, required: &ComponentSet) -> bool {
    !archetype.is_empty() && archetype.component_set().is_superset(required)
}

/// Calls `f` with the fetch and the row count of every non-empty matching chunk.
fn for_each_chunk<Q: Query>(
    archetypes: &[Archetype],
    state: &Q::State,
    required: &ComponentSet,
    mut f: impl FnMut(&Q::Fetch, usize),
) {
    for archetype in archetypes.iter().filter(|a| is_match(a, required)) {
        // Only trailing chunks can be empty.
        for chunk in archetype.chunks().iter().take_while(|chunk| !chunk.is_empty()) {
            if let Some(fetch) = Q::fetch(state, archetype, chunk) {
                f(&fetch, chunk.len());
            }
        }
    }
}

fn count_matching(archetypes: &[Archetype], required: &ComponentSet) -> usize {
    archetypes
        .iter()
        .filter(|a| is_match(a, required))
        .map(Archetype::len)
        .sum()
}

/// Safety: the caller must guarantee the produced references do not alias for `'w`.
unsafe fn fetch_one<'w, Q: Query>(
    registry: &'w Registry,
    prepared: &Prepared<Q>,
    entity: Entity,
) -> Result<Q::Item<'w>, EntityError> {
    let location = registry.location(entity)?;
    let (state, required) = prepared.as_ref().map_err(Clone::clone)?;
    let archetype = &registry.archetypes()[location.archetype().index()];

    if let Some(missing) = required.iter().find(|id| !archetype.has_component(*id)) {
        return Err(EntityError::MissingComponent {
            entity,
            component: missing.meta().map_or("<unregistered>", |meta| meta.name),
        });
    }

    let chunk = &archetype.chunks()[location.chunk()];
    let fetch = Q::fetch(state, archetype, chunk).ok_or(EntityError::Stale(entity))?;
    Ok(Q::item(&fetch, location.row()))
}

#[cfg(feature = "rayon")]
mod parallel {
    use super::*;
    use rayon::prelude::*;

    struct ChunkJob<F>(F, usize);

    // Safety: chunks are disjoint, so every job owns its rows exclusively.
    unsafe impl<F> Send for ChunkJob<F> {}
    unsafe impl<F> Sync for ChunkJob<F> {}

    /// Safety: the caller must guarantee the produced references do not alias for `'w`.
    pub(super) unsafe fn par_each<'w, Q: Query>(
        archetypes: &[Archetype],
        prepared: &Prepared<Q>,
        f: impl Fn(Q::Item<'w>) + Send + Sync,
    ) {
        let Ok((state, required)) = prepared else {
            return;
        };

        let mut jobs = Vec::new();
        for_each_chunk::<Q>(archetypes, state, required, |fetch, len| {
            jobs.push(ChunkJob(*fetch, len))
        });

        jobs.into_par_iter().for_each(|job| {
            let ChunkJob(fetch, len) = job;
            for row in 0..len {
                f(unsafe { Q::item(&fetch, row) });
            }
        });
    }
}

/// Iterator over the items of a view.
pub struct ViewIter<'w, Q: Query> {
    archetypes: slice::Iter<'w, Archetype>,
    chunks: slice::Iter<'w, Chunk>,
    archetype: Option<&'w Archetype>,
    state: Option<Q::State>,
    required: ComponentSet,
    fetch: Option<Q::Fetch>,
    row: usize,
    len: usize,
}

impl<'w, Q: Query> ViewIter<'w, Q> {
    fn new(archetypes: &'w [Archetype], prepared: &Prepared<Q>) -> Self {
        let (archetypes, state, required) = match prepared {
            Ok((state, required)) => (archetypes.iter(), Some(*state), required.clone()),
            Err(_) => ((&[]).iter(), None, ComponentSet::new()),
        };

        ViewIter {
            archetypes,
            chunks: (&[]).iter(),
            archetype: None,
            state,
            required,
            fetch: None,
            row: 0,
            len: 0,
        }
    }
}

impl<'w, Q: Query> Iterator for ViewIter<'w, Q> {
    type Item = Q::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.row < self.len {
                if let Some(fetch) = &self.fetch {
                    let row = self.row;
                    self.row += 1;
                    return Some(unsafe { Q::item(fetch, row) });
                }
            }

            if let Some(chunk) = self.chunks.next() {
                let archetype = self.archetype?;
                self.fetch = Q::fetch(&self.state?, archetype, chunk);
                self.row = 0;
                self.len = if self.fetch.is_some() { chunk.len() } else { 0 };
                continue;
            }

            let required = &self.required;
            let archetype = self.archetypes.find(|a| is_match(a, required))?;
            self.archetype = Some(archetype);
            self.chunks = archetype.chunks().iter();
        }
    }
}

/// A read-only view. Any number of them can coexist.
pub struct View<'r, Q: ReadOnlyQuery> {
    registry: &'r Registry,
    prepared: Prepared<Q>,
}

impl<'r, Q: ReadOnlyQuery> View<'r, Q> {
    /// Panics if the query borrows a component mutably more than once.
    pub(crate) fn new(registry: &'r Registry) -> Self {
        View {
            registry,
            prepared: query::prepare::<Q>(),
        }
    }

    /// Returns a new iterator over all matching entities.
    pub fn iter(&self) -> ViewIter<'r, Q> {
        ViewIter::new(self.registry.archetypes(), &self.prepared)
    }

    /// Calls `f` for every matching entity.
    pub fn each(&self, mut f: impl FnMut(Q::Item<'r>)) {
        if let Ok((state, required)) = &self.prepared {
            for_each_chunk::<Q>(self.registry.archetypes(), state, required, |fetch, len| {
                for row in 0..len {
                    f(unsafe { Q::item(fetch, row) });
                }
            });
        }
    }

    /// Calls `f` for every matching entity, processing chunks in parallel.
    #[cfg(feature = "rayon")]
    pub fn par_each(&self, f: impl Fn(Q::Item<'r>) + Send + Sync) {
        unsafe { parallel::par_each::<Q>(self.registry.archetypes(), &self.prepared, f) }
    }

    /// Fetches the query items of a single entity.
    pub fn get(&self, entity: Entity) -> Result<Q::Item<'r>, EntityError> {
        unsafe { fetch_one::<Q>(self.registry, &self.prepared, entity) }
    }

    /// Returns `true` if `entity` is alive and matches the view.
    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_ok()
    }

    /// Returns the number of matching entities without visiting them.
    pub fn count(&self) -> usize {
        match &self.prepared {
            Ok((_, required)) => count_matching(self.registry.archetypes(), required),
            Err(_) => 0,
        }
    }
}

impl<'r, Q: ReadOnlyQuery> IntoIterator for &View<'r, Q> {
    type Item = Q::Item<'r>;
    type IntoIter = ViewIter<'r, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A view that may hand out mutable references. Borrows the registry exclusively.
pub struct ViewMut<'r, Q: Query> {
    registry: &'r mut Registry,
    prepared: Prepared<Q>,
}

impl<'r, Q: Query> ViewMut<'r, Q> {
    /// Panics if the query borrows a component mutably more than once.
    pub(crate) fn new(registry: &'r mut Registry) -> Self {
        ViewMut {
            registry,
            prepared: query::prepare::<Q>(),
        }
    }

    pub fn iter(&mut self) -> ViewIter<'_, Q> {
        ViewIter::new(self.registry.archetypes(), &self.prepared)
    }

    /// Calls `f` for every matching entity.
    pub fn each<'a>(&'a mut self, mut f: impl FnMut(Q::Item<'a>)) {
        if let Ok((state, required)) = &self.prepared {
            for_each_chunk::<Q>(self.registry.archetypes(), state, required, |fetch, len| {
                for row in 0..len {
                    f(unsafe { Q::item(fetch, row) });
                }
            });
        }
    }

    /// Calls `f` for every matching entity, processing chunks in parallel.
    #[cfg(feature = "rayon")]
    pub fn par_each<'a>(&'a mut self, f: impl Fn(Q::Item<'a>) + Send + Sync) {
        unsafe { parallel::par_each::<Q>(self.registry.archetypes(), &self.prepared, f) }
    }

    /// Fetches the query items of a single entity.
    pub fn get(&mut self, entity: Entity) -> Result<Q::Item<'_>, EntityError> {
        unsafe { fetch_one::<Q>(self.registry, &self.prepared, entity) }
    }

    /// Like [`get`](Self::get), but keeps the registry borrowed for the whole lifetime `'r`.
    pub fn into_get(self, entity: Entity) -> Result<Q::Item<'r>, EntityError> {
        let registry: &'r Registry = self.registry;
        unsafe { fetch_one::<Q>(registry, &self.prepared, entity) }
    }

    /// Returns `true` if `entity` is alive and matches the view.
    pub fn contains(&mut self, entity: Entity) -> bool {
        self.get(entity).is_ok()
    }

    /// Returns the number of matching entities without visiting them.
    pub fn count(&self) -> usize {
        match &self.prepared {
            Ok((_, required)) => count_matching(self.registry.archetypes(), required),
            Err(_) => 0,
        }
    }
}

impl<'a, 'r, Q: Query> IntoIterator for &'a mut ViewMut<'r, Q> {
    type Item = Q::Item<'a>;
    type IntoIter = ViewIter<'a, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
