//! An archetype-based storage for entity component data.
//!
//! An entity is an opaque `(index, generation)` handle. Each entity can have
//! any set of components attached, and entities with the same set of components
//! share an archetype. Archetypes store components as structure-of-arrays
//! split across fixed-size chunks, so components of the same type are iterated
//! contiguously without `Box`ing them.
//!
//! # Examples
//!
//! ```
//! use entity_store::{Bundle, Entity, Registry};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! struct Velocity {
//!     dx: f32,
//!     dy: f32,
//! }
//!
//! struct Mesh(&'static str);
//!
//! #[derive(Bundle)]
//! struct Prop {
//!     position: Position,
//!     mesh: Mesh,
//! }
//!
//! let mut registry = Registry::new();
//!
//! let ball = registry
//!     .create(Prop {
//!         position: Position { x: 0.0, y: 0.0 },
//!         mesh: Mesh("ball.obj"),
//!     })
//!     .unwrap();
//! let crate_ = registry
//!     .create((Position { x: 4.0, y: 0.0 }, Mesh("crate.obj")))
//!     .unwrap();
//!
//! registry.add_component(ball, Velocity { dx: 1.0, dy: 0.5 }).unwrap();
//!
//! registry
//!     .view_mut::<(&mut Position, &Velocity)>()
//!     .each(|(pos, vel)| {
//!         pos.x += vel.dx;
//!         pos.y += vel.dy;
//!     });
//!
//! let mut drawn = Vec::new();
//! registry
//!     .view::<(Entity, &Position, &Mesh)>()
//!     .each(|(entity, _, mesh)| drawn.push((entity, mesh.0)));
//! assert_eq!(drawn.len(), 2);
//!
//! assert_eq!(registry.get::<&Position>(ball).unwrap(), &Position { x: 1.0, y: 0.5 });
//!
//! registry.destroy(crate_).unwrap();
//! assert!(registry.get::<&Position>(crate_).is_err());
//! ```

extern crate self as entity_store;

#[cfg(test)]
mod tests;

pub mod archetype;
pub mod bundle;
pub mod component;
pub mod config;
pub mod entity;
pub mod entry;
pub mod error;
pub mod query;
pub mod registry;
pub mod sparse;
pub mod view;

pub use archetype::chunk::Chunk;
pub use archetype::{Archetype, ArchetypeId};
pub use bundle::Bundle;
pub use component::set::{ComponentMetaSet, ComponentSet};
pub use component::{Component, ComponentId, ComponentMeta};
pub use config::RegistryConfig;
pub use entity::{Entity, EntityLocation};
pub use entry::{Entry, EntryMut};
pub use error::{CapacityError, EntityError};
pub use macros::Bundle;
pub use query::{Access, Query, ReadOnlyQuery};
pub use registry::Registry;
pub use sparse::SparseMap;
pub use view::{View, ViewIter, ViewMut};

pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
