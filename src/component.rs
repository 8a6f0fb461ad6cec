//! Runtime component identity.
//!
//! Every component type gets a dense [`ComponentId`] the first time it is referenced.
//! The mapping is process-wide and append-only, so ids are stable for the lifetime
//! of the process and can be shared between independent registries.

pub mod set;

use crate::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::alloc::Layout;
use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::ptr;

/// Plain data that can be attached to an entity.
///
/// Moving a value in Rust is always a bitwise copy, so any `Send + Sync + 'static` type
/// can be relocated between chunks without observable side effects.
pub trait Component: Send + Sync + 'static {}

impl<T> Component for T where T: Send + Sync + 'static {}

/// A dense identifier of a component type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Denotes "no such component". Never contained in any [`ComponentSet`](set::ComponentSet).
    pub const INVALID: Self = ComponentId(u32::MAX);

    pub(crate) const fn from_index(index: usize) -> Self {
        ComponentId(index as u32)
    }

    /// Returns the id of `C`, registering the type if it is seen for the first time.
    pub fn of<C: Component>() -> Self {
        ComponentMeta::of::<C>().id
    }

    /// Returns the id of `C` only if the type has already been registered.
    pub fn lookup<C: Component>() -> Option<Self> {
        let type_id = TypeId::of::<C>();
        if let Some(meta) = cached_meta(type_id) {
            return Some(meta.id);
        }
        // Misses are not cached: the type may be registered later.
        let meta = *TYPE_REGISTRY.read().by_type.get(&type_id)?;
        cache_meta(meta);
        Some(meta.id)
    }

    /// Returns the id of a registered type by its [`type_name`].
    pub fn by_name(name: &str) -> Option<Self> {
        TYPE_REGISTRY.read().by_name.get(name).map(|meta| meta.id)
    }

    /// Returns the metadata of the component, `None` for unregistered ids.
    pub fn meta(self) -> Option<&'static ComponentMeta> {
        TYPE_REGISTRY.read().metas.get(self.index()).copied()
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ComponentId({})", self.0)
        } else {
            f.write_str("ComponentId(INVALID)")
        }
    }
}

/// Type-erased description of a component type.
///
/// Archetypes use the function pointers to relocate and destroy values
/// without knowing the concrete type.
pub struct ComponentMeta {
    pub id: ComponentId,
    pub type_id: TypeId,
    pub name: &'static str,
    pub layout: Layout,
    pub needs_drop: bool,
    /// Moves the value at `src` into uninitialized memory at `dst`. `src` is left logically uninitialized.
    pub move_construct: unsafe fn(dst: *mut u8, src: *mut u8),
    /// Drops the value at `dst` and moves the value at `src` into its place.
    pub move_assign: unsafe fn(dst: *mut u8, src: *mut u8),
    /// Drops the value at the pointer in place.
    pub destruct: unsafe fn(*mut u8),
}

impl ComponentMeta {
    /// Returns the metadata of `C`, registering the type on first use.
    /// Repeated calls return the same `&'static` metadata.
    pub fn of<C: Component>() -> &'static ComponentMeta {
        let type_id = TypeId::of::<C>();
        if let Some(meta) = cached_meta(type_id) {
            return meta;
        }

        let registered = TYPE_REGISTRY.read().by_type.get(&type_id).copied();
        let meta = match registered {
            Some(meta) => meta,
            None => TYPE_REGISTRY.write().register::<C>(),
        };
        cache_meta(meta);
        meta
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn align(&self) -> usize {
        self.layout.align()
    }
}

impl fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size())
            .field("align", &self.align())
            .finish()
    }
}

unsafe fn move_construct<T>(dst: *mut u8, src: *mut u8) {
    ptr::copy_nonoverlapping(src as *const T, dst as *mut T, 1);
}

unsafe fn move_assign<T>(dst: *mut u8, src: *mut u8) {
    *(dst as *mut T) = ptr::read(src as *const T);
}

unsafe fn destruct<T>(ptr: *mut u8) {
    ptr::drop_in_place(ptr as *mut T);
}

#[derive(Default)]
struct TypeRegistry {
    metas: Vec<&'static ComponentMeta>,
    by_type: HashMap<TypeId, &'static ComponentMeta>,
    by_name: HashMap<&'static str, &'static ComponentMeta>,
}

impl TypeRegistry {
    fn register<C: Component>(&mut self) -> &'static ComponentMeta {
        let type_id = TypeId::of::<C>();
        // Another thread may have won the race for the write lock.
        if let Some(meta) = self.by_type.get(&type_id) {
            return *meta;
        }

        let index = self.metas.len();
        assert!(
            index < ComponentId::INVALID.index(),
            "component id space is exhausted"
        );

        let meta: &'static ComponentMeta = Box::leak(Box::new(ComponentMeta {
            id: ComponentId::from_index(index),
            type_id,
            name: type_name::<C>(),
            layout: Layout::new::<C>(),
            needs_drop: std::mem::needs_drop::<C>(),
            move_construct: move_construct::<C>,
            move_assign: move_assign::<C>,
            destruct: destruct::<C>,
        }));

        self.metas.push(meta);
        self.by_type.insert(type_id, meta);
        self.by_name.entry(meta.name).or_insert(meta);

        tracing::trace!(id = index, name = meta.name, "registered component type");
        meta
    }
}

static TYPE_REGISTRY: Lazy<RwLock<TypeRegistry>> = Lazy::new(Default::default);

thread_local! {
    /// Metadata this thread has already resolved. Entries never go stale because
    /// the registry is append-only.
    static RESOLVED: RefCell<HashMap<TypeId, &'static ComponentMeta>> = RefCell::new(HashMap::default());
}

fn cached_meta(type_id: TypeId) -> Option<&'static ComponentMeta> {
    RESOLVED
        .try_with(|resolved| resolved.borrow().get(&type_id).copied())
        .ok()
        .flatten()
}

fn cache_meta(meta: &'static ComponentMeta) {
    let _ = RESOLVED.try_with(|resolved| resolved.borrow_mut().insert(meta.type_id, meta));
}
