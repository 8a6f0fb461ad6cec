use crate::component::{Component, ComponentMeta};
use std::mem::ManuallyDrop;

/// A group of component values that is moved into storage as a whole.
///
/// Implemented for tuples of components and derivable for structs
/// with `#[derive(Bundle)]`, where every field is a component.
///
/// # Safety
/// `take` must hand out every value exactly once, in the order
/// `component_metas` reports the types, and must not drop them afterwards.
pub unsafe trait Bundle: Send + Sync + 'static {
    /// Calls `f` with the metadata of every component in the bundle.
    fn component_metas(f: &mut impl FnMut(&'static ComponentMeta));

    /// Calls `f` with a pointer to every value in the bundle. `f` takes ownership of the value.
    ///
    /// # Safety
    /// `f` must move the value out or destroy it.
    unsafe fn take(self, f: &mut impl FnMut(&'static ComponentMeta, *mut u8));
}

macro_rules! impl_bundle_tuple {
    ($($name: ident),*) => {
        #[allow(non_snake_case, unused_variables, unused_mut)]
        unsafe impl<$($name: Component),*> Bundle for ($($name,)*) {
            fn component_metas(f: &mut impl FnMut(&'static ComponentMeta)) {
                $(f(ComponentMeta::of::<$name>());)*
            }

            unsafe fn take(self, f: &mut impl FnMut(&'static ComponentMeta, *mut u8)) {
                let ($($name,)*) = self;
                $(
                    let mut $name = ManuallyDrop::new($name);
                    f(ComponentMeta::of::<$name>(), &mut *$name as *mut $name as *mut u8);
                )*
            }
        }
    };
}

impl_bundle_tuple!();
impl_bundle_tuple!(A);
impl_bundle_tuple!(A, B);
impl_bundle_tuple!(A, B, C);
impl_bundle_tuple!(A, B, C, D);
impl_bundle_tuple!(A, B, C, D, E);
impl_bundle_tuple!(A, B, C, D, E, F);
impl_bundle_tuple!(A, B, C, D, E, F, G);
impl_bundle_tuple!(A, B, C, D, E, F, G, H);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_bundle_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);
