use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, Fields};

/// Implements `Bundle` for a struct whose fields are all components.
///
/// The struct must not implement `Drop`, because its fields are moved out one by one.
#[proc_macro_derive(Bundle)]
pub fn derive_bundle_fn(input: TokenStream) -> TokenStream {
    let main_crate = quote!(::entity_store);

    let DeriveInput {
        ident,
        data,
        mut generics,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = if let Data::Struct(data) = data {
        data.fields
    } else {
        return syn::Error::new(ident.span(), "Bundle can only be derived for structs")
            .to_compile_error()
            .into();
    };

    let types: Vec<_> = fields.iter().map(|field| field.ty.clone()).collect();
    let bindings: Vec<_> = (0..fields.len())
        .map(|i| format_ident!("__field{}", i))
        .collect();

    let pattern = match &fields {
        Fields::Named(named) => {
            let names: Vec<_> = named.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            quote!({ #(#names: #bindings),* })
        }
        Fields::Unnamed(_) => quote!(( #(#bindings),* )),
        Fields::Unit => quote!(),
    };

    let where_clause = generics.make_where_clause();
    for ty in &types {
        where_clause
            .predicates
            .push(parse_quote!(#ty: #main_crate::Component));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    quote! {
        unsafe impl #impl_generics #main_crate::Bundle for #ident #ty_generics #where_clause {
            fn component_metas(f: &mut impl FnMut(&'static #main_crate::ComponentMeta)) {
                #( f(#main_crate::ComponentMeta::of::<#types>()); )*
            }

            #[allow(unused_variables)]
            unsafe fn take(self, f: &mut impl FnMut(&'static #main_crate::ComponentMeta, *mut u8)) {
                let #ident #pattern = self;
                #(
                    let mut #bindings = ::std::mem::ManuallyDrop::new(#bindings);
                    f(
                        #main_crate::ComponentMeta::of::<#types>(),
                        &mut *#bindings as *mut #types as *mut u8,
                    );
                )*
            }
        }
    }
    .into()
}
