use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ItemStruct;

pub fn expand_handle(input: ItemStruct) -> TokenStream {
    let handle_ident = &input.ident;
    let vis = &input.vis;
    let fields = &input.fields;
    let attrs = &input.attrs;
    let generics = &input.generics;

    if !generics.params.is_empty() {
        return syn::Error::new_spanned(generics, "gate_handle does not support generic structs")
            .to_compile_error();
    }

    let inner_ident = format_ident!("{handle_ident}Inner");
    let semi = if matches!(fields, syn::Fields::Named(_)) { quote!() } else { quote!(;) };

    quote! {
        #[derive(Debug)]
        #vis struct #inner_ident #fields #semi

        #(#attrs)*
        #[derive(Debug, Clone)]
        #vis struct #handle_ident {
            inner: std::sync::Arc<#inner_ident>,
        }

        impl #handle_ident {
            /// Wraps an initialized inner state into a shared handle.
            #[must_use]
            pub fn from_inner(inner: #inner_ident) -> Self {
                Self { inner: std::sync::Arc::new(inner) }
            }

            /// Returns `true` when both handles point at the same shared state.
            #[must_use]
            pub fn ptr_eq(&self, other: &Self) -> bool {
                std::sync::Arc::ptr_eq(&self.inner, &other.inner)
            }
        }

        impl std::ops::Deref for #handle_ident {
            type Target = #inner_ident;

            fn deref(&self) -> &Self::Target {
                &self.inner
            }
        }
    }
}
