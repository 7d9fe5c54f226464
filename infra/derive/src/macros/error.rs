use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, FieldsNamed, Ident, Type, Variant};

struct VariantMeta<'a> {
    ident: &'a Ident,
    source: Option<(&'a Ident, &'a Type)>,
    has_context: bool,
    cfg_attrs: Vec<Attribute>,
}

pub fn expand_derive(input: DeriveInput) -> TokenStream {
    let name = &input.ident;
    let ext_name = format_ident!("{}Ext", name);

    let Data::Enum(data) = &input.data else {
        return quote! { compile_error!("gate_error can only be applied to enums"); };
    };

    let variants = match data.variants.iter().map(parse_variant).collect::<Result<Vec<_>, _>>() {
        Ok(v) => v,
        Err(err) => return err.to_compile_error(),
    };
    if let Err(err) = check_variants(&variants) {
        return err.to_compile_error();
    }

    let derives = missing_derives(&input);
    let ext_trait = expand_ext_trait(name, &ext_name, &variants);
    let accessor = expand_context_accessor(name, &variants);
    let from_impls = variants.iter().filter_map(|v| expand_from_source(name, &ext_name, v));
    let internal = expand_internal_from(name, &variants);

    quote! {
        #[allow(non_shorthand_field_patterns)]
        #derives
        #input

        #ext_trait
        #accessor
        #(#from_impls)*
        #internal

        #[allow(dead_code)]
        fn format_context(context: &Option<std::borrow::Cow<'static, str>>) -> std::borrow::Cow<'static, str> {
            context.as_ref().map_or(std::borrow::Cow::Borrowed(""), |c| std::borrow::Cow::Owned(format!(" ({c})")))
        }
    }
}

fn parse_variant(v: &Variant) -> syn::Result<VariantMeta<'_>> {
    let Fields::Named(fields) = &v.fields else {
        return Err(syn::Error::new_spanned(
            v,
            "gate_error requires named fields for source/context handling",
        ));
    };

    let has_context = context_field(fields)?.is_some();
    let source = fields
        .named
        .iter()
        .find(|field| {
            field.ident.as_ref().is_some_and(|ident| ident == "source")
                || has_attr(field, "source")
                || has_attr(field, "from")
        })
        .and_then(|field| field.ident.as_ref().map(|ident| (ident, &field.ty)));

    Ok(VariantMeta {
        ident: &v.ident,
        source,
        has_context,
        cfg_attrs: v.attrs.iter().filter(|attr| attr.path().is_ident("cfg")).cloned().collect(),
    })
}

fn context_field(fields: &FieldsNamed) -> syn::Result<Option<&syn::Field>> {
    let Some(field) =
        fields.named.iter().find(|f| f.ident.as_ref().is_some_and(|ident| ident == "context"))
    else {
        return Ok(None);
    };

    if is_option_cow_str(&field.ty) {
        Ok(Some(field))
    } else {
        Err(syn::Error::new_spanned(&field.ty, "context field must be Option<Cow<'static, str>>"))
    }
}

fn check_variants(variants: &[VariantMeta<'_>]) -> syn::Result<()> {
    match variants.iter().find(|v| v.source.is_some() && !v.has_context) {
        Some(v) => Err(syn::Error::new_spanned(
            v.ident,
            "gate_error requires `context: Option<Cow<'static, str>>` for variants with a source",
        )),
        None => Ok(()),
    }
}

fn missing_derives(input: &DeriveInput) -> TokenStream {
    let present = derived_names(input);
    let mut tokens = Vec::new();
    if !present.contains("Debug") {
        tokens.push(quote! { Debug });
    }
    if !present.contains("Error") {
        tokens.push(quote! { ::thiserror::Error });
    }
    if tokens.is_empty() { quote!() } else { quote! { #[derive(#(#tokens),*)] } }
}

fn expand_ext_trait(name: &Ident, ext_name: &Ident, variants: &[VariantMeta<'_>]) -> TokenStream {
    let arms = variants.iter().filter(|v| v.has_context).map(|v| {
        let cfg_attrs = &v.cfg_attrs;
        let ident = v.ident;
        quote! { #(#cfg_attrs)* #name::#ident { context: c, .. } => *c = Some(context.into()), }
    });

    quote! {
        pub trait #ext_name<T> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;
        }

        #[automatically_derived]
        impl<T> #ext_name<T> for Result<T, #name> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                self.map_err(|mut e| {
                    match &mut e {
                        #( #arms )*
                        _ => {}
                    }
                    e
                })
            }
        }
    }
}

fn expand_context_accessor(name: &Ident, variants: &[VariantMeta<'_>]) -> TokenStream {
    let arms = variants.iter().filter(|v| v.has_context).map(|v| {
        let cfg_attrs = &v.cfg_attrs;
        let ident = v.ident;
        quote! { #(#cfg_attrs)* Self::#ident { context, .. } => context.as_deref(), }
    });

    quote! {
        #[automatically_derived]
        impl #name {
            /// Returns the context attached through the `...Ext::context` helper, if any.
            #[must_use]
            #[allow(unreachable_patterns)]
            pub fn context_note(&self) -> Option<&str> {
                match self {
                    #( #arms )*
                    _ => None,
                }
            }
        }
    }
}

fn expand_from_source(
    name: &Ident,
    ext_name: &Ident,
    v: &VariantMeta<'_>,
) -> Option<TokenStream> {
    if v.ident == "Internal" {
        return None;
    }
    let (field, ty) = v.source?;
    let v_ident = v.ident;
    let cfg_attrs = &v.cfg_attrs;

    Some(quote! {
        #(#cfg_attrs)*
        #[automatically_derived]
        impl From<#ty> for #name {
            #[inline]
            fn from(#field: #ty) -> Self { Self::#v_ident { #field, context: None } }
        }

        #(#cfg_attrs)*
        impl<T> #ext_name<T> for std::result::Result<T, #ty> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> std::result::Result<T, #name> {
                self.map_err(|#field| #name::#v_ident { #field, context: Some(context.into()) })
            }
        }
    })
}

fn expand_internal_from(name: &Ident, variants: &[VariantMeta<'_>]) -> TokenStream {
    let Some(internal) = variants.iter().find(|v| v.ident == "Internal") else {
        return quote!();
    };
    let cfg_attrs = &internal.cfg_attrs;

    quote! {
        #(#cfg_attrs)*
        impl From<&'static str> for #name {
            #[inline]
            fn from(s: &'static str) -> Self { Self::Internal { message: std::borrow::Cow::Borrowed(s), context: None } }
        }
        #(#cfg_attrs)*
        impl From<String> for #name {
            #[inline]
            fn from(s: String) -> Self { Self::Internal { message: std::borrow::Cow::Owned(s), context: None } }
        }
    }
}

fn has_attr(field: &syn::Field, name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn derived_names(input: &DeriveInput) -> FxHashSet<String> {
    let mut names = FxHashSet::default();

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(segment) = meta.path.segments.last() {
                names.insert(segment.ident.to_string());
            }
            Ok(())
        });
    }

    names
}

/// Matches `Option<Cow<'static, str>>` (paths may be qualified).
fn is_option_cow_str(ty: &Type) -> bool {
    fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
        match ty {
            Type::Path(path) => path.path.segments.last(),
            _ => None,
        }
    }

    fn angle_args(segment: &syn::PathSegment) -> Option<Vec<&syn::GenericArgument>> {
        match &segment.arguments {
            syn::PathArguments::AngleBracketed(args) => Some(args.args.iter().collect()),
            _ => None,
        }
    }

    let Some(option) = last_segment(ty).filter(|s| s.ident == "Option") else {
        return false;
    };
    let Some([syn::GenericArgument::Type(cow_ty)]) = angle_args(option).as_deref() else {
        return false;
    };
    let Some(cow) = last_segment(cow_ty).filter(|s| s.ident == "Cow") else {
        return false;
    };
    let Some([syn::GenericArgument::Lifetime(lt), syn::GenericArgument::Type(str_ty)]) =
        angle_args(cow).as_deref()
    else {
        return false;
    };

    lt.ident == "static" && last_segment(str_ty).is_some_and(|s| s.ident == "str")
}
