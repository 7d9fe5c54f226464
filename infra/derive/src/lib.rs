#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the gatekit workspace.
//!
//! * [`macro@gate_error`] turns an enum into a context-aware error type.
//! * [`macro@gate_handle`] turns a struct into a cheaply clonable shared service handle.
//!
//! Examples are `ignore`d to avoid compiling in this crate; the consuming crates exercise them.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemStruct, parse_macro_input};

/// Attribute macro for defining crate-level error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]`.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` that can be converted into this error type.
/// * **Context Accessor**: Generates `context_note()` returning the attached context, if any.
/// * **Standard Conversions**: Implements `From<T>` for variants containing a `source` field,
///   enabling the use of the `?` operator for upstream errors.
/// * **Internal Fallback**: Provides `From<&'static str>` and `From<String>` when an
///   `Internal` variant is present.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants.
/// 2. Variants that support context must include a `context: Option<Cow<'static, str>>` field.
/// 3. Variants wrapping upstream errors must include a `source: T` field (or a field marked
///    `#[source]`/`#[from]`) and a context field.
///
/// # Example
///
/// ```rust,ignore
/// use gatekit_derive::gate_error;
/// use std::borrow::Cow;
///
/// #[gate_error]
/// pub enum RegistryError {
///     #[error("Feature is already declared{}: {message}", format_context(.context))]
///     AlreadyDeclared { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[error("Internal registry error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
/// ```
#[proc_macro_attribute]
pub fn gate_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Attribute macro to define a shared service handle.
///
/// The annotated struct becomes `<Name>Inner` and a new `<Name>` wrapper holding an
/// `Arc<<Name>Inner>` is generated with:
/// 1. `Clone` (reference counted, all clones observe the same state),
/// 2. `Deref` to the inner state,
/// 3. `from_inner` and `ptr_eq` helpers.
///
/// The inner struct only derives `Debug`, so it may hold locks and other non-clonable state.
///
/// # Example
/// ```rust,ignore
/// #[gatekit_derive::gate_handle]
/// pub struct Registry {
///     entries: parking_lot::RwLock<Vec<String>>,
/// }
///
/// let registry = Registry::from_inner(RegistryInner { entries: Default::default() });
/// let other = registry.clone();
/// assert!(registry.ptr_eq(&other));
/// ```
#[proc_macro_attribute]
pub fn gate_handle(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::handle::expand_handle(input).into()
}
