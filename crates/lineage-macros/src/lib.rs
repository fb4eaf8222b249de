#![deny(unsafe_code)]

//! Procedural macros for lineage.
//!
//! - `lineage_attrs! { ... }`: declare context-scoped attributes on an
//!   owner type and generate their accessors

extern crate proc_macro;

mod attrs;

use proc_macro::TokenStream;
use syn::parse_macro_input;

/// Declare context-scoped attributes on existing types.
///
/// Each declaration generates, inside an inherent `impl` on the owner:
///
/// - `fn name() -> Option<T>`, or `-> T` when a `default` is given, or
///   `-> Result<T, AttributeError>` when a `try_default` is given
/// - `fn set_name(value: T) -> T`
/// - `fn name_attribute() -> &'static Attribute<T>`, public only when both
///   accessors are generated and public
///
/// Values are keyed by the owner's module path and name and resolved
/// against the native provider, so the owner must be a non-generic type in
/// scope. `T` must be `Clone + Send + Sync + 'static`.
///
/// Options, given as `#[lineage(...)]`:
/// - `inherit`: fall back to ancestor contexts
/// - `default = expr`: computed once per context when nothing is found
/// - `try_default = expr`: like `default`, with `expr: Result<T, E>`
/// - `private`, `private = reader`, `private = writer`: drop `pub` from both
///   accessors, only the getter, or only the setter
/// - `reader`, `writer`: generate only the getter or only the setter; the
///   owner's module reaches the other half through `name_attribute()`
///
/// # Example
///
/// ```ignore
/// use lineage_core::lineage_attrs;
///
/// pub struct Settings;
///
/// lineage_attrs! {
///     Settings {
///         /// UI language.
///         #[lineage(inherit, default = String::from("en"))]
///         pub locale: String;
///
///         #[lineage(private = writer)]
///         pub request_id: u64;
///     }
/// }
///
/// Settings::set_locale("fr".into());
/// assert_eq!(Settings::locale(), "fr");
/// assert_eq!(Settings::request_id(), None);
/// ```
#[proc_macro]
pub fn lineage_attrs(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as attrs::AttrsInput);
    attrs::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
