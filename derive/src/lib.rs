//! # Bindery Derive
//!
//! `#[derive(Model)]` for `bindery-core`.
//!
//! Field metadata is declared with `#[model(...)]`:
//!
//! - location: `path = "id"`, `query`, `header = "X-Count"`, `cookie`, `body`, `status`
//! - schema: `description`, `default`, `example`, `format`, `time_format`,
//!   `pattern`, `min_length`, `max_length`, `minimum`, `maximum`,
//!   `exclusive_minimum`, `exclusive_maximum`, `multiple_of`, `min_items`,
//!   `max_items`, `unique_items`, `enum_values("a", "b")`, `read_only`,
//!   `write_only`, `deprecated`, `required`, `nullable`, `explode`
//!
//! On the type: `rename = "Name"`, `resolver`, `resolver_with_path` and
//! `additional_properties`. The serde attributes `rename`, `rename_all`,
//! `default`, `flatten` and `skip` are honoured so the schema matches what
//! serde accepts.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod model;

/// Implements `bindery_core::Model` for a struct or a unit-only enum.
#[proc_macro_derive(Model, attributes(model, serde))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
