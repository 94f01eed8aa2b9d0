//! Implementation of `#[derive(Model)]`.

use crate::attrs::{apply_rename_all, container_attrs, field_attrs, ContainerAttrs, FieldAttrs, Location};
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use syn::{parse_quote, Data, DataEnum, DeriveInput, Fields, FieldsNamed, Generics};

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let container = container_attrs(&input.attrs)?;
    let generics = add_model_bounds(input.generics.clone());
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let name = &input.ident;

    let resolvers = resolver_calls(&container);
    let (descriptor, walk) = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => named_struct(&container, fields)?,
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let inner = &fields.unnamed[0].ty;
                (
                    quote! { <#inner as ::bindery_core::Model>::descriptor() },
                    quote! { ::bindery_core::Model::walk(&self.0, walker); },
                )
            }
            Fields::Unit => (
                quote! { ::bindery_core::TypeDescriptor::of::<Self>(::bindery_core::Shape::Null) },
                quote! {},
            ),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model can only be derived for tuple structs with exactly one field",
                ))
            }
        },
        Data::Enum(data) => (unit_enum(&container, data)?, quote! {}),
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(&input, "Model cannot be derived for unions"))
        }
    };

    let walker = if resolvers.is_empty() && walk.is_empty() {
        format_ident!("_walker")
    } else {
        format_ident!("walker")
    };

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::bindery_core::Model for #name #ty_generics #where_clause {
            fn descriptor() -> ::bindery_core::TypeDescriptor {
                #descriptor
            }

            fn walk(&self, #walker: &mut ::bindery_core::Walker<'_>) {
                #resolvers
                #walk
            }
        }
    })
}

fn add_model_bounds(mut generics: Generics) -> Generics {
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::bindery_core::Model));
    }
    generics
}

fn resolver_calls(container: &ContainerAttrs) -> TokenStream {
    let mut calls = TokenStream::new();
    if container.resolver {
        calls.extend(quote! { walker.resolver(self); });
    }
    if container.resolver_with_path {
        calls.extend(quote! { walker.resolver_with_path(self); });
    }
    calls
}

fn named_struct(container: &ContainerAttrs, fields: &FieldsNamed) -> syn::Result<(TokenStream, TokenStream)> {
    let mut descriptors = Vec::new();
    let mut walks = Vec::new();

    for field in &fields.named {
        let attrs = field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        let ident_str = ident.to_string();
        let ident_str = ident_str.trim_start_matches("r#");
        let key = attrs
            .rename
            .clone()
            .unwrap_or_else(|| apply_rename_all(container.rename_all.as_deref(), ident_str));
        let ty = &field.ty;

        let location = if attrs.flatten {
            if attrs.location.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "a flattened field cannot also be a parameter, body or status",
                ));
            }
            walks.push(quote! { walker.flatten(&self.#ident); });
            quote! { ::bindery_core::FieldLocation::Flatten }
        } else {
            match &attrs.location {
                None => {
                    walks.push(quote! { walker.field(#key, &self.#ident); });
                    quote! { ::bindery_core::FieldLocation::Property }
                }
                Some(Location::Param(kind, wire)) => {
                    let wire = if wire.is_empty() { key.clone() } else { wire.clone() };
                    let source = format_ident!("{}", kind.variant());
                    walks.push(quote! {
                        walker.param(::bindery_core::ParamSource::#source, #wire, &self.#ident);
                    });
                    quote! { ::bindery_core::FieldLocation::Param(::bindery_core::ParamSource::#source, #wire) }
                }
                Some(Location::Body) => {
                    walks.push(quote! { walker.field("body", &self.#ident); });
                    quote! { ::bindery_core::FieldLocation::Body }
                }
                Some(Location::Status) => quote! { ::bindery_core::FieldLocation::Status },
            }
        };

        let meta = field_meta(&attrs, container.serde_default);
        descriptors.push(quote! {
            ::bindery_core::FieldDescriptor {
                ident: #ident_str,
                key: #key,
                ty: <#ty as ::bindery_core::Model>::descriptor,
                location: #location,
                meta: #meta,
            }
        });
    }

    if container.deny_unknown_fields && container.additional_properties == Some(true) {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "additional_properties conflicts with serde(deny_unknown_fields)",
        ));
    }
    let additional = container.additional_properties.unwrap_or(false);
    let description = opt_str(container.description.as_deref());
    let named = container
        .name
        .as_deref()
        .map(|n| quote! { .named(#n) })
        .unwrap_or_default();

    let descriptor = quote! {
        ::bindery_core::TypeDescriptor::of::<Self>(::bindery_core::Shape::Record(
            ::bindery_core::RecordDescriptor {
                fields: ::std::vec![#(#descriptors),*],
                additional_properties: #additional,
                description: #description,
            },
        ))#named
    };
    Ok((descriptor, quote! { #(#walks)* }))
}

fn unit_enum(container: &ContainerAttrs, data: &DataEnum) -> syn::Result<TokenStream> {
    let mut values = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Model can only be derived for enums whose variants carry no data",
            ));
        }
        let attrs = field_attrs(&variant.attrs)?;
        if attrs.skip {
            continue;
        }
        let value = attrs.rename.clone().unwrap_or_else(|| {
            apply_rename_all(container.rename_all.as_deref(), &variant.ident.to_string())
        });
        values.push(value);
    }
    let named = container
        .name
        .as_deref()
        .map(|n| quote! { .named(#n) })
        .unwrap_or_default();
    Ok(quote! {
        ::bindery_core::TypeDescriptor::of::<Self>(
            ::bindery_core::Shape::Enum(&[#(#values),*])
        )#named
    })
}

fn field_meta(attrs: &FieldAttrs, container_default: bool) -> TokenStream {
    let mut entries = Vec::new();
    let mut push = |name: &str, value: TokenStream| {
        let name = format_ident!("{}", name);
        entries.push(quote! { #name: #value });
    };

    for (name, value) in [
        ("description", &attrs.description),
        ("default", &attrs.default),
        ("example", &attrs.example),
        ("format", &attrs.format),
        ("time_format", &attrs.time_format),
        ("pattern", &attrs.pattern),
    ] {
        if value.is_some() {
            push(name, opt_str(value.as_deref()));
        }
    }
    for (name, value) in [
        ("min_length", attrs.min_length),
        ("max_length", attrs.max_length),
        ("min_items", attrs.min_items),
        ("max_items", attrs.max_items),
    ] {
        if let Some(n) = value {
            let lit = Literal::u64_unsuffixed(n);
            push(name, quote! { ::std::option::Option::Some(#lit) });
        }
    }
    for (name, value) in [
        ("minimum", attrs.minimum),
        ("maximum", attrs.maximum),
        ("exclusive_minimum", attrs.exclusive_minimum),
        ("exclusive_maximum", attrs.exclusive_maximum),
        ("multiple_of", attrs.multiple_of),
    ] {
        if let Some(n) = value {
            let number = float_tokens(n);
            push(name, quote! { ::std::option::Option::Some(#number) });
        }
    }
    if let Some(values) = &attrs.enum_values {
        push(
            "enum_values",
            quote! { ::std::option::Option::Some(&[#(#values),*]) },
        );
    }
    for (name, value) in [
        ("unique_items", attrs.unique_items),
        ("read_only", attrs.read_only),
        ("write_only", attrs.write_only),
        ("deprecated", attrs.deprecated),
        ("explode", attrs.explode),
        ("serde_default", attrs.serde_default || container_default),
    ] {
        if value {
            push(name, quote! { true });
        }
    }
    for (name, value) in [("required", attrs.required), ("nullable", attrs.nullable)] {
        if let Some(flag) = value {
            push(name, quote! { ::std::option::Option::Some(#flag) });
        }
    }

    quote! {
        ::bindery_core::FieldMeta {
            #(#entries,)*
            ..::std::default::Default::default()
        }
    }
}

fn opt_str(value: Option<&str>) -> TokenStream {
    match value {
        Some(s) => quote! { ::std::option::Option::Some(#s) },
        None => quote! { ::std::option::Option::None },
    }
}

fn float_tokens(n: f64) -> TokenStream {
    let lit = Literal::f64_unsuffixed(n.abs());
    if n.is_sign_negative() {
        quote! { -#lit }
    } else {
        quote! { #lit }
    }
}
