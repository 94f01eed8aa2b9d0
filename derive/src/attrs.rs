//! # Attribute Parsing
//!
//! Reads `#[serde(...)]`, `#[model(...)]` and doc comments into plain
//! structs. Unknown serde keys are skipped; unknown model keys are errors.

use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use syn::meta::ParseNestedMeta;
use syn::parse::Parse;
use syn::{Attribute, Expr, ExprLit, ExprUnary, Lit, LitStr, Token, UnOp};

/// Where a field's value travels.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Location {
    Param(ParamKind, String),
    Body,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ParamKind {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamKind {
    pub(crate) fn variant(&self) -> &'static str {
        match self {
            ParamKind::Path => "Path",
            ParamKind::Query => "Query",
            ParamKind::Header => "Header",
            ParamKind::Cookie => "Cookie",
        }
    }
}

/// Type-level attributes.
#[derive(Debug, Default)]
pub(crate) struct ContainerAttrs {
    pub rename_all: Option<String>,
    pub serde_default: bool,
    pub deny_unknown_fields: bool,
    pub name: Option<String>,
    pub resolver: bool,
    pub resolver_with_path: bool,
    pub additional_properties: Option<bool>,
    pub description: Option<String>,
}

/// Field- or variant-level attributes.
#[derive(Debug, Default)]
pub(crate) struct FieldAttrs {
    pub rename: Option<String>,
    pub serde_default: bool,
    pub flatten: bool,
    pub skip: bool,
    pub location: Option<Location>,
    pub description: Option<String>,
    pub default: Option<String>,
    pub example: Option<String>,
    pub format: Option<String>,
    pub time_format: Option<String>,
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
    pub enum_values: Option<Vec<String>>,
    pub unique_items: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    pub explode: bool,
    pub required: Option<bool>,
    pub nullable: Option<bool>,
}

pub(crate) fn container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs {
        description: doc_comment(attrs),
        ..Default::default()
    };
    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    out.rename_all = Some(rename_value(&meta)?);
                } else if meta.path.is_ident("rename") {
                    let name = rename_value(&meta)?;
                    out.name.get_or_insert(name);
                } else if meta.path.is_ident("default") {
                    skip_value(&meta)?;
                    out.serde_default = true;
                } else if meta.path.is_ident("deny_unknown_fields") {
                    out.deny_unknown_fields = true;
                } else {
                    skip_value(&meta)?;
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    out.name = Some(string_value(&meta)?);
                } else if meta.path.is_ident("resolver") {
                    out.resolver = true;
                } else if meta.path.is_ident("resolver_with_path") {
                    out.resolver_with_path = true;
                } else if meta.path.is_ident("additional_properties") {
                    out.additional_properties = Some(flag_value(&meta)?);
                } else {
                    return Err(meta.error("unknown model attribute"));
                }
                Ok(())
            })?;
        }
    }
    Ok(out)
}

pub(crate) fn field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs {
        description: doc_comment(attrs),
        ..Default::default()
    };
    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    out.rename = Some(rename_value(&meta)?);
                } else if meta.path.is_ident("default") {
                    skip_value(&meta)?;
                    out.serde_default = true;
                } else if meta.path.is_ident("flatten") {
                    out.flatten = true;
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    out.skip = true;
                } else {
                    skip_value(&meta)?;
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| model_field_key(&meta, &mut out))?;
        }
    }
    Ok(out)
}

fn model_field_key(meta: &ParseNestedMeta<'_>, out: &mut FieldAttrs) -> syn::Result<()> {
    let path = &meta.path;
    let param = [
        ("path", ParamKind::Path),
        ("query", ParamKind::Query),
        ("header", ParamKind::Header),
        ("cookie", ParamKind::Cookie),
    ]
    .into_iter()
    .find(|(name, _)| path.is_ident(name));

    if let Some((_, kind)) = param {
        // A bare `query` uses the field key as the wire name.
        let name = if meta.input.peek(Token![=]) {
            string_value(meta)?
        } else {
            String::new()
        };
        set_location(meta, out, Location::Param(kind, name))
    } else if path.is_ident("body") {
        set_location(meta, out, Location::Body)
    } else if path.is_ident("status") {
        set_location(meta, out, Location::Status)
    } else if path.is_ident("flatten") {
        out.flatten = true;
        Ok(())
    } else if path.is_ident("skip") {
        out.skip = true;
        Ok(())
    } else if path.is_ident("description") {
        out.description = Some(string_value(meta)?);
        Ok(())
    } else if path.is_ident("default") {
        out.default = Some(literal_text(meta)?);
        Ok(())
    } else if path.is_ident("example") {
        out.example = Some(literal_text(meta)?);
        Ok(())
    } else if path.is_ident("format") {
        out.format = Some(string_value(meta)?);
        Ok(())
    } else if path.is_ident("time_format") {
        out.time_format = Some(string_value(meta)?);
        Ok(())
    } else if path.is_ident("pattern") {
        out.pattern = Some(string_value(meta)?);
        Ok(())
    } else if path.is_ident("min_length") {
        out.min_length = Some(count_value(meta)?);
        Ok(())
    } else if path.is_ident("max_length") {
        out.max_length = Some(count_value(meta)?);
        Ok(())
    } else if path.is_ident("min_items") {
        out.min_items = Some(count_value(meta)?);
        Ok(())
    } else if path.is_ident("max_items") {
        out.max_items = Some(count_value(meta)?);
        Ok(())
    } else if path.is_ident("minimum") {
        out.minimum = Some(number_value(meta)?);
        Ok(())
    } else if path.is_ident("maximum") {
        out.maximum = Some(number_value(meta)?);
        Ok(())
    } else if path.is_ident("exclusive_minimum") {
        out.exclusive_minimum = Some(number_value(meta)?);
        Ok(())
    } else if path.is_ident("exclusive_maximum") {
        out.exclusive_maximum = Some(number_value(meta)?);
        Ok(())
    } else if path.is_ident("multiple_of") {
        out.multiple_of = Some(number_value(meta)?);
        Ok(())
    } else if path.is_ident("enum_values") {
        let content;
        syn::parenthesized!(content in meta.input);
        let values = content.parse_terminated(<LitStr as Parse>::parse, Token![,])?;
        out.enum_values = Some(values.iter().map(LitStr::value).collect());
        Ok(())
    } else if path.is_ident("unique_items") {
        out.unique_items = flag_value(meta)?;
        Ok(())
    } else if path.is_ident("read_only") {
        out.read_only = flag_value(meta)?;
        Ok(())
    } else if path.is_ident("write_only") {
        out.write_only = flag_value(meta)?;
        Ok(())
    } else if path.is_ident("deprecated") {
        out.deprecated = flag_value(meta)?;
        Ok(())
    } else if path.is_ident("explode") {
        out.explode = flag_value(meta)?;
        Ok(())
    } else if path.is_ident("required") {
        out.required = Some(flag_value(meta)?);
        Ok(())
    } else if path.is_ident("nullable") {
        out.nullable = Some(flag_value(meta)?);
        Ok(())
    } else {
        Err(meta.error("unknown model attribute"))
    }
}

fn set_location(meta: &ParseNestedMeta<'_>, out: &mut FieldAttrs, location: Location) -> syn::Result<()> {
    if out.location.is_some() {
        return Err(meta.error("a field can only have one of path, query, header, cookie, body or status"));
    }
    out.location = Some(location);
    Ok(())
}

/// `key = "text"`.
fn string_value(meta: &ParseNestedMeta<'_>) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

/// A bare flag or `key = true|false`.
fn flag_value(meta: &ParseNestedMeta<'_>) -> syn::Result<bool> {
    if meta.input.peek(Token![=]) {
        let lit: syn::LitBool = meta.value()?.parse()?;
        Ok(lit.value)
    } else {
        Ok(true)
    }
}

/// `key = 10`.
fn count_value(meta: &ParseNestedMeta<'_>) -> syn::Result<u64> {
    let lit: syn::LitInt = meta.value()?.parse()?;
    lit.base10_parse()
}

/// `key = 1`, `key = -2.5`.
fn number_value(meta: &ParseNestedMeta<'_>) -> syn::Result<f64> {
    let expr: Expr = meta.value()?.parse()?;
    eval_number(&expr)
}

pub(crate) fn eval_number(expr: &Expr) -> syn::Result<f64> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(lit), ..
        }) => lit.base10_parse::<f64>(),
        Expr::Lit(ExprLit {
            lit: Lit::Float(lit),
            ..
        }) => lit.base10_parse::<f64>(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => eval_number(expr).map(|n| -n),
        Expr::Group(group) => eval_number(&group.expr),
        Expr::Paren(paren) => eval_number(&paren.expr),
        other => Err(syn::Error::new_spanned(other, "expected a numeric literal")),
    }
}

/// Literal text of `key = "5"`, `key = 5` or `key = true`.
fn literal_text(meta: &ParseNestedMeta<'_>) -> syn::Result<String> {
    let expr: Expr = meta.value()?.parse()?;
    match &expr {
        Expr::Lit(ExprLit { lit, .. }) => match lit {
            Lit::Str(s) => Ok(s.value()),
            Lit::Int(i) => Ok(i.base10_digits().to_string()),
            Lit::Float(f) => Ok(f.base10_digits().to_string()),
            Lit::Bool(b) => Ok(b.value.to_string()),
            other => Err(syn::Error::new_spanned(other, "unsupported literal")),
        },
        _ => eval_number(&expr).map(|n| n.to_string()),
    }
}

/// `rename = "x"` or `rename(deserialize = "x")`.
fn rename_value(meta: &ParseNestedMeta<'_>) -> syn::Result<String> {
    if meta.input.peek(Token![=]) {
        return string_value(meta);
    }
    let mut name = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("deserialize") {
            name = Some(string_value(&inner)?);
        } else {
            skip_value(&inner)?;
        }
        Ok(())
    })?;
    name.ok_or_else(|| meta.error("expected rename = \"...\" or rename(deserialize = \"...\")"))
}

/// Consumes `= expr` or `(...)` after a key this macro does not interpret.
fn skip_value(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: proc_macro2::TokenStream = content.parse()?;
    }
    Ok(())
}

/// Joins `///` lines into one description.
fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Applies a serde `rename_all` rule to a field or variant name.
pub(crate) fn apply_rename_all(rule: Option<&str>, name: &str) -> String {
    match rule {
        Some("lowercase") => name.to_lowercase(),
        Some("UPPERCASE") => name.to_uppercase(),
        Some("PascalCase") => name.to_upper_camel_case(),
        Some("camelCase") => name.to_lower_camel_case(),
        Some("snake_case") => name.to_snake_case(),
        Some("SCREAMING_SNAKE_CASE") => name.to_shouty_snake_case(),
        Some("kebab-case") => name.to_kebab_case(),
        Some("SCREAMING-KEBAB-CASE") => name.to_shouty_kebab_case(),
        _ => name.to_string(),
    }
}
