#![deny(missing_docs)]

//! # Validator
//!
//! Checks an untyped decoded value against a [`Schema`], appending every
//! violation to a [`ValidateResult`].
//!
//! Validation never stops at the first failure. Only a type mismatch stops
//! descent, and only into the offending subtree. Object properties are
//! visited in schema declaration order and array elements in index order,
//! so error lists are deterministic.
//!
//! `zero_fill` repairs a value that failed validation just enough for
//! typed decoding to succeed.

use crate::errors::ValidateResult;
use crate::path::PathBuffer;
use crate::registry::Registry;
use crate::schema::{number_value, AdditionalProperties, Schema, SchemaKind};
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde_json::{Map, Value};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// Direction of the value being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A client payload: `readOnly` properties must not be set.
    WriteToServer,
    /// A server response: `writeOnly` properties must not be set.
    ReadFromServer,
}

/// Validates `value` against `schema` at the current location of `path`.
pub fn validate(
    registry: &Registry,
    schema: &Schema,
    path: &mut PathBuffer,
    mode: Mode,
    value: &Value,
    result: &mut ValidateResult,
) {
    if value.is_null() {
        if !(schema.nullable || matches!(schema.kind, SchemaKind::Null | SchemaKind::Any)) {
            result.add(path, value, expected_type(&schema.kind));
        }
        return;
    }

    let target: Arc<Schema>;
    let schema = match &schema.kind {
        SchemaKind::Ref(reference) => match registry.schema_from_ref(reference) {
            Some(resolved) => {
                target = resolved;
                &*target
            }
            None => {
                result.add(path, value, format!("unknown schema reference {}", reference));
                return;
            }
        },
        _ => schema,
    };

    let type_ok = match &schema.kind {
        SchemaKind::Any => true,
        SchemaKind::Null => false,
        SchemaKind::Boolean => value.is_boolean(),
        SchemaKind::Integer => is_integer(value),
        SchemaKind::Number => value.is_number(),
        SchemaKind::String => value.is_string(),
        SchemaKind::Array => value.is_array(),
        SchemaKind::Object => value.is_object(),
        SchemaKind::Ref(_) => false,
    };
    if !type_ok {
        result.add(path, value, expected_type(&schema.kind));
        return;
    }

    if !schema.enum_values.is_empty() && !schema.enum_values.contains(value) {
        let allowed: Vec<String> = schema.enum_values.iter().map(display_value).collect();
        result.add(
            path,
            value,
            format!("expected value to be one of \"{}\"", allowed.join(", ")),
        );
    }

    match value {
        Value::String(text) => validate_string(schema, path, value, text, result),
        Value::Number(_) => validate_number(schema, path, value, result),
        Value::Array(items) => validate_array(registry, schema, path, mode, value, items, result),
        Value::Object(map) => validate_object(registry, schema, path, mode, value, map, result),
        _ => {}
    }
}

/// Fills absent object properties that declare a `default`, recursively.
pub fn apply_defaults(registry: &Registry, schema: &Schema, value: &mut Value) {
    let target: Arc<Schema>;
    let schema = match &schema.kind {
        SchemaKind::Ref(reference) => match registry.schema_from_ref(reference) {
            Some(resolved) => {
                target = resolved;
                &*target
            }
            None => return,
        },
        _ => schema,
    };

    match value {
        Value::Object(map) => {
            for (name, property) in &schema.properties {
                match map.get_mut(name) {
                    Some(child) => apply_defaults(registry, property, child),
                    None => {
                        if let Some(default) = &property.default {
                            map.insert(name.clone(), default.clone());
                        }
                    }
                }
            }
            if let AdditionalProperties::Schema(extra) = &schema.additional_properties {
                for (key, child) in map.iter_mut() {
                    if !schema.properties.contains_key(key) {
                        apply_defaults(registry, extra, child);
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = &schema.items {
                for item in items {
                    apply_defaults(registry, item_schema, item);
                }
            }
        }
        _ => {}
    }
}

fn expected_type(kind: &SchemaKind) -> String {
    match kind.type_name() {
        Some(name) => format!("expected {}", name),
        None => "expected value".to_string(),
    }
}

/// Nesting past this depth is filled with `null` by [`zero_fill`].
const ZERO_DEPTH: usize = 32;

/// Replaces the parts of `value` that cannot decode into the type behind
/// `schema` with stand-ins.
///
/// Mismatched values become the zero value of their schema (`0`, `""`,
/// `false`, the first enum value, an empty collection), out-of-range
/// integers are clamped and missing required properties are filled in.
/// Runs after validation has reported the problems, so the typed input
/// built from the result is only ever shown to resolvers.
pub(crate) fn zero_fill(registry: &Registry, schema: &Schema, value: &mut Value) {
    if value.is_null() {
        if !(schema.nullable || matches!(schema.kind, SchemaKind::Null | SchemaKind::Any)) {
            *value = zero_value(registry, schema, 0);
        }
        return;
    }

    let target: Arc<Schema>;
    let schema = match &schema.kind {
        SchemaKind::Ref(reference) => match registry.schema_from_ref(reference) {
            Some(resolved) => {
                target = resolved;
                &*target
            }
            None => return,
        },
        _ => schema,
    };

    let decodes = match &schema.kind {
        SchemaKind::Any => true,
        SchemaKind::Null | SchemaKind::Ref(_) => false,
        SchemaKind::Boolean => value.is_boolean(),
        SchemaKind::Integer => is_integer(value),
        SchemaKind::Number => value.is_number(),
        SchemaKind::String => value.as_str().is_some_and(|text| decodes_string(schema, text)),
        SchemaKind::Array => value.is_array(),
        SchemaKind::Object => value.is_object(),
    };
    if !decodes {
        *value = zero_value(registry, schema, 0);
        return;
    }

    if value.is_number() {
        clamp(schema, value);
        return;
    }
    match value {
        Value::Array(items) => {
            if let Some(item_schema) = &schema.items {
                for item in items {
                    zero_fill(registry, item_schema, item);
                }
            }
        }
        Value::Object(map) => {
            for (name, property) in &schema.properties {
                match map.get_mut(name) {
                    Some(child) => zero_fill(registry, property, child),
                    None if schema.required.contains(name) => {
                        map.insert(name.clone(), zero_value(registry, property, 1));
                    }
                    None => {}
                }
            }
            match &schema.additional_properties {
                AdditionalProperties::Allowed(true) => {}
                AdditionalProperties::Allowed(false) => {
                    map.retain(|key, _| schema.properties.contains_key(key));
                }
                AdditionalProperties::Schema(extra) => {
                    for (key, child) in map.iter_mut() {
                        if !schema.properties.contains_key(key) {
                            zero_fill(registry, extra, child);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

/// The smallest value that decodes into the type behind `schema`.
pub(crate) fn zero_value(registry: &Registry, schema: &Schema, depth: usize) -> Value {
    if schema.nullable || depth > ZERO_DEPTH {
        return Value::Null;
    }
    if let Some(default) = &schema.default {
        return default.clone();
    }

    let target: Arc<Schema>;
    let schema = match &schema.kind {
        SchemaKind::Ref(reference) => match registry.schema_from_ref(reference) {
            Some(resolved) => {
                target = resolved;
                &*target
            }
            None => return Value::Null,
        },
        _ => schema,
    };
    if let Some(first) = schema.enum_values.first() {
        return first.clone();
    }

    match &schema.kind {
        SchemaKind::Boolean => Value::Bool(false),
        SchemaKind::Integer | SchemaKind::Number => {
            let mut zero = Value::from(0);
            clamp(schema, &mut zero);
            zero
        }
        SchemaKind::String => Value::String(
            match schema.format.as_deref() {
                Some("date-time") => "1970-01-01T00:00:00Z",
                Some("date") => "1970-01-01",
                Some("uuid") => "00000000-0000-0000-0000-000000000000",
                _ => "",
            }
            .to_string(),
        ),
        SchemaKind::Array => Value::Array(Vec::new()),
        SchemaKind::Object => {
            let mut map = Map::new();
            for name in &schema.required {
                if let Some(property) = schema.properties.get(name) {
                    map.insert(name.clone(), zero_value(registry, property, depth + 1));
                }
            }
            Value::Object(map)
        }
        SchemaKind::Any | SchemaKind::Null | SchemaKind::Ref(_) => Value::Null,
    }
}

/// Strings that typed decoding rejects: values outside the enum and
/// malformed dates or ids.
fn decodes_string(schema: &Schema, text: &str) -> bool {
    if !schema.enum_values.is_empty() && !schema.enum_values.iter().any(|v| v.as_str() == Some(text)) {
        return false;
    }
    match schema.format.as_deref() {
        Some(format @ ("date-time" | "date" | "uuid")) => check_format(format, text).is_none(),
        _ => true,
    }
}

/// Pulls a number back inside the schema's inclusive bounds.
fn clamp(schema: &Schema, value: &mut Value) {
    let Some(n) = value.as_f64() else {
        return;
    };
    if let Some(min) = schema.minimum.filter(|min| n < *min) {
        *value = number_value(min);
    } else if let Some(max) = schema.maximum.filter(|max| n > *max) {
        *value = number_value(max);
    } else if schema.kind == SchemaKind::Integer
        && value.is_u64()
        && !value.is_i64()
        && schema.maximum.is_none()
        && schema.minimum.map_or(true, |min| min < 0.0)
    {
        *value = Value::from(i64::MAX);
    }
}

/// Floats never decode into integer fields, even without a fractional part.
fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bound(n: f64) -> String {
    number_value(n).to_string()
}

fn validate_string(
    schema: &Schema,
    path: &PathBuffer,
    value: &Value,
    text: &str,
    result: &mut ValidateResult,
) {
    let length = text.chars().count() as u64;
    if let Some(min) = schema.min_length {
        if length < min {
            result.add(path, value, format!("expected length >= {}", min));
        }
    }
    if let Some(max) = schema.max_length {
        if length > max {
            result.add(path, value, format!("expected length <= {}", max));
        }
    }
    if let Some(pattern) = &schema.pattern {
        if !pattern.is_match(text) {
            result.add(
                path,
                value,
                format!("expected string to match pattern {}", pattern.as_str()),
            );
        }
    }
    if let Some(format) = &schema.format {
        if let Some(message) = check_format(format, text) {
            result.add(path, value, message);
        }
    }
}

/// Returns the violation message when `text` does not satisfy `format`.
/// Unknown formats are annotations only.
fn check_format(format: &str, text: &str) -> Option<&'static str> {
    let valid = match format {
        "date-time" => DateTime::parse_from_rfc3339(text).is_ok(),
        "date" => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
        "time" => {
            NaiveTime::parse_from_str(text, "%H:%M:%S%.f").is_ok()
                || DateTime::parse_from_rfc3339(&format!("1970-01-01T{}", text)).is_ok()
        }
        "email" | "idn-email" => is_email(text),
        "hostname" | "idn-hostname" => is_hostname(text),
        "ipv4" => text.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => text.parse::<Ipv6Addr>().is_ok(),
        "uri" | "iri" => url::Url::parse(text).is_ok(),
        "uuid" => uuid::Uuid::parse_str(text).is_ok(),
        "regex" => regex::Regex::new(text).is_ok(),
        _ => return None,
    };
    if valid {
        return None;
    }
    Some(match format {
        "date-time" => "expected string to be RFC 3339 date-time",
        "date" => "expected string to be RFC 3339 date",
        "time" => "expected string to be RFC 3339 time",
        "email" | "idn-email" => "expected string to be RFC 5322 email",
        "hostname" | "idn-hostname" => "expected string to be RFC 5890 hostname",
        "ipv4" => "expected string to be RFC 2673 ipv4",
        "ipv6" => "expected string to be RFC 2373 ipv6",
        "uri" | "iri" => "expected string to be RFC 3986 uri",
        "uuid" => "expected string to be RFC 4122 uuid",
        _ => "expected string to be regex",
    })
}

fn is_hostname(text: &str) -> bool {
    !text.is_empty()
        && text.len() <= 253
        && text.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

fn is_email(text: &str) -> bool {
    match text.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !local.chars().any(char::is_whitespace)
                && (is_hostname(domain)
                    || (domain.starts_with('[') && domain.ends_with(']')))
        }
        None => false,
    }
}

fn validate_number(schema: &Schema, path: &PathBuffer, value: &Value, result: &mut ValidateResult) {
    let Some(n) = value.as_f64() else {
        return;
    };
    // An unbounded integer without a non-negative minimum has to fit an i64.
    if schema.kind == SchemaKind::Integer
        && !value.is_i64()
        && schema.maximum.is_none()
        && schema.minimum.map_or(true, |min| min < 0.0)
    {
        result.add(path, value, format!("expected number <= {}", i64::MAX));
    }
    if let Some(min) = schema.minimum {
        if n < min {
            result.add(path, value, format!("expected number >= {}", bound(min)));
        }
    }
    if let Some(min) = schema.exclusive_minimum {
        if n <= min {
            result.add(path, value, format!("expected number > {}", bound(min)));
        }
    }
    if let Some(max) = schema.maximum {
        if n > max {
            result.add(path, value, format!("expected number <= {}", bound(max)));
        }
    }
    if let Some(max) = schema.exclusive_maximum {
        if n >= max {
            result.add(path, value, format!("expected number < {}", bound(max)));
        }
    }
    if let Some(divisor) = schema.multiple_of {
        let quotient = n / divisor;
        if (quotient - quotient.round()).abs() > 1e-9 {
            result.add(
                path,
                value,
                format!("expected number to be a multiple of {}", bound(divisor)),
            );
        }
    }
}

fn validate_array(
    registry: &Registry,
    schema: &Schema,
    path: &mut PathBuffer,
    mode: Mode,
    value: &Value,
    items: &[Value],
    result: &mut ValidateResult,
) {
    let length = items.len() as u64;
    if let Some(min) = schema.min_items {
        if length < min {
            result.add(path, value, format!("expected array length >= {}", min));
        }
    }
    if let Some(max) = schema.max_items {
        if length > max {
            result.add(path, value, format!("expected array length <= {}", max));
        }
    }
    if schema.unique_items {
        let duplicated = items
            .iter()
            .enumerate()
            .any(|(i, item)| items[..i].contains(item));
        if duplicated {
            result.add(path, value, "expected array items to be unique");
        }
    }

    if let Some(item_schema) = &schema.items {
        for (index, item) in items.iter().enumerate() {
            path.push_index(index);
            validate(registry, item_schema, path, mode, item, result);
            path.pop();
        }
    }
}

fn validate_object(
    registry: &Registry,
    schema: &Schema,
    path: &mut PathBuffer,
    mode: Mode,
    value: &Value,
    map: &Map<String, Value>,
    result: &mut ValidateResult,
) {
    let count = map.len() as u64;
    if let Some(min) = schema.min_properties {
        if count < min {
            result.add(
                path,
                value,
                format!("expected object with at least {} properties", min),
            );
        }
    }
    if let Some(max) = schema.max_properties {
        if count > max {
            result.add(
                path,
                value,
                format!("expected object with at most {} properties", max),
            );
        }
    }

    for (name, property) in &schema.properties {
        let exempt = match mode {
            Mode::WriteToServer => property.read_only,
            Mode::ReadFromServer => property.write_only,
        };
        let Some(child) = map.get(name) else {
            if schema.is_required(name) && !exempt {
                result.add_absent(
                    path.with(name),
                    format!("expected required property {} to be present", name),
                );
            }
            continue;
        };

        path.push(name);
        if exempt && !child.is_null() {
            let message = match mode {
                Mode::WriteToServer => "read only property must not be set",
                Mode::ReadFromServer => "write only property must not be set",
            };
            result.add(path, child, message);
        } else {
            validate(registry, property, path, mode, child, result);
        }
        path.pop();
    }

    for (key, child) in map {
        // The self-describing link is echoed back by clients.
        if key == "$schema" || schema.properties.contains_key(key) {
            continue;
        }
        match &schema.additional_properties {
            AdditionalProperties::Allowed(true) => {}
            AdditionalProperties::Allowed(false) => {
                path.push(key);
                result.add(path, child, "unexpected property");
                path.pop();
            }
            AdditionalProperties::Schema(extra) => {
                path.push(key);
                validate(registry, extra, path, mode, child, result);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorDetail;
    use crate::Model;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Model)]
    #[allow(dead_code)]
    struct Tag {
        #[model(min_length = 2, max_length = 4, pattern = "^[a-z]+$")]
        label: String,
    }

    #[derive(Model)]
    #[allow(dead_code)]
    struct Item {
        #[model(minimum = 1, maximum = 10, multiple_of = 2)]
        count: i64,
        tags: Vec<Tag>,
        #[model(read_only)]
        id: Option<String>,
        #[model(write_only)]
        secret: Option<String>,
        #[model(format = "email")]
        email: Option<String>,
        #[model(enum_values("small", "large"))]
        size: Option<String>,
        #[model(default = "7")]
        weight: i32,
        extra: HashMap<String, i32>,
    }

    #[derive(Model)]
    #[allow(dead_code)]
    struct Widths {
        small: u8,
        signed: i16,
        wide: i64,
        unsigned: u64,
    }

    #[derive(Model)]
    #[allow(dead_code)]
    struct Tree {
        name: String,
        children: Vec<Tree>,
    }

    fn run(registry: &Registry, schema: &Schema, mode: Mode, value: &Value) -> Vec<ErrorDetail> {
        let mut path = PathBuffer::new();
        path.push("body");
        let mut result = ValidateResult::new();
        validate(registry, schema, &mut path, mode, value, &mut result);
        assert_eq!(path.as_str(), "body");
        result.into_errors()
    }

    fn summary(errors: &[ErrorDetail]) -> Vec<(String, String)> {
        errors
            .iter()
            .map(|e| (e.location.clone().unwrap_or_default(), e.message.clone()))
            .collect()
    }

    #[test]
    fn test_every_violation_is_reported() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();
        let value = json!({
            "count": 11,
            "tags": [{"label": "ok"}, {"label": "TOOLONG"}]
        });

        let errors = run(&registry, &schema, Mode::WriteToServer, &value);
        assert_eq!(
            summary(&errors),
            vec![
                ("body.count".into(), "expected number <= 10".into()),
                ("body.count".into(), "expected number to be a multiple of 2".into()),
                ("body.tags[1].label".into(), "expected length <= 4".into()),
                (
                    "body.tags[1].label".into(),
                    "expected string to match pattern ^[a-z]+$".into()
                ),
                (
                    "body.extra".into(),
                    "expected required property extra to be present".into()
                ),
            ]
        );
        assert_eq!(errors[0].value, Some(json!(11)));
        assert_eq!(errors[4].value, None);
    }

    #[test]
    fn test_type_mismatch_stops_descent() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();
        let value = json!({"count": "many", "tags": {"label": "x"}, "weight": 2, "extra": {}});

        let errors = run(&registry, &schema, Mode::WriteToServer, &value);
        assert_eq!(
            summary(&errors),
            vec![
                ("body.count".into(), "expected integer".into()),
                ("body.tags".into(), "expected array".into()),
            ]
        );
    }

    #[test]
    fn test_integer_widths_and_floats() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Widths>(false, "").unwrap();

        let fits = json!({
            "small": 255, "signed": -32768,
            "wide": i64::MIN, "unsigned": u64::MAX
        });
        assert_eq!(run(&registry, &schema, Mode::WriteToServer, &fits), vec![]);

        let value = json!({
            "small": 300, "signed": -40000,
            "wide": 9223372036854775808u64, "unsigned": 1.0
        });
        let errors = run(&registry, &schema, Mode::WriteToServer, &value);
        assert_eq!(
            summary(&errors),
            vec![
                ("body.small".into(), "expected number <= 255".into()),
                ("body.signed".into(), "expected number >= -32768".into()),
                ("body.wide".into(), "expected number <= 9223372036854775807".into()),
                ("body.unsigned".into(), "expected integer".into()),
            ]
        );
        assert_eq!(errors[0].value, Some(json!(300)));
    }

    #[test]
    fn test_zero_fill_makes_invalid_values_decodable() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();

        let mut value = json!({
            "count": "many", "tags": {"label": "x"}, "weight": 2,
            "extra": {"a": "x"}, "size": "medium", "surprise": true
        });
        zero_fill(&registry, &schema, &mut value);
        assert_eq!(
            value,
            json!({"count": 1, "tags": [], "weight": 2, "extra": {"a": 0}, "size": null})
        );

        let mut empty = json!({});
        zero_fill(&registry, &schema, &mut empty);
        assert_eq!(empty, json!({"count": 1, "tags": [], "extra": {}}));
    }

    #[test]
    fn test_zero_fill_clamps_integers_into_their_width() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Widths>(false, "").unwrap();
        let mut value = json!({
            "small": 300, "signed": "x",
            "wide": 9223372036854775808u64, "unsigned": -1
        });
        zero_fill(&registry, &schema, &mut value);
        assert_eq!(
            value,
            json!({"small": 255, "signed": 0, "wide": i64::MAX, "unsigned": 0})
        );
    }

    #[test]
    fn test_read_only_and_write_only_depend_on_mode() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();
        let value = json!({
            "count": 2, "tags": [], "weight": 1, "extra": {},
            "id": "abc", "secret": "hunter2"
        });

        let write = run(&registry, &schema, Mode::WriteToServer, &value);
        assert_eq!(
            summary(&write),
            vec![("body.id".into(), "read only property must not be set".into())]
        );

        let read = run(&registry, &schema, Mode::ReadFromServer, &value);
        assert_eq!(
            summary(&read),
            vec![("body.secret".into(), "write only property must not be set".into())]
        );
    }

    #[test]
    fn test_unexpected_and_map_properties() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();
        let value = json!({
            "$schema": "https://example.com/schemas/Item.json",
            "count": 2, "tags": [], "weight": 1,
            "extra": {"a": 1, "b": "two"},
            "surprise": true
        });

        let errors = run(&registry, &schema, Mode::WriteToServer, &value);
        assert_eq!(
            summary(&errors),
            vec![
                ("body.extra.b".into(), "expected integer".into()),
                ("body.surprise".into(), "unexpected property".into()),
            ]
        );
    }

    #[test]
    fn test_enum_and_format() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();
        let value = json!({
            "count": 2, "tags": [], "weight": 1, "extra": {},
            "size": "medium", "email": "not-an-email"
        });

        let errors = run(&registry, &schema, Mode::WriteToServer, &value);
        assert_eq!(
            summary(&errors),
            vec![
                ("body.email".into(), "expected string to be RFC 5322 email".into()),
                (
                    "body.size".into(),
                    "expected value to be one of \"small, large\"".into()
                ),
            ]
        );
    }

    #[test]
    fn test_recursive_schema_through_refs() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Tree>(false, "").unwrap();
        let value = json!({
            "name": "root",
            "children": [{"name": "a", "children": [{"children": []}]}]
        });

        let errors = run(&registry, &schema, Mode::WriteToServer, &value);
        assert_eq!(
            summary(&errors),
            vec![(
                "body.children[0].children[0].name".into(),
                "expected required property name to be present".into()
            )]
        );
    }

    #[test]
    fn test_validation_is_idempotent() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();
        let value = json!({"count": 0, "tags": [{"label": "A"}], "extra": {"x": null}});

        let first = run(&registry, &schema, Mode::WriteToServer, &value);
        let second = run(&registry, &schema, Mode::WriteToServer, &value);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_scalar_constraints() {
        let registry = Registry::default();
        let mut schema = Schema::of(SchemaKind::Array);
        schema.min_items = Some(3);
        schema.unique_items = true;
        schema.items = Some(Box::new(Schema::of(SchemaKind::Number)));

        let errors = run(&registry, &schema, Mode::WriteToServer, &json!([1.5, 1.5]));
        assert_eq!(
            summary(&errors),
            vec![
                ("body".into(), "expected array length >= 3".into()),
                ("body".into(), "expected array items to be unique".into()),
            ]
        );

        let mut date = Schema::of(SchemaKind::String);
        date.format = Some("date".into());
        assert!(run(&registry, &date, Mode::WriteToServer, &json!("2023-01-01")).is_empty());
        assert_eq!(
            run(&registry, &date, Mode::WriteToServer, &json!("01/01/2023"))[0].message,
            "expected string to be RFC 3339 date"
        );

        let mut count = Schema::of(SchemaKind::Integer);
        count.exclusive_minimum = Some(0.0);
        assert_eq!(
            run(&registry, &count, Mode::WriteToServer, &json!(0))[0].message,
            "expected number > 0"
        );
        assert!(run(&registry, &count, Mode::WriteToServer, &json!(null))[0]
            .message
            .contains("expected integer"));
    }

    #[test]
    fn test_apply_defaults_fills_absent_properties() {
        let registry = Registry::default();
        let schema = registry.schema_for::<Item>(false, "").unwrap();
        let mut value = json!({"count": 2, "tags": [], "extra": {}});
        apply_defaults(&registry, &schema, &mut value);
        assert_eq!(value["weight"], json!(7));

        let mut present = json!({"weight": 3});
        apply_defaults(&registry, &schema, &mut present);
        assert_eq!(present["weight"], json!(3));
    }
}
