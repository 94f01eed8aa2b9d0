#![deny(missing_docs)]

//! # Schema Model
//!
//! Passive description of a data shape plus its constraints.
//!
//! Schemas own their inline children. Records are stored in the
//! [`crate::Registry`] and referenced by name (`$ref`), which is the only
//! way a schema graph can be cyclic.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// The type a schema accepts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchemaKind {
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// JSON string.
    String,
    /// Whole JSON number.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// Only `null`.
    Null,
    /// Anything.
    #[default]
    Any,
    /// Reference to a registered schema, e.g. `#/components/schemas/User`.
    Ref(String),
}

impl SchemaKind {
    /// The JSON Schema `type` keyword value, if any.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            SchemaKind::Object => Some("object"),
            SchemaKind::Array => Some("array"),
            SchemaKind::String => Some("string"),
            SchemaKind::Integer => Some("integer"),
            SchemaKind::Number => Some("number"),
            SchemaKind::Boolean => Some("boolean"),
            SchemaKind::Null => Some("null"),
            SchemaKind::Any | SchemaKind::Ref(_) => None,
        }
    }
}

/// Whether, and how, keys outside `properties` are accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    /// Accepted (`true`) or rejected (`false`) without further checks.
    Allowed(bool),
    /// Accepted when they match the schema.
    Schema(Box<Schema>),
}

impl Default for AdditionalProperties {
    fn default() -> Self {
        AdditionalProperties::Allowed(true)
    }
}

/// A compiled regular expression that remembers its source.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles `source`.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `text` matches.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

/// Structural and constraint description of one value shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    /// Accepted type.
    pub kind: SchemaKind,
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// `null` is accepted in addition to `kind`.
    pub nullable: bool,
    /// Object properties in declaration order.
    pub properties: IndexMap<String, Schema>,
    /// Required property names in declaration order.
    pub required: Vec<String>,
    /// Handling of undeclared object keys.
    pub additional_properties: AdditionalProperties,
    /// Minimum number of object keys.
    pub min_properties: Option<u64>,
    /// Maximum number of object keys.
    pub max_properties: Option<u64>,
    /// Element schema for arrays.
    pub items: Option<Box<Schema>>,
    /// Minimum array length.
    pub min_items: Option<u64>,
    /// Maximum array length.
    pub max_items: Option<u64>,
    /// Array elements must be distinct.
    pub unique_items: bool,
    /// Format hint / check.
    pub format: Option<String>,
    /// Minimum string length in characters.
    pub min_length: Option<u64>,
    /// Maximum string length in characters.
    pub max_length: Option<u64>,
    /// Strings must match this expression.
    pub pattern: Option<Pattern>,
    /// Inclusive lower bound.
    pub minimum: Option<f64>,
    /// Exclusive lower bound.
    pub exclusive_minimum: Option<f64>,
    /// Inclusive upper bound.
    pub maximum: Option<f64>,
    /// Exclusive upper bound.
    pub exclusive_maximum: Option<f64>,
    /// Numbers must be a multiple of this value.
    pub multiple_of: Option<f64>,
    /// Allowed values.
    pub enum_values: Vec<Value>,
    /// Value used when the property is absent.
    pub default: Option<Value>,
    /// Example values.
    pub examples: Vec<Value>,
    /// Only ever sent by the server.
    pub read_only: bool,
    /// Only ever sent by the client.
    pub write_only: bool,
    /// Deprecated.
    pub deprecated: bool,
}

impl Schema {
    /// A schema of the given kind without constraints.
    pub fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// A `$ref` schema.
    pub fn reference(reference: impl Into<String>) -> Self {
        Self::of(SchemaKind::Ref(reference.into()))
    }

    /// The referenced location when this is a `$ref` schema.
    pub fn reference_target(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Whether `name` is listed as required.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Renders the schema as a JSON Schema document.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let SchemaKind::Ref(r) = &self.kind {
            out.insert("$ref".into(), Value::String(r.clone()));
        }
        if let Some(t) = self.kind.type_name() {
            if self.nullable {
                out.insert("type".into(), serde_json::json!([t, "null"]));
            } else {
                out.insert("type".into(), Value::String(t.into()));
            }
        }
        insert_opt(&mut out, "title", self.title.clone().map(Value::String));
        insert_opt(
            &mut out,
            "description",
            self.description.clone().map(Value::String),
        );
        insert_opt(&mut out, "format", self.format.clone().map(Value::String));

        if !self.properties.is_empty() {
            let props: Map<String, Value> = self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            out.insert("properties".into(), Value::Object(props));
        }
        if !self.required.is_empty() {
            out.insert(
                "required".into(),
                Value::Array(self.required.iter().cloned().map(Value::String).collect()),
            );
        }
        if self.kind == SchemaKind::Object {
            match &self.additional_properties {
                AdditionalProperties::Allowed(true) => {}
                AdditionalProperties::Allowed(false) => {
                    out.insert("additionalProperties".into(), Value::Bool(false));
                }
                AdditionalProperties::Schema(s) => {
                    out.insert("additionalProperties".into(), s.to_json());
                }
            }
        }
        if let Some(items) = &self.items {
            out.insert("items".into(), items.to_json());
        }

        insert_opt(&mut out, "minProperties", self.min_properties.map(Value::from));
        insert_opt(&mut out, "maxProperties", self.max_properties.map(Value::from));
        insert_opt(&mut out, "minItems", self.min_items.map(Value::from));
        insert_opt(&mut out, "maxItems", self.max_items.map(Value::from));
        if self.unique_items {
            out.insert("uniqueItems".into(), Value::Bool(true));
        }
        insert_opt(&mut out, "minLength", self.min_length.map(Value::from));
        insert_opt(&mut out, "maxLength", self.max_length.map(Value::from));
        insert_opt(
            &mut out,
            "pattern",
            self.pattern.as_ref().map(|p| Value::String(p.as_str().into())),
        );
        insert_opt(&mut out, "minimum", self.minimum.map(number_value));
        insert_opt(
            &mut out,
            "exclusiveMinimum",
            self.exclusive_minimum.map(number_value),
        );
        insert_opt(&mut out, "maximum", self.maximum.map(number_value));
        insert_opt(
            &mut out,
            "exclusiveMaximum",
            self.exclusive_maximum.map(number_value),
        );
        insert_opt(&mut out, "multipleOf", self.multiple_of.map(number_value));
        if !self.enum_values.is_empty() {
            out.insert("enum".into(), Value::Array(self.enum_values.clone()));
        }
        insert_opt(&mut out, "default", self.default.clone());
        if !self.examples.is_empty() {
            out.insert("examples".into(), Value::Array(self.examples.clone()));
        }
        if self.read_only {
            out.insert("readOnly".into(), Value::Bool(true));
        }
        if self.write_only {
            out.insert("writeOnly".into(), Value::Bool(true));
        }
        if self.deprecated {
            out.insert("deprecated".into(), Value::Bool(true));
        }
        Value::Object(out)
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn insert_opt(out: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(v) = value {
        out.insert(key.to_string(), v);
    }
}

/// Emits whole floats as integers so `1.0` renders as `1`.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
