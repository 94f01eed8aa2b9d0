#![deny(missing_docs)]

//! # Schema Registry
//!
//! Builds [`Schema`]s from [`TypeDescriptor`]s and caches record schemas by
//! type identity under unique names.
//!
//! Population normally happens while operations are registered. Lookups take
//! a read lock; a type seen for the first time is built under the write lock,
//! after re-checking that no other thread registered it in the meantime, so
//! each type identity is only ever stored once under one name.

use crate::descriptor::{FieldDescriptor, FieldLocation, FieldMeta, RecordDescriptor, Shape};
use crate::error::{AppError, AppResult};
use crate::schema::{number_value, AdditionalProperties, Pattern, Schema, SchemaKind};
use crate::{Model, TypeDescriptor};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Default prefix of `$ref` locations.
pub const DEFAULT_SCHEMA_PREFIX: &str = "#/components/schemas/";

/// Derives a schema name from a Rust type name, falling back to `hint`.
pub type SchemaNamer = fn(type_name: &str, hint: &str) -> String;

/// Strips module paths and concatenates generic arguments.
///
/// `app::models::Page<app::models::User>` becomes `PageUser`.
pub fn default_schema_namer(type_name: &str, hint: &str) -> String {
    let mut name = String::new();
    for token in type_name.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':')) {
        let base = token.rsplit("::").next().unwrap_or_default();
        let mut chars = base.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    if name.is_empty() {
        hint.to_string()
    } else {
        name
    }
}

#[derive(Default)]
struct Inner {
    names: HashMap<TypeId, String>,
    schemas: IndexMap<String, Arc<Schema>>,
}

/// Cache of named record schemas.
pub struct Registry {
    prefix: String,
    namer: SchemaNamer,
    inner: RwLock<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_PREFIX, default_schema_namer)
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(prefix: impl Into<String>, namer: SchemaNamer) -> Self {
        Self {
            prefix: prefix.into(),
            namer,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// The `$ref` prefix, e.g. `#/components/schemas/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the schema for `ty`, building and caching record schemas on first use.
    ///
    /// With `allow_ref` set, records come back as `$ref` schemas. Otherwise the
    /// cached record schema itself is returned, so repeated calls for the same
    /// type share one instance. `hint` names types the namer cannot name.
    pub fn schema(&self, ty: &TypeDescriptor, allow_ref: bool, hint: &str) -> AppResult<Arc<Schema>> {
        let is_record = matches!(ty.shape, Shape::Record(_));
        if is_record {
            let inner = self.inner.read();
            if let Some(cached) = self.cached(&inner, ty.id, allow_ref) {
                return Ok(cached);
            }
        }

        let mut inner = self.inner.write();
        let schema = Builder {
            prefix: &self.prefix,
            namer: self.namer,
            inner: &mut inner,
            active: Vec::new(),
        }
        .build(ty, allow_ref, hint)?;

        if is_record {
            if let Some(cached) = self.cached(&inner, ty.id, allow_ref) {
                return Ok(cached);
            }
        }
        Ok(Arc::new(schema))
    }

    /// [`Registry::schema`] for a [`Model`] type.
    pub fn schema_for<T: Model>(&self, allow_ref: bool, hint: &str) -> AppResult<Arc<Schema>> {
        self.schema(&T::descriptor(), allow_ref, hint)
    }

    /// Builds the property schema for one record field, metadata applied.
    pub fn field_schema(&self, field: &FieldDescriptor, hint: &str) -> AppResult<Schema> {
        let mut inner = self.inner.write();
        Builder {
            prefix: &self.prefix,
            namer: self.namer,
            inner: &mut inner,
            active: Vec::new(),
        }
        .field(field, hint)
    }

    /// Looks up a registered schema by `$ref` location or bare name.
    pub fn schema_from_ref(&self, reference: &str) -> Option<Arc<Schema>> {
        let name = reference.strip_prefix(&self.prefix).unwrap_or(reference);
        self.inner.read().schemas.get(name).cloned()
    }

    /// The name `id` was registered under.
    pub fn name_of(&self, id: TypeId) -> Option<String> {
        let inner = self.inner.read();
        inner
            .names
            .get(&id)
            .filter(|name| inner.schemas.contains_key(*name))
            .cloned()
    }

    /// Snapshot of every registered schema in registration order.
    pub fn schemas(&self) -> IndexMap<String, Arc<Schema>> {
        self.inner.read().schemas.clone()
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.inner.read().schemas.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, inner: &Inner, id: TypeId, allow_ref: bool) -> Option<Arc<Schema>> {
        let name = inner.names.get(&id)?;
        let schema = inner.schemas.get(name)?;
        if allow_ref {
            Some(Arc::new(Schema::reference(format!("{}{}", self.prefix, name))))
        } else {
            Some(Arc::clone(schema))
        }
    }
}

/// Whether a property of type `ty` with `meta` must be present.
pub(crate) fn is_required(ty: &TypeDescriptor, meta: &FieldMeta) -> bool {
    if let Some(required) = meta.required {
        return required;
    }
    !(ty.is_optional() || meta.default.is_some() || meta.serde_default)
}

struct Builder<'a> {
    prefix: &'a str,
    namer: SchemaNamer,
    inner: &'a mut Inner,
    /// Non-record types being built since the closest enclosing record.
    active: Vec<TypeId>,
}

impl Builder<'_> {
    fn build(&mut self, ty: &TypeDescriptor, allow_ref: bool, hint: &str) -> AppResult<Schema> {
        if matches!(ty.shape, Shape::Record(_)) {
            return self.shape(ty, allow_ref, hint);
        }
        // Only records get a name to refer back to, so any other cycle never ends.
        if self.active.contains(&ty.id) {
            return Err(AppError::Registration(format!(
                "{} contains itself without an enclosing struct to reference",
                ty.type_name
            )));
        }
        self.active.push(ty.id);
        let schema = self.shape(ty, allow_ref, hint);
        self.active.pop();
        schema
    }

    fn shape(&mut self, ty: &TypeDescriptor, allow_ref: bool, hint: &str) -> AppResult<Schema> {
        let schema = match &ty.shape {
            Shape::Boolean => Schema::of(SchemaKind::Boolean),
            Shape::Integer { format, min, max } => {
                let mut s = Schema::of(SchemaKind::Integer);
                s.format = format.map(str::to_string);
                // 64-bit limits are left to the validator, f64 cannot hold them exactly.
                if *min != i64::MIN {
                    s.minimum = Some(*min as f64);
                }
                if *max < i64::MAX as u64 {
                    s.maximum = Some(*max as f64);
                }
                s
            }
            Shape::Number { format } => {
                let mut s = Schema::of(SchemaKind::Number);
                s.format = format.map(str::to_string);
                s
            }
            Shape::String { format } => {
                let mut s = Schema::of(SchemaKind::String);
                s.format = format.map(str::to_string);
                s
            }
            Shape::Any => Schema::of(SchemaKind::Any),
            Shape::Null => Schema::of(SchemaKind::Null),
            Shape::Optional(inner) => {
                let mut s = self.build(&inner(), true, hint)?;
                s.nullable = true;
                s
            }
            Shape::Array { items, unique } => {
                let mut s = Schema::of(SchemaKind::Array);
                s.items = Some(Box::new(self.build(&items(), true, hint)?));
                s.unique_items = *unique;
                s
            }
            Shape::Map(value) => {
                let mut s = Schema::of(SchemaKind::Object);
                s.additional_properties =
                    AdditionalProperties::Schema(Box::new(self.build(&value(), true, hint)?));
                s
            }
            Shape::Enum(values) => {
                let mut s = Schema::of(SchemaKind::String);
                s.enum_values = values.iter().map(|v| Value::String(v.to_string())).collect();
                s
            }
            Shape::Record(record) => return self.record(ty, record, allow_ref, hint),
        };
        Ok(schema)
    }

    fn record(
        &mut self,
        ty: &TypeDescriptor,
        record: &RecordDescriptor,
        allow_ref: bool,
        hint: &str,
    ) -> AppResult<Schema> {
        if let Some(name) = self.inner.names.get(&ty.id).cloned() {
            if allow_ref {
                return Ok(Schema::reference(format!("{}{}", self.prefix, name)));
            }
            return match self.inner.schemas.get(&name) {
                Some(schema) => Ok((**schema).clone()),
                None => Err(AppError::Registration(format!(
                    "schema '{}' requested inline while it is still being built",
                    name
                ))),
            };
        }

        let base = match ty.name {
            Some(explicit) => explicit.to_string(),
            None => (self.namer)(ty.type_name, hint),
        };
        let name = self.unique_name(base);
        // Reserved before the fields are built so self references resolve to `$ref`.
        self.inner.names.insert(ty.id, name.clone());
        debug!(schema = %name, type_name = ty.type_name, "registering schema");

        let outer = std::mem::take(&mut self.active);
        let built = self.object(record, hint);
        self.active = outer;
        match built {
            Ok(schema) => {
                self.inner
                    .schemas
                    .insert(name.clone(), Arc::new(schema.clone()));
                if allow_ref {
                    Ok(Schema::reference(format!("{}{}", self.prefix, name)))
                } else {
                    Ok(schema)
                }
            }
            Err(e) => {
                self.inner.names.remove(&ty.id);
                Err(e)
            }
        }
    }

    fn unique_name(&self, base: String) -> String {
        let base = if base.is_empty() {
            "Schema".to_string()
        } else {
            base
        };
        let taken = |candidate: &str| self.inner.names.values().any(|n| n == candidate);
        if !taken(&base) {
            return base;
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if !taken(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn object(&mut self, record: &RecordDescriptor, hint: &str) -> AppResult<Schema> {
        let mut schema = Schema::of(SchemaKind::Object);
        schema.description = record.description.map(str::to_string);
        schema.additional_properties = AdditionalProperties::Allowed(record.additional_properties);
        self.add_fields(&mut schema, &record.fields, hint)?;
        Ok(schema)
    }

    fn add_fields(
        &mut self,
        schema: &mut Schema,
        fields: &[FieldDescriptor],
        hint: &str,
    ) -> AppResult<()> {
        for field in fields {
            match field.location {
                FieldLocation::Property => {}
                FieldLocation::Flatten => {
                    let embedded = (field.ty)().unwrap_optional();
                    let Shape::Record(record) = &embedded.shape else {
                        return Err(AppError::Registration(format!(
                            "field '{}' is flattened but {} is not a record",
                            field.ident, embedded.type_name
                        )));
                    };
                    self.add_fields(schema, &record.fields, hint)?;
                    continue;
                }
                // Parameters, bodies and statuses travel outside the JSON document.
                FieldLocation::Param(..) | FieldLocation::Body | FieldLocation::Status => continue,
            }

            if schema.properties.contains_key(field.key) {
                return Err(AppError::Registration(format!(
                    "duplicate property '{}'",
                    field.key
                )));
            }
            let ty = (field.ty)();
            let property = self.field(field, hint)?;
            if is_required(&ty, &field.meta) {
                schema.required.push(field.key.to_string());
            }
            schema.properties.insert(field.key.to_string(), property);
        }
        Ok(())
    }

    fn field(&mut self, field: &FieldDescriptor, hint: &str) -> AppResult<Schema> {
        let mut property = self.build(&(field.ty)(), true, hint)?;
        apply_meta(&mut property, &field.meta, field.key)?;
        Ok(property)
    }
}

fn apply_meta(schema: &mut Schema, meta: &FieldMeta, key: &str) -> AppResult<()> {
    let require = |ok: bool, keyword: &str, expected: &str| -> AppResult<()> {
        if ok {
            Ok(())
        } else {
            Err(AppError::Registration(format!(
                "field '{}': '{}' requires {} schema",
                key, keyword, expected
            )))
        }
    };
    let is_string = schema.kind == SchemaKind::String;
    let is_numeric = matches!(schema.kind, SchemaKind::Integer | SchemaKind::Number);
    let is_array = schema.kind == SchemaKind::Array;

    if let Some(description) = meta.description {
        schema.description = Some(description.to_string());
    }
    if let Some(format) = meta.format {
        schema.format = Some(format.to_string());
    }

    if let Some(n) = meta.min_length {
        require(is_string, "min_length", "a string")?;
        schema.min_length = Some(n);
    }
    if let Some(n) = meta.max_length {
        require(is_string, "max_length", "a string")?;
        schema.max_length = Some(n);
    }
    if let Some(source) = meta.pattern {
        require(is_string, "pattern", "a string")?;
        let pattern = Pattern::new(source).map_err(|e| {
            AppError::Registration(format!("field '{}': invalid pattern: {}", key, e))
        })?;
        schema.pattern = Some(pattern);
    }

    // Declared bounds can narrow the range of an integer type but never widen it.
    if let Some(n) = meta.minimum {
        require(is_numeric, "minimum", "a numeric")?;
        schema.minimum = Some(schema.minimum.map_or(n, |width| width.max(n)));
    }
    if let Some(n) = meta.maximum {
        require(is_numeric, "maximum", "a numeric")?;
        schema.maximum = Some(schema.maximum.map_or(n, |width| width.min(n)));
    }
    for (keyword, bound, slot) in [
        ("exclusive_minimum", meta.exclusive_minimum, &mut schema.exclusive_minimum),
        ("exclusive_maximum", meta.exclusive_maximum, &mut schema.exclusive_maximum),
        ("multiple_of", meta.multiple_of, &mut schema.multiple_of),
    ] {
        if let Some(n) = bound {
            require(is_numeric, keyword, "a numeric")?;
            *slot = Some(n);
        }
    }
    if meta.multiple_of.is_some_and(|m| m <= 0.0) {
        return Err(AppError::Registration(format!(
            "field '{}': 'multiple_of' must be positive",
            key
        )));
    }

    if let Some(n) = meta.min_items {
        require(is_array, "min_items", "an array")?;
        schema.min_items = Some(n);
    }
    if let Some(n) = meta.max_items {
        require(is_array, "max_items", "an array")?;
        schema.max_items = Some(n);
    }
    if meta.unique_items {
        require(is_array, "unique_items", "an array")?;
        schema.unique_items = true;
    }

    if let Some(values) = meta.enum_values {
        schema.enum_values = values
            .iter()
            .map(|raw| literal(schema, raw, key, "enum"))
            .collect::<AppResult<_>>()?;
    }
    if let Some(raw) = meta.default {
        schema.default = Some(literal(schema, raw, key, "default")?);
    }
    if let Some(raw) = meta.example {
        let example = literal(schema, raw, key, "example")?;
        schema.examples.push(example);
    }

    if let Some(nullable) = meta.nullable {
        schema.nullable = nullable;
    }
    schema.read_only |= meta.read_only;
    schema.write_only |= meta.write_only;
    schema.deprecated |= meta.deprecated;
    Ok(())
}

fn literal(schema: &Schema, raw: &str, key: &str, what: &str) -> AppResult<Value> {
    parse_literal(raw, &schema.kind).map_err(|e| {
        AppError::Registration(format!(
            "field '{}': cannot parse {} value '{}': {}",
            key, what, raw, e
        ))
    })
}

/// Parses a metadata literal as a value of `kind`.
pub(crate) fn parse_literal(raw: &str, kind: &SchemaKind) -> Result<Value, String> {
    match kind {
        SchemaKind::String => Ok(Value::String(raw.to_string())),
        SchemaKind::Integer => {
            let trimmed = raw.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                Ok(Value::from(n))
            } else {
                trimmed
                    .parse::<u64>()
                    .map(Value::from)
                    .map_err(|e| e.to_string())
            }
        }
        SchemaKind::Number => raw
            .trim()
            .parse::<f64>()
            .map_err(|e| e.to_string())
            .and_then(|n| {
                if n.is_finite() {
                    Ok(number_value(n))
                } else {
                    Err("number is not finite".to_string())
                }
            }),
        SchemaKind::Boolean => raw
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| e.to_string()),
        _ => serde_json::from_str(raw).map_err(|e| e.to_string()),
    }
}
