#![deny(missing_docs)]

//! # Type Descriptors
//!
//! Compile-time description of Rust types as JSON shapes.
//!
//! Every type that can appear in a request or response implements [`Model`],
//! usually through `#[derive(Model)]`. The registry walks these descriptors
//! once, at registration time, to build [`crate::Schema`] graphs. Child types
//! are referenced through plain function pointers, so describing a
//! self-referential record never recurses.

use crate::resolver::Walker;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Lazily produces the descriptor of a child type.
pub type DescriptorFn = fn() -> TypeDescriptor;

/// A type that can be described as a JSON shape and walked by the resolver pipeline.
pub trait Model: 'static {
    /// Describes the shape of `Self`.
    fn descriptor() -> TypeDescriptor;

    /// Visits nested values that may carry custom resolvers.
    ///
    /// Scalars have nothing to visit. Containers forward to their elements,
    /// records forward to their fields.
    fn walk(&self, walker: &mut Walker<'_>) {
        let _ = walker;
    }
}

/// The description of one Rust type.
#[derive(Clone)]
pub struct TypeDescriptor {
    /// Identity used as the registry cache key.
    pub id: TypeId,
    /// Fully qualified Rust type name, fed to the schema namer.
    pub type_name: &'static str,
    /// Explicit schema name, overriding the namer.
    pub name: Option<&'static str>,
    /// The JSON shape.
    pub shape: Shape,
}

impl TypeDescriptor {
    /// Describes `T` with the given shape.
    pub fn of<T: ?Sized + 'static>(shape: Shape) -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
            shape,
        }
    }

    /// Overrides the schema name.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Whether the type is `Option<_>`.
    pub fn is_optional(&self) -> bool {
        matches!(self.shape, Shape::Optional(_))
    }

    /// Strips `Option` wrappers, returning the innermost descriptor.
    pub fn unwrap_optional(&self) -> TypeDescriptor {
        let mut current = self.clone();
        while let Shape::Optional(inner) = current.shape {
            current = inner();
        }
        current
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

/// The JSON shape of a type.
#[derive(Clone)]
pub enum Shape {
    /// `true` / `false`.
    Boolean,
    /// Whole numbers.
    Integer {
        /// Format hint such as `int32`.
        format: Option<&'static str>,
        /// Smallest value the type holds.
        min: i64,
        /// Largest value the type holds.
        max: u64,
    },
    /// Floating point numbers.
    Number {
        /// Format hint such as `double`.
        format: Option<&'static str>,
    },
    /// Text, optionally with a well-known format.
    String {
        /// Format hint such as `date-time`.
        format: Option<&'static str>,
    },
    /// Any JSON value.
    Any,
    /// Only `null`.
    Null,
    /// A nullable wrapper around another type.
    Optional(DescriptorFn),
    /// A sequence.
    Array {
        /// Element type.
        items: DescriptorFn,
        /// Whether elements are distinct by construction (sets).
        unique: bool,
    },
    /// A string-keyed map.
    Map(DescriptorFn),
    /// A closed set of string values.
    Enum(&'static [&'static str]),
    /// A record with named fields.
    Record(RecordDescriptor),
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Boolean => write!(f, "Boolean"),
            Shape::Integer { format, min, max } => f
                .debug_struct("Integer")
                .field("format", format)
                .field("min", min)
                .field("max", max)
                .finish(),
            Shape::Number { format } => f.debug_struct("Number").field("format", format).finish(),
            Shape::String { format } => f.debug_struct("String").field("format", format).finish(),
            Shape::Any => write!(f, "Any"),
            Shape::Null => write!(f, "Null"),
            // Child descriptors are not expanded: they may be recursive.
            Shape::Optional(inner) => write!(f, "Optional({})", inner().type_name),
            Shape::Array { items, unique } => {
                write!(f, "Array({}, unique: {})", items().type_name, unique)
            }
            Shape::Map(value) => write!(f, "Map({})", value().type_name),
            Shape::Enum(values) => f.debug_tuple("Enum").field(values).finish(),
            Shape::Record(record) => f
                .debug_struct("Record")
                .field(
                    "fields",
                    &record.fields.iter().map(|fd| fd.key).collect::<Vec<_>>(),
                )
                .finish(),
        }
    }
}

/// The fields of a record.
#[derive(Clone, Default)]
pub struct RecordDescriptor {
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Whether keys outside `fields` are accepted.
    pub additional_properties: bool,
    /// Doc comment of the type.
    pub description: Option<&'static str>,
}

/// One field of a record.
#[derive(Clone)]
pub struct FieldDescriptor {
    /// The Rust field name.
    pub ident: &'static str,
    /// The serde key of the field.
    pub key: &'static str,
    /// Descriptor of the field type.
    pub ty: DescriptorFn,
    /// Where the field's value comes from.
    pub location: FieldLocation,
    /// Declarative metadata.
    pub meta: FieldMeta,
}

/// Source of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    /// A regular JSON property.
    Property,
    /// A request parameter (or a response header).
    Param(ParamSource, &'static str),
    /// The request or response body.
    Body,
    /// The response status code.
    Status,
    /// A record whose fields are inlined into the parent.
    Flatten,
}

/// Location of a request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    /// Captured from the path template, e.g. `/users/{id}`.
    Path,
    /// Read from the query string.
    Query,
    /// Read from a request header.
    Header,
    /// Read from the `Cookie` header.
    Cookie,
}

impl ParamSource {
    /// The location prefix used in error locations.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative per-field metadata.
///
/// Literal values (`default`, `example`, `enum_values`) are kept as written and
/// parsed against the field type when the schema is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMeta {
    /// Doc comment of the field.
    pub description: Option<&'static str>,
    /// Default value literal.
    pub default: Option<&'static str>,
    /// Example value literal.
    pub example: Option<&'static str>,
    /// Format override.
    pub format: Option<&'static str>,
    /// strftime-style format for time parameters.
    pub time_format: Option<&'static str>,
    /// Minimum string length.
    pub min_length: Option<u64>,
    /// Maximum string length.
    pub max_length: Option<u64>,
    /// Regular expression strings must match.
    pub pattern: Option<&'static str>,
    /// Inclusive lower bound.
    pub minimum: Option<f64>,
    /// Inclusive upper bound.
    pub maximum: Option<f64>,
    /// Exclusive lower bound.
    pub exclusive_minimum: Option<f64>,
    /// Exclusive upper bound.
    pub exclusive_maximum: Option<f64>,
    /// Numbers must be a multiple of this value.
    pub multiple_of: Option<f64>,
    /// Minimum array length.
    pub min_items: Option<u64>,
    /// Maximum array length.
    pub max_items: Option<u64>,
    /// Array elements must be distinct.
    pub unique_items: bool,
    /// Allowed value literals.
    pub enum_values: Option<&'static [&'static str]>,
    /// Only ever sent by the server.
    pub read_only: bool,
    /// Only ever sent by the client.
    pub write_only: bool,
    /// Marked as deprecated.
    pub deprecated: bool,
    /// Explicit requiredness override.
    pub required: Option<bool>,
    /// Explicit nullability override.
    pub nullable: Option<bool>,
    /// Lists are read from repeated query occurrences rather than split on commas.
    pub explode: bool,
    /// The field carries `#[serde(default)]`.
    pub serde_default: bool,
}

macro_rules! integer_models {
    ($($t:ty => $format:expr;)*) => {
        $(
            impl Model for $t {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::of::<$t>(Shape::Integer {
                        format: $format,
                        min: <$t>::MIN as i64,
                        max: <$t>::MAX as u64,
                    })
                }
            }
        )*
    };
}

integer_models! {
    i8 => Some("int8");
    i16 => Some("int16");
    i32 => Some("int32");
    i64 => Some("int64");
    isize => Some("int64");
    u8 => Some("int8");
    u16 => Some("int16");
    u32 => Some("int32");
    u64 => Some("int64");
    usize => Some("int64");
}

impl Model for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<f32>(Shape::Number {
            format: Some("float"),
        })
    }
}

impl Model for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<f64>(Shape::Number {
            format: Some("double"),
        })
    }
}

impl Model for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<bool>(Shape::Boolean)
    }
}

impl Model for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<String>(Shape::String { format: None })
    }
}

impl Model for char {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<char>(Shape::String { format: None })
    }
}

impl Model for () {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<()>(Shape::Null)
    }
}

impl Model for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<Value>(Shape::Any)
    }
}

impl Model for DateTime<Utc> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<DateTime<Utc>>(Shape::String {
            format: Some("date-time"),
        })
    }
}

impl Model for DateTime<FixedOffset> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<DateTime<FixedOffset>>(Shape::String {
            format: Some("date-time"),
        })
    }
}

impl Model for NaiveDate {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<NaiveDate>(Shape::String {
            format: Some("date"),
        })
    }
}

impl Model for uuid::Uuid {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<uuid::Uuid>(Shape::String {
            format: Some("uuid"),
        })
    }
}

impl<T: Model> Model for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<Option<T>>(Shape::Optional(T::descriptor))
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        if let Some(inner) = self {
            inner.walk(walker);
        }
    }
}

// Smart pointers are transparent: they share the pointee's identity and schema.
impl<T: Model> Model for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        (**self).walk(walker);
    }
}

impl<T: Model> Model for Arc<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        (**self).walk(walker);
    }
}

impl<T: Model> Model for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<Vec<T>>(Shape::Array {
            items: T::descriptor,
            unique: false,
        })
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        for (index, item) in self.iter().enumerate() {
            walker.index(index, item);
        }
    }
}

impl<T: Model> Model for VecDeque<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<VecDeque<T>>(Shape::Array {
            items: T::descriptor,
            unique: false,
        })
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        for (index, item) in self.iter().enumerate() {
            walker.index(index, item);
        }
    }
}

impl<T: Model + Ord> Model for HashSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<HashSet<T>>(Shape::Array {
            items: T::descriptor,
            unique: true,
        })
    }

    /// Elements are walked in sorted order, so indices are stable across runs.
    fn walk(&self, walker: &mut Walker<'_>) {
        let mut items: Vec<&T> = self.iter().collect();
        items.sort();
        for (index, item) in items.into_iter().enumerate() {
            walker.index(index, item);
        }
    }
}

impl<T: Model> Model for BTreeSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<BTreeSet<T>>(Shape::Array {
            items: T::descriptor,
            unique: true,
        })
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        for (index, item) in self.iter().enumerate() {
            walker.index(index, item);
        }
    }
}

impl<V: Model> Model for HashMap<String, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<HashMap<String, V>>(Shape::Map(V::descriptor))
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        let mut keys: Vec<&String> = self.keys().collect();
        keys.sort();
        for key in keys {
            walker.field(key, &self[key]);
        }
    }
}

impl<V: Model> Model for BTreeMap<String, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<BTreeMap<String, V>>(Shape::Map(V::descriptor))
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        for (key, value) in self {
            walker.field(key, value);
        }
    }
}

impl<V: Model> Model for IndexMap<String, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<IndexMap<String, V>>(Shape::Map(V::descriptor))
    }

    fn walk(&self, walker: &mut Walker<'_>) {
        for (key, value) in self {
            walker.field(key, value);
        }
    }
}
