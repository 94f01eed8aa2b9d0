#![deny(missing_docs)]

//! # Bindery Core
//!
//! Request ingestion engine: turns `#[derive(Model)]` types into schemas,
//! binds path/query/header/cookie parameters and JSON bodies into typed
//! inputs, validates them, runs custom resolvers and reports every problem
//! in one structured error response.
//!
//! The engine performs no network I/O. A router adapter converts its native
//! request into a [`Request`], calls the [`Endpoint`] of the matching
//! [`Route`] and writes the returned [`Response`].

extern crate self as bindery_core;

/// Shared error types.
pub mod error;

/// Compile-time type descriptors.
pub mod descriptor;

/// Schema model.
pub mod schema;

/// Schema registry.
pub mod registry;

/// Error location tracking.
pub mod path;

/// Error details and the wire error model.
pub mod errors;

/// Schema validation.
pub mod validate;

/// Parameter binding.
pub mod binder;

/// Custom resolvers.
pub mod resolver;

/// Transport boundary types.
pub mod context;

/// Operation descriptions.
pub mod operation;

/// API configuration.
pub mod config;

/// Operation registration and routing table.
pub mod api;

/// Per-request orchestration.
pub mod endpoint;

pub use api::{register, Api, Endpoint, Route};
pub use binder::{bind, Conversion, InputSpec};
pub use config::ApiConfig;
pub use context::{Context, Request, RequestContext, Response};
pub use descriptor::{
    FieldDescriptor, FieldLocation, FieldMeta, Model, ParamSource, RecordDescriptor, Shape,
    TypeDescriptor,
};
pub use endpoint::schema_link;
pub use error::{AppError, AppResult};
pub use errors::{status_title, ErrorDetail, ErrorModel, ValidateResult};
pub use operation::{generate_operation_id, Operation, Parameter, RequestBody};
pub use path::PathBuffer;
pub use registry::{default_schema_namer, Registry, SchemaNamer};
pub use resolver::{resolve, Resolver, ResolverWithPath, Walker};
pub use schema::{AdditionalProperties, Pattern, Schema, SchemaKind};
pub use validate::{apply_defaults, validate, Mode};

/// Derives [`Model`] from a struct or a unit-only enum.
pub use bindery_derive::Model;
