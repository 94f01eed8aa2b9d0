#![deny(missing_docs)]

//! # API Composition Root
//!
//! An [`Api`] owns the schema registry and the routing table. Operations are
//! added with [`register`], which introspects the handler's input and output
//! types once. Router adapters then mount [`Api::routes`].

use crate::binder::InputSpec;
use crate::config::ApiConfig;
use crate::context::{Request, Response};
use crate::descriptor::Model;
use crate::endpoint::{OutputSpec, TypedEndpoint};
use crate::error::{AppError, AppResult};
use crate::errors::ErrorModel;
use crate::operation::{generate_operation_id, Operation, RequestBody};
use crate::registry::{default_schema_namer, Registry};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// A registered request handler, ready to be called by an adapter.
pub trait Endpoint: Send + Sync {
    /// Handles one request. The request's path captures must be filled in.
    fn call(&self, req: Request) -> BoxFuture<'static, Response>;
}

/// One entry of the routing table.
#[derive(Clone)]
pub struct Route {
    /// The completed operation.
    pub operation: Arc<Operation>,
    /// Its handler.
    pub endpoint: Arc<dyn Endpoint>,
}

/// Registry plus routing table.
pub struct Api {
    config: ApiConfig,
    registry: Arc<Registry>,
    routes: Vec<Route>,
}

impl Api {
    /// Creates an API and registers the error response schema.
    ///
    /// Fails when the configuration cannot be served or the error schema
    /// cannot be registered.
    pub fn new(config: ApiConfig) -> AppResult<Self> {
        if !config.schemas_path.starts_with('/') {
            return Err(AppError::Config(format!(
                "schemas_path '{}' must start with '/'",
                config.schemas_path
            )));
        }
        let registry = Arc::new(Registry::new(
            config.schema_prefix.clone(),
            default_schema_namer,
        ));
        registry.schema_for::<ErrorModel>(true, "ErrorModel")?;
        Ok(Self {
            config,
            registry,
            routes: Vec::new(),
        })
    }

    /// The configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// The schema registry shared by every operation.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Every registered route in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Looks a route up by operation id.
    pub fn route(&self, operation_id: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.operation.operation_id == operation_id)
    }

    /// The JSON Schema document served for a registered schema name.
    pub fn schema_document(&self, name: &str) -> Option<Value> {
        self.registry.schema_from_ref(name).map(|s| s.to_json())
    }
}

/// Registers `handler` for `op`.
///
/// The input type `I` declares its parameters and body through
/// `#[model(...)]` field attributes; the output type `O` declares response
/// headers, status and body the same way, or is serialized whole. Fails on
/// duplicate routes or ids and on types the registry cannot describe.
pub fn register<I, O, F, Fut>(api: &mut Api, op: Operation, handler: F) -> AppResult<()>
where
    I: Model + DeserializeOwned + Send + 'static,
    O: Model + Serialize + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ErrorModel>> + Send + 'static,
{
    let mut op = op;
    if op.operation_id.is_empty() {
        op.operation_id = generate_operation_id(&op.method, &op.path);
    }
    if api
        .routes
        .iter()
        .any(|r| r.operation.method == op.method && r.operation.path == op.path)
    {
        return Err(AppError::Registration(format!(
            "duplicate route {} {}",
            op.method, op.path
        )));
    }
    if api.route(&op.operation_id).is_some() {
        return Err(AppError::Registration(format!(
            "duplicate operation id '{}'",
            op.operation_id
        )));
    }

    let hint = pascal_case(&op.operation_id);
    let input = InputSpec::collect(
        &api.registry,
        &I::descriptor(),
        &op,
        &format!("{}Request", hint),
    )?;
    let output = OutputSpec::collect(
        &api.registry,
        &O::descriptor(),
        &format!("{}Response", hint),
    )?;

    op.parameters = input.parameters();
    op.request_body = input.body.as_ref().map(|body| RequestBody {
        required: body.required,
        schema: Arc::clone(&body.schema),
    });
    op.response_body = output.body_schema();

    let operation = Arc::new(op);
    info!(
        method = %operation.method,
        path = %operation.path,
        operation_id = %operation.operation_id,
        "registered operation"
    );
    let endpoint = TypedEndpoint::<I, O, F>::new(
        Arc::clone(&operation),
        Arc::clone(&api.registry),
        api.config.clone(),
        input,
        output,
        handler,
    );
    api.routes.push(Route {
        operation,
        endpoint: Arc::new(endpoint),
    });
    Ok(())
}

fn pascal_case(id: &str) -> String {
    id.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
