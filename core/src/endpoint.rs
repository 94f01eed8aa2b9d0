#![deny(missing_docs)]

//! # Request Orchestrator
//!
//! Runs one request through the phases of a registered operation:
//!
//! 1. bind path, query, header and cookie parameters;
//! 2. read and decode the body (an unparseable body aborts with a single 400);
//! 3. apply body defaults and validate the body under the `body` prefix;
//! 4. deserialize the typed input and run the resolver pipeline;
//! 5. answer 422 with every collected error, or call the handler;
//! 6. encode the handler output into status, headers and body.
//!
//! Every phase up to the handler call completes even when an earlier phase
//! reported errors, so one response carries every problem with the request.
//! When invalid values keep the typed input from decoding, they are replaced
//! by zero values so resolvers still run. Only an oversized body (413), a
//! non-JSON content type (415) and an unparseable body (400) abort early,
//! since the body is never interpreted in those cases.

use crate::api::Endpoint;
use crate::binder::{bind, InputSpec};
use crate::config::ApiConfig;
use crate::context::{Request, RequestContext, Response};
use crate::descriptor::{FieldLocation, Model, ParamSource, Shape};
use crate::error::{AppError, AppResult};
use crate::errors::{ErrorDetail, ErrorModel, ValidateResult};
use crate::operation::Operation;
use crate::path::PathBuffer;
use crate::registry::Registry;
use crate::resolver::resolve;
use crate::schema::Schema;
use crate::validate::{apply_defaults, validate, zero_fill, zero_value, Mode};
use crate::TypeDescriptor;
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::TypeId;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

const JSON: &str = "application/json";
const PROBLEM_JSON: &str = "application/problem+json";

/// Where a response body comes from and how it is described.
#[derive(Debug, Clone)]
pub(crate) struct BodyOut {
    key: &'static str,
    schema: Arc<Schema>,
    name: Option<String>,
}

/// How handler output is turned into a response.
#[derive(Debug, Clone)]
pub(crate) enum OutputSpec {
    /// Nothing to write: `()` or a record without fields.
    Empty,
    /// The whole output is the body.
    Whole(BodyOut),
    /// A record routing fields to headers, status and body.
    Envelope {
        headers: Vec<(&'static str, &'static str)>,
        status: Option<&'static str>,
        body: Option<BodyOut>,
    },
}

impl OutputSpec {
    pub(crate) fn collect(registry: &Registry, output: &TypeDescriptor, hint: &str) -> AppResult<Self> {
        let record = match &output.shape {
            Shape::Null => return Ok(OutputSpec::Empty),
            Shape::Record(record) => record,
            _ => {
                return Ok(OutputSpec::Whole(BodyOut {
                    key: "",
                    schema: registry.schema(output, true, hint)?,
                    name: record_name(registry, output),
                }))
            }
        };
        if record.fields.is_empty() {
            return Ok(OutputSpec::Empty);
        }
        let is_envelope = record.fields.iter().any(|f| {
            matches!(
                f.location,
                FieldLocation::Param(..) | FieldLocation::Status | FieldLocation::Body
            )
        });
        if !is_envelope {
            return Ok(OutputSpec::Whole(BodyOut {
                key: "",
                schema: registry.schema(output, true, hint)?,
                name: record_name(registry, output),
            }));
        }

        let mut headers = Vec::new();
        let mut status = None;
        let mut body = None;
        for field in &record.fields {
            match field.location {
                FieldLocation::Param(ParamSource::Header, name) => headers.push((field.key, name)),
                FieldLocation::Status => status = Some(field.key),
                FieldLocation::Body => {
                    body = Some(BodyOut {
                        key: field.key,
                        schema: Arc::new(registry.field_schema(field, hint)?),
                        name: record_name(registry, &(field.ty)()),
                    })
                }
                _ => {
                    return Err(AppError::Registration(format!(
                        "output field '{}' of {} must be a header, the status or the body",
                        field.ident, output.type_name
                    )))
                }
            }
        }
        Ok(OutputSpec::Envelope {
            headers,
            status,
            body,
        })
    }

    pub(crate) fn body_schema(&self) -> Option<Arc<Schema>> {
        match self {
            OutputSpec::Empty => None,
            OutputSpec::Whole(body) => Some(Arc::clone(&body.schema)),
            OutputSpec::Envelope { body, .. } => body.as_ref().map(|b| Arc::clone(&b.schema)),
        }
    }
}

fn record_name(registry: &Registry, ty: &TypeDescriptor) -> Option<String> {
    let inner = ty.unwrap_optional();
    match inner.shape {
        Shape::Record(_) => registry.name_of(inner.id),
        _ => None,
    }
}

/// State shared by every call of one endpoint.
struct Shared {
    op: Arc<Operation>,
    registry: Arc<Registry>,
    config: ApiConfig,
    input: InputSpec,
    output: OutputSpec,
    unit_input: bool,
}

/// Endpoint for a handler taking `I` and producing `O`.
pub(crate) struct TypedEndpoint<I, O, F> {
    shared: Arc<Shared>,
    handler: F,
    _types: PhantomData<fn() -> (I, O)>,
}

impl<I: Model, O, F> TypedEndpoint<I, O, F> {
    pub(crate) fn new(
        op: Arc<Operation>,
        registry: Arc<Registry>,
        config: ApiConfig,
        input: InputSpec,
        output: OutputSpec,
        handler: F,
    ) -> Self {
        let unit_input = matches!(I::descriptor().shape, Shape::Null);
        Self {
            shared: Arc::new(Shared {
                op,
                registry,
                config,
                input,
                output,
                unit_input,
            }),
            handler,
            _types: PhantomData,
        }
    }
}

impl<I, O, F, Fut> Endpoint for TypedEndpoint<I, O, F>
where
    I: Model + DeserializeOwned + Send + 'static,
    O: Model + Serialize + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ErrorModel>> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        let input = match self.shared.prepare::<I>(&req) {
            Ok(input) => input,
            Err(err) => return future::ready(self.shared.error_response(err, &req.host)).boxed(),
        };
        let shared = Arc::clone(&self.shared);
        let host = req.host;
        let pending = (self.handler)(input);
        async move {
            match pending.await {
                Ok(output) => shared.encode(&output, &host),
                Err(err) => shared.error_response(err, &host),
            }
        }
        .boxed()
    }
}

impl Shared {
    /// Every phase before the handler call.
    fn prepare<I: Model + DeserializeOwned>(&self, req: &Request) -> Result<I, ErrorModel> {
        let ctx = RequestContext::new(&self.op, req);
        let mut path = PathBuffer::new();
        let mut result = ValidateResult::new();

        let mut fields = bind(&self.input, &self.registry, &ctx, &mut path, &mut result);

        if let Some(body) = &self.input.body {
            let limit = self.op.max_body_bytes.unwrap_or(self.config.max_body_bytes);
            if req.body.len() > limit {
                return Err(ErrorModel::new(
                    413,
                    format!("request body is too large, limit is {} bytes", limit),
                ));
            }

            if req.body.iter().all(u8::is_ascii_whitespace) {
                if body.required {
                    result.add_absent("body", "request body is required");
                }
            } else {
                let content_type = req.header("content-type").unwrap_or(JSON);
                if !is_json(content_type) {
                    return Err(ErrorModel::new(
                        415,
                        format!("unsupported content type {}", content_type),
                    ));
                }
                let mut value: Value = match serde_json::from_slice(&req.body) {
                    Ok(value) => value,
                    Err(e) => {
                        return Err(ErrorModel::bad_request("unable to parse request body")
                            .with_errors(vec![ErrorDetail::new(e.to_string()).with_location("body")]))
                    }
                };
                apply_defaults(&self.registry, &body.schema, &mut value);
                path.push("body");
                validate(
                    &self.registry,
                    &body.schema,
                    &mut path,
                    Mode::WriteToServer,
                    &value,
                    &mut result,
                );
                path.pop();
                fields.insert(body.key.to_string(), value);
            }
        }

        let mut raw = if self.unit_input {
            Value::Null
        } else {
            Value::Object(fields)
        };
        let mut decoded = <I as Deserialize>::deserialize(&raw);
        if decoded.is_err() && !result.is_empty() {
            self.zero_fill(&mut raw);
            decoded = <I as Deserialize>::deserialize(&raw);
        }
        let input = match decoded {
            Ok(input) => {
                resolve(&input, &ctx, &mut path, &mut result);
                Some(input)
            }
            Err(e) => {
                // Errors already reported usually explain why decoding failed.
                if result.is_empty() {
                    result.push(ErrorDetail::new(format!("unable to decode input: {}", e)));
                }
                None
            }
        };

        match input {
            Some(input) if result.is_empty() => Ok(input),
            _ => {
                debug!(
                    operation_id = %self.op.operation_id,
                    errors = result.len(),
                    "request rejected"
                );
                Err(ErrorModel::unprocessable_entity("validation failed")
                    .with_errors(result.into_errors()))
            }
        }
    }

    /// Stands zero values in for the bound fields that failed validation.
    fn zero_fill(&self, raw: &mut Value) {
        let Value::Object(fields) = raw else {
            return;
        };
        let slots = self
            .input
            .params
            .iter()
            .map(|p| (p.key, p.required, &p.schema))
            .chain(self.input.body.iter().map(|b| (b.key, b.required, &*b.schema)));
        for (key, required, schema) in slots {
            match fields.get_mut(key) {
                Some(value) => zero_fill(&self.registry, schema, value),
                None if required => {
                    fields.insert(key.to_string(), zero_value(&self.registry, schema, 0));
                }
                None => {}
            }
        }
    }

    fn encode<O: Serialize>(&self, output: &O, host: &str) -> Response {
        let value = match serde_json::to_value(output) {
            Ok(value) => value,
            Err(e) => {
                error!(operation_id = %self.op.operation_id, error = %e, "failed to encode response");
                return self.error_response(
                    ErrorModel::internal_server_error("unable to encode response"),
                    host,
                );
            }
        };
        let success = self.op.default_status.unwrap_or(200);
        let empty = self.op.default_status.unwrap_or(204);

        match &self.output {
            OutputSpec::Empty => Response::new(empty),
            OutputSpec::Whole(body) => match value {
                Value::Null => Response::new(empty),
                value => self.write_body(Response::new(success), body, value, host),
            },
            OutputSpec::Envelope {
                headers,
                status,
                body,
            } => {
                let Value::Object(mut map) = value else {
                    error!(operation_id = %self.op.operation_id, "response envelope is not an object");
                    return self.error_response(
                        ErrorModel::internal_server_error("unable to encode response"),
                        host,
                    );
                };
                let status = status
                    .and_then(|key| map.get(key))
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok());

                let mut resp = Response::new(0);
                for (key, name) in headers {
                    if let Some(text) = map.get(*key).and_then(header_text) {
                        resp = resp.with_header(*name, text);
                    }
                }

                match body.as_ref().map(|b| (b, map.remove(b.key))) {
                    Some((body, Some(value))) if !value.is_null() => {
                        resp.status = status.unwrap_or(success);
                        self.write_body(resp, body, value, host)
                    }
                    _ => {
                        resp.status = status.unwrap_or(empty);
                        resp
                    }
                }
            }
        }
    }

    fn write_body(&self, resp: Response, body: &BodyOut, value: Value, host: &str) -> Response {
        if self.config.validate_responses {
            let mut path = PathBuffer::new();
            let mut result = ValidateResult::new();
            path.push("body");
            validate(
                &self.registry,
                &body.schema,
                &mut path,
                Mode::ReadFromServer,
                &value,
                &mut result,
            );
            if !result.is_empty() {
                error!(
                    operation_id = %self.op.operation_id,
                    errors = result.len(),
                    "handler produced an invalid response"
                );
                return self.error_response(
                    ErrorModel::internal_server_error("response validation failed")
                        .with_errors(result.into_errors()),
                    host,
                );
            }
        }

        let value = match (value, &body.name) {
            (Value::Object(map), Some(name)) if self.config.link_schemas => {
                let mut linked = Map::with_capacity(map.len() + 1);
                linked.insert(
                    "$schema".to_string(),
                    Value::String(schema_link(&self.config, host, name)),
                );
                linked.extend(map);
                Value::Object(linked)
            }
            (value, _) => value,
        };
        match serde_json::to_vec(&value) {
            Ok(bytes) => resp.with_header("Content-Type", JSON).with_body(bytes),
            Err(e) => {
                error!(operation_id = %self.op.operation_id, error = %e, "failed to write response body");
                Response::new(500)
            }
        }
    }

    fn error_response(&self, mut err: ErrorModel, host: &str) -> Response {
        if self.config.link_schemas && err.schema.is_none() {
            let name = self
                .registry
                .name_of(TypeId::of::<ErrorModel>())
                .unwrap_or_else(|| "ErrorModel".to_string());
            err.schema = Some(schema_link(&self.config, host, &name));
        }
        match serde_json::to_vec(&err) {
            Ok(bytes) => Response::new(err.status)
                .with_header("Content-Type", PROBLEM_JSON)
                .with_body(bytes),
            Err(e) => {
                error!(error = %e, "failed to write error response");
                Response::new(err.status)
            }
        }
    }
}

/// `{scheme}://{host}{schemas_path}/{name}.json`; plain http for local hosts.
pub fn schema_link(config: &ApiConfig, host: &str, name: &str) -> String {
    let scheme = if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    };
    format!(
        "{}://{}{}/{}.json",
        scheme,
        host,
        config.schemas_path.trim_end_matches('/'),
        name
    )
}

fn is_json(content_type: &str) -> bool {
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media == JSON || media.ends_with("+json")
}

fn header_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(header_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}
