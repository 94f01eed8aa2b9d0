#![deny(missing_docs)]

//! # Operations
//!
//! Static description of one endpoint. Users fill in the routing fields with
//! the builder methods; [`crate::register`] completes the parameter, request
//! body and response schemas from the handler's input and output types.

use crate::descriptor::ParamSource;
use crate::schema::Schema;
use std::sync::Arc;

/// One declared request parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Wire name.
    pub name: String,
    /// Where the value is read from.
    pub source: ParamSource,
    /// Whether the request must supply it.
    pub required: bool,
    /// Schema of the converted value.
    pub schema: Schema,
}

/// The declared request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    /// Whether an empty body is rejected.
    pub required: bool,
    /// Schema of the decoded body.
    pub schema: Arc<Schema>,
}

/// One endpoint: method, path template and the shapes it exchanges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    /// HTTP method, upper case.
    pub method: String,
    /// Path template, e.g. `/users/{id}`.
    pub path: String,
    /// Unique identifier; generated from method and path when empty.
    pub operation_id: String,
    /// Short summary.
    pub summary: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Grouping tags.
    pub tags: Vec<String>,
    /// Status used for successful responses that do not set one.
    pub default_status: Option<u16>,
    /// Request body limit overriding the API-wide setting.
    pub max_body_bytes: Option<usize>,
    /// Marked as deprecated.
    pub deprecated: bool,
    /// Parameters in declaration order.
    pub parameters: Vec<Parameter>,
    /// The request body, when the input declares one.
    pub request_body: Option<RequestBody>,
    /// Schema of the response body, when the output declares one.
    pub response_body: Option<Arc<Schema>>,
}

impl Operation {
    /// Creates an operation for `method` and the path template `path`.
    pub fn new(method: &str, path: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the operation id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = id.into();
        self
    }

    /// Sets the summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets the default success status.
    pub fn default_status(mut self, status: u16) -> Self {
        self.default_status = Some(status);
        self
    }

    /// Sets the request body limit.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Marks the operation as deprecated.
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Names captured by the path template, in order.
    pub fn path_params(&self) -> Vec<&str> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
            .collect()
    }
}

/// Derives an operation id from method and path.
///
/// `GET /test-params/{string}/{int}` becomes `get-test-params-by-string-by-int`.
pub fn generate_operation_id(method: &str, path: &str) -> String {
    let mut raw = method.to_ascii_lowercase();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        raw.push('-');
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                raw.push_str("by-");
                raw.push_str(name);
            }
            None => raw.push_str(segment),
        }
    }

    let mut id = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    id.trim_matches('-').to_string()
}
