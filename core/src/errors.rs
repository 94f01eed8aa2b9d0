#![deny(missing_docs)]

//! # Error Details
//!
//! Structured, per-request error reporting: single violations
//! ([`ErrorDetail`]), the accumulator threaded through binding, validation and
//! resolution ([`ValidateResult`]), and the wire-level error response
//! ([`ErrorModel`]).

use crate::path::PathBuffer;
use crate::Model;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One reported violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Model)]
pub struct ErrorDetail {
    /// Human readable description of the problem.
    pub message: String,
    /// Where the problem occurred, e.g. `body.items[3].tags`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// The offending value, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ErrorDetail {
    /// Creates a detail carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            value: None,
        }
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the offending value.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<&str> for ErrorDetail {
    fn from(message: &str) -> Self {
        ErrorDetail::new(message)
    }
}

impl From<String> for ErrorDetail {
    fn from(message: String) -> Self {
        ErrorDetail::new(message)
    }
}

/// Ordered, append-only collection of every violation found while handling
/// one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidateResult {
    errors: Vec<ErrorDetail>,
}

impl ValidateResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a violation at the current location of `path`.
    pub fn add(&mut self, path: &PathBuffer, value: &Value, message: impl Into<String>) {
        let mut detail = ErrorDetail::new(message).with_value(value.clone());
        if !path.is_empty() {
            detail.location = Some(path.to_string());
        }
        self.errors.push(detail);
    }

    /// Records a violation that has a location but no value, such as an absent field.
    pub fn add_absent(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.errors
            .push(ErrorDetail::new(message).with_location(location));
    }

    /// Appends a prepared detail.
    pub fn push(&mut self, detail: ErrorDetail) {
        self.errors.push(detail);
    }

    /// Whether nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of reported violations.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The violations in report order.
    pub fn errors(&self) -> &[ErrorDetail] {
        &self.errors
    }

    /// Consumes the result, returning the violations.
    pub fn into_errors(self) -> Vec<ErrorDetail> {
        self.errors
    }
}

impl Extend<ErrorDetail> for ValidateResult {
    fn extend<T: IntoIterator<Item = ErrorDetail>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

/// Error response body.
///
/// Serialized as `{"$schema", "title", "status", "detail", "errors"}` and sent
/// with `application/problem+json`. Handlers return it to signal failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display, Model)]
#[display("{status} {title}: {detail}")]
pub struct ErrorModel {
    /// Link to the schema describing this document.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[model(read_only)]
    pub schema: Option<String>,
    /// Short summary of the status code.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Explanation specific to this occurrence.
    pub detail: String,
    /// Every individual violation, in discovery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

impl std::error::Error for ErrorModel {}

impl ErrorModel {
    /// Creates an error for `status` with a default title.
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            schema: None,
            title: status_title(status).to_string(),
            status,
            detail: detail.into(),
            errors: Vec::new(),
        }
    }

    /// Attaches individual violations.
    pub fn with_errors(mut self, errors: Vec<ErrorDetail>) -> Self {
        self.errors = errors;
        self
    }

    /// 400 Bad Request.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, detail)
    }

    /// 401 Unauthorized.
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(401, detail)
    }

    /// 403 Forbidden.
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(403, detail)
    }

    /// 404 Not Found.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, detail)
    }

    /// 409 Conflict.
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(409, detail)
    }

    /// 422 Unprocessable Entity.
    pub fn unprocessable_entity(detail: impl Into<String>) -> Self {
        Self::new(422, detail)
    }

    /// 500 Internal Server Error.
    pub fn internal_server_error(detail: impl Into<String>) -> Self {
        Self::new(500, detail)
    }
}

/// Canonical reason phrase for the status codes the engine emits.
pub fn status_title(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        409 => "Conflict",
        410 => "Gone",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_detail_serialization_omits_empty_fields() {
        let detail = ErrorDetail::new("body resolver error");
        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            json!({"message": "body resolver error"})
        );

        let detail = ErrorDetail::new("expected length <= 5")
            .with_location("path.id")
            .with_value("123456");
        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            json!({"message": "expected length <= 5", "location": "path.id", "value": "123456"})
        );
    }

    #[test]
    fn test_result_uses_path_location() {
        let mut pb = PathBuffer::new();
        let mut res = ValidateResult::new();
        pb.push("body");
        pb.push("count");
        res.add(&pb, &json!(0), "expected number >= 1");
        pb.pop();
        pb.pop();
        res.add(&pb, &json!("x"), "expected object");

        assert_eq!(res.len(), 2);
        assert_eq!(res.errors()[0].location.as_deref(), Some("body.count"));
        assert_eq!(res.errors()[0].value, Some(json!(0)));
        assert_eq!(res.errors()[1].location, None);
    }

    #[test]
    fn test_error_model_wire_shape() {
        let model = ErrorModel::unprocessable_entity("validation failed")
            .with_errors(vec![ErrorDetail::new("boom").with_location("query.q")]);
        assert_eq!(model.title, "Unprocessable Entity");
        assert_eq!(
            serde_json::to_value(&model).unwrap(),
            json!({
                "title": "Unprocessable Entity",
                "status": 422,
                "detail": "validation failed",
                "errors": [{"message": "boom", "location": "query.q"}]
            })
        );
        assert_eq!(
            model.to_string(),
            "422 Unprocessable Entity: validation failed"
        );
    }

    #[test]
    fn test_unknown_status_title() {
        assert_eq!(status_title(418), "Error");
        assert_eq!(ErrorModel::not_found("missing").title, "Not Found");
    }
}
