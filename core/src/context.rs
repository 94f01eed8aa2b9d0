#![deny(missing_docs)]

//! # Transport Boundary
//!
//! Router adapters translate their native request into a [`Request`], hand it
//! to an endpoint and write the returned [`Response`] back. The engine reads
//! requests only through the [`Context`] trait, which resolvers also receive.

use crate::operation::Operation;
use serde_json::Value;

/// Read access to the request being handled.
pub trait Context {
    /// The operation the request was routed to.
    fn operation(&self) -> &Operation;
    /// HTTP method.
    fn method(&self) -> &str;
    /// Value of the `Host` header, possibly empty.
    fn host(&self) -> &str;
    /// Request path without the query string.
    fn path(&self) -> &str;
    /// A path template capture.
    fn param(&self, name: &str) -> Option<&str>;
    /// The first occurrence of a query parameter.
    fn query(&self, name: &str) -> Option<&str>;
    /// Every occurrence of a query parameter in order.
    fn query_all(&self, name: &str) -> Vec<&str>;
    /// A header value, matched case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;
    /// A cookie from the `Cookie` header.
    fn cookie(&self, name: &str) -> Option<&str>;
}

/// Owned snapshot of an incoming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    /// HTTP method, upper case.
    pub method: String,
    /// Value of the `Host` header.
    pub host: String,
    /// Request path without the query string.
    pub path: String,
    /// Path template captures.
    pub params: Vec<(String, String)>,
    /// Decoded query pairs in wire order.
    pub query: Vec<(String, String)>,
    /// Header pairs; names are stored lower case.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl Request {
    /// Creates a request. A `?query` suffix on `uri` is parsed into [`Request::query`].
    pub fn new(method: impl Into<String>, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.to_string(),
            ..Default::default()
        }
        .with_query(query)
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Adds a path template capture.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Appends the pairs of a raw, URL-encoded query string.
    pub fn with_query(mut self, raw: &str) -> Self {
        self.query.extend(url::form_urlencoded::parse(raw.as_bytes()).into_owned());
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and its content type.
    pub fn with_json(self, body: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// A header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A [`Request`] bound to the operation it was routed to.
pub struct RequestContext<'a> {
    op: &'a Operation,
    req: &'a Request,
}

impl<'a> RequestContext<'a> {
    /// Binds `req` to `op`.
    pub fn new(op: &'a Operation, req: &'a Request) -> Self {
        Self { op, req }
    }

    /// The underlying request.
    pub fn request(&self) -> &Request {
        self.req
    }
}

impl Context for RequestContext<'_> {
    fn operation(&self) -> &Operation {
        self.op
    }

    fn method(&self) -> &str {
        &self.req.method
    }

    fn host(&self) -> &str {
        &self.req.host
    }

    fn path(&self) -> &str {
        &self.req.path
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.req
            .params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn query(&self, name: &str) -> Option<&str> {
        self.req
            .query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn query_all(&self, name: &str) -> Vec<&str> {
        self.req
            .query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.req.header(name)
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.req
            .headers
            .iter()
            .filter(|(k, _)| k == "cookie")
            .flat_map(|(_, v)| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }
}

/// What an adapter writes back.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Header pairs in insertion order.
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl Response {
    /// An empty response with `status`.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// A header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }
}
