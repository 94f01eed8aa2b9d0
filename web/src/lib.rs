#![deny(missing_docs)]

//! # Bindery Actix
//!
//! Mounts the operations of a [`bindery_core::Api`] on an actix-web app.
//!
//! Each route reads the raw body (stopping once the operation's limit is
//! exceeded), snapshots the request into a [`bindery_core::Request`], runs
//! the operation's endpoint and writes the returned status, headers and body.
//! Registered schemas are served as JSON documents under the configured
//! schemas path.

use actix_web::error::PayloadError;
use actix_web::http::{Method, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use bindery_core::{Api, Request, Response, Route};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, warn};

/// Returns an app configuration mounting every route of `api` plus the schema documents.
///
/// ```ignore
/// App::new().configure(bindery_actix::configure(api.clone()))
/// ```
pub fn configure(api: Arc<Api>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        for route in api.routes() {
            let method = match Method::from_bytes(route.operation.method.as_bytes()) {
                Ok(method) => method,
                Err(e) => {
                    error!(
                        method = %route.operation.method,
                        path = %route.operation.path,
                        error = %e,
                        "skipping route with an invalid method"
                    );
                    continue;
                }
            };
            let limit = route
                .operation
                .max_body_bytes
                .unwrap_or(api.config().max_body_bytes);
            let route = route.clone();
            cfg.route(
                &route.operation.path.clone(),
                web::method(method).to(move |req: HttpRequest, payload: web::Payload| {
                    dispatch(route.clone(), limit, req, payload)
                }),
            );
        }

        let schemas_path = api.config().schemas_path.trim_end_matches('/').to_string();
        cfg.route(
            &format!("{}/{{file}}", schemas_path),
            web::get().to(move |file: web::Path<String>| {
                let api = Arc::clone(&api);
                async move { schema_document(&api, &file) }
            }),
        );
    }
}

async fn dispatch(route: Route, limit: usize, req: HttpRequest, mut payload: web::Payload) -> HttpResponse {
    let body = match read_body(&mut payload, limit).await {
        Ok(body) => body,
        Err(e) => {
            warn!(operation_id = %route.operation.operation_id, error = %e, "failed to read request body");
            return HttpResponse::BadRequest().finish();
        }
    };
    let response = route.endpoint.call(into_request(&req, body)).await;
    into_response(response)
}

/// Reads the body, keeping at most one byte past `limit` so the engine can reject it.
async fn read_body(payload: &mut web::Payload, limit: usize) -> Result<Vec<u8>, PayloadError> {
    let mut body = Vec::new();
    while let Some(chunk) = payload.next().await {
        body.extend_from_slice(&chunk?);
        if body.len() > limit {
            body.truncate(limit + 1);
            break;
        }
    }
    Ok(body)
}

/// Snapshots an actix request and its body.
pub fn into_request(req: &HttpRequest, body: Vec<u8>) -> Request {
    let uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.path());
    let host = req.connection_info().host().to_string();

    let mut out = Request::new(req.method().as_str(), uri).with_host(host);
    for (name, value) in req.match_info().iter() {
        out = out.with_param(name, value);
    }
    for (name, value) in req.headers() {
        match value.to_str() {
            Ok(value) => out = out.with_header(name.as_str(), value),
            Err(_) => warn!(header = %name, "ignoring non-visible-ascii header value"),
        }
    }
    out.with_body(body)
}

/// Converts an engine response into an actix response.
pub fn into_response(resp: Response) -> HttpResponse {
    let status = StatusCode::from_u16(resp.status).unwrap_or_else(|_| {
        error!(status = resp.status, "invalid response status");
        StatusCode::INTERNAL_SERVER_ERROR
    });
    let mut builder = HttpResponse::build(status);
    for (name, value) in resp.headers {
        builder.append_header((name, value));
    }
    builder.body(resp.body)
}

fn schema_document(api: &Api, file: &str) -> HttpResponse {
    match file
        .strip_suffix(".json")
        .and_then(|name| api.schema_document(name))
    {
        Some(doc) => HttpResponse::Ok().json(doc),
        None => HttpResponse::NotFound().finish(),
    }
}
