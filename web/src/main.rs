#![deny(missing_docs)]

//! # Bindery Demo Server
//!
//! Serves a small greeting API through the actix adapter.
//!
//! - `BINDERY_BIND`: listen address, default `127.0.0.1:8080`
//! - `BINDERY_CONFIG`: optional YAML file with API settings
//! - `BINDERY_ONESHOT`: stop right after start-up

use actix_web::{App, HttpServer};
use bindery_actix::configure;
use bindery_core::{register, Api, ApiConfig, AppResult, ErrorModel, Model, Operation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::TcpListener;
use std::sync::Arc;
use tracing::info;

/// Path and query parameters of the greeting operation.
#[derive(Debug, Deserialize, Model)]
struct GreetingInput {
    /// Who to greet.
    #[model(path = "name", max_length = 30, example = "world")]
    name: String,
    /// Greeting word.
    #[model(query = "salutation", default = "Hello", enum_values("Hello", "Hi", "Howdy"))]
    salutation: String,
}

/// A greeting.
#[derive(Debug, Serialize, Model)]
struct Greeting {
    /// The full greeting text.
    #[model(example = "Hello, world!")]
    message: String,
    /// When the greeting was produced.
    #[model(read_only)]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Model)]
struct GreetingOutput {
    #[model(header = "Cache-Control")]
    cache_control: String,
    #[model(body)]
    body: Greeting,
}

/// A review submitted for the greeting service.
#[derive(Debug, Serialize, Deserialize, Model)]
struct Review {
    /// Rating from 1 to 5.
    #[model(minimum = 1, maximum = 5)]
    rating: u8,
    /// Optional free text.
    #[model(max_length = 1024)]
    message: Option<String>,
}

#[derive(Debug, Deserialize, Model)]
struct ReviewInput {
    #[model(body)]
    body: Review,
}

fn build_api(config: ApiConfig) -> AppResult<Api> {
    let mut api = Api::new(config)?;
    register(
        &mut api,
        Operation::new("GET", "/greeting/{name}")
            .summary("Get a greeting")
            .tag("Greetings"),
        |input: GreetingInput| async move {
            Ok::<_, ErrorModel>(GreetingOutput {
                cache_control: "no-cache".to_string(),
                body: Greeting {
                    message: format!("{}, {}!", input.salutation, input.name),
                    created_at: Utc::now(),
                },
            })
        },
    )?;
    register(
        &mut api,
        Operation::new("POST", "/reviews")
            .summary("Post a review")
            .tag("Reviews")
            .default_status(201),
        |input: ReviewInput| async move {
            info!(rating = input.body.rating, "review received");
            Ok::<_, ErrorModel>(())
        },
    )?;
    Ok(api)
}

fn load_config() -> std::io::Result<ApiConfig> {
    match std::env::var("BINDERY_CONFIG") {
        Ok(path) => ApiConfig::from_file(path).map_err(std::io::Error::other),
        Err(_) => Ok(ApiConfig::new("Greeting API", "1.0.0")),
    }
}

fn build_server(listener: TcpListener, api: Arc<Api>) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || App::new().configure(configure(Arc::clone(&api))))
        .listen(listener)?
        .run())
}

fn resolve_bind_addr() -> String {
    std::env::var("BINDERY_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bindery_core=debug".into()),
        )
        .try_init();

    let api = build_api(load_config()?).map_err(std::io::Error::other)?;
    let bind_addr = resolve_bind_addr();
    let listener = TcpListener::bind(&bind_addr)?;
    info!(address = %bind_addr, routes = api.routes().len(), "starting server");
    let server = build_server(listener, Arc::new(api))?;

    if std::env::var("BINDERY_ONESHOT").is_ok() {
        server.handle().stop(true).await;
    }

    server.await
}
