use actix_web::{test, App};
use bindery_actix::configure;
use bindery_core::{register, Api, ApiConfig, ErrorModel, Model, Operation};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, Model)]
struct Note {
    #[model(min_length = 1, max_length = 20)]
    text: String,
}

#[derive(Debug, Deserialize, Model)]
struct UpdateNote {
    #[model(path = "id", minimum = 1)]
    id: u32,
    #[model(header = "X-Author")]
    author: Option<String>,
    #[model(body)]
    body: Note,
}

#[derive(Debug, Serialize, Model)]
struct NoteOutput {
    #[model(header = "X-Note-Id")]
    id: u32,
    #[model(body)]
    body: Note,
}

fn notes_api() -> Arc<Api> {
    let mut api = Api::new(ApiConfig {
        max_body_bytes: 128,
        ..ApiConfig::new("Notes", "1.0.0")
    })
    .unwrap();
    register(
        &mut api,
        Operation::new("PUT", "/notes/{id}"),
        |input: UpdateNote| async move {
            let text = match input.author {
                Some(author) => format!("{} ({})", input.body.text, author),
                None => input.body.text,
            };
            Ok::<_, ErrorModel>(NoteOutput {
                id: input.id,
                body: Note { text },
            })
        },
    )
    .unwrap();
    Arc::new(api)
}

#[actix_web::test]
async fn test_round_trip_through_actix() {
    let app = test::init_service(App::new().configure(configure(notes_api()))).await;
    let req = test::TestRequest::put()
        .uri("/notes/7")
        .insert_header(("X-Author", "ana"))
        .set_json(json!({"text": "buy milk"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("x-note-id").unwrap(), "7");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "$schema": "http://localhost:8080/schemas/Note.json",
            "text": "buy milk (ana)"
        })
    );
}

#[actix_web::test]
async fn test_all_errors_in_one_response() {
    let app = test::init_service(App::new().configure(configure(notes_api()))).await;
    let req = test::TestRequest::put()
        .uri("/notes/0")
        .set_json(json!({"text": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 422);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["errors"],
        json!([
            {"message": "expected number >= 1", "location": "path.id", "value": 0},
            {"message": "expected length >= 1", "location": "body.text", "value": ""}
        ])
    );
}

#[actix_web::test]
async fn test_oversized_body_is_rejected_by_the_engine() {
    let app = test::init_service(App::new().configure(configure(notes_api()))).await;
    let req = test::TestRequest::put()
        .uri("/notes/1")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(format!("{{\"text\": \"{}\"}}", "x".repeat(4096)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 413);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["detail"],
        json!("request body is too large, limit is 128 bytes")
    );
}

#[actix_web::test]
async fn test_schema_documents_are_served() {
    let app = test::init_service(App::new().configure(configure(notes_api()))).await;

    let req = test::TestRequest::get().uri("/schemas/Note.json").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let doc: Value = test::read_body_json(resp).await;
    assert_eq!(doc["type"], json!("object"));
    assert_eq!(doc["properties"]["text"]["maxLength"], json!(20));

    let req = test::TestRequest::get().uri("/schemas/ErrorModel.json").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri("/schemas/Missing.json").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}
