use bindery_core::{
    register, Api, ApiConfig, Context, ErrorDetail, ErrorModel, Model, Operation, PathBuffer,
    Request, Resolver, ResolverWithPath, Response,
};
use chrono::{DateTime, Utc};
use futures::executor::block_on;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

fn call(api: &Api, operation_id: &str, req: Request) -> Response {
    let route = api
        .route(operation_id)
        .unwrap_or_else(|| panic!("no route {}", operation_id));
    block_on(route.endpoint.call(req))
}

#[derive(Debug, Deserialize, Model)]
#[model(resolver)]
#[allow(dead_code)]
struct ExhaustiveBody {
    #[model(max_length = 10)]
    name: String,
    #[model(minimum = 1)]
    count: i32,
}

impl Resolver for ExhaustiveBody {
    fn resolve(&self, _ctx: &dyn Context) -> Vec<ErrorDetail> {
        vec![ErrorDetail::new("body resolver error")]
    }
}

#[derive(Debug, Deserialize, Model)]
#[model(resolver)]
#[allow(dead_code)]
struct ExhaustiveInput {
    #[model(path = "id", max_length = 5)]
    id: String,
    #[model(body)]
    body: ExhaustiveBody,
}

impl Resolver for ExhaustiveInput {
    fn resolve(&self, _ctx: &dyn Context) -> Vec<ErrorDetail> {
        vec![ErrorDetail::new("input resolver error")
            .with_location("path.id")
            .with_value(self.id.clone())]
    }
}

#[test]
fn test_every_problem_is_reported_in_order() {
    let mut api = Api::new(ApiConfig::default()).unwrap();
    register(
        &mut api,
        Operation::new("PUT", "/test/{id}").id("exhaustive"),
        |_: ExhaustiveInput| async { Ok::<(), ErrorModel>(()) },
    )
    .unwrap();

    let req = Request::new("PUT", "/test/123456")
        .with_param("id", "123456")
        .with_json(&json!({"name": "12345678901", "count": 0}));
    let resp = call(&api, "exhaustive", req);

    assert_eq!(resp.status, 422);
    assert_eq!(resp.header("content-type"), Some("application/problem+json"));
    assert_eq!(
        resp.json().unwrap(),
        json!({
            "$schema": "https:///schemas/ErrorModel.json",
            "title": "Unprocessable Entity",
            "status": 422,
            "detail": "validation failed",
            "errors": [
                {"message": "expected length <= 5", "location": "path.id", "value": "123456"},
                {"message": "expected length <= 10", "location": "body.name", "value": "12345678901"},
                {"message": "expected number >= 1", "location": "body.count", "value": 0},
                {"message": "input resolver error", "location": "path.id", "value": "123456"},
                {"message": "body resolver error"}
            ]
        })
    );
}

fn exhaustive_api() -> Api {
    let mut api = Api::new(ApiConfig::default()).unwrap();
    register(
        &mut api,
        Operation::new("PUT", "/test/{id}").id("exhaustive"),
        |_: ExhaustiveInput| async { Ok::<(), ErrorModel>(()) },
    )
    .unwrap();
    api
}

#[test]
fn test_resolvers_run_when_body_values_do_not_decode() {
    let api = exhaustive_api();

    let req = Request::new("PUT", "/test/123456")
        .with_param("id", "123456")
        .with_json(&json!({"name": "ok", "count": "zero"}));
    let resp = call(&api, "exhaustive", req);
    assert_eq!(resp.status, 422);
    assert_eq!(
        resp.json().unwrap()["errors"],
        json!([
            {"message": "expected length <= 5", "location": "path.id", "value": "123456"},
            {"message": "expected integer", "location": "body.count", "value": "zero"},
            {"message": "input resolver error", "location": "path.id", "value": "123456"},
            {"message": "body resolver error"}
        ])
    );

    let req = Request::new("PUT", "/test/1")
        .with_param("id", "1")
        .with_json(&json!({"name": "ok"}));
    let resp = call(&api, "exhaustive", req);
    assert_eq!(resp.status, 422);
    assert_eq!(
        resp.json().unwrap()["errors"],
        json!([
            {
                "message": "expected required property count to be present",
                "location": "body.count"
            },
            {"message": "input resolver error", "location": "path.id", "value": "1"},
            {"message": "body resolver error"}
        ])
    );
}

#[test]
fn test_transport_aborts_replace_collected_errors() {
    let api = exhaustive_api();
    let req = Request::new("PUT", "/test/123456")
        .with_param("id", "123456")
        .with_header("Content-Type", "text/plain")
        .with_body("name=ok");
    let resp = call(&api, "exhaustive", req);

    assert_eq!(resp.status, 415);
    let body = resp.json().unwrap();
    assert_eq!(body["detail"], json!("unsupported content type text/plain"));
    assert_eq!(body.get("errors"), None);
}

#[derive(Debug, Deserialize, Model)]
#[allow(dead_code)]
struct NarrowInput {
    #[model(path = "id")]
    id: u8,
    #[model(query = "limit")]
    limit: Option<i32>,
}

#[test]
fn test_integer_overflow_is_located() {
    let mut api = Api::new(ApiConfig::default()).unwrap();
    register(
        &mut api,
        Operation::new("GET", "/t/{id}").id("narrow"),
        |_: NarrowInput| async { Ok::<(), ErrorModel>(()) },
    )
    .unwrap();

    let req = Request::new("GET", "/t/300?limit=99999999999").with_param("id", "300");
    let resp = call(&api, "narrow", req);
    assert_eq!(resp.status, 422);
    assert_eq!(
        resp.json().unwrap()["errors"],
        json!([
            {"message": "expected number <= 255", "location": "path.id", "value": 300},
            {
                "message": "expected number <= 2147483647",
                "location": "query.limit",
                "value": 99999999999i64
            }
        ])
    );
}

#[derive(Debug, Deserialize, Model)]
#[model(resolver_with_path)]
struct NestedLeaf {
    field2: String,
}

impl ResolverWithPath for NestedLeaf {
    fn resolve(&self, _ctx: &dyn Context, prefix: &PathBuffer) -> Vec<ErrorDetail> {
        if self.field2 == "bar" {
            return Vec::new();
        }
        vec![ErrorDetail::new("expected bar")
            .with_location(prefix.with("field2"))
            .with_value(self.field2.clone())]
    }
}

#[derive(Debug, Deserialize, Model)]
#[allow(dead_code)]
struct NestedBody {
    field1: HashMap<String, Vec<NestedLeaf>>,
}

#[derive(Debug, Deserialize, Model)]
#[allow(dead_code)]
struct NestedInput {
    #[model(body)]
    body: NestedBody,
}

#[test]
fn test_nested_resolvers_see_their_location() {
    let mut api = Api::new(ApiConfig::default()).unwrap();
    register(
        &mut api,
        Operation::new("PUT", "/nested").id("nested"),
        |_: NestedInput| async { Ok::<(), ErrorModel>(()) },
    )
    .unwrap();

    let ok = call(
        &api,
        "nested",
        Request::new("PUT", "/nested").with_json(&json!({"field1": {"foo": [{"field2": "bar"}]}})),
    );
    assert_eq!(ok.status, 204);

    let bad = call(
        &api,
        "nested",
        Request::new("PUT", "/nested").with_json(&json!({"field1": {"foo": [{"field2": "baz"}]}})),
    );
    assert_eq!(bad.status, 422);
    assert_eq!(
        bad.json().unwrap()["errors"],
        json!([{"message": "expected bar", "location": "body.field1.foo[0].field2", "value": "baz"}])
    );
}

#[derive(Debug, Serialize, Deserialize, Model)]
struct ParamsInput {
    #[model(path = "string")]
    path_string: String,
    #[model(path = "int")]
    path_int: i64,
    #[model(query = "string")]
    query_string: String,
    #[model(query = "int")]
    query_int: i64,
    #[model(query = "def", default = "135", example = "5")]
    query_default: f32,
    #[model(query = "before")]
    query_before: DateTime<Utc>,
    #[model(query = "date", time_format = "%Y-%m-%d")]
    query_date: DateTime<Utc>,
    #[model(header = "String")]
    header_string: String,
    #[model(header = "Int")]
    header_int: i64,
}

#[test]
fn test_parameters_reach_the_handler_typed() {
    let mut api = Api::new(ApiConfig::default()).unwrap();
    register(
        &mut api,
        Operation::new("GET", "/test-params/{string}/{int}"),
        |input: ParamsInput| async move {
            serde_json::to_value(&input).map_err(|e| ErrorModel::internal_server_error(e.to_string()))
        },
    )
    .unwrap();

    let req = Request::new(
        "GET",
        "/test-params/foo/123?string=bar&int=456&before=2023-01-01T12:00:00Z&date=2023-01-01",
    )
    .with_param("string", "foo")
    .with_param("int", "123")
    .with_header("String", "baz")
    .with_header("Int", "789");
    let resp = call(&api, "get-test-params-by-string-by-int", req);

    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.json().unwrap(),
        json!({
            "path_string": "foo",
            "path_int": 123,
            "query_string": "bar",
            "query_int": 456,
            "query_default": 135.0,
            "query_before": "2023-01-01T12:00:00Z",
            "query_date": "2023-01-01T00:00:00Z",
            "header_string": "baz",
            "header_int": 789
        })
    );
}

#[derive(Debug, Serialize, Model)]
struct Greeting {
    greeting: String,
}

#[derive(Debug, Serialize, Model)]
struct GreetingOutput {
    #[model(header = "foo")]
    my_header: String,
    #[model(body)]
    body: Greeting,
}

#[test]
fn test_response_headers_and_linked_body() {
    let mut api = Api::new(ApiConfig::default()).unwrap();
    register(
        &mut api,
        Operation::new("GET", "/response").id("response"),
        |_: ()| async {
            Ok::<_, ErrorModel>(GreetingOutput {
                my_header: "bar".to_string(),
                body: Greeting {
                    greeting: "Hello, world!".to_string(),
                },
            })
        },
    )
    .unwrap();

    let resp = call(&api, "response", Request::new("GET", "/response"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Foo"), Some("bar"));
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert_eq!(
        String::from_utf8(resp.body.clone()).unwrap(),
        r#"{"$schema":"https:///schemas/Greeting.json","greeting":"Hello, world!"}"#
    );
    assert!(api.schema_document("Greeting").is_some());
}

#[derive(Debug, Serialize, Deserialize, Model)]
struct Item {
    #[model(min_length = 1)]
    name: String,
    #[model(default = 10)]
    #[serde(default)]
    quantity: u32,
}

#[derive(Debug, Deserialize, Model)]
struct CreateItem {
    #[model(body)]
    body: Item,
}

fn item_api(config: ApiConfig) -> Api {
    let mut api = Api::new(config).unwrap();
    register(
        &mut api,
        Operation::new("POST", "/items")
            .id("create-item")
            .default_status(201)
            .max_body_bytes(64),
        |input: CreateItem| async move { Ok::<_, ErrorModel>(input.body) },
    )
    .unwrap();
    api
}

#[test]
fn test_body_defaults_and_default_status() {
    let api = item_api(ApiConfig::default());
    let resp = call(
        &api,
        "create-item",
        Request::new("POST", "/items")
            .with_host("localhost:8080")
            .with_json(&json!({"name": "bolt"})),
    );
    assert_eq!(resp.status, 201);
    assert_eq!(
        resp.json().unwrap(),
        json!({
            "$schema": "http://localhost:8080/schemas/Item.json",
            "name": "bolt",
            "quantity": 10
        })
    );
}

#[test]
fn test_unparseable_body_is_a_single_bad_request() {
    let api = item_api(ApiConfig::default());
    let resp = call(
        &api,
        "create-item",
        Request::new("POST", "/items")
            .with_header("Content-Type", "application/json")
            .with_body("{\"name\": "),
    );
    assert_eq!(resp.status, 400);
    let body = resp.json().unwrap();
    assert_eq!(body["title"], json!("Bad Request"));
    assert_eq!(body["detail"], json!("unable to parse request body"));
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["location"], json!("body"));
}

#[test]
fn test_body_limits_and_content_types() {
    let api = item_api(ApiConfig::default());

    let too_large = call(
        &api,
        "create-item",
        Request::new("POST", "/items").with_json(&json!({"name": "x".repeat(100)})),
    );
    assert_eq!(too_large.status, 413);
    assert_eq!(
        too_large.json().unwrap()["detail"],
        json!("request body is too large, limit is 64 bytes")
    );

    let unsupported = call(
        &api,
        "create-item",
        Request::new("POST", "/items")
            .with_header("Content-Type", "text/plain")
            .with_body("bolt"),
    );
    assert_eq!(unsupported.status, 415);
    assert_eq!(
        unsupported.json().unwrap()["detail"],
        json!("unsupported content type text/plain")
    );

    let missing = call(&api, "create-item", Request::new("POST", "/items"));
    assert_eq!(missing.status, 422);
    assert_eq!(
        missing.json().unwrap()["errors"],
        json!([{"message": "request body is required", "location": "body"}])
    );
}

#[test]
fn test_body_validation_uses_body_prefix() {
    let api = item_api(ApiConfig::default());
    let resp = call(
        &api,
        "create-item",
        Request::new("POST", "/items").with_json(&json!({"name": "", "extra": true})),
    );
    assert_eq!(resp.status, 422);
    assert_eq!(
        resp.json().unwrap()["errors"],
        json!([
            {"message": "expected length >= 1", "location": "body.name", "value": ""},
            {"message": "unexpected property", "location": "body.extra", "value": true}
        ])
    );
}

#[test]
fn test_handler_errors_are_problem_documents() {
    let mut api = Api::new(ApiConfig::default()).unwrap();
    register(
        &mut api,
        Operation::new("DELETE", "/items/{id}"),
        |_: ItemId| async { Err::<(), _>(ErrorModel::not_found("no such item")) },
    )
    .unwrap();

    let resp = call(
        &api,
        "delete-items-by-id",
        Request::new("DELETE", "/items/7")
            .with_host("api.example.com")
            .with_param("id", "7"),
    );
    assert_eq!(resp.status, 404);
    assert_eq!(resp.header("content-type"), Some("application/problem+json"));
    assert_eq!(
        resp.json().unwrap(),
        json!({
            "$schema": "https://api.example.com/schemas/ErrorModel.json",
            "title": "Not Found",
            "status": 404,
            "detail": "no such item"
        })
    );
}

#[derive(Debug, Deserialize, Model)]
#[allow(dead_code)]
struct ItemId {
    #[model(path = "id")]
    id: u64,
}

#[derive(Debug, Serialize, Model)]
struct Code {
    #[model(max_length = 3)]
    code: String,
}

#[test]
fn test_invalid_responses_are_caught_when_enabled() {
    let config = ApiConfig {
        validate_responses: true,
        ..Default::default()
    };
    let mut api = Api::new(config).unwrap();
    register(
        &mut api,
        Operation::new("GET", "/code").id("code"),
        |_: ()| async {
            Ok::<_, ErrorModel>(Code {
                code: "toolong".to_string(),
            })
        },
    )
    .unwrap();

    let resp = call(&api, "code", Request::new("GET", "/code"));
    assert_eq!(resp.status, 500);
    let body = resp.json().unwrap();
    assert_eq!(body["detail"], json!("response validation failed"));
    assert_eq!(body["errors"][0]["location"], json!("body.code"));
}

#[test]
fn test_schema_links_can_be_disabled() {
    let config = ApiConfig {
        link_schemas: false,
        ..Default::default()
    };
    let api = item_api(config);
    let resp = call(
        &api,
        "create-item",
        Request::new("POST", "/items").with_json(&json!({"name": "nut", "quantity": 2})),
    );
    assert_eq!(resp.json().unwrap(), json!({"name": "nut", "quantity": 2}));

    let err = call(&api, "create-item", Request::new("POST", "/items"));
    assert_eq!(err.json().unwrap().get("$schema"), None::<&Value>);
}
