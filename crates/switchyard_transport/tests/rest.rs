//! REST adapter end to end, over the in-memory store.

mod common;

use common::{BEARER, guarded, open};
use serde_json::json;
use switchyard_kernel::label::{TXN_BEGIN, TXN_COMMIT};
use switchyard_core_plugins::MemoryStore;
use switchyard_kernel::{Phase, Store, StepError, from_fn, from_sync};
use switchyard_ops::HttpMethod;
use switchyard_transport::rest::{CORRELATION_HEADER, MERGE_PATCH};
use switchyard_transport::{RestAdapter, RestRequest};

fn post(path: &str, body: serde_json::Value) -> RestRequest {
    RestRequest::new(HttpMethod::Post, path).with_body(body)
}

async fn create(rest: &RestAdapter, body: serde_json::Value) -> String {
    let response = rest.handle(post("/widget", body)).await;
    assert_eq!(response.status, 201, "create failed: {}", response.body);
    response.body["id"]
        .as_str()
        .expect("created item should have an id")
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Bearer-guarded create
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_bearer_is_401_without_a_transaction() {
    let harness = guarded();

    let response = harness.rest.handle(post("/widget", json!({"name": "w"}))).await;

    assert_eq!(response.status, 401);
    assert_eq!(response.body["code"], "UNAUTHORIZED");
    assert_eq!(harness.store.begins(), 0);
    assert_eq!(harness.store.count("Widget"), 0);

    let id = response.correlation_id().expect("response should carry an id");
    assert_eq!(response.body["correlation_id"], id);
    let trace = harness.kernel.trace(id).expect("trace should be archived");
    assert!(!trace.contains(TXN_BEGIN));
}

#[tokio::test]
async fn bearer_create_is_201_with_one_transaction() {
    let harness = guarded();

    let response = harness
        .rest
        .handle(post("/widget", json!({"name": "w"})).with_header("Authorization", BEARER))
        .await;

    assert_eq!(response.status, 201);
    assert_eq!(response.body["name"], "w");
    assert_eq!((harness.store.begins(), harness.store.commits()), (1, 1));
    assert_eq!(harness.store.count("Widget"), 1);

    let trace = harness
        .kernel
        .trace(response.correlation_id().expect("correlation id"))
        .expect("trace should be archived");
    let phases = trace.phases();
    let at = |phase| phases.iter().position(|p| *p == phase).expect("phase should run");
    assert!(at(Phase::PreTxSecdep) < at(Phase::PreTxBegin));
    assert!(at(Phase::PreTxBegin) < at(Phase::Handler));
    assert!(at(Phase::Handler) < at(Phase::EndTx));
    assert!(trace.contains(TXN_COMMIT));
}

#[tokio::test]
async fn caller_correlation_id_is_reused() {
    let harness = open();
    let response = harness
        .rest
        .handle(post("/widget", json!({"name": "w"})).with_header(CORRELATION_HEADER, "req-42"))
        .await;
    assert_eq!(response.correlation_id(), Some("req-42"));
    assert!(harness.kernel.trace("req-42").is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Bulk create
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn array_body_creates_in_one_transaction() {
    let harness = open();

    let response = harness
        .rest
        .handle(post("/widget", json!([{"name": "a"}, {"name": "b"}])))
        .await;

    assert_eq!(response.status, 201);
    assert_eq!(response.body.as_array().map(Vec::len), Some(2));
    assert_eq!((harness.store.begins(), harness.store.commits()), (1, 1));
    assert_eq!(harness.store.count("Widget"), 2);
}

#[tokio::test]
async fn conflicting_bulk_item_rolls_back_both() {
    let harness = open();
    create(&harness.rest, json!({"id": "taken", "name": "x"})).await;

    let response = harness
        .rest
        .handle(post("/widget", json!([{"id": "fresh"}, {"id": "taken"}])))
        .await;

    assert_eq!(response.status, 409);
    assert_eq!(response.body["code"], "CONFLICT");
    assert_eq!(harness.store.rollbacks(), 1);
    assert_eq!(harness.store.count("Widget"), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// CRUD over routes
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn member_routes_use_the_path_id() {
    let harness = open();
    let id = create(&harness.rest, json!({"name": "w", "colour": "red"})).await;
    let member = format!("/widget/{id}");

    let read = harness.rest.handle(RestRequest::new(HttpMethod::Get, &member)).await;
    assert_eq!(read.status, 200);
    assert_eq!(read.body["colour"], "red");

    let patched = harness
        .rest
        .handle(
            RestRequest::new(HttpMethod::Patch, &member)
                .with_header("content-type", MERGE_PATCH)
                .with_body(json!({"colour": null, "size": 3})),
        )
        .await;
    assert_eq!(patched.status, 200);
    assert_eq!(patched.body, json!({"id": id, "name": "w", "size": 3}));

    let deleted = harness.rest.handle(RestRequest::new(HttpMethod::Delete, &member)).await;
    assert_eq!(deleted.body, json!({"deleted": 1}));

    let gone = harness.rest.handle(RestRequest::new(HttpMethod::Get, &member)).await;
    assert_eq!(gone.status, 404);
    assert_eq!(gone.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn list_filters_come_from_the_query() {
    let harness = open();
    create(&harness.rest, json!({"name": "a", "colour": "red"})).await;
    create(&harness.rest, json!({"name": "b", "colour": "blue"})).await;
    create(&harness.rest, json!({"name": "c", "colour": "red"})).await;

    let response = harness
        .rest
        .handle(
            RestRequest::new(HttpMethod::Get, "/widget")
                .with_query("colour", "red")
                .with_query("sort", "-name"),
        )
        .await;

    assert_eq!(response.status, 200);
    let names: Vec<&str> = response
        .body
        .as_array()
        .expect("list should return an array")
        .iter()
        .filter_map(|w| w["name"].as_str())
        .collect();
    assert_eq!(names, vec!["c", "a"]);
    assert_eq!(harness.store.begins(), 0);
}

#[tokio::test]
async fn bulk_delete_takes_an_ids_object() {
    let harness = open();
    let a = create(&harness.rest, json!({"name": "a"})).await;
    let b = create(&harness.rest, json!({"name": "b"})).await;
    create(&harness.rest, json!({"name": "c"})).await;

    let response = harness
        .rest
        .handle(RestRequest::new(HttpMethod::Delete, "/widget").with_body(json!({"ids": [a, b]})))
        .await;

    assert_eq!(response.body, json!({"deleted": 2}));
    assert_eq!(harness.store.count("Widget"), 1);
}

#[tokio::test]
async fn validation_failures_are_422_with_details() {
    let mut builder = common::widget_builder();
    builder.set_validator(
        "Widget",
        switchyard_core_plugins::RequiredFields::new(["name"]),
    );
    let harness = common::Harness::new(builder.finish().expect("kernel should build"));

    let response = harness.rest.handle(post("/widget", json!({"colour": "red"}))).await;

    assert_eq!(response.status, 422);
    assert_eq!(response.body["code"], "VALIDATION");
    assert_eq!(response.body["details"][0]["field"], "name");
    assert_eq!(harness.store.commits(), 0);
}

#[tokio::test]
async fn insert_race_lost_at_commit_is_409() {
    let store = MemoryStore::new();
    let rival = store.clone();
    let mut builder = common::widget_builder();
    builder
        .register_hook(
            "Widget",
            "create",
            Phase::PreCommit,
            "rival",
            from_fn(move |_| {
                let rival = rival.clone();
                Box::pin(async move {
                    rival
                        .session()
                        .insert("Widget", "dup", json!({"id": "dup", "name": "rival"}))
                        .await?;
                    Ok::<(), StepError>(())
                })
            }),
        )
        .expect("hook should register");
    let harness = common::Harness::with_store(builder.finish().expect("kernel should build"), store);

    let response = harness
        .rest
        .handle(post("/widget", json!({"id": "dup", "name": "mine"})))
        .await;

    assert_eq!(response.status, 409);
    assert_eq!(response.body["code"], "CONFLICT");
    assert_eq!((harness.store.commits(), harness.store.rollbacks()), (0, 1));
    assert_eq!(harness.store.items("Widget")[0]["name"], "rival");
}

#[tokio::test]
async fn handler_panic_is_a_generic_500() {
    let mut builder = common::widget_builder();
    builder
        .register_hook(
            "Widget",
            "create",
            Phase::PreCommit,
            "explode",
            from_sync(|_| -> Result<(), StepError> { panic!("secret detail") }),
        )
        .expect("hook should register");
    let harness = common::Harness::new(builder.finish().expect("kernel should build"));

    let response = harness.rest.handle(post("/widget", json!({"name": "w"}))).await;

    assert_eq!(response.status, 500);
    assert!(!response.body.to_string().contains("secret detail"));
    assert_eq!(harness.store.rollbacks(), 1);
    assert_eq!(harness.store.count("Widget"), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing failures and system routes
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_path_is_404_and_wrong_method_is_405() {
    let harness = open();

    let missing = harness.rest.handle(RestRequest::new(HttpMethod::Get, "/gadget")).await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body["code"], "NOT_FOUND");
    assert_eq!(missing.correlation_id(), None);
    assert!(missing.body.get("correlation_id").is_none());

    let wrong = harness.rest.handle(post("/widget/1", json!({}))).await;
    assert_eq!(wrong.status, 405);
    let allow = wrong.header("allow").expect("405 should list allowed methods");
    assert!(allow.contains("GET"));
    assert!(!allow.contains("POST"));
    assert_eq!(wrong.correlation_id(), None);
}

#[tokio::test]
async fn system_routes_expose_plans_methods_and_traces() {
    let harness = guarded();

    let kernelz = harness
        .rest
        .handle(RestRequest::new(HttpMethod::Get, "/system/kernelz"))
        .await;
    assert_eq!(kernelz.status, 200);
    let create = kernelz.body["Widget"]["create"]
        .as_array()
        .expect("create plan should be listed");
    assert!(create.iter().any(|l| l == "PRE_TX_SECDEP:secdep:bearer"));

    let methodz = harness
        .rest
        .handle(RestRequest::new(HttpMethod::Get, "/system/methodz"))
        .await;
    let methods: Vec<&str> = methodz
        .body
        .as_array()
        .expect("methodz should be an array")
        .iter()
        .filter_map(|m| m["method"].as_str())
        .collect();
    assert!(methods.contains(&"Widget.bulk_create"));

    let failed = harness.rest.handle(post("/widget", json!({}))).await;
    let id = failed.correlation_id().expect("correlation id");
    let tracez = harness
        .rest
        .handle(RestRequest::new(HttpMethod::Get, format!("/system/tracez/{id}")))
        .await;
    assert_eq!(tracez.status, 200);
    assert_eq!(tracez.body[0]["label"], "secdep:bearer");
    assert_eq!(tracez.body[0]["phase"], "PRE_TX_SECDEP");

    let unknown = harness
        .rest
        .handle(RestRequest::new(HttpMethod::Get, "/system/tracez/nope"))
        .await;
    assert_eq!(unknown.status, 404);
}
