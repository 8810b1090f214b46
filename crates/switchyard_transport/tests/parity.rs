//! The same operation over REST and JSON-RPC runs the same plan and fails
//! with the same taxonomy code.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{BEARER, Harness};
use parking_lot::Mutex;
use serde_json::{Value, json};
use switchyard_kernel::{ErrorCode, KernelBuilder, Phase, StepError, from_sync};
use switchyard_ops::HttpMethod;
use switchyard_transport::codes::{from_http, from_rpc};
use switchyard_transport::RestRequest;

/// Records the correlation id of every finished invocation.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn install(&self, builder: &mut KernelBuilder) {
        for phase in [Phase::OnSuccess, Phase::OnError] {
            let seen = Arc::clone(&self.0);
            builder
                .register_hook(
                    "*",
                    "*",
                    phase,
                    "record",
                    from_sync(move |ctx| {
                        seen.lock().push(ctx.correlation_id().to_string());
                        Ok(())
                    }),
                )
                .expect("recorder should register");
        }
    }

    fn last(&self) -> String {
        self.0
            .lock()
            .last()
            .cloned()
            .expect("an invocation should have finished")
    }
}

fn guarded(recorder: &Recorder) -> Harness {
    let mut builder = common::widget_builder();
    builder
        .register_secdep(
            "Widget",
            "create",
            "bearer",
            from_sync(|ctx| match ctx.header("authorization") {
                Some(BEARER) => Ok(()),
                _ => Err(StepError::unauthorized("missing bearer token")),
            }),
        )
        .expect("secdep should register");
    recorder.install(&mut builder);
    Harness::new(builder.finish().expect("kernel should build"))
}

fn labels(harness: &Harness, correlation_id: &str) -> BTreeSet<String> {
    harness
        .kernel
        .trace(correlation_id)
        .expect("trace should be archived")
        .label_set()
}

async fn rpc(harness: &Harness, method: &str, params: Value, headers: &[(String, String)]) -> Value {
    harness
        .rpc
        .handle(
            json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}),
            headers,
        )
        .await
        .expect("RPC call should respond")
}

fn rpc_taxonomy(response: &Value) -> Option<ErrorCode> {
    response["error"]["code"].as_i64().and_then(from_rpc)
}

#[tokio::test]
async fn rejected_create_matches_across_transports() {
    let recorder = Recorder::default();
    let harness = guarded(&recorder);

    let rest = harness
        .rest
        .handle(RestRequest::new(HttpMethod::Post, "/widget").with_body(json!({"name": "w"})))
        .await;
    let rest_trace = labels(&harness, &recorder.last());
    let rpc = rpc(&harness, "Widget.create", json!({"name": "w"}), &[]).await;
    let rpc_trace = labels(&harness, &recorder.last());

    assert_eq!(from_http(rest.status), Some(ErrorCode::Unauthorized));
    assert_eq!(rpc_taxonomy(&rpc), Some(ErrorCode::Unauthorized));
    assert_eq!(rest.body["code"], rpc["error"]["data"]["taxonomy"]);
    assert_eq!(rest_trace, rpc_trace);
    assert_eq!(harness.store.begins(), 0);
}

#[tokio::test]
async fn successful_create_runs_the_same_steps() {
    let recorder = Recorder::default();
    let harness = guarded(&recorder);
    let auth = vec![("Authorization".to_string(), BEARER.to_string())];

    let rest = harness
        .rest
        .handle(
            RestRequest::new(HttpMethod::Post, "/widget")
                .with_header("Authorization", BEARER)
                .with_body(json!({"name": "w"})),
        )
        .await;
    let rest_trace = labels(&harness, &recorder.last());
    let rpc = rpc(&harness, "Widget.create", json!({"name": "w"}), &auth).await;
    let rpc_trace = labels(&harness, &recorder.last());

    assert_eq!(rest.status, 201);
    assert_eq!(rest.body["name"], rpc["result"]["name"]);
    assert_eq!(rest_trace, rpc_trace);
    assert!(rest_trace.contains("ON_SUCCESS:hook:record@ON_SUCCESS"));
    assert_eq!(harness.store.commits(), 2);
}

#[tokio::test]
async fn handler_failure_matches_across_transports() {
    let recorder = Recorder::default();
    let mut builder = common::widget_builder();
    builder
        .register_handler(
            "Widget",
            "update",
            "refuse",
            from_sync(|_| Err(StepError::conflict("stale revision"))),
        )
        .expect("handler should register");
    recorder.install(&mut builder);
    let harness = Harness::new(builder.finish().expect("kernel should build"));

    let rest = harness
        .rest
        .handle(RestRequest::new(HttpMethod::Patch, "/widget/9").with_body(json!({"a": 1})))
        .await;
    let rest_trace = labels(&harness, &recorder.last());
    let rpc = rpc(&harness, "Widget.update", json!({"id": "9", "a": 1}), &[]).await;
    let rpc_trace = labels(&harness, &recorder.last());

    assert_eq!(rest.status, 409);
    assert_eq!(rpc_taxonomy(&rpc), Some(ErrorCode::Conflict));
    assert_eq!(rest.body["message"], rpc["error"]["message"]);
    assert_eq!(rest_trace, rpc_trace);
    assert_eq!(harness.store.rollbacks(), 2);
}
