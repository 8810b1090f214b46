//! The JSON-RPC 2.0 adapter.
//!
//! Methods are named `Resource.alias`. `params` becomes the payload as-is;
//! member operations read their id from `params.id`. Batches run
//! concurrently and answer in request order, notifications (no `id`) run
//! but produce no response.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Value, json};
use switchyard_kernel::{ErrorEnvelope, Kernel, RequestMeta, SessionSource, Transport};

use crate::codes::{INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, rpc_code};

const VERSION: &str = "2.0";

/// A request that passed envelope validation.
struct Call {
    id: Option<Value>,
    resource: String,
    alias: String,
    params: Value,
}

/// Translates JSON-RPC requests into kernel invocations.
pub struct RpcAdapter {
    kernel: Kernel,
    sessions: Arc<dyn SessionSource>,
}

impl RpcAdapter {
    /// An adapter dispatching to `kernel`, one session per call.
    #[must_use]
    pub fn new(kernel: Kernel, sessions: Arc<dyn SessionSource>) -> Self {
        Self { kernel, sessions }
    }

    /// Handles a raw request body.
    ///
    /// Returns `None` when nothing should be written back: a lone
    /// notification, or a batch made only of notifications.
    pub async fn handle_str(&self, raw: &str, headers: &[(String, String)]) -> Option<String> {
        let response = match serde_json::from_str::<Value>(raw) {
            Ok(request) => self.handle(request, headers).await?,
            Err(err) => {
                tracing::debug!(error = %err, "rpc parse error");
                error_object(&Value::Null, PARSE_ERROR, "parse error", None)
            }
        };
        Some(response.to_string())
    }

    /// Handles an already-parsed request or batch.
    pub async fn handle(&self, request: Value, headers: &[(String, String)]) -> Option<Value> {
        let Value::Array(batch) = request else {
            return self.handle_one(request, headers).await;
        };

        let limit = self.kernel.config().rpc_batch_limit();
        if batch.is_empty() || batch.len() > limit {
            tracing::debug!(size = batch.len(), limit, "rpc batch rejected");
            let message = if batch.is_empty() {
                "empty batch".to_string()
            } else {
                format!("batch of {} exceeds the limit of {limit}", batch.len())
            };
            return Some(error_object(&Value::Null, INVALID_REQUEST, &message, None));
        }

        let responses: Vec<Value> = join_all(batch.into_iter().map(|r| self.handle_one(r, headers)))
            .await
            .into_iter()
            .flatten()
            .collect();
        (!responses.is_empty()).then_some(Value::Array(responses))
    }

    async fn handle_one(&self, request: Value, headers: &[(String, String)]) -> Option<Value> {
        let call = match parse_call(request) {
            Ok(call) => call,
            Err(response) => return Some(*response),
        };

        let exposed = self
            .kernel
            .resolver()
            .resolve(&call.resource, &call.alias)
            .is_ok_and(|spec| spec.exposes_rpc());
        if !exposed {
            let id = call.id?;
            let message = format!("method {}.{} not found", call.resource, call.alias);
            return Some(error_object(&id, METHOD_NOT_FOUND, &message, None));
        }

        let meta = RequestMeta::new(Transport::Rpc).with_headers(headers.iter().cloned());
        let invoked = self
            .kernel
            .invoke(
                &call.resource,
                &call.alias,
                call.params,
                self.sessions.open_session(),
                meta,
            )
            .await;

        let id = call.id?;
        let response = match invoked {
            Ok(invocation) => match invocation.outcome {
                Ok(result) => json!({"jsonrpc": VERSION, "id": id, "result": result}),
                Err(envelope) => envelope_error(&id, &envelope),
            },
            Err(err) => error_object(&id, METHOD_NOT_FOUND, &err.to_string(), None),
        };
        Some(response)
    }
}

/// Validates the request envelope.
fn parse_call(request: Value) -> Result<Call, Box<Value>> {
    let Value::Object(mut object) = request else {
        return Err(invalid(&Value::Null, "request must be an object"));
    };

    let id = match object.remove("id") {
        None => None,
        Some(id @ (Value::String(_) | Value::Number(_) | Value::Null)) => Some(id),
        Some(_) => return Err(invalid(&Value::Null, "id must be a string, number or null")),
    };
    let reply_to = id.clone().unwrap_or(Value::Null);

    if object.get("jsonrpc").and_then(Value::as_str) != Some(VERSION) {
        return Err(invalid(&reply_to, "jsonrpc must be \"2.0\""));
    }
    let Some(method) = object.get("method").and_then(Value::as_str) else {
        return Err(invalid(&reply_to, "method must be a string"));
    };
    let Some((resource, alias)) = method.split_once('.') else {
        let message = format!("method {method} not found");
        return Err(Box::new(error_object(&reply_to, METHOD_NOT_FOUND, &message, None)));
    };
    let (resource, alias) = (resource.to_string(), alias.to_string());

    let params = object.remove("params").unwrap_or(Value::Null);
    if !matches!(params, Value::Object(_) | Value::Array(_) | Value::Null) {
        return Err(invalid(&reply_to, "params must be an object or array"));
    }

    Ok(Call {
        id,
        resource,
        alias,
        params,
    })
}

fn invalid(id: &Value, message: &str) -> Box<Value> {
    Box::new(error_object(id, INVALID_REQUEST, message, None))
}

fn envelope_error(id: &Value, envelope: &ErrorEnvelope) -> Value {
    let mut data = json!({
        "taxonomy": envelope.code.as_str(),
        "correlation_id": envelope.correlation_id,
    });
    if !envelope.details.is_empty() {
        data["details"] = json!(envelope.details);
    }
    error_object(id, rpc_code(envelope.code), &envelope.message, Some(data))
}

fn error_object(id: &Value, code: i64, message: &str, data: Option<Value>) -> Value {
    let mut error = json!({"code": code, "message": message});
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({"jsonrpc": VERSION, "id": id, "error": error})
}
