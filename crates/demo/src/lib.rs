//! A Widget service assembled from plugins.
//!
//! [`WidgetPlugin`] registers the `Widget` resource with every canonical
//! verb plus a custom `archive` member operation, guards the creating verbs
//! with a bearer-token secdep and logs each finished invocation.
//! [`Scenario`]s then drive it through either adapter.

use std::sync::Arc;

use serde_json::{Value, json};
use switchyard_core_plugins::{MemoryStore, TracingPlugin, ValidationPlugin};
use switchyard_kernel::atoms::ITEM_ID;
use switchyard_kernel::{
    BuildError, Kernel, KernelBuilder, KernelConfig, OpContext, Phase, Plugin, PluginId, StepError,
    StepResult, from_fn, from_sync,
};
use switchyard_ops::{Arity, HttpMethod, OperationSpec, ResourceDef};
use switchyard_transport::{RestAdapter, RestRequest, RpcAdapter};

/// The resource every scenario works on.
pub const WIDGET: &str = "Widget";

// ─────────────────────────────────────────────────────────────────────────────
// WidgetPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Registers the Widget resource, its guard and its audit hook.
#[derive(Debug, Clone)]
pub struct WidgetPlugin {
    token: String,
}

impl WidgetPlugin {
    /// Accepts `Authorization: Bearer {token}` on creating verbs.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

async fn archive(ctx: &mut OpContext) -> StepResult {
    let id = ctx
        .path_param(ITEM_ID)
        .map(str::to_string)
        .ok_or_else(|| StepError::validation("missing item id"))?;
    let mut item = ctx.store().fetch(WIDGET, &id).await?;
    item["archived"] = Value::Bool(true);
    let written = ctx.store().write(WIDGET, &id, item).await?;
    ctx.set_result(written);
    Ok(())
}

impl Plugin for WidgetPlugin {
    fn build(&self, kernel: &mut KernelBuilder) -> Result<(), BuildError> {
        kernel.register_resource(
            ResourceDef::new(WIDGET)
                .with_canonical_ops()?
                .with_op(OperationSpec::custom("archive").with_arity(Arity::Member))?,
        )?;
        kernel.register_handler(
            WIDGET,
            "archive",
            "archive",
            from_fn(|ctx| Box::pin(archive(ctx))),
        )?;

        let expected = format!("Bearer {}", self.token);
        for alias in ["create", "bulk_create"] {
            let expected = expected.clone();
            kernel.register_secdep(
                WIDGET,
                alias,
                "bearer",
                from_sync(move |ctx| match ctx.header("authorization") {
                    Some(value) if value == expected => Ok(()),
                    _ => Err(StepError::unauthorized("missing or invalid bearer token")),
                }),
            )?;
        }

        kernel.register_hook(
            "*",
            "*",
            Phase::PostResponse,
            "audit",
            from_sync(|ctx| {
                tracing::info!(
                    resource = ctx.resource(),
                    alias = ctx.alias(),
                    correlation_id = ctx.correlation_id(),
                    "served"
                );
                Ok(())
            }),
        )?;
        Ok(())
    }

    fn name(&self) -> &str {
        "demo::widget"
    }
}

/// Requires `name` on widgets. Depends on [`WidgetPlugin`] so the resource
/// exists when it is checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct WidgetValidation;

impl Plugin for WidgetValidation {
    fn build(&self, kernel: &mut KernelBuilder) -> Result<(), BuildError> {
        kernel.add_nested_plugins(ValidationPlugin::new().require(WIDGET, ["name"]));
        Ok(())
    }

    fn name(&self) -> &str {
        "demo::widget_validation"
    }

    fn dependencies(&self) -> Vec<PluginId> {
        vec![PluginId::of::<WidgetPlugin>()]
    }
}

/// Builds the demo kernel.
///
/// # Errors
///
/// Any plugin or registration failure.
pub fn build_kernel(
    token: &str,
    config: KernelConfig,
    tracing: TracingPlugin,
) -> Result<Kernel, BuildError> {
    Kernel::builder()
        .with_config(config)
        .add_plugins((tracing, WidgetPlugin::new(token), WidgetValidation))
        .finish()
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

/// Which adapter a scenario goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// The REST adapter.
    Rest,
    /// The JSON-RPC adapter.
    Rpc,
}

/// One request and what came back.
#[derive(Debug, Clone)]
pub struct Report {
    /// Scenario name.
    pub name: &'static str,
    /// The adapter used.
    pub via: Via,
    /// Taxonomy code on failure, `"OK"` on success.
    pub code: String,
    /// The response body (REST) or `result`/`error` member (RPC).
    pub body: Value,
    /// Store transaction counters after the request: begins, commits,
    /// rollbacks.
    pub transactions: (usize, usize, usize),
}

/// A named request expressed once for both adapters.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name.
    pub name: &'static str,
    method: HttpMethod,
    path: String,
    rpc_method: String,
    payload: Value,
    authorized: bool,
}

impl Scenario {
    /// A scenario for `Widget.{alias}`.
    #[must_use]
    pub fn new(name: &'static str, alias: &str, method: HttpMethod, payload: Value) -> Self {
        Self {
            name,
            method,
            path: "/widget".to_string(),
            rpc_method: format!("{WIDGET}.{alias}"),
            payload,
            authorized: false,
        }
    }

    /// Appends path segments after `/widget` (REST only; RPC reads ids
    /// from the payload).
    #[must_use]
    pub fn at(mut self, suffix: &str) -> Self {
        self.path = format!("/widget/{}", suffix.trim_start_matches('/'));
        self
    }

    /// Sends the bearer token.
    #[must_use]
    pub fn authorized(mut self) -> Self {
        self.authorized = true;
        self
    }
}

/// Both adapters over one kernel and one in-memory store.
pub struct Demo {
    store: MemoryStore,
    rest: RestAdapter,
    rpc: RpcAdapter,
    token: String,
}

impl Demo {
    /// Wires the adapters to a fresh store.
    #[must_use]
    pub fn new(kernel: Kernel, token: impl Into<String>) -> Self {
        let store = MemoryStore::new();
        let sessions = Arc::new(store.clone());
        Self {
            rest: RestAdapter::new(kernel.clone(), sessions.clone()),
            rpc: RpcAdapter::new(kernel, sessions),
            store,
            token: token.into(),
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn headers(&self, scenario: &Scenario) -> Vec<(String, String)> {
        if scenario.authorized {
            vec![("authorization".to_string(), format!("Bearer {}", self.token))]
        } else {
            Vec::new()
        }
    }

    /// Runs one scenario.
    pub async fn run(&self, scenario: &Scenario, via: Via) -> Report {
        let headers = self.headers(scenario);
        let (code, body) = match via {
            Via::Rest => {
                let mut request = RestRequest::new(scenario.method, &scenario.path)
                    .with_body(scenario.payload.clone());
                for (name, value) in headers {
                    request = request.with_header(name, value);
                }
                let response = self.rest.handle(request).await;
                let code = response.body["code"].as_str().unwrap_or("OK").to_string();
                (code, response.body)
            }
            Via::Rpc => {
                let request = json!({
                    "jsonrpc": "2.0",
                    "id": scenario.name,
                    "method": scenario.rpc_method,
                    "params": scenario.payload,
                });
                let response = self.rpc.handle(request, &headers).await.unwrap_or(Value::Null);
                match response.get("error") {
                    Some(error) => (
                        error["data"]["taxonomy"].as_str().unwrap_or("PROTOCOL").to_string(),
                        error.clone(),
                    ),
                    None => ("OK".to_string(), response["result"].clone()),
                }
            }
        };
        Report {
            name: scenario.name,
            via,
            code,
            body,
            transactions: (self.store.begins(), self.store.commits(), self.store.rollbacks()),
        }
    }
}

/// The bearer-guarded create, then a bulk create and its conflicting
/// retry.
#[must_use]
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "create without token",
            "create",
            HttpMethod::Post,
            json!({"name": "w"}),
        ),
        Scenario::new(
            "create with token",
            "create",
            HttpMethod::Post,
            json!({"id": "w1", "name": "w"}),
        )
        .authorized(),
        Scenario::new(
            "bulk create",
            "bulk_create",
            HttpMethod::Post,
            json!([{"id": "b1", "name": "a"}, {"id": "b2", "name": "b"}]),
        )
        .authorized(),
        Scenario::new(
            "bulk create conflict",
            "bulk_create",
            HttpMethod::Post,
            json!([{"id": "b3", "name": "c"}, {"id": "b1", "name": "dup"}]),
        )
        .authorized(),
        Scenario::new(
            "create without name",
            "create",
            HttpMethod::Post,
            json!({"colour": "red"}),
        )
        .authorized(),
        Scenario::new("archive", "archive", HttpMethod::Post, json!({"id": "w1"})).at("w1/archive"),
        Scenario::new("list", "list", HttpMethod::Get, Value::Null),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Demo {
        let kernel = build_kernel("ok", KernelConfig::new(), TracingPlugin::default())
            .expect("demo kernel should build");
        Demo::new(kernel, "ok")
    }

    async fn codes(via: Via) -> Vec<String> {
        let demo = demo();
        let mut out = Vec::new();
        for scenario in scenarios() {
            out.push(demo.run(&scenario, via).await.code);
        }
        out
    }

    #[tokio::test]
    async fn scenarios_behave_the_same_over_both_adapters() {
        let expected = vec![
            "UNAUTHORIZED",
            "OK",
            "OK",
            "CONFLICT",
            "VALIDATION",
            "OK",
            "OK",
        ];
        assert_eq!(codes(Via::Rest).await, expected);
        assert_eq!(codes(Via::Rpc).await, expected);
    }

    #[tokio::test]
    async fn conflicting_bulk_create_leaves_no_trace_in_the_store() {
        let demo = demo();
        let all = scenarios();
        for scenario in &all[..4] {
            demo.run(scenario, Via::Rest).await;
        }
        assert_eq!(demo.store().count(WIDGET), 3);
        let (begins, commits, rollbacks) = demo.run(&all[6], Via::Rest).await.transactions;
        assert_eq!((begins, commits, rollbacks), (3, 2, 1));
    }

    #[tokio::test]
    async fn archive_sets_the_flag() {
        let demo = demo();
        let all = scenarios();
        demo.run(&all[1], Via::Rpc).await;
        let archived = demo.run(&all[5], Via::Rpc).await;
        assert_eq!(archived.body["archived"], true);
    }
}
