//! The REST adapter.
//!
//! Routes are derived from the resolver when the adapter is created:
//!
//! | arity | template |
//! |-------|----------|
//! | collection | `/{path}{suffix}` |
//! | member | `/{path}/{item_id}{suffix}` |
//!
//! Several operations may share one method and template (`create` and
//! `bulk_create` are both `POST /widget`). The request body then decides:
//! an array selects the bulk verb, a collection `DELETE` with an `ids`
//! array selects `bulk_delete`, and a `PATCH` sent as
//! `application/merge-patch+json` selects the merge verb.
//!
//! Three introspection routes are always present: `GET /system/kernelz`,
//! `GET /system/methodz` and `GET /system/tracez/{correlation_id}`.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use switchyard_kernel::atoms::ITEM_ID;
use switchyard_kernel::{ErrorEnvelope, Kernel, RequestMeta, SessionSource, Transport};
use switchyard_ops::{Arity, HttpMethod, Target};
use thiserror::Error;

use crate::codes::http_status;

/// Response header carrying the invocation's correlation id. Also read from
/// requests to reuse a caller-chosen id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Content type that routes a `PATCH` to the merge verb.
pub const MERGE_PATCH: &str = "application/merge-patch+json";

const SYSTEM: &str = "system";

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response
// ─────────────────────────────────────────────────────────────────────────────

/// An already-parsed HTTP request.
#[derive(Debug, Clone)]
pub struct RestRequest {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Value,
}

impl RestRequest {
    /// A request with no headers, query or body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Value::Null,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// The method.
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The path, without query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks up a header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn wants_bulk(&self) -> bool {
        self.body.is_array()
            || (self.method == HttpMethod::Delete
                && self.body.get("ids").is_some_and(Value::is_array))
    }

    fn wants_merge(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with(MERGE_PATCH))
    }

    /// The body, or the query parameters as an object when there is none.
    fn into_payload(self) -> Value {
        if !self.body.is_null() || self.query.is_empty() {
            return self.body;
        }
        let params: Map<String, Value> = self
            .query
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Value::Object(params)
    }
}

/// A response ready to be written by an HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Value,
}

impl RestResponse {
    fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Looks up a header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `x-correlation-id` header.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.header(CORRELATION_HEADER)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Routes
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request matched no operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No template matches the path.
    #[error("no route matches {path}")]
    NotFound {
        /// The requested path.
        path: String,
    },
    /// A template matches, but not with this method.
    #[error("{method} is not allowed on {path}")]
    MethodNotAllowed {
        /// The requested method.
        method: HttpMethod,
        /// The requested path.
        path: String,
        /// Methods the path does accept.
        allowed: Vec<HttpMethod>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    ItemId,
}

/// One `(method, template) -> (resource, alias)` entry.
#[derive(Debug, Clone)]
pub struct Route {
    method: HttpMethod,
    segments: Vec<Segment>,
    resource: String,
    alias: String,
    target: Target,
    status: u16,
}

impl Route {
    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The path template, e.g. `/widget/{item_id}`.
    #[must_use]
    pub fn template(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::ItemId => out.push_str("{item_id}"),
            }
        }
        out
    }

    /// The target resource.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The target alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Binds `path` against the template, returning the item id (if any).
    fn bind(&self, path: &[&str]) -> Option<Option<String>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut item_id = None;
        for (segment, part) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::ItemId => item_id = Some((*part).to_string()),
            }
        }
        Some(item_id)
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// How well the body shape fits this route's verb.
    fn shape_score(&self, request: &RestRequest) -> u8 {
        let mut score = 0;
        if self.target.is_bulk() == request.wants_bulk() {
            score += 2;
        }
        if matches!(self.target, Target::Merge | Target::BulkMerge) == request.wants_merge() {
            score += 1;
        }
        score
    }
}

/// The operation a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Resource name.
    pub resource: String,
    /// Alias.
    pub alias: String,
    /// The `{item_id}` segment, for member routes.
    pub item_id: Option<String>,
    /// Status returned on success.
    pub status: u16,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// RestAdapter
// ─────────────────────────────────────────────────────────────────────────────

/// Translates REST requests into kernel invocations.
pub struct RestAdapter {
    kernel: Kernel,
    sessions: Arc<dyn SessionSource>,
    routes: Vec<Route>,
}

impl RestAdapter {
    /// Builds the route table from every REST-exposed operation.
    #[must_use]
    pub fn new(kernel: Kernel, sessions: Arc<dyn SessionSource>) -> Self {
        let mut routes = Vec::new();
        for def in kernel.resolver().resources() {
            for spec in def.ops().filter(|spec| spec.exposes_rest()) {
                let mut segments = vec![Segment::Literal(def.path().to_string())];
                if spec.arity() == Arity::Member {
                    segments.push(Segment::ItemId);
                }
                segments.extend(
                    split_path(&spec.path_suffix())
                        .into_iter()
                        .map(|s| Segment::Literal(s.to_string())),
                );
                routes.push(Route {
                    method: spec.http_method(),
                    segments,
                    resource: def.name().to_string(),
                    alias: spec.alias().to_string(),
                    target: spec.target().clone(),
                    status: spec.success_status(),
                });
            }
        }
        tracing::debug!(routes = routes.len(), "rest routes built");
        Self {
            kernel,
            sessions,
            routes,
        }
    }

    /// Every route, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Picks the operation for a request without invoking it.
    ///
    /// # Errors
    ///
    /// [`RouteError::NotFound`] if no template matches the path,
    /// [`RouteError::MethodNotAllowed`] if none matches with this method.
    pub fn resolve(&self, request: &RestRequest) -> Result<RouteMatch, RouteError> {
        let path = split_path(&request.path);
        let bound: Vec<(&Route, Option<String>)> = self
            .routes
            .iter()
            .filter_map(|route| route.bind(&path).map(|id| (route, id)))
            .collect();
        if bound.is_empty() {
            return Err(RouteError::NotFound {
                path: request.path.clone(),
            });
        }

        let mut best: Option<(&Route, Option<String>)> = None;
        for &(route, ref item_id) in bound.iter().filter(|(r, _)| r.method == request.method) {
            let better = best.as_ref().is_none_or(|(current, _)| {
                (route.literal_count(), route.shape_score(request))
                    > (current.literal_count(), current.shape_score(request))
            });
            if better {
                best = Some((route, item_id.clone()));
            }
        }

        let Some((route, item_id)) = best else {
            let mut allowed: Vec<HttpMethod> = Vec::new();
            for (route, _) in &bound {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method);
                }
            }
            return Err(RouteError::MethodNotAllowed {
                method: request.method,
                path: request.path.clone(),
                allowed,
            });
        };

        Ok(RouteMatch {
            resource: route.resource.clone(),
            alias: route.alias.clone(),
            item_id,
            status: route.status,
        })
    }

    /// Routes, invokes and formats one request.
    pub async fn handle(&self, request: RestRequest) -> RestResponse {
        if let Some(response) = self.system(&request) {
            return response;
        }

        let route = match self.resolve(&request) {
            Ok(route) => route,
            Err(err) => {
                tracing::debug!(method = %request.method, path = %request.path, error = %err, "no route");
                return route_error(&err);
            }
        };

        let mut meta = RequestMeta::new(Transport::Rest).with_headers(request.headers.clone());
        if let Some(id) = &route.item_id {
            meta = meta.with_path_param(ITEM_ID, id.clone());
        }
        if let Some(id) = request.header(CORRELATION_HEADER) {
            meta = meta.with_correlation_id(id);
        }

        let invoked = self
            .kernel
            .invoke(
                &route.resource,
                &route.alias,
                request.into_payload(),
                self.sessions.open_session(),
                meta,
            )
            .await;

        match invoked {
            Ok(invocation) => match invocation.outcome {
                Ok(result) => RestResponse::new(route.status, result)
                    .with_header(CORRELATION_HEADER, invocation.correlation_id),
                Err(envelope) => error_response(&envelope),
            },
            Err(err) => route_error(&RouteError::NotFound {
                path: format!("{}.{}", err.resource, err.alias),
            }),
        }
    }

    fn system(&self, request: &RestRequest) -> Option<RestResponse> {
        let path = split_path(&request.path);
        if path.first() != Some(&SYSTEM) || request.method != HttpMethod::Get {
            return None;
        }
        let response = match path.as_slice() {
            [_, "kernelz"] => RestResponse::new(200, json!(self.kernel.kernelz())),
            [_, "methodz"] => RestResponse::new(200, json!(self.kernel.methodz())),
            [_, "tracez", id] => match self.kernel.trace(id) {
                Some(trace) => RestResponse::new(200, json!(trace)),
                None => route_error(&RouteError::NotFound {
                    path: request.path.clone(),
                }),
            },
            _ => return None,
        };
        Some(response)
    }
}

/// `{code, message, correlation_id, details?}` with the mapped status.
fn error_response(envelope: &ErrorEnvelope) -> RestResponse {
    RestResponse::new(http_status(envelope.code), envelope_body(envelope))
        .with_header(CORRELATION_HEADER, envelope.correlation_id.clone())
}

fn envelope_body(envelope: &ErrorEnvelope) -> Value {
    let mut body = json!({
        "code": envelope.code.as_str(),
        "message": envelope.message,
        "correlation_id": envelope.correlation_id,
    });
    if !envelope.details.is_empty() {
        body["details"] = json!(envelope.details);
    }
    body
}

/// Routing failures never reach the kernel, so there is no trace to point a
/// correlation id at.
fn route_error(err: &RouteError) -> RestResponse {
    match err {
        RouteError::NotFound { .. } => RestResponse::new(
            404,
            json!({"code": "NOT_FOUND", "message": err.to_string()}),
        ),
        RouteError::MethodNotAllowed { allowed, .. } => {
            let allow: Vec<&str> = allowed.iter().map(HttpMethod::as_str).collect();
            RestResponse::new(
                405,
                json!({"code": "METHOD_NOT_ALLOWED", "message": err.to_string()}),
            )
            .with_header("allow", allow.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_kernel::Persistence;
    use switchyard_ops::{OperationSpec, ResourceDef};

    struct NoSessions;

    impl SessionSource for NoSessions {
        fn open_session(&self) -> Arc<dyn Persistence> {
            unreachable!("routing tests never invoke")
        }
    }

    fn adapter() -> RestAdapter {
        let mut builder = Kernel::builder();
        builder
            .register_resource(
                ResourceDef::new("Widget")
                    .with_canonical_ops()
                    .and_then(|r| r.with_op(OperationSpec::custom("rotate").with_arity(Arity::Member)))
                    .and_then(|r| {
                        r.with_op(OperationSpec::custom("restock").with_http_method(HttpMethod::Put))
                    })
                    .expect("ops should register"),
            )
            .expect("resource should register");
        builder
            .register_handler("Widget", "rotate", "rotate", switchyard_kernel::from_sync(|_| Ok(())))
            .expect("handler should register");
        builder
            .register_handler("Widget", "restock", "restock", switchyard_kernel::from_sync(|_| Ok(())))
            .expect("handler should register");
        let kernel = builder.finish().expect("kernel should build");
        RestAdapter::new(kernel, Arc::new(NoSessions))
    }

    fn alias_for(adapter: &RestAdapter, request: RestRequest) -> String {
        adapter.resolve(&request).expect("route should resolve").alias
    }

    #[test]
    fn body_shape_selects_bulk_verbs() {
        let adapter = adapter();
        let post = RestRequest::new(HttpMethod::Post, "/widget");
        assert_eq!(alias_for(&adapter, post.clone().with_body(json!({"name": "w"}))), "create");
        assert_eq!(alias_for(&adapter, post.with_body(json!([{"name": "w"}]))), "bulk_create");

        let delete = RestRequest::new(HttpMethod::Delete, "/widget");
        assert_eq!(alias_for(&adapter, delete.clone()), "clear");
        assert_eq!(
            alias_for(&adapter, delete.clone().with_body(json!({"ids": ["1"]}))),
            "bulk_delete"
        );
        assert_eq!(alias_for(&adapter, delete.with_body(json!(["1"]))), "bulk_delete");

        let put = RestRequest::new(HttpMethod::Put, "/widget").with_body(json!([{"id": "1"}]));
        assert_eq!(alias_for(&adapter, put), "bulk_replace");
    }

    #[test]
    fn merge_patch_content_type_selects_merge() {
        let adapter = adapter();
        let patch = RestRequest::new(HttpMethod::Patch, "/widget/7").with_body(json!({"a": 1}));
        let plain = adapter.resolve(&patch).expect("route should resolve");
        assert_eq!(plain.alias, "update");
        assert_eq!(plain.item_id.as_deref(), Some("7"));

        let merge = patch.with_header("Content-Type", "application/merge-patch+json");
        assert_eq!(alias_for(&adapter, merge), "merge");

        let bulk = RestRequest::new(HttpMethod::Patch, "/widget")
            .with_body(json!([{"id": "1"}]))
            .with_header("content-type", MERGE_PATCH);
        assert_eq!(alias_for(&adapter, bulk), "bulk_merge");
    }

    #[test]
    fn custom_suffixes_outrank_item_ids() {
        let adapter = adapter();
        let rotate = adapter
            .resolve(&RestRequest::new(HttpMethod::Post, "/widget/7/rotate"))
            .expect("route should resolve");
        assert_eq!(rotate.alias, "rotate");
        assert_eq!(rotate.item_id.as_deref(), Some("7"));

        assert_eq!(
            alias_for(&adapter, RestRequest::new(HttpMethod::Put, "/widget/restock")),
            "restock"
        );
        assert_eq!(
            alias_for(&adapter, RestRequest::new(HttpMethod::Put, "/widget/8")),
            "replace"
        );
    }

    #[test]
    fn unknown_paths_and_methods_are_distinguished() {
        let adapter = adapter();
        assert!(matches!(
            adapter.resolve(&RestRequest::new(HttpMethod::Get, "/gadget")),
            Err(RouteError::NotFound { .. })
        ));
        let err = adapter
            .resolve(&RestRequest::new(HttpMethod::Post, "/widget/7"))
            .expect_err("POST on a member should not route");
        let RouteError::MethodNotAllowed { allowed, .. } = err else {
            panic!("expected 405, got {err:?}");
        };
        assert!(allowed.contains(&HttpMethod::Get));
        assert!(allowed.contains(&HttpMethod::Delete));
    }

    #[test]
    fn templates_render_item_ids() {
        let adapter = adapter();
        let templates: Vec<String> = adapter
            .routes()
            .iter()
            .filter(|r| r.alias() == "read" || r.alias() == "rotate")
            .map(Route::template)
            .collect();
        assert_eq!(templates, vec!["/widget/{item_id}", "/widget/{item_id}/rotate"]);
    }

    #[test]
    fn query_becomes_payload_only_without_body() {
        let request = RestRequest::new(HttpMethod::Get, "/widget").with_query("colour", "red");
        assert_eq!(request.into_payload(), json!({"colour": "red"}));

        let request = RestRequest::new(HttpMethod::Post, "/widget")
            .with_query("colour", "red")
            .with_body(json!({"name": "w"}));
        assert_eq!(request.into_payload(), json!({"name": "w"}));
    }
}
