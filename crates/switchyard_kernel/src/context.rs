//! Per-invocation execution state.
//!
//! An [`OpContext`] is created by the kernel for exactly one invocation and
//! handed to every step of its plan by `&mut`. Nothing in it is shared with
//! concurrent invocations.

use core::any::{Any, TypeId};
use std::sync::Arc;

use hashbrown::HashMap;
use serde_json::{Map, Value};
use switchyard_ops::{OperationSpec, Target};
use tokio::sync::watch;

use crate::error::ErrorEnvelope;
use crate::persistence::{Persistence, Store};
use crate::validate::Validator;

// ─────────────────────────────────────────────────────────────────────────────
// Transport / cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Which adapter produced the invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Called directly through `Kernel::invoke`.
    #[default]
    Direct,
    /// The REST adapter.
    Rest,
    /// The JSON-RPC adapter.
    Rpc,
}

/// Fires a paired [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels the invocation holding the paired signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by the invoker between and during steps.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Creates a linked handle and signal.
    #[must_use]
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// Returns true once the handle has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the handle fires. Never resolves if the handle is
    /// dropped without firing.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                core::future::pending::<()>().await;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RequestMeta
// ─────────────────────────────────────────────────────────────────────────────

/// Transport-supplied request data that is not part of the payload.
///
/// Header names are stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    transport: Transport,
    headers: HashMap<String, String>,
    path_params: HashMap<String, String>,
    correlation_id: Option<String>,
    cancel: Option<CancelSignal>,
}

impl RequestMeta {
    /// Creates empty metadata for a transport.
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Adds every header from an iterator.
    #[must_use]
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers
                .insert(name.as_ref().to_ascii_lowercase(), value.into());
        }
        self
    }

    /// Adds a path parameter.
    #[must_use]
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Uses a caller-provided correlation id instead of generating one.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Attaches a cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// The originating transport.
    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Looks up a header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub(crate) fn take_cancel(&mut self) -> Option<CancelSignal> {
        self.cancel.take()
    }

    pub(crate) fn take_correlation_id(&mut self) -> Option<String> {
        self.correlation_id.take()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpContext
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable state threaded through every step of one invocation.
pub struct OpContext {
    spec: Arc<OperationSpec>,
    correlation_id: String,
    transport: Transport,
    payload: Value,
    headers: HashMap<String, String>,
    path_params: HashMap<String, String>,
    temp: Map<String, Value>,
    result: Option<Value>,
    failure: Option<ErrorEnvelope>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    store: Arc<dyn Persistence>,
    validator: Option<Arc<dyn Validator>>,
}

impl OpContext {
    pub(crate) fn new(
        spec: Arc<OperationSpec>,
        correlation_id: String,
        payload: Value,
        meta: RequestMeta,
        store: Arc<dyn Persistence>,
        validator: Option<Arc<dyn Validator>>,
    ) -> Self {
        Self {
            spec,
            correlation_id,
            transport: meta.transport,
            payload,
            headers: meta.headers,
            path_params: meta.path_params,
            temp: Map::new(),
            result: None,
            failure: None,
            extensions: HashMap::new(),
            store,
            validator,
        }
    }

    /// The operation being invoked.
    #[must_use]
    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    /// Shorthand for `spec().resource()`.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.spec.resource()
    }

    /// Shorthand for `spec().alias()`.
    #[must_use]
    pub fn alias(&self) -> &str {
        self.spec.alias()
    }

    /// Shorthand for `spec().target()`.
    #[must_use]
    pub fn target(&self) -> &Target {
        self.spec.target()
    }

    /// Identifier of this invocation's trace.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The originating transport.
    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The request payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Mutable access to the payload.
    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    /// Replaces the payload.
    pub fn set_payload(&mut self, payload: Value) {
        self.payload = payload;
    }

    /// Looks up a request header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Looks up a path parameter.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Sets a path parameter.
    pub fn set_path_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.path_params.insert(name.into(), value.into());
    }

    /// Scratch space shared by the steps of this invocation.
    #[must_use]
    pub fn temp(&self) -> &Map<String, Value> {
        &self.temp
    }

    /// Mutable scratch space.
    pub fn temp_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.temp
    }

    /// The result produced so far, if any.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Mutable access to the result.
    pub fn result_mut(&mut self) -> Option<&mut Value> {
        self.result.as_mut()
    }

    /// Sets the result.
    pub fn set_result(&mut self, result: Value) {
        self.result = Some(result);
    }

    /// Takes the result, leaving none.
    pub fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }

    /// The failure being handled. Only set while `ON_ERROR` steps run.
    #[must_use]
    pub fn failure(&self) -> Option<&ErrorEnvelope> {
        self.failure.as_ref()
    }

    pub(crate) fn set_failure(&mut self, failure: ErrorEnvelope) {
        self.failure = Some(failure);
    }

    /// CRUD access to persistence. Transaction control is not reachable from
    /// here.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    /// The resource's validator, if one is registered.
    #[must_use]
    pub fn validator(&self) -> Option<&dyn Validator> {
        self.validator.as_deref()
    }

    /// Stores a typed extension, returning the previous value.
    pub fn insert_extension<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok().map(|boxed| *boxed))
    }

    /// Borrows a typed extension.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Mutably borrows a typed extension.
    pub fn extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }
}

impl core::fmt::Debug for OpContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OpContext")
            .field("resource", &self.spec.resource())
            .field("alias", &self.spec.alias())
            .field("correlation_id", &self.correlation_id)
            .field("transport", &self.transport)
            .field("payload", &self.payload)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_headers_are_case_insensitive() {
        let meta = RequestMeta::new(Transport::Rest).with_header("Authorization", "Bearer ok");
        assert_eq!(meta.header("authorization"), Some("Bearer ok"));
        assert_eq!(meta.header("AUTHORIZATION"), Some("Bearer ok"));
        assert_eq!(meta.header("x-missing"), None);
    }

    #[tokio::test]
    async fn cancel_signal_resolves_after_cancel() {
        let (handle, mut signal) = CancelSignal::pair();
        assert!(!signal.is_cancelled());
        handle.cancel();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() {
        let (handle, mut signal) = CancelSignal::pair();
        drop(handle);
        let waited =
            tokio::time::timeout(core::time::Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
