//! Plan building and invocation engine for Switchyard.
//!
//! `switchyard_kernel` turns the operation model of [`switchyard_ops`] into
//! executable plans and runs them:
//!
//! - [`phase`]: the fixed phase order of every invocation
//! - [`step`]: the unit of work, with closure adapters
//! - [`hooks`]: user registrations (hooks, secdeps, deps, handlers)
//! - [`atoms`]: framework steps injected into every matching plan
//! - [`plan`]: per-operation ordered step lists
//! - [`context`]: the per-invocation state handed to every step
//! - [`persistence`] and [`validate`]: the collaborators the kernel consumes
//! - [`error`]: the transport-agnostic error taxonomy
//! - [`trace`]: what ran, for tests and introspection
//! - [`plugin`]: composition through [`Plugin`]s
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use switchyard_kernel::context::{RequestMeta, Transport};
//! use switchyard_kernel::Kernel;
//! use switchyard_ops::ResourceDef;
//! # use async_trait::async_trait;
//! # use serde_json::{Value, json};
//! # use switchyard_kernel::persistence::{Persistence, Store, StoreError};
//! # struct NullStore;
//! # #[async_trait]
//! # impl Store for NullStore {
//! #     async fn insert(&self, _: &str, _: &str, item: Value) -> Result<Value, StoreError> { Ok(item) }
//! #     async fn fetch(&self, r: &str, id: &str) -> Result<Value, StoreError> {
//! #         Err(StoreError::NotFound { resource: r.into(), id: id.into() })
//! #     }
//! #     async fn write(&self, _: &str, _: &str, item: Value) -> Result<Value, StoreError> { Ok(item) }
//! #     async fn remove(&self, r: &str, id: &str) -> Result<Value, StoreError> {
//! #         Err(StoreError::NotFound { resource: r.into(), id: id.into() })
//! #     }
//! #     async fn scan(&self, _: &str) -> Result<Vec<Value>, StoreError> { Ok(Vec::new()) }
//! # }
//! # #[async_trait]
//! # impl Persistence for NullStore {
//! #     async fn begin(&self) -> Result<(), StoreError> { Ok(()) }
//! #     async fn commit(&self) -> Result<(), StoreError> { Ok(()) }
//! #     async fn rollback(&self) -> Result<(), StoreError> { Ok(()) }
//! # }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = Kernel::builder();
//! builder.register_resource(ResourceDef::new("Widget").with_canonical_ops()?)?;
//! let kernel = builder.finish()?;
//!
//! let invocation = kernel
//!     .invoke(
//!         "Widget",
//!         "create",
//!         json!({"name": "w"}),
//!         Arc::new(NullStore),
//!         RequestMeta::new(Transport::Direct),
//!     )
//!     .await?;
//!
//! let created = invocation.outcome?;
//! assert_eq!(created["name"], "w");
//! assert!(kernel.trace(&invocation.correlation_id).is_some());
//! # Ok(())
//! # }
//! ```

pub mod atoms;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
mod invoker;
mod kernel;
pub mod label;
pub mod persistence;
pub mod phase;
pub mod plan;
pub mod plugin;
pub mod step;
pub mod trace;
pub mod validate;

pub use config::{ConfigError, KernelConfig};
pub use context::{CancelHandle, CancelSignal, OpContext, RequestMeta, Transport};
pub use error::{ErrorCode, ErrorEnvelope, FieldError, StepError};
pub use kernel::{BuildError, Invocation, Kernel, KernelBuilder, MethodDescriptor};
pub use persistence::{Persistence, SessionSource, Store, StoreError};
pub use phase::Phase;
pub use plan::Plan;
pub use plugin::{Plugin, PluginId, Plugins};
pub use step::{Step, StepResult, from_fn, from_sync};
pub use trace::{Outcome, Trace, TraceEntry};
pub use validate::Validator;
