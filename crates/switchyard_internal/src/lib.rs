//! # Switchyard Internal Library
//!
//! Re-exports the Switchyard crates for convenience.

/// Layer 1: the operation model.
pub use switchyard_ops;

/// Layer 2: plans, hooks and the invoker.
pub use switchyard_kernel;

/// Layer 3: REST and JSON-RPC adapters.
pub use switchyard_transport;

/// Infrastructure plugins and the in-memory store.
pub use switchyard_core_plugins;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use switchyard_core_plugins::{
        MemoryStore, RequiredFields, TracingFormat, TracingPlugin, ValidationPlugin,
    };
    pub use switchyard_kernel::{
        ErrorCode, ErrorEnvelope, FieldError, Kernel, KernelBuilder, KernelConfig, OpContext,
        Persistence, Phase, Plugin, RequestMeta, SessionSource, Step, StepError, StepResult,
        Store, StoreError, Transport, Validator, from_fn, from_sync,
    };
    pub use switchyard_ops::{Arity, HttpMethod, OperationSpec, Persist, ResourceDef, Target};
    pub use switchyard_transport::{RestAdapter, RestRequest, RestResponse, RpcAdapter};
}
