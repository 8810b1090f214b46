//! An operation-dispatch kernel for resource-oriented services.
//!
//! Every `(resource, alias)` operation compiles to one ordered plan of
//! steps: security dependencies, transaction control, validation, the
//! handler and lifecycle hooks. The REST and JSON-RPC adapters both run
//! that same plan.

pub use switchyard_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use switchyard_internal::prelude::*;
}
