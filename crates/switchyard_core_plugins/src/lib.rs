//! Infrastructure plugins and collaborators for Switchyard.
//!
//! - [`TracingPlugin`]: installs a `tracing-subscriber` registry
//! - [`ValidationPlugin`] and [`RequiredFields`]: field-presence validation
//! - [`MemoryStore`]: transactional in-memory persistence, usable as a
//!   [`SessionSource`](switchyard_kernel::SessionSource) for the adapters
//!
//! # Example
//!
//! ```
//! use switchyard_core_plugins::{MemoryStore, TracingPlugin, ValidationPlugin};
//! use switchyard_kernel::Kernel;
//! use switchyard_ops::ResourceDef;
//!
//! let mut builder = Kernel::builder();
//! builder
//!     .register_resource(ResourceDef::new("Widget").with_canonical_ops().expect("ops"))
//!     .expect("Widget should register");
//! let kernel = builder
//!     .add_plugins((
//!         TracingPlugin::default(),
//!         ValidationPlugin::new().require("Widget", ["name"]),
//!     ))
//!     .finish()
//!     .expect("kernel should build");
//!
//! let store = MemoryStore::new();
//! assert_eq!(store.begins(), 0);
//! # let _ = kernel;
//! ```

pub mod memory;
mod tracing_plugin;
mod validation;

pub use memory::{MemorySession, MemoryStore};
pub use tracing_plugin::{TracingFormat, TracingPlugin};
pub use validation::{RequiredFields, ValidationPlugin};
