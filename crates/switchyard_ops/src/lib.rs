//! Operation model for Switchyard (Layer 1).
//!
//! Every request the kernel serves, whether it arrives over REST or JSON-RPC,
//! is first resolved to an [`OperationSpec`]: an alias on a resource, backed
//! by exactly one [`Target`] verb. This crate holds that vocabulary and the
//! [`Resolver`] both transports share.
//!
//! # Example
//!
//! ```
//! use switchyard_ops::{OperationSpec, ResourceDef, Resolver, Target};
//!
//! let widget = ResourceDef::new("Widget")
//!     .with_canonical_ops()?
//!     .with_op(OperationSpec::custom("rotate"))?;
//!
//! let mut resolver = Resolver::new();
//! resolver.register(widget)?;
//!
//! let spec = resolver.resolve("Widget", "bulk_create")?;
//! assert_eq!(spec.target(), &Target::BulkCreate);
//! assert!(spec.is_persistent());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod resolver;
mod resource;
mod spec;
mod target;

pub use resolver::{OperationNotFound, RegistrationError, Resolver};
pub use resource::{Model, ResourceDef};
pub use spec::OperationSpec;
pub use target::{Arity, HttpMethod, Persist, Target};
