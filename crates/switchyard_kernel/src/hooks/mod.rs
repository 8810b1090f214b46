//! User-registered lifecycle hooks.
//!
//! Hooks are steps bound to `(resource, alias, phase)`. Either selector may
//! be `"*"`. Within one phase, hooks run in global registration order, after
//! any framework atoms for that phase.
//!
//! Registration happens on [`KernelBuilder`](crate::KernelBuilder) only; a
//! finished [`Kernel`](crate::Kernel) exposes no way to add hooks.

mod scope;
mod table;

pub use scope::Scope;
pub use table::{HookEntry, HookKind, HookRegistrationError, HookTable};
