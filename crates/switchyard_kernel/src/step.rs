//! The unit of work every plan entry runs.
//!
//! Hooks, secdeps, handlers and framework atoms all implement [`Step`]. Most
//! callers never implement it by hand; [`from_fn`] and [`from_sync`] adapt
//! closures.
//!
//! # Example
//!
//! ```
//! use switchyard_kernel::error::StepError;
//! use switchyard_kernel::step::{from_fn, from_sync};
//!
//! let require_bearer = from_sync(|ctx| match ctx.header("authorization") {
//!     Some("Bearer ok") => Ok(()),
//!     _ => Err(StepError::unauthorized("missing bearer token")),
//! });
//!
//! let stamp = from_fn(|ctx| {
//!     Box::pin(async move {
//!         ctx.temp_mut().insert("stamped".into(), true.into());
//!         Ok(())
//!     })
//! });
//! # let _ = (require_bearer, stamp);
//! ```

use core::future::Future;
use core::pin::Pin;

use crate::context::OpContext;
use crate::error::StepError;

/// A boxed, `Send` future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every step returns.
pub type StepResult = Result<(), StepError>;

/// A labeled unit of work bound to one phase of a plan.
pub trait Step: Send + Sync + 'static {
    /// Runs against the invocation context. Returning an error aborts the
    /// invocation (or is logged and ignored in non-fatal phases).
    fn run<'a>(&'a self, ctx: &'a mut OpContext) -> BoxFuture<'a, StepResult>;
}

/// Adapter for async closures. Built by [`from_fn`].
pub struct FnStep<F> {
    f: F,
}

impl<F> Step for FnStep<F>
where
    F: for<'a> Fn(&'a mut OpContext) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    fn run<'a>(&'a self, ctx: &'a mut OpContext) -> BoxFuture<'a, StepResult> {
        (self.f)(ctx)
    }
}

/// Wraps a closure returning a boxed future.
///
/// The closure receives the context by `&mut` and usually returns
/// `Box::pin(async move { ... })`.
pub fn from_fn<F>(f: F) -> FnStep<F>
where
    F: for<'a> Fn(&'a mut OpContext) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    FnStep { f }
}

/// Adapter for synchronous closures. Built by [`from_sync`].
pub struct SyncStep<F> {
    f: F,
}

impl<F> Step for SyncStep<F>
where
    F: Fn(&mut OpContext) -> StepResult + Send + Sync + 'static,
{
    fn run<'a>(&'a self, ctx: &'a mut OpContext) -> BoxFuture<'a, StepResult> {
        let result = (self.f)(ctx);
        Box::pin(core::future::ready(result))
    }
}

/// Wraps a synchronous closure.
pub fn from_sync<F>(f: F) -> SyncStep<F>
where
    F: Fn(&mut OpContext) -> StepResult + Send + Sync + 'static,
{
    SyncStep { f }
}
