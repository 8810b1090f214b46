//! Protocol adapters for Switchyard.
//!
//! Both adapters are thin: they turn a protocol request into
//! `(resource, alias, payload, meta)`, call [`Kernel::invoke`] with a fresh
//! session from a [`SessionSource`], and map the outcome back through the
//! shared [`codes`] table. Neither carries business logic, so the same
//! operation run over either protocol produces the same trace.
//!
//! - [`rest`]: method and path routing, with body-shape dispatch for bulk
//!   and merge verbs
//! - [`rpc`]: JSON-RPC 2.0 with batches and notifications
//!
//! Neither adapter owns a socket. An HTTP server hands [`RestRequest`]s to
//! [`RestAdapter::handle`] and writes the [`RestResponse`] back.
//!
//! [`Kernel::invoke`]: switchyard_kernel::Kernel::invoke
//! [`SessionSource`]: switchyard_kernel::SessionSource

pub mod codes;
pub mod rest;
pub mod rpc;

pub use codes::{CODE_TABLE, CodeMapping, http_status, rpc_code};
pub use rest::{RestAdapter, RestRequest, RestResponse, Route, RouteError, RouteMatch};
pub use rpc::RpcAdapter;
