//! Shared fixtures for the adapter tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Arc;

use switchyard_core_plugins::MemoryStore;
use switchyard_kernel::{Kernel, KernelBuilder, KernelConfig, StepError, from_sync};
use switchyard_ops::ResourceDef;
use switchyard_transport::{RestAdapter, RpcAdapter};

pub const BEARER: &str = "Bearer ok";

/// Both adapters over one kernel and one store.
pub struct Harness {
    pub kernel: Kernel,
    pub store: MemoryStore,
    pub rest: RestAdapter,
    pub rpc: RpcAdapter,
}

impl Harness {
    pub fn new(kernel: Kernel) -> Self {
        Self::with_store(kernel, MemoryStore::new())
    }

    pub fn with_store(kernel: Kernel, store: MemoryStore) -> Self {
        let sessions = Arc::new(store.clone());
        Self {
            rest: RestAdapter::new(kernel.clone(), sessions.clone()),
            rpc: RpcAdapter::new(kernel.clone(), sessions),
            kernel,
            store,
        }
    }
}

pub fn widget_builder() -> KernelBuilder {
    let mut builder = Kernel::builder();
    builder
        .register_resource(
            ResourceDef::new("Widget")
                .with_canonical_ops()
                .expect("canonical ops should register"),
        )
        .expect("Widget should register");
    builder
}

/// Widget with a bearer-token secdep on `create`.
pub fn guarded() -> Harness {
    guarded_with(KernelConfig::new())
}

pub fn guarded_with(config: KernelConfig) -> Harness {
    let mut builder = widget_builder().with_config(config);
    builder
        .register_secdep(
            "Widget",
            "create",
            "bearer",
            from_sync(|ctx| match ctx.header("authorization") {
                Some(BEARER) => Ok(()),
                _ => Err(StepError::unauthorized("missing bearer token")),
            }),
        )
        .expect("secdep should register");
    Harness::new(builder.finish().expect("kernel should build"))
}

/// Plain canonical Widget.
pub fn open() -> Harness {
    Harness::new(widget_builder().finish().expect("kernel should build"))
}
