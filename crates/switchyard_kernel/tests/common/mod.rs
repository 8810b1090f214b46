//! Shared fixtures for the kernel integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use switchyard_kernel::{Kernel, KernelBuilder, Persistence, Store, StoreError};
use switchyard_ops::ResourceDef;

type Tables = IndexMap<String, IndexMap<String, Value>>;

/// Transactional in-memory store that counts transaction calls.
#[derive(Default)]
pub struct CountingStore {
    committed: Mutex<Tables>,
    staged: Mutex<Option<Tables>>,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Committed rows of one resource.
    pub fn rows(&self, resource: &str) -> Vec<Value> {
        self.committed
            .lock()
            .get(resource)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut staged = self.staged.lock();
        match staged.as_mut() {
            Some(tables) => f(tables),
            None => f(&mut self.committed.lock()),
        }
    }
}

fn not_found(resource: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn insert(&self, resource: &str, id: &str, item: Value) -> Result<Value, StoreError> {
        self.with_tables(|tables| {
            let table = tables.entry(resource.to_string()).or_default();
            if table.contains_key(id) {
                return Err(StoreError::Conflict {
                    resource: resource.to_string(),
                    id: id.to_string(),
                });
            }
            table.insert(id.to_string(), item.clone());
            Ok(item)
        })
    }

    async fn fetch(&self, resource: &str, id: &str) -> Result<Value, StoreError> {
        self.with_tables(|tables| {
            tables
                .get(resource)
                .and_then(|t| t.get(id))
                .cloned()
                .ok_or_else(|| not_found(resource, id))
        })
    }

    async fn write(&self, resource: &str, id: &str, item: Value) -> Result<Value, StoreError> {
        self.with_tables(|tables| {
            let slot = tables
                .get_mut(resource)
                .and_then(|t| t.get_mut(id))
                .ok_or_else(|| not_found(resource, id))?;
            *slot = item.clone();
            Ok(item)
        })
    }

    async fn remove(&self, resource: &str, id: &str) -> Result<Value, StoreError> {
        self.with_tables(|tables| {
            tables
                .get_mut(resource)
                .and_then(|t| t.shift_remove(id))
                .ok_or_else(|| not_found(resource, id))
        })
    }

    async fn scan(&self, resource: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self.with_tables(|tables| {
            tables
                .get(resource)
                .map(|t| t.values().cloned().collect())
                .unwrap_or_default()
        }))
    }
}

#[async_trait]
impl Persistence for CountingStore {
    async fn begin(&self) -> Result<(), StoreError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.committed.lock().clone();
        *self.staged.lock() = Some(snapshot);
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let staged = self.staged.lock().take().ok_or(StoreError::NoTransaction)?;
        *self.committed.lock() = staged;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.staged
            .lock()
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }
}

/// A builder with the canonical Widget resource registered.
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
