//! In-memory transactional persistence.
//!
//! [`MemoryStore`] owns the committed tables and hands out one
//! [`MemorySession`] per invocation. A session reads and writes the
//! committed tables directly until `begin()`. After that it works on a
//! private snapshot and records every change, and `commit()` replays the
//! change log onto the shared tables in one critical section. Inserts are
//! re-checked during replay, so two sessions creating the same id cannot
//! both commit. Rollback discards both.
//!
//! Transaction calls are counted across all sessions, which makes the store
//! double as a test fixture for "no transaction was opened" assertions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use switchyard_kernel::{Persistence, SessionSource, Store, StoreError};

type Table = IndexMap<String, Value>;
type Tables = IndexMap<String, Table>;

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Shared in-memory tables keyed by resource, then id.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session over this store.
    #[must_use]
    pub fn session(&self) -> Arc<MemorySession> {
        Arc::new(MemorySession {
            shared: Arc::clone(&self.shared),
            staged: Mutex::new(None),
        })
    }

    /// Committed items of one resource, in insertion order.
    #[must_use]
    pub fn items(&self, resource: &str) -> Vec<Value> {
        self.shared
            .tables
            .read()
            .get(resource)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of committed items in one resource.
    #[must_use]
    pub fn count(&self, resource: &str) -> usize {
        self.shared.tables.read().get(resource).map_or(0, Table::len)
    }

    /// Total `begin()` calls across all sessions.
    #[must_use]
    pub fn begins(&self) -> usize {
        self.shared.begins.load(Ordering::SeqCst)
    }

    /// Total successful `commit()` calls across all sessions.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Total `rollback()` calls across all sessions.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }
}

impl SessionSource for MemoryStore {
    fn open_session(&self) -> Arc<dyn Persistence> {
        self.session()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemorySession
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Change {
    Insert { resource: String, id: String, item: Value },
    Put { resource: String, id: String, item: Value },
    Remove { resource: String, id: String },
}

#[derive(Debug)]
struct Staged {
    view: Tables,
    log: Vec<Change>,
}

/// One invocation's handle on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<Shared>,
    staged: Mutex<Option<Staged>>,
}

impl MemorySession {
    /// Whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.staged.lock().is_some()
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        match self.staged.lock().as_ref() {
            Some(staged) => f(&staged.view),
            None => f(&self.shared.tables.read()),
        }
    }

    /// Applies a change to the snapshot (and logs it) or straight to the
    /// shared tables outside a transaction.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<(R, Change), StoreError>,
    ) -> Result<R, StoreError> {
        let mut staged = self.staged.lock();
        match staged.as_mut() {
            Some(staged) => {
                let (out, change) = f(&mut staged.view)?;
                staged.log.push(change);
                Ok(out)
            }
            None => f(&mut self.shared.tables.write()).map(|(out, _)| out),
        }
    }
}

fn not_found(resource: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

fn put(resource: &str, id: &str, item: &Value) -> Change {
    Change::Put {
        resource: resource.to_string(),
        id: id.to_string(),
        item: item.clone(),
    }
}

#[async_trait]
impl Store for MemorySession {
    async fn insert(&self, resource: &str, id: &str, item: Value) -> Result<Value, StoreError> {
        self.mutate(|tables| {
            let table = tables.entry(resource.to_string()).or_default();
            if table.contains_key(id) {
                return Err(StoreError::Conflict {
                    resource: resource.to_string(),
                    id: id.to_string(),
                });
            }
            table.insert(id.to_string(), item.clone());
            let change = Change::Insert {
                resource: resource.to_string(),
                id: id.to_string(),
                item: item.clone(),
            };
            Ok((item, change))
        })
    }

    async fn fetch(&self, resource: &str, id: &str) -> Result<Value, StoreError> {
        self.read(|tables| {
            tables
                .get(resource)
                .and_then(|table| table.get(id))
                .cloned()
                .ok_or_else(|| not_found(resource, id))
        })
    }

    async fn write(&self, resource: &str, id: &str, item: Value) -> Result<Value, StoreError> {
        self.mutate(|tables| {
            let slot = tables
                .get_mut(resource)
                .and_then(|table| table.get_mut(id))
                .ok_or_else(|| not_found(resource, id))?;
            slot.clone_from(&item);
            let change = put(resource, id, &item);
            Ok((item, change))
        })
    }

    async fn remove(&self, resource: &str, id: &str) -> Result<Value, StoreError> {
        self.mutate(|tables| {
            let removed = tables
                .get_mut(resource)
                .and_then(|table| table.shift_remove(id))
                .ok_or_else(|| not_found(resource, id))?;
            let change = Change::Remove {
                resource: resource.to_string(),
                id: id.to_string(),
            };
            Ok((removed, change))
        })
    }

    async fn scan(&self, resource: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self.read(|tables| {
            tables
                .get(resource)
                .map(|table| table.values().cloned().collect())
                .unwrap_or_default()
        }))
    }
}

#[async_trait]
impl Persistence for MemorySession {
    async fn begin(&self) -> Result<(), StoreError> {
        self.shared.begins.fetch_add(1, Ordering::SeqCst);
        let mut staged = self.staged.lock();
        if staged.is_some() {
            return Err(StoreError::Backend("transaction already open".to_string()));
        }
        *staged = Some(Staged {
            view: self.shared.tables.read().clone(),
            log: Vec::new(),
        });
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let mut staged = self.staged.lock();
        let log = &staged.as_ref().ok_or(StoreError::NoTransaction)?.log;
        let mut tables = self.shared.tables.write();
        let mut next = tables.clone();
        for change in log {
            match change {
                Change::Insert { resource, id, item } => {
                    let table = next.entry(resource.clone()).or_default();
                    if table.contains_key(id) {
                        // Left staged so the caller's rollback still applies.
                        tracing::warn!(%resource, %id, "commit lost an insert race");
                        return Err(StoreError::Conflict {
                            resource: resource.clone(),
                            id: id.clone(),
                        });
                    }
                    table.insert(id.clone(), item.clone());
                }
                Change::Put { resource, id, item } => {
                    next.entry(resource.clone())
                        .or_default()
                        .insert(id.clone(), item.clone());
                }
                Change::Remove { resource, id } => {
                    if let Some(table) = next.get_mut(resource) {
                        table.shift_remove(id);
                    }
                }
            }
        }
        *tables = next;
        *staged = None;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.staged
            .lock()
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }
}
