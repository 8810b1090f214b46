//! Persistence collaborator interfaces.
//!
//! The kernel never talks to a database directly. It consumes a
//! [`Persistence`] handle per invocation: resource-keyed CRUD primitives
//! ([`Store`]) plus transaction control. Steps only ever see the [`Store`]
//! half through `OpContext::store`, so transaction boundaries stay in the
//! invoker's hands.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No item with this id.
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Resource name.
        resource: String,
        /// Item id.
        id: String,
    },
    /// An item with this id already exists.
    #[error("{resource} '{id}' already exists")]
    Conflict {
        /// Resource name.
        resource: String,
        /// Item id.
        id: String,
    },
    /// Commit or rollback without an open transaction.
    #[error("no transaction is open")]
    NoTransaction,
    /// Anything the backend cannot classify.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Resource-keyed CRUD primitives over JSON records.
///
/// Items are JSON objects carrying an `id` field. Ids are compared as
/// strings, so `7` and `"7"` address the same item.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new item.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the id is taken.
    async fn insert(&self, resource: &str, id: &str, item: Value) -> Result<Value, StoreError>;

    /// Fetches one item.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent.
    async fn fetch(&self, resource: &str, id: &str) -> Result<Value, StoreError>;

    /// Overwrites an existing item.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent.
    async fn write(&self, resource: &str, id: &str, item: Value) -> Result<Value, StoreError>;

    /// Removes one item, returning it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent.
    async fn remove(&self, resource: &str, id: &str) -> Result<Value, StoreError>;

    /// Every item of a resource, in insertion order.
    ///
    /// # Errors
    ///
    /// Backend failures only; an unknown resource is empty.
    async fn scan(&self, resource: &str) -> Result<Vec<Value>, StoreError>;
}

/// A [`Store`] with transaction control. Only the invoker calls these.
#[async_trait]
pub trait Persistence: Store {
    /// Opens a transaction.
    async fn begin(&self) -> Result<(), StoreError>;

    /// Commits the open transaction.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Discards the open transaction.
    async fn rollback(&self) -> Result<(), StoreError>;
}

/// Opens one [`Persistence`] handle per invocation.
///
/// Transport adapters hold a source and open a fresh session for every
/// request, so concurrent invocations never share a transaction.
pub trait SessionSource: Send + Sync + 'static {
    /// A handle for a single invocation.
    fn open_session(&self) -> Arc<dyn Persistence>;
}
