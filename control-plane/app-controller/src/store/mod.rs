//! Narrow read/write interface to the cluster's object store.
//!
//! The reconcile loop only ever talks to an [`ObjectStore`]; production wires
//! [`KubeStore`], unit tests wire an in-memory fake.

mod kube_store;
#[cfg(test)]
mod memory;

use std::fmt;

use async_trait::async_trait;

pub use kube_store::KubeStore;
#[cfg(test)]
pub(crate) use memory::{Journal, MemoryStore};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict writing {0}")]
    Conflict(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Create,
    Update,
    Delete,
    UpdateStatus,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Get => "get",
            StoreOp::Create => "create",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
            StoreOp::UpdateStatus => "update_status",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespaced CRUD for one kind.
///
/// `update` carries the caller's `resourceVersion`; a stale version yields
/// [`StoreError::Conflict`]. `delete` of an absent object succeeds.
/// Writes return the object as persisted so callers can keep working with
/// the fresh `resourceVersion`.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    async fn get(&self, ns: &str, name: &str) -> Result<Option<K>, StoreError>;

    async fn create(&self, obj: &K) -> Result<K, StoreError>;

    async fn update(&self, obj: &K) -> Result<K, StoreError>;

    async fn delete(&self, obj: &K) -> Result<(), StoreError>;

    /// Writes the `.status` block of `obj` (merge semantics; explicit nulls
    /// clear fields).
    async fn update_status(&self, obj: &K) -> Result<K, StoreError>;
}

pub(crate) fn object_key<K: kube::Resource>(obj: &K) -> (String, String) {
    let meta = obj.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}
