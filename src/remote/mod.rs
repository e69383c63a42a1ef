//! Remote entity store.
//!
//! The authoritative backend, one logical table per entity type.

mod http;
#[cfg(test)]
mod memory;

pub use http::*;
#[cfg(test)]
pub use memory::*;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::Entity;

/// Failures talking to the remote store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Network or transport failure, or no remote configured.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote answered with a non-success status.
    #[error("remote rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The remote answered with data that does not fit the entity shape.
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

/// Minimal CRUD contract of a remote table.
#[async_trait]
pub trait RemoteStore<T: Entity>: Send + Sync {
    async fn list(&self) -> Result<Vec<T>, RemoteError>;

    /// Insert a record and return it as stored remotely.
    async fn insert(&self, entity: &T) -> Result<T, RemoteError>;

    async fn update(&self, id: &str, patch: &Value) -> Result<(), RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Remote used when no backend URL is configured; every call is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRemote;

impl OfflineRemote {
    fn unavailable<T>() -> Result<T, RemoteError> {
        Err(RemoteError::Unavailable("no remote configured".to_string()))
    }
}

#[async_trait]
impl<T: Entity> RemoteStore<T> for OfflineRemote {
    async fn list(&self) -> Result<Vec<T>, RemoteError> {
        Self::unavailable()
    }

    async fn insert(&self, _entity: &T) -> Result<T, RemoteError> {
        Self::unavailable()
    }

    async fn update(&self, _id: &str, _patch: &Value) -> Result<(), RemoteError> {
        Self::unavailable()
    }

    async fn delete(&self, _id: &str) -> Result<(), RemoteError> {
        Self::unavailable()
    }
}
