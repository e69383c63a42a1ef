//! Cache-aside synchronization between the remote store and the local mirror.
//!
//! Every entity type goes through the same [`SyncService`]: remote first, the
//! local mirror is rewritten on success and served on failure.

mod reports;

pub use reports::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::Entity;
use crate::remote::{RemoteError, RemoteStore};
use crate::store::{read_list, read_typed, write_json, LocalStore, StoreError, Stored};

/// Where a result came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Fresh from the remote store.
    Remote,
    /// Served from the local store because the remote failed or is not configured.
    Cached,
}

/// A result tagged with its freshness.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Synced<T> {
    pub source: Source,
    pub data: T,
}

impl<T> Synced<T> {
    pub fn remote(data: T) -> Self {
        Self {
            source: Source::Remote,
            data,
        }
    }

    pub fn cached(data: T) -> Self {
        Self {
            source: Source::Cached,
            data,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.source == Source::Remote
    }
}

/// Why a mutating sync call did not go through.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Local(#[from] StoreError),
}

/// Cache-aside service for one entity type.
pub struct SyncService<T: Entity> {
    remote: Arc<dyn RemoteStore<T>>,
    local: Arc<dyn LocalStore>,
    /// Guards mirror read-modify-write; holds the generation the mirror is at.
    /// Lists and mutations both advance it, so a list that was issued before
    /// either is never written over them.
    mirror: Mutex<u64>,
    list_tickets: AtomicU64,
}

impl<T: Entity> SyncService<T> {
    pub fn new(remote: Arc<dyn RemoteStore<T>>, local: Arc<dyn LocalStore>) -> Self {
        Self {
            remote,
            local,
            mirror: Mutex::new(0),
            list_tickets: AtomicU64::new(0),
        }
    }

    /// The local store this service mirrors into.
    pub fn local(&self) -> &Arc<dyn LocalStore> {
        &self.local
    }

    /// Read the mirror without contacting the remote.
    pub async fn cached(&self) -> Result<Vec<T>, StoreError> {
        read_typed(self.local.as_ref(), T::MIRROR_KEY).await
    }

    /// The mirror including entries that no longer decode as `T`.
    async fn entries(&self) -> Result<Vec<Stored<T>>, StoreError> {
        read_list(self.local.as_ref(), T::MIRROR_KEY).await
    }

    /// Record a local mutation; list responses issued before it are stale.
    fn advance(&self, generation: &mut u64) {
        *generation = self.list_tickets.fetch_add(1, Ordering::SeqCst) + 1;
    }

    /// List from the remote, replacing the mirror; fall back to the mirror on failure.
    ///
    /// A response that arrives after a newer list response or a local mutation was
    /// already applied is returned to its caller but not written.
    pub async fn list(&self) -> Result<Synced<Vec<T>>, StoreError> {
        let ticket = self.list_tickets.fetch_add(1, Ordering::SeqCst) + 1;

        match self.remote.list().await {
            Ok(items) => {
                let mut last_written = self.mirror.lock().await;
                if ticket > *last_written {
                    write_json(self.local.as_ref(), T::MIRROR_KEY, &items).await?;
                    *last_written = ticket;
                } else {
                    tracing::debug!(
                        "Discarding stale {} list response (ticket {}, mirror at {})",
                        T::TABLE,
                        ticket,
                        *last_written
                    );
                }
                Ok(Synced::remote(items))
            }
            Err(e) => {
                tracing::warn!("Listing {} failed, serving cached mirror: {}", T::TABLE, e);
                let _guard = self.mirror.lock().await;
                Ok(Synced::cached(self.cached().await?))
            }
        }
    }

    /// Create remotely and prepend the stored record to the mirror.
    pub async fn try_create(&self, mut entity: T) -> Result<T, SyncError> {
        entity.ensure_id();

        let created = self.remote.insert(&entity).await?;

        let mut generation = self.mirror.lock().await;
        let mut items = self.entries().await?;
        items.insert(0, Stored::Typed(created.clone()));
        write_json(self.local.as_ref(), T::MIRROR_KEY, &items).await?;
        self.advance(&mut generation);

        tracing::info!("Created {} {}", T::KIND, created.id());
        Ok(created)
    }

    /// Like [`try_create`](Self::try_create) but collapses remote failures to `None`.
    /// Nothing is created locally when the remote fails.
    pub async fn create(&self, entity: T) -> Result<Option<T>, StoreError> {
        match self.try_create(entity).await {
            Ok(created) => Ok(Some(created)),
            Err(SyncError::Remote(e)) => {
                tracing::warn!("Creating {} failed: {}", T::KIND, e);
                Ok(None)
            }
            Err(SyncError::Local(e)) => Err(e),
        }
    }

    /// Update remotely, then replace the mirror entry in place (or append it).
    pub async fn try_update(&self, entity: T) -> Result<(), SyncError> {
        if !entity.has_id() {
            return Err(SyncError::Remote(RemoteError::Rejected {
                status: 400,
                body: format!("{} without id", T::KIND),
            }));
        }

        let patch = serde_json::to_value(&entity).map_err(StoreError::from)?;
        self.remote.update(entity.id(), &patch).await?;

        let mut generation = self.mirror.lock().await;
        let mut items = self.entries().await?;
        match items.iter_mut().find(|item| item.id() == Some(entity.id())) {
            Some(slot) => *slot = Stored::Typed(entity),
            None => items.push(Stored::Typed(entity)),
        }
        write_json(self.local.as_ref(), T::MIRROR_KEY, &items).await?;
        self.advance(&mut generation);
        Ok(())
    }

    pub async fn update(&self, entity: T) -> Result<bool, StoreError> {
        let id = entity.id().to_string();
        match self.try_update(entity).await {
            Ok(()) => Ok(true),
            Err(SyncError::Remote(e)) => {
                tracing::warn!("Updating {} {} failed: {}", T::KIND, id, e);
                Ok(false)
            }
            Err(SyncError::Local(e)) => Err(e),
        }
    }

    /// Delete remotely, then drop the id from the mirror.
    pub async fn try_delete(&self, id: &str) -> Result<(), SyncError> {
        self.remote.delete(id).await?;

        let mut generation = self.mirror.lock().await;
        let mut items = self.entries().await?;
        items.retain(|item| item.id() != Some(id));
        write_json(self.local.as_ref(), T::MIRROR_KEY, &items).await?;
        self.advance(&mut generation);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        match self.try_delete(id).await {
            Ok(()) => Ok(true),
            Err(SyncError::Remote(e)) => {
                tracing::warn!("Deleting {} {} failed: {}", T::KIND, id, e);
                Ok(false)
            }
            Err(SyncError::Local(e)) => Err(e),
        }
    }
}
