//! Local durable store.
//!
//! A capacity-bounded string key/value store shared by every service. Services
//! receive it as an `Arc<dyn LocalStore>` so tests can swap in [`MemoryStore`].

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage keys shared with the web client.
pub mod keys {
    pub const USER: &str = "user";
    pub const ALL_USERS: &str = "allUsers";
    pub const GROUPS: &str = "groups";
    pub const PUBLIC_GROUPS: &str = "publicGroups";
    pub const APPROVED_GROUPS_COUNT: &str = "approvedGroupsCount";
    pub const PENDING_GROUPS_COUNT: &str = "pendingGroupsCount";
    pub const REJECTED_GROUPS_COUNT: &str = "rejectedGroupsCount";
    pub const GROUP_PROMOTIONS: &str = "groupPromotions";
    pub const GROUP_REPORTS: &str = "groupReports";
    pub const UNSYNCED_REPORTS: &str = "unsyncedReports";
    pub const LAST_CACHE_CLEARED: &str = "lastCacheCleared";
    pub const USER_GROUPS_PREFIX: &str = "userGroups_";
    pub const USER_PROMOTIONS_PREFIX: &str = "userPromotions_";

    pub fn user_groups(user_id: &str) -> String {
        format!("{}{}", USER_GROUPS_PREFIX, user_id)
    }

    pub fn user_promotions(user_id: &str) -> String {
        format!("{}{}", USER_PROMOTIONS_PREFIX, user_id)
    }
}

/// Errors raised by the local store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The write would push the store past its quota.
    #[error("local storage full: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: u64, quota: u64 },

    /// Compare-and-set kept losing to concurrent writers.
    #[error("too much contention on key {0}")]
    Contention(String),

    /// Underlying storage failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Local store error: {:?}", err);
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("JSON encode error: {}", err))
    }
}

/// Key/value contract of the local durable store.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    /// All keys, in insertion order.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;

    /// Write `value` only if the current value equals `expected` (`None` = key absent).
    /// Returns whether the write happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError>;

    /// Atomically drop every key `keep` rejects, then write `extra`.
    /// Returns `(kept, removed)` key counts.
    async fn retain(
        &self,
        keep: for<'k> fn(&'k str) -> bool,
        extra: Vec<(String, String)>,
    ) -> Result<(usize, usize), StoreError>;
}

/// One element of a stored JSON list.
///
/// Elements that do not decode as `T` are kept as raw JSON so a rewrite of the
/// list carries them through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stored<T> {
    Typed(T),
    Raw(Value),
}

impl<T> Stored<T> {
    pub fn typed(&self) -> Option<&T> {
        match self {
            Stored::Typed(item) => Some(item),
            Stored::Raw(_) => None,
        }
    }

    pub fn typed_mut(&mut self) -> Option<&mut T> {
        match self {
            Stored::Typed(item) => Some(item),
            Stored::Raw(_) => None,
        }
    }
}

/// Read a JSON list element by element.
pub async fn read_list<T>(store: &dyn LocalStore, key: &str) -> Result<Vec<Stored<T>>, StoreError>
where
    T: DeserializeOwned,
{
    let items: Vec<Stored<T>> = read_json(store, key).await?;
    let raw = items.iter().filter(|item| item.typed().is_none()).count();
    if raw > 0 {
        tracing::warn!("{} entries under {} do not match the expected shape", raw, key);
    }
    Ok(items)
}

/// The decodable elements of a stored list.
pub async fn read_typed<T>(store: &dyn LocalStore, key: &str) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
{
    Ok(read_list(store, key)
        .await?
        .into_iter()
        .filter_map(|item| match item {
            Stored::Typed(item) => Some(item),
            Stored::Raw(_) => None,
        })
        .collect())
}

/// Read a JSON value, treating an absent or corrupted key as `T::default()`.
pub async fn read_json<T>(store: &dyn LocalStore, key: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(T::default());
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!("Ignoring malformed local value under {}: {}", key, e);
            Ok(T::default())
        }
    }
}

/// Serialize and store a JSON value.
pub async fn write_json<T>(store: &dyn LocalStore, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}

/// Keys starting with `prefix`.
pub async fn keys_with_prefix(
    store: &dyn LocalStore,
    prefix: &str,
) -> Result<Vec<String>, StoreError> {
    Ok(store
        .keys()
        .await?
        .into_iter()
        .filter(|k| k.starts_with(prefix))
        .collect())
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_json_defaults() {
        let store = MemoryStore::new();
        let missing: Vec<String> = read_json(&store, "nothing").await.unwrap();
        assert!(missing.is_empty());

        store.set("broken", "{not json").await.unwrap();
        let broken: Vec<String> = read_json(&store, "broken").await.unwrap();
        assert!(broken.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read_json() {
        let store = MemoryStore::new();
        write_json(&store, "list", &json!([1, 2, 3])).await.unwrap();
        assert_eq!(store.get("list").await.unwrap().unwrap(), "[1,2,3]");
        let back: Vec<u32> = read_json(&store, "list").await.unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_list_keeps_off_shape_entries() {
        let store = MemoryStore::new();
        store
            .set("list", r#"[1,"two",3]"#)
            .await
            .unwrap();

        let items: Vec<Stored<u32>> = read_list(&store, "list").await.unwrap();
        assert_eq!(
            items,
            vec![Stored::Typed(1), Stored::Raw(json!("two")), Stored::Typed(3)]
        );
        assert_eq!(read_typed::<u32>(&store, "list").await.unwrap(), vec![1, 3]);

        write_json(&store, "list", &items).await.unwrap();
        assert_eq!(store.get("list").await.unwrap().unwrap(), r#"[1,"two",3]"#);
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let store = MemoryStore::new();
        store.set(&keys::user_groups("u1"), "[]").await.unwrap();
        store.set(&keys::user_groups("u2"), "[]").await.unwrap();
        store.set(&keys::user_promotions("u1"), "[]").await.unwrap();

        let found = keys_with_prefix(&store, keys::USER_GROUPS_PREFIX)
            .await
            .unwrap();
        assert_eq!(found, vec!["userGroups_u1", "userGroups_u2"]);
    }
}
