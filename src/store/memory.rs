//! In-process store, used for tests and for `DIRSYNC_LOCAL_BACKEND=memory`.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{entry_size, LocalStore, StoreError};

/// Insertion-ordered in-memory key/value store with an optional quota.
pub struct MemoryStore {
    entries: Mutex<Vec<(String, String)>>,
    quota_bytes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quota(u64::MAX)
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            quota_bytes,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_quota(
        &self,
        entries: &[(String, String)],
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let others: u64 = entries
            .iter()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| entry_size(k, v))
            .sum();
        let needed = others + entry_size(key, value);
        if needed > self.quota_bytes {
            return Err(StoreError::QuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }
        Ok(())
    }

    fn put(entries: &mut Vec<(String, String)>, key: &str, value: &str) {
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock();
        self.check_quota(&entries, key, value)?;
        Self::put(&mut entries, key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().retain(|(k, _)| k != key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.lock().clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().iter().map(|(k, _)| k.clone()).collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock().len())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError> {
        let mut entries = self.lock();
        let current = entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str());
        if current != expected {
            return Ok(false);
        }
        self.check_quota(&entries, key, value)?;
        Self::put(&mut entries, key, value);
        Ok(true)
    }

    async fn retain(
        &self,
        keep: for<'k> fn(&'k str) -> bool,
        extra: Vec<(String, String)>,
    ) -> Result<(usize, usize), StoreError> {
        let mut entries = self.lock();
        let mut next: Vec<(String, String)> =
            entries.iter().filter(|(k, _)| keep(k)).cloned().collect();
        let kept = next.len();
        let removed = entries.len() - kept;

        for (key, value) in &extra {
            self.check_quota(&next, key, value)?;
            Self::put(&mut next, key, value);
        }
        *entries = next;
        Ok((kept, removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.set("a", "3").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.len().await.unwrap(), 2);

        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.clear().await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_quota_rejects_and_keeps_state() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").await.unwrap();

        let err = store.set("other", "123456").await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert_eq!(store.get("other").await.unwrap(), None);

        // Overwriting an existing key only counts the new value.
        store.set("k", "123456789").await.unwrap();
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let store = MemoryStore::new();
        assert!(store.compare_and_set("c", None, "0").await.unwrap());
        assert!(!store.compare_and_set("c", None, "5").await.unwrap());
        assert!(!store.compare_and_set("c", Some("1"), "2").await.unwrap());
        assert!(store.compare_and_set("c", Some("0"), "1").await.unwrap());
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_retain() {
        let store = MemoryStore::new();
        store.set("old", "x").await.unwrap();
        store.set("kept", "z").await.unwrap();

        let counts = store
            .retain(|key| key == "kept", vec![("new".to_string(), "y".to_string())])
            .await
            .unwrap();

        assert_eq!(counts, (1, 1));
        assert_eq!(store.keys().await.unwrap(), vec!["kept", "new"]);
    }
}
