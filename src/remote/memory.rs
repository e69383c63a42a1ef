//! Scriptable in-memory remote for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{RemoteError, RemoteStore};
use crate::models::Entity;

/// In-memory remote table with a failure switch.
pub struct MemoryRemote<T> {
    records: Mutex<Vec<T>>,
    available: AtomicBool,
    call_count: AtomicU32,
    list_delays: Mutex<VecDeque<Duration>>,
}

impl<T: Entity> MemoryRemote<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
            available: AtomicBool::new(true),
            call_count: AtomicU32::new(0),
            list_delays: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_records(&self, records: Vec<T>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn records(&self) -> Vec<T> {
        self.records.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Delay the next `list` response; the snapshot is still taken at call time.
    pub fn push_list_delay(&self, delay: Duration) {
        self.list_delays.lock().unwrap().push_back(delay);
    }

    fn begin(&self) -> Result<(), RemoteError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl<T: Entity> RemoteStore<T> for MemoryRemote<T> {
    async fn list(&self) -> Result<Vec<T>, RemoteError> {
        self.begin()?;
        let snapshot = self.records();
        let delay = self.list_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn insert(&self, entity: &T) -> Result<T, RemoteError> {
        self.begin()?;
        self.records.lock().unwrap().push(entity.clone());
        Ok(entity.clone())
    }

    async fn update(&self, id: &str, patch: &Value) -> Result<(), RemoteError> {
        self.begin()?;
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.iter_mut().find(|r| r.id() == id) else {
            return Err(RemoteError::Rejected {
                status: 404,
                body: format!("{} not found", id),
            });
        };

        let mut merged =
            serde_json::to_value(&*record).map_err(|e| RemoteError::Malformed(e.to_string()))?;
        if let (Value::Object(target), Value::Object(fields)) = (&mut merged, patch) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        *record =
            serde_json::from_value(merged).map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.begin()?;
        self.records.lock().unwrap().retain(|r| r.id() != id);
        Ok(())
    }
}
