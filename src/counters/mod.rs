//! Group moderation counters.
//!
//! Three counters kept as decimal strings in the local store. Every update is a
//! compare-and-set on the stored string, so concurrent writers never lose an
//! increment. `reconcile` in the moderation workflow rewrites them from the
//! underlying lists when they drift.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{keys, LocalStore, StoreError};

const MAX_CAS_ATTEMPTS: usize = 32;

/// Which counter to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Counter {
    Approved,
    Pending,
    Rejected,
}

impl Counter {
    pub const ALL: [Counter; 3] = [Counter::Approved, Counter::Pending, Counter::Rejected];

    pub fn key(&self) -> &'static str {
        match self {
            Counter::Approved => keys::APPROVED_GROUPS_COUNT,
            Counter::Pending => keys::PENDING_GROUPS_COUNT,
            Counter::Rejected => keys::REJECTED_GROUPS_COUNT,
        }
    }
}

/// Current value of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub approved_groups_count: u64,
    pub pending_groups_count: u64,
    pub rejected_groups_count: u64,
}

pub struct CounterLedger {
    local: Arc<dyn LocalStore>,
}

impl CounterLedger {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    /// Set every missing counter to `"0"`. Existing values are left alone.
    pub async fn initialize_if_absent(&self) -> Result<(), StoreError> {
        for counter in Counter::ALL {
            if self.local.compare_and_set(counter.key(), None, "0").await? {
                tracing::debug!("Initialized {}", counter.key());
            }
        }
        Ok(())
    }

    /// Read a counter; absent or unparsable values read as zero.
    pub async fn get(&self, counter: Counter) -> Result<u64, StoreError> {
        Ok(parse_count(self.local.get(counter.key()).await?.as_deref()))
    }

    pub async fn snapshot(&self) -> Result<CounterSnapshot, StoreError> {
        Ok(CounterSnapshot {
            approved_groups_count: self.get(Counter::Approved).await?,
            pending_groups_count: self.get(Counter::Pending).await?,
            rejected_groups_count: self.get(Counter::Rejected).await?,
        })
    }

    pub async fn set(&self, counter: Counter, value: u64) -> Result<(), StoreError> {
        self.local.set(counter.key(), &value.to_string()).await
    }

    pub async fn increment(&self, counter: Counter) -> Result<u64, StoreError> {
        self.update(counter, |n| n.saturating_add(1)).await
    }

    /// Decrement, clamped at zero.
    pub async fn decrement(&self, counter: Counter) -> Result<u64, StoreError> {
        self.update(counter, |n| n.saturating_sub(1)).await
    }

    async fn update(&self, counter: Counter, apply: impl Fn(u64) -> u64) -> Result<u64, StoreError> {
        let key = counter.key();
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.local.get(key).await?;
            let next = apply(parse_count(current.as_deref()));
            if self
                .local
                .compare_and_set(key, current.as_deref(), &next.to_string())
                .await?
            {
                return Ok(next);
            }
            tokio::task::yield_now().await;
        }
        Err(StoreError::Contention(key.to_string()))
    }
}

fn parse_count(raw: Option<&str>) -> u64 {
    match raw {
        None => 0,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed counter value {:?}", raw);
            0
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ledger() -> (Arc<CounterLedger>, Arc<MemoryStore>) {
        let local = Arc::new(MemoryStore::new());
        (Arc::new(CounterLedger::new(local.clone())), local)
    }

    #[tokio::test]
    async fn test_initialize_if_absent() {
        let (ledger, local) = ledger();
        ledger.initialize_if_absent().await.unwrap();

        for key in [
            "approvedGroupsCount",
            "pendingGroupsCount",
            "rejectedGroupsCount",
        ] {
            assert_eq!(local.get(key).await.unwrap().as_deref(), Some("0"));
        }

        local.set("pendingGroupsCount", "7").await.unwrap();
        ledger.initialize_if_absent().await.unwrap();
        assert_eq!(
            local.get("pendingGroupsCount").await.unwrap().as_deref(),
            Some("7")
        );
    }

    #[tokio::test]
    async fn test_decrement_floors_at_zero() {
        let (ledger, local) = ledger();
        local.set("approvedGroupsCount", "0").await.unwrap();

        assert_eq!(ledger.decrement(Counter::Approved).await.unwrap(), 0);
        assert_eq!(
            local.get("approvedGroupsCount").await.unwrap().as_deref(),
            Some("0")
        );
    }

    #[tokio::test]
    async fn test_increment_and_decrement() {
        let (ledger, _local) = ledger();
        ledger.increment(Counter::Pending).await.unwrap();
        ledger.increment(Counter::Pending).await.unwrap();
        assert_eq!(ledger.decrement(Counter::Pending).await.unwrap(), 1);
        assert_eq!(
            ledger.snapshot().await.unwrap(),
            CounterSnapshot {
                approved_groups_count: 0,
                pending_groups_count: 1,
                rejected_groups_count: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_counter_reads_as_zero() {
        let (ledger, local) = ledger();
        local.set("rejectedGroupsCount", "NaN").await.unwrap();
        assert_eq!(ledger.get(Counter::Rejected).await.unwrap(), 0);
        assert_eq!(ledger.increment(Counter::Rejected).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let (ledger, _local) = ledger();
        ledger.initialize_if_absent().await.unwrap();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.increment(Counter::Approved).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.get(Counter::Approved).await.unwrap(), 20);
    }
}
