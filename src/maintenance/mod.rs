//! Local store maintenance.

use chrono::{DateTime, Utc};

use crate::models::timestamp;
use crate::store::{keys, LocalStore, StoreError};

/// Keys that survive a purge.
const PRESERVED_KEYS: [&str; 6] = [
    keys::USER,
    keys::ALL_USERS,
    keys::GROUPS,
    keys::APPROVED_GROUPS_COUNT,
    keys::PENDING_GROUPS_COUNT,
    keys::REJECTED_GROUPS_COUNT,
];

/// Key prefixes that survive a purge.
const PRESERVED_PREFIXES: [&str; 2] = [keys::USER_GROUPS_PREFIX, keys::USER_PROMOTIONS_PREFIX];

pub fn is_preserved(key: &str) -> bool {
    PRESERVED_KEYS.contains(&key) || PRESERVED_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Result of a purge.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeSummary {
    pub preserved: usize,
    pub removed: usize,
    #[serde(with = "timestamp")]
    pub cleared_at: DateTime<Utc>,
}

/// Drop everything except the preserved keys, then stamp `lastCacheCleared`.
///
/// Filtering and the stamp happen in one `retain` call on the store, so a
/// concurrent write to a preserved key is never rolled back.
pub async fn clear_cache(store: &dyn LocalStore) -> Result<PurgeSummary, StoreError> {
    let cleared_at = timestamp::now();
    let stamp = (
        keys::LAST_CACHE_CLEARED.to_string(),
        timestamp::format(&cleared_at),
    );

    // lastCacheCleared is rewritten, not preserved.
    let (preserved, removed) = store.retain(is_preserved, vec![stamp]).await?;
    tracing::info!("Cache cleared: kept {} keys, removed {}", preserved, removed);

    Ok(PurgeSummary {
        preserved,
        removed,
        cleared_at,
    })
}
