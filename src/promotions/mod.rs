//! Promotion lifecycle tracking.
//!
//! Whether a promotion is live is always decided against the clock at read time.
//! The expiry sweep only rewrites the persisted `status` field so bulk readers of
//! the raw lists see consistent data; it runs on demand and on a timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::models::{Promotion, PromotionStats, PromotionStatus};
use crate::store::{
    keys, keys_with_prefix, read_list, read_typed, write_json, LocalStore, StoreError, Stored,
};

pub struct PromotionTracker {
    local: Arc<dyn LocalStore>,
    lock: Mutex<()>,
}

impl PromotionTracker {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self {
            local,
            lock: Mutex::new(()),
        }
    }

    /// Record a promotion in the global list and the user's own list.
    pub async fn promote_group(&self, promotion: Promotion) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;

        let mut all: Vec<Stored<Promotion>> =
            read_list(self.local.as_ref(), keys::GROUP_PROMOTIONS).await?;
        all.push(Stored::Typed(promotion.clone()));
        write_json(self.local.as_ref(), keys::GROUP_PROMOTIONS, &all).await?;

        let user_key = keys::user_promotions(&promotion.user_id);
        let mut mine: Vec<Stored<Promotion>> = read_list(self.local.as_ref(), &user_key).await?;
        tracing::info!(
            "Group {} promoted by {} until {}",
            promotion.group_id,
            promotion.user_id,
            promotion.end_date
        );
        mine.push(Stored::Typed(promotion));
        write_json(self.local.as_ref(), &user_key, &mine).await?;
        Ok(true)
    }

    pub async fn is_group_promoted(&self, group_id: &str) -> Result<bool, StoreError> {
        self.is_group_promoted_at(group_id, Utc::now()).await
    }

    pub async fn is_group_promoted_at(
        &self,
        group_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .all_promotions()
            .await?
            .iter()
            .any(|p| p.group_id == group_id && p.is_active_at(now)))
    }

    pub async fn promoted_group_ids(&self) -> Result<Vec<String>, StoreError> {
        self.promoted_group_ids_at(Utc::now()).await
    }

    /// Ids of every group with a live promotion.
    pub async fn promoted_group_ids_at(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .all_promotions()
            .await?
            .into_iter()
            .filter(|p| p.is_active_at(now))
            .map(|p| p.group_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    pub async fn get_active_promotions(&self, user_id: &str) -> Result<Vec<Promotion>, StoreError> {
        self.get_active_promotions_at(user_id, Utc::now()).await
    }

    pub async fn get_active_promotions_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Promotion>, StoreError> {
        Ok(self
            .all_promotions()
            .await?
            .into_iter()
            .filter(|p| p.user_id == user_id && p.is_active_at(now))
            .collect())
    }

    pub async fn get_promotion_stats(&self, user_id: &str) -> Result<PromotionStats, StoreError> {
        self.get_promotion_stats_at(user_id, Utc::now()).await
    }

    pub async fn get_promotion_stats_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PromotionStats, StoreError> {
        let mut stats = PromotionStats::default();
        for promotion in self
            .all_promotions()
            .await?
            .iter()
            .filter(|p| p.user_id == user_id)
        {
            stats.total += 1;
            stats.total_spent += promotion.amount;
            if promotion.is_active_at(now) {
                stats.active += 1;
            } else {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }

    pub async fn check_expired_promotions(&self) -> Result<usize, StoreError> {
        self.check_expired_promotions_at(Utc::now()).await
    }

    /// Mark every active promotion with `end_date <= now` as expired, in the global
    /// list and every per-user list. Returns how many records changed.
    pub async fn check_expired_promotions_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;

        let changed = self.expire_list(keys::GROUP_PROMOTIONS, now).await?;
        for key in keys_with_prefix(self.local.as_ref(), keys::USER_PROMOTIONS_PREFIX).await? {
            // Per-user copies mirror the global list; count each promotion once.
            self.expire_list(&key, now).await?;
        }

        if changed > 0 {
            tracing::info!("Expired {} promotions", changed);
        }
        Ok(changed)
    }

    async fn expire_list(&self, key: &str, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut promotions: Vec<Stored<Promotion>> = read_list(self.local.as_ref(), key).await?;
        let mut changed = 0;
        for promotion in promotions
            .iter_mut()
            .filter_map(Stored::typed_mut)
            .filter(|p| p.is_due_for_expiry(now))
        {
            promotion.status = PromotionStatus::Expired;
            changed += 1;
        }
        if changed > 0 {
            write_json(self.local.as_ref(), key, &promotions).await?;
        }
        Ok(changed)
    }

    async fn all_promotions(&self) -> Result<Vec<Promotion>, StoreError> {
        read_typed(self.local.as_ref(), keys::GROUP_PROMOTIONS).await
    }
}

/// Run the expiry sweep every `interval` until the runtime shuts down.
pub fn spawn_expiry_sweeper(tracker: Arc<PromotionTracker>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            if let Err(e) = tracker.check_expired_promotions().await {
                tracing::warn!("Promotion sweep error: {}", e);
            }
        }
    })
}
