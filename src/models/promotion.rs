//! Time-bound group promotions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Persisted promotion state. Only the expiry sweep moves a record to `Expired`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromotionStatus {
    Active,
    Expired,
}

/// A group promoted by a user until `end_date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub group_id: String,
    pub user_id: String,
    #[serde(with = "timestamp")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub amount: f64,
    pub status: PromotionStatus,
}

impl Promotion {
    /// Real-time activity check; does not depend on the sweep having run.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PromotionStatus::Active && self.end_date > now
    }

    /// Whether the sweep should move this record to `Expired`.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == PromotionStatus::Active && self.end_date <= now
    }
}

/// Per-user promotion summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromotionStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub total_spent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn promotion(end: DateTime<Utc>, status: PromotionStatus) -> Promotion {
        Promotion {
            group_id: "g1".to_string(),
            user_id: "u1".to_string(),
            start_date: end - Duration::days(7),
            end_date: end,
            amount: 5.0,
            status,
        }
    }

    #[test]
    fn test_activity_boundary() {
        let now = Utc::now();
        assert!(promotion(now + Duration::seconds(1), PromotionStatus::Active).is_active_at(now));
        assert!(!promotion(now, PromotionStatus::Active).is_active_at(now));
        assert!(promotion(now, PromotionStatus::Active).is_due_for_expiry(now));
        assert!(!promotion(now, PromotionStatus::Expired).is_due_for_expiry(now));
    }

    #[test]
    fn test_wire_shape() {
        let raw = json!({
            "groupId": "g1",
            "userId": "u1",
            "startDate": "2024-05-01T00:00:00.000Z",
            "endDate": "2024-05-08T00:00:00.000Z",
            "amount": 9.99,
            "status": "active"
        });
        let promo: Promotion = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(promo.status, PromotionStatus::Active);
        assert_eq!(serde_json::to_value(&promo).unwrap(), raw);
    }
}
