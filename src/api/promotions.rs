//! Promotion endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{timestamp, Promotion, PromotionStats, PromotionStatus};
use crate::AppState;

/// Request body for promoting a group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoteGroupRequest {
    pub group_id: String,
    pub user_id: String,
    #[serde(default, with = "timestamp::option")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotedStatus {
    pub group_id: String,
    pub promoted: bool,
}

/// POST /api/promotions
pub async fn promote_group(
    State(state): State<AppState>,
    Json(request): Json<PromoteGroupRequest>,
) -> ApiResult<Promotion> {
    let start_date = request.start_date.unwrap_or_else(timestamp::now);
    if request.end_date <= start_date {
        return Err(AppError::Validation(
            "endDate must be after startDate".to_string(),
        ));
    }
    if request.amount < 0.0 {
        return Err(AppError::Validation("amount must not be negative".to_string()));
    }

    let promotion = Promotion {
        group_id: request.group_id,
        user_id: request.user_id,
        start_date,
        end_date: request.end_date,
        amount: request.amount,
        status: PromotionStatus::Active,
    };
    state.promotions.promote_group(promotion.clone()).await?;
    success(promotion)
}

/// GET /api/groups/{id}/promoted
pub async fn get_promoted_status(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> ApiResult<PromotedStatus> {
    let promoted = state.promotions.is_group_promoted(&group_id).await?;
    success(PromotedStatus { group_id, promoted })
}

/// GET /api/promotions - Ids of groups with a live promotion.
pub async fn list_promoted_groups(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    success(state.promotions.promoted_group_ids().await?)
}

/// POST /api/promotions/sweep - Expire elapsed promotions now.
pub async fn sweep_promotions(State(state): State<AppState>) -> ApiResult<usize> {
    success(state.promotions.check_expired_promotions().await?)
}

/// GET /api/users/{user_id}/promotions - Live promotions of a user.
pub async fn list_user_promotions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<Promotion>> {
    state.promotions.check_expired_promotions().await?;
    success(state.promotions.get_active_promotions(&user_id).await?)
}

/// GET /api/users/{user_id}/promotion-stats
pub async fn get_user_promotion_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<PromotionStats> {
    success(state.promotions.get_promotion_stats(&user_id).await?)
}
