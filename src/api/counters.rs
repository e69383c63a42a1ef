//! Counter, status and maintenance endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::counters::CounterSnapshot;
use crate::maintenance::{self, PurgeSummary};
use crate::store::keys;
use crate::AppState;

/// Service status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub remote_configured: bool,
    pub reports_remote: bool,
    pub cached_keys: usize,
    pub unsynced_reports: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cache_cleared: Option<String>,
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> ApiResult<ServiceStatus> {
    success(ServiceStatus {
        remote_configured: state.config.remote_url.is_some(),
        reports_remote: state.reports.has_remote(),
        cached_keys: state.local.len().await?,
        unsynced_reports: state.reports.unsynced_ids().await?.len(),
        last_cache_cleared: state.local.get(keys::LAST_CACHE_CLEARED).await?,
    })
}

/// GET /api/counters
pub async fn get_counters(State(state): State<AppState>) -> ApiResult<CounterSnapshot> {
    success(state.counters.snapshot().await?)
}

/// POST /api/counters/reconcile - Recompute counters from the cached lists.
pub async fn reconcile_counters(State(state): State<AppState>) -> ApiResult<CounterSnapshot> {
    success(state.moderation.reconcile_counters().await?)
}

/// POST /api/maintenance/clear-cache
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<PurgeSummary> {
    success(maintenance::clear_cache(state.local.as_ref()).await?)
}
