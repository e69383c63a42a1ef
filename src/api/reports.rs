//! Report endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, synced, ApiResult};
use crate::errors::AppError;
use crate::models::{NewReport, Report, UpdateReportStatusRequest};
use crate::moderation::FlaggedGroup;
use crate::AppState;

/// GET /api/reports
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Vec<Report>> {
    synced(state.reports.get_reports().await?)
}

/// POST /api/reports - File a report against a group.
pub async fn create_report(
    State(state): State<AppState>,
    Json(request): Json<NewReport>,
) -> ApiResult<Report> {
    if request.group_id.trim().is_empty() {
        return Err(AppError::Validation("groupId is required".to_string()));
    }
    if request.reason.trim().is_empty() {
        return Err(AppError::Validation("reason is required".to_string()));
    }

    synced(state.reports.report_group(request).await?)
}

/// PUT /api/reports/{id}/status - Moderation action.
pub async fn update_report_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateReportStatusRequest>,
) -> ApiResult<String> {
    let updated = state
        .reports
        .update_report_status(&id, request.status, request.notes, request.reviewed_by)
        .await?;
    if !updated {
        return Err(AppError::NotFound(format!("Report {} not found", id)));
    }
    success(id)
}

/// DELETE /api/reports/{id}
pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    if !state.reports.delete_report(&id).await? {
        return Err(AppError::NotFound(format!("Report {} not found", id)));
    }
    success(id)
}

/// POST /api/reports/sync - Push locally filed reports to the remote.
pub async fn sync_reports(State(state): State<AppState>) -> ApiResult<usize> {
    success(state.reports.sync_local_reports().await?)
}

/// GET /api/reports/open - Unresolved reports whose group still exists.
pub async fn list_open_reports(State(state): State<AppState>) -> ApiResult<Vec<FlaggedGroup>> {
    success(state.moderation.open_reports(&state.reports).await?)
}
