//! Group endpoints, routed through the moderation workflow.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, synced, ApiResult};
use crate::errors::AppError;
use crate::models::{Group, GroupDraft};
use crate::moderation::Decision;
use crate::AppState;

fn decided(decision: Decision, id: &str) -> ApiResult<Group> {
    match decision {
        Decision::Applied(group) => success(group),
        Decision::NotFound => Err(AppError::NotFound(format!("Group {} not found", id))),
        Decision::RemoteFailed => Err(AppError::SyncFailed(format!(
            "Could not update group {}",
            id
        ))),
    }
}

/// GET /api/groups - List all groups.
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Vec<Group>> {
    synced(state.moderation.list_groups().await?)
}

/// GET /api/public-groups - Approved and legacy groups.
pub async fn list_public_groups(State(state): State<AppState>) -> ApiResult<Vec<Group>> {
    success(state.moderation.public_groups().await?)
}

/// POST /api/groups - Add a group directly.
pub async fn create_group(
    State(state): State<AppState>,
    Json(group): Json<Group>,
) -> ApiResult<Group> {
    if group.name.trim().is_empty() {
        return Err(AppError::Validation("Group name is required".to_string()));
    }

    match state.moderation.add_group(group).await? {
        Some(created) => success(created),
        None => Err(AppError::SyncFailed("Could not save group".to_string())),
    }
}

/// POST /api/users/{user_id}/groups - Submit a group for review.
pub async fn submit_group(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(group): Json<Group>,
) -> ApiResult<Group> {
    if group.name.trim().is_empty() {
        return Err(AppError::Validation("Group name is required".to_string()));
    }

    match state.moderation.submit_group(&user_id, group).await? {
        Some(created) => success(created),
        None => Err(AppError::SyncFailed("Could not save group".to_string())),
    }
}

/// GET /api/users/{user_id}/groups - A user's submissions and their status.
pub async fn list_user_drafts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<GroupDraft>> {
    success(state.moderation.drafts(&user_id).await?)
}

/// PUT /api/groups/{id} - Update a group.
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut group): Json<Group>,
) -> ApiResult<Group> {
    group.id = id;
    if !state.moderation.update_group(group.clone()).await? {
        return Err(AppError::SyncFailed(format!(
            "Could not update group {}",
            group.id
        )));
    }
    success(group)
}

/// DELETE /api/groups/{id} - Delete a group.
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Group> {
    decided(state.moderation.remove_group(&id).await?, &id)
}

/// POST /api/groups/{id}/approve
pub async fn approve_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Group> {
    decided(state.moderation.approve_group(&id).await?, &id)
}

/// POST /api/groups/{id}/reject
pub async fn reject_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Group> {
    decided(state.moderation.reject_group(&id).await?, &id)
}
