//! Generic endpoints for categories, pages and posts.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, synced, ApiResult};
use crate::errors::AppError;
use crate::models::{Category, Entity, Page, Post};
use crate::sync::SyncService;
use crate::AppState;

/// Entity types served by the generic handlers.
pub trait EntityRoutes: Entity {
    fn service(state: &AppState) -> &SyncService<Self>;
}

impl EntityRoutes for Category {
    fn service(state: &AppState) -> &SyncService<Self> {
        &state.categories
    }
}

impl EntityRoutes for Page {
    fn service(state: &AppState) -> &SyncService<Self> {
        &state.pages
    }
}

impl EntityRoutes for Post {
    fn service(state: &AppState) -> &SyncService<Self> {
        &state.posts
    }
}

/// GET /api/{kind} - List records, falling back to the cache.
pub async fn list_entities<T: EntityRoutes>(State(state): State<AppState>) -> ApiResult<Vec<T>> {
    synced(T::service(&state).list().await?)
}

/// POST /api/{kind} - Create a record remotely.
pub async fn create_entity<T: EntityRoutes>(
    State(state): State<AppState>,
    Json(entity): Json<T>,
) -> ApiResult<T> {
    match T::service(&state).create(entity).await? {
        Some(created) => success(created),
        None => Err(AppError::SyncFailed(format!("Could not save {}", T::KIND))),
    }
}

/// PUT /api/{kind}/{id} - Update a record.
pub async fn update_entity<T: EntityRoutes>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut entity): Json<T>,
) -> ApiResult<T> {
    entity.set_id(id);
    if !T::service(&state).update(entity.clone()).await? {
        return Err(AppError::SyncFailed(format!(
            "Could not update {} {}",
            T::KIND,
            entity.id()
        )));
    }
    success(entity)
}

/// DELETE /api/{kind}/{id} - Delete a record.
pub async fn delete_entity<T: EntityRoutes>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    if !T::service(&state).delete(&id).await? {
        return Err(AppError::SyncFailed(format!(
            "Could not delete {} {}",
            T::KIND,
            id
        )));
    }
    success(id)
}
