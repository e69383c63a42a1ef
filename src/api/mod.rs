//! REST API module.
//!
//! Thin handlers over the sync services. Every list response says whether it
//! came from the remote store or the local cache.

mod counters;
mod entities;
mod groups;
mod promotions;
mod reports;

pub use counters::*;
pub use entities::*;
pub use groups::*;
pub use promotions::*;
pub use reports::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::sync::{Source, Synced};

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse {
        success: true,
        data,
        source: None,
    })
}

/// Create a successful API response tagged with its freshness.
pub fn synced<T: Serialize>(result: Synced<T>) -> ApiResult<T> {
    Ok(ApiResponse {
        success: true,
        data: result.data,
        source: Some(result.source),
    })
}
