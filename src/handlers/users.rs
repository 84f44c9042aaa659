// handlers/users.rs - /api/users handlers, all tenant-scoped

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// GET /api/users
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let users = state.users.find_all().await?;
    Ok(ApiResponse::success(users))
}

/// GET /api/users/count
pub async fn count(State(state): State<AppState>) -> ApiResult<Value> {
    let count = state.users.count().await?;
    Ok(ApiResponse::success(json!({ "count": count })))
}

/// GET /api/users/:id - a user owned by another tenant is reported as missing
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<User> {
    state
        .users
        .find_by_id(&id)
        .await?
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found(format!("user {} not found", id)))
}

/// POST /api/users - update when the payload carries a stored id, otherwise
/// create under a store-assigned id
pub async fn save(State(state): State<AppState>, Json(user): Json<User>) -> ApiResult<User> {
    user.validate().map_err(ApiError::bad_request)?;
    let requested = user.meta.id().copied();
    let saved = state.users.save(user).await?;
    if saved.meta.id().copied() != requested {
        Ok(ApiResponse::created(saved))
    } else {
        Ok(ApiResponse::success(saved))
    }
}

/// DELETE /api/users/:id - deleting a foreign or unknown id is a no-op
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.users.delete_by_id(&id).await?;
    Ok(ApiResponse::no_content())
}
