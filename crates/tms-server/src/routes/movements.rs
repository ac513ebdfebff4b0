//! Movement and stop writes go through `MovementService`; reads and
//! movement deletes use the generic viewset handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::Value;
use tms_core::models::Model;
use tms_core::models::movement::{Movement, Stop};
use tms_core::serializer::Serializer;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::state::AppState;

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let movement = state
        .movements
        .create(user.organization_id, &payload)
        .await?;
    let body = Serializer::<Movement>::new()?.to_representation(&movement)?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn save(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: &Value,
    partial: bool,
) -> Result<Json<Value>, ApiError> {
    let movement = state
        .movements
        .update(user.0.organization_id, id, payload, partial)
        .await?;
    Ok(Json(
        Serializer::<Movement>::new()?.to_representation(&movement)?,
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save(&state, &user, id, &payload, false).await
}

pub async fn partial_update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save(&state, &user, id, &payload, true).await
}

pub async fn create_stop(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let stop = state
        .movements
        .create_stop(user.organization_id, &payload)
        .await?;
    let body = Serializer::<Stop>::new()?.to_representation(&stop)?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn save_stop(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: &Value,
    partial: bool,
) -> Result<Json<Value>, ApiError> {
    let stop = state
        .movements
        .update_stop(user.0.organization_id, id, payload, partial)
        .await?;
    Ok(Json(Serializer::<Stop>::new()?.to_representation(&stop)?))
}

pub async fn update_stop(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save_stop(&state, &user, id, &payload, false).await
}

pub async fn partial_update_stop(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save_stop(&state, &user, id, &payload, true).await
}

pub async fn destroy_stop(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .movements
        .delete_stop(user.organization_id, id)
        .await?;
    info!(table = Stop::TABLE, %id, user_id = %user.user_id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
