//! Shipment and additional charge writes go through `ShipmentService`;
//! reads and shipment deletes use the generic viewset handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::Value;
use tms_core::models::Model;
use tms_core::models::shipment::{AdditionalCharge, Shipment};
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
    let shipment = state
        .shipments
        .create(user.organization_id, user.user_id, &payload)
        .await?;
    let body = Serializer::<Shipment>::new()?.to_representation(&shipment)?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn save(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: &Value,
    partial: bool,
) -> Result<Json<Value>, ApiError> {
    let shipment = state
        .shipments
        .update(user.0.organization_id, id, payload, partial)
        .await?;
    Ok(Json(
        Serializer::<Shipment>::new()?.to_representation(&shipment)?,
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

pub async fn create_charge(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let charge = state
        .shipments
        .create_charge(user.organization_id, user.user_id, &payload)
        .await?;
    let body = Serializer::<AdditionalCharge>::new()?.to_representation(&charge)?;
    Ok((StatusCode::CREATED, Json(body)))
}

async fn save_charge(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: &Value,
    partial: bool,
) -> Result<Json<Value>, ApiError> {
    let charge = state
        .shipments
        .update_charge(user.0.organization_id, id, payload, partial)
        .await?;
    Ok(Json(
        Serializer::<AdditionalCharge>::new()?.to_representation(&charge)?,
    ))
}

pub async fn update_charge(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save_charge(&state, &user, id, &payload, false).await
}

pub async fn partial_update_charge(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    save_charge(&state, &user, id, &payload, true).await
}

pub async fn destroy_charge(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .shipments
        .delete_charge(user.organization_id, id)
        .await?;
    info!(table = AdditionalCharge::TABLE, %id, user_id = %user.user_id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
