//! Billing transfer actions and billing history deletes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tms_core::models::Model;
use tms_core::models::billing::BillingHistory;
use tms_dispatch::{BillSummary, TransferSummary};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::routes::parse_payload;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TransferRequest {
    pro_numbers: Vec<String>,
}

/// Billing queue rows an action applies to.
#[derive(Debug, Deserialize)]
struct QueueRequest {
    ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UntransferResponse {
    pub untransferred: Vec<String>,
}

/// `POST /billing/transfer`
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<TransferSummary>, ApiError> {
    let request: TransferRequest = parse_payload(payload)?;
    let summary = state
        .billing
        .transfer_to_billing(user.organization_id, user.user_id, &request.pro_numbers)
        .await?;
    Ok(Json(summary))
}

/// `POST /billing/untransfer`
pub async fn untransfer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<UntransferResponse>, ApiError> {
    let request: QueueRequest = parse_payload(payload)?;
    let untransferred = state
        .billing
        .untransfer(user.organization_id, &request.ids)
        .await?;
    Ok(Json(UntransferResponse { untransferred }))
}

/// `POST /billing/bill`
pub async fn bill(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<BillSummary>, ApiError> {
    let request: QueueRequest = parse_payload(payload)?;
    let summary = state
        .billing
        .bill(user.organization_id, user.user_id, &request.ids)
        .await?;
    Ok(Json(summary))
}

pub async fn destroy_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .billing
        .delete_history(user.organization_id, id)
        .await?;
    info!(table = BillingHistory::TABLE, %id, user_id = %user.user_id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
