//! `POST /routes/mileage`: distance between two of the caller's locations.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::routes::parse_payload;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct MileageRequest {
    origin_location_id: Uuid,
    destination_location_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MileageResponse {
    pub origin_location_id: Uuid,
    pub destination_location_id: Uuid,
    pub mileage: f64,
}

pub async fn calculate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<MileageResponse>, ApiError> {
    let request: MileageRequest = parse_payload(payload)?;
    let mileage = state
        .mileage
        .get_shipment_mileage(
            user.organization_id,
            request.origin_location_id,
            request.destination_location_id,
        )
        .await?;
    Ok(Json(MileageResponse {
        origin_location_id: request.origin_location_id,
        destination_location_id: request.destination_location_id,
        mileage,
    }))
}
