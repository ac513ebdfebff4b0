//! The caller's organization.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use tms_core::models::organization::{Organization, UpdateOrganization};
use tms_core::repository::OrganizationRepository;
use tracing::info;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::routes::parse_payload;
use crate::state::AppState;

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Organization>, ApiError> {
    let organization = state
        .organizations()
        .get_by_id(user.organization_id)
        .await?;
    Ok(Json(organization))
}

/// Update the caller's organization; staff only. Omitted fields keep their
/// stored values.
pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Organization>, ApiError> {
    user.require_staff()?;
    let input: UpdateOrganization = parse_payload(payload)?;
    input.validate()?;
    let organization = state
        .organizations()
        .update(user.0.organization_id, input)
        .await?;
    info!(organization_id = %organization.id, user_id = %user.0.user_id, "Organization updated");
    Ok(Json(organization))
}
