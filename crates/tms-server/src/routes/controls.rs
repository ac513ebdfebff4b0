//! `GET|PUT /controls/{kind}`: per-organization settings.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde_json::Value;
use tms_core::error::TmsError;
use tms_core::models::Control;
use tms_core::models::controls::{
    AccountingControl, BillingControl, DispatchControl, RouteControl, ShipmentControl,
};
use tms_core::repository::ControlRepository;
use tms_core::serializer::validate_references;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::routes::parse_payload;
use crate::state::AppState;

/// Run `$action::<Type>` for the control named by `$kind`.
macro_rules! with_control {
    ($kind:expr, $action:ident($($arg:expr),*)) => {{
        let kind: &str = $kind;
        if kind == AccountingControl::KIND {
            $action::<AccountingControl>($($arg),*).await
        } else if kind == BillingControl::KIND {
            $action::<BillingControl>($($arg),*).await
        } else if kind == DispatchControl::KIND {
            $action::<DispatchControl>($($arg),*).await
        } else if kind == RouteControl::KIND {
            $action::<RouteControl>($($arg),*).await
        } else if kind == ShipmentControl::KIND {
            $action::<ShipmentControl>($($arg),*).await
        } else {
            Err(ApiError::not_found("control", kind))
        }
    }};
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ApiError> {
    with_control!(&kind, read(&state, user.organization_id))
}

/// Overwrite the fields present in the payload; staff only.
pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(kind): Path<String>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, ApiError> {
    user.require_staff()?;
    let organization_id = user.0.organization_id;
    let result = with_control!(&kind, write(&state, organization_id, payload));
    if result.is_ok() {
        if kind == RouteControl::KIND {
            state.mileage.invalidate_cache();
        }
        info!(%organization_id, kind = %kind, user_id = %user.0.user_id, "Control updated");
    }
    result
}

fn render<C: Control>(control: &C) -> Result<Json<Value>, ApiError> {
    serde_json::to_value(control)
        .map(Json)
        .map_err(|e| ApiError(TmsError::Internal(format!("serialize {}: {e}", C::TABLE))))
}

async fn read<C: Control>(state: &AppState, organization_id: Uuid) -> Result<Json<Value>, ApiError> {
    let control: C = state.controls().get_or_init(organization_id).await?;
    render(&control)
}

async fn write<C: Control>(
    state: &AppState,
    organization_id: Uuid,
    payload: Value,
) -> Result<Json<Value>, ApiError> {
    let controls = state.controls();
    let current: C = controls.get_or_init(organization_id).await?;
    let Json(Value::Object(mut merged)) = render(&current)? else {
        return Err(ApiError(TmsError::Internal(format!(
            "{} did not serialize to an object",
            C::TABLE
        ))));
    };
    let Value::Object(changes) = payload else {
        return Err(TmsError::field(
            tms_core::validation::NON_FIELD_ERRORS,
            "Invalid data. Expected a dictionary.",
        )
        .into());
    };
    for (key, value) in changes {
        if merged.contains_key(&key) {
            merged.insert(key, value);
        }
    }

    let control: C = parse_payload(Value::Object(merged))?;
    control.validate()?;
    validate_references(&state.records(), organization_id, control.references()).await?;
    let saved = controls.update(organization_id, control).await?;
    render(&saved)
}
