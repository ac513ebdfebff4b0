//! User management inside the caller's organization.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tms_auth::password::check_password_policy;
use tms_core::models::Reference;
use tms_core::models::user::{CreateUser, UpdateUser, User};
use tms_core::repository::UserRepository;
use tms_core::serializer::validate_references;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::routes::parse_payload;
use crate::routes::viewset::pagination;
use crate::state::AppState;

const JOB_TITLE_TABLE: &str = "job_title";

/// A new user; the organization always comes from the caller.
#[derive(Debug, Deserialize)]
struct NewUser {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    job_title_id: Option<Uuid>,
    #[serde(default)]
    is_staff: bool,
}

async fn check_job_title(
    state: &AppState,
    organization_id: Uuid,
    job_title_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let reference = Reference::optional("job_title_id", JOB_TITLE_TABLE, job_title_id);
    validate_references(&state.records(), organization_id, reference).await?;
    Ok(())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let page = state
        .users()
        .list(user.organization_id, pagination(&params)?)
        .await?;
    Ok(Json(json!({
        "count": page.total,
        "offset": page.offset,
        "limit": page.limit,
        "results": page.items,
    })))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<(StatusCode, Json<User>), ApiError> {
    caller.require_staff()?;
    let organization_id = caller.0.organization_id;
    let new: NewUser = parse_payload(payload)?;

    let input = CreateUser {
        organization_id,
        username: new.username,
        email: new.email,
        password: new.password,
        first_name: new.first_name,
        last_name: new.last_name,
        job_title_id: new.job_title_id,
        is_staff: new.is_staff,
    };
    let mut errors = match input.validate() {
        Ok(()) => Default::default(),
        Err(errors) => errors,
    };
    if let Err(policy) = check_password_policy(
        &input.password,
        state.auth.config().min_password_length,
        "password",
    ) {
        errors.merge(policy);
    }
    errors.into_result()?;
    check_job_title(&state, organization_id, input.job_title_id).await?;

    let user = state.users().create(input).await?;
    info!(user_id = %user.id, %organization_id, created_by = %caller.0.user_id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users().get_by_id(user.organization_id, id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<User>, ApiError> {
    caller.require_staff()?;
    let organization_id = caller.0.organization_id;
    let input: UpdateUser = parse_payload(payload)?;
    input.validate()?;
    check_job_title(&state, organization_id, input.job_title_id.flatten()).await?;

    let user = state.users().update(organization_id, id, input).await?;
    if !user.is_active {
        state.auth.revoke_all_tokens(user.id).await?;
    }
    Ok(Json(user))
}

/// Deactivate a user and revoke their tokens.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require_staff()?;
    state.users().delete(caller.0.organization_id, id).await?;
    state.auth.revoke_all_tokens(id).await?;
    info!(user_id = %id, deleted_by = %caller.0.user_id, "User deactivated");
    Ok(StatusCode::NO_CONTENT)
}
