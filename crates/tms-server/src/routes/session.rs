//! Login, logout and the caller's own account.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tms_core::models::user::User;
use tms_core::repository::UserRepository;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{AuthUser, JsonPayload};
use crate::routes::parse_payload;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<LoginResponse>, ApiError> {
    let request: LoginRequest = parse_payload(payload)?;
    let output = state
        .auth
        .login(&request.username, &request.password)
        .await?;
    Ok(Json(LoginResponse {
        token: output.key,
        user_id: output.user_id,
        organization_id: output.organization_id,
        expires_at: output.expires_at,
    }))
}

/// Revoke the token the request was made with.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.auth.logout(user.token_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change the caller's password; every token of the caller is revoked.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    JsonPayload(payload): JsonPayload,
) -> Result<StatusCode, ApiError> {
    let request: ChangePasswordRequest = parse_payload(payload)?;
    state
        .auth
        .change_password(&user, &request.old_password, &request.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state
        .users()
        .get_by_id(user.organization_id, user.user_id)
        .await?;
    Ok(Json(user))
}
