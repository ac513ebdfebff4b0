//! Request extractors.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde_json::Value;
use tms_auth::AuthContext;
use tms_auth::token::parse_authorization_header;
use tms_core::error::TmsError;
use tms_core::validation::NON_FIELD_ERRORS;

use crate::error::ApiError;
use crate::state::AppState;

/// The caller behind a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub AuthContext);

impl AuthUser {
    /// Reject callers that are not staff of their organization.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.0.is_staff {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "You do not have permission to perform this action.",
            ))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ApiError(TmsError::AuthenticationFailed {
                    reason: "Authentication credentials were not provided.".into(),
                })
            })?;
        let key = parse_authorization_header(header)?;
        let context = state.auth.authenticate(key).await?;
        Ok(AuthUser(context))
    }
}

/// A JSON request body.
///
/// Unlike [`Json`], a missing content type or a malformed body is reported
/// as a `400` with the usual error map.
#[derive(Debug)]
pub struct JsonPayload(pub Value);

impl<S> FromRequest<S> for JsonPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonPayload(value)),
            Err(rejection) => Err(TmsError::field(NON_FIELD_ERRORS, rejection.body_text()).into()),
        }
    }
}
