//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tms_core::error::TmsError;
use tracing::{error, warn};

/// A [`TmsError`] rendered as an HTTP response.
///
/// Validation failures become a `400` whose body is the field map; every
/// other error renders as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub TmsError);

impl<E> From<E> for ApiError
where
    E: Into<TmsError>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    pub fn forbidden(reason: &str) -> Self {
        ApiError(TmsError::AuthorizationDenied {
            reason: reason.to_string(),
        })
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        ApiError(TmsError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TmsError::NotFound { .. } => StatusCode::NOT_FOUND,
            TmsError::Validation(_) => StatusCode::BAD_REQUEST,
            TmsError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            TmsError::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
            TmsError::AlreadyExists { .. } => StatusCode::CONFLICT,
            TmsError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            TmsError::Database(_) | TmsError::Crypto(_) | TmsError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.0 {
            TmsError::Validation(errors) => json!(errors),
            TmsError::NotFound { .. } => json!({"detail": "Not found."}),
            TmsError::AuthenticationFailed { reason } => json!({"detail": reason}),
            TmsError::AuthorizationDenied { reason } => json!({"detail": reason}),
            TmsError::AlreadyExists { entity } => {
                json!({"detail": format!("{entity} already exists.")})
            }
            TmsError::ExternalService(message) => {
                warn!(error = %message, "External service failed");
                json!({"detail": "An external service is unavailable."})
            }
            other => {
                error!(error = %other, "Request failed");
                json!({"detail": "Internal server error."})
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Failures that stop the binary before or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Connect(#[from] surrealdb::Error),

    #[error("migrations failed: {0}")]
    Migration(#[from] tms_db::DbError),

    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tms(#[from] TmsError),
}
