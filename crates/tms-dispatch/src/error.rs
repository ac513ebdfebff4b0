//! Dispatch error types.

use thiserror::Error;
use tms_core::error::TmsError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("distance request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("distance service returned {status}: {message}")]
    Api { status: String, message: String },

    #[error("unexpected distance response: {0}")]
    InvalidResponse(String),
}

impl From<DispatchError> for TmsError {
    fn from(err: DispatchError) -> Self {
        TmsError::ExternalService(err.to_string())
    }
}
