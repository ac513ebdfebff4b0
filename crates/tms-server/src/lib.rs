//! TMS Server — axum REST API over the TMS services.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, StartupError};
pub use routes::router;
pub use state::AppState;
