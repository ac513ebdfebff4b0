//! TMS Auth — password verification and opaque bearer tokens.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{AuthContext, AuthService, LoginOutput};
