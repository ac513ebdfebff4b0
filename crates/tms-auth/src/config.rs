//! Authentication configuration.

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
    /// Token lifetime in days when the organization does not set one.
    pub default_token_lifetime_days: u32,
    /// `last_used` is only rewritten when older than this many seconds.
    pub last_used_touch_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pepper: None,
            min_password_length: 8,
            default_token_lifetime_days: 30,
            last_used_touch_interval_secs: 60,
        }
    }
}
