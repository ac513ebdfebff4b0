//! Authentication service — login, token checks and logout orchestration.

use chrono::{DateTime, TimeDelta, Utc};
use tms_core::error::{TmsError, TmsResult};
use tms_core::models::organization::MAX_TOKEN_EXPIRATION_DAYS;
use tms_core::models::token::CreateToken;
use tms_core::repository::{OrganizationRepository, TokenRepository, UserRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Raw bearer key (returned to the client once, never stored).
    pub key: String,
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The identity behind an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub is_staff: bool,
    pub token_id: Uuid,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U, T, O> {
    user_repo: U,
    token_repo: T,
    organization_repo: O,
    config: AuthConfig,
}

impl<U, T, O> AuthService<U, T, O>
where
    U: UserRepository,
    T: TokenRepository,
    O: OrganizationRepository,
{
    pub fn new(user_repo: U, token_repo: T, organization_repo: O, config: AuthConfig) -> Self {
        Self {
            user_repo,
            token_repo,
            organization_repo,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate a user with username + password and issue a token.
    pub async fn login(&self, username: &str, password: &str) -> TmsResult<LoginOutput> {
        // 1. Look up user.
        let user = match self.user_repo.get_by_username(username).await {
            Ok(u) => u,
            Err(TmsError::NotFound { .. }) => return Err(AuthError::InvalidCredentials.into()),
            Err(e) => return Err(e),
        };

        // 2. Verify password.
        let valid = password::verify_password(
            password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        // 3. Check account status.
        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        // 4. Issue a token with the organization's lifetime.
        let lifetime_days = self.token_lifetime_days(user.organization_id).await?;
        let now = Utc::now();
        let expires_at = TimeDelta::try_days(i64::from(lifetime_days))
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                TmsError::Internal(format!("token lifetime of {lifetime_days} days overflows"))
            })?;
        let expires_at = Some(expires_at);

        let raw_key = token::generate_key();
        let created = self
            .token_repo
            .create(CreateToken {
                user_id: user.id,
                organization_id: user.organization_id,
                key_hash: token::hash_key(&raw_key),
                key_prefix: token::key_prefix(&raw_key),
                expires_at,
            })
            .await?;

        self.user_repo.record_login(user.id, now).await?;
        info!(user_id = %user.id, organization_id = %user.organization_id, "User logged in");

        Ok(LoginOutput {
            key: raw_key,
            token_id: created.id,
            user_id: user.id,
            organization_id: user.organization_id,
            expires_at: created.expires_at,
        })
    }

    /// The organization's token lifetime, or the configured default when it
    /// has none. Values beyond [`MAX_TOKEN_EXPIRATION_DAYS`] are clamped.
    async fn token_lifetime_days(&self, organization_id: Uuid) -> TmsResult<u32> {
        match self.organization_repo.get_by_id(organization_id).await {
            Ok(org) if org.token_expiration_days > 0 => {
                Ok(org.token_expiration_days.min(MAX_TOKEN_EXPIRATION_DAYS))
            }
            Ok(_) | Err(TmsError::NotFound { .. }) => Ok(self.config.default_token_lifetime_days),
            Err(e) => Err(e),
        }
    }

    /// Resolve a raw bearer key to the identity it was issued to.
    pub async fn authenticate(&self, raw_key: &str) -> TmsResult<AuthContext> {
        // 1. Look up token by key hash.
        let key_hash = token::hash_key(raw_key);
        let token = self
            .token_repo
            .get_by_key_hash(&key_hash)
            .await
            .map_err(|e| match e {
                TmsError::NotFound { .. } => AuthError::TokenInvalid("invalid token".into()).into(),
                other => other,
            })?;

        // 2. Check expiry; expired tokens are removed on sight.
        let now = Utc::now();
        if token.is_expired(now) {
            if let Err(e) = self.token_repo.delete(token.id).await {
                debug!(token_id = %token.id, error = %e, "Failed to delete expired token");
            }
            return Err(AuthError::TokenExpired.into());
        }

        // 3. Verify user is still active.
        let user = self
            .user_repo
            .get_by_id(token.organization_id, token.user_id)
            .await
            .map_err(|e| match e {
                TmsError::NotFound { .. } => {
                    AuthError::TokenInvalid("user no longer exists".into()).into()
                }
                other => other,
            })?;
        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        // 4. Refresh last_used, at most once per interval.
        let interval = i64::try_from(self.config.last_used_touch_interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        if token.last_used.is_none_or(|last| now - last >= interval) {
            self.token_repo.touch(token.id, now).await?;
        }

        Ok(AuthContext {
            user_id: user.id,
            organization_id: user.organization_id,
            is_staff: user.is_staff,
            token_id: token.id,
        })
    }

    /// Delete a single token (logout).
    pub async fn logout(&self, token_id: Uuid) -> TmsResult<()> {
        self.token_repo.delete(token_id).await
    }

    /// Revoke all tokens of a user (e.g. on password change).
    pub async fn revoke_all_tokens(&self, user_id: Uuid) -> TmsResult<u64> {
        let revoked = self.token_repo.delete_for_user(user_id).await?;
        info!(%user_id, revoked, "Revoked user tokens");
        Ok(revoked)
    }

    /// Replace the password of the authenticated user and revoke every
    /// token issued to them.
    pub async fn change_password(
        &self,
        context: &AuthContext,
        old_password: &str,
        new_password: &str,
    ) -> TmsResult<()> {
        let user = self
            .user_repo
            .get_by_id(context.organization_id, context.user_id)
            .await?;

        let valid = password::verify_password(
            old_password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            return Err(TmsError::field("old_password", "Old password is incorrect."));
        }

        password::check_password_policy(
            new_password,
            self.config.min_password_length,
            "new_password",
        )?;

        self.user_repo
            .set_password(context.organization_id, context.user_id, new_password)
            .await?;
        self.revoke_all_tokens(context.user_id).await?;
        Ok(())
    }

    /// Delete every expired token; returns how many were removed.
    pub async fn cleanup_expired(&self) -> TmsResult<u64> {
        let removed = self.token_repo.cleanup_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Removed expired tokens");
        }
        Ok(removed)
    }
}
