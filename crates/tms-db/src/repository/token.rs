//! SurrealDB implementation of [`TokenRepository`].
//!
//! Only the SHA-256 hash of a bearer key is persisted; lookups go through
//! the unique `key_hash` index.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tms_core::error::TmsResult;
use tms_core::models::token::{CreateToken, Token};
use tms_core::repository::TokenRepository;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct TokenRow {
    user_id: String,
    organization_id: String,
    key_hash: String,
    key_prefix: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, SurrealValue)]
struct TokenRowWithId {
    record_id: String,
    user_id: String,
    organization_id: String,
    key_hash: String,
    key_prefix: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_used: Option<DateTime<Utc>>,
}

fn row_to_token(row: TokenRow, id: Uuid) -> Result<Token, DbError> {
    Ok(Token {
        id,
        user_id: parse_uuid("user", &row.user_id)?,
        organization_id: parse_uuid("organization", &row.organization_id)?,
        key_hash: row.key_hash,
        key_prefix: row.key_prefix,
        created_at: row.created_at,
        expires_at: row.expires_at,
        last_used: row.last_used,
    })
}

impl TokenRowWithId {
    fn try_into_token(self) -> Result<Token, DbError> {
        let id = parse_uuid("token", &self.record_id)?;
        row_to_token(
            TokenRow {
                user_id: self.user_id,
                organization_id: self.organization_id,
                key_hash: self.key_hash,
                key_prefix: self.key_prefix,
                created_at: self.created_at,
                expires_at: self.expires_at,
                last_used: self.last_used,
            },
            id,
        )
    }
}

#[derive(Clone)]
pub struct SurrealTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TokenRepository for SurrealTokenRepository<C> {
    async fn create(&self, input: CreateToken) -> TmsResult<Token> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('token', $id) SET \
                 user_id = $user_id, organization_id = $organization_id, \
                 key_hash = $key_hash, key_prefix = $key_prefix, \
                 expires_at = $expires_at, last_used = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("key_hash", input.key_hash))
            .bind(("key_prefix", input.key_prefix))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_check("token", e))?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "token".into(),
            id: id_str,
        })?;

        Ok(row_to_token(row, id)?)
    }

    async fn get_by_key_hash(&self, key_hash: &str) -> TmsResult<Token> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM token \
                 WHERE key_hash = $key_hash",
            )
            .bind(("key_hash", key_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRowWithId> = result.take(0).map_err(DbError::from)?;
        // The hash itself is a credential; keep it out of error messages.
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "token".into(),
            id: "key".into(),
        })?;

        Ok(row.try_into_token()?)
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> TmsResult<()> {
        self.db
            .query("UPDATE type::record('token', $id) SET last_used = $at")
            .bind(("id", id.to_string()))
            .bind(("at", at))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> TmsResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("DELETE type::record('token', $id) RETURN BEFORE")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "token".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> TmsResult<u64> {
        let mut result = self
            .db
            .query("DELETE token WHERE user_id = $user_id RETURN BEFORE")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> TmsResult<u64> {
        let mut result = self
            .db
            .query(
                "DELETE token WHERE expires_at != NONE \
                 AND expires_at <= $now RETURN BEFORE",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
