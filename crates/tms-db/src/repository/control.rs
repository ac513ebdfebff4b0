//! SurrealDB implementation of [`ControlRepository`].
//!
//! Each control table holds at most one row per organization, keyed by
//! the organization id.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tms_core::error::TmsResult;
use tms_core::models::Control;
use tms_core::repository::ControlRepository;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ControlRow {
    data: serde_json::Value,
}

fn decode<C: Control>(row: ControlRow) -> Result<C, DbError> {
    serde_json::from_value(row.data).map_err(|e| DbError::Data(format!("{}: {e}", C::TABLE)))
}

fn encode<C: Control>(control: &C) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(control).map_err(|e| DbError::Data(format!("{}: {e}", C::TABLE)))
}

#[derive(Clone)]
pub struct SurrealControlRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealControlRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find<K: Control>(&self, organization_id: &str) -> Result<Option<K>, DbError> {
        let mut result = self
            .db
            .query("SELECT data FROM type::record($table, $organization_id)")
            .bind(("table", K::TABLE))
            .bind(("organization_id", organization_id.to_string()))
            .await?;

        let rows: Vec<ControlRow> = result.take(0)?;
        rows.into_iter().next().map(decode::<K>).transpose()
    }
}

impl<C: Connection> ControlRepository for SurrealControlRepository<C> {
    async fn get_or_init<K: Control>(&self, organization_id: Uuid) -> TmsResult<K> {
        let organization_id_str = organization_id.to_string();
        if let Some(control) = self.find(&organization_id_str).await? {
            return Ok(control);
        }

        let control = K::default();
        let result = self
            .db
            .query(
                "CREATE type::record($table, $organization_id) SET \
                 organization_id = $organization_id, data = $data",
            )
            .bind(("table", K::TABLE))
            .bind(("organization_id", organization_id_str.clone()))
            .bind(("data", encode(&control)?))
            .await
            .map_err(DbError::from)?;

        match result.check().map_err(|e| DbError::from_check(K::TABLE, e)) {
            Ok(_) => {
                debug!(table = K::TABLE, %organization_id, "Initialized control with defaults");
                Ok(control)
            }
            // Another request created the row first.
            Err(DbError::AlreadyExists { .. }) => self
                .find(&organization_id_str)
                .await?
                .ok_or_else(|| {
                    DbError::NotFound {
                        entity: K::TABLE.into(),
                        id: organization_id_str,
                    }
                    .into()
                }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update<K: Control>(&self, organization_id: Uuid, control: K) -> TmsResult<K> {
        let result = self
            .db
            .query(
                "UPSERT type::record($table, $organization_id) SET \
                 organization_id = $organization_id, data = $data, \
                 updated_at = time::now()",
            )
            .bind(("table", K::TABLE))
            .bind(("organization_id", organization_id.to_string()))
            .bind(("data", encode(&control)?))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_check(K::TABLE, e))?;

        let rows: Vec<ControlRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: K::TABLE.into(),
            id: organization_id.to_string(),
        })?;

        Ok(decode(row)?)
    }
}
