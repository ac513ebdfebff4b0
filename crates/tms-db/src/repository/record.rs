//! SurrealDB implementation of [`RecordRepository`].
//!
//! Every generic model shares one row layout: the organization, the
//! timestamps and the serialized model body under `data`. Filters match
//! against paths inside `data`.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tms_core::error::{TmsError, TmsResult};
use tms_core::models::{Entity, KeyLocation, Model, OnDelete, Referrer, referrers};
use tms_core::repository::{
    PaginatedResult, Pagination, RecordFilter, RecordRepository, protected,
};
use tms_core::serializer::NOT_UNIQUE;
use tracing::debug;
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};
use crate::schema::unique_index;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct RecordRow {
    organization_id: String,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct RecordRowWithId {
    record_id: String,
    organization_id: String,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct IdRow {
    #[allow(dead_code)]
    record_id: String,
}

#[derive(Debug, SurrealValue)]
struct SequenceRow {
    current: u64,
}

impl RecordRow {
    fn into_entity<M: Model>(self, id: Uuid) -> Result<Entity<M>, DbError> {
        let data = serde_json::from_value(self.data)
            .map_err(|e| DbError::Data(format!("invalid {} record {id}: {e}", M::TABLE)))?;
        Ok(Entity {
            id,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            data,
        })
    }
}

impl RecordRowWithId {
    fn try_into_entity<M: Model>(self) -> Result<Entity<M>, DbError> {
        let id = parse_uuid(M::TABLE, &self.record_id)?;
        RecordRow {
            organization_id: self.organization_id,
            data: self.data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_entity(id)
    }
}

fn to_data<M: Model>(data: &M) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(data).map_err(|e| DbError::Data(format!("{}: {e}", M::TABLE)))
}

/// Build the `WHERE` clause for a filtered list and its bind names.
///
/// Field names are checked by [`RecordFilter::check`] before they are
/// spliced into the query; values are always bound.
fn filter_clause(filter: &RecordFilter) -> (String, Vec<(String, serde_json::Value)>) {
    let mut clause = String::from("organization_id = $organization_id");
    let mut binds = Vec::new();
    for (i, (field, values)) in filter.conditions().enumerate() {
        let name = format!("f{i}");
        match values {
            [value] => {
                clause.push_str(&format!(" AND data.{field} = ${name}"));
                binds.push((name, value.clone()));
            }
            _ => {
                clause.push_str(&format!(" AND data.{field} IN ${name}"));
                binds.push((name, serde_json::Value::Array(values.to_vec())));
            }
        }
    }
    (clause, binds)
}

/// `WHERE` clause matching the rows of `referrer.table` that point at `$id`.
fn referrer_clause(referrer: &Referrer, target: &str) -> String {
    let field = referrer.key.field;
    let path = match referrer.location {
        KeyLocation::Body => format!("data.{field}"),
        KeyLocation::Column => field.to_string(),
    };
    let mut clause = if referrer.key.many {
        format!("organization_id = $organization_id AND $id IN {path}")
    } else {
        format!("organization_id = $organization_id AND {path} = $id")
    };
    if referrer.table == target {
        clause.push_str(" AND meta::id(id) != $id");
    }
    clause
}

/// SurrealDB implementation of the generic record repository.
#[derive(Clone)]
pub struct SurrealRecordRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRecordRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

/// Map a failed write, reporting unique index violations on their field.
fn write_error<M: Model>(err: surrealdb::Error) -> TmsError {
    let message = err.to_string();
    M::UNIQUE_FIELDS
        .iter()
        .find(|field| message.contains(&unique_index(M::TABLE, field)))
        .map(|field| TmsError::field(field, NOT_UNIQUE))
        .unwrap_or_else(|| DbError::from_check(M::TABLE, err).into())
}

fn not_found<M: Model>(id: String) -> DbError {
    DbError::NotFound {
        entity: M::TABLE.into(),
        id,
    }
}

impl<C: Connection> RecordRepository for SurrealRecordRepository<C> {
    async fn create<M: Model>(&self, organization_id: Uuid, data: M) -> TmsResult<Entity<M>> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record($table, $id) SET \
                 organization_id = $organization_id, data = $data",
            )
            .bind(("table", M::TABLE))
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .bind(("data", to_data(&data)?))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(write_error::<M>)?;

        let rows: Vec<RecordRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found::<M>(id_str))?;

        Ok(row.into_entity(id)?)
    }

    async fn get<M: Model>(&self, organization_id: Uuid, id: Uuid) -> TmsResult<Entity<M>> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record($table, $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("table", M::TABLE))
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RecordRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found::<M>(id_str))?;

        Ok(row.into_entity(id)?)
    }

    async fn update<M: Model>(
        &self,
        organization_id: Uuid,
        id: Uuid,
        data: M,
    ) -> TmsResult<Entity<M>> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record($table, $id) SET \
                 data = $data, updated_at = time::now() \
                 WHERE organization_id = $organization_id",
            )
            .bind(("table", M::TABLE))
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .bind(("data", to_data(&data)?))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(write_error::<M>)?;

        let rows: Vec<RecordRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found::<M>(id_str))?;

        Ok(row.into_entity(id)?)
    }

    async fn delete<M: Model>(&self, organization_id: Uuid, id: Uuid) -> TmsResult<()> {
        let id_str = id.to_string();

        if !self.exists(M::TABLE, organization_id, id).await? {
            return Err(not_found::<M>(id_str).into());
        }
        if let Some(table) = self.referenced_by(M::TABLE, organization_id, id).await? {
            return Err(protected(table));
        }

        // Cascades reach one level; the dependents are removed before the
        // record itself.
        let mut statements = String::from("BEGIN TRANSACTION;\n");
        let mut dependents = Vec::new();
        for referrer in referrers(M::TABLE) {
            if referrer.key.on_delete == OnDelete::Cascade {
                let name = format!("c{}", dependents.len());
                statements.push_str(&format!(
                    "DELETE type::table(${name}) WHERE {};\n",
                    referrer_clause(&referrer, M::TABLE)
                ));
                dependents.push((name, referrer.table));
            }
        }
        statements.push_str(
            "DELETE type::record($table, $id) WHERE organization_id = $organization_id;\n\
             COMMIT TRANSACTION;",
        );

        let mut builder = self
            .db
            .query(&statements)
            .bind(("table", M::TABLE))
            .bind(("id", id_str))
            .bind(("organization_id", organization_id.to_string()));
        for (name, table) in dependents {
            builder = builder.bind((name, table));
        }
        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_check(M::TABLE, e))?;

        debug!(table = M::TABLE, %organization_id, %id, "Deleted record");
        Ok(())
    }

    async fn referenced_by(
        &self,
        table: &str,
        organization_id: Uuid,
        id: Uuid,
    ) -> TmsResult<Option<&'static str>> {
        for referrer in referrers(table) {
            if referrer.key.on_delete != OnDelete::Protect {
                continue;
            }
            let query = format!(
                "SELECT count() AS total FROM type::table($referrer) WHERE {} GROUP ALL",
                referrer_clause(&referrer, table)
            );
            let mut result = self
                .db
                .query(&query)
                .bind(("referrer", referrer.table))
                .bind(("id", id.to_string()))
                .bind(("organization_id", organization_id.to_string()))
                .await
                .map_err(DbError::from)?;
            let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
            if rows.first().is_some_and(|r| r.total > 0) {
                return Ok(Some(referrer.table));
            }
        }
        Ok(None)
    }

    async fn list<M: Model>(
        &self,
        organization_id: Uuid,
        filter: RecordFilter,
        pagination: Pagination,
    ) -> TmsResult<PaginatedResult<Entity<M>>> {
        filter.check()?;
        let organization_id_str = organization_id.to_string();
        let (clause, binds) = filter_clause(&filter);

        let count_query = format!(
            "SELECT count() AS total FROM type::table($table) \
             WHERE {clause} GROUP ALL"
        );
        let mut builder = self
            .db
            .query(&count_query)
            .bind(("table", M::TABLE))
            .bind(("organization_id", organization_id_str.clone()));
        for (name, value) in binds.iter().cloned() {
            builder = builder.bind((name, value));
        }
        let mut count_result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let list_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM type::table($table) \
             WHERE {clause} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset"
        );
        let mut builder = self
            .db
            .query(&list_query)
            .bind(("table", M::TABLE))
            .bind(("organization_id", organization_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (name, value) in binds {
            builder = builder.bind((name, value));
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<RecordRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_entity())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn exists(&self, table: &str, organization_id: Uuid, id: Uuid) -> TmsResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM type::record($table, $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("table", table.to_string()))
            .bind(("id", id.to_string()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    async fn next_sequence(&self, organization_id: Uuid, name: &str) -> TmsResult<u64> {
        let key = format!("{organization_id}_{name}");

        let result = self
            .db
            .query(
                "UPSERT type::record('sequence', $key) SET \
                 organization_id = $organization_id, name = $name, \
                 current = (current ?? 0) + 1 \
                 RETURN AFTER",
            )
            .bind(("key", key.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SequenceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "sequence".into(),
            id: key,
        })?;

        Ok(row.current)
    }
}
