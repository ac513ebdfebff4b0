//! SurrealDB implementation of [`OrganizationRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tms_core::error::TmsResult;
use tms_core::models::organization::{
    CreateOrganization, DEFAULT_TOKEN_EXPIRATION_DAYS, Organization, OrganizationType,
    UpdateOrganization,
};
use tms_core::repository::{OrganizationRepository, PaginatedResult, Pagination};
use uuid::Uuid;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    name: String,
    scac_code: String,
    dot_number: Option<u32>,
    org_type: String,
    timezone: String,
    currency: String,
    token_expiration_days: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct OrganizationRowWithId {
    record_id: String,
    name: String,
    scac_code: String,
    dot_number: Option<u32>,
    org_type: String,
    timezone: String,
    currency: String,
    token_expiration_days: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_org_type(s: &str) -> Result<OrganizationType, DbError> {
    OrganizationType::parse(s).ok_or_else(|| DbError::Data(format!("unknown organization type: {s}")))
}

impl OrganizationRow {
    fn into_organization(self, id: Uuid) -> Result<Organization, DbError> {
        Ok(Organization {
            id,
            name: self.name,
            scac_code: self.scac_code,
            dot_number: self.dot_number,
            org_type: parse_org_type(&self.org_type)?,
            timezone: self.timezone,
            currency: self.currency,
            token_expiration_days: self.token_expiration_days,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl OrganizationRowWithId {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        let id = parse_uuid("organization", &self.record_id)?;
        OrganizationRow {
            name: self.name,
            scac_code: self.scac_code,
            dot_number: self.dot_number,
            org_type: self.org_type,
            timezone: self.timezone,
            currency: self.currency,
            token_expiration_days: self.token_expiration_days,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_organization(id)
    }
}

/// SurrealDB implementation of the Organization repository.
#[derive(Clone)]
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn create(&self, input: CreateOrganization) -> TmsResult<Organization> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('organization', $id) SET \
                 name = $name, scac_code = $scac_code, \
                 dot_number = $dot_number, org_type = $org_type, \
                 timezone = $timezone, currency = $currency, \
                 token_expiration_days = $token_expiration_days",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("scac_code", input.scac_code))
            .bind(("dot_number", input.dot_number))
            .bind(("org_type", input.org_type.as_str().to_string()))
            .bind(("timezone", input.timezone))
            .bind(("currency", input.currency))
            .bind((
                "token_expiration_days",
                input
                    .token_expiration_days
                    .unwrap_or(DEFAULT_TOKEN_EXPIRATION_DAYS),
            ))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_check("organization", e))?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "organization".into(),
            id: id_str,
        })?;

        Ok(row.into_organization(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> TmsResult<Organization> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('organization', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "organization".into(),
            id: id_str,
        })?;

        Ok(row.into_organization(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateOrganization) -> TmsResult<Organization> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.scac_code.is_some() {
            sets.push("scac_code = $scac_code");
        }
        if input.dot_number.is_some() {
            sets.push("dot_number = $dot_number");
        }
        if input.org_type.is_some() {
            sets.push("org_type = $org_type");
        }
        if input.timezone.is_some() {
            sets.push("timezone = $timezone");
        }
        if input.currency.is_some() {
            sets.push("currency = $currency");
        }
        if input.token_expiration_days.is_some() {
            sets.push("token_expiration_days = $token_expiration_days");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('organization', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(scac_code) = input.scac_code {
            builder = builder.bind(("scac_code", scac_code));
        }
        if let Some(dot_number) = input.dot_number {
            builder = builder.bind(("dot_number", dot_number));
        }
        if let Some(org_type) = input.org_type {
            builder = builder.bind(("org_type", org_type.as_str().to_string()));
        }
        if let Some(timezone) = input.timezone {
            builder = builder.bind(("timezone", timezone));
        }
        if let Some(currency) = input.currency {
            builder = builder.bind(("currency", currency));
        }
        if let Some(days) = input.token_expiration_days {
            builder = builder.bind(("token_expiration_days", days));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_check("organization", e))?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "organization".into(),
            id: id_str,
        })?;

        Ok(row.into_organization(id)?)
    }

    async fn delete(&self, id: Uuid) -> TmsResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("DELETE type::record('organization', $id) RETURN BEFORE")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "organization".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> TmsResult<PaginatedResult<Organization>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM organization GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM organization \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_organization())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
